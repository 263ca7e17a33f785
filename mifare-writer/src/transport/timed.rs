//! Bounded transaction time
//!
//! Reader calls block until the hardware answers. `TimedTransport` moves the
//! inner transport onto a worker thread and waits for each call with a
//! deadline. A call that misses its deadline is reported as failed and the
//! transport is marked hung: the worker may still be stuck inside the reader
//! library, so every later call fails immediately.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, warn};

use super::{CardTransport, Status, TransportError, STATUS_ERROR, STATUS_TIMEOUT};
use crate::card::{AuthenticationKey, BlockAddress};

type Job<T> = Box<dyn FnOnce(&mut T) + Send>;

enum CallError {
    TimedOut,
    Unavailable,
}

/// Transport wrapper enforcing a deadline on every call
pub struct TimedTransport<T> {
    jobs: Option<Sender<Job<T>>>,
    worker: Option<JoinHandle<()>>,
    timeout: Duration,
    hung: bool,
    /// Failure raised by the wrapper itself rather than the inner transport
    local_error: Option<String>,
}

impl<T: CardTransport + Send + 'static> TimedTransport<T> {
    /// Spawn the worker thread owning `inner`
    pub fn new(inner: T, timeout: Duration) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job<T>>();
        let worker = thread::Builder::new()
            .name("card-io".to_string())
            .spawn(move || {
                let mut inner = inner;
                for job in rx {
                    job(&mut inner);
                }
                debug!("Card I/O worker stopped");
            })?;

        Ok(Self {
            jobs: Some(tx),
            worker: Some(worker),
            timeout,
            hung: false,
            local_error: None,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Check if an earlier call missed its deadline
    pub fn is_hung(&self) -> bool {
        self.hung
    }

    fn call<R, F>(&mut self, op: &str, f: F) -> Result<R, CallError>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> R + Send + 'static,
    {
        self.local_error = None;
        if self.hung {
            self.local_error = Some(format!("{}: reader is not responding", op));
            return Err(CallError::Unavailable);
        }
        let Some(jobs) = self.jobs.as_ref() else {
            self.local_error = Some(format!("{}: transport shut down", op));
            return Err(CallError::Unavailable);
        };

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job<T> = Box::new(move |inner| {
            let _ = reply_tx.send(f(inner));
        });
        if jobs.send(job).is_err() {
            self.local_error = Some(format!("{}: worker thread exited", op));
            return Err(CallError::Unavailable);
        }

        match reply_rx.recv_timeout(self.timeout) {
            Ok(value) => Ok(value),
            Err(RecvTimeoutError::Timeout) => {
                warn!("{} timed out after {:?}", op, self.timeout);
                self.hung = true;
                self.local_error = Some(format!("{} timed out after {:?}", op, self.timeout));
                Err(CallError::TimedOut)
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("{}: worker thread panicked", op);
                self.jobs = None;
                self.local_error = Some(format!("{}: worker thread panicked", op));
                Err(CallError::Unavailable)
            }
        }
    }
}

impl<T: CardTransport + Send + 'static> CardTransport for TimedTransport<T> {
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError> {
        match self.call("list_readers", |inner| inner.list_readers()) {
            Ok(result) => result,
            Err(_) => Err(TransportError(self.local_error.clone().unwrap_or_default())),
        }
    }

    fn connect_reader(&mut self, reader: &str) -> Status {
        let reader = reader.to_string();
        match self.call("connect_reader", move |inner| inner.connect_reader(&reader)) {
            Ok(status) => status,
            Err(CallError::TimedOut) => STATUS_TIMEOUT,
            Err(CallError::Unavailable) => STATUS_ERROR,
        }
    }

    fn read_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
    ) -> Option<Vec<u8>> {
        let key = *key;
        self.call("read_block", move |inner| inner.read_block_string(&key, block))
            .ok()
            .flatten()
    }

    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status {
        let key = *key;
        let payload = payload.to_vec();
        match self.call("write_block", move |inner| {
            inner.write_block_string(&key, block, &payload)
        }) {
            Ok(status) => status,
            Err(CallError::TimedOut) => STATUS_TIMEOUT,
            Err(CallError::Unavailable) => STATUS_ERROR,
        }
    }

    fn last_error(&mut self) -> String {
        if let Some(msg) = self.local_error.clone() {
            return msg;
        }
        self.call("last_error", |inner| inner.last_error())
            .unwrap_or_else(|_| self.local_error.clone().unwrap_or_default())
    }

    fn cleanup(&mut self) {
        let _ = self.call("cleanup", |inner| inner.cleanup());
    }
}

impl<T> Drop for TimedTransport<T> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if self.hung {
                // Stuck inside the reader library, leave it detached
                return;
            }
            let _ = worker.join();
        }
    }
}
