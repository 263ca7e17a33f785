//! Card transports
//!
//! A transport is the narrow boundary between a [`CardSession`] and whatever
//! actually talks to the reader: the vendor card library, PC/SC, or the
//! in-memory card used by tests and the `--simulate` mode.
//!
//! The primitives mirror the vendor library. Status codes follow its
//! convention: zero is success, anything else is a failure whose reason is
//! available through [`CardTransport::last_error`].
//!
//! [`CardSession`]: crate::session::CardSession

mod memory;
mod timed;
#[cfg(unix)]
mod libcard;
#[cfg(feature = "pcsc")]
mod pcsc;

pub use memory::{MemoryCard, SIMULATED_READER};
pub use timed::TimedTransport;
#[cfg(unix)]
pub use libcard::LibCard;
#[cfg(feature = "pcsc")]
pub use self::pcsc::PcscTransport;

use thiserror::Error;

use crate::card::{AuthenticationKey, BlockAddress};

/// Status code returned by connect and write primitives
pub type Status = i32;

/// The call succeeded
pub const STATUS_OK: Status = 0;
/// Generic failure, see `last_error`
pub const STATUS_ERROR: Status = -1;
/// The call did not finish within the transaction deadline
pub const STATUS_TIMEOUT: Status = -2;

/// Failure reported by a transport outside of the status code convention
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Block-level access to a reader and the card on it
pub trait CardTransport {
    /// Enumerate reader identifiers
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError>;

    /// Connect to the card on the named reader
    fn connect_reader(&mut self, reader: &str) -> Status;

    /// Authenticate and read one block
    ///
    /// Returns `None` when the read failed. The bytes may carry a
    /// `[Hex: ..]` diagnostic suffix or an `ERROR..` string.
    fn read_block_string(&mut self, key: &AuthenticationKey, block: BlockAddress)
        -> Option<Vec<u8>>;

    /// Authenticate and write one block
    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status;

    /// Description of the most recent failure
    fn last_error(&mut self) -> String;

    /// Release the reader and any library resources
    fn cleanup(&mut self);
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError> {
        (**self).list_readers()
    }

    fn connect_reader(&mut self, reader: &str) -> Status {
        (**self).connect_reader(reader)
    }

    fn read_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
    ) -> Option<Vec<u8>> {
        (**self).read_block_string(key, block)
    }

    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status {
        (**self).write_block_string(key, block, payload)
    }

    fn last_error(&mut self) -> String {
        (**self).last_error()
    }

    fn cleanup(&mut self) {
        (**self).cleanup()
    }
}
