//! Direct PC/SC transport
//!
//! Talks to the contactless reader through the system PC/SC service instead
//! of the vendor library, using the storage card pseudo-APDUs from
//! [`crate::apdu`]. Reads are rendered the way the vendor library renders
//! them, so sessions behave the same on either transport.

use std::ffi::CString;

use ::pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use log::{debug, warn};

use super::{CardTransport, Status, TransportError, STATUS_ERROR, STATUS_OK};
use crate::apdu::{self, KeyType, Response, APDU, KEY_SLOT};
use crate::card::block::{pad, render_with_hex};
use crate::card::{AuthenticationKey, BlockAddress};

/// PC/SC reader connection
#[derive(Default)]
pub struct PcscTransport {
    context: Option<Context>,
    card: Option<Card>,
    last_error: String,
}

impl PcscTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&mut self) -> Result<&Context, TransportError> {
        if self.context.is_none() {
            let ctx = Context::establish(Scope::User)
                .map_err(|e| TransportError(format!("ERROR: PC/SC context: {}", e)))?;
            self.context = Some(ctx);
        }
        self.context
            .as_ref()
            .ok_or_else(|| TransportError("ERROR: PC/SC context unavailable".to_string()))
    }

    fn transmit(&mut self, command: &APDU) -> Result<Response, String> {
        let card = self.card.as_ref().ok_or("Not connected")?;
        let bytes = command.to_bytes().map_err(|e| e.to_string())?;
        debug!("APDU: {:02X?}", bytes);

        let mut buffer = [0u8; MAX_BUFFER_SIZE];
        let reply = card
            .transmit(&bytes, &mut buffer)
            .map_err(|e| format!("Transmit failed: {}", e))?;
        debug!("Response: {:02X?}", reply);

        let response = Response::from_bytes(reply).ok_or("Truncated reader response")?;
        if !response.is_okay() {
            return Err(format!(
                "INS {:02X} rejected: {}",
                command.ins,
                response.status_text()
            ));
        }
        Ok(response)
    }

    fn authenticate(&mut self, key: &AuthenticationKey, block: BlockAddress) -> Result<(), String> {
        self.transmit(&apdu::load_key(KEY_SLOT, key))?;
        let auth = apdu::authenticate(block, KeyType::A, KEY_SLOT).map_err(|e| e.to_string())?;
        self.transmit(&auth)?;
        Ok(())
    }

    fn read(&mut self, key: &AuthenticationKey, block: BlockAddress) -> Result<Vec<u8>, String> {
        self.authenticate(key, block)?;
        let cmd = apdu::read_binary(block).map_err(|e| e.to_string())?;
        Ok(self.transmit(&cmd)?.data)
    }

    fn write(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Result<(), String> {
        self.authenticate(key, block)?;
        let cmd = apdu::update_binary(block, &pad(payload)).map_err(|e| e.to_string())?;
        self.transmit(&cmd)?;
        Ok(())
    }
}

impl CardTransport for PcscTransport {
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError> {
        let readers = self
            .context()?
            .list_readers_owned()
            .map_err(|e| TransportError(format!("ERROR: {}", e)))?;
        Ok(readers
            .iter()
            .map(|r| r.to_string_lossy().into_owned())
            .collect())
    }

    fn connect_reader(&mut self, reader: &str) -> Status {
        let name = match CString::new(reader) {
            Ok(name) => name,
            Err(_) => {
                self.last_error = format!("Invalid reader name: {}", reader);
                return STATUS_ERROR;
            }
        };
        let connected = self
            .context()
            .map(|ctx| ctx.connect(&name, ShareMode::Shared, Protocols::ANY));
        let result = match connected {
            Ok(result) => result,
            Err(e) => {
                self.last_error = e.0;
                return STATUS_ERROR;
            }
        };
        match result {
            Ok(card) => {
                self.card = Some(card);
                STATUS_OK
            }
            Err(e) => {
                self.last_error = e.to_string();
                STATUS_ERROR
            }
        }
    }

    fn read_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
    ) -> Option<Vec<u8>> {
        match self.read(key, block) {
            Ok(data) => Some(render_with_hex(&data).into_bytes()),
            Err(e) => {
                self.last_error = e;
                None
            }
        }
    }

    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status {
        match self.write(key, block, payload) {
            Ok(()) => STATUS_OK,
            Err(e) => {
                self.last_error = e;
                STATUS_ERROR
            }
        }
    }

    fn last_error(&mut self) -> String {
        self.last_error.clone()
    }

    fn cleanup(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                warn!("Disconnect failed: {}", e);
            }
        }
        self.context = None;
    }
}
