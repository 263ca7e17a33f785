//! Reader pseudo-APDUs for contactless storage cards
//!
//! MIFARE Classic cards do not speak ISO 7816-4 themselves. PC/SC readers
//! expose them through a small set of pseudo-APDUs with `CLA = 0xFF` (PC/SC
//! part 3): load a key into the reader, authenticate a block with it, then
//! read or update the block.
//!
//! # Example
//! ```ignore
//! use mifare_writer::apdu;
//!
//! let cmd = apdu::read_binary(8).unwrap();
//! assert_eq!(cmd.to_bytes().unwrap(), vec![0xFF, 0xB0, 0x00, 0x08, 0x10]);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

use crate::card::{AuthenticationKey, BlockAddress, BLOCK_SIZE};

/// Class byte of reader-handled commands
pub const CLA_READER: u8 = 0xFF;

/// Reader key slot used for the session key
pub const KEY_SLOT: u8 = 0x00;

/// Errors building a command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum APDUError {
    #[error("block {0} cannot be addressed by a short APDU")]
    BlockOutOfRange(BlockAddress),

    #[error("command data too long: {0} bytes")]
    DataTooLong(usize),
}

/// Which sector key to authenticate with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    A,
    B,
}

impl KeyType {
    fn code(self) -> u8 {
        match self {
            Self::A => 0x60,
            Self::B => 0x61,
        }
    }
}

/// A short command APDU
///
/// - `cla`: Class byte (0xFF for reader commands)
/// - `ins`: Instruction byte
/// - `p1`, `p2`: Parameter bytes
/// - `data`: Command data (may be empty)
/// - `le`: Expected response length (None if not specified)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct APDU {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<u8>,
}

impl APDU {
    /// Create a new APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create a new APDU with data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Set the expected response length
    pub fn expect(mut self, le: u8) -> Self {
        self.le = Some(le);
        self
    }

    /// Serialize as `CLA INS P1 P2 [Lc Data] [Le]`
    pub fn to_bytes(&self) -> Result<Vec<u8>, APDUError> {
        if self.data.len() > 255 {
            return Err(APDUError::DataTooLong(self.data.len()));
        }
        let mut bytes = Vec::with_capacity(6 + self.data.len());
        bytes.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2]);
        if !self.data.is_empty() {
            bytes.push(self.data.len() as u8);
            bytes.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            bytes.push(le);
        }
        Ok(bytes)
    }
}

fn block_byte(block: BlockAddress) -> Result<u8, APDUError> {
    u8::try_from(block).map_err(|_| APDUError::BlockOutOfRange(block))
}

/// LOAD KEYS: store `key` in a volatile reader key slot
pub fn load_key(slot: u8, key: &AuthenticationKey) -> APDU {
    APDU::with_data(CLA_READER, ins::LOAD_KEYS, 0x00, slot, key.as_bytes().to_vec())
}

/// GENERAL AUTHENTICATE: authenticate `block` with the key in `slot`
pub fn authenticate(block: BlockAddress, key_type: KeyType, slot: u8) -> Result<APDU, APDUError> {
    let data = vec![0x01, 0x00, block_byte(block)?, key_type.code(), slot];
    Ok(APDU::with_data(CLA_READER, ins::GENERAL_AUTHENTICATE, 0x00, 0x00, data))
}

/// READ BINARY of one block
pub fn read_binary(block: BlockAddress) -> Result<APDU, APDUError> {
    Ok(APDU::new(CLA_READER, ins::READ_BINARY, 0x00, block_byte(block)?).expect(BLOCK_SIZE as u8))
}

/// UPDATE BINARY of one block; `data` must already be block sized
pub fn update_binary(block: BlockAddress, data: &[u8; BLOCK_SIZE]) -> Result<APDU, APDUError> {
    Ok(APDU::with_data(
        CLA_READER,
        ins::UPDATE_BINARY,
        0x00,
        block_byte(block)?,
        data.to_vec(),
    ))
}

/// Reader instruction bytes
pub mod ins {
    pub const LOAD_KEYS: u8 = 0x82;
    pub const GENERAL_AUTHENTICATE: u8 = 0x86;
    pub const READ_BINARY: u8 = 0xB0;
    pub const UPDATE_BINARY: u8 = 0xD6;
}
