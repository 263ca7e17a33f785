//! MIFARE Classic authentication key
//!
//! Every block transaction authenticates with key A. The medium is used with
//! its factory key, so the key is a fixed credential rather than a secret
//! that needs rotation.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Length of a MIFARE Classic key in bytes
pub const KEY_LENGTH: usize = 6;

/// Factory default key (all 0xFF)
pub const DEFAULT_KEY_HEX: &str = "FFFFFFFFFFFF";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("key must be {expected} hex digits, got {0}", expected = KEY_LENGTH * 2)]
    InvalidLength(usize),

    #[error("key is not valid hex: {0}")]
    InvalidHex(String),
}

/// Six-byte key used to authenticate sector access
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AuthenticationKey([u8; KEY_LENGTH]);

impl AuthenticationKey {
    /// The factory default key
    pub const FACTORY: Self = Self([0xFF; KEY_LENGTH]);

    pub const fn new(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parse a key from 12 hex digits
    pub fn from_hex(text: &str) -> Result<Self, KeyError> {
        let text = text.trim();
        if text.len() != KEY_LENGTH * 2 {
            return Err(KeyError::InvalidLength(text.len()));
        }
        let mut bytes = [0u8; KEY_LENGTH];
        hex::decode_to_slice(text, &mut bytes)
            .map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }

    /// Upper-case hex form, as the card library expects it
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl Default for AuthenticationKey {
    fn default() -> Self {
        Self::FACTORY
    }
}

impl FromStr for AuthenticationKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Keys stay out of logs
impl fmt::Debug for AuthenticationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthenticationKey(..)")
    }
}
