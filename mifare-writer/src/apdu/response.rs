//! Reader response handling
//!
//! A Response contains data bytes plus SW1/SW2 status words.

use super::status::SW;

/// A reader response
///
/// # Example
/// ```ignore
/// let response = Response::from_bytes(&[0x41, 0x90, 0x00]).unwrap();
/// assert!(response.is_okay());
/// assert_eq!(response.data, vec![0x41]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Response data (without status words)
    pub data: Vec<u8>,
    /// Status word 1 (SW1)
    pub sw1: u8,
    /// Status word 2 (SW2)
    pub sw2: u8,
}

impl Response {
    /// Split a raw reply (data + SW1 + SW2)
    ///
    /// Returns None if the reply is shorter than a status word.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        if raw.len() < 2 {
            return None;
        }
        let (data, sw) = raw.split_at(raw.len() - 2);
        Some(Self {
            data: data.to_vec(),
            sw1: sw[0],
            sw2: sw[1],
        })
    }

    /// Check if the command succeeded (0x9000)
    pub fn is_okay(&self) -> bool {
        SW::is_success(self.sw())
    }

    /// Get the combined status word as u16
    pub fn sw(&self) -> u16 {
        ((self.sw1 as u16) << 8) | (self.sw2 as u16)
    }

    /// Human readable status, e.g. `63 00 (operation failed)`
    pub fn status_text(&self) -> String {
        format!("{:02X} {:02X} ({})", self.sw1, self.sw2, SW::describe(self.sw()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bytes() {
        let resp = Response::from_bytes(&[0xDE, 0xAD, 0x90, 0x00]).unwrap();
        assert!(resp.is_okay());
        assert_eq!(resp.data, vec![0xDE, 0xAD]);
        assert_eq!(resp.sw(), SW::SUCCESS);
    }

    #[test]
    fn test_status_only() {
        let resp = Response::from_bytes(&[0x63, 0x00]).unwrap();
        assert!(!resp.is_okay());
        assert!(resp.data.is_empty());
        assert_eq!(resp.status_text(), "63 00 (operation failed)");
    }

    #[test]
    fn test_short_reply() {
        assert!(Response::from_bytes(&[0x90]).is_none());
        assert!(Response::from_bytes(&[]).is_none());
    }
}
