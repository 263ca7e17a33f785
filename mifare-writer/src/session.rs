//! Card session
//!
//! A session owns one transport and the connection to one reader/card pair.
//! It moves through `Unconnected -> Connected -> Closed`; block operations
//! are only accepted while connected.

use log::{debug, info, warn};

use crate::card::block::ERROR_PREFIX;
use crate::card::{decode, encode, is_trailer, AuthenticationKey, BlockAddress, CardLayout};
use crate::error::{ConnectionError, Result, SessionError};
use crate::transport::{CardTransport, STATUS_OK};

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connected,
    Closed,
}

/// Authenticated block access to a single card
pub struct CardSession<T: CardTransport> {
    transport: T,
    reader_name: String,
    key: AuthenticationKey,
    layout: CardLayout,
    state: SessionState,
}

impl<T: CardTransport> CardSession<T> {
    /// Create an unconnected session for a 1K card
    pub fn new(transport: T, reader_name: impl Into<String>, key: AuthenticationKey) -> Self {
        Self {
            transport,
            reader_name: reader_name.into(),
            key,
            layout: CardLayout::default(),
            state: SessionState::Unconnected,
        }
    }

    /// Use a different card geometry
    pub fn with_layout(mut self, layout: CardLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn reader_name(&self) -> &str {
        &self.reader_name
    }

    pub fn layout(&self) -> CardLayout {
        self.layout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Enumerate readers visible to the transport
    pub fn available_readers(&mut self) -> std::result::Result<Vec<String>, ConnectionError> {
        self.transport
            .list_readers()
            .map_err(|e| ConnectionError::NoReaders(e.0))
    }

    /// Connect to the session's reader and the card on it
    pub fn connect(&mut self) -> Result<()> {
        match self.state {
            SessionState::Connected => return Ok(()),
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Unconnected => {}
        }

        let readers = self.available_readers()?;
        debug!("Available readers: {:?}", readers);

        if !reader_listed(&readers, &self.reader_name) {
            warn!("Reader {} not found", self.reader_name);
            return Err(ConnectionError::ReaderMismatch {
                expected: self.reader_name.clone(),
                available: readers,
            }
            .into());
        }

        let status = self.transport.connect_reader(&self.reader_name);
        if status != STATUS_OK {
            let reason = self.transport.last_error();
            warn!("Connect to {} failed ({}): {}", self.reader_name, status, reason);
            return Err(ConnectionError::ConnectFailed(reason).into());
        }

        self.state = SessionState::Connected;
        info!("Connected to {}", self.reader_name);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            SessionState::Connected => Ok(()),
            SessionState::Unconnected => Err(SessionError::NotConnected),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    /// Authenticated read; no data or an empty reply is a failed read
    fn fetch(&mut self, block: BlockAddress) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        match self.transport.read_block_string(&self.key, block) {
            Some(raw) if !raw.is_empty() => Ok(raw),
            _ => {
                warn!("Read of block {} failed: {}", block, self.transport.last_error());
                Err(SessionError::ReadFailed)
            }
        }
    }

    /// Raw block content as reported by the transport, hex dump included
    pub fn read_block_raw(&mut self, block: BlockAddress) -> Result<String> {
        let raw = self.fetch(block)?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Read and decode one block
    pub fn read_block(&mut self, block: BlockAddress) -> Result<String> {
        let raw = self.fetch(block)?;
        let text = decode(&raw);
        if text.starts_with(ERROR_PREFIX) {
            warn!("Read of block {} rejected: {}", block, text);
            return Err(SessionError::ReadRejected(text));
        }
        debug!("Block {}: {:?}", block, text);
        Ok(text)
    }

    /// Read one block, rendering failures as their marker text
    pub fn read_block_text(&mut self, block: BlockAddress) -> String {
        self.read_block(block).unwrap_or_else(|e| e.to_string())
    }

    /// Encode `text` and write it to one block
    pub fn try_write_block(&mut self, block: BlockAddress, text: &str) -> Result<()> {
        self.ensure_connected()?;
        if is_trailer(block) {
            return Err(SessionError::TrailerBlock(block));
        }
        if !self.layout.contains(block) {
            return Err(SessionError::OutOfRange {
                block,
                capacity: self.layout.blocks,
            });
        }

        let payload = encode(text);
        let status = self.transport.write_block_string(&self.key, block, &payload);
        if status != STATUS_OK {
            warn!(
                "Write of block {} failed ({}): {}",
                block,
                status,
                self.transport.last_error()
            );
            return Err(SessionError::WriteRejected { block, status });
        }
        debug!("Wrote block {}: {:?}", block, text);
        Ok(())
    }

    /// Write one block, returning true only on success
    pub fn write_block(&mut self, block: BlockAddress, text: &str) -> bool {
        match self.try_write_block(block, text) {
            Ok(()) => true,
            Err(SessionError::WriteRejected { .. }) => false,
            Err(e) => {
                warn!("Write of block {} refused: {}", block, e);
                false
            }
        }
    }

    /// Release the reader; later calls are no-ops
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.transport.cleanup();
        self.state = SessionState::Closed;
        info!("Session on {} closed", self.reader_name);
    }
}

/// Check if `reader` appears in the enumeration
///
/// Transports differ in how they separate reader names, so any entry
/// containing the name counts.
pub(crate) fn reader_listed(readers: &[String], reader: &str) -> bool {
    !reader.is_empty() && readers.iter().any(|r| r.contains(reader))
}

impl<T: CardTransport> Drop for CardSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::BLOCK_SIZE;
    use crate::error::READ_FAILED_MARKER;
    use crate::transport::{MemoryCard, SIMULATED_READER};

    fn session(card: &MemoryCard) -> CardSession<MemoryCard> {
        CardSession::new(card.clone(), SIMULATED_READER, AuthenticationKey::FACTORY)
    }

    fn connected(card: &MemoryCard) -> CardSession<MemoryCard> {
        let mut session = session(card);
        session.connect().unwrap();
        session
    }

    #[test]
    fn test_connect() {
        let card = MemoryCard::default();
        let mut session = session(&card);
        assert_eq!(session.state(), SessionState::Unconnected);
        session.connect().unwrap();
        assert_eq!(session.state(), SessionState::Connected);
        assert!(card.is_connected());
    }

    #[test]
    fn test_connect_no_readers() {
        let card = MemoryCard::default().with_reader_error("ERROR: SCardListReaders failed");
        let err = session(&card).connect().unwrap_err();
        assert_eq!(
            err,
            SessionError::Connection(ConnectionError::NoReaders(
                "ERROR: SCardListReaders failed".to_string()
            ))
        );
    }

    #[test]
    fn test_connect_reader_mismatch() {
        let card = MemoryCard::new("Other Reader 00 00");
        let err = session(&card).connect().unwrap_err();
        match err {
            SessionError::Connection(ConnectionError::ReaderMismatch { expected, available }) => {
                assert_eq!(expected, SIMULATED_READER);
                assert_eq!(available, vec!["Other Reader 00 00".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_connect_with_joined_listing() {
        let listing = format!("ACS ACR122U PICC Interface 00 00; {}", SIMULATED_READER);
        let card = MemoryCard::default().with_listing(listing);
        let mut session = session(&card);
        session.connect().unwrap();
        assert_eq!(session.state(), SessionState::Connected);
    }

    #[test]
    fn test_reader_listed() {
        let readers = vec!["ReaderA, OMNIKEY 5422CL 00 00 (contactless)".to_string()];
        assert!(reader_listed(&readers, "OMNIKEY 5422CL 00 00"));
        assert!(!reader_listed(&readers, "OMNIKEY 5422CL 00 01"));
        assert!(!reader_listed(&readers, ""));
        assert!(!reader_listed(&[], "OMNIKEY 5422CL 00 00"));
    }

    #[test]
    fn test_connect_without_card() {
        let card = MemoryCard::default().without_card();
        let mut session = session(&card);
        let err = session.connect().unwrap_err();
        assert_eq!(err.to_string(), "connect failed: No card present");
        assert_eq!(session.state(), SessionState::Unconnected);
    }

    #[test]
    fn test_operations_require_connection() {
        let card = MemoryCard::default();
        let mut session = session(&card);
        assert_eq!(session.read_block(4), Err(SessionError::NotConnected));
        assert_eq!(session.try_write_block(4, "x"), Err(SessionError::NotConnected));
        assert!(!session.write_block(4, "x"));
        assert!(card.writes().is_empty());
    }

    #[test]
    fn test_write_and_read_block() {
        let card = MemoryCard::default();
        let mut session = connected(&card);
        assert!(session.write_block(8, "Coffee:2"));
        assert_eq!(session.read_block(8).unwrap(), "Coffee:2");
        assert_eq!(card.writes(), vec![(8, b"Coffee:2".to_vec())]);
    }

    #[test]
    fn test_write_truncates_to_block() {
        let card = MemoryCard::default();
        let mut session = connected(&card);
        assert!(session.write_block(4, "Premium Coffee Beans:12"));
        assert_eq!(card.writes()[0].1.len(), BLOCK_SIZE);
        assert_eq!(card.text(4), "Premium Coffee B");
    }

    #[test]
    fn test_write_failure_is_false() {
        let card = MemoryCard::default();
        card.fail_writes_at(5);
        let mut session = connected(&card);
        assert!(!session.write_block(5, "x"));
        assert!(matches!(
            session.try_write_block(5, "x"),
            Err(SessionError::WriteRejected { block: 5, .. })
        ));
    }

    #[test]
    fn test_trailer_is_never_written() {
        let card = MemoryCard::default();
        let mut session = connected(&card);
        assert_eq!(session.try_write_block(7, "x"), Err(SessionError::TrailerBlock(7)));
        assert!(card.writes().is_empty());
    }

    #[test]
    fn test_out_of_range() {
        let card = MemoryCard::with_layout(SIMULATED_READER, CardLayout::MINI);
        let mut session = connected(&card).with_layout(CardLayout::MINI);
        assert_eq!(
            session.try_write_block(20, "x"),
            Err(SessionError::OutOfRange { block: 20, capacity: 20 })
        );
    }

    #[test]
    fn test_read_failure_marker() {
        let card = MemoryCard::default();
        card.fail_reads_at(1);
        let mut session = connected(&card);
        assert_eq!(session.read_block(1), Err(SessionError::ReadFailed));
        assert_eq!(session.read_block_text(1), READ_FAILED_MARKER);
    }

    #[test]
    fn test_empty_read_is_read_failure() {
        let card = MemoryCard::default();
        card.set_block(4, b"Coffee:2");
        card.empty_reads_at(4);
        let mut session = connected(&card);
        assert_eq!(session.read_block(4), Err(SessionError::ReadFailed));
        assert_eq!(session.read_block_raw(4), Err(SessionError::ReadFailed));
        assert_eq!(session.read_block_text(4), READ_FAILED_MARKER);
    }

    #[test]
    fn test_read_strips_hex_dump() {
        let card = MemoryCard::default().with_hex_dump();
        card.set_block(4, &[b'A', b'l', 0x00, 0x07]);
        let mut session = connected(&card);
        assert!(session.read_block_raw(4).unwrap().contains("[Hex:"));
        assert_eq!(session.read_block(4).unwrap(), "Al");
    }

    #[test]
    fn test_read_blank_block() {
        let card = MemoryCard::default();
        let mut session = connected(&card);
        assert_eq!(session.read_block(6).unwrap(), "");
    }

    #[test]
    fn test_native_error_string_passes_through() {
        let card = MemoryCard::default();
        card.set_block(4, b"ERROR: Auth fail");
        let mut session = connected(&card);
        assert_eq!(
            session.read_block(4),
            Err(SessionError::ReadRejected("ERROR: Auth fail".to_string()))
        );
        assert_eq!(session.read_block_text(4), "ERROR: Auth fail");
    }

    #[test]
    fn test_wrong_key() {
        let card = MemoryCard::default().with_key(AuthenticationKey::new([1, 2, 3, 4, 5, 6]));
        let mut session = connected(&card);
        assert_eq!(session.read_block(4), Err(SessionError::ReadFailed));
        assert!(!session.write_block(4, "x"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let card = MemoryCard::default();
        let mut session = connected(&card);
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(card.cleanups(), 1);
        assert_eq!(session.read_block(4), Err(SessionError::Closed));
        assert_eq!(session.connect(), Err(SessionError::Closed));
        drop(session);
        assert_eq!(card.cleanups(), 1);
    }

    #[test]
    fn test_close_without_connect() {
        let card = MemoryCard::default().without_card();
        let mut session = session(&card);
        let _ = session.connect();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(card.cleanups(), 1);
    }

    #[test]
    fn test_drop_closes() {
        let card = MemoryCard::default();
        {
            let _session = connected(&card);
        }
        assert!(!card.is_connected());
        assert_eq!(card.cleanups(), 1);
    }
}
