//! In-memory MIFARE Classic card
//!
//! Behaves like a reader with one card on it. Clones share the same card, so
//! a test can hand one handle to a session and inspect the card through
//! another.

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use super::{CardTransport, Status, TransportError, STATUS_ERROR, STATUS_OK};
use crate::card::block::{pad, render_with_hex};
use crate::card::layout::MANUFACTURER_BLOCK;
use crate::card::{decode, is_trailer, AuthenticationKey, BlockAddress, CardLayout, BLOCK_SIZE};

/// Reader name the simulated card answers to
pub const SIMULATED_READER: &str = "Simulated MIFARE Reader 00 00";

struct CardImage {
    readers: Vec<String>,
    listing: Option<String>,
    reader_error: Option<String>,
    card_present: bool,
    key: AuthenticationKey,
    blocks: Vec<[u8; BLOCK_SIZE]>,
    connected: Option<String>,
    hex_dump: bool,
    failing_reads: HashSet<BlockAddress>,
    empty_reads: HashSet<BlockAddress>,
    failing_writes: HashSet<BlockAddress>,
    reads: Vec<BlockAddress>,
    writes: Vec<(BlockAddress, Vec<u8>)>,
    last_error: String,
    cleanups: usize,
}

impl CardImage {
    fn fail(&mut self, msg: impl Into<String>) -> Status {
        self.last_error = msg.into();
        STATUS_ERROR
    }

    fn check_access(&mut self, key: &AuthenticationKey, block: BlockAddress) -> bool {
        if self.connected.is_none() {
            self.last_error = "Not connected".to_string();
            return false;
        }
        if !self.card_present {
            self.last_error = "Card removed".to_string();
            return false;
        }
        if block as usize >= self.blocks.len() {
            self.last_error = format!("Block {} out of range", block);
            return false;
        }
        if *key != self.key {
            self.last_error = format!("Authentication failed for block {}", block);
            return false;
        }
        true
    }
}

/// Simulated reader with a MIFARE Classic card
#[derive(Clone)]
pub struct MemoryCard {
    image: Arc<Mutex<CardImage>>,
}

impl MemoryCard {
    /// A 1K card with the factory key on a reader with the given name
    pub fn new(reader: impl Into<String>) -> Self {
        Self::with_layout(reader, CardLayout::CLASSIC_1K)
    }

    pub fn with_layout(reader: impl Into<String>, layout: CardLayout) -> Self {
        let image = CardImage {
            readers: vec![reader.into()],
            listing: None,
            reader_error: None,
            card_present: true,
            key: AuthenticationKey::FACTORY,
            blocks: vec![[0u8; BLOCK_SIZE]; layout.blocks as usize],
            connected: None,
            hex_dump: false,
            failing_reads: HashSet::new(),
            empty_reads: HashSet::new(),
            failing_writes: HashSet::new(),
            reads: Vec::new(),
            writes: Vec::new(),
            last_error: String::new(),
            cleanups: 0,
        };
        Self {
            image: Arc::new(Mutex::new(image)),
        }
    }

    /// Make reader enumeration fail with the given message
    pub fn with_reader_error(self, msg: impl Into<String>) -> Self {
        self.image.lock().reader_error = Some(msg.into());
        self
    }

    /// Enumerate readers as one raw text, the way the card library does
    pub fn with_listing(self, listing: impl Into<String>) -> Self {
        self.image.lock().listing = Some(listing.into());
        self
    }

    /// Start with no card on the reader
    pub fn without_card(self) -> Self {
        self.image.lock().card_present = false;
        self
    }

    /// Protect the card with a different key
    pub fn with_key(self, key: AuthenticationKey) -> Self {
        self.image.lock().key = key;
        self
    }

    /// Render reads like the card library, with a hex dump for non-text blocks
    pub fn with_hex_dump(self) -> Self {
        self.image.lock().hex_dump = true;
        self
    }

    pub fn fail_reads_at(&self, block: BlockAddress) {
        self.image.lock().failing_reads.insert(block);
    }

    /// Answer reads of `block` with no bytes at all
    pub fn empty_reads_at(&self, block: BlockAddress) {
        self.image.lock().empty_reads.insert(block);
    }

    pub fn fail_writes_at(&self, block: BlockAddress) {
        self.image.lock().failing_writes.insert(block);
    }

    pub fn remove_card(&self) {
        self.image.lock().card_present = false;
    }

    /// Overwrite a block directly, bypassing authentication
    pub fn set_block(&self, block: BlockAddress, data: &[u8]) {
        self.image.lock().blocks[block as usize] = pad(data);
    }

    pub fn block(&self, block: BlockAddress) -> [u8; BLOCK_SIZE] {
        self.image.lock().blocks[block as usize]
    }

    /// Decoded text of a block
    pub fn text(&self, block: BlockAddress) -> String {
        decode(&self.block(block))
    }

    /// Blocks read so far, in order
    pub fn reads(&self) -> Vec<BlockAddress> {
        self.image.lock().reads.clone()
    }

    /// Successful writes so far, in order
    pub fn writes(&self) -> Vec<(BlockAddress, Vec<u8>)> {
        self.image.lock().writes.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.image.lock().connected.is_some()
    }

    pub fn cleanups(&self) -> usize {
        self.image.lock().cleanups
    }
}

impl Default for MemoryCard {
    fn default() -> Self {
        Self::new(SIMULATED_READER)
    }
}

impl CardTransport for MemoryCard {
    fn list_readers(&mut self) -> Result<Vec<String>, TransportError> {
        let image = self.image.lock();
        match (&image.reader_error, &image.listing) {
            (Some(msg), _) => Err(TransportError(msg.clone())),
            (None, Some(listing)) => Ok(vec![listing.clone()]),
            (None, None) => Ok(image.readers.clone()),
        }
    }

    fn connect_reader(&mut self, reader: &str) -> Status {
        let mut image = self.image.lock();
        if !image.readers.iter().any(|r| r == reader) {
            return image.fail(format!("Unknown reader: {}", reader));
        }
        if !image.card_present {
            return image.fail("No card present");
        }
        image.connected = Some(reader.to_string());
        debug!("Simulated card connected on {}", reader);
        STATUS_OK
    }

    fn read_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
    ) -> Option<Vec<u8>> {
        let mut image = self.image.lock();
        if !image.check_access(key, block) {
            return None;
        }
        if image.failing_reads.contains(&block) {
            image.last_error = format!("Read of block {} failed", block);
            return None;
        }
        image.reads.push(block);
        if image.empty_reads.contains(&block) {
            return Some(Vec::new());
        }

        let data = image.blocks[block as usize];
        if image.hex_dump {
            Some(render_with_hex(&data).into_bytes())
        } else {
            Some(data.to_vec())
        }
    }

    fn write_block_string(
        &mut self,
        key: &AuthenticationKey,
        block: BlockAddress,
        payload: &[u8],
    ) -> Status {
        let mut image = self.image.lock();
        if !image.check_access(key, block) {
            return STATUS_ERROR;
        }
        if block == MANUFACTURER_BLOCK {
            return image.fail("Manufacturer block is read-only");
        }
        if image.failing_writes.contains(&block) {
            return image.fail(format!("Write of block {} failed", block));
        }
        if is_trailer(block) {
            debug!("Simulated card: writing sector trailer {}", block);
        }

        image.blocks[block as usize] = pad(payload);
        image.writes.push((block, payload.to_vec()));
        STATUS_OK
    }

    fn last_error(&mut self) -> String {
        self.image.lock().last_error.clone()
    }

    fn cleanup(&mut self) {
        let mut image = self.image.lock();
        image.connected = None;
        image.cleanups += 1;
    }
}
