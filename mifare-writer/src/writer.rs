//! Record writer
//!
//! Serializes driver information and article records onto a card through a
//! connected [`CardSession`].
//!
//! Layout:
//! - block 1 and 2: driver name, 16 characters each
//! - from the start block on: one `<name>:<quantity>` record per block,
//!   skipping sector trailers

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use thiserror::Error;

use crate::card::{encode, next_writable, BlockAddress, DRIVER_BLOCK_1, DRIVER_BLOCK_2};
use crate::error::Result;
use crate::session::CardSession;
use crate::transport::CardTransport;

/// Characters of the driver name stored per block
pub const DRIVER_PART_CHARS: usize = 16;

/// Longest driver name the two blocks hold
pub const DRIVER_NAME_MAX_CHARS: usize = 2 * DRIVER_PART_CHARS;

/// One article and how many of it were scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRecord {
    pub name: String,
    pub quantity: u32,
}

impl ArticleRecord {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
        }
    }

    /// Text stored on the card, before truncation to the block size
    pub fn to_block_text(&self) -> String {
        format!("{}:{}", self.name, self.quantity)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("expected <name>:<quantity>, got {0:?}")]
    MissingQuantity(String),

    #[error("invalid quantity in {0:?}")]
    InvalidQuantity(String),

    #[error("article name is empty")]
    EmptyName,
}

impl FromStr for ArticleRecord {
    type Err = RecordParseError;

    /// Parse `<name>:<quantity>`; the name may itself contain colons
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, qty) = s
            .rsplit_once(':')
            .ok_or_else(|| RecordParseError::MissingQuantity(s.to_string()))?;
        let quantity: u32 = qty
            .trim()
            .parse()
            .map_err(|_| RecordParseError::InvalidQuantity(s.to_string()))?;
        if quantity == 0 {
            return Err(RecordParseError::InvalidQuantity(s.to_string()));
        }
        let name = name.trim();
        if name.is_empty() {
            return Err(RecordParseError::EmptyName);
        }
        Ok(Self::new(name, quantity))
    }
}

/// Outcome of a single block write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Fail,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Fail => f.write_str("FAIL"),
        }
    }
}

/// Record of one write attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// Target block, None once the batch ran out of block addresses
    pub block: Option<BlockAddress>,
    /// Text as written, truncated to the block size
    pub text: String,
    pub outcome: Outcome,
}

impl WriteResult {
    pub fn is_ok(&self) -> bool {
        self.outcome == Outcome::Ok
    }
}

impl fmt::Display for WriteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.block {
            Some(block) => write!(f, "Block {}: {} -> {}", block, self.text, self.outcome),
            None => write!(f, "No block: {} -> {}", self.text, self.outcome),
        }
    }
}

/// Aggregate of a batch, for "N/M articles written" reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteSummary {
    pub written: usize,
    pub total: usize,
}

impl WriteSummary {
    pub fn all_written(&self) -> bool {
        self.written == self.total
    }
}

impl From<&[WriteResult]> for WriteSummary {
    fn from(results: &[WriteResult]) -> Self {
        Self {
            written: results.iter().filter(|r| r.is_ok()).count(),
            total: results.len(),
        }
    }
}

impl fmt::Display for WriteSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} articles written", self.written, self.total)
    }
}

/// Split a driver name into the contents of block 1 and block 2
pub fn split_driver_name(name: &str) -> (String, String) {
    let first: String = name.chars().take(DRIVER_PART_CHARS).collect();
    let second: String = name
        .chars()
        .skip(DRIVER_PART_CHARS)
        .take(DRIVER_PART_CHARS)
        .collect();
    (first, second)
}

/// Write the driver name to blocks 1 and 2
///
/// Both blocks are always attempted. A failure of either makes the result
/// false; the other block is not rolled back.
pub fn write_driver_info<T: CardTransport>(session: &mut CardSession<T>, name: &str) -> bool {
    let (first, second) = split_driver_name(name);
    let first_ok = session.write_block(DRIVER_BLOCK_1, &first);
    let second_ok = session.write_block(DRIVER_BLOCK_2, &second);

    if first_ok && second_ok {
        info!("Driver info written: {}", name);
    } else {
        warn!(
            "Driver info incomplete: block {} {}, block {} {}",
            DRIVER_BLOCK_1,
            if first_ok { "OK" } else { "FAIL" },
            DRIVER_BLOCK_2,
            if second_ok { "OK" } else { "FAIL" },
        );
    }
    first_ok && second_ok
}

/// Read the driver name back from blocks 1 and 2
///
/// A failed read of block 1 is returned as-is and block 2 is not read. A
/// failed read of block 2 contributes its marker text to the name, like any
/// other block content.
pub fn read_driver_info<T: CardTransport>(session: &mut CardSession<T>) -> Result<String> {
    let first = session.read_block(DRIVER_BLOCK_1)?;
    let second = match session.read_block(DRIVER_BLOCK_2) {
        Ok(text) => text,
        Err(e) if e.is_read_failure() => e.to_string(),
        Err(e) => return Err(e),
    };
    Ok(format!("{}{}", first, second).trim().to_string())
}

/// Write one block per record, starting at `start_block`
///
/// Records are placed in iteration order on consecutive data blocks; sector
/// trailers are skipped. A failed write is recorded and the batch goes on.
/// The result has exactly one entry per record. Records left over after the
/// last block address fail without a block.
///
/// `start_block` should be at least 4: sector 0 holds the manufacturer block
/// and the driver name.
pub fn write_articles<'a, T, I>(
    session: &mut CardSession<T>,
    records: I,
    start_block: BlockAddress,
) -> Vec<WriteResult>
where
    T: CardTransport,
    I: IntoIterator<Item = &'a ArticleRecord>,
{
    let mut results = Vec::new();
    let mut cursor = Some(start_block);

    for record in records {
        let block = cursor.and_then(next_writable);

        let full = record.to_block_text();
        let text = String::from_utf8_lossy(&encode(&full)).into_owned();
        let outcome = match block {
            Some(block) if session.write_block(block, &full) => Outcome::Ok,
            Some(_) => Outcome::Fail,
            None => {
                warn!("No block left for {}", record.name);
                Outcome::Fail
            }
        };

        let result = WriteResult {
            block,
            text,
            outcome,
        };
        info!("{}", result);
        results.push(result);
        cursor = block.and_then(|b| b.checked_add(1));
    }

    results
}
