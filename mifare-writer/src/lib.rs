//! MIFARE Classic article writer
//!
//! Writes a driver name and a list of `name:quantity` article records onto a
//! MIFARE Classic 1K card through a contactless reader, and reads them back.
//!
//! The card is reached through a [`CardTransport`]:
//! - [`LibCard`] loads the vendor card library at runtime
//! - `PcscTransport` (feature `pcsc`) speaks storage card APDUs over PC/SC
//! - [`MemoryCard`] keeps the card in memory for tests and simulation
//!
//! ```
//! use mifare_writer::{write_articles, ArticleRecord, AuthenticationKey, CardSession};
//! use mifare_writer::transport::{MemoryCard, SIMULATED_READER};
//!
//! let card = MemoryCard::new(SIMULATED_READER);
//! let mut session = CardSession::new(card.clone(), SIMULATED_READER, AuthenticationKey::FACTORY);
//! session.connect().unwrap();
//!
//! let records = vec![ArticleRecord::new("Coffee", 2), ArticleRecord::new("Tea", 5)];
//! let results = write_articles(&mut session, &records, 8);
//! assert!(results.iter().all(|r| r.is_ok()));
//! assert_eq!(card.text(9), "Tea:5");
//! ```

// Core modules
pub mod apdu;
pub mod card;
pub mod config;
pub mod error;
pub mod inventory;
pub mod session;
pub mod transport;
pub mod writer;

pub use card::{AuthenticationKey, BlockAddress, CardLayout};
pub use config::WriterConfig;
pub use error::{ConnectionError, SessionError};
pub use inventory::{ArticleLookup, Inventory};
pub use session::{CardSession, SessionState};
pub use transport::CardTransport;
#[cfg(unix)]
pub use transport::LibCard;
pub use transport::{MemoryCard, TimedTransport};
pub use writer::{
    read_driver_info, write_articles, write_driver_info, ArticleRecord, Outcome, WriteResult,
    WriteSummary,
};
