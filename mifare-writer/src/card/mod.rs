//! Card data model
//!
//! Block codec, sector layout and the authentication key of a MIFARE Classic
//! storage card.

pub mod block;
pub mod key;
pub mod layout;

pub use block::{decode, encode, BLOCK_SIZE};
pub use key::{AuthenticationKey, KeyError};
pub use layout::{
    is_trailer, next_writable, BlockAddress, CardLayout, DEFAULT_START_BLOCK, DRIVER_BLOCK_1,
    DRIVER_BLOCK_2, FIRST_DATA_BLOCK,
};
