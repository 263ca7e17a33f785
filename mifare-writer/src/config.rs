//! Writer configuration
//!
//! Persistent JSON settings: which reader to use, the sector key, the card
//! geometry and where the article area starts.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::card::key::DEFAULT_KEY_HEX;
use crate::card::{
    AuthenticationKey, BlockAddress, CardLayout, KeyError, DEFAULT_START_BLOCK, FIRST_DATA_BLOCK,
};

/// Reader the writer was built for
pub const DEFAULT_READER_NAME: &str = "HID Global OMNIKEY 5422 Smartcard Reader [OMNIKEY 5422CL Smartcard Reader] (IM0P6H01EE) 00 00";

/// Default location of the vendor card library
pub const DEFAULT_LIBRARY_PATH: &str = "./libcard.so";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid key: {0}")]
    Key(#[from] KeyError),

    #[error("start block {0} is inside sector 0 (must be at least {FIRST_DATA_BLOCK})")]
    StartInReservedSector(BlockAddress),

    #[error("start block {start} is past the end of the card ({blocks} blocks)")]
    StartPastEnd { start: BlockAddress, blocks: BlockAddress },

    #[error("card size of {0} blocks exceeds the largest MIFARE Classic card ({max} blocks)", max = CardLayout::CLASSIC_4K.blocks)]
    CardTooLarge(BlockAddress),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settings for a writer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Exact PC/SC name of the reader
    pub reader_name: String,
    /// Sector key A as 12 hex digits
    pub key: String,
    /// First block of the article area
    pub start_block: BlockAddress,
    /// Total blocks on the card
    pub card_blocks: BlockAddress,
    /// Deadline for a single reader transaction
    pub timeout_ms: u64,
    /// Path of the vendor card library
    pub library_path: PathBuf,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            reader_name: DEFAULT_READER_NAME.to_string(),
            key: DEFAULT_KEY_HEX.to_string(),
            start_block: DEFAULT_START_BLOCK,
            card_blocks: CardLayout::CLASSIC_1K.blocks,
            timeout_ms: 5000,
            library_path: PathBuf::from(DEFAULT_LIBRARY_PATH),
        }
    }
}

impl WriterConfig {
    const CONFIG_FILE: &'static str = "config.json";

    /// Directory holding the config file
    ///
    /// `MIFARE_WRITER_CONFIG_DIR` wins, then the user config directory.
    pub fn default_dir() -> PathBuf {
        if let Ok(path) = std::env::var("MIFARE_WRITER_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join("mifare-writer");
        }
        PathBuf::from(".mifare-writer")
    }

    pub fn default_path() -> PathBuf {
        Self::default_dir().join(Self::CONFIG_FILE)
    }

    /// Load settings, falling back to defaults if the file is missing or broken
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    debug!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write settings, creating the directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check the settings before talking to a card
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.authentication_key()?;
        if self.card_blocks > CardLayout::CLASSIC_4K.blocks {
            return Err(ConfigError::CardTooLarge(self.card_blocks));
        }
        if self.start_block < FIRST_DATA_BLOCK {
            return Err(ConfigError::StartInReservedSector(self.start_block));
        }
        if self.start_block >= self.card_blocks {
            return Err(ConfigError::StartPastEnd {
                start: self.start_block,
                blocks: self.card_blocks,
            });
        }
        Ok(())
    }

    pub fn authentication_key(&self) -> Result<AuthenticationKey, KeyError> {
        AuthenticationKey::from_hex(&self.key)
    }

    pub fn layout(&self) -> CardLayout {
        CardLayout::new(self.card_blocks)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WriterConfig::default();
        assert_eq!(config.start_block, 8);
        assert_eq!(config.layout(), CardLayout::CLASSIC_1K);
        assert_eq!(config.authentication_key().unwrap(), AuthenticationKey::FACTORY);
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = WriterConfig::load(&temp_dir.path().join("config.json"));
        assert_eq!(config, WriterConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");

        let config = WriterConfig {
            reader_name: "ACS ACR122U PICC Interface 00 00".to_string(),
            start_block: 12,
            ..WriterConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(WriterConfig::load(&path), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{ "start_block": 16 }"#).unwrap();

        let config = WriterConfig::load(&path);
        assert_eq!(config.start_block, 16);
        assert_eq!(config.reader_name, DEFAULT_READER_NAME);
    }

    #[test]
    fn test_broken_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "not json").unwrap();
        assert_eq!(WriterConfig::load(&path), WriterConfig::default());
    }

    #[test]
    fn test_validate() {
        let config = WriterConfig {
            start_block: 2,
            ..WriterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::StartInReservedSector(2))
        ));

        let config = WriterConfig {
            start_block: 64,
            ..WriterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::StartPastEnd { .. })));

        let config = WriterConfig {
            card_blocks: 4_000_000_000,
            ..WriterConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::CardTooLarge(4_000_000_000))
        ));

        let config = WriterConfig {
            card_blocks: 256,
            start_block: 252,
            ..WriterConfig::default()
        };
        assert!(config.validate().is_ok());

        let config = WriterConfig {
            key: "FFFF".to_string(),
            ..WriterConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Key(_))));
    }
}
