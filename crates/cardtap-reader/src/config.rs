//! Engine configuration.
//!
//! Every field has a default, so an empty JSON object is a valid
//! configuration:
//!
//! ```json
//! {
//!   "detection_priority": "memory_card_first",
//!   "result_buffer": 32,
//!   "reader_name": "ACS ACR122U PICC Interface 00 00",
//!   "poll_interval_ms": 250
//! }
//! ```

use crate::detector::DetectionPriority;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default capacity of the result queue.
pub const DEFAULT_RESULT_BUFFER: usize = 32;

/// Default tag presence polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Configuration of the reading engine and its tag source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    /// Which reading strategy wins when a tag advertises several.
    pub detection_priority: DetectionPriority,

    /// Capacity of the queue between reading tasks and the result consumer.
    pub result_buffer: usize,

    /// PC/SC reader to use. The first reader found when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reader_name: Option<String>,

    /// How often the live tag source checks for a presented tag.
    pub poll_interval_ms: u64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            detection_priority: DetectionPriority::default(),
            result_buffer: DEFAULT_RESULT_BUFFER,
            reader_name: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ReaderConfig {
    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON or unknown fields and
    /// [`ConfigError::Invalid`] for out of range values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`ReaderConfig::from_json`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.result_buffer == 0 {
            return Err(ConfigError::invalid("result_buffer", "must be greater than 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("poll_interval_ms", "must be greater than 0"));
        }
        if self.reader_name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(ConfigError::invalid("reader_name", "must not be blank"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
