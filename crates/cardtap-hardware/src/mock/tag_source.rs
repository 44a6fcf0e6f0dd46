//! Mock tag source for testing and development.
//!
//! This module provides a simulated reader field that can be controlled
//! programmatically: tests register tags with a handle and present them, and
//! the source yields a fresh [`TagHandle`] for each presentation.

use crate::{ChannelError, Result, traits::TagSource, types::ReaderInfo};
use cardtap_core::TagHandle;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Capacity of the presentation queue.
const PRESENTATION_QUEUE: usize = 32;

/// Mock tag source.
///
/// # Examples
///
/// ```
/// use cardtap_hardware::mock::MockTagSource;
/// use cardtap_hardware::traits::TagSource;
/// use cardtap_core::constants::{TECH_MIFARE_CLASSIC, TECH_NFC_A};
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let (mut source, mut handle) = MockTagSource::new();
///
///     let uid = vec![0x04, 0xAB, 0xCD, 0xEF];
///     handle.add_tag(uid.clone(), [TECH_NFC_A, TECH_MIFARE_CLASSIC]);
///     handle.present_tag(&uid).await?;
///
///     let tag = source.next_tag().await?;
///     assert_eq!(tag.uid_hex(), "04ABCDEF");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTagSource {
    tag_rx: mpsc::Receiver<TagHandle>,
    name: String,
}

impl MockTagSource {
    /// Create a mock source with the default reader name.
    pub fn new() -> (Self, MockTagSourceHandle) {
        Self::with_name("Mock NFC Reader")
    }

    /// Create a mock source with a custom reader name.
    pub fn with_name(name: impl Into<String>) -> (Self, MockTagSourceHandle) {
        let name = name.into();
        let (tag_tx, tag_rx) = mpsc::channel(PRESENTATION_QUEUE);

        let source = Self {
            tag_rx,
            name: name.clone(),
        };
        let handle = MockTagSourceHandle {
            tag_tx,
            name,
            tags: HashMap::new(),
            current_tag: None,
        };

        (source, handle)
    }
}

impl TagSource for MockTagSource {
    async fn next_tag(&mut self) -> Result<TagHandle> {
        self.tag_rx
            .recv()
            .await
            .ok_or_else(|| ChannelError::disconnected("mock tag source closed"))
    }

    fn reader_info(&self) -> ReaderInfo {
        ReaderInfo::new(
            self.name.clone(),
            vec!["ISO14443A".to_string(), "ISO14443B".to_string()],
        )
        .with_max_baud_rate(424000)
    }
}

/// Handle controlling a [`MockTagSource`].
///
/// Holds a database of known tags and the technology markers each one
/// advertises. Clones share the presentation queue but not the database.
#[derive(Debug, Clone)]
pub struct MockTagSourceHandle {
    tag_tx: mpsc::Sender<TagHandle>,
    name: String,
    tags: HashMap<Vec<u8>, Vec<String>>,
    current_tag: Option<Vec<u8>>,
}

impl MockTagSourceHandle {
    /// Register a tag and the technology markers it advertises.
    pub fn add_tag<I, S>(&mut self, uid: Vec<u8>, technologies: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags
            .insert(uid, technologies.into_iter().map(Into::into).collect());
    }

    /// Present a registered tag to the reader and return its new handle.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The UID is not registered or is not a valid tag identifier
    /// - The source has been dropped
    pub async fn present_tag(&mut self, uid: &[u8]) -> Result<TagHandle> {
        let technologies = self.tags.get(uid).ok_or_else(|| {
            ChannelError::invalid_data(format!("Tag {} not in database", hex::encode_upper(uid)))
        })?;

        let tag = TagHandle::new(uid.to_vec(), technologies.iter().cloned())
            .map_err(|e| ChannelError::invalid_data(e.to_string()))?;
        self.current_tag = Some(uid.to_vec());

        self.tag_tx
            .send(tag.clone())
            .await
            .map_err(|_| ChannelError::disconnected("mock tag source closed"))?;

        Ok(tag)
    }

    /// Simulate the current tag leaving the field.
    pub fn remove_tag(&mut self) {
        self.current_tag = None;
    }

    /// UID of the tag currently in the field, if any.
    pub fn current_tag_uid(&self) -> Option<&[u8]> {
        self.current_tag.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the number of registered tags.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}
