//! Mock MIFARE Classic channel.

use super::probe::{ChannelCall, MockChannelProbe};
use crate::{
    ChannelError, Result,
    traits::BlockChannel,
    types::{KeyType, MifareClassicLayout, SectorKey},
};
use cardtap_core::constants::{KEY_MIFARE_APPLICATION_DIRECTORY, MIFARE_BLOCK_SIZE};

/// Simulated MIFARE Classic card behind a block channel.
///
/// Every sector starts out readable with the MIFARE Application Directory
/// key A. Sectors can be locked, and transport failures can be injected on
/// a given authentication or block read. Like a real card, a block can only
/// be read while its sector is the one last authenticated.
///
/// # Examples
///
/// ```
/// use cardtap_hardware::mock::MockBlockChannel;
/// use cardtap_hardware::traits::BlockChannel;
/// use cardtap_hardware::types::{KeyType, MifareClassicLayout};
/// use cardtap_core::constants::KEY_MIFARE_APPLICATION_DIRECTORY;
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let mut channel = MockBlockChannel::new(MifareClassicLayout::Classic1K)
///         .with_text_block(4, "HELLO")
///         .lock_sector(2);
///
///     let key = KEY_MIFARE_APPLICATION_DIRECTORY;
///     assert!(channel.authenticate(1, KeyType::A, &key).await?);
///     assert_eq!(&channel.read_block(4).await?[..5], b"HELLO");
///     assert!(!channel.authenticate(2, KeyType::A, &key).await?);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockBlockChannel {
    layout: MifareClassicLayout,
    blocks: Vec<Vec<u8>>,

    /// Key A per sector; `None` rejects every key.
    keys: Vec<Option<SectorKey>>,

    auth_failure: Option<u8>,
    read_failure: Option<u16>,

    /// Sector currently authenticated.
    authenticated: Option<u8>,
    closed: bool,
    probe: MockChannelProbe,
}

impl MockBlockChannel {
    /// Create a zero-filled card with every sector open to the default key.
    pub fn new(layout: MifareClassicLayout) -> Self {
        Self {
            layout,
            blocks: vec![vec![0u8; MIFARE_BLOCK_SIZE]; usize::from(layout.block_count())],
            keys: vec![Some(KEY_MIFARE_APPLICATION_DIRECTORY); usize::from(layout.sector_count())],
            auth_failure: None,
            read_failure: None,
            authenticated: None,
            closed: false,
            probe: MockChannelProbe::default(),
        }
    }

    /// Set the contents of one block, zero-padded or truncated to 16 bytes.
    pub fn with_block(mut self, block: u16, data: &[u8]) -> Self {
        if let Some(slot) = self.blocks.get_mut(usize::from(block)) {
            let len = data.len().min(MIFARE_BLOCK_SIZE);
            slot.fill(0);
            slot[..len].copy_from_slice(&data[..len]);
        }
        self
    }

    /// Set the contents of one block from text.
    pub fn with_text_block(self, block: u16, text: &str) -> Self {
        self.with_block(block, text.as_bytes())
    }

    /// Replace key A of a sector.
    pub fn with_sector_key(mut self, sector: u8, key: SectorKey) -> Self {
        if let Some(slot) = self.keys.get_mut(usize::from(sector)) {
            *slot = Some(key);
        }
        self
    }

    /// Make a sector reject every key.
    pub fn lock_sector(mut self, sector: u8) -> Self {
        if let Some(slot) = self.keys.get_mut(usize::from(sector)) {
            *slot = None;
        }
        self
    }

    /// Fail with a transport error when `sector` is authenticated.
    pub fn fail_auth_at(mut self, sector: u8) -> Self {
        self.auth_failure = Some(sector);
        self
    }

    /// Fail with a transport error when `block` is read.
    pub fn fail_read_at(mut self, block: u16) -> Self {
        self.read_failure = Some(block);
        self
    }

    /// Probe observing this channel and all its clones.
    pub fn probe(&self) -> MockChannelProbe {
        self.probe.clone()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(ChannelError::disconnected("mock block channel closed"));
        }
        Ok(())
    }
}

impl BlockChannel for MockBlockChannel {
    fn sector_count(&self) -> Result<u8> {
        Ok(self.layout.sector_count())
    }

    fn block_count_in_sector(&self, sector: u8) -> Result<u8> {
        self.layout
            .blocks_in_sector(sector)
            .ok_or_else(|| ChannelError::invalid_data(format!("sector {sector} out of range")))
    }

    fn sector_to_block(&self, sector: u8) -> Result<u16> {
        self.layout
            .first_block(sector)
            .ok_or_else(|| ChannelError::invalid_data(format!("sector {sector} out of range")))
    }

    async fn authenticate(&mut self, sector: u8, key_type: KeyType, key: &SectorKey) -> Result<bool> {
        self.ensure_open()?;
        self.probe.record(ChannelCall::Authenticate(sector));

        if self.auth_failure == Some(sector) {
            self.authenticated = None;
            return Err(ChannelError::communication("Tag was lost"));
        }

        let stored = self
            .keys
            .get(usize::from(sector))
            .ok_or_else(|| ChannelError::invalid_data(format!("sector {sector} out of range")))?;

        let accepted = key_type == KeyType::A && stored.as_ref() == Some(key);
        self.authenticated = accepted.then_some(sector);
        Ok(accepted)
    }

    async fn read_block(&mut self, block: u16) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.probe.record(ChannelCall::ReadBlock(block));

        if self.read_failure == Some(block) {
            return Err(ChannelError::communication("Transceive failed"));
        }

        let sector = self
            .layout
            .sector_of_block(block)
            .ok_or_else(|| ChannelError::invalid_data(format!("block {block} out of range")))?;

        if self.authenticated != Some(sector) {
            return Err(ChannelError::communication(format!(
                "block {block} read without authenticating sector {sector}"
            )));
        }

        Ok(self.blocks[usize::from(block)].clone())
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.record(ChannelCall::Close);
        self.closed = true;
        self.authenticated = None;
        Ok(())
    }
}
