//! Mock channel factory backed by registered cards.

use super::{MockApduChannel, MockBlockChannel};
use crate::{ChannelError, Result, traits::ChannelFactory};
use cardtap_core::TagHandle;
use cardtap_core::constants::{TECH_ISO_DEP, TECH_MIFARE_CLASSIC};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MockCard {
    block: Option<MockBlockChannel>,
    apdu: Option<MockApduChannel>,
}

/// Channel factory handing out clones of registered mock channels.
///
/// Cards are registered by UID. Opening a technology the card was not
/// registered with, or a UID that is unknown, fails with
/// [`ChannelError::Absent`].
///
/// # Examples
///
/// ```
/// use cardtap_core::TagHandle;
/// use cardtap_core::constants::TECH_MIFARE_CLASSIC;
/// use cardtap_hardware::mock::{MockBlockChannel, MockChannelFactory};
/// use cardtap_hardware::traits::ChannelFactory;
/// use cardtap_hardware::types::MifareClassicLayout;
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let uid = vec![0x04, 0xAB, 0xCD, 0xEF];
///     let factory = MockChannelFactory::new()
///         .with_block_card(uid.clone(), MockBlockChannel::new(MifareClassicLayout::Classic1K));
///
///     let tag = TagHandle::new(uid, [TECH_MIFARE_CLASSIC]).unwrap();
///     assert!(factory.open_block_channel(&tag).await.is_ok());
///     assert!(factory.open_apdu_channel(&tag).await.unwrap_err().is_absent());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockChannelFactory {
    cards: HashMap<Vec<u8>, MockCard>,
}

impl MockChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a memory card channel for `uid`.
    pub fn with_block_card(mut self, uid: Vec<u8>, channel: MockBlockChannel) -> Self {
        self.insert_block_card(uid, channel);
        self
    }

    /// Register an ISO-DEP channel for `uid`.
    pub fn with_apdu_card(mut self, uid: Vec<u8>, channel: MockApduChannel) -> Self {
        self.insert_apdu_card(uid, channel);
        self
    }

    pub fn insert_block_card(&mut self, uid: Vec<u8>, channel: MockBlockChannel) {
        self.cards.entry(uid).or_default().block = Some(channel);
    }

    pub fn insert_apdu_card(&mut self, uid: Vec<u8>, channel: MockApduChannel) {
        self.cards.entry(uid).or_default().apdu = Some(channel);
    }

    /// Forget a card, as if it left the field.
    pub fn remove_card(&mut self, uid: &[u8]) {
        self.cards.remove(uid);
    }

    /// Get the number of registered cards.
    pub fn card_count(&self) -> usize {
        self.cards.len()
    }
}

impl ChannelFactory for MockChannelFactory {
    type Block = MockBlockChannel;
    type Apdu = MockApduChannel;

    async fn open_block_channel(&self, tag: &TagHandle) -> Result<MockBlockChannel> {
        debug!(uid = %tag.uid_hex(), "Opening mock block channel");
        self.cards
            .get(tag.uid())
            .and_then(|card| card.block.clone())
            .ok_or_else(|| ChannelError::absent(TECH_MIFARE_CLASSIC))
    }

    async fn open_apdu_channel(&self, tag: &TagHandle) -> Result<MockApduChannel> {
        debug!(uid = %tag.uid_hex(), "Opening mock APDU channel");
        self.cards
            .get(tag.uid())
            .and_then(|card| card.apdu.clone())
            .ok_or_else(|| ChannelError::absent(TECH_ISO_DEP))
    }
}
