//! Enum wrappers for reader backend dispatch.
//!
//! The channel traits return `impl Future` and are not object-safe, so
//! `Box<dyn ChannelFactory>` is not an option. These enums give concrete type
//! dispatch instead, selected at runtime by the binary (mock or PC/SC) and
//! monomorphized everywhere else.
//!
//! # Examples
//!
//! ```
//! use cardtap_hardware::devices::{AnyChannelFactory, AnyTagSource};
//! use cardtap_hardware::mock::{MockChannelFactory, MockTagSource};
//!
//! let (source, _handle) = MockTagSource::new();
//! let source = AnyTagSource::Mock(source);
//! let factory = AnyChannelFactory::Mock(MockChannelFactory::new());
//! ```

use crate::mock::{MockApduChannel, MockBlockChannel, MockChannelFactory, MockTagSource};
#[cfg(feature = "hardware-pcsc")]
use crate::pcsc_reader::{PcscApduChannel, PcscBlockChannel, PcscChannelFactory, PcscTagSource};
use crate::traits::{ApduChannel, BlockChannel, ChannelFactory, TagSource};
use crate::types::{KeyType, ReaderInfo, SectorKey};
use crate::Result;
use cardtap_core::TagHandle;

/// Enum wrapper for tag source dispatch.
#[non_exhaustive]
pub enum AnyTagSource {
    /// Mock source for development and testing.
    Mock(MockTagSource),

    /// PC/SC contactless reader.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscTagSource),
}

impl TagSource for AnyTagSource {
    async fn next_tag(&mut self) -> Result<TagHandle> {
        match self {
            Self::Mock(source) => source.next_tag().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(source) => source.next_tag().await,
        }
    }

    fn reader_info(&self) -> ReaderInfo {
        match self {
            Self::Mock(source) => source.reader_info(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(source) => source.reader_info(),
        }
    }
}

/// Enum wrapper for channel factory dispatch.
///
/// # Examples
///
/// ```
/// use cardtap_core::TagHandle;
/// use cardtap_core::constants::TECH_ISO_DEP;
/// use cardtap_hardware::devices::AnyChannelFactory;
/// use cardtap_hardware::mock::{MockApduChannel, MockChannelFactory};
/// use cardtap_hardware::traits::{ApduChannel, ChannelFactory};
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let uid = vec![0x08, 0x12, 0x34, 0x56];
///     let factory = AnyChannelFactory::Mock(
///         MockChannelFactory::new().with_apdu_card(uid.clone(), MockApduChannel::new()),
///     );
///
///     let tag = TagHandle::new(uid, [TECH_ISO_DEP]).unwrap();
///     let mut channel = factory.open_apdu_channel(&tag).await?;
///     channel.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub enum AnyChannelFactory {
    /// Mock factory for development and testing.
    Mock(MockChannelFactory),

    /// PC/SC contactless reader.
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscChannelFactory),
}

impl ChannelFactory for AnyChannelFactory {
    type Block = AnyBlockChannel;
    type Apdu = AnyApduChannel;

    async fn open_block_channel(&self, tag: &TagHandle) -> Result<AnyBlockChannel> {
        match self {
            Self::Mock(factory) => factory.open_block_channel(tag).await.map(AnyBlockChannel::Mock),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(factory) => factory.open_block_channel(tag).await.map(AnyBlockChannel::Pcsc),
        }
    }

    async fn open_apdu_channel(&self, tag: &TagHandle) -> Result<AnyApduChannel> {
        match self {
            Self::Mock(factory) => factory.open_apdu_channel(tag).await.map(AnyApduChannel::Mock),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(factory) => factory.open_apdu_channel(tag).await.map(AnyApduChannel::Pcsc),
        }
    }
}

/// Enum wrapper for block channel dispatch.
#[non_exhaustive]
pub enum AnyBlockChannel {
    Mock(MockBlockChannel),
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscBlockChannel),
}

impl BlockChannel for AnyBlockChannel {
    fn sector_count(&self) -> Result<u8> {
        match self {
            Self::Mock(channel) => channel.sector_count(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.sector_count(),
        }
    }

    fn block_count_in_sector(&self, sector: u8) -> Result<u8> {
        match self {
            Self::Mock(channel) => channel.block_count_in_sector(sector),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.block_count_in_sector(sector),
        }
    }

    fn sector_to_block(&self, sector: u8) -> Result<u16> {
        match self {
            Self::Mock(channel) => channel.sector_to_block(sector),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.sector_to_block(sector),
        }
    }

    async fn authenticate(&mut self, sector: u8, key_type: KeyType, key: &SectorKey) -> Result<bool> {
        match self {
            Self::Mock(channel) => channel.authenticate(sector, key_type, key).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.authenticate(sector, key_type, key).await,
        }
    }

    async fn read_block(&mut self, block: u16) -> Result<Vec<u8>> {
        match self {
            Self::Mock(channel) => channel.read_block(block).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.read_block(block).await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(channel) => channel.close().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.close().await,
        }
    }
}

/// Enum wrapper for APDU channel dispatch.
#[non_exhaustive]
pub enum AnyApduChannel {
    Mock(MockApduChannel),
    #[cfg(feature = "hardware-pcsc")]
    Pcsc(PcscApduChannel),
}

impl ApduChannel for AnyApduChannel {
    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::Mock(channel) => channel.transceive(command).await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.transceive(command).await,
        }
    }

    fn historical_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Mock(channel) => channel.historical_bytes(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.historical_bytes(),
        }
    }

    fn hi_layer_response(&self) -> Option<&[u8]> {
        match self {
            Self::Mock(channel) => channel.hi_layer_response(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.hi_layer_response(),
        }
    }

    fn max_transceive_length(&self) -> usize {
        match self {
            Self::Mock(channel) => channel.max_transceive_length(),
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.max_transceive_length(),
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Mock(channel) => channel.close().await,
            #[cfg(feature = "hardware-pcsc")]
            Self::Pcsc(channel) => channel.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockChannelFactory;
    use crate::types::MifareClassicLayout;
    use cardtap_core::constants::{KEY_MIFARE_APPLICATION_DIRECTORY, TECH_MIFARE_CLASSIC};

    #[tokio::test]
    async fn test_any_factory_dispatches_to_mock() {
        let uid = vec![0x04, 0x11, 0x22, 0x33];
        let card = MockBlockChannel::new(MifareClassicLayout::Classic1K).with_text_block(1, "HI");
        let probe = card.probe();
        let factory = AnyChannelFactory::Mock(MockChannelFactory::new().with_block_card(uid.clone(), card));

        let tag = TagHandle::new(uid, [TECH_MIFARE_CLASSIC]).unwrap();
        let mut channel = factory.open_block_channel(&tag).await.unwrap();
        assert_eq!(channel.sector_count().unwrap(), 16);
        assert!(
            channel
                .authenticate(0, KeyType::A, &KEY_MIFARE_APPLICATION_DIRECTORY)
                .await
                .unwrap()
        );
        assert_eq!(&channel.read_block(1).await.unwrap()[..2], b"HI");
        channel.close().await.unwrap();

        assert_eq!(probe.close_count(), 1);
        assert!(matches!(factory.open_apdu_channel(&tag).await, Err(e) if e.is_absent()));
    }

    #[tokio::test]
    async fn test_any_tag_source_dispatches_to_mock() {
        let (source, mut handle) = MockTagSource::with_name("Dispatch Reader");
        let mut source = AnyTagSource::Mock(source);
        assert_eq!(source.reader_info().name, "Dispatch Reader");

        let uid = vec![0x04, 0x11, 0x22, 0x33];
        handle.add_tag(uid.clone(), [TECH_MIFARE_CLASSIC]);
        handle.present_tag(&uid).await.unwrap();

        let tag = source.next_tag().await.unwrap();
        assert_eq!(tag.uid(), uid.as_slice());
    }
}
