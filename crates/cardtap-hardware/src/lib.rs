//! Tag channel abstraction layer for the cardtap reading engine.
//!
//! This crate provides trait-based abstractions over an NFC reader: a source
//! of tag presentations and connected channels to the presented tag. The
//! engine is written against these traits, so mock implementations (for
//! development and testing) and real reader drivers are interchangeable.
//!
//! # Channel Traits
//!
//! - [`TagSource`] yields a fresh [`TagHandle`](cardtap_core::TagHandle)
//!   every time a tag enters the field.
//! - [`ChannelFactory`] opens a channel for one technology of a presented tag.
//! - [`BlockChannel`] reads MIFARE Classic style memory cards sector by sector.
//! - [`ApduChannel`] exchanges command/response APDUs with ISO-DEP cards.
//!
//! ```no_run
//! use cardtap_hardware::traits::{BlockChannel, ChannelFactory, TagSource};
//! use cardtap_hardware::types::KeyType;
//! use cardtap_hardware::error::Result;
//! use cardtap_core::constants::KEY_MIFARE_APPLICATION_DIRECTORY;
//!
//! async fn first_block<S: TagSource, F: ChannelFactory>(source: &mut S, factory: &F) -> Result<Vec<u8>> {
//!     let tag = source.next_tag().await?;
//!     let mut channel = factory.open_block_channel(&tag).await?;
//!     channel.authenticate(0, KeyType::A, &KEY_MIFARE_APPLICATION_DIRECTORY).await?;
//!     let data = channel.read_block(0).await;
//!     channel.close().await?;
//!     data
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a [`ChannelError`].
//! A rejected MIFARE key is not an error: `authenticate` returns `Ok(false)`.
//!
//! # Backends
//!
//! - [`mock`]: scripted tags and cards, always available.
//! - `pcsc_reader`: PC/SC contactless readers, behind the `hardware-pcsc`
//!   feature.
//!
//! [`TagSource`]: traits::TagSource
//! [`ChannelFactory`]: traits::ChannelFactory
//! [`BlockChannel`]: traits::BlockChannel
//! [`ApduChannel`]: traits::ApduChannel

pub mod atr;
pub mod devices;
pub mod error;
pub mod mock;
#[cfg(feature = "hardware-pcsc")]
pub mod pcsc_reader;
pub mod traits;
pub mod types;

pub use error::{ChannelError, Result};
pub use traits::{ApduChannel, BlockChannel, ChannelFactory, TagSource};
pub use types::{KeyType, MifareClassicLayout, ReaderInfo, SectorKey};
