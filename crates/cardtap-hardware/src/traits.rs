//! Channel trait definitions.
//!
//! This module defines the contract between the reading engine and the
//! physical tag: a [`TagSource`] that reports presentations, a
//! [`ChannelFactory`] that opens a connected channel for one technology of a
//! presented tag, and the two channel forms, [`BlockChannel`] for sector/block
//! memory cards and [`ApduChannel`] for cards speaking command/response APDUs.
//!
//! Methods performing I/O return `impl Future + Send` rather than being
//! declared `async fn`, so a reading generic over these traits can still be
//! spawned onto the Tokio runtime. Implementations may use plain `async fn`.

use crate::error::Result;
use crate::types::{KeyType, ReaderInfo, SectorKey};
use cardtap_core::TagHandle;
use std::future::Future;

/// Block-addressed channel to a MIFARE Classic style memory card.
///
/// Authentication state is sector-scoped and order dependent: a successful
/// [`authenticate`](BlockChannel::authenticate) grants access to the blocks
/// of that sector until another sector is authenticated.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because its I/O methods return
/// `impl Future`. Use generics, or
/// [`AnyBlockChannel`](crate::devices::AnyBlockChannel) for runtime selection.
pub trait BlockChannel: Send {
    /// Number of sectors on the card.
    ///
    /// # Errors
    ///
    /// Returns an error if the card geometry is unknown.
    fn sector_count(&self) -> Result<u8>;

    /// Number of blocks in `sector`.
    ///
    /// # Errors
    ///
    /// Returns an error if `sector` is out of range.
    fn block_count_in_sector(&self, sector: u8) -> Result<u8>;

    /// Absolute index of the first block of `sector`.
    ///
    /// # Errors
    ///
    /// Returns an error if `sector` is out of range.
    fn sector_to_block(&self, sector: u8) -> Result<u16>;

    /// Authenticate `sector` with the given key.
    ///
    /// Returns `Ok(false)` when the card rejects the key. Only transport
    /// problems are reported as errors.
    fn authenticate(
        &mut self,
        sector: u8,
        key_type: KeyType,
        key: &SectorKey,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Read one 16 byte block. The block's sector must be authenticated.
    fn read_block(&mut self, block: u16) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Release the connection to the card.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Command/response channel to an ISO-DEP card.
///
/// # Object Safety and Dynamic Dispatch
///
/// See [`BlockChannel`]; use [`AnyApduChannel`](crate::devices::AnyApduChannel)
/// for runtime selection.
pub trait ApduChannel: Send {
    /// Send a command APDU and return the full response, status word included.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag left the field, the exchange timed out, or
    /// the command is longer than [`max_transceive_length`](ApduChannel::max_transceive_length).
    fn transceive(&mut self, command: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// Historical bytes from the ATS (ISO 14443 type A tags).
    fn historical_bytes(&self) -> Option<&[u8]>;

    /// Higher layer response from the ATTRIB answer (ISO 14443 type B tags).
    fn hi_layer_response(&self) -> Option<&[u8]>;

    /// Largest command, in bytes, a single exchange accepts.
    fn max_transceive_length(&self) -> usize;

    /// Release the connection to the card.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens connected channels to a presented tag.
///
/// A returned channel is connected and ready for I/O. A technology the tag
/// does not expose, or a tag that already left the field, is reported as
/// [`ChannelError::Absent`](crate::ChannelError::Absent).
pub trait ChannelFactory: Send + Sync {
    /// Memory card channel type.
    type Block: BlockChannel;

    /// APDU channel type.
    type Apdu: ApduChannel;

    /// Open a block channel to `tag`.
    fn open_block_channel(
        &self,
        tag: &TagHandle,
    ) -> impl Future<Output = Result<Self::Block>> + Send;

    /// Open an APDU channel to `tag`.
    fn open_apdu_channel(&self, tag: &TagHandle)
    -> impl Future<Output = Result<Self::Apdu>> + Send;
}

/// Source of tag presentations.
///
/// # Examples
///
/// ```no_run
/// use cardtap_hardware::traits::TagSource;
/// use cardtap_hardware::error::Result;
///
/// async fn wait_for_tag<S: TagSource>(source: &mut S) -> Result<String> {
///     println!("Present a card...");
///     let tag = source.next_tag().await?;
///     Ok(tag.uid_hex())
/// }
/// ```
pub trait TagSource: Send {
    /// Wait until a tag enters the field and return a fresh handle for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is disconnected.
    fn next_tag(&mut self) -> impl Future<Output = Result<TagHandle>> + Send;

    /// Reader metadata.
    fn reader_info(&self) -> ReaderInfo;
}
