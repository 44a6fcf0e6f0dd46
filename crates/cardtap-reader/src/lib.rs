//! Contactless tag reading engine.
//!
//! Turns a presented [`TagHandle`](cardtap_core::TagHandle) into exactly one
//! [`ReadingResult`](cardtap_core::ReadingResult):
//!
//! - [`detector`] picks a reading strategy from the tag's technology markers
//! - [`sector`] dumps MIFARE Classic sectors over a block channel
//! - [`transceiver`] hands an APDU channel to the EMV card decoder
//! - [`orchestrator`] runs one reading and owns the channel's lifetime
//! - [`dispatcher`] runs readings in background tasks and queues their results
//!
//! # Examples
//!
//! ```
//! use cardtap_core::{ReadingResult, TagHandle};
//! use cardtap_core::constants::{TECH_MIFARE_CLASSIC, TECH_NFC_A};
//! use cardtap_hardware::mock::{MockBlockChannel, MockChannelFactory};
//! use cardtap_hardware::types::MifareClassicLayout;
//! use cardtap_reader::ReadingOrchestrator;
//!
//! #[tokio::main]
//! async fn main() {
//!     let uid = vec![0x04, 0x5A, 0x6B, 0x7C];
//!     let card = MockBlockChannel::new(MifareClassicLayout::Classic1K).with_text_block(1, "Hello");
//!     let factory = MockChannelFactory::new().with_block_card(uid.clone(), card);
//!
//!     let tag = TagHandle::new(uid, [TECH_NFC_A, TECH_MIFARE_CLASSIC]).unwrap();
//!     let result = ReadingOrchestrator::new(factory).read_tag(&tag).await;
//!
//!     let ReadingResult::MemoryCard(reading) = result else { panic!("not a memory card") };
//!     assert_eq!(reading.sector_count(), 16);
//!     assert_eq!(reading.sectors()[0].blocks()[1].text(), "Hello");
//! }
//! ```

pub mod config;
pub mod detector;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod sector;
pub mod transceiver;

pub use config::ReaderConfig;
pub use detector::{DetectionPriority, classify};
pub use dispatcher::{CompletedReading, ReadingDispatcher, ReadingResults, ResultSink};
pub use error::{ConfigError, Result};
pub use orchestrator::ReadingOrchestrator;
pub use sector::SectorReader;
pub use transceiver::TransceiverAdapter;
