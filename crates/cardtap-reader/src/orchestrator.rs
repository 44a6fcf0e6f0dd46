//! One full reading per tag presentation.
//!
//! The orchestrator classifies the tag, opens the matching channel, runs the
//! sector reader or the card decoder over it, closes the channel and folds
//! every outcome into a single [`ReadingResult`]. It never returns an error.
//!
//! ```text
//! TagHandle ──► classify ──┬─ MemoryCard ──────────► open block ──► SectorReader ──┐
//!                          ├─ ApplicationProtocol ─► open APDU ──► CardDecoder ───┤
//!                          └─ Unsupported ───────────────────────────────────────┤
//!                                                                    close ◄──────┘
//!                                                                      │
//!                                                                ReadingResult
//! ```

use crate::detector::{DetectionPriority, classify};
use crate::sector::SectorReader;
use crate::transceiver::TransceiverAdapter;
use cardtap_core::{CardSummary, ReadingResult, TagHandle, Technology, mask_card_number};
use cardtap_emv::{CardDecoder, DecodeError, DecodedCard, EmvDecoder};
use cardtap_hardware::{ApduChannel, BlockChannel, ChannelError, ChannelFactory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Drives readings for presented tags.
///
/// # Examples
///
/// ```
/// use cardtap_core::{ReadingResult, TagHandle};
/// use cardtap_hardware::mock::MockChannelFactory;
/// use cardtap_reader::ReadingOrchestrator;
///
/// #[tokio::main]
/// async fn main() {
///     let orchestrator = ReadingOrchestrator::new(MockChannelFactory::new());
///
///     let tag = TagHandle::new(vec![0x04, 0x01, 0x02, 0x03], ["nfc-a"]).unwrap();
///     assert_eq!(orchestrator.read_tag(&tag).await, ReadingResult::UnsupportedTag);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ReadingOrchestrator<F, D = EmvDecoder> {
    factory: F,
    decoder: D,
    priority: DetectionPriority,
}

impl<F: ChannelFactory> ReadingOrchestrator<F> {
    /// Orchestrator with the EMV decoder and the default detection priority.
    pub fn new(factory: F) -> Self {
        Self::with_decoder(factory, EmvDecoder::new())
    }
}

impl<F: ChannelFactory, D: CardDecoder> ReadingOrchestrator<F, D> {
    pub fn with_decoder(factory: F, decoder: D) -> Self {
        Self {
            factory,
            decoder,
            priority: DetectionPriority::default(),
        }
    }

    /// Set the order technologies are tried in.
    pub fn with_priority(mut self, priority: DetectionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn priority(&self) -> DetectionPriority {
        self.priority
    }

    /// Read `tag` to completion.
    pub async fn read_tag(&self, tag: &TagHandle) -> ReadingResult {
        self.read_tag_with_cancel(tag, &CancellationToken::new()).await
    }

    /// Read `tag`, stopping between sectors or before decoding once `cancel`
    /// fires. A cancelled reading ends as a transport failure.
    pub async fn read_tag_with_cancel(
        &self,
        tag: &TagHandle,
        cancel: &CancellationToken,
    ) -> ReadingResult {
        let technology = classify(tag.technologies(), self.priority);
        debug!(tag = %tag, %technology, priority = %self.priority, "Tag classified");

        let result = match technology {
            Technology::MemoryCard => self.read_memory_card(tag, cancel).await,
            Technology::ApplicationProtocol => self.read_application(tag, cancel).await,
            Technology::Unsupported => ReadingResult::UnsupportedTag,
        };

        match &result {
            ReadingResult::TransportFailure { reason } | ReadingResult::DecodeFailure { reason } => {
                info!(tag = %tag, %reason, "{}", result.status_line());
            }
            _ => info!(tag = %tag, "{}", result.status_line()),
        }
        result
    }

    async fn read_memory_card(&self, tag: &TagHandle, cancel: &CancellationToken) -> ReadingResult {
        let mut channel = match self.factory.open_block_channel(tag).await {
            Ok(channel) => channel,
            Err(e) => return open_failure(tag, &e),
        };
        debug!(tag = %tag, "Block channel opened");

        let outcome = SectorReader::new(cancel.clone()).read(&mut channel).await;

        if let Err(e) = channel.close().await {
            warn!(tag = %tag, error = %e, "Failed to close block channel");
        }

        match outcome {
            Ok(reading) => ReadingResult::MemoryCard(reading),
            Err(e) => ReadingResult::transport_failure(e.to_string()),
        }
    }

    async fn read_application(&self, tag: &TagHandle, cancel: &CancellationToken) -> ReadingResult {
        let mut channel = match self.factory.open_apdu_channel(tag).await {
            Ok(channel) => channel,
            Err(e) => return open_failure(tag, &e),
        };
        debug!(
            tag = %tag,
            max_transceive_length = channel.max_transceive_length(),
            "APDU channel opened"
        );

        let outcome = if cancel.is_cancelled() {
            None
        } else {
            let mut adapter = TransceiverAdapter::new(&mut channel);
            Some(self.decoder.read_card(&mut adapter).await)
        };

        if let Err(e) = channel.close().await {
            warn!(tag = %tag, error = %e, "Failed to close APDU channel");
        }

        match outcome {
            None => ReadingResult::transport_failure(ChannelError::Cancelled.to_string()),
            Some(Ok(card)) => ReadingResult::Card(summarize(card)),
            Some(Err(DecodeError::Communication(e))) => {
                ReadingResult::transport_failure(e.message())
            }
            Some(Err(e)) => ReadingResult::decode_failure(e.to_string()),
        }
    }
}

fn open_failure(tag: &TagHandle, error: &ChannelError) -> ReadingResult {
    debug!(tag = %tag, error = %error, absent = error.is_absent(), "Channel could not be opened");
    ReadingResult::transport_failure(error.to_string())
}

/// The only place a full card number is turned into its masked form.
fn summarize(card: DecodedCard) -> CardSummary {
    CardSummary {
        masked_number: mask_card_number(&card.pan),
        expiry: card.expiry,
        card_type: card.card_type,
    }
}
