//! Card data decoding for application-protocol (ISO-DEP) cards.
//!
//! The decoder only sees an [`ApduProvider`]: a way to exchange APDUs and
//! the card's historical bytes. It never touches a reader or a transport
//! error type, so it can be driven by any channel or by a test script.
//!
//! ```no_run
//! use cardtap_emv::{ApduProvider, CardDecoder, DecodeError, EmvDecoder};
//!
//! async fn account_tail<P: ApduProvider>(provider: &mut P) -> Result<String, DecodeError> {
//!     let card = EmvDecoder::new().read_card(provider).await?;
//!     Ok(card.pan[card.pan.len().saturating_sub(4)..].to_string())
//! }
//! ```

pub mod aid;
pub mod apdu;
pub mod decoder;
pub mod error;
pub mod tlv;

pub use decoder::{ApduProvider, CardDecoder, DecodedCard, EmvDecoder};
pub use error::{CommunicationError, DecodeError, Result};
