//! PC/SC contactless reader backend.
//!
//! Targets readers exposing tags through the PC/SC part 3 interface
//! (ACR122U and similar). MIFARE Classic sectors are reached through the
//! reader's pseudo-APDUs, ISO-DEP tags through plain APDU exchanges.
//!
//! The `pcsc` calls block, so every exchange runs on Tokio's blocking pool.
//! The connected [`Card`] is moved into the blocking task and handed back
//! when it finishes.

mod channels;
mod source;

pub use channels::{PcscApduChannel, PcscBlockChannel, PcscChannelFactory};
pub use source::PcscTagSource;

use crate::{ChannelError, Result};
use pcsc::{Card, Disposition, MAX_BUFFER_SIZE};
use tracing::{trace, warn};

/// Status word of a successful command.
pub(crate) const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

/// Reader pseudo-APDU returning the tag UID.
pub(crate) const GET_UID: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

impl From<pcsc::Error> for ChannelError {
    fn from(error: pcsc::Error) -> Self {
        match error {
            pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard => {
                ChannelError::communication("Tag was lost")
            }
            pcsc::Error::Timeout => ChannelError::timeout(0),
            pcsc::Error::ReaderUnavailable
            | pcsc::Error::UnknownReader
            | pcsc::Error::NoReadersAvailable
            | pcsc::Error::NoService
            | pcsc::Error::ServiceStopped => ChannelError::disconnected(error.to_string()),
            other => ChannelError::communication(other.to_string()),
        }
    }
}

/// Send one command and return the full response, status word included.
pub(crate) fn transmit(card: &Card, command: &[u8]) -> Result<Vec<u8>> {
    trace!(command = %hex::encode_upper(command), "PC/SC transmit");
    let mut buffer = [0u8; MAX_BUFFER_SIZE];
    let response = card.transmit(command, &mut buffer)?;
    trace!(response = %hex::encode_upper(response), "PC/SC receive");
    Ok(response.to_vec())
}

/// Split a response into its data and status word.
pub(crate) fn split_status(response: &[u8]) -> Result<(&[u8], [u8; 2])> {
    match response.len().checked_sub(2) {
        Some(split) => Ok((&response[..split], [response[split], response[split + 1]])),
        None => Err(ChannelError::invalid_data(format!(
            "response of {} bytes has no status word",
            response.len()
        ))),
    }
}

/// Connected card moved in and out of blocking tasks.
pub(crate) struct Connection {
    card: Option<Card>,
}

impl Connection {
    pub(crate) fn new(card: Card) -> Self {
        Self { card: Some(card) }
    }

    /// Run a blocking operation against the card.
    pub(crate) async fn run<T, F>(&mut self, operation: F) -> Result<T>
    where
        F: FnOnce(&Card) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let card = self
            .card
            .take()
            .ok_or_else(|| ChannelError::disconnected("PC/SC card connection closed"))?;

        let (card, result) = tokio::task::spawn_blocking(move || {
            let result = operation(&card);
            (card, result)
        })
        .await
        .map_err(|e| ChannelError::other(format!("PC/SC task failed: {e}")))?;

        self.card = Some(card);
        result
    }

    /// Disconnect, leaving the tag powered. Closing twice is a no-op.
    pub(crate) async fn close(&mut self) -> Result<()> {
        let Some(card) = self.card.take() else {
            return Ok(());
        };

        tokio::task::spawn_blocking(move || card.disconnect(Disposition::LeaveCard))
            .await
            .map_err(|e| ChannelError::other(format!("PC/SC task failed: {e}")))?
            .map_err(|(_, error)| {
                warn!(error = %error, "PC/SC disconnect failed");
                ChannelError::from(error)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_status() {
        let (data, sw) = split_status(&[0x01, 0x02, 0x90, 0x00]).unwrap();
        assert_eq!(data, &[0x01, 0x02]);
        assert_eq!(sw, SW_SUCCESS);

        let (data, sw) = split_status(&[0x63, 0x00]).unwrap();
        assert!(data.is_empty());
        assert_eq!(sw, [0x63, 0x00]);

        assert!(split_status(&[0x90]).is_err());
    }

    #[test]
    fn test_pcsc_error_mapping() {
        assert!(matches!(
            ChannelError::from(pcsc::Error::RemovedCard),
            ChannelError::CommunicationError { .. }
        ));
        assert!(matches!(
            ChannelError::from(pcsc::Error::ReaderUnavailable),
            ChannelError::Disconnected { .. }
        ));
        assert!(matches!(
            ChannelError::from(pcsc::Error::Timeout),
            ChannelError::Timeout { .. }
        ));
    }
}
