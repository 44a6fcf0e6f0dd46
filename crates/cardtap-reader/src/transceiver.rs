//! Bridge from an APDU channel to the card decoder.

use cardtap_emv::{ApduProvider, CommunicationError};
use cardtap_hardware::ApduChannel;
use tracing::trace;

/// Exposes an [`ApduChannel`] as the decoder's [`ApduProvider`].
///
/// Transport errors become [`CommunicationError`]s so the decoder never sees
/// a channel type. The adapter borrows the channel; closing it stays with
/// whoever opened it.
pub struct TransceiverAdapter<'a, C> {
    channel: &'a mut C,
}

impl<'a, C: ApduChannel> TransceiverAdapter<'a, C> {
    pub fn new(channel: &'a mut C) -> Self {
        Self { channel }
    }
}

impl<C: ApduChannel> ApduProvider for TransceiverAdapter<'_, C> {
    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>, CommunicationError> {
        self.channel.transceive(command).await.map_err(|e| {
            trace!(error = %e, "APDU exchange failed");
            CommunicationError::new(e.to_string())
        })
    }

    /// Historical bytes for NFC-A tags, the higher layer response for
    /// NFC-B tags, or nothing.
    fn historical_bytes(&self) -> Vec<u8> {
        self.channel
            .historical_bytes()
            .or_else(|| self.channel.hi_layer_response())
            .map(<[u8]>::to_vec)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtap_hardware::mock::MockApduChannel;

    const SELECT_PPSE: &[u8] = &[
        0x00, 0xA4, 0x04, 0x00, 0x0E, b'2', b'P', b'A', b'Y', b'.', b'S', b'Y', b'S', b'.', b'D',
        b'D', b'F', b'0', b'1', 0x00,
    ];

    #[tokio::test]
    async fn test_forwards_exchanges() {
        let mut channel = MockApduChannel::new().respond(SELECT_PPSE, &[0x6F, 0x00, 0x90, 0x00]);
        let probe = channel.probe();

        let mut adapter = TransceiverAdapter::new(&mut channel);
        let response = adapter.transceive(SELECT_PPSE).await.unwrap();

        assert_eq!(response, vec![0x6F, 0x00, 0x90, 0x00]);
        assert_eq!(probe.commands(), vec![SELECT_PPSE.to_vec()]);
    }

    #[tokio::test]
    async fn test_transport_error_becomes_communication_error() {
        let mut channel = MockApduChannel::new().fail_at_exchange(0);
        let mut adapter = TransceiverAdapter::new(&mut channel);

        let error = adapter.transceive(SELECT_PPSE).await.unwrap_err();
        assert!(error.message().contains("Tag was lost"));
    }

    #[test]
    fn test_historical_bytes_preferred() {
        let mut channel = MockApduChannel::new()
            .with_historical_bytes(&[0x80, 0x73])
            .with_hi_layer_response(&[0x01]);
        assert_eq!(TransceiverAdapter::new(&mut channel).historical_bytes(), vec![0x80, 0x73]);
    }

    #[test]
    fn test_hi_layer_response_fallback() {
        let mut channel = MockApduChannel::new().with_hi_layer_response(&[0x01, 0x02]);
        assert_eq!(TransceiverAdapter::new(&mut channel).historical_bytes(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_no_protocol_bytes_is_empty() {
        let mut channel = MockApduChannel::new();
        assert!(TransceiverAdapter::new(&mut channel).historical_bytes().is_empty());
    }
}
