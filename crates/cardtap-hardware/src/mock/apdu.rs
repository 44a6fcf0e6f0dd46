//! Mock ISO-DEP channel answering from a response script.

use super::probe::{ChannelCall, MockChannelProbe};
use crate::{ChannelError, Result, traits::ApduChannel};
use std::collections::HashMap;

/// Largest short APDU: header, Lc, 255 data bytes and Le.
pub const DEFAULT_MAX_TRANSCEIVE_LENGTH: usize = 261;

/// Status word answered to commands missing from the script (file not found).
const SW_FILE_NOT_FOUND: [u8; 2] = [0x6A, 0x82];

/// Simulated ISO-DEP card answering scripted responses.
///
/// Each command is looked up by its exact bytes. Commands not in the script
/// are answered with `6A82`. A transport failure can be injected on the
/// n-th exchange.
///
/// # Examples
///
/// ```
/// use cardtap_hardware::mock::MockApduChannel;
/// use cardtap_hardware::traits::ApduChannel;
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let mut channel = MockApduChannel::new()
///         .respond(&[0x00, 0xA4, 0x04, 0x00], &[0x90, 0x00])
///         .with_historical_bytes(&[0x80, 0x73]);
///
///     assert_eq!(channel.transceive(&[0x00, 0xA4, 0x04, 0x00]).await?, vec![0x90, 0x00]);
///     assert_eq!(channel.transceive(&[0x00, 0xB2, 0x01, 0x0C]).await?, vec![0x6A, 0x82]);
///     assert_eq!(channel.historical_bytes(), Some(&[0x80, 0x73][..]));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MockApduChannel {
    responses: HashMap<Vec<u8>, Vec<u8>>,
    fallback: Vec<u8>,
    historical_bytes: Option<Vec<u8>>,
    hi_layer_response: Option<Vec<u8>>,
    max_transceive_length: usize,

    /// Zero-based exchange that fails with a transport error.
    failure_at: Option<usize>,
    exchanges: usize,
    closed: bool,
    probe: MockChannelProbe,
}

impl MockApduChannel {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: SW_FILE_NOT_FOUND.to_vec(),
            historical_bytes: None,
            hi_layer_response: None,
            max_transceive_length: DEFAULT_MAX_TRANSCEIVE_LENGTH,
            failure_at: None,
            exchanges: 0,
            closed: false,
            probe: MockChannelProbe::default(),
        }
    }

    /// Answer `command` with `response`.
    pub fn respond(mut self, command: &[u8], response: &[u8]) -> Self {
        self.responses.insert(command.to_vec(), response.to_vec());
        self
    }

    /// Answer unscripted commands with `response` instead of `6A82`.
    pub fn with_fallback(mut self, response: &[u8]) -> Self {
        self.fallback = response.to_vec();
        self
    }

    pub fn with_historical_bytes(mut self, bytes: &[u8]) -> Self {
        self.historical_bytes = Some(bytes.to_vec());
        self
    }

    pub fn with_hi_layer_response(mut self, bytes: &[u8]) -> Self {
        self.hi_layer_response = Some(bytes.to_vec());
        self
    }

    pub fn with_max_transceive_length(mut self, length: usize) -> Self {
        self.max_transceive_length = length;
        self
    }

    /// Fail the `exchange`-th transceive (zero-based) with a transport error.
    pub fn fail_at_exchange(mut self, exchange: usize) -> Self {
        self.failure_at = Some(exchange);
        self
    }

    /// Probe observing this channel and all its clones.
    pub fn probe(&self) -> MockChannelProbe {
        self.probe.clone()
    }
}

impl Default for MockApduChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ApduChannel for MockApduChannel {
    async fn transceive(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        if self.closed {
            return Err(ChannelError::disconnected("mock APDU channel closed"));
        }
        self.probe.record(ChannelCall::Transceive(command.to_vec()));

        if command.len() > self.max_transceive_length {
            return Err(ChannelError::invalid_data(format!(
                "command of {} bytes exceeds {} byte limit",
                command.len(),
                self.max_transceive_length
            )));
        }

        let exchange = self.exchanges;
        self.exchanges += 1;
        if self.failure_at == Some(exchange) {
            return Err(ChannelError::communication("Tag was lost"));
        }

        Ok(self
            .responses
            .get(command)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn historical_bytes(&self) -> Option<&[u8]> {
        self.historical_bytes.as_deref()
    }

    fn hi_layer_response(&self) -> Option<&[u8]> {
        self.hi_layer_response.as_deref()
    }

    fn max_transceive_length(&self) -> usize {
        self.max_transceive_length
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.record(ChannelCall::Close);
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SELECT: [u8; 4] = [0x00, 0xA4, 0x04, 0x00];

    #[tokio::test]
    async fn test_mock_apdu_scripted_response() {
        let mut channel = MockApduChannel::new().respond(&SELECT, &[0x6F, 0x00, 0x90, 0x00]);
        let response = channel.transceive(&SELECT).await.unwrap();
        assert_eq!(response, vec![0x6F, 0x00, 0x90, 0x00]);
    }

    #[tokio::test]
    async fn test_mock_apdu_fallback() {
        let mut channel = MockApduChannel::new();
        assert_eq!(channel.transceive(&SELECT).await.unwrap(), vec![0x6A, 0x82]);

        let mut channel = MockApduChannel::new().with_fallback(&[0x6D, 0x00]);
        assert_eq!(channel.transceive(&SELECT).await.unwrap(), vec![0x6D, 0x00]);
    }

    #[tokio::test]
    async fn test_mock_apdu_failure_at_exchange() {
        let mut channel = MockApduChannel::new().fail_at_exchange(1);
        assert!(channel.transceive(&SELECT).await.is_ok());
        assert!(matches!(
            channel.transceive(&SELECT).await,
            Err(ChannelError::CommunicationError { .. })
        ));
        assert!(channel.transceive(&SELECT).await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_apdu_rejects_oversized_command() {
        let mut channel = MockApduChannel::new().with_max_transceive_length(8);
        let result = channel.transceive(&[0u8; 9]).await;
        assert!(matches!(result, Err(ChannelError::InvalidData { .. })));
    }

    #[tokio::test]
    async fn test_mock_apdu_protocol_bytes() {
        let channel = MockApduChannel::new();
        assert_eq!(channel.historical_bytes(), None);
        assert_eq!(channel.hi_layer_response(), None);

        let channel = MockApduChannel::new().with_hi_layer_response(&[0x00, 0x01]);
        assert_eq!(channel.hi_layer_response(), Some(&[0x00, 0x01][..]));
    }

    #[tokio::test]
    async fn test_mock_apdu_close() {
        let mut channel = MockApduChannel::new();
        let probe = channel.probe();

        channel.transceive(&SELECT).await.unwrap();
        channel.close().await.unwrap();

        assert!(channel.transceive(&SELECT).await.is_err());
        assert_eq!(probe.commands(), vec![SELECT.to_vec()]);
        assert_eq!(probe.close_count(), 1);
    }
}
