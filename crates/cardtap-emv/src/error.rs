use thiserror::Error;

/// The link to the card failed while decoding.
///
/// Raised by an [`ApduProvider`](crate::ApduProvider) so the decoder never
/// sees transport specific error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("communication with card failed: {message}")]
pub struct CommunicationError {
    message: String,
}

impl CommunicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a card could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The exchange itself failed; the card may have left the field.
    #[error(transparent)]
    Communication(#[from] CommunicationError),

    /// The card answered, but not with data the decoder understands.
    #[error("malformed card response: {0}")]
    Malformed(String),

    /// The card has no payment application the decoder supports.
    #[error("unsupported card: {0}")]
    UnsupportedCard(String),
}

impl DecodeError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedCard(message.into())
    }

    /// Returns `true` if the failure came from the transport.
    pub fn is_communication(&self) -> bool {
        matches!(self, Self::Communication(_))
    }
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_error_converts() {
        let error: DecodeError = CommunicationError::new("Tag was lost").into();
        assert!(error.is_communication());
        assert_eq!(
            error.to_string(),
            "communication with card failed: Tag was lost"
        );
    }

    #[test]
    fn test_decode_error_display() {
        assert_eq!(
            DecodeError::malformed("no status word").to_string(),
            "malformed card response: no status word"
        );
        assert!(!DecodeError::unsupported("no AID").is_communication());
    }
}
