//! Channel failures.
//!
//! Covers a technology that cannot be opened for a tag, a tag that left the
//! field, reader timeouts and malformed exchanges. A sector that rejects its
//! key is not an error: `authenticate` reports it as `Ok(false)`.

pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors raised while opening or talking to a tag channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The tag does not expose the requested technology.
    #[error("Technology not available: {technology}")]
    Absent { technology: String },

    /// Tag removed from the field, or the reader went away.
    #[error("Tag disconnected: {device}")]
    Disconnected { device: String },

    #[error("Operation timeout after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// A transceive or block command failed on the link.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Command or response bytes that do not fit the channel.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Reading cancelled")]
    Cancelled,

    /// Reader backend failure with no better category.
    #[error("{0}")]
    Other(String),
}

impl ChannelError {
    pub fn absent(technology: impl Into<String>) -> Self {
        Self::Absent {
            technology: technology.into(),
        }
    }

    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// `duration_ms` is 0 when the backend does not report how long it waited.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    /// True when the channel never opened, as opposed to failing once open.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::absent(ChannelError::absent("mifare-classic"), "Technology not available: mifare-classic")]
    #[case::disconnected(ChannelError::disconnected("ACR122U"), "Tag disconnected: ACR122U")]
    #[case::timeout(ChannelError::timeout(3000), "Operation timeout after 3000ms")]
    #[case::lost(ChannelError::communication("Tag was lost"), "Communication error: Tag was lost")]
    #[case::oversized(
        ChannelError::invalid_data("command exceeds 261 bytes"),
        "Invalid data: command exceeds 261 bytes"
    )]
    #[case::cancelled(ChannelError::Cancelled, "Reading cancelled")]
    #[case::backend(ChannelError::other("PC/SC task failed"), "PC/SC task failed")]
    fn test_channel_error_messages(#[case] error: ChannelError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[test]
    fn test_only_absent_counts_as_never_opened() {
        assert!(ChannelError::absent("iso-dep").is_absent());
        assert!(!ChannelError::disconnected("ACR122U").is_absent());
        assert!(!ChannelError::Cancelled.is_absent());
    }
}
