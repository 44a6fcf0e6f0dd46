//! Call recording shared between a mock channel and its clones.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// One operation performed on a mock channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelCall {
    Authenticate(u8),
    ReadBlock(u16),
    Transceive(Vec<u8>),
    Close,
}

#[derive(Debug, Default)]
struct ProbeState {
    closes: AtomicUsize,
    calls: Mutex<Vec<ChannelCall>>,
}

/// Observes every call made on a mock channel.
///
/// A channel handed out by [`MockChannelFactory`](super::MockChannelFactory)
/// is a clone of the registered one, so tests keep a probe to inspect the
/// calls after the channel itself was consumed.
///
/// # Examples
///
/// ```
/// use cardtap_hardware::mock::{MockBlockChannel, ChannelCall};
/// use cardtap_hardware::traits::BlockChannel;
/// use cardtap_hardware::types::MifareClassicLayout;
///
/// #[tokio::main]
/// async fn main() -> cardtap_hardware::Result<()> {
///     let mut channel = MockBlockChannel::new(MifareClassicLayout::Mini);
///     let probe = channel.probe();
///
///     channel.close().await?;
///     assert_eq!(probe.close_count(), 1);
///     assert_eq!(probe.calls(), vec![ChannelCall::Close]);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockChannelProbe {
    inner: Arc<ProbeState>,
}

impl MockChannelProbe {
    pub(crate) fn record(&self, call: ChannelCall) {
        if call == ChannelCall::Close {
            self.inner.closes.fetch_add(1, Ordering::SeqCst);
        }
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    /// Number of times `close()` was called.
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::SeqCst)
    }

    /// Every call, in order.
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.inner
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Sectors passed to `authenticate()`, in call order.
    pub fn authenticated_sectors(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Authenticate(sector) => Some(sector),
                _ => None,
            })
            .collect()
    }

    /// Blocks passed to `read_block()`, in call order.
    pub fn read_blocks(&self) -> Vec<u16> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::ReadBlock(block) => Some(block),
                _ => None,
            })
            .collect()
    }

    /// Commands passed to `transceive()`, in call order.
    pub fn commands(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChannelCall::Transceive(command) => Some(command),
                _ => None,
            })
            .collect()
    }
}
