//! Background reading tasks and the result queue.
//!
//! Each presented tag is read in its own Tokio task. Finished readings travel
//! through a bounded queue to whoever owns the [`ReadingResults`] receiver,
//! typically a UI loop that must never wait on channel I/O.
//!
//! ```text
//! ┌────────────┐  next_tag  ┌───────────────────┐ spawn ┌──────────────┐
//! │ TagSource  │──────────►│ ReadingDispatcher │──────►│ reading task │──┐
//! └────────────┘            └───────────────────┘       └──────────────┘  │
//!                                                        ┌──────────────┐  │  mpsc
//!                                                        │ reading task │──┤
//!                                                        └──────────────┘  ▼
//!                                                               ReadingResults ──► ResultSink
//! ```
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use cardtap_core::{ReadingResult, TagHandle};
//! use cardtap_hardware::mock::MockChannelFactory;
//! use cardtap_reader::{ReadingDispatcher, ReadingOrchestrator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Arc::new(ReadingOrchestrator::new(MockChannelFactory::new()));
//!     let (mut dispatcher, mut results) = ReadingDispatcher::new(orchestrator, 8);
//!
//!     dispatcher.dispatch(TagHandle::new(vec![0x04, 0x01, 0x02, 0x03], ["nfc-a"]).unwrap());
//!
//!     let completed = results.recv().await.unwrap();
//!     assert_eq!(completed.result, ReadingResult::UnsupportedTag);
//!     dispatcher.shutdown().await;
//! }
//! ```

use crate::orchestrator::ReadingOrchestrator;
use cardtap_core::{ReadingResult, TagHandle};
use cardtap_emv::{CardDecoder, EmvDecoder};
use cardtap_hardware::{ChannelFactory, TagSource};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A finished reading and the presentation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedReading {
    pub tag: TagHandle,
    pub result: ReadingResult,
}

/// Consumer of finished readings.
///
/// Implemented for every `FnMut(CompletedReading) + Send` closure.
pub trait ResultSink: Send {
    fn accept(&mut self, reading: CompletedReading);
}

impl<F> ResultSink for F
where
    F: FnMut(CompletedReading) + Send,
{
    fn accept(&mut self, reading: CompletedReading) {
        self(reading);
    }
}

/// Receiving end of the result queue.
#[derive(Debug)]
pub struct ReadingResults {
    rx: mpsc::Receiver<CompletedReading>,
}

impl ReadingResults {
    /// Wait for the next finished reading.
    ///
    /// Returns `None` once the dispatcher and every reading task are gone.
    pub async fn recv(&mut self) -> Option<CompletedReading> {
        self.rx.recv().await
    }

    /// Hand every reading to `sink` until the queue closes.
    ///
    /// Returns the number of readings forwarded.
    pub async fn forward_to<S: ResultSink>(mut self, sink: &mut S) -> usize {
        let mut forwarded = 0;
        while let Some(reading) = self.rx.recv().await {
            sink.accept(reading);
            forwarded += 1;
        }
        forwarded
    }
}

/// How a reading task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    /// Result was queued.
    Delivered,
    /// Result was dropped: the receiver is gone, or the queue stayed full
    /// until shutdown.
    Undelivered,
    /// Task was aborted.
    Cancelled,
    /// Task panicked.
    Panic,
}

/// Spawns one reading task per presented tag.
pub struct ReadingDispatcher<F, D = EmvDecoder> {
    orchestrator: Arc<ReadingOrchestrator<F, D>>,
    result_tx: mpsc::Sender<CompletedReading>,
    tasks: JoinSet<bool>,
    cancel: CancellationToken,
}

impl<F, D> ReadingDispatcher<F, D>
where
    F: ChannelFactory + 'static,
    D: CardDecoder + 'static,
{
    /// Create a dispatcher and the receiver of its results.
    ///
    /// `buffer` is the queue capacity; reading tasks wait when it is full.
    pub fn new(orchestrator: Arc<ReadingOrchestrator<F, D>>, buffer: usize) -> (Self, ReadingResults) {
        let (result_tx, rx) = mpsc::channel(buffer.max(1));
        let dispatcher = Self {
            orchestrator,
            result_tx,
            tasks: JoinSet::new(),
            cancel: CancellationToken::new(),
        };
        (dispatcher, ReadingResults { rx })
    }

    /// Start reading `tag` in the background.
    pub fn dispatch(&mut self, tag: TagHandle) {
        while let Some(finished) = self.tasks.try_join_next() {
            Self::log_termination(Self::classify_task_result(finished));
        }

        debug!(tag = %tag, in_flight = self.tasks.len(), "Dispatching reading");

        let orchestrator = Arc::clone(&self.orchestrator);
        let results = self.result_tx.clone();
        let cancel = self.cancel.child_token();
        self.tasks.spawn(async move {
            let result = orchestrator.read_tag_with_cancel(&tag, &cancel).await;
            tokio::select! {
                biased;
                sent = results.send(CompletedReading { tag, result }) => sent.is_ok(),
                () = cancel.cancelled() => false,
            }
        });
    }

    /// Readings spawned and not yet reaped.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Dispatch every tag `source` presents until `stop` fires.
    ///
    /// # Errors
    ///
    /// Returns the source's error if it can no longer deliver tags. Readings
    /// already dispatched keep running.
    pub async fn run<S: TagSource>(
        &mut self,
        source: &mut S,
        stop: &CancellationToken,
    ) -> cardtap_hardware::Result<()> {
        let reader = source.reader_info();
        info!(reader = %reader.name, "Waiting for tags");

        loop {
            tokio::select! {
                biased;
                () = stop.cancelled() => {
                    debug!("Tag loop stopped");
                    return Ok(());
                }
                tag = source.next_tag() => {
                    let tag = tag?;
                    info!(tag = %tag, "Tag presented");
                    self.dispatch(tag);
                }
            }
        }
    }

    /// Wait for every dispatched reading to finish.
    pub async fn wait_idle(&mut self) {
        while let Some(finished) = self.tasks.join_next().await {
            Self::log_termination(Self::classify_task_result(finished));
        }
    }

    /// Cancel in-flight readings and wait for them to end.
    ///
    /// A cancelled reading still delivers its `TransportFailure` result if the
    /// queue has room. Readings waiting on a full queue drop their result.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();

        let mut undelivered = 0;
        let mut panicked = 0;
        while let Some(finished) = self.tasks.join_next().await {
            match Self::classify_task_result(finished) {
                TaskTermination::Delivered | TaskTermination::Cancelled => {}
                TaskTermination::Undelivered => undelivered += 1,
                TaskTermination::Panic => panicked += 1,
            }
        }

        if panicked > 0 {
            error!(panicked, "Reading tasks panicked before shutdown");
        }
        if undelivered > 0 {
            warn!(undelivered, "Readings dropped at shutdown, result queue closed or full");
        }
        debug!("Dispatcher shut down");
    }

    fn classify_task_result(result: std::result::Result<bool, JoinError>) -> TaskTermination {
        match result {
            Ok(true) => TaskTermination::Delivered,
            Ok(false) => TaskTermination::Undelivered,
            Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
            Err(_) => TaskTermination::Panic,
        }
    }

    fn log_termination(termination: TaskTermination) {
        match termination {
            TaskTermination::Delivered | TaskTermination::Cancelled => {}
            TaskTermination::Undelivered => warn!("Reading result dropped"),
            TaskTermination::Panic => error!("Reading task panicked"),
        }
    }
}
