//! Time-windowed batching over a raw fragment stream.
//!
//! [`BatchStream`] converts a per-fragment [`FragmentStream`] into a
//! sequence of [`BatchEvent`]s: non-empty batches gathered per time
//! window, then exactly one terminal event.
//!
//! # Timing
//!
//! Two timers race against fragment arrival inside one `select!`:
//!
//! - the **window** (an interval): when it ticks, a non-empty pending
//!   batch is emitted; an empty window emits nothing but still resets.
//! - the **deadline** (one-shot, from stream creation): when it fires
//!   before a terminal signal, the stream yields
//!   [`StreamFailure::Timeout`] and closes, discarding any pending
//!   fragments.
//!
//! The select is biased toward the fragment stream, so a terminal
//! signal that is already observable when the deadline fires wins;
//! otherwise the timeout wins. One winner, never both.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`StreamFailure::Timeout`] | `STREAM_TIMEOUT` | Yes |
//! | [`StreamFailure::Execution`] | `STREAM_EXECUTION` | No |

use std::mem;
use std::time::Duration;

use cord_types::{ErrorCode, OutputFragment};
use thiserror::Error;
use tokio::time::{interval_at, Instant, Interval};

use crate::channel::{ChannelEvent, FragmentStream};

/// Message used when the producer side vanishes without a terminal
/// signal.
pub(crate) const CLOSED_BEFORE_COMPLETION: &str = "output channel closed before completion";

/// Why a batched stream ended in failure.
///
/// This is the only error shape the delivery runner ever sees; all
/// engine-side failures are converted here at the batching boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFailure {
    /// The deadline elapsed before any terminal signal.
    #[error("execution timed out")]
    Timeout,

    /// The engine reported a failure, with its message text.
    #[error("{0}")]
    Execution(String),
}

impl ErrorCode for StreamFailure {
    fn code(&self) -> &'static str {
        match self {
            Self::Timeout => "STREAM_TIMEOUT",
            Self::Execution(_) => "STREAM_EXECUTION",
        }
    }

    fn is_recoverable(&self) -> bool {
        // A timeout may succeed on resubmission; an engine failure
        // means the code itself is at fault
        matches!(self, Self::Timeout)
    }
}

/// One event on a batched stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    /// A non-empty, ordered group of fragments from one window.
    Batch(Vec<OutputFragment>),

    /// Terminal success. Always the last event.
    Completed,

    /// Terminal failure. Always the last event.
    Failed(StreamFailure),
}

/// Windowed, deadline-bounded view over one submission's output.
///
/// Yields zero or more `Batch` events followed by exactly one
/// terminal event, then `None` forever. Fragments preserve emission
/// order across window boundaries.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use cord_runtime::{BatchEvent, BatchStream, ChannelRegistry};
/// use cord_types::SubmissionId;
///
/// # async fn demo(registry: &ChannelRegistry, id: SubmissionId) {
/// let stream = registry.subscribe(id).unwrap();
/// let mut batches = BatchStream::new(
///     stream,
///     Duration::from_secs(1),
///     Duration::from_secs(60),
/// );
/// while let Some(event) = batches.next().await {
///     match event {
///         BatchEvent::Batch(fragments) => println!("{} fragments", fragments.len()),
///         BatchEvent::Completed => println!("done"),
///         BatchEvent::Failed(failure) => println!("failed: {failure}"),
///     }
/// }
/// # }
/// ```
#[derive(Debug)]
pub struct BatchStream {
    events: FragmentStream,
    window: Interval,
    deadline: Instant,
    pending: Vec<OutputFragment>,
    /// Terminal event held back while a flushed partial batch goes
    /// out first.
    queued_terminal: Option<BatchEvent>,
    closed: bool,
}

impl BatchStream {
    /// Wraps a fragment stream with a batch window and an overall
    /// deadline, both measured from now.
    #[must_use]
    pub fn new(events: FragmentStream, window: Duration, deadline: Duration) -> Self {
        let start = Instant::now();
        Self {
            events,
            // interval_at: the first tick lands one full window from
            // now, not immediately
            window: interval_at(start + window, window),
            deadline: start + deadline,
            pending: Vec::new(),
            queued_terminal: None,
            closed: false,
        }
    }

    /// Waits for the next batch or terminal event.
    ///
    /// Returns `None` once a terminal event has been yielded.
    pub async fn next(&mut self) -> Option<BatchEvent> {
        if self.closed {
            return None;
        }
        if let Some(terminal) = self.queued_terminal.take() {
            self.closed = true;
            return Some(terminal);
        }
        loop {
            tokio::select! {
                biased;

                event = self.events.next_event() => match event {
                    Some(ChannelEvent::Fragment(fragment)) => self.pending.push(fragment),
                    Some(ChannelEvent::Completed) => {
                        return Some(self.flush_then(BatchEvent::Completed));
                    }
                    Some(ChannelEvent::Failed(message)) => {
                        return Some(
                            self.flush_then(BatchEvent::Failed(StreamFailure::Execution(message))),
                        );
                    }
                    None => {
                        return Some(self.flush_then(BatchEvent::Failed(
                            StreamFailure::Execution(CLOSED_BEFORE_COMPLETION.to_string()),
                        )));
                    }
                },

                _ = self.window.tick() => {
                    if !self.pending.is_empty() {
                        return Some(BatchEvent::Batch(mem::take(&mut self.pending)));
                    }
                }

                () = tokio::time::sleep_until(self.deadline) => {
                    self.pending.clear();
                    self.closed = true;
                    return Some(BatchEvent::Failed(StreamFailure::Timeout));
                }
            }
        }
    }

    /// Emits any pending partial batch before the terminal event.
    fn flush_then(&mut self, terminal: BatchEvent) -> BatchEvent {
        if self.pending.is_empty() {
            self.closed = true;
            terminal
        } else {
            self.queued_terminal = Some(terminal);
            BatchEvent::Batch(mem::take(&mut self.pending))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelRegistry;
    use cord_kernel::OutputGateway;
    use cord_types::{assert_error_codes, SubmissionId};

    const WINDOW: Duration = Duration::from_millis(20);
    const DEADLINE: Duration = Duration::from_millis(500);

    fn channel(registry: &ChannelRegistry) -> (SubmissionId, FragmentStream) {
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let stream = registry.subscribe(id).unwrap();
        (id, stream)
    }

    // === Windowing ===

    #[tokio::test]
    async fn fragments_in_one_window_form_one_batch() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.publish(id, OutputFragment::text("a"));
        registry.publish(id, OutputFragment::text("b"));

        let event = batches.next().await.unwrap();
        assert_eq!(
            event,
            BatchEvent::Batch(vec![
                OutputFragment::text("a"),
                OutputFragment::text("b"),
            ])
        );
    }

    #[tokio::test]
    async fn windows_split_slow_fragments() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.publish(id, OutputFragment::text("first"));
        let one = batches.next().await.unwrap();
        assert_eq!(one, BatchEvent::Batch(vec![OutputFragment::text("first")]));

        // next window: empty windows emit nothing, this fragment
        // arrives later and comes out in its own batch
        tokio::time::sleep(WINDOW * 3).await;
        registry.publish(id, OutputFragment::text("second"));
        let two = batches.next().await.unwrap();
        assert_eq!(two, BatchEvent::Batch(vec![OutputFragment::text("second")]));
    }

    // === Terminal behavior ===

    #[tokio::test]
    async fn completion_flushes_pending_then_completes() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.publish(id, OutputFragment::text("tail"));
        registry.complete(id);

        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Batch(vec![OutputFragment::text("tail")]))
        );
        assert_eq!(batches.next().await, Some(BatchEvent::Completed));
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn completion_without_output_completes_directly() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.complete(id);
        assert_eq!(batches.next().await, Some(BatchEvent::Completed));
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn failure_flushes_pending_and_carries_message() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.publish(id, OutputFragment::text("partial"));
        registry.fail(id, "compilation error");

        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Batch(vec![OutputFragment::text("partial")]))
        );
        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Failed(StreamFailure::Execution(
                "compilation error".into()
            )))
        );
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn vanished_producer_is_an_execution_failure() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, DEADLINE);

        registry.remove(id);
        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Failed(StreamFailure::Execution(
                CLOSED_BEFORE_COMPLETION.into()
            )))
        );
    }

    // === Deadline ===

    #[tokio::test]
    async fn deadline_fires_without_terminal_signal() {
        let registry = ChannelRegistry::new();
        let (_id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, Duration::from_millis(60));

        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Failed(StreamFailure::Timeout))
        );
        assert_eq!(batches.next().await, None);
    }

    #[tokio::test]
    async fn deadline_discards_pending_fragments() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        // window longer than deadline: the fragment never gets a tick
        let mut batches = BatchStream::new(stream, Duration::from_millis(200), Duration::from_millis(40));

        registry.publish(id, OutputFragment::text("never seen"));
        assert_eq!(
            batches.next().await,
            Some(BatchEvent::Failed(StreamFailure::Timeout))
        );
    }

    #[tokio::test]
    async fn queued_terminal_beats_the_deadline() {
        let registry = ChannelRegistry::new();
        let (id, stream) = channel(&registry);
        let mut batches = BatchStream::new(stream, WINDOW, Duration::from_millis(40));

        // terminal is queued before anyone polls; by the time next()
        // runs the deadline has also elapsed, but the biased select
        // observes the terminal first
        registry.complete(id);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(batches.next().await, Some(BatchEvent::Completed));
    }

    // === Errors ===

    #[test]
    fn error_codes() {
        assert_error_codes(
            &[
                StreamFailure::Timeout,
                StreamFailure::Execution("x".into()),
            ],
            "STREAM_",
        );
    }

    #[test]
    fn timeout_is_recoverable_execution_is_not() {
        assert!(StreamFailure::Timeout.is_recoverable());
        assert!(!StreamFailure::Execution("x".into()).is_recoverable());
    }
}
