//! Output channel registry.
//!
//! The single shared mutable structure of the pipeline: a map from
//! [`SubmissionId`] to a live multi-producer/single-consumer stream
//! of output events. The producer side is the engine's callback
//! boundary ([`OutputGateway`]); the consumer side is the batching
//! stage, which takes the receiver exactly once via
//! [`ChannelRegistry::subscribe`].
//!
//! # Correlation
//!
//! Every gateway callback carries a submission id and is routed to
//! that id's slot only. A callback for an unknown or already
//! terminated id is an orphan: dropped and logged, never an error to
//! the producer, never cross-delivered.
//!
//! # Terminal Discipline
//!
//! The registry admits at most one terminal event per channel.
//! `complete`/`fail` after the first terminal, and `publish` after
//! any terminal, are ignored (logged at warn). The consumer therefore
//! observes exactly one terminal event, or none if the deadline fires
//! first.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`ChannelError::NotFound`] | `CHANNEL_NOT_FOUND` | No |
//! | [`ChannelError::AlreadyConsumed`] | `CHANNEL_ALREADY_CONSUMED` | No |

use std::collections::HashMap;
use std::sync::RwLock;

use cord_kernel::OutputGateway;
use cord_types::{ErrorCode, OutputFragment, SubmissionId};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// One event on an output channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// An output fragment, in emission order.
    Fragment(OutputFragment),

    /// Terminal success.
    Completed,

    /// Terminal failure with the engine's message text.
    Failed(String),
}

/// Consumer side of one submission's output channel.
///
/// Obtained once per submission via [`ChannelRegistry::subscribe`]
/// and wrapped by the batching stage.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl FragmentStream {
    /// Waits for the next channel event.
    ///
    /// Returns `None` only if the producer side vanished without a
    /// terminal event (the registry slot was removed).
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }
}

/// Channel registry error.
///
/// # Example
///
/// ```
/// use cord_runtime::ChannelError;
/// use cord_types::{ErrorCode, SubmissionId};
///
/// let err = ChannelError::NotFound(SubmissionId::new());
/// assert_eq!(err.code(), "CHANNEL_NOT_FOUND");
/// assert!(!err.is_recoverable());
/// ```
#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    /// No channel exists for this id.
    #[error("output channel not found: {0}")]
    NotFound(SubmissionId),

    /// The consumer side of this channel was already taken.
    ///
    /// Channels are single-consumer; a second `subscribe` indicates
    /// a bug in the dispatch path.
    #[error("output channel already consumed: {0}")]
    AlreadyConsumed(SubmissionId),
}

impl ErrorCode for ChannelError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "CHANNEL_NOT_FOUND",
            Self::AlreadyConsumed(_) => "CHANNEL_ALREADY_CONSUMED",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Per-submission slot state.
///
/// `rx` is `Some` until the consumer subscribes; `terminated` flips
/// when the first terminal event is admitted.
#[derive(Debug)]
struct Slot {
    tx: mpsc::UnboundedSender<ChannelEvent>,
    rx: Option<mpsc::UnboundedReceiver<ChannelEvent>>,
    terminated: bool,
}

impl Slot {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Some(rx),
            terminated: false,
        }
    }
}

/// Registry of per-submission output channels.
///
/// Implements [`OutputGateway`], making it the callback surface
/// handed to the execution engine. All operations on one id are
/// serialized by the registry lock; channels for different ids are
/// independent.
///
/// # Example
///
/// ```
/// use cord_kernel::OutputGateway;
/// use cord_runtime::ChannelRegistry;
/// use cord_types::{OutputFragment, SubmissionId};
///
/// let registry = ChannelRegistry::new();
/// let id = SubmissionId::new();
/// registry.get_or_create(id);
/// let _stream = registry.subscribe(id).unwrap();
/// registry.publish(id, OutputFragment::text("out"));
/// registry.complete(id);
/// ```
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    slots: RwLock<HashMap<SubmissionId, Slot>>,
}

impl ChannelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a channel exists for `id`.
    ///
    /// Idempotent: calling again with the same id keeps the existing
    /// channel, so a producer and a consumer may race to create it.
    pub fn get_or_create(&self, id: SubmissionId) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        slots.entry(id).or_insert_with(|| {
            debug!(%id, "output channel created");
            Slot::new()
        });
    }

    /// Takes the consumer side of `id`'s channel.
    ///
    /// # Errors
    ///
    /// [`ChannelError::NotFound`] for an unknown id;
    /// [`ChannelError::AlreadyConsumed`] if the consumer side was
    /// already taken.
    pub fn subscribe(&self, id: SubmissionId) -> Result<FragmentStream, ChannelError> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        let slot = slots.get_mut(&id).ok_or(ChannelError::NotFound(id))?;
        let rx = slot.rx.take().ok_or(ChannelError::AlreadyConsumed(id))?;
        Ok(FragmentStream { rx })
    }

    /// Removes `id`'s channel. Called by the delivery runner after
    /// the terminal notice. Unknown ids are a no-op.
    pub fn remove(&self, id: SubmissionId) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Returns `true` if a channel exists for `id`.
    #[must_use]
    pub fn contains(&self, id: SubmissionId) -> bool {
        self.slots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    /// Number of live channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if no channels exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn send_terminal(&self, id: SubmissionId, event: ChannelEvent) {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        match slots.get_mut(&id) {
            Some(slot) if !slot.terminated => {
                slot.terminated = true;
                if slot.tx.send(event).is_err() {
                    warn!(%id, "terminal signal after consumer went away");
                }
            }
            Some(_) => warn!(%id, "duplicate terminal signal ignored"),
            None => warn!(%id, "terminal signal for unknown channel ignored"),
        }
    }
}

impl OutputGateway for ChannelRegistry {
    fn publish(&self, id: SubmissionId, fragment: OutputFragment) {
        let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
        match slots.get(&id) {
            Some(slot) if !slot.terminated => {
                if slot.tx.send(ChannelEvent::Fragment(fragment)).is_err() {
                    warn!(%id, "fragment after consumer went away, dropped");
                }
            }
            Some(_) => warn!(%id, "fragment after terminal signal, dropped"),
            None => warn!(%id, "orphaned fragment for unknown channel, dropped"),
        }
    }

    fn complete(&self, id: SubmissionId) {
        self.send_terminal(id, ChannelEvent::Completed);
    }

    fn fail(&self, id: SubmissionId, message: &str) {
        self.send_terminal(id, ChannelEvent::Failed(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cord_types::assert_error_codes;

    // === Creation & subscription ===

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        registry.get_or_create(id);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn subscribe_unknown_id_fails() {
        let registry = ChannelRegistry::new();
        let err = registry.subscribe(SubmissionId::new()).unwrap_err();
        assert!(matches!(err, ChannelError::NotFound(_)));
    }

    #[tokio::test]
    async fn second_subscribe_fails() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let _stream = registry.subscribe(id).unwrap();
        let err = registry.subscribe(id).unwrap_err();
        assert!(matches!(err, ChannelError::AlreadyConsumed(_)));
    }

    // === Event flow ===

    #[tokio::test]
    async fn events_arrive_in_order() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let mut stream = registry.subscribe(id).unwrap();

        registry.publish(id, OutputFragment::text("a"));
        registry.publish(id, OutputFragment::text("b"));
        registry.complete(id);

        assert_eq!(
            stream.next_event().await,
            Some(ChannelEvent::Fragment(OutputFragment::text("a")))
        );
        assert_eq!(
            stream.next_event().await,
            Some(ChannelEvent::Fragment(OutputFragment::text("b")))
        );
        assert_eq!(stream.next_event().await, Some(ChannelEvent::Completed));
    }

    #[tokio::test]
    async fn fragments_never_cross_channels() {
        let registry = ChannelRegistry::new();
        let a = SubmissionId::new();
        let b = SubmissionId::new();
        registry.get_or_create(a);
        registry.get_or_create(b);
        let mut stream_a = registry.subscribe(a).unwrap();
        let mut stream_b = registry.subscribe(b).unwrap();

        registry.publish(a, OutputFragment::text("for a"));
        registry.publish(b, OutputFragment::text("for b"));
        registry.complete(a);
        registry.complete(b);

        assert_eq!(
            stream_a.next_event().await,
            Some(ChannelEvent::Fragment(OutputFragment::text("for a")))
        );
        assert_eq!(stream_a.next_event().await, Some(ChannelEvent::Completed));
        assert_eq!(
            stream_b.next_event().await,
            Some(ChannelEvent::Fragment(OutputFragment::text("for b")))
        );
        assert_eq!(stream_b.next_event().await, Some(ChannelEvent::Completed));
    }

    // === Orphans & terminal discipline ===

    #[tokio::test]
    async fn publish_to_unknown_id_is_silent() {
        let registry = ChannelRegistry::new();
        // must not panic or create a channel
        registry.publish(SubmissionId::new(), OutputFragment::text("late"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn events_after_terminal_are_dropped() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let mut stream = registry.subscribe(id).unwrap();

        registry.complete(id);
        registry.publish(id, OutputFragment::text("late"));
        registry.fail(id, "late failure");
        registry.complete(id);

        assert_eq!(stream.next_event().await, Some(ChannelEvent::Completed));
        // nothing further is queued; slot removal closes the stream
        registry.remove(id);
        assert_eq!(stream.next_event().await, None);
    }

    #[tokio::test]
    async fn fail_carries_message() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let mut stream = registry.subscribe(id).unwrap();

        registry.fail(id, "kaboom");
        assert_eq!(
            stream.next_event().await,
            Some(ChannelEvent::Failed("kaboom".into()))
        );
    }

    #[tokio::test]
    async fn remove_closes_the_stream() {
        let registry = ChannelRegistry::new();
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let mut stream = registry.subscribe(id).unwrap();

        registry.remove(id);
        assert!(!registry.contains(id));
        assert_eq!(stream.next_event().await, None);
    }

    // === Errors ===

    #[test]
    fn error_codes() {
        assert_error_codes(
            &[
                ChannelError::NotFound(SubmissionId::new()),
                ChannelError::AlreadyConsumed(SubmissionId::new()),
            ],
            "CHANNEL_",
        );
    }
}
