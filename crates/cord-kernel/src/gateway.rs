//! Callback boundary from the engine back into cord.

use cord_types::{OutputFragment, SubmissionId};

/// The surface the execution engine feeds results through.
///
/// Implemented by the runtime's output channel registry. All three
/// callbacks are fire-and-forget from the engine's point of view:
/// none of them can fail back into the engine. A callback with an
/// unknown or already-terminated id is dropped (and logged) by the
/// implementation — the orphaned-fragment rule.
///
/// # Terminal Contract
///
/// For each submission the engine must eventually call exactly one of
/// [`complete`](OutputGateway::complete) or
/// [`fail`](OutputGateway::fail). Fragments published after the
/// terminal call are ignored. An engine that never terminates is
/// handled by the consumer-side deadline, not here.
pub trait OutputGateway: Send + Sync {
    /// Delivers one output fragment for a submission.
    fn publish(&self, id: SubmissionId, fragment: OutputFragment);

    /// Signals successful completion of a submission.
    fn complete(&self, id: SubmissionId);

    /// Signals failure of a submission with a human-readable message.
    fn fail(&self, id: SubmissionId, message: &str);
}
