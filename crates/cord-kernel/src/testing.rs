//! Test doubles for the kernel boundary.
//!
//! [`ScriptedKernel`] replays a fixed action script through the
//! gateway, and [`RecordingGateway`] captures every callback. Used by
//! unit tests here and by the runtime/app integration suites, so
//! these live in the crate proper rather than behind `cfg(test)`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cord_types::{OutputFragment, SubmissionId};
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{ExecCommand, Kernel, KernelError, OutputGateway};

/// One step of a [`ScriptedKernel`] script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Publish a fragment.
    Emit(OutputFragment),

    /// Sleep before the next step (drives batch-window boundaries).
    Pause(Duration),

    /// Terminal success.
    Complete,

    /// Terminal failure with a message.
    Fail(String),
}

/// A [`Kernel`] that replays a fixed script for every submission.
///
/// The script runs on a spawned task, echoing the submission id from
/// the command on every gateway call. A script without a terminal
/// step models an engine that hangs (for deadline tests); see
/// [`ScriptedKernel::silent`].
///
/// # Example
///
/// ```
/// use cord_kernel::testing::{ScriptStep, ScriptedKernel};
/// use cord_types::OutputFragment;
///
/// let kernel = ScriptedKernel::new(vec![
///     ScriptStep::Emit(OutputFragment::text("out")),
///     ScriptStep::Complete,
/// ]);
/// assert!(kernel.submitted().is_empty());
/// ```
pub struct ScriptedKernel {
    script: Vec<ScriptStep>,
    ready: AtomicBool,
    submitted: Mutex<Vec<ExecCommand>>,
}

impl ScriptedKernel {
    /// Creates a kernel that replays `script` for each submission.
    #[must_use]
    pub fn new(script: Vec<ScriptStep>) -> Self {
        Self {
            script,
            ready: AtomicBool::new(true),
            submitted: Mutex::new(Vec::new()),
        }
    }

    /// Creates a kernel that accepts commands but never emits
    /// anything — no fragments, no terminal. The consumer-side
    /// deadline is the only way out.
    #[must_use]
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Builder-style readiness override.
    #[must_use]
    pub fn not_ready(self) -> Self {
        self.ready.store(false, Ordering::SeqCst);
        self
    }

    /// Flips the readiness gate.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Returns every command handed to `submit`, in order.
    #[must_use]
    pub fn submitted(&self) -> Vec<ExecCommand> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl Kernel for ScriptedKernel {
    fn can_execute(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn submit(
        &self,
        command: ExecCommand,
        gateway: Arc<dyn OutputGateway>,
    ) -> Result<(), KernelError> {
        if !self.can_execute() {
            return Err(KernelError::Unavailable);
        }
        let id = command.submission;
        self.submitted.lock().push(command);
        let script = self.script.clone();
        tokio::spawn(async move {
            for step in script {
                match step {
                    ScriptStep::Emit(fragment) => gateway.publish(id, fragment),
                    ScriptStep::Pause(d) => tokio::time::sleep(d).await,
                    ScriptStep::Complete => {
                        gateway.complete(id);
                        return;
                    }
                    ScriptStep::Fail(message) => {
                        gateway.fail(id, &message);
                        return;
                    }
                }
            }
            // script without a terminal step: hang silently
        });
        Ok(())
    }
}

/// One recorded gateway callback.
#[derive(Debug, Clone)]
pub enum GatewayCall {
    /// `publish(id, fragment)`
    Publish(SubmissionId, OutputFragment),

    /// `complete(id)`
    Complete(SubmissionId),

    /// `fail(id, message)`
    Fail(SubmissionId, String),
}

/// An [`OutputGateway`] that records every callback.
#[derive(Default)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    notify: Notify,
}

impl RecordingGateway {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded calls, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Returns the fragments published for `id`, in order.
    #[must_use]
    pub fn fragments(&self, id: SubmissionId) -> Vec<OutputFragment> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GatewayCall::Publish(i, f) if *i == id => Some(f.clone()),
                _ => None,
            })
            .collect()
    }

    /// Returns whether `complete(id)` was recorded.
    #[must_use]
    pub fn completed(&self, id: SubmissionId) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| matches!(c, GatewayCall::Complete(i) if *i == id))
    }

    /// Returns the failure message recorded for `id`, if any.
    #[must_use]
    pub fn failure(&self, id: SubmissionId) -> Option<String> {
        self.calls.lock().iter().find_map(|c| match c {
            GatewayCall::Fail(i, m) if *i == id => Some(m.clone()),
            _ => None,
        })
    }

    fn has_terminal(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| matches!(c, GatewayCall::Complete(_) | GatewayCall::Fail(_, _)))
    }

    /// Blocks until any terminal callback arrives.
    ///
    /// # Panics
    ///
    /// Panics if no terminal callback is recorded within `timeout`.
    pub async fn wait_for_terminal(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if self.has_terminal() {
                return;
            }
            assert!(
                tokio::time::timeout_at(deadline, notified).await.is_ok(),
                "no terminal gateway call within {timeout:?}"
            );
        }
    }
}

impl OutputGateway for RecordingGateway {
    fn publish(&self, id: SubmissionId, fragment: OutputFragment) {
        self.calls.lock().push(GatewayCall::Publish(id, fragment));
        self.notify.notify_waiters();
    }

    fn complete(&self, id: SubmissionId) {
        self.calls.lock().push(GatewayCall::Complete(id));
        self.notify.notify_waiters();
    }

    fn fail(&self, id: SubmissionId, message: &str) {
        self.calls
            .lock()
            .push(GatewayCall::Fail(id, message.to_string()));
        self.notify.notify_waiters();
    }
}
