//! Submission dispatch.
//!
//! The [`Dispatcher`] wires one submission end to end: readiness
//! gate → fresh id → store command → create and subscribe channel →
//! batching → spawn the delivery runner → hand the stored command to
//! the engine. Everything downstream of the spawn is owned by the
//! runner task; the dispatcher returns as soon as the engine has the
//! command.
//!
//! # Failure Ordering
//!
//! The readiness gate is checked before anything is created, so a
//! not-ready engine leaves no channel and no stored command behind.
//! An engine error *after* the channel exists is converted to a
//! terminal `fail` on the channel, surfacing through the stream as
//! the failure notice; the submission id is still returned.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`DispatchError::EngineUnavailable`] | `DISPATCH_ENGINE_UNAVAILABLE` | Yes |
//! | [`DispatchError::Submission`] | `DISPATCH_SUBMISSION` | No |
//! | [`DispatchError::Channel`] | `DISPATCH_CHANNEL` | No |

use std::sync::Arc;
use std::time::Duration;

use cord_kernel::{ExecCommand, Kernel, OutputGateway};
use cord_types::{ConversationId, ErrorCode, SubmissionId};
use thiserror::Error;
use tracing::{debug, error};

use crate::batch::BatchStream;
use crate::channel::{ChannelError, ChannelRegistry};
use crate::chat::ChatSink;
use crate::classify::Classifier;
use crate::config::{CordConfig, ViewerConfig};
use crate::deliver::{DeliveryProfile, DeliveryRunner};
use crate::submission::{Submission, SubmissionError, SubmissionRegistry};

/// Dispatch failure.
///
/// # Example
///
/// ```
/// use cord_runtime::DispatchError;
/// use cord_types::ErrorCode;
///
/// let err = DispatchError::EngineUnavailable;
/// assert_eq!(err.code(), "DISPATCH_ENGINE_UNAVAILABLE");
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The engine readiness gate failed; nothing was created.
    #[error("execution engine is not available")]
    EngineUnavailable,

    /// The submission registry refused the command.
    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// The channel registry refused the subscription.
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

impl ErrorCode for DispatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::EngineUnavailable => "DISPATCH_ENGINE_UNAVAILABLE",
            Self::Submission(_) => "DISPATCH_SUBMISSION",
            Self::Channel(_) => "DISPATCH_CHANNEL",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::EngineUnavailable)
    }
}

/// One dispatch request from the bot layer.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Conversation the output messages target.
    pub conversation: ConversationId,

    /// The extracted code snippet.
    pub code: String,

    /// Target language / session.
    pub language: String,

    /// Wording and timing for the delivery runner.
    pub profile: DeliveryProfile,
}

/// Wires submissions into the pipeline.
///
/// Shared by value behind an `Arc`; all state lives in the shared
/// registries. Submissions for different ids run fully in parallel,
/// each on its own delivery task.
pub struct Dispatcher {
    kernel: Arc<dyn Kernel>,
    sink: Arc<dyn ChatSink>,
    channels: Arc<ChannelRegistry>,
    submissions: Arc<SubmissionRegistry>,
    classifier: Arc<Classifier>,
    window: Duration,
    viewer: ViewerConfig,
}

impl Dispatcher {
    /// Assembles a dispatcher over fresh registries.
    #[must_use]
    pub fn new(kernel: Arc<dyn Kernel>, sink: Arc<dyn ChatSink>, config: &CordConfig) -> Self {
        Self {
            kernel,
            sink,
            channels: Arc::new(ChannelRegistry::new()),
            submissions: Arc::new(SubmissionRegistry::new()),
            classifier: Arc::new(Classifier::new()),
            window: config.pipeline.window(),
            viewer: config.viewer.clone(),
        }
    }

    /// Queries the engine readiness gate.
    #[must_use]
    pub fn ready(&self) -> bool {
        self.kernel.can_execute()
    }

    /// The channel registry, doubling as the engine's gateway.
    #[must_use]
    pub fn channels(&self) -> Arc<ChannelRegistry> {
        Arc::clone(&self.channels)
    }

    /// The submission registry.
    #[must_use]
    pub fn submissions(&self) -> Arc<SubmissionRegistry> {
        Arc::clone(&self.submissions)
    }

    /// Submits a code snippet for execution.
    ///
    /// Returns the submission id as soon as the engine has accepted
    /// the command; output flows to the sink asynchronously.
    ///
    /// # Errors
    ///
    /// [`DispatchError::EngineUnavailable`] if the readiness gate
    /// fails — in that case no channel and no registry entry were
    /// created. Registry errors indicate bugs and are propagated.
    pub async fn submit(&self, request: SubmitRequest) -> Result<SubmissionId, DispatchError> {
        if !self.kernel.can_execute() {
            return Err(DispatchError::EngineUnavailable);
        }

        let id = SubmissionId::new();
        let command = ExecCommand::new(id, request.code, request.language);
        self.submissions.store(Submission::new(command))?;

        self.channels.get_or_create(id);
        let stream = self.channels.subscribe(id)?;
        let batches = BatchStream::new(stream, self.window, request.profile.deadline);

        debug!(%id, conversation = %request.conversation, "submission dispatched");

        let runner = DeliveryRunner {
            id,
            conversation: request.conversation,
            profile: request.profile,
            batches,
            classifier: Arc::clone(&self.classifier),
            sink: Arc::clone(&self.sink),
            channels: Arc::clone(&self.channels),
            submissions: Arc::clone(&self.submissions),
            viewer_url: self.viewer.executor_url(id),
        };
        tokio::spawn(runner.run());

        // look the stored command back up; the registry owns it now
        let stored = self.submissions.lookup(id)?;
        let gateway: Arc<dyn OutputGateway> = self.channels();
        if let Err(failure) = self.kernel.submit(stored.command, gateway).await {
            // the channel exists, so the failure surfaces through the
            // stream as the terminal notice
            error!(%id, %failure, "engine refused dispatched command");
            self.channels.fail(id, &failure.to_string());
        }

        Ok(id)
    }
}
