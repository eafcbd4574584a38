//! cord runtime — the submission/output correlation and
//! rendering-routing engine.
//!
//! Given a code snippet, this crate creates a uniquely addressed
//! output channel, hands the command to the execution engine, and
//! turns the unordered arrival of output fragments into a
//! deterministic sequence of chat messages with exactly one terminal
//! notice per submission.
//!
//! # Pipeline
//!
//! ```text
//!  SubmitRequest
//!       │
//!       ▼
//!  ┌──────────────┐ store  ┌────────────────────┐
//!  │  Dispatcher  │───────►│ SubmissionRegistry │
//!  └──────┬───────┘        └────────────────────┘
//!         │ get_or_create / subscribe
//!         ▼
//!  ┌────────────────────┐   publish/complete/fail
//!  │  ChannelRegistry   │◄───────────────────────── Kernel
//!  │  (OutputGateway)   │
//!  └──────┬─────────────┘
//!         │ FragmentStream
//!         ▼
//!  ┌──────────────┐ window + deadline
//!  │  BatchStream │
//!  └──────┬───────┘
//!         │ BatchEvent
//!         ▼
//!  ┌──────────────┐ classify ┌────────────┐
//!  │ DeliveryRunner│────────►│ Classifier │
//!  └──────┬───────┘          └────────────┘
//!         │ ChatMessage
//!         ▼
//!      ChatSink
//! ```
//!
//! # Guarantees
//!
//! - Fragments are correlated by submission id and never
//!   cross-delivered.
//! - Fragments within one submission preserve emission order through
//!   batching and classification.
//! - Exactly one terminal message per submission, strictly after
//!   every batch-derived message.
//! - The rich-content fallback card is sent at most once per
//!   submission.
//! - Waiting is bounded by the per-submission deadline.

mod batch;
mod channel;
mod chat;
mod classify;
mod config;
mod deliver;
mod dispatch;
mod session;
mod submission;

pub use batch::{BatchEvent, BatchStream, StreamFailure};
pub use channel::{ChannelError, ChannelEvent, ChannelRegistry, FragmentStream};
pub use chat::{
    extract_code, CaptureSink, CardAction, ChatContent, ChatMessage, ChatSink, InboundMessage,
    Mention, NullSink, SinkError,
};
pub use classify::{Classifier, RenderMode, Rendering};
pub use config::{
    ConfigError, CordConfig, KernelConfig, LogConfig, PipelineConfig, ViewerConfig,
};
pub use deliver::{
    DeliveryProfile, DeliveryRunner, VIEWER_CARD_BUTTON, VIEWER_CARD_SUBTITLE, VIEWER_CARD_TITLE,
};
pub use dispatch::{DispatchError, Dispatcher, SubmitRequest};
pub use session::{ConversationState, MemorySessionStore, SessionStore, UserRecord};
pub use submission::{Submission, SubmissionError, SubmissionRegistry};
