//! cord bot layer.
//!
//! Couples the chat transport to the runtime pipeline: detects code
//! in inbound messages, acknowledges the author, picks the delivery
//! wording, and tracks per-conversation session state (language,
//! active user, submission counts).
//!
//! The heavy lifting — channels, batching, classification, delivery
//! ordering — lives in `cord-runtime`; this crate owns the
//! conversation flows and every user-facing string.

mod bot;
pub(crate) mod replies;

pub use bot::CordBot;
