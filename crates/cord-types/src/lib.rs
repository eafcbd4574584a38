//! Core types for cord.
//!
//! This crate provides the foundational types for the cord
//! (code-output relay & dispatch) architecture: identifiers, output
//! fragments, and the unified error-code interface.
//!
//! # Crate Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Boundary Layer                            │
//! │  (Shared vocabulary, safe to depend on)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cord-types    : SubmissionId, OutputFragment, ErrorCode    │
//! │  cord-kernel   : Kernel trait, ExecCommand, OutputGateway   │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Runtime Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cord-runtime  : registries, batching, classify, delivery   │
//! └─────────────────────────────────────────────────────────────┘
//!                               ↓
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Frontend Layer                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  cord-app      : conversation turn handling                 │
//! │  cord-cli      : console front end                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Correlation Design
//!
//! Everything in cord is keyed by [`SubmissionId`]: the execution
//! command, the output channel, and every outward message derived from
//! a submission's output. The id is a random 128-bit token rendered as
//! 32 hex characters, matching the token format embedded in execution
//! commands and viewer links.
//!
//! # Example
//!
//! ```
//! use cord_types::{OutputFragment, SubmissionId};
//!
//! let id = SubmissionId::new();
//! assert_eq!(id.to_string().len(), 32);
//!
//! let fragment = OutputFragment::text("hello");
//! assert!(!fragment.is_rich());
//! ```

mod error;
mod fragment;
mod id;

pub use error::{assert_error_code, assert_error_codes, ErrorCode};
pub use fragment::{mime, FragmentValue, OutputFragment};
pub use id::{ConversationId, SubmissionId, UserId};
