//! Execution-engine boundary for cord.
//!
//! The real language-execution backend is an external collaborator.
//! This crate defines the narrow surface cord talks to it through:
//!
//! - [`ExecCommand`]: the command object handed to the engine
//!   (source text, target language, submission id).
//! - [`Kernel`]: the engine itself — a readiness gate plus an async
//!   `submit`.
//! - [`OutputGateway`]: the callback boundary the engine feeds
//!   results back through (`publish`/`complete`/`fail`), keyed by
//!   submission id.
//!
//! # Correlation Contract
//!
//! The engine must echo the submission id embedded in the command on
//! every gateway callback. The gateway implementation (the runtime's
//! channel registry) routes by that id; a wrong id means the output
//! is dropped as orphaned, never cross-delivered.
//!
//! # In-Repo Kernels
//!
//! Two [`Kernel`] implementations ship here so the pipeline can run
//! without an external engine:
//!
//! - [`LoopbackKernel`]: interprets a tiny snippet language covering
//!   every rendering path; used by the CLI demo.
//! - [`ScriptedKernel`]: replays a fixed action script; used by
//!   tests.

mod command;
mod error;
mod gateway;
mod kernel;
mod loopback;
pub mod testing;

pub use command::ExecCommand;
pub use error::KernelError;
pub use gateway::OutputGateway;
pub use kernel::Kernel;
pub use loopback::LoopbackKernel;
pub use testing::ScriptedKernel;
