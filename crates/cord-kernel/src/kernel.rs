//! The execution engine trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ExecCommand, KernelError, OutputGateway};

/// An execution engine cord can dispatch commands to.
///
/// The engine is a black box: cord hands it a command plus a gateway
/// handle and expects fragments, then exactly one terminal callback,
/// to arrive through the gateway on the engine's own schedule.
/// `submit` returning `Ok` means the command was accepted, not that
/// it finished.
///
/// # Readiness Gate
///
/// [`can_execute`](Kernel::can_execute) is checked before any
/// dispatch is attempted. When it returns `false` the caller replies
/// "cannot execute right now" and never creates a channel. The gate
/// is advisory — `submit` may still fail with
/// [`KernelError::Unavailable`] if the engine went busy in between.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use cord_kernel::{ExecCommand, Kernel, KernelError, OutputGateway};
///
/// struct EchoKernel;
///
/// #[async_trait]
/// impl Kernel for EchoKernel {
///     fn can_execute(&self) -> bool {
///         true
///     }
///
///     async fn submit(
///         &self,
///         command: ExecCommand,
///         gateway: Arc<dyn OutputGateway>,
///     ) -> Result<(), KernelError> {
///         let id = command.submission;
///         gateway.publish(id, cord_types::OutputFragment::text(command.source));
///         gateway.complete(id);
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Kernel: Send + Sync {
    /// Returns whether the engine can currently accept a command.
    fn can_execute(&self) -> bool;

    /// Hands a command to the engine.
    ///
    /// The engine must echo `command.submission` on every gateway
    /// callback and eventually issue exactly one terminal callback.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] if the command could not be started at
    /// all. Errors during execution are reported through
    /// [`OutputGateway::fail`] instead.
    async fn submit(
        &self,
        command: ExecCommand,
        gateway: Arc<dyn OutputGateway>,
    ) -> Result<(), KernelError>;
}
