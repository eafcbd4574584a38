//! Kernel boundary errors.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`KernelError::Unavailable`] | `KERNEL_UNAVAILABLE` | Yes |
//! | [`KernelError::Rejected`] | `KERNEL_REJECTED` | No |

use cord_types::ErrorCode;
use thiserror::Error;

/// Failure at the engine boundary.
///
/// Distinct from execution failures: those arrive asynchronously
/// through the gateway as terminal `fail` callbacks. A `KernelError`
/// means the command never started.
///
/// # Example
///
/// ```
/// use cord_kernel::KernelError;
/// use cord_types::ErrorCode;
///
/// let err = KernelError::Unavailable;
/// assert_eq!(err.code(), "KERNEL_UNAVAILABLE");
/// assert!(err.is_recoverable());
/// ```
#[derive(Debug, Clone, Error)]
pub enum KernelError {
    /// The engine cannot currently accept work.
    ///
    /// Reported by the readiness gate or by `submit` when the engine
    /// went busy between the gate check and the dispatch.
    #[error("execution engine is not available")]
    Unavailable,

    /// The engine refused the command outright.
    #[error("execution engine rejected the command: {0}")]
    Rejected(String),
}

impl ErrorCode for KernelError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable => "KERNEL_UNAVAILABLE",
            Self::Rejected(_) => "KERNEL_REJECTED",
        }
    }

    fn is_recoverable(&self) -> bool {
        // Busy engines come back; rejected commands do not
        matches!(self, Self::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cord_types::assert_error_codes;

    #[test]
    fn codes_follow_conventions() {
        assert_error_codes(
            &[
                KernelError::Unavailable,
                KernelError::Rejected("bad".into()),
            ],
            "KERNEL_",
        );
    }
}
