//! Submission registry.
//!
//! Write-once, read-many storage of execution commands, keyed by
//! [`SubmissionId`]. The dispatcher stores a command here before the
//! engine is invoked and looks it back up at dispatch time; the
//! delivery runner prunes the entry after the terminal notice so
//! memory stays bounded.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`SubmissionError::Duplicate`] | `SUBMISSION_DUPLICATE` | No |
//! | [`SubmissionError::NotFound`] | `SUBMISSION_NOT_FOUND` | No |

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use cord_kernel::ExecCommand;
use cord_types::{ErrorCode, SubmissionId};
use thiserror::Error;

/// One stored code-execution request.
///
/// Immutable once stored. The id is duplicated out of the command for
/// direct access; the two always agree.
#[derive(Debug, Clone)]
pub struct Submission {
    /// Correlation key for the whole pipeline.
    pub id: SubmissionId,

    /// The command handed to the execution engine.
    pub command: ExecCommand,

    /// When the submission was stored.
    pub created_at: DateTime<Utc>,
}

impl Submission {
    /// Wraps a command into a submission record, stamping the
    /// creation time.
    #[must_use]
    pub fn new(command: ExecCommand) -> Self {
        Self {
            id: command.submission,
            command,
            created_at: Utc::now(),
        }
    }
}

/// Submission registry error.
///
/// # Example
///
/// ```
/// use cord_runtime::SubmissionError;
/// use cord_types::{ErrorCode, SubmissionId};
///
/// let err = SubmissionError::NotFound(SubmissionId::new());
/// assert_eq!(err.code(), "SUBMISSION_NOT_FOUND");
/// ```
#[derive(Debug, Clone, Error)]
pub enum SubmissionError {
    /// A submission with this id was already stored.
    ///
    /// Ids are random 128-bit tokens generated at submit time, so a
    /// collision indicates a bug, not bad input. Fail fast.
    #[error("submission already stored: {0}")]
    Duplicate(SubmissionId),

    /// No submission stored under this id.
    #[error("submission not found: {0}")]
    NotFound(SubmissionId),
}

impl ErrorCode for SubmissionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Duplicate(_) => "SUBMISSION_DUPLICATE",
            Self::NotFound(_) => "SUBMISSION_NOT_FOUND",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Write-once map from submission id to command.
///
/// Thread-safe; shared between the dispatcher (store/lookup) and the
/// delivery runners (remove).
///
/// # Example
///
/// ```
/// use cord_kernel::ExecCommand;
/// use cord_runtime::{Submission, SubmissionRegistry};
/// use cord_types::SubmissionId;
///
/// let registry = SubmissionRegistry::new();
/// let id = SubmissionId::new();
/// registry
///     .store(Submission::new(ExecCommand::new(id, "1 + 1", "csharp")))
///     .unwrap();
/// assert_eq!(registry.lookup(id).unwrap().command.source, "1 + 1");
/// ```
#[derive(Debug, Default)]
pub struct SubmissionRegistry {
    entries: RwLock<HashMap<SubmissionId, Submission>>,
}

impl SubmissionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a submission.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::Duplicate`] if the id is already
    /// present. Entries are never overwritten.
    pub fn store(&self, submission: Submission) -> Result<(), SubmissionError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if entries.contains_key(&submission.id) {
            return Err(SubmissionError::Duplicate(submission.id));
        }
        entries.insert(submission.id, submission);
        Ok(())
    }

    /// Looks up a stored submission.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::NotFound`] for an unknown id.
    pub fn lookup(&self, id: SubmissionId) -> Result<Submission, SubmissionError> {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or(SubmissionError::NotFound(id))
    }

    /// Removes a submission after terminal delivery. Unknown ids are
    /// a no-op.
    pub fn remove(&self, id: SubmissionId) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
