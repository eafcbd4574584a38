//! The command object handed to the execution engine.

use cord_types::SubmissionId;

/// One code-execution request as the engine sees it.
///
/// The submission id travels inside the command so the engine can
/// echo it on every [`OutputGateway`](crate::OutputGateway) callback.
/// The command is stored in the submission registry before dispatch
/// and looked back up when the engine is invoked, so it is cheap to
/// clone.
///
/// # Example
///
/// ```
/// use cord_kernel::ExecCommand;
/// use cord_types::SubmissionId;
///
/// let id = SubmissionId::new();
/// let cmd = ExecCommand::new(id, "Console.WriteLine(42);", "csharp");
/// assert_eq!(cmd.submission, id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecCommand {
    /// Correlation key echoed on every engine callback.
    pub submission: SubmissionId,

    /// The code to execute.
    pub source: String,

    /// Target language / session, e.g. `"csharp"`.
    pub language: String,
}

impl ExecCommand {
    /// Creates a command bound to a submission id.
    #[must_use]
    pub fn new(
        submission: SubmissionId,
        source: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            submission,
            source: source.into(),
            language: language.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_carries_its_submission_id() {
        let id = SubmissionId::new();
        let cmd = ExecCommand::new(id, "1 + 1", "fsharp");
        assert_eq!(cmd.submission, id);
        assert_eq!(cmd.source, "1 + 1");
        assert_eq!(cmd.language, "fsharp");
    }
}
