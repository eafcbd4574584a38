//! Identifier types for cord.
//!
//! [`SubmissionId`] is UUID-based and locally generated; conversation
//! and user identifiers are opaque strings assigned by the chat
//! transport and never interpreted here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for one code submission.
///
/// A submission is one code-execution request. Its id is the
/// correlation key for the whole pipeline: the stored command, the
/// output channel, the viewer link, and the gateway callbacks all
/// carry it.
///
/// # Token Format
///
/// Rendered as 32 lowercase hex characters (a UUID v4 without
/// hyphens), the same format the execution engine embeds in its
/// callbacks and the viewer expects in its `Token` query parameter.
///
/// # Example
///
/// ```
/// use cord_types::SubmissionId;
///
/// let id = SubmissionId::new();
/// let token = id.to_string();
/// assert_eq!(token.len(), 32);
/// assert_eq!(SubmissionId::parse(&token).unwrap(), id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub Uuid);

#[allow(clippy::new_without_default)] // Default intentionally not implemented - see below
impl SubmissionId {
    /// Creates a fresh [`SubmissionId`] with a random UUID v4.
    ///
    /// # Example
    ///
    /// ```
    /// use cord_types::SubmissionId;
    ///
    /// let a = SubmissionId::new();
    /// let b = SubmissionId::new();
    /// assert_ne!(a, b);
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses a token in either simple-hex or hyphenated form.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`uuid::Error`] if `token` is not a
    /// valid UUID rendering.
    pub fn parse(token: &str) -> Result<Self, uuid::Error> {
        Uuid::try_parse(token).map(Self)
    }

    /// Returns the inner UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

// NOTE: SubmissionId intentionally does NOT implement Default.
// Default::default() would mint a token with no registered command or
// channel. Ids are generated by the dispatcher at submit time.

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Handle for one chat conversation.
///
/// Assigned by the chat transport (a Teams thread id, a console
/// session name, a test label). cord never parses it; it only routes
/// outward messages by it and keys session state on it.
///
/// # Example
///
/// ```
/// use cord_types::ConversationId;
///
/// let conv = ConversationId::new("19:thread@skype");
/// assert_eq!(conv.to_string(), "19:thread@skype");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    /// Creates a conversation handle from a transport-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw transport id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a chat participant.
///
/// Opaque transport-assigned id, paired with a display name wherever a
/// mention must be rendered. Distinct from [`SubmissionId`]: a user
/// may own many submissions.
///
/// # Example
///
/// ```
/// use cord_types::UserId;
///
/// let user = UserId::new("29:1a2b3c");
/// assert_eq!(user.as_str(), "29:1a2b3c");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a user id from a transport-assigned id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw transport id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
