//! Per-conversation session state.
//!
//! The surrounding bot needs a little state per conversation: the
//! selected session language, who wrote code last, and how many
//! snippets each participant has submitted. That state lives behind
//! the [`SessionStore`] collaborator trait, scoped per conversation —
//! never process-wide.
//!
//! Turn handling is load → mutate → store; conversations are handled
//! one turn at a time, which keeps the read-modify-write race-free in
//! practice.

use std::collections::HashMap;

use cord_types::{ConversationId, UserId};
use parking_lot::Mutex;

/// One known participant of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    /// Display name, for mentions.
    pub name: String,

    /// How many code snippets this user has submitted.
    pub submissions: u32,
}

/// State of one conversation.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    /// Session language, set once via the selection card or seeded
    /// when the bot joins.
    pub language: Option<String>,

    /// The participant whose code ran last.
    pub active_user: Option<UserId>,

    /// Known participants, keyed by transport id.
    pub users: HashMap<UserId, UserRecord>,
}

impl ConversationState {
    /// Returns the record for `user`, creating it with `name` on
    /// first sight.
    pub fn user_mut(&mut self, user: &UserId, name: &str) -> &mut UserRecord {
        self.users
            .entry(user.clone())
            .or_insert_with(|| UserRecord {
                name: name.to_string(),
                submissions: 0,
            })
    }
}

/// Conversation-scoped state storage.
///
/// Dyn-safe so the bot can hold `Arc<dyn SessionStore>`. A missing
/// conversation loads as the default state.
pub trait SessionStore: Send + Sync {
    /// Loads the state for a conversation.
    fn load(&self, conversation: &ConversationId) -> ConversationState;

    /// Stores the state for a conversation.
    fn store(&self, conversation: &ConversationId, state: ConversationState);
}

/// In-memory [`SessionStore`].
///
/// # Example
///
/// ```
/// use cord_runtime::{MemorySessionStore, SessionStore};
/// use cord_types::ConversationId;
///
/// let store = MemorySessionStore::new();
/// let conv = ConversationId::new("19:thread");
/// let mut state = store.load(&conv);
/// state.language = Some("csharp".into());
/// store.store(&conv, state);
/// assert_eq!(store.load(&conv).language.as_deref(), Some("csharp"));
/// ```
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<HashMap<ConversationId, ConversationState>>,
}

impl MemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, conversation: &ConversationId) -> ConversationState {
        self.inner
            .lock()
            .get(conversation)
            .cloned()
            .unwrap_or_default()
    }

    fn store(&self, conversation: &ConversationId, state: ConversationState) {
        self.inner.lock().insert(conversation.clone(), state);
    }
}
