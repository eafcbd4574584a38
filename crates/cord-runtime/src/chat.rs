//! Chat transport boundary.
//!
//! Outbound, cord produces [`ChatMessage`]s and hands them to a
//! [`ChatSink`]. Inbound, the transport produces [`InboundMessage`]s;
//! the only parsing cord does on them is [`extract_code`], which
//! pulls a code snippet out of the free text using the upstream
//! delimiter convention.
//!
//! # Code Detection
//!
//! A snippet is the first stretch of text captured between two
//! carriage returns (`\r(.*?)\r`, dot matching newlines). The capture
//! is HTML-entity-decoded and stripped of U+200B zero-width spaces
//! inserted by rich-text editors. An empty decoded snippet counts as
//! no code.
//!
//! # Error Codes
//!
//! | Variant | Code | Recoverable |
//! |---------|------|-------------|
//! | [`SinkError::Unavailable`] | `CHAT_SINK_UNAVAILABLE` | Yes |

use async_trait::async_trait;
use cord_types::{ConversationId, ErrorCode, SubmissionId, UserId};
use parking_lot::Mutex;
use regex::Regex;
use thiserror::Error;

/// A mention annotation referencing the original sender.
///
/// The marker text (`<at>{name}</at>`) is embedded in message bodies;
/// the annotation itself is attached only when the body contains the
/// marker, matching the transport's mention rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    /// The mentioned user.
    pub user: UserId,

    /// Display name rendered inside the marker.
    pub name: String,
}

impl Mention {
    /// Creates a mention for a user.
    #[must_use]
    pub fn new(user: UserId, name: impl Into<String>) -> Self {
        Self {
            user,
            name: name.into(),
        }
    }

    /// Returns the inline marker text for this mention.
    #[must_use]
    pub fn marker(&self) -> String {
        format!("<at>{}</at>", self.name)
    }
}

/// Body of an outward chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatContent {
    /// Plain (possibly markdown-formatted) text.
    Text(String),

    /// An image attachment by URL.
    Image {
        /// Source locator extracted by the classifier.
        url: String,
    },

    /// The interactive fallback card linking to the external viewer.
    ViewerCard {
        /// Card title.
        title: String,
        /// Card subtitle.
        subtitle: String,
        /// Button label.
        button: String,
        /// The submission whose output the viewer shows.
        submission: SubmissionId,
        /// Viewer URL keyed by the submission token.
        url: String,
    },
}

/// One outward chat message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Target conversation.
    pub conversation: ConversationId,

    /// Message body.
    pub content: ChatContent,

    /// Optional mention annotation.
    pub mention: Option<Mention>,
}

impl ChatMessage {
    /// Creates a text message without a mention.
    #[must_use]
    pub fn text(conversation: ConversationId, body: impl Into<String>) -> Self {
        Self {
            conversation,
            content: ChatContent::Text(body.into()),
            mention: None,
        }
    }

    /// Attaches a mention annotation, but only if the body text
    /// contains the mention marker. Non-text content never carries a
    /// mention.
    #[must_use]
    pub fn with_mention_if_referenced(mut self, mention: &Mention) -> Self {
        if let ChatContent::Text(body) = &self.content {
            if body.contains(&mention.marker()) {
                self.mention = Some(mention.clone());
            }
        }
        self
    }
}

/// Chat transport failure.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// The transport could not deliver the message.
    #[error("chat transport unavailable: {0}")]
    Unavailable(String),
}

impl ErrorCode for SinkError {
    fn code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "CHAT_SINK_UNAVAILABLE",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}

/// Outbound edge of the pipeline.
///
/// Delivery failures are logged by callers and never abort a
/// submission's delivery loop; errors are isolated per submission.
#[async_trait]
pub trait ChatSink: Send + Sync {
    /// Delivers one message to its conversation.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] if the transport rejected the message.
    async fn deliver(&self, message: ChatMessage) -> Result<(), SinkError>;
}

/// A sink that discards everything. Useful as a stand-in.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ChatSink for NullSink {
    async fn deliver(&self, _message: ChatMessage) -> Result<(), SinkError> {
        Ok(())
    }
}

/// A sink that records every delivered message, for tests.
#[derive(Debug, Default)]
pub struct CaptureSink {
    messages: Mutex<Vec<ChatMessage>>,
}

impl CaptureSink {
    /// Creates an empty capture sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything delivered so far, in order.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().clone()
    }

    /// Drains and returns everything delivered so far.
    #[must_use]
    pub fn take(&self) -> Vec<ChatMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

#[async_trait]
impl ChatSink for CaptureSink {
    async fn deliver(&self, message: ChatMessage) -> Result<(), SinkError> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// A structured card action embedded in an inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardAction {
    /// The user picked a session language from the selection card.
    SelectLanguage {
        /// Engine identifier of the language, e.g. `"csharp"`.
        language: String,
    },
}

/// One inbound message from the chat transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Conversation the message arrived in.
    pub conversation: ConversationId,

    /// Transport id of the sender.
    pub sender: UserId,

    /// Display name of the sender.
    pub sender_name: String,

    /// Free text, untouched by the transport.
    pub text: String,

    /// Whether the bot was mentioned.
    pub bot_mentioned: bool,

    /// Structured card action, if the message came from a card.
    pub action: Option<CardAction>,
}

impl InboundMessage {
    /// Creates a plain text message.
    #[must_use]
    pub fn text(
        conversation: ConversationId,
        sender: UserId,
        sender_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            conversation,
            sender,
            sender_name: sender_name.into(),
            text: text.into(),
            bot_mentioned: false,
            action: None,
        }
    }

    /// Creates a card-action message.
    #[must_use]
    pub fn card(
        conversation: ConversationId,
        sender: UserId,
        sender_name: impl Into<String>,
        action: CardAction,
    ) -> Self {
        Self {
            conversation,
            sender,
            sender_name: sender_name.into(),
            text: String::new(),
            bot_mentioned: false,
            action: Some(action),
        }
    }

    /// Marks the bot as mentioned.
    #[must_use]
    pub fn mentioning_bot(mut self) -> Self {
        self.bot_mentioned = true;
        self
    }

    /// Returns a mention for the sender of this message.
    #[must_use]
    pub fn sender_mention(&self) -> Mention {
        Mention::new(self.sender.clone(), self.sender_name.clone())
    }
}

/// Extracts a code snippet from inbound free text.
///
/// Returns `None` if no delimited snippet is present or the decoded
/// snippet is empty.
///
/// # Example
///
/// ```
/// use cord_runtime::extract_code;
///
/// let text = "run this \r1 &#43; 1\r please";
/// assert_eq!(extract_code(text).as_deref(), Some("1 + 1"));
/// assert_eq!(extract_code("no code here"), None);
/// ```
#[must_use]
pub fn extract_code(text: &str) -> Option<String> {
    // compiled per call; inbound turns are rare compared to output
    let pattern = Regex::new(r"(?s)\r(.*?)\r").expect("literal regex");
    let captured = pattern.captures(text)?.get(1)?.as_str();
    let code = decode_entities(captured).replace('\u{200B}', "");
    if code.is_empty() {
        None
    } else {
        Some(code)
    }
}

/// Decodes the HTML entities rich-text editors put into snippets.
///
/// Covers the named entities seen in practice plus decimal and hex
/// numeric references. Unknown entities pass through untouched.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) if end <= 10 => {
                let entity = &tail[1..end];
                match decode_entity(entity) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&tail[..=end]),
                }
                rest = &tail[end + 1..];
            }
            _ => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{A0}'),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cord_types::assert_error_codes;

    fn conv() -> ConversationId {
        ConversationId::new("19:test@thread")
    }

    // === Code extraction ===

    #[test]
    fn extracts_first_delimited_snippet() {
        let text = "before \rvar x = 1;\r after \rsecond\r";
        assert_eq!(extract_code(text).as_deref(), Some("var x = 1;"));
    }

    #[test]
    fn snippet_may_span_lines() {
        let text = "\rline one\nline two\r";
        assert_eq!(extract_code(text).as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn no_delimiters_means_no_code() {
        assert_eq!(extract_code("just chatting"), None);
    }

    #[test]
    fn empty_snippet_means_no_code() {
        assert_eq!(extract_code("\r\r"), None);
        assert_eq!(extract_code("\r\u{200B}\u{200B}\r"), None);
    }

    #[test]
    fn entities_are_decoded() {
        let text = "\rif (a &lt; b &amp;&amp; c &gt; d) { }\r";
        assert_eq!(
            extract_code(text).as_deref(),
            Some("if (a < b && c > d) { }")
        );
    }

    #[test]
    fn numeric_entities_are_decoded() {
        assert_eq!(extract_code("\r&#65;&#x42;\r").as_deref(), Some("AB"));
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(extract_code("\ra &bogus; b\r").as_deref(), Some("a &bogus; b"));
    }

    #[test]
    fn zero_width_spaces_are_stripped() {
        let text = "\rvar\u{200B} x = 1;\r";
        assert_eq!(extract_code(text).as_deref(), Some("var x = 1;"));
    }

    // === Mentions ===

    #[test]
    fn mention_attaches_only_when_referenced() {
        let mention = Mention::new(UserId::new("29:u"), "Ada");

        let with = ChatMessage::text(conv(), "Hey <at>Ada</at>, done!")
            .with_mention_if_referenced(&mention);
        assert_eq!(with.mention, Some(mention.clone()));

        let without =
            ChatMessage::text(conv(), "No marker here").with_mention_if_referenced(&mention);
        assert_eq!(without.mention, None);
    }

    // === Sinks ===

    #[tokio::test]
    async fn capture_sink_records_in_order() {
        let sink = CaptureSink::new();
        sink.deliver(ChatMessage::text(conv(), "first")).await.unwrap();
        sink.deliver(ChatMessage::text(conv(), "second")).await.unwrap();

        let messages = sink.take();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, ChatContent::Text("first".into()));
        assert_eq!(messages[1].content, ChatContent::Text("second".into()));
        assert!(sink.messages().is_empty());
    }

    #[tokio::test]
    async fn null_sink_accepts_everything() {
        let sink = NullSink;
        sink.deliver(ChatMessage::text(conv(), "ignored")).await.unwrap();
    }

    // === Errors ===

    #[test]
    fn error_codes() {
        assert_error_codes(&[SinkError::Unavailable("down".into())], "CHAT_");
    }
}
