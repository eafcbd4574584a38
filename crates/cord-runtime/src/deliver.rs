//! Per-submission delivery.
//!
//! One [`DeliveryRunner`] task per submission consumes the batched
//! stream sequentially, renders each batch per its classification,
//! and finishes with exactly one terminal notice. Sequential
//! consumption inside a single task is what provides the ordering
//! guarantee: batch messages go out in batch order, the terminal
//! message goes out strictly last, and the fallback-card flag needs
//! no synchronization.
//!
//! Sink failures are logged and skipped; they never abort the loop,
//! so one broken delivery cannot swallow the terminal notice.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::batch::{BatchEvent, BatchStream};
use crate::channel::ChannelRegistry;
use crate::chat::{ChatContent, ChatMessage, ChatSink, Mention};
use crate::classify::{Classifier, RenderMode, Rendering};
use crate::submission::SubmissionRegistry;
use cord_types::{ConversationId, SubmissionId};
use std::time::Duration;

/// Title of the rich-content fallback card.
pub const VIEWER_CARD_TITLE: &str = "Your output is too awesome 😎";

/// Subtitle of the rich-content fallback card.
pub const VIEWER_CARD_SUBTITLE: &str = "Use the viewer to see it.";

/// Button label of the rich-content fallback card.
pub const VIEWER_CARD_BUTTON: &str = "Open Viewer";

/// Per-submission delivery settings, supplied by the bot layer.
///
/// The runner owns the mechanics (ordering, once-only rules); the
/// profile owns the wording and the timing knobs.
#[derive(Debug, Clone)]
pub struct DeliveryProfile {
    /// How much of the classifier's decision tree to apply.
    pub mode: RenderMode,

    /// Body of the single "execution finished" message.
    pub done_notice: String,

    /// Prefix of the single "execution failed" message; the error
    /// text is appended in a code fence.
    pub failed_notice: String,

    /// Delay before the terminal notice.
    pub settle: Duration,

    /// Overall deadline for the submission.
    pub deadline: Duration,

    /// Mention attached to terminal notices that reference it.
    pub mention: Option<Mention>,
}

impl DeliveryProfile {
    /// Creates a profile with the default timing (1 s settle, 60 s
    /// deadline) and the full rendering mode.
    #[must_use]
    pub fn new(done_notice: impl Into<String>, failed_notice: impl Into<String>) -> Self {
        Self {
            mode: RenderMode::Full,
            done_notice: done_notice.into(),
            failed_notice: failed_notice.into(),
            settle: Duration::from_secs(1),
            deadline: Duration::from_secs(60),
            mention: None,
        }
    }

    /// Sets the rendering mode.
    #[must_use]
    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the settle delay.
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the mention for terminal notices.
    #[must_use]
    pub fn with_mention(mut self, mention: Mention) -> Self {
        self.mention = Some(mention);
        self
    }
}

/// The per-submission consumer task.
///
/// Assembled by the dispatcher and spawned once per submission. After
/// the terminal notice it prunes the submission's channel and
/// registry entry.
pub struct DeliveryRunner {
    /// The submission being delivered.
    pub id: SubmissionId,

    /// Conversation every message targets.
    pub conversation: ConversationId,

    /// Wording and timing.
    pub profile: DeliveryProfile,

    /// The batched output stream.
    pub batches: BatchStream,

    /// Shared decision tree.
    pub classifier: Arc<Classifier>,

    /// Outbound transport.
    pub sink: Arc<dyn ChatSink>,

    /// For pruning the channel after the terminal notice.
    pub channels: Arc<ChannelRegistry>,

    /// For pruning the stored command after the terminal notice.
    pub submissions: Arc<SubmissionRegistry>,

    /// Viewer URL for the fallback card, keyed by this submission.
    pub viewer_url: String,
}

impl DeliveryRunner {
    /// Consumes the stream to its terminal event, delivering
    /// messages along the way, then prunes the registries.
    pub async fn run(mut self) {
        let mut card_sent = false;
        while let Some(event) = self.batches.next().await {
            match event {
                BatchEvent::Batch(fragments) => {
                    let rendering = self.classifier.classify(&fragments, self.profile.mode);
                    if let Some(message) = self.render(rendering, &mut card_sent) {
                        self.send(message).await;
                    }
                }
                BatchEvent::Completed => {
                    tokio::time::sleep(self.profile.settle).await;
                    let notice = self.notice(self.profile.done_notice.clone());
                    self.send(notice).await;
                }
                BatchEvent::Failed(failure) => {
                    tokio::time::sleep(self.profile.settle).await;
                    let body =
                        format!("{}\r\n```{}```", self.profile.failed_notice, failure);
                    let notice = self.notice(body);
                    self.send(notice).await;
                }
            }
        }
        debug!(id = %self.id, "delivery finished, pruning");
        self.channels.remove(self.id);
        self.submissions.remove(self.id);
    }

    /// Turns a rendering decision into at most one outward message.
    fn render(&self, rendering: Rendering, card_sent: &mut bool) -> Option<ChatMessage> {
        match rendering {
            Rendering::Image { src } => Some(ChatMessage {
                conversation: self.conversation.clone(),
                content: ChatContent::Image { url: src },
                mention: None,
            }),
            Rendering::Classification { label, confidence } => Some(ChatMessage::text(
                self.conversation.clone(),
                format!("**Label**: _{label}_\r\n\n**Confidence**: _{confidence}_"),
            )),
            Rendering::RichUnsupported => {
                if *card_sent {
                    // at most one fallback card per submission
                    return None;
                }
                *card_sent = true;
                Some(ChatMessage {
                    conversation: self.conversation.clone(),
                    content: ChatContent::ViewerCard {
                        title: VIEWER_CARD_TITLE.to_string(),
                        subtitle: VIEWER_CARD_SUBTITLE.to_string(),
                        button: VIEWER_CARD_BUTTON.to_string(),
                        submission: self.id,
                        url: self.viewer_url.clone(),
                    },
                    mention: None,
                })
            }
            Rendering::PlainText { content } => Some(ChatMessage::text(
                self.conversation.clone(),
                // the fence is left open, matching the upstream
                // formatting convention
                format!("```\r\n{content}"),
            )),
        }
    }

    fn notice(&self, body: String) -> ChatMessage {
        let message = ChatMessage::text(self.conversation.clone(), body);
        match &self.profile.mention {
            Some(mention) => message.with_mention_if_referenced(mention),
            None => message,
        }
    }

    async fn send(&self, message: ChatMessage) {
        if let Err(error) = self.sink.deliver(message).await {
            warn!(id = %self.id, %error, "chat delivery failed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{CaptureSink, SinkError};
    use async_trait::async_trait;
    use cord_kernel::OutputGateway;
    use cord_types::{OutputFragment, UserId};
    use std::sync::atomic::{AtomicBool, Ordering};

    const WINDOW: Duration = Duration::from_millis(20);

    struct Fixture {
        id: SubmissionId,
        registry: Arc<ChannelRegistry>,
        submissions: Arc<SubmissionRegistry>,
        sink: Arc<CaptureSink>,
        runner: DeliveryRunner,
    }

    fn fixture(profile: DeliveryProfile) -> Fixture {
        let registry = Arc::new(ChannelRegistry::new());
        let submissions = Arc::new(SubmissionRegistry::new());
        let sink = Arc::new(CaptureSink::new());
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let stream = registry.subscribe(id).unwrap();
        let batches = BatchStream::new(stream, WINDOW, profile.deadline);
        let runner = DeliveryRunner {
            id,
            conversation: ConversationId::new("19:test"),
            profile,
            batches,
            classifier: Arc::new(Classifier::new()),
            sink: sink.clone(),
            channels: registry.clone(),
            submissions: submissions.clone(),
            viewer_url: format!("https://localhost:3978/executor?Token={id}"),
        };
        Fixture {
            id,
            registry,
            submissions,
            sink,
            runner,
        }
    }

    fn quick_profile() -> DeliveryProfile {
        DeliveryProfile::new("done 👍", "issues... 👎")
            .with_settle(Duration::from_millis(5))
            .with_deadline(Duration::from_millis(400))
    }

    // === Rendering per category ===

    #[tokio::test]
    async fn image_batch_becomes_image_message() {
        let f = fixture(quick_profile());
        f.registry
            .publish(f.id, OutputFragment::html("<img src=\"http://x/y.png\">"));
        f.registry.complete(f.id);
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0].content,
            ChatContent::Image {
                url: "http://x/y.png".into()
            }
        );
    }

    #[tokio::test]
    async fn classification_batch_becomes_formatted_text() {
        let f = fixture(quick_profile());
        let markup = "<tr><th>Label</th><th>Confidence</th></tr>\
                      <span class=\"dni-plaintext\">cat</span><span class=\"dni-plaintext\">0.97</span>";
        f.registry.publish(f.id, OutputFragment::html(markup));
        f.registry.complete(f.id);
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(
            messages[0].content,
            ChatContent::Text("**Label**: _cat_\r\n\n**Confidence**: _0.97_".into())
        );
    }

    #[tokio::test]
    async fn plain_text_batch_is_fenced() {
        let f = fixture(quick_profile());
        f.registry.publish(f.id, OutputFragment::text("out"));
        f.registry.complete(f.id);
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages[0].content, ChatContent::Text("```\r\nout".into()));
    }

    // === Fallback card once-only ===

    #[tokio::test]
    async fn viewer_card_sent_at_most_once() {
        let f = fixture(quick_profile());
        let id = f.id;
        let registry = f.registry.clone();
        tokio::spawn(async move {
            registry.publish(id, OutputFragment::html("<video>one</video>"));
            tokio::time::sleep(WINDOW * 3).await;
            registry.publish(id, OutputFragment::html("<video>two</video>"));
            tokio::time::sleep(WINDOW * 3).await;
            registry.complete(id);
        });
        f.runner.run().await;

        let messages = f.sink.messages();
        let cards = messages
            .iter()
            .filter(|m| matches!(m.content, ChatContent::ViewerCard { .. }))
            .count();
        assert_eq!(cards, 1);
        // card + done notice only
        assert_eq!(messages.len(), 2);

        if let ChatContent::ViewerCard {
            submission, url, ..
        } = &messages[0].content
        {
            assert_eq!(*submission, f.id);
            assert!(url.contains(&f.id.to_string()));
        } else {
            panic!("expected a viewer card first");
        }
    }

    // === Terminal notices ===

    #[tokio::test]
    async fn done_notice_is_exactly_one_and_last() {
        let f = fixture(quick_profile());
        f.registry.publish(f.id, OutputFragment::text("a"));
        f.registry.complete(f.id);
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages.last().unwrap().content,
            ChatContent::Text("done 👍".into())
        );
    }

    #[tokio::test]
    async fn failed_notice_carries_error_in_fence() {
        let f = fixture(quick_profile());
        f.registry.fail(f.id, "null reference");
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].content,
            ChatContent::Text("issues... 👎\r\n```null reference```".into())
        );
    }

    #[tokio::test]
    async fn timeout_produces_single_failure_notice() {
        let profile = quick_profile().with_deadline(Duration::from_millis(60));
        let f = fixture(profile);
        // nobody ever terminates the channel
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages.len(), 1);
        match &messages[0].content {
            ChatContent::Text(body) => {
                assert!(body.contains("execution timed out"), "got: {body}");
            }
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn terminal_notice_attaches_mention_when_referenced() {
        let mention = Mention::new(UserId::new("29:u"), "Ada");
        let profile = DeliveryProfile::new(
            format!("Good news, {}! I'm all done here 👍", mention.marker()),
            "issues",
        )
        .with_settle(Duration::from_millis(5))
        .with_deadline(Duration::from_millis(400))
        .with_mention(mention.clone());
        let f = fixture(profile);
        f.registry.complete(f.id);
        f.runner.run().await;

        let messages = f.sink.messages();
        assert_eq!(messages[0].mention, Some(mention));
    }

    // === Cleanup & resilience ===

    #[tokio::test]
    async fn registries_are_pruned_after_terminal() {
        let f = fixture(quick_profile());
        f.submissions
            .store(crate::Submission::new(cord_kernel::ExecCommand::new(
                f.id, "code", "csharp",
            )))
            .unwrap();
        f.registry.complete(f.id);
        let (registry, submissions, id) = (f.registry.clone(), f.submissions.clone(), f.id);
        f.runner.run().await;

        assert!(!registry.contains(id));
        assert!(submissions.lookup(id).is_err());
    }

    struct FlakySink {
        failed_once: AtomicBool,
        inner: CaptureSink,
    }

    #[async_trait]
    impl ChatSink for FlakySink {
        async fn deliver(&self, message: ChatMessage) -> Result<(), SinkError> {
            if !self.failed_once.swap(true, Ordering::SeqCst) {
                return Err(SinkError::Unavailable("transport hiccup".into()));
            }
            self.inner.deliver(message).await
        }
    }

    #[tokio::test]
    async fn sink_failure_does_not_swallow_the_terminal_notice() {
        let registry = Arc::new(ChannelRegistry::new());
        let submissions = Arc::new(SubmissionRegistry::new());
        let sink = Arc::new(FlakySink {
            failed_once: AtomicBool::new(false),
            inner: CaptureSink::new(),
        });
        let id = SubmissionId::new();
        registry.get_or_create(id);
        let stream = registry.subscribe(id).unwrap();
        let runner = DeliveryRunner {
            id,
            conversation: ConversationId::new("19:test"),
            profile: quick_profile(),
            batches: BatchStream::new(stream, WINDOW, Duration::from_millis(400)),
            classifier: Arc::new(Classifier::new()),
            sink: sink.clone(),
            channels: registry.clone(),
            submissions,
            viewer_url: String::new(),
        };

        registry.publish(id, OutputFragment::text("dropped"));
        registry.complete(id);
        runner.run().await;

        // the batch message was lost to the flaky transport, the
        // terminal notice still made it
        let messages = sink.inner.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, ChatContent::Text("done 👍".into()));
    }
}
