//! Conversation turn handling.
//!
//! [`CordBot`] sits between the chat transport and the runtime
//! dispatcher. Each inbound message is handled in decision order:
//!
//! 1. card action (language selection)
//! 2. code present → acknowledge + dispatch
//! 3. no session language → language prompt
//! 4. "👊" with the bot mentioned → fist bump
//! 5. "Hello" with the bot mentioned → introduction
//! 6. "help {topic}" → reflection snippet in simple render mode
//!
//! Everything conversation-facing is fire-and-forget: sink failures
//! are logged and never propagate, so one broken turn cannot take
//! down the loop for other conversations.

use std::sync::Arc;

use cord_runtime::{
    extract_code, CardAction, ChatMessage, ChatSink, CordConfig, DeliveryProfile, DispatchError,
    Dispatcher, InboundMessage, Mention, PipelineConfig, RenderMode, SessionStore, SubmitRequest,
};
use cord_types::ConversationId;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::replies;

/// The bot: turn handling on top of the dispatch pipeline.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use cord_app::CordBot;
/// use cord_kernel::LoopbackKernel;
/// use cord_runtime::{CordConfig, Dispatcher, MemorySessionStore, NullSink};
///
/// let config = CordConfig::default();
/// let sink = Arc::new(NullSink);
/// let dispatcher = Arc::new(Dispatcher::new(
///     Arc::new(LoopbackKernel::new()),
///     sink.clone(),
///     &config,
/// ));
/// let bot = CordBot::new(dispatcher, sink, Arc::new(MemorySessionStore::new()), &config);
/// # let _ = bot;
/// ```
pub struct CordBot {
    dispatcher: Arc<Dispatcher>,
    sink: Arc<dyn ChatSink>,
    sessions: Arc<dyn SessionStore>,
    pipeline: PipelineConfig,
    default_language: String,
    help_topic: Regex,
}

impl CordBot {
    /// Assembles the bot.
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        sink: Arc<dyn ChatSink>,
        sessions: Arc<dyn SessionStore>,
        config: &CordConfig,
    ) -> Self {
        Self {
            dispatcher,
            sink,
            sessions,
            pipeline: config.pipeline.clone(),
            default_language: config.kernel.default_language.clone(),
            help_topic: Regex::new(r"help (.*)$").expect("literal regex"),
        }
    }

    /// Handles one inbound message.
    pub async fn handle_message(&self, message: InboundMessage) {
        if message.action.is_some() {
            self.handle_card_action(&message).await;
            return;
        }

        let mention = message.sender_mention();
        if let Some(code) = extract_code(&message.text) {
            self.run_snippet(&message, &mention, code).await;
            return;
        }

        let state = self.sessions.load(&message.conversation);
        if state.language.is_none() {
            self.say(ChatMessage::text(
                message.conversation.clone(),
                replies::language_prompt(),
            ))
            .await;
        } else if message.text.contains('👊') && message.bot_mentioned {
            self.say(
                ChatMessage::text(
                    message.conversation.clone(),
                    replies::fist_bump(&mention.marker()),
                )
                .with_mention_if_referenced(&mention),
            )
            .await;
        } else if message.text.contains("Hello") && message.bot_mentioned {
            self.say(ChatMessage::text(
                message.conversation.clone(),
                replies::intro(),
            ))
            .await;
        } else if message.text.contains("help") {
            self.run_help(&message, &mention).await;
        }
    }

    /// Handles the bot being added to a conversation: seeds the
    /// session language and introduces itself.
    pub async fn handle_member_added(&self, conversation: &ConversationId) {
        let mut state = self.sessions.load(conversation);
        if state.language.is_none() {
            state.language = Some(self.default_language.clone());
            self.sessions.store(conversation, state);
        }
        self.say(ChatMessage::text(conversation.clone(), replies::intro()))
            .await;
    }

    async fn handle_card_action(&self, message: &InboundMessage) {
        let Some(CardAction::SelectLanguage { language }) = &message.action else {
            return;
        };
        let mut state = self.sessions.load(&message.conversation);
        if state.language.is_some() {
            // the language is set once per conversation; later
            // attempts are ignored
            debug!(conversation = %message.conversation, "language already set, ignoring");
            return;
        }
        state.language = Some(language.clone());
        self.sessions.store(&message.conversation, state);
        self.say(ChatMessage::text(
            message.conversation.clone(),
            replies::language_set(language),
        ))
        .await;
    }

    async fn run_snippet(&self, message: &InboundMessage, mention: &Mention, code: String) {
        if !self.dispatcher.ready() {
            self.reply_unavailable(message, mention).await;
            return;
        }

        let mut state = self.sessions.load(&message.conversation);
        let language = state
            .language
            .clone()
            .unwrap_or_else(|| self.default_language.clone());

        let is_new_active = state.active_user.as_ref() != Some(&message.sender);
        let record = state.user_mut(&message.sender, &message.sender_name);
        let ack = if is_new_active {
            replies::ack_new_user(&mention.marker(), &code)
        } else {
            replies::encouragement(&mention.marker(), record.submissions)
        };
        record.submissions += 1;
        state.active_user = Some(message.sender.clone());
        self.sessions.store(&message.conversation, state);

        self.say(
            ChatMessage::text(message.conversation.clone(), ack)
                .with_mention_if_referenced(mention),
        )
        .await;

        let profile = DeliveryProfile::new(
            replies::done_notice(&mention.marker()),
            replies::failed_notice(&mention.marker()),
        )
        .with_settle(self.pipeline.settle())
        .with_deadline(self.pipeline.deadline())
        .with_mention(mention.clone());

        self.dispatch(message, mention, code, language, profile)
            .await;
    }

    async fn run_help(&self, message: &InboundMessage, mention: &Mention) {
        let Some(topic) = self
            .help_topic
            .captures(&message.text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty())
        else {
            debug!(conversation = %message.conversation, "help without a topic, ignoring");
            return;
        };

        if !self.dispatcher.ready() {
            self.reply_unavailable(message, mention).await;
            return;
        }

        let state = self.sessions.load(&message.conversation);
        let language = state
            .language
            .clone()
            .unwrap_or_else(|| self.default_language.clone());

        let profile = DeliveryProfile::new(
            replies::help_done(&mention.marker()),
            replies::failed_notice(&mention.marker()),
        )
        .with_mode(RenderMode::Simple)
        .with_settle(self.pipeline.settle())
        .with_deadline(self.pipeline.deadline())
        .with_mention(mention.clone());

        self.dispatch(message, mention, replies::help_snippet(&topic), language, profile)
            .await;
    }

    async fn dispatch(
        &self,
        message: &InboundMessage,
        mention: &Mention,
        code: String,
        language: String,
        profile: DeliveryProfile,
    ) {
        let request = SubmitRequest {
            conversation: message.conversation.clone(),
            code,
            language,
            profile,
        };
        match self.dispatcher.submit(request).await {
            Ok(id) => debug!(%id, conversation = %message.conversation, "submission accepted"),
            Err(DispatchError::EngineUnavailable) => {
                // the engine went busy between the gate and the submit
                self.reply_unavailable(message, mention).await;
            }
            Err(error) => {
                error!(conversation = %message.conversation, %error, "dispatch failed");
            }
        }
    }

    async fn reply_unavailable(&self, message: &InboundMessage, mention: &Mention) {
        self.say(
            ChatMessage::text(
                message.conversation.clone(),
                replies::unavailable(&mention.marker()),
            )
            .with_mention_if_referenced(mention),
        )
        .await;
    }

    async fn say(&self, message: ChatMessage) {
        if let Err(error) = self.sink.deliver(message).await {
            warn!(%error, "reply delivery failed, dropped");
        }
    }
}
