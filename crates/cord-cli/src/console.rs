//! Console rendering of outward chat messages.

use async_trait::async_trait;
use cord_runtime::{ChatContent, ChatMessage, ChatSink, SinkError};

/// A [`ChatSink`] that renders messages to stdout.
///
/// The `\r\n` line convention of the chat transport is translated to
/// plain newlines for the terminal.
#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    /// Creates the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatSink for ConsoleSink {
    async fn deliver(&self, message: ChatMessage) -> Result<(), SinkError> {
        match message.content {
            ChatContent::Text(body) => {
                println!("cord │ {}", body.replace("\r\n", "\n").replace('\r', "\n"));
            }
            ChatContent::Image { url } => {
                println!("cord │ [image] {url}");
            }
            ChatContent::ViewerCard {
                title,
                subtitle,
                button,
                url,
                ..
            } => {
                println!("cord │ ┌ {title}");
                println!("cord │ │ {subtitle}");
                println!("cord │ └ [{button}] {url}");
            }
        }
        Ok(())
    }
}
