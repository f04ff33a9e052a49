//! # Chat surface
//!
//! A chat message is sent once, then edited in place: cleared, streamed into
//! token by token, and finally committed with [`ChatMessage::update`]. Every
//! edit is forwarded to a [`ChatSink`] as a [`ChatEvent`], so the same
//! handler drives a terminal or an in-memory transcript.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::{AgentsError, Result};

/// One edit to a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Sent { id: String, content: String },
    Token { id: String, token: String },
    Cleared { id: String },
    Updated { id: String, content: String },
}

impl ChatEvent {
    pub fn message_id(&self) -> &str {
        match self {
            ChatEvent::Sent { id, .. }
            | ChatEvent::Token { id, .. }
            | ChatEvent::Cleared { id }
            | ChatEvent::Updated { id, .. } => id,
        }
    }
}

/// Receives chat events in the order they happen.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn emit(&self, event: ChatEvent) -> Result<()>;
}

/// A message in the conversation that can be edited after it is sent.
pub struct ChatMessage {
    id: String,
    content: String,
    sink: Arc<dyn ChatSink>,
}

impl ChatMessage {
    pub fn new(content: impl Into<String>, sink: Arc<dyn ChatSink>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content: content.into(),
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub async fn send(&self) -> Result<()> {
        self.sink
            .emit(ChatEvent::Sent {
                id: self.id.clone(),
                content: self.content.clone(),
            })
            .await
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.content.clear();
        self.sink
            .emit(ChatEvent::Cleared {
                id: self.id.clone(),
            })
            .await
    }

    /// Append `token` to the displayed content.
    pub async fn stream_token(&mut self, token: &str) -> Result<()> {
        self.content.push_str(token);
        self.sink
            .emit(ChatEvent::Token {
                id: self.id.clone(),
                token: token.to_string(),
            })
            .await
    }

    /// Commit the current content.
    pub async fn update(&self) -> Result<()> {
        self.sink
            .emit(ChatEvent::Updated {
                id: self.id.clone(),
                content: self.content.clone(),
            })
            .await
    }
}

impl std::fmt::Debug for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatMessage")
            .field("id", &self.id)
            .field("content", &self.content)
            .finish()
    }
}

/// Writes messages to stdout. Tokens are flushed as they arrive.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalSink;

#[async_trait]
impl ChatSink for TerminalSink {
    async fn emit(&self, event: ChatEvent) -> Result<()> {
        let mut out = std::io::stdout().lock();
        match event {
            ChatEvent::Sent { content, .. } => writeln!(out, "{}", content)?,
            ChatEvent::Token { token, .. } => write!(out, "{}", token)?,
            ChatEvent::Cleared { .. } => writeln!(out)?,
            // Already on screen.
            ChatEvent::Updated { .. } => {}
        }
        out.flush()?;
        Ok(())
    }
}

/// Keeps every event, for tests and for callers that render later.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ChatEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// What message `id` displays after replaying every event.
    pub fn content_of(&self, id: &str) -> Option<String> {
        self.contents().remove(id)
    }

    /// Displayed content per message id.
    pub fn contents(&self) -> HashMap<String, String> {
        let mut contents: HashMap<String, String> = HashMap::new();
        for event in self.events() {
            match event {
                ChatEvent::Sent { id, content } | ChatEvent::Updated { id, content } => {
                    contents.insert(id, content);
                }
                ChatEvent::Token { id, token } => {
                    contents.entry(id).or_default().push_str(&token);
                }
                ChatEvent::Cleared { id } => {
                    contents.insert(id, String::new());
                }
            }
        }
        contents
    }
}

#[async_trait]
impl ChatSink for MemorySink {
    async fn emit(&self, event: ChatEvent) -> Result<()> {
        self.events
            .lock()
            .map_err(|_| AgentsError::Other("chat transcript lock poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_message_lifecycle() {
        let sink = Arc::new(MemorySink::new());
        let mut message = ChatMessage::new("Fetching...", sink.clone());

        message.send().await.unwrap();
        assert_eq!(sink.content_of(message.id()).as_deref(), Some("Fetching..."));

        message.clear().await.unwrap();
        message.stream_token("| a |\n").await.unwrap();
        message.stream_token("| b |\n").await.unwrap();
        assert_eq!(message.content(), "| a |\n| b |\n");
        message.update().await.unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 5);
        assert!(matches!(events[1], ChatEvent::Cleared { .. }));
        assert!(events.iter().all(|e| e.message_id() == message.id()));
        assert_eq!(
            sink.content_of(message.id()).as_deref(),
            Some("| a |\n| b |\n")
        );
    }

    #[tokio::test]
    async fn test_messages_are_tracked_separately() {
        let sink = Arc::new(MemorySink::new());
        let first = ChatMessage::new("one", sink.clone());
        let second = ChatMessage::new("two", sink.clone());
        first.send().await.unwrap();
        second.send().await.unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(sink.contents().len(), 2);
    }

    #[test]
    fn test_event_serializes_with_tag() {
        let event = ChatEvent::Cleared { id: "m1".into() };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({"type": "cleared", "id": "m1"})
        );
    }
}
