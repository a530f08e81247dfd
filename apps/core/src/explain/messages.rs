use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

use crate::error::AppError;

/// One message of an OpenAI-style chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Messages that can be sent to the LLM actor.
#[derive(Debug)]
pub enum LlmMessage {
    /// Streams a chat completion.
    Stream {
        messages: Vec<ChatMessage>,
        /// Receives each text delta as it arrives.
        chunk_sender: mpsc::Sender<String>,
        /// Signals completion or an error for the whole stream.
        responder: oneshot::Sender<Result<(), AppError>>,
    },
}
