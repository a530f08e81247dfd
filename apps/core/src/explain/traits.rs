use async_trait::async_trait;
use tokio::sync::mpsc;

use super::messages::ChatMessage;
use crate::error::AppError;

/// Public interface of a streaming language model.
///
/// The production implementation is [`super::llm::LlmActorHandle`]; tests substitute scripted
/// models.
#[async_trait]
pub trait LlmActor: Send + Sync + 'static {
    /// Streams the answer to `messages`, sending each text delta on `chunk_sender`.
    ///
    /// Resolves once the stream has ended. A dropped receiver ends the stream early and
    /// is not an error.
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        chunk_sender: mpsc::Sender<String>,
    ) -> Result<(), AppError>;
}
