//! Shared test fixtures.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Mutex;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::explain::{ChatMessage, LlmActor};
use crate::storage;

/// A migrated store in a temporary directory. The directory lives as long as the pool.
pub struct TestDb {
    pub pool: SqlitePool,
    _dir: TempDir,
}

pub async fn test_db() -> TestDb {
    let dir = tempdir().expect("Failed to create temp dir");
    let pool = storage::init_db(&dir.path().join("test.sqlite"))
        .await
        .expect("Failed to create test pool");
    TestDb { pool, _dir: dir }
}

/// Mock LLM Actor that streams scripted chunks
pub struct MockLlmActor {
    pub chunks: Vec<String>,
    /// Send this many chunks, then fail with an upstream 500.
    pub fail_after: Option<usize>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockLlmActor {
    pub fn new(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail_after: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_after(mut self, sent: usize) -> Self {
        self.fail_after = Some(sent);
        self
    }

    /// System prompt of the most recent call.
    pub fn last_system_prompt(&self) -> Option<String> {
        self.seen
            .lock()
            .unwrap()
            .last()
            .and_then(|messages| messages.iter().find(|m| m.role == "system"))
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl LlmActor for MockLlmActor {
    async fn stream(
        &self,
        messages: Vec<ChatMessage>,
        chunk_sender: mpsc::Sender<String>,
    ) -> Result<(), AppError> {
        self.seen.lock().unwrap().push(messages);

        for (i, chunk) in self.chunks.iter().enumerate() {
            if self.fail_after == Some(i) {
                break;
            }
            if chunk_sender.send(chunk.clone()).await.is_err() {
                return Ok(());
            }
        }

        match self.fail_after {
            Some(_) => Err(AppError::Upstream {
                status: 500,
                message: "mock upstream failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}
