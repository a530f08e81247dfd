//! # Explain Pipeline
//!
//! Turns a learner question into a streamed markdown answer.
//!
//! ## Components
//! - `guardrails`: input trimming, truncation and prompt-injection neutralization
//! - `prompts`: system prompt from mode, cognitive load, perspective and future-you
//! - `llm`: actor over an OpenAI-compatible streaming endpoint
//! - `trace`: metadata record of how each answer was produced
//! - `service`: orchestrates the above and persists graph, session and trace

pub mod guardrails;
pub mod llm;
pub mod messages;
pub mod prompts;
pub mod service;
pub mod trace;
pub mod traits;

pub use llm::LlmActorHandle;
pub use messages::ChatMessage;
pub use service::{ExplainRequest, ExplainService, INTERRUPTION_MARKER};
pub use trace::{Trace, TraceStatus};
pub use traits::LlmActor;
