//! GyaanForge core: a local learning-assistant service.
//!
//! Streams model explanations over HTTP and keeps the learner's session, knowledge graphs,
//! error history and traces in a small key/value store.

pub mod brain;
pub mod client;
pub mod config;
pub mod error;
pub mod explain;
pub mod fs_manager;
pub mod models;
pub mod preflight;
pub mod rate_limiter;
pub mod retry;
pub mod server;
pub mod session;
pub mod storage;

#[cfg(test)]
mod tests;
