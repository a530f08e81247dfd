//! Client for `POST /api/explain`.
//!
//! Accumulates the streamed answer into an [`OutputPane`], the same way the learning
//! interface fills its output area.

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::explain::ExplainRequest;
use crate::models::ExplainMode;

/// Shown instead of the answer when the request fails.
pub const GENERIC_ERROR_MESSAGE: &str =
    "**Something went wrong.** We couldn't generate an explanation right now. Please try again in a moment.";

/// Text area receiving the streamed markdown, verbatim.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputPane {
    content: String,
}

impl OutputPane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    pub fn replace(&mut self, content: &str) {
        self.content = content.to_string();
    }

    pub fn clear(&mut self) {
        self.content.clear();
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplainOutcome {
    /// The whole answer was streamed into the pane.
    Completed { chars: usize },
    /// The server answered with a non-success status; the pane shows the generic error.
    Rejected { status: u16 },
}

/// Incremental UTF-8 decoder: bytes of a character split across chunks are held back
/// until the rest arrives. Invalid sequences become U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // Incomplete character at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    /// Flushes whatever is still pending at the end of the stream.
    pub fn finish(&mut self) -> String {
        let rest = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&rest).into_owned()
    }
}

pub struct ExplainClient {
    http: Client,
    base_url: String,
}

impl ExplainClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Sends one explain request and streams the answer into `pane`.
    ///
    /// The pane is cleared first. On a non-success status or a transport failure its
    /// content is replaced by [`GENERIC_ERROR_MESSAGE`]; transport failures are also returned.
    pub async fn explain(
        &self,
        input: &str,
        mode: ExplainMode,
        pane: &mut OutputPane,
    ) -> Result<ExplainOutcome, AppError> {
        pane.clear();

        let result = self.stream_into(input, mode, pane).await;
        match &result {
            Ok(ExplainOutcome::Rejected { .. }) | Err(_) => pane.replace(GENERIC_ERROR_MESSAGE),
            Ok(ExplainOutcome::Completed { .. }) => {}
        }
        result
    }

    async fn stream_into(
        &self,
        input: &str,
        mode: ExplainMode,
        pane: &mut OutputPane,
    ) -> Result<ExplainOutcome, AppError> {
        let request = ExplainRequest::new(input, mode);
        let res = self
            .http
            .post(format!("{}/api/explain", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            warn!("Explain request rejected with status {}", status);
            return Ok(ExplainOutcome::Rejected {
                status: status.as_u16(),
            });
        }

        let mut stream = res.bytes_stream();
        let mut decoder = Utf8Decoder::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            pane.append(&decoder.decode(&chunk));
        }
        pane.append(&decoder.finish());

        let chars = pane.content().chars().count();
        debug!("Explanation received ({} chars)", chars);
        Ok(ExplainOutcome::Completed { chars })
    }
}
