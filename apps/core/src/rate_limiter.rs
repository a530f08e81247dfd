use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Sliding-window rate limiter for explanation requests.
///
/// Each client (the caller's IP address) may start `limit` explanations per `window`.
/// Explanations are the only expensive route, so nothing else is limited.
pub struct RateLimiter {
    /// Request timestamps per client, oldest first.
    requests: HashMap<String, Vec<Instant>>,
    limit: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(limit: usize, window: Duration) -> Self {
        RateLimiter {
            requests: HashMap::new(),
            limit,
            window,
        }
    }

    /// Records a request from `client` and returns whether it is allowed.
    ///
    /// Rejected requests are not recorded, so a client that keeps retrying is let back in
    /// as soon as its oldest request leaves the window.
    pub fn check(&mut self, client: &str) -> bool {
        let now = Instant::now();
        let window = self.window;

        let timestamps = self.requests.entry(client.to_string()).or_default();
        timestamps.retain(|&t| now.duration_since(t) < window);

        if timestamps.len() < self.limit {
            timestamps.push(now);
            true
        } else {
            debug!("Rate limit reached for client {}", client);
            false
        }
    }

    /// How long `client` must wait before its next request is allowed. Zero when it may go now.
    pub fn retry_after(&self, client: &str) -> Duration {
        let Some(timestamps) = self.requests.get(client) else {
            return Duration::ZERO;
        };
        if timestamps.len() < self.limit {
            return Duration::ZERO;
        }
        timestamps
            .first()
            .map(|oldest| self.window.saturating_sub(oldest.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Drops clients with no request left inside the window.
    pub fn prune(&mut self) {
        let window = self.window;
        self.requests
            .retain(|_, timestamps| timestamps.iter().any(|t| t.elapsed() < window));
    }

    pub fn tracked_clients(&self) -> usize {
        self.requests.len()
    }
}
