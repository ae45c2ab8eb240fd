use crate::clock::Clock;
use crate::error::SearchError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: DateTime<Utc>,
    count: u32,
}

/// Fixed-window request limiter keyed by client id.
///
/// Closed windows are purged at most once per window length, from `check`.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, Window>>,
    last_purge: Mutex<DateTime<Utc>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            max_requests,
            window,
            clock,
            windows: Mutex::new(HashMap::new()),
            last_purge: Mutex::new(now),
        }
    }

    /// Count the request and report whether it fits in the client's current window.
    pub fn admit(&self, client_id: &str) -> bool {
        self.check(client_id).is_ok()
    }

    pub fn check(&self, client_id: &str) -> Result<(), SearchError> {
        let now = self.clock.now();
        self.maybe_purge(now);
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(client_id.to_string()).or_insert(Window {
            started_at: now,
            count: 0,
        });

        if elapsed(window.started_at, now) >= self.window {
            *window = Window {
                started_at: now,
                count: 0,
            };
        }

        if window.count >= self.max_requests {
            let remaining = self.window.saturating_sub(elapsed(window.started_at, now));
            let retry_after_secs = remaining.as_secs().max(1);
            warn!(client = %client_id, retry_after_secs, "rate limit exceeded");
            return Err(SearchError::RateLimitExceeded { retry_after_secs });
        }

        window.count += 1;
        Ok(())
    }

    /// Forget clients whose window has closed.
    pub fn purge_expired(&self) -> usize {
        self.purge_at(self.clock.now())
    }

    /// Clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn maybe_purge(&self, now: DateTime<Utc>) {
        {
            let mut last = self.last_purge.lock().unwrap_or_else(|e| e.into_inner());
            if elapsed(*last, now) < self.window {
                return;
            }
            *last = now;
        }
        let purged = self.purge_at(now);
        if purged > 0 {
            debug!(purged, "dropped closed rate-limit windows");
        }
    }

    fn purge_at(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let before = windows.len();
        windows.retain(|_, w| elapsed(w.started_at, now) < self.window);
        before - windows.len()
    }
}

fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since).to_std().unwrap_or_default()
}
