use std::collections::{HashMap, VecDeque};
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for the fixed-window rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: usize,
    pub sweep_interval: Duration,
}

impl RateLimitConfig {
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
    pub const DEFAULT_MAX_REQUESTS: usize = 100;
    /// Shortest period `RateLimiter::spawn_sweeper` will tick at.
    pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

    #[must_use]
    pub const fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            sweep_interval: window,
        }
    }

    #[must_use]
    pub const fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW, Self::DEFAULT_MAX_REQUESTS)
    }
}

/// A rejected check. Nothing was recorded for the attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub client_id: String,
    pub limit: usize,
    pub window: Duration,
    pub retry_after: Duration,
}

impl RateLimited {
    /// Whole seconds until a retry can succeed, rounded up.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Too many requests ({} per {}s). Please try again in {}s.",
            self.limit,
            self.window.as_secs(),
            self.retry_after_secs()
        )
    }
}

impl Error for RateLimited {}

/// Fixed-window request counter keyed by client identifier.
///
/// Clones share state. The check-then-record sequence for a client runs
/// under one lock, so concurrent callers cannot both slip under the limit.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

struct RateLimiterInner {
    config: RateLimitConfig,
    buckets: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                config,
                buckets: Mutex::new(HashMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.inner.config
    }

    /// Admits one request for `client_id` or reports when to retry.
    ///
    /// # Errors
    /// Returns `RateLimited` when the client already made `max_requests`
    /// requests inside the current window.
    pub async fn check(&self, client_id: &str) -> Result<(), RateLimited> {
        let RateLimitConfig {
            window,
            max_requests,
            ..
        } = self.inner.config;
        let now = Instant::now();
        let mut buckets = self.inner.buckets.lock().await;
        let bucket = buckets.entry(client_id.to_string()).or_default();
        while bucket
            .front()
            .is_some_and(|seen| now.duration_since(*seen) >= window)
        {
            bucket.pop_front();
        }

        if bucket.len() >= max_requests {
            let retry_after = bucket
                .front()
                .map_or(window, |oldest| window.saturating_sub(now.duration_since(*oldest)));
            warn!(client = client_id, limit = max_requests, "rate limit exceeded");
            return Err(RateLimited {
                client_id: client_id.to_string(),
                limit: max_requests,
                window,
                retry_after,
            });
        }

        bucket.push_back(now);
        Ok(())
    }

    /// Drops clients with no request inside the window. Returns how many
    /// were dropped.
    pub async fn evict_idle(&self) -> usize {
        let window = self.inner.config.window;
        let now = Instant::now();
        let mut buckets = self.inner.buckets.lock().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            bucket
                .back()
                .is_some_and(|seen| now.duration_since(*seen) < window)
        });
        before.saturating_sub(buckets.len())
    }

    pub async fn tracked_clients(&self) -> usize {
        self.inner.buckets.lock().await.len()
    }

    /// Evicts idle clients every `sweep_interval`, raised to
    /// `RateLimitConfig::MIN_SWEEP_INTERVAL` when shorter.
    pub fn spawn_sweeper(self) -> tokio::task::JoinHandle<()> {
        let interval = self
            .inner
            .config
            .sweep_interval
            .max(RateLimitConfig::MIN_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle().await;
                if evicted > 0 {
                    debug!(evicted, "evicted idle rate limit buckets");
                }
            }
        })
    }
}
