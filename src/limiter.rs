//! Per-provider minimum-interval rate limiting.
//!
//! One `RateLimiter` exists per provider name for the whole process; adapters get
//! theirs from the `RateLimiterRegistry` built in `main`.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::{SERPER, SERPER_MIN_INTERVAL_SECS};

pub struct RateLimiter {
    min_interval: Duration,
    /// When the previous `wait()` returned. The lock is held across the sleep so
    /// callers are released one at a time, in arrival order.
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Sleeps until `min_interval` has passed since the previous call returned.
    pub async fn wait(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let pause = self.min_interval - elapsed;
                debug!(wait_ms = pause.as_millis() as u64, "rate limiter sleeping");
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }

    pub async fn reset(&self) {
        *self.last_call.lock().await = None;
    }
}

/// Process-wide map of provider name → shared limiter.
#[derive(Default)]
pub struct RateLimiterRegistry {
    limiters: DashMap<String, Arc<RateLimiter>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registry pre-populated with the default Serper interval.
    pub fn with_defaults() -> Arc<Self> {
        let registry = Self::new();
        registry.get_or_create(SERPER, Duration::from_secs_f64(SERPER_MIN_INTERVAL_SECS));
        registry
    }

    /// Returns the limiter for `provider`, creating it with `min_interval` on first use.
    /// An existing limiter keeps the interval it was created with.
    pub fn get_or_create(&self, provider: &str, min_interval: Duration) -> Arc<RateLimiter> {
        self.limiters
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(min_interval)))
            .clone()
    }

    pub fn get(&self, provider: &str) -> Option<Arc<RateLimiter>> {
        self.limiters.get(provider).map(|l| Arc::clone(l.value()))
    }

    pub fn len(&self) -> usize {
        self.limiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limiters.is_empty()
    }
}
