//! In-memory latency histogram for provider calls.
//! Each adapter owns one; the binary logs percentiles at the end of a batch.

use std::sync::Mutex;
use std::time::Duration;

/// Values stored in milliseconds.
pub struct LatencyStats {
    provider: &'static str,
    inner: Option<Mutex<hdrhistogram::Histogram<u64>>>,
}

impl LatencyStats {
    /// Tracks 1ms to 10min, 3 significant figures.
    pub fn new(provider: &'static str) -> Self {
        let inner = hdrhistogram::Histogram::new_with_bounds(1, 600_000, 3)
            .ok()
            .map(Mutex::new);
        Self { provider, inner }
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn record_ms(&self, ms: u64) {
        if let Some(Ok(mut h)) = self.inner.as_ref().map(|m| m.lock()) {
            let _ = h.saturating_record(ms.max(1));
        }
    }

    pub fn record(&self, d: Duration) {
        let ms = d.as_millis().min(u128::from(u64::MAX)) as u64;
        self.record_ms(ms);
    }

    /// (p50_ms, p95_ms, p99_ms). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Some(Ok(h)) = self.inner.as_ref().map(|m| m.lock()) else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        (
            Some(h.value_at_quantile(0.5)),
            Some(h.value_at_quantile(0.95)),
            Some(h.value_at_quantile(0.99)),
        )
    }

    pub fn len(&self) -> u64 {
        match self.inner.as_ref().map(|m| m.lock()) {
            Some(Ok(h)) => h.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
