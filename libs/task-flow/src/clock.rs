use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Wall-time source for the poller. Pollers are driven by wall time, not
/// logical time (spec §9 design note); injecting this trait is what lets
/// tests assert on elapsed-time bounds without a real `sleep`.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now_millis(&self) -> u64 {
        // Monotonic within a process; only ever compared to another value
        // from the same clock, so an arbitrary epoch is fine.
        static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
        let epoch = EPOCH.get_or_init(std::time::Instant::now);
        epoch.elapsed().as_millis() as u64
    }

    async fn sleep(&self, d: Duration) {
        tokio::time::sleep(d).await;
    }
}

/// Test clock: `sleep` advances a shared counter instead of waiting, so
/// poller tests run instantly while still exercising the elapsed-time math.
#[derive(Debug, Clone, Default)]
pub struct FakeClock {
    millis: Arc<AtomicU64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, d: Duration) {
        self.millis.fetch_add(d.as_millis() as u64, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clock for FakeClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }

    async fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}
