use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use array_protocol::ArrayError;
use tracing::{debug, warn};

use crate::clock::Clock;

/// Outcome of one predicate evaluation (spec §4.D).
pub enum PollOutcome {
    /// Condition reached; polling stops successfully.
    Done,
    /// Condition not yet reached; sleep `interval` and try again.
    Pending,
}

/// Bounded-time `wait-until-predicate` poller (spec §4.D).
///
/// `waitUntil` invokes the predicate immediately, then on every `Pending`
/// result sleeps `interval` and retries, until either the predicate reports
/// `Done`, the predicate errors, or the total elapsed wall time exceeds
/// `budget` (in which case `ArrayError::Timeout` is returned).
pub struct Poller {
    clock: Arc<dyn Clock>,
}

impl Poller {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub async fn wait_until<F, Fut>(
        &self,
        label: &str,
        budget: Duration,
        interval: Duration,
        mut predicate: F,
    ) -> Result<(), ArrayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<PollOutcome, ArrayError>>,
    {
        let start = self.clock.now_millis();
        loop {
            match predicate().await? {
                PollOutcome::Done => {
                    debug!(label, "poll predicate satisfied");
                    return Ok(());
                }
                PollOutcome::Pending => {
                    let elapsed = self.clock.now_millis().saturating_sub(start);
                    if elapsed as u128 > budget.as_millis() {
                        warn!(label, elapsed_ms = elapsed, "poll budget exceeded");
                        return Err(ArrayError::Timeout(label.to_string()));
                    }
                    self.clock.sleep(interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_predicate_is_done() {
        let clock = Arc::new(FakeClock::new());
        let poller = Poller::new(clock.clone());
        let calls = AtomicU32::new(0);
        let result = poller
            .wait_until(
                "clone-split",
                Duration::from_secs(10),
                Duration::from_secs(1),
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n >= 2 {
                            Ok(PollOutcome::Done)
                        } else {
                            Ok(PollOutcome::Pending)
                        }
                    }
                },
            )
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn times_out_when_budget_exceeded() {
        let clock = Arc::new(FakeClock::new());
        let poller = Poller::new(clock);
        let result = poller
            .wait_until(
                "pair-delete",
                Duration::from_secs(5),
                Duration::from_secs(1),
                || async { Ok(PollOutcome::Pending) },
            )
            .await;
        assert!(matches!(result, Err(ArrayError::Timeout(_))));
    }

    #[tokio::test]
    async fn propagates_predicate_error_immediately() {
        let clock = Arc::new(FakeClock::new());
        let poller = Poller::new(clock);
        let result: Result<(), ArrayError> = poller
            .wait_until(
                "fault",
                Duration::from_secs(5),
                Duration::from_secs(1),
                || async { Err(ArrayError::Server { code: 9999, op: "poll".into() }) },
            )
            .await;
        assert!(matches!(result, Err(ArrayError::Server { .. })));
    }
}
