use std::sync::Arc;
use std::time::Duration;

use array_client::ArrayAdapter;
use array_protocol::record::{ClonePairState, FileSystem, Lun, SplitState};
use array_protocol::ArrayError;
use task_flow::{PollOutcome, Poller};

/// Budgets from spec §4.D: "clone/split up to 6 hours... 5-second intervals
/// for the long polls".
pub const CLONE_BUDGET: Duration = Duration::from_secs(6 * 60 * 60);
pub const CLONE_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for a ClonePair to reach a terminal state (spec §4.E.1.4). On
/// success the pair is deleted (the clone is now a fully independent
/// object); `fault` is a terminal failure and is surfaced without deleting
/// the pair, so operators can inspect it.
pub async fn wait_clone_pair(
    adapter: &ArrayAdapter,
    poller: &Poller,
    pair_id: &str,
) -> Result<(), ArrayError> {
    poller
        .wait_until("clone-pair", CLONE_BUDGET, CLONE_INTERVAL, || async {
            let pair = adapter.query_clone_pair_by_id(pair_id).await?;
            match pair.state {
                ClonePairState::Normal => Ok(PollOutcome::Done),
                ClonePairState::Fault => Err(ArrayError::Server {
                    code: -1,
                    op: format!("clone-pair {pair_id} entered fault state"),
                }),
                _ => Ok(PollOutcome::Pending),
            }
        })
        .await?;
    adapter.delete_clone_pair(pair_id).await
}

/// Waits for a LunCopy job to reach a terminal state (spec §4.E.1.4). On
/// success the LunCopy is deleted, along with the intermediate snapshot if
/// one is known — the idempotent already-exists path rediscovers a LunCopy
/// without knowing whether it had one, so `None` is accepted there.
pub async fn wait_lun_copy(
    adapter: &ArrayAdapter,
    poller: &Poller,
    copy_id: &str,
    intermediate_snapshot_id: Option<&str>,
) -> Result<(), ArrayError> {
    poller
        .wait_until("lun-copy", CLONE_BUDGET, CLONE_INTERVAL, || async {
            let copy = adapter.query_lun_copy_by_id(copy_id).await?;
            if copy.state.is_terminal_failure() {
                return Err(ArrayError::Server {
                    code: -1,
                    op: format!("lun-copy {copy_id} failed: {:?}", copy.state),
                });
            }
            if copy.state.is_transient() {
                return Ok(PollOutcome::Pending);
            }
            Ok(PollOutcome::Done)
        })
        .await?;
    adapter.delete_lun_copy(copy_id).await?;
    if let Some(snapshot_id) = intermediate_snapshot_id {
        adapter.delete_snapshot(snapshot_id).await?;
    }
    Ok(())
}

/// Resolves and waits out any ClonePair/LunCopy still converging against
/// `lun` (spec §4.E.1 step 3's idempotent-return clause). No-op if `lun`'s
/// own running status is already terminal or no matching pair/copy is
/// found on the array.
pub async fn wait_if_converging(adapter: &ArrayAdapter, poller: &Poller, lun: &Lun) -> Result<(), ArrayError> {
    if lun.is_clone_split_terminal {
        return Ok(());
    }
    if adapter.supports_clone_pair() {
        if let Some(pair) = adapter.find_clone_pair_by_target_id(&lun.id).await? {
            return wait_clone_pair(adapter, poller, &pair.id).await;
        }
    } else if let Some(copy) = adapter.find_lun_copy_by_target_id(&lun.id).await? {
        return wait_lun_copy(adapter, poller, &copy.id, None).await;
    }
    Ok(())
}

/// Waits out a filesystem split still converging against `fs` (spec
/// §4.E.1 step 3's idempotent-return clause, NAS side). No-op if `fs`'s own
/// split status is already terminal.
pub async fn wait_if_fs_converging(adapter: &ArrayAdapter, poller: &Poller, fs: &FileSystem) -> Result<(), ArrayError> {
    if fs.is_clone_split_terminal {
        return Ok(());
    }
    wait_fs_split(adapter, poller, &fs.id).await
}

/// Waits for a filesystem split to finish (spec §4.E.1.4).
pub async fn wait_fs_split(
    adapter: &ArrayAdapter,
    poller: &Poller,
    fs_id: &str,
) -> Result<(), ArrayError> {
    poller
        .wait_until("fs-split", CLONE_BUDGET, CLONE_INTERVAL, || async {
            let state = adapter.query_filesystem_split_status(fs_id).await?;
            match state {
                SplitState::Abnormal => Err(ArrayError::Server {
                    code: -1,
                    op: format!("filesystem {fs_id} split went abnormal"),
                }),
                s if s.is_transient() => Ok(PollOutcome::Pending),
                _ => Ok(PollOutcome::Done),
            }
        })
        .await
}

/// Clone-capacity rule (spec §4.E.1 step 3): target size must be >= source
/// size. When it is strictly larger, the clone must first be created at
/// source size and extended only after the clone/copy completes (arrays
/// reject resizing a LUN mid-copy).
pub fn validate_clone_capacity(target: i64, source: i64) -> Result<(), ArrayError> {
    if target < source {
        return Err(ArrayError::Precondition(format!(
            "clone target size {target} is smaller than source size {source}"
        )));
    }
    Ok(())
}

pub fn needs_post_clone_extend(target: i64, source: i64) -> bool {
    target > source
}

/// Convenience constructor bundling a production `Poller` with the
/// process-wide tokio clock, used by orchestrator entry points.
pub fn production_poller() -> Poller {
    Poller::new(Arc::new(task_flow::TokioClock))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rule_rejects_shrink() {
        assert!(validate_clone_capacity(5, 10).is_err());
        assert!(validate_clone_capacity(10, 10).is_ok());
        assert!(validate_clone_capacity(20, 10).is_ok());
    }

    #[test]
    fn post_clone_extend_only_when_strictly_larger() {
        assert!(!needs_post_clone_extend(10, 10));
        assert!(needs_post_clone_extend(20, 10));
    }
}
