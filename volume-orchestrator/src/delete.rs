use array_client::ArrayAdapter;
use array_protocol::record::RssFlags;
use array_protocol::ArrayError;

/// Dependent relationships a volume may carry, read by the caller (usually
/// from the CSI volume's persisted metadata, since the array has no
/// reverse lookup from a LUN/filesystem id to its pair ids) before
/// deleting it (spec §4.E.2 step 2).
#[derive(Debug, Clone, Default)]
pub struct DeleteDependents {
    pub rss: RssFlags,
    pub hypermetro_pair_id: Option<String>,
    pub replication_pair_id: Option<String>,
    pub lun_copy_id: Option<String>,
}

/// Deletes a SAN volume by canonical name (spec §4.E.2). Idempotent: a
/// missing volume is success. Ordered teardown: any HyperMetro pair is
/// stopped and torn down first, then any Replication pair is split and
/// torn down, then any in-flight LunCopy is cancelled, and only then is
/// the local LUN itself deleted — the array rejects deleting a LUN that
/// still has a live pair or copy relationship.
pub async fn delete_san_volume(
    adapter: &ArrayAdapter,
    canonical_name: &str,
    dependents: &DeleteDependents,
) -> Result<(), ArrayError> {
    let lun = match adapter.get_lun_by_name(canonical_name).await? {
        Some(lun) => lun,
        None => return Ok(()),
    };

    if dependents.rss.hypermetro {
        if let Some(pair_id) = &dependents.hypermetro_pair_id {
            teardown_hypermetro_pair(adapter, pair_id).await?;
        }
    }
    if dependents.rss.replication {
        if let Some(pair_id) = &dependents.replication_pair_id {
            teardown_replication_pair(adapter, pair_id).await?;
        }
    }
    if dependents.rss.lun_copy || dependents.rss.hyper_copy {
        if let Some(copy_id) = &dependents.lun_copy_id {
            adapter.delete_lun_copy(copy_id).await?;
        }
    }

    adapter.delete_lun(&lun.id).await
}

/// Deletes a NAS filesystem by canonical name (spec §4.E.2). The share and
/// quota attached to the filesystem must go before the filesystem itself;
/// a filesystem still carrying more snapshots than its allowed count is
/// left alone rather than force-deleted. The allowed count is 0 for a
/// plain or HyperMetro filesystem and 1 only when `dependents.rss.
/// replication` is set (spec §4.E.2 step 4), mirroring the `RssFlags`-
/// driven teardown ordering in [`delete_san_volume`].
pub async fn delete_nas_volume(
    adapter: &ArrayAdapter,
    canonical_name: &str,
    share_id: Option<&str>,
    quota_id: Option<&str>,
    dependents: &DeleteDependents,
) -> Result<(), ArrayError> {
    let fs = match adapter.get_filesystem_by_name(canonical_name).await? {
        Some(fs) => fs,
        None => return Ok(()),
    };

    let allowed_snapshots = if dependents.rss.replication { 1 } else { 0 };
    if fs.snapshot_count > allowed_snapshots {
        return Err(ArrayError::Precondition(format!(
            "filesystem {} still has {} snapshots, refusing to delete",
            fs.id, fs.snapshot_count
        )));
    }

    if let Some(share_id) = share_id {
        adapter.delete_share(share_id).await?;
    }
    if let Some(quota_id) = quota_id {
        adapter.delete_quota(quota_id).await?;
    }

    adapter.delete_filesystem(&fs.id).await
}

/// Stops then deletes a HyperMetro pair by id (spec §3 invariant: a
/// running pair must be stopped before delete). Idempotent: an
/// already-absent pair is success.
pub async fn teardown_hypermetro_pair(adapter: &ArrayAdapter, pair_id: &str) -> Result<(), ArrayError> {
    let pair = match adapter.query_hypermetro_pair_by_id(pair_id).await? {
        Some(pair) => pair,
        None => return Ok(()),
    };
    if pair.running_status.is_running() {
        adapter.stop_hypermetro_pair(pair_id).await?;
    }
    adapter.delete_hypermetro_pair(pair_id).await
}

/// Splits then deletes a Replication pair by id. Idempotent.
pub async fn teardown_replication_pair(adapter: &ArrayAdapter, pair_id: &str) -> Result<(), ArrayError> {
    let pair = match adapter.query_replication_pair_by_id(pair_id).await? {
        Some(pair) => pair,
        None => return Ok(()),
    };
    if pair.running_status.is_running() {
        adapter.split_replication_pair(pair_id).await?;
    }
    adapter.delete_replication_pair(pair_id).await
}
