use array_client::ArrayAdapter;
use array_protocol::ArrayError;

use crate::api::Volume;

/// Extends a volume to `new_size` (spec §4.E.3). The array rejects shrink
/// requests, so this validates `new_size > current_size` before touching
/// any pair — a rejected expand must never have stopped or split a
/// HyperMetro/Replication pair along the way. Returns whether the volume
/// is attached to a remote pair (so the caller can decide whether a
/// node-side resize needs cross-cluster coordination).
pub async fn expand_san_volume(
    adapter: &ArrayAdapter,
    canonical_name: &str,
    new_size: i64,
    hypermetro_pair_id: Option<&str>,
    replication_pair_id: Option<&str>,
) -> Result<(Volume, bool), ArrayError> {
    let lun = adapter
        .get_lun_by_name(canonical_name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("volume `{canonical_name}`")))?;

    if new_size <= lun.capacity {
        return Err(ArrayError::Precondition(format!(
            "requested size {new_size} is not larger than current size {}",
            lun.capacity
        )));
    }

    let attached = if let Some(pair_id) = hypermetro_pair_id {
        expand_with_hypermetro(adapter, pair_id, &lun.id, new_size).await?;
        true
    } else if let Some(pair_id) = replication_pair_id {
        expand_with_replication(adapter, pair_id, &lun.id, new_size).await?;
        true
    } else {
        adapter.extend_lun(&lun.id, new_size).await?;
        false
    };

    Ok((
        Volume {
            name: lun.name,
            size_bytes: new_size,
            lun_wwn: lun.wwn,
        },
        attached,
    ))
}

/// HyperMetro expand (spec §4.E.3): precheck the remote pair exists, stop
/// it, extend the remote object, extend the local object, then resync.
/// If the local extend fails, resync is skipped on purpose — the pair is
/// left stopped rather than resynced against mismatched sizes, since an
/// operator needs to intervene at that point anyway.
async fn expand_with_hypermetro(
    adapter: &ArrayAdapter,
    pair_id: &str,
    local_id: &str,
    new_size: i64,
) -> Result<(), ArrayError> {
    let pair = adapter
        .query_hypermetro_pair_by_id(pair_id)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("hypermetro pair `{pair_id}`")))?;

    if pair.running_status.is_running() {
        adapter.stop_hypermetro_pair(pair_id).await?;
    }
    adapter.extend_lun(&pair.remote_object_id, new_size).await?;
    adapter.extend_lun(local_id, new_size).await?;
    adapter.sync_hypermetro_pair(pair_id).await
}

/// Replication expand (spec §4.E.3): precheck, split, extend remote,
/// extend local, resync. Same fail-stopped-not-resynced behavior as
/// HyperMetro if the local extend errors.
async fn expand_with_replication(
    adapter: &ArrayAdapter,
    pair_id: &str,
    local_id: &str,
    new_size: i64,
) -> Result<(), ArrayError> {
    let pair = adapter
        .query_replication_pair_by_id(pair_id)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("replication pair `{pair_id}`")))?;

    if pair.running_status.is_running() {
        adapter.split_replication_pair(pair_id).await?;
    }
    adapter.extend_lun(&pair.remote_object_id, new_size).await?;
    adapter.extend_lun(local_id, new_size).await?;
    adapter.sync_replication_pair(pair_id).await
}

/// Extends a NAS filesystem to `new_size` (spec §4.E.3). NAS has no pair
/// path here — HyperMetro/Replication for filesystems are out of this
/// pack's modeled scope (spec §1 non-goals treat NAS remote-pair file
/// services as advanced/edge).
pub async fn expand_nas_volume(
    adapter: &ArrayAdapter,
    canonical_name: &str,
    new_size: i64,
) -> Result<Volume, ArrayError> {
    let fs = adapter
        .get_filesystem_by_name(canonical_name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("volume `{canonical_name}`")))?;

    if new_size <= fs.capacity {
        return Err(ArrayError::Precondition(format!(
            "requested size {new_size} is not larger than current size {}",
            fs.capacity
        )));
    }

    adapter.extend_filesystem(&fs.id, new_size).await?;
    Ok(Volume {
        name: fs.name,
        size_bytes: new_size,
        lun_wwn: None,
    })
}
