//! Volume orchestration (spec §4.E): turns a `VolumeIntent` into an ordered
//! sequence of array calls, using `task_flow::TaskFlow`/`Transaction` for
//! anything that needs compensating cleanup on partial failure.

pub mod api;
pub mod clone;
pub mod create;
pub mod delete;
pub mod expand;
pub mod hints;
pub mod naming;
pub mod precreate;
pub mod query;
pub mod share;
pub mod snapshot;

pub use api::{OrchestratorResult, SnapshotInfo, Volume, VolumeKind};
pub use create::{create_san_volume, RemoteTarget};
pub use delete::{delete_nas_volume, delete_san_volume, DeleteDependents};
pub use expand::{expand_nas_volume, expand_san_volume};
pub use precreate::pre_create;
pub use query::query_volume;
pub use share::reconcile_share_access;
pub use snapshot::{create_snapshot, delete_snapshot};

use std::sync::Arc;

use array_client::ArrayAdapter;
use array_protocol::intent::ResolvedIntent;
use array_protocol::{ArrayError, VolumeIntent};
use task_flow::{Poller, TokioClock};

/// Creates a NAS filesystem volume (spec §4.E.1 steps 2/5): local object +
/// quota + share + share-access reconciliation. Unlike SAN, NAS has no
/// ClonePair/LunCopy path — cloning a filesystem goes through the
/// split-based mechanism in [`clone::wait_fs_split`] instead, driven by the
/// caller once the base filesystem exists.
pub async fn create_nas_volume(
    adapter: &ArrayAdapter,
    resolved: &ResolvedIntent,
) -> OrchestratorResult<Volume> {
    if let Some(existing) = adapter.get_filesystem_by_name(&resolved.canonical_name).await? {
        let poller = clone::production_poller();
        clone::wait_if_fs_converging(adapter, &poller, &existing).await?;
        let existing = adapter
            .get_filesystem_by_name(&resolved.canonical_name)
            .await?
            .unwrap_or(existing);
        return Ok(Volume {
            name: existing.name,
            size_bytes: existing.capacity,
            lun_wwn: None,
        });
    }

    let fs = adapter
        .create_filesystem(&resolved.canonical_name, resolved.capacity, &resolved.pool_id)
        .await?;
    let quota_id = adapter.create_quota(&fs.id, None).await;
    if let Err(e) = quota_id {
        adapter.delete_filesystem(&fs.id).await?;
        return Err(e);
    }

    let share_path = format!("/{}/", fs.name);
    let share = match adapter.create_share(&fs.id, &share_path).await {
        Ok(share) => share,
        Err(e) => {
            adapter.delete_filesystem(&fs.id).await?;
            return Err(e);
        }
    };

    if let Some(clients) = &resolved.authclient {
        let access_value = 1; // read-write, the only mode the intent model expresses today.
        let flags = share::ShareAccessFlags {
            allsquash: resolved.allsquash,
            rootsquash: resolved.rootsquash,
            snapshot_dir_visibility: resolved.snapshot_dir_visibility,
        };
        if let Err(e) = reconcile_share_access(adapter, &share.id, clients, access_value, flags).await {
            adapter.delete_filesystem(&fs.id).await?;
            return Err(e);
        }
    }

    Ok(Volume {
        name: fs.name,
        size_bytes: fs.capacity,
        lun_wwn: None,
    })
}

/// Convenience end-to-end entry point used by the CLI/CSI-agent binary:
/// resolves the intent and dispatches to the SAN or NAS create path.
pub async fn create_volume(
    adapter: Arc<ArrayAdapter>,
    intent: &VolumeIntent,
    kind: VolumeKind,
    remote: Option<RemoteTarget>,
) -> OrchestratorResult<Volume> {
    let resolved = pre_create(intent, &adapter, kind).await?;
    match kind {
        VolumeKind::San => {
            let poller = Arc::new(Poller::new(Arc::new(TokioClock)));
            create_san_volume(adapter, poller, resolved, remote).await
        }
        VolumeKind::Nas => create_nas_volume(&adapter, &resolved).await,
    }
}

/// Returns `Err` if `intent` cannot possibly be satisfied (spec §4.E.1
/// step 1), without making any array call. Exposed separately from
/// [`create_volume`] so CSI `ValidateVolumeCapabilities`-style callers can
/// reject bad requests before a round trip.
pub fn validate_intent(intent: &VolumeIntent, kind: VolumeKind) -> Result<(), ArrayError> {
    intent.validate_shape(matches!(kind, VolumeKind::Nas))
}
