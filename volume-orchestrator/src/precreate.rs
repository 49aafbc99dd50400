use array_client::ArrayAdapter;
use array_protocol::intent::ResolvedIntent;
use array_protocol::{ArrayError, VolumeIntent};

use crate::hints;
use crate::naming::{canonicalize, FS_PREFIX, LUN_PREFIX};
use crate::api::VolumeKind;

/// `preCreate` (spec §4.E.1 step 1): canonicalizes the name, resolves the
/// storage pool, decodes qos/squash/visibility hints, folds the clone
/// source, and validates NAS/mutual-exclusion requirements. Mutates nothing
/// in place (unlike the source's in-place map mutation) — returns a fresh
/// `ResolvedIntent` instead, since that is the idiomatic shape here.
pub async fn pre_create(
    intent: &VolumeIntent,
    adapter: &ArrayAdapter,
    kind: VolumeKind,
) -> Result<ResolvedIntent, ArrayError> {
    let is_nas = matches!(kind, VolumeKind::Nas);
    intent.validate_shape(is_nas)?;

    let prefix = match kind {
        VolumeKind::San => LUN_PREFIX,
        VolumeKind::Nas => FS_PREFIX,
    };
    let canonical_name = canonicalize(prefix, &intent.name);

    let pool = adapter
        .get_pool_by_name(&intent.storagepool)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("storage pool `{}`", intent.storagepool)))?;

    let qos = match &intent.qos {
        Some(raw) => Some(hints::decode_qos(raw)?),
        None => None,
    };

    let allsquash = match intent.hints.get("allsquash").and_then(|v| v.as_str()) {
        Some(v) => Some(hints::squash_code(v)?),
        None => None,
    };
    let rootsquash = match intent.hints.get("rootsquash").and_then(|v| v.as_str()) {
        Some(v) => Some(hints::squash_code(v)?),
        None => None,
    };
    let snapshot_dir_visibility = match intent
        .hints
        .get("snapshotdirectoryvisibility")
        .and_then(|v| v.as_str())
    {
        Some(v) => Some(hints::snapshot_dir_visibility_code(v)?),
        None => None,
    };

    let authclient = intent
        .authclient
        .as_deref()
        .map(array_protocol::parse_authclient);

    Ok(ResolvedIntent {
        canonical_name,
        original_name: intent.name.clone(),
        capacity: intent.capacity,
        pool_id: pool.id,
        qos,
        hypermetro: intent.hypermetro,
        replication: intent.replication,
        authclient,
        clone_source: intent.clone_source(),
        clonespeed: intent.clonespeed,
        alloctype: intent.alloctype,
        allsquash,
        rootsquash,
        snapshot_dir_visibility,
        hints: intent.hints.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn san_prefix_is_lun() {
        assert_eq!(canonicalize(LUN_PREFIX, "pvc-a"), "lun-pvc-a");
    }
}
