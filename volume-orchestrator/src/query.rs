use array_client::ArrayAdapter;
use array_protocol::ArrayError;

use crate::api::{Volume, VolumeKind};

/// Looks up a volume by its canonical name (supplemental operation named in
/// spec §6.3 alongside Create/Delete/Expand/Snapshot but not detailed
/// further there — CSI `NodeStageVolume`/`ControllerExpandVolume` callers
/// need this to re-resolve a volume's current state before acting on it).
/// A missing volume is `ArrayError::NotFound`, not an `Option`, since every
/// caller of `Query` already expects the volume to exist.
pub async fn query_volume(
    adapter: &ArrayAdapter,
    canonical_name: &str,
    kind: VolumeKind,
) -> Result<Volume, ArrayError> {
    match kind {
        VolumeKind::San => {
            let lun = adapter
                .get_lun_by_name(canonical_name)
                .await?
                .ok_or_else(|| ArrayError::NotFound(format!("volume `{canonical_name}`")))?;
            Ok(Volume {
                name: lun.name,
                size_bytes: lun.capacity,
                lun_wwn: lun.wwn,
            })
        }
        VolumeKind::Nas => {
            let fs = adapter
                .get_filesystem_by_name(canonical_name)
                .await?
                .ok_or_else(|| ArrayError::NotFound(format!("volume `{canonical_name}`")))?;
            Ok(Volume {
                name: fs.name,
                size_bytes: fs.capacity,
                lun_wwn: None,
            })
        }
    }
}
