use std::collections::HashSet;

use array_client::ArrayAdapter;
use array_protocol::ArrayError;

/// Flags applied to newly-created share-access entries (spec §4.E.1 step
/// 5: "create an access record with the requested squash/sync/kerberos
/// flags"). Kerberos itself stays out of scope (spec §1 non-goals list
/// "Kerberos configuration normalization... as pure functions the
/// orchestrator calls"), so only the squash/visibility codes are carried.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShareAccessFlags {
    pub allsquash: Option<i64>,
    pub rootsquash: Option<i64>,
    pub snapshot_dir_visibility: Option<i64>,
}

/// Reconciles the set of NFS share-access entries on `share_id` to exactly
/// the clients in `desired` (spec §4.E.1 step 5): fetch the existing access
/// list, add whatever is missing, remove whatever shouldn't be there, and
/// leave clients that are already correct untouched. `access_value` and
/// `flags` apply uniformly to newly-added entries; this does not attempt to
/// reconcile a mismatched access-value/flags on an existing entry against a
/// desired one, since the intent model only carries one value for the whole
/// share.
pub async fn reconcile_share_access(
    adapter: &ArrayAdapter,
    share_id: &str,
    desired: &[String],
    access_value: i64,
    flags: ShareAccessFlags,
) -> Result<(), ArrayError> {
    let desired_set: HashSet<&str> = desired.iter().map(String::as_str).collect();
    let existing = adapter.get_nfs_share_access_range(share_id).await?;

    for access in &existing {
        if !desired_set.contains(access.access_name.as_str()) {
            adapter.delete_nfs_share_access(&access.id).await?;
        }
    }

    let already_present: HashSet<&str> = existing
        .iter()
        .map(|a| a.access_name.as_str())
        .filter(|name| desired_set.contains(name))
        .collect();

    for client in desired {
        if !already_present.contains(client.as_str()) {
            adapter
                .allow_nfs_share_access(
                    share_id,
                    client,
                    access_value,
                    flags.allsquash,
                    flags.rootsquash,
                    flags.snapshot_dir_visibility,
                )
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desired_set_dedups_by_name() {
        let desired = vec!["10.0.0.1".to_string(), "10.0.0.1".to_string()];
        let set: HashSet<&str> = desired.iter().map(String::as_str).collect();
        assert_eq!(set.len(), 1);
    }
}
