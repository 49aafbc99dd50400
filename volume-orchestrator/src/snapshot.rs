use std::time::Duration;

use array_client::ArrayAdapter;
use array_protocol::{ArrayError, Document};
use task_flow::{PollOutcome, Poller};

use crate::api::SnapshotInfo;

const ACTIVATE_BUDGET: Duration = Duration::from_secs(60);
const ACTIVATE_INTERVAL: Duration = Duration::from_secs(2);

/// Creates a snapshot of `parent_id` (spec §4.E — Snapshot Create). If a
/// snapshot with `name` already exists, this is idempotent only when it
/// belongs to the same parent; a name reused against a different parent is
/// a conflict, since silently returning the wrong snapshot's data would be
/// worse than failing.
pub async fn create_snapshot(
    adapter: &ArrayAdapter,
    poller: &Poller,
    parent_id: &str,
    name: &str,
) -> Result<SnapshotInfo, ArrayError> {
    if let Some(existing) = adapter.query_snapshot_by_name(name).await? {
        let existing_parent = existing.opt_str_field("PARENTID").unwrap_or_default();
        if existing_parent != parent_id {
            return Err(ArrayError::Conflict(format!(
                "snapshot `{name}` already exists under a different parent ({existing_parent})"
            )));
        }
        return activate_and_describe(adapter, poller, name, &existing).await;
    }

    adapter.create_snapshot(parent_id, name).await?;
    let created = adapter
        .query_snapshot_by_name(name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("snapshot `{name}` vanished after create")))?;
    activate_and_describe(adapter, poller, name, &created).await
}

async fn activate_and_describe(
    adapter: &ArrayAdapter,
    poller: &Poller,
    name: &str,
    doc: &Document,
) -> Result<SnapshotInfo, ArrayError> {
    if !doc.bool_field("ISACTIVE") {
        let id = doc.str_field("ID")?;
        adapter.activate_snapshot(&id).await?;
        poller
            .wait_until("snapshot-active", ACTIVATE_BUDGET, ACTIVATE_INTERVAL, || async {
                match adapter.query_snapshot_by_name(name).await? {
                    Some(d) if d.bool_field("ISACTIVE") => Ok(PollOutcome::Done),
                    Some(_) => Ok(PollOutcome::Pending),
                    None => Err(ArrayError::NotFound(format!(
                        "snapshot `{name}` vanished while waiting for activation"
                    ))),
                }
            })
            .await?;
    }
    let refreshed = adapter
        .query_snapshot_by_name(name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("snapshot `{name}` vanished after activation")))?;
    snapshot_info_from_document(&refreshed)
}

fn snapshot_info_from_document(doc: &Document) -> Result<SnapshotInfo, ArrayError> {
    Ok(SnapshotInfo {
        creation_time: doc.opt_str_field("CREATETIME").unwrap_or_default(),
        size_bytes: doc.opt_i64_field("USERCAPACITY").unwrap_or(0),
        parent_id: doc.str_field("PARENTID")?,
    })
}

/// Deletes a snapshot by name (spec §4.E — Snapshot Delete). Idempotent: a
/// missing snapshot is success. Active snapshots must be deactivated
/// before the array accepts their deletion.
pub async fn delete_snapshot(adapter: &ArrayAdapter, name: &str) -> Result<(), ArrayError> {
    let existing = match adapter.query_snapshot_by_name(name).await? {
        Some(doc) => doc,
        None => return Ok(()),
    };
    let id = existing.str_field("ID")?;
    if existing.bool_field("ISACTIVE") {
        adapter.deactivate_snapshot(&id).await?;
    }
    adapter.delete_snapshot(&id).await
}
