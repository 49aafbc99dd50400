use std::sync::Arc;

use array_client::ArrayAdapter;
use array_protocol::intent::{AllocType, CloneSource, ResolvedIntent};
use array_protocol::ArrayError;
use task_flow::{FlowState, Poller, Transaction};
use tracing::info;

use crate::api::Volume;
use crate::clone;

/// A second array endpoint for HyperMetro/Replication sub-flows. `domain_id`
/// is only meaningful for HyperMetro, `remote_device_id` only for
/// Replication; the caller sets whichever the resolved intent calls for.
#[derive(Clone)]
pub struct RemoteTarget {
    pub adapter: Arc<ArrayAdapter>,
    pub pool_id: String,
    pub domain_id: Option<String>,
    pub remote_device_id: Option<String>,
}

/// Creates (or idempotently returns) a SAN volume per the resolved intent
/// (spec §4.E.1 steps 2-4). HyperMetro and Replication are mutually
/// exclusive (enforced by `VolumeIntent::validate_shape` during `preCreate`),
/// so at most one remote sub-flow below ever runs.
pub async fn create_san_volume(
    adapter: Arc<ArrayAdapter>,
    poller: Arc<Poller>,
    resolved: ResolvedIntent,
    remote: Option<RemoteTarget>,
) -> Result<Volume, ArrayError> {
    if let Some(existing) = adapter.get_lun_by_name(&resolved.canonical_name).await? {
        info!(name = %resolved.canonical_name, "create-local-object: already exists, idempotent return");
        clone::wait_if_converging(&adapter, &poller, &existing).await?;
        let existing = adapter
            .get_lun_by_id(&existing.id)
            .await?
            .unwrap_or(existing);
        return Ok(Volume {
            name: existing.name,
            size_bytes: existing.capacity,
            lun_wwn: existing.wwn,
        });
    }

    let initial_capacity = resolve_initial_capacity(&adapter, &resolved).await?;

    let mut tx = build_san_transaction(adapter.clone(), poller, resolved.clone(), remote, initial_capacity);
    let result = tx.run().await;
    let state = match result {
        Ok(state) => state,
        Err(e) => {
            tx.revert().await;
            return Err(e);
        }
    };

    let local_id = state
        .get_str("local_id")
        .ok_or_else(|| ArrayError::Decode("create-local-object did not record local_id".into()))?
        .to_string();
    let lun = adapter
        .get_lun_by_id(&local_id)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("lun {local_id} vanished after create")))?;
    Ok(Volume {
        name: lun.name,
        size_bytes: lun.capacity,
        lun_wwn: lun.wwn,
    })
}

/// Clone-capacity rule (spec §4.E.1 step 3): a clone must be created at the
/// source's size, not the requested size, when the requested size is
/// larger; the post-clone extend step brings it up afterward.
async fn resolve_initial_capacity(
    adapter: &ArrayAdapter,
    resolved: &ResolvedIntent,
) -> Result<i64, ArrayError> {
    let source_capacity = match &resolved.clone_source {
        CloneSource::None => return Ok(resolved.capacity),
        CloneSource::FromVolume(name) | CloneSource::CloneFrom(name) => adapter
            .get_lun_by_name(name)
            .await?
            .ok_or_else(|| ArrayError::NotFound(format!("clone source volume `{name}`")))?
            .capacity,
        CloneSource::FromSnapshot(name) => {
            let doc = adapter
                .query_snapshot_by_name(name)
                .await?
                .ok_or_else(|| ArrayError::NotFound(format!("clone source snapshot `{name}`")))?;
            doc.i64_field("USERCAPACITY")?
        }
    };
    clone::validate_clone_capacity(resolved.capacity, source_capacity)?;
    Ok(source_capacity)
}

fn build_san_transaction(
    adapter: Arc<ArrayAdapter>,
    poller: Arc<Poller>,
    resolved: ResolvedIntent,
    remote: Option<RemoteTarget>,
    initial_capacity: i64,
) -> Transaction {
    let mut tx = Transaction::new();
    tx = add_create_local_object(tx, adapter.clone(), resolved.clone(), initial_capacity);

    if resolved.clone_source != CloneSource::None {
        tx = add_clone_step(tx, adapter.clone(), poller.clone(), resolved.clone(), initial_capacity);
    }

    if let Some(qos) = resolved.qos.clone() {
        tx = add_qos_step(tx, adapter.clone(), qos);
    }

    if resolved.hypermetro {
        if let Some(target) = remote.clone() {
            tx = add_hypermetro_steps(tx, adapter.clone(), target, resolved.clone());
        }
    } else if resolved.replication {
        if let Some(target) = remote {
            tx = add_replication_steps(tx, adapter.clone(), target, resolved.clone());
        }
    }

    tx
}

fn add_create_local_object(
    tx: Transaction,
    adapter: Arc<ArrayAdapter>,
    resolved: ResolvedIntent,
    initial_capacity: i64,
) -> Transaction {
    let fwd_adapter = adapter.clone();
    let rev_adapter = adapter;
    tx.step(
        "create-local-object",
        move |state: &mut FlowState| {
            let adapter = fwd_adapter.clone();
            let resolved = resolved.clone();
            async move {
                let thin = matches!(resolved.alloctype, AllocType::Thin);
                let lun = adapter
                    .create_lun(&resolved.canonical_name, initial_capacity, &resolved.pool_id, thin)
                    .await?;
                state.insert("local_id", lun.id);
                Ok(())
            }
        },
        move |state: &FlowState| {
            let adapter = rev_adapter.clone();
            let local_id = state.get_str("local_id").map(str::to_string);
            async move {
                if let Some(id) = local_id {
                    adapter.delete_lun(&id).await?;
                }
                Ok(())
            }
        },
    )
}

/// Clone sub-step (spec §4.E.1.3/.4): dispatches ClonePair when the array
/// supports it, else LunCopy with an intermediate snapshot. Has no
/// compensator of its own — if it fails, `create-local-object`'s compensator
/// deleting the (still-empty) target LUN is sufficient cleanup.
fn add_clone_step(
    tx: Transaction,
    adapter: Arc<ArrayAdapter>,
    poller: Arc<Poller>,
    resolved: ResolvedIntent,
    initial_capacity: i64,
) -> Transaction {
    tx.step(
        "clone-volume",
        move |state: &mut FlowState| {
            let adapter = adapter.clone();
            let poller = poller.clone();
            let resolved = resolved.clone();
            let target_id = state.get_str("local_id").unwrap_or_default().to_string();
            async move {
                let source_name = match &resolved.clone_source {
                    CloneSource::FromVolume(n) | CloneSource::CloneFrom(n) => n.clone(),
                    CloneSource::FromSnapshot(n) => n.clone(),
                    CloneSource::None => return Ok(()),
                };
                if matches!(resolved.clone_source, CloneSource::FromSnapshot(_)) {
                    clone_from_snapshot(&adapter, &poller, &source_name, &target_id, resolved.clonespeed).await?;
                } else {
                    clone_from_volume(&adapter, &poller, &source_name, &target_id, resolved.clonespeed).await?;
                }
                if clone::needs_post_clone_extend(resolved.capacity, initial_capacity) {
                    adapter.extend_lun(&target_id, resolved.capacity).await?;
                }
                Ok(())
            }
        },
        |_state: &FlowState| async { Ok(()) },
    )
}

async fn clone_from_snapshot(
    adapter: &ArrayAdapter,
    poller: &Poller,
    snapshot_name: &str,
    target_id: &str,
    speed: u8,
) -> Result<(), ArrayError> {
    let source = adapter
        .query_snapshot_by_name(snapshot_name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("clone source snapshot `{snapshot_name}`")))?;
    let source_id = source.str_field("ID")?;
    if adapter.supports_clone_pair() {
        let pair = adapter.create_clone_pair(&source_id, target_id, speed).await?;
        clone::wait_clone_pair(adapter, poller, &pair.id).await
    } else {
        let copy_name = format!("copy-{target_id}");
        let copy = adapter
            .create_lun_copy(&copy_name, &source_id, target_id, speed)
            .await?;
        adapter.start_lun_copy(&copy.id).await?;
        clone::wait_lun_copy(adapter, poller, &copy.id, Some(&source_id)).await
    }
}

async fn clone_from_volume(
    adapter: &ArrayAdapter,
    poller: &Poller,
    source_name: &str,
    target_id: &str,
    speed: u8,
) -> Result<(), ArrayError> {
    let source = adapter
        .get_lun_by_name(source_name)
        .await?
        .ok_or_else(|| ArrayError::NotFound(format!("clone source volume `{source_name}`")))?;
    if adapter.supports_clone_pair() {
        let pair = adapter.create_clone_pair(&source.id, target_id, speed).await?;
        clone::wait_clone_pair(adapter, poller, &pair.id).await
    } else {
        let snap_name = format!("tmp-snap-{target_id}");
        let snapshot = adapter.create_snapshot(&source.id, &snap_name).await?;
        let snapshot_id = snapshot.str_field("ID")?;
        adapter.activate_snapshot(&snapshot_id).await?;
        let copy_name = format!("copy-{target_id}");
        let copy = adapter
            .create_lun_copy(&copy_name, &snapshot_id, target_id, speed)
            .await?;
        adapter.start_lun_copy(&copy.id).await?;
        clone::wait_lun_copy(adapter, poller, &copy.id, Some(&snapshot_id)).await
    }
}

fn add_qos_step(
    tx: Transaction,
    adapter: Arc<ArrayAdapter>,
    qos: std::collections::HashMap<String, serde_json::Value>,
) -> Transaction {
    let fwd_adapter = adapter.clone();
    let rev_adapter = adapter;
    tx.step(
        "create-local-qos",
        move |state: &mut FlowState| {
            let adapter = fwd_adapter.clone();
            let qos_spec = serde_json::to_value(&qos).unwrap_or_default();
            let local_id = state.get_str("local_id").unwrap_or_default().to_string();
            async move {
                let policy = adapter
                    .create_qos_policy(&format!("qos-{local_id}"), &qos_spec)
                    .await?;
                adapter.associate_qos(&policy.id, &local_id).await?;
                state.insert("qos_policy_id", policy.id);
                Ok(())
            }
        },
        move |state: &FlowState| {
            let adapter = rev_adapter.clone();
            let local_id = state.get_str("local_id").map(str::to_string);
            let policy_id = state.get_str("qos_policy_id").map(str::to_string);
            async move {
                if let (Some(policy_id), Some(local_id)) = (policy_id, local_id) {
                    adapter.dissociate_qos(&policy_id, &local_id).await?;
                    adapter.delete_qos_policy(&policy_id).await?;
                }
                Ok(())
            }
        },
    )
}

fn add_hypermetro_steps(
    tx: Transaction,
    adapter: Arc<ArrayAdapter>,
    target: RemoteTarget,
    resolved: ResolvedIntent,
) -> Transaction {
    let remote_adapter = target.adapter.clone();
    let remote_adapter_rev = target.adapter.clone();
    let remote_pool = target.pool_id.clone();
    let domain_id = target.domain_id.clone().unwrap_or_default();
    let resolved_for_name = resolved.clone();

    let tx = tx.step(
        "create-remote-object",
        move |state: &mut FlowState| {
            let adapter = remote_adapter.clone();
            let pool = remote_pool.clone();
            let resolved = resolved_for_name.clone();
            async move {
                let thin = matches!(resolved.alloctype, AllocType::Thin);
                let lun = adapter
                    .create_lun(&resolved.canonical_name, resolved.capacity, &pool, thin)
                    .await?;
                state.insert("remote_id", lun.id);
                Ok(())
            }
        },
        move |state: &FlowState| {
            let adapter = remote_adapter_rev.clone();
            let remote_id = state.get_str("remote_id").map(str::to_string);
            async move {
                if let Some(id) = remote_id {
                    adapter.delete_lun(&id).await?;
                }
                Ok(())
            }
        },
    );

    let pair_adapter = adapter.clone();
    tx.step(
        "create-hypermetro-pair",
        move |state: &mut FlowState| {
            let adapter = pair_adapter.clone();
            let domain_id = domain_id.clone();
            let local_id = state.get_str("local_id").unwrap_or_default().to_string();
            let remote_id = state.get_str("remote_id").unwrap_or_default().to_string();
            async move {
                let pair = adapter
                    .create_hypermetro_pair(&domain_id, &local_id, &remote_id)
                    .await?;
                state.insert("hypermetro_pair_id", pair.id);
                Ok(())
            }
        },
        move |state: &FlowState| {
            let adapter = adapter.clone();
            let pair_id = state.get_str("hypermetro_pair_id").map(str::to_string);
            async move {
                if let Some(id) = pair_id {
                    adapter.stop_hypermetro_pair(&id).await?;
                    adapter.delete_hypermetro_pair(&id).await?;
                }
                Ok(())
            }
        },
    )
}

fn add_replication_steps(
    tx: Transaction,
    adapter: Arc<ArrayAdapter>,
    target: RemoteTarget,
    resolved: ResolvedIntent,
) -> Transaction {
    let remote_adapter = target.adapter.clone();
    let remote_adapter_rev = target.adapter.clone();
    let remote_pool = target.pool_id.clone();
    let remote_device_id = target.remote_device_id.clone().unwrap_or_default();
    let resolved_for_name = resolved;

    let tx = tx.step(
        "create-remote-object",
        move |state: &mut FlowState| {
            let adapter = remote_adapter.clone();
            let pool = remote_pool.clone();
            let resolved = resolved_for_name.clone();
            async move {
                let thin = matches!(resolved.alloctype, AllocType::Thin);
                let lun = adapter
                    .create_lun(&resolved.canonical_name, resolved.capacity, &pool, thin)
                    .await?;
                state.insert("remote_id", lun.id);
                Ok(())
            }
        },
        move |state: &FlowState| {
            let adapter = remote_adapter_rev.clone();
            let remote_id = state.get_str("remote_id").map(str::to_string);
            async move {
                if let Some(id) = remote_id {
                    adapter.delete_lun(&id).await?;
                }
                Ok(())
            }
        },
    );

    // Create-Replication-Pair intentionally has no compensator (spec
    // §4.E.1 step 2): once the pair exists, tearing it down is the same
    // stop-then-delete dance as ordinary volume deletion, not create's job.
    tx.step(
        "create-replication-pair",
        move |state: &mut FlowState| {
            let adapter = adapter.clone();
            let remote_device_id = remote_device_id.clone();
            let local_id = state.get_str("local_id").unwrap_or_default().to_string();
            let remote_id = state.get_str("remote_id").unwrap_or_default().to_string();
            async move {
                let pair = adapter
                    .create_replication_pair(&local_id, &remote_device_id, &remote_id)
                    .await?;
                state.insert("replication_pair_id", pair.id);
                Ok(())
            }
        },
        |_state: &FlowState| async { Ok(()) },
    )
}
