use std::sync::Arc;

use array_protocol::record::{
    ClonePair, ClonePairState, FileSystem, HyperMetroPair, Lun, LunCopy, LunCopyState,
    NfsShare, NfsShareAccess, PairRunningStatus, QosPolicy, ReplicationPair, SplitState,
    StoragePool,
};
use array_protocol::{classify, ArrayError, BenignOutcome, Document, Operation};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::session::Session;

/// Pure translation layer over the session client (spec §4.B). One
/// operation per supported endpoint; no workflow logic lives here — that is
/// `volume-orchestrator`'s job.
pub struct ArrayAdapter {
    session: Arc<Session>,
    /// Whether the target array advertises ClonePair support. Selects
    /// between ClonePair and LunCopy+snapshot for cloning (spec §4.E.1.3).
    supports_clone_pair: bool,
}

impl ArrayAdapter {
    pub fn new(session: Arc<Session>, supports_clone_pair: bool) -> Self {
        Self {
            session,
            supports_clone_pair,
        }
    }

    pub fn supports_clone_pair(&self) -> bool {
        self.supports_clone_pair
    }

    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> Result<Document, ArrayError> {
        self.session.call(method, path, body, path).await
    }

    /// Runs `request`, and if it fails with a `Server` error whose code is
    /// benign for `op`, returns the classified outcome instead of
    /// propagating. Non-benign errors propagate unchanged.
    async fn request_benign(
        &self,
        op: Operation,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Result<Document, BenignOutcome>, ArrayError> {
        match self.request(method, path, body).await {
            Ok(doc) => Ok(Ok(doc)),
            Err(ArrayError::Server { code, .. }) => match classify(op, code) {
                Some(outcome) => {
                    debug!(?op, code, ?outcome, "absorbed benign error code");
                    Ok(Err(outcome))
                }
                None => Err(ArrayError::Server {
                    code,
                    op: format!("{op:?}"),
                }),
            },
            Err(other) => Err(other),
        }
    }

    // ---- storage pools ----------------------------------------------

    pub async fn get_pool_by_name(&self, name: &str) -> Result<Option<StoragePool>, ArrayError> {
        let doc = self
            .request(Method::GET, &format!("/storagepool?filter=NAME::{name}"), None)
            .await?;
        let arr = doc
            .as_value()
            .get("data")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(arr.first().map(|v| {
            let d = Document::new(v.clone());
            StoragePool {
                id: d.str_field("ID").unwrap_or_default(),
                name: d.str_field("NAME").unwrap_or_else(|_| name.to_string()),
            }
        }))
    }

    // ---- LUNs ----------------------------------------------------------

    pub async fn get_lun_by_name(&self, name: &str) -> Result<Option<Lun>, ArrayError> {
        match self
            .request_benign(
                Operation::QueryVolumeByName,
                Method::GET,
                &format!("/lun?filter=NAME::{name}"),
                None,
            )
            .await?
        {
            Err(BenignOutcome::NotFound) => Ok(None),
            Err(_) => Ok(None),
            Ok(doc) => {
                let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                arr.first()
                    .map(|v| Lun::from_document(&Document::new(v.clone())))
                    .transpose()
            }
        }
    }

    pub async fn get_lun_by_id(&self, id: &str) -> Result<Option<Lun>, ArrayError> {
        match self
            .request_benign(Operation::QueryVolumeByName, Method::GET, &format!("/lun/{id}"), None)
            .await?
        {
            Err(_) => Ok(None),
            Ok(doc) => Ok(Some(Lun::from_document(&doc)?)),
        }
    }

    pub async fn create_lun(
        &self,
        name: &str,
        capacity: i64,
        pool_id: &str,
        alloc_type_thin: bool,
    ) -> Result<Lun, ArrayError> {
        let body = json!({
            "NAME": name,
            "CAPACITY": capacity,
            "PARENTID": pool_id,
            "ALLOCTYPE": if alloc_type_thin { 1 } else { 0 },
        });
        let doc = self.request(Method::POST, "/lun", Some(body)).await?;
        let data = doc.as_value().get("data").cloned().unwrap_or_default();
        Lun::from_document(&Document::new(data))
    }

    /// Idempotent: a missing LUN classifies as success (spec §6.2).
    pub async fn delete_lun(&self, id: &str) -> Result<(), ArrayError> {
        match self
            .request_benign(Operation::DeleteVolume, Method::DELETE, &format!("/lun/{id}"), None)
            .await?
        {
            Ok(_) | Err(_) => Ok(()),
        }
    }

    pub async fn extend_lun(&self, id: &str, new_capacity: i64) -> Result<(), ArrayError> {
        let body = json!({"CAPACITY": new_capacity});
        self.request(Method::PUT, &format!("/lun/expand/{id}"), Some(body))
            .await?;
        Ok(())
    }

    // ---- filesystems -----------------------------------------------------

    pub async fn get_filesystem_by_name(&self, name: &str) -> Result<Option<FileSystem>, ArrayError> {
        match self
            .request_benign(
                Operation::QueryFilesystem,
                Method::GET,
                &format!("/filesystem?filter=NAME::{name}"),
                None,
            )
            .await?
        {
            Err(_) => Ok(None),
            Ok(doc) => {
                let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                arr.first()
                    .map(|v| FileSystem::from_document(&Document::new(v.clone())))
                    .transpose()
            }
        }
    }

    pub async fn create_filesystem(
        &self,
        name: &str,
        capacity: i64,
        pool_id: &str,
    ) -> Result<FileSystem, ArrayError> {
        let body = json!({"NAME": name, "CAPACITY": capacity, "PARENTID": pool_id});
        let doc = self.request(Method::POST, "/filesystem", Some(body)).await?;
        let data = doc.as_value().get("data").cloned().unwrap_or_default();
        FileSystem::from_document(&Document::new(data))
    }

    pub async fn delete_filesystem(&self, id: &str) -> Result<(), ArrayError> {
        match self
            .request_benign(Operation::QueryFilesystem, Method::DELETE, &format!("/filesystem/{id}"), None)
            .await?
        {
            Ok(_) | Err(_) => Ok(()),
        }
    }

    pub async fn extend_filesystem(&self, id: &str, new_capacity: i64) -> Result<(), ArrayError> {
        let body = json!({"CAPACITY": new_capacity});
        self.request(Method::PUT, &format!("/filesystem/{id}"), Some(body)).await?;
        Ok(())
    }

    pub async fn split_filesystem(&self, id: &str, speed: u8) -> Result<(), ArrayError> {
        let body = json!({"ID": id, "SPLITENABLE": true, "SPLITSPEED": speed});
        self.request(Method::PUT, &format!("/filesystem_split_switch/{id}"), Some(body))
            .await?;
        Ok(())
    }

    pub async fn query_filesystem_split_status(&self, id: &str) -> Result<SplitState, ArrayError> {
        let doc = self
            .request(Method::GET, &format!("/filesystem_split_switch/{id}"), None)
            .await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(SplitState::from_code(data.opt_i64_field("SPLITSTATUS").unwrap_or(0)))
    }

    // ---- snapshots ---------------------------------------------------

    pub async fn create_snapshot(&self, parent_id: &str, name: &str) -> Result<Document, ArrayError> {
        let body = json!({"PARENTID": parent_id, "NAME": name});
        let doc = self.request(Method::POST, "/snapshot", Some(body)).await?;
        Ok(Document::new(doc.as_value().get("data").cloned().unwrap_or_default()))
    }

    pub async fn query_snapshot_by_name(&self, name: &str) -> Result<Option<Document>, ArrayError> {
        match self
            .request_benign(
                Operation::QuerySnapshot,
                Method::GET,
                &format!("/snapshot?filter=NAME::{name}"),
                None,
            )
            .await?
        {
            Err(_) => Ok(None),
            Ok(doc) => {
                let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                Ok(arr.first().cloned().map(Document::new))
            }
        }
    }

    pub async fn activate_snapshot(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"SNAPSHOTLIST": [id]});
        self.request(Method::POST, "/snapshot/activate", Some(body)).await?;
        Ok(())
    }

    pub async fn deactivate_snapshot(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/snapshot/stop", Some(body)).await?;
        Ok(())
    }

    /// Idempotent (spec §6.2: not-exist classifies as success).
    pub async fn delete_snapshot(&self, id: &str) -> Result<(), ArrayError> {
        match self
            .request_benign(Operation::DeleteSnapshot, Method::DELETE, &format!("/snapshot/{id}"), None)
            .await?
        {
            Ok(_) | Err(_) => Ok(()),
        }
    }

    // ---- QoS -----------------------------------------------------------

    pub async fn create_qos_policy(&self, name: &str, spec: &Value) -> Result<QosPolicy, ArrayError> {
        let mut body = spec.clone();
        if let Value::Object(map) = &mut body {
            map.insert("NAME".into(), json!(name));
        }
        let doc = self.request(Method::POST, "/ioclass", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(QosPolicy {
            id: data.str_field("ID")?,
            name: data.opt_str_field("NAME").unwrap_or_else(|| name.to_string()),
            associated_object_count: 0,
        })
    }

    pub async fn associate_qos(&self, qos_id: &str, object_id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": qos_id, "ASSOCIATEOBJID": object_id});
        self.request(Method::PUT, "/ioclass/active", Some(body)).await?;
        Ok(())
    }

    pub async fn dissociate_qos(&self, qos_id: &str, object_id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": qos_id, "ASSOCIATEOBJID": object_id});
        self.request(Method::PUT, "/ioclass/deactive", Some(body)).await?;
        Ok(())
    }

    pub async fn delete_qos_policy(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/ioclass/{id}"), None).await?;
        Ok(())
    }

    /// Reads the policy's own `ASSOCIATEDCOUNT` field directly rather than
    /// summing per-pool association counts, so there is no pool loop here
    /// to under- or over-count.
    pub async fn get_associate_count_of_qos(&self, qos_id: &str) -> Result<i64, ArrayError> {
        let doc = self.request(Method::GET, &format!("/ioclass/{qos_id}"), None).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(data.opt_i64_field("ASSOCIATEDCOUNT").unwrap_or(0))
    }

    // ---- hosts / initiators --------------------------------------------

    pub async fn create_host(&self, name: &str) -> Result<String, ArrayError> {
        let body = json!({"NAME": name});
        match self
            .request_benign(Operation::CreateHost, Method::POST, "/host", Some(body))
            .await?
        {
            Ok(doc) => Ok(Document::new(doc.as_value().get("data").cloned().unwrap_or_default()).str_field("ID")?),
            Err(_) => self
                .query_host_by_name(name)
                .await?
                .ok_or_else(|| ArrayError::Decode("host reported already-exists but lookup found none".into())),
        }
    }

    async fn query_host_by_name(&self, name: &str) -> Result<Option<String>, ArrayError> {
        let doc = self.request(Method::GET, &format!("/host?filter=NAME::{name}"), None).await?;
        let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        Ok(arr.first().and_then(|v| v.get("ID")).and_then(Value::as_str).map(str::to_owned))
    }

    pub async fn create_initiator(&self, name: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": name});
        self.request_benign(Operation::CreateInitiator, Method::POST, "/iscsi_initiator", Some(body))
            .await?;
        Ok(())
    }

    pub async fn add_initiator_to_host(&self, initiator: &str, host_id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": initiator, "PARENTID": host_id, "PARENTTYPE": 21});
        self.request_benign(
            Operation::AddInitiatorToHost,
            Method::PUT,
            "/iscsi_initiator",
            Some(body),
        )
        .await?;
        Ok(())
    }

    pub async fn query_initiator(&self, name: &str) -> Result<Option<Document>, ArrayError> {
        match self
            .request_benign(Operation::QueryInitiator, Method::GET, &format!("/iscsi_initiator/{name}"), None)
            .await?
        {
            Err(_) => Ok(None),
            Ok(doc) => Ok(Some(Document::new(doc.as_value().get("data").cloned().unwrap_or_default()))),
        }
    }

    pub async fn query_host_by_port(&self, port: &str) -> Result<Option<String>, ArrayError> {
        match self
            .request_benign(
                Operation::QueryHostByPort,
                Method::GET,
                &format!("/host_link?INITIATOR_TYPE=223&INITIATOR_PORT_WWN={port}"),
                None,
            )
            .await?
        {
            Err(_) => Ok(None),
            Ok(doc) => {
                let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
                Ok(arr.first().and_then(|v| v.get("PARENTID")).and_then(Value::as_str).map(str::to_owned))
            }
        }
    }

    // ---- NAS: quota / share / share-access ------------------------------

    pub async fn create_quota(&self, fs_id: &str, space_ratio: Option<i64>) -> Result<String, ArrayError> {
        let body = json!({
            "PARENTID": fs_id,
            "PARENTTYPE": 40,
            "SNAPSHOTSPACERATIO": space_ratio.unwrap_or(20),
        });
        let doc = self.request(Method::POST, "/fsquota", Some(body)).await?;
        Document::new(doc.as_value().get("data").cloned().unwrap_or_default()).str_field("ID")
    }

    /// Idempotent (spec §6.2: not-exist classifies as success).
    pub async fn delete_quota(&self, id: &str) -> Result<(), ArrayError> {
        match self
            .request_benign(Operation::DeleteQuota, Method::DELETE, &format!("/fsquota/{id}"), None)
            .await?
        {
            Ok(_) | Err(_) => Ok(()),
        }
    }

    pub async fn create_share(&self, fs_id: &str, share_path: &str) -> Result<NfsShare, ArrayError> {
        let body = json!({"FSID": fs_id, "SHAREPATH": share_path});
        let doc = self.request(Method::POST, "/NFSSHARE", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(NfsShare {
            id: data.str_field("ID")?,
            fs_id: fs_id.to_string(),
            share_path: share_path.to_string(),
        })
    }

    pub async fn delete_share(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/NFSSHARE/{id}"), None).await?;
        Ok(())
    }

    pub async fn get_nfs_share_access_range(
        &self,
        share_id: &str,
    ) -> Result<Vec<NfsShareAccess>, ArrayError> {
        let mut out = Vec::new();
        let mut start = 0;
        const PAGE: usize = 100;
        loop {
            let path = format!(
                "/NFS_SHARE_AUTH_CLIENT?filter=PARENTID::{share_id}&range=[{start}-{}]",
                start + PAGE
            );
            let doc = self.request(Method::GET, &path, None).await?;
            let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
            let count = arr.len();
            for v in arr {
                let d = Document::new(v);
                out.push(NfsShareAccess {
                    id: d.str_field("ID")?,
                    share_id: share_id.to_string(),
                    access_name: d.str_field("NAME")?,
                    access_value: d.opt_i64_field("ACCESSVAL").unwrap_or(0),
                });
            }
            if count < PAGE {
                break;
            }
            start += PAGE;
        }
        Ok(out)
    }

    pub async fn allow_nfs_share_access(
        &self,
        share_id: &str,
        client_name: &str,
        access_value: i64,
        allsquash: Option<i64>,
        rootsquash: Option<i64>,
        snapshot_dir_visibility: Option<i64>,
    ) -> Result<(), ArrayError> {
        let mut body = json!({
            "PARENTID": share_id,
            "NAME": client_name,
            "ACCESSVAL": access_value,
        });
        if let Value::Object(map) = &mut body {
            if let Some(v) = allsquash {
                map.insert("ALLSQUASH".into(), json!(v));
            }
            if let Some(v) = rootsquash {
                map.insert("ROOTSQUASH".into(), json!(v));
            }
            if let Some(v) = snapshot_dir_visibility {
                map.insert("SHOWSNAPSHOT".into(), json!(v));
            }
        }
        self.request_benign(
            Operation::AllowNfsShareAccess,
            Method::POST,
            "/NFS_SHARE_AUTH_CLIENT",
            Some(body),
        )
        .await?;
        Ok(())
    }

    pub async fn delete_nfs_share_access(&self, access_id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/NFS_SHARE_AUTH_CLIENT/{access_id}"), None)
            .await?;
        Ok(())
    }

    // ---- cloning: ClonePair / LunCopy -----------------------------------

    pub async fn create_clone_pair(
        &self,
        source_id: &str,
        target_id: &str,
        speed: u8,
    ) -> Result<ClonePair, ArrayError> {
        let body = json!({"copyRate": speed, "sourceID": source_id, "targetID": target_id});
        let doc = self.request(Method::POST, "/clonepair/relation", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(ClonePair {
            id: data.str_field("ID")?,
            state: ClonePairState::from_code(data.opt_i64_field("copyStatus").unwrap_or(0)),
        })
    }

    pub async fn query_clone_pair_by_id(&self, id: &str) -> Result<ClonePair, ArrayError> {
        let doc = self.request(Method::GET, &format!("/clonepair/{id}"), None).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(ClonePair {
            id: id.to_string(),
            state: ClonePairState::from_code(data.opt_i64_field("copyStatus").unwrap_or(0)),
        })
    }

    pub async fn delete_clone_pair(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/clonepair/{id}"), None).await?;
        Ok(())
    }

    /// Looks up the ClonePair (if any) still converging against `lun_id` as
    /// its target (spec §4.E.1 step 3: "if found and marked as a cloning
    /// artifact in a non-terminal state, wait for split/clone to finish
    /// before returning"). Used on the idempotent already-exists path, where
    /// the pair id from the original `Create-Local-Object` call is no
    /// longer available.
    pub async fn find_clone_pair_by_target_id(&self, lun_id: &str) -> Result<Option<ClonePair>, ArrayError> {
        let doc = self
            .request(Method::GET, &format!("/clonepair?filter=targetLunId::{lun_id}"), None)
            .await?;
        let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        arr.first()
            .map(|v| {
                let d = Document::new(v.clone());
                Ok(ClonePair {
                    id: d.str_field("ID")?,
                    state: ClonePairState::from_code(d.opt_i64_field("copyStatus").unwrap_or(0)),
                })
            })
            .transpose()
    }

    pub async fn create_lun_copy(
        &self,
        name: &str,
        source_id: &str,
        target_id: &str,
        speed: u8,
    ) -> Result<LunCopy, ArrayError> {
        let body = json!({"NAME": name, "SOURCELUN": source_id, "TARGETLUN": target_id, "COPYSPEED": speed});
        let doc = self.request(Method::POST, "/luncopy", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(LunCopy {
            id: data.str_field("ID")?,
            state: LunCopyState::from_code(data.opt_i64_field("COPYSTATUS").unwrap_or(0)),
        })
    }

    pub async fn start_lun_copy(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/LUNCOPY/start", Some(body)).await?;
        Ok(())
    }

    pub async fn query_lun_copy_by_id(&self, id: &str) -> Result<LunCopy, ArrayError> {
        let doc = self.request(Method::GET, &format!("/luncopy/{id}"), None).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(LunCopy {
            id: id.to_string(),
            state: LunCopyState::from_code(data.opt_i64_field("COPYSTATUS").unwrap_or(0)),
        })
    }

    pub async fn delete_lun_copy(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/luncopy/{id}"), None).await?;
        Ok(())
    }

    /// Looks up the LunCopy (if any) still converging against `lun_id` as
    /// its target. Same purpose as `find_clone_pair_by_target_id`, for
    /// arrays that lack ClonePair support.
    pub async fn find_lun_copy_by_target_id(&self, lun_id: &str) -> Result<Option<LunCopy>, ArrayError> {
        let doc = self
            .request(Method::GET, &format!("/luncopy?filter=TARGETLUN::{lun_id}"), None)
            .await?;
        let arr = doc.as_value().get("data").and_then(Value::as_array).cloned().unwrap_or_default();
        arr.first()
            .map(|v| {
                let d = Document::new(v.clone());
                Ok(LunCopy {
                    id: d.str_field("ID")?,
                    state: LunCopyState::from_code(d.opt_i64_field("COPYSTATUS").unwrap_or(0)),
                })
            })
            .transpose()
    }

    // ---- HyperMetro ------------------------------------------------------

    pub async fn create_hypermetro_pair(
        &self,
        domain_id: &str,
        local_id: &str,
        remote_id: &str,
    ) -> Result<HyperMetroPair, ArrayError> {
        let body = json!({"DOMAINID": domain_id, "LOCALOBJID": local_id, "REMOTEOBJID": remote_id});
        let doc = self.request(Method::POST, "/HyperMetroPair", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(HyperMetroPair {
            id: data.str_field("ID")?,
            local_object_id: local_id.to_string(),
            remote_object_id: remote_id.to_string(),
            running_status: PairRunningStatus::from_code(data.opt_i64_field("RUNNINGSTATUS").unwrap_or(0)),
        })
    }

    pub async fn query_hypermetro_pair_by_id(&self, id: &str) -> Result<Option<HyperMetroPair>, ArrayError> {
        match self.request(Method::GET, &format!("/HyperMetroPair/{id}"), None).await {
            Ok(doc) => {
                let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
                Ok(Some(HyperMetroPair {
                    id: id.to_string(),
                    local_object_id: data.opt_str_field("LOCALOBJID").unwrap_or_default(),
                    remote_object_id: data.opt_str_field("REMOTEOBJID").unwrap_or_default(),
                    running_status: PairRunningStatus::from_code(data.opt_i64_field("RUNNINGSTATUS").unwrap_or(0)),
                }))
            }
            Err(ArrayError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn stop_hypermetro_pair(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/HyperMetroPair/disable_hcpair", Some(body)).await?;
        Ok(())
    }

    pub async fn sync_hypermetro_pair(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/HyperMetroPair/synchronize_hcpair", Some(body)).await?;
        Ok(())
    }

    pub async fn delete_hypermetro_pair(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/HyperMetroPair/{id}"), None).await?;
        Ok(())
    }

    // ---- Replication -----------------------------------------------------

    pub async fn create_replication_pair(
        &self,
        local_id: &str,
        remote_device_id: &str,
        remote_object_id: &str,
    ) -> Result<ReplicationPair, ArrayError> {
        let body = json!({
            "LOCALRESID": local_id,
            "REMOTEDEVICEID": remote_device_id,
            "REMOTERESID": remote_object_id,
            "REPLICATIONMODEL": 2,
        });
        let doc = self.request(Method::POST, "/REPLICATIONPAIR", Some(body)).await?;
        let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
        Ok(ReplicationPair {
            id: data.str_field("ID")?,
            local_object_id: local_id.to_string(),
            remote_object_id: remote_object_id.to_string(),
            running_status: PairRunningStatus::from_code(data.opt_i64_field("RUNNINGSTATUS").unwrap_or(0)),
        })
    }

    pub async fn query_replication_pair_by_id(&self, id: &str) -> Result<Option<ReplicationPair>, ArrayError> {
        match self.request(Method::GET, &format!("/REPLICATIONPAIR/{id}"), None).await {
            Ok(doc) => {
                let data = Document::new(doc.as_value().get("data").cloned().unwrap_or_default());
                Ok(Some(ReplicationPair {
                    id: id.to_string(),
                    local_object_id: data.opt_str_field("LOCALRESID").unwrap_or_default(),
                    remote_object_id: data.opt_str_field("REMOTERESID").unwrap_or_default(),
                    running_status: PairRunningStatus::from_code(data.opt_i64_field("RUNNINGSTATUS").unwrap_or(0)),
                }))
            }
            Err(ArrayError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn split_replication_pair(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/REPLICATIONPAIR/split", Some(body)).await?;
        Ok(())
    }

    pub async fn sync_replication_pair(&self, id: &str) -> Result<(), ArrayError> {
        let body = json!({"ID": id});
        self.request(Method::PUT, "/REPLICATIONPAIR/sync", Some(body)).await?;
        Ok(())
    }

    pub async fn delete_replication_pair(&self, id: &str) -> Result<(), ArrayError> {
        self.request(Method::DELETE, &format!("/REPLICATIONPAIR/{id}"), None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use std::time::Duration;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn adapter_against(server: &MockServer) -> ArrayAdapter {
        let cfg = SessionConfig {
            urls: vec![server.uri()],
            user: "a".into(),
            password: "b".into(),
            vstore: None,
            parallel_num: 20,
            insecure_skip_verify: true,
            request_timeout: Duration::from_secs(5),
        };
        let session = Arc::new(Session::new(cfg).unwrap());
        ArrayAdapter::new(session, true)
    }

    #[tokio::test]
    async fn delete_lun_treats_not_found_code_as_success() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/lun/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result_code": 50150005})))
            .mount(&server)
            .await;
        let adapter = adapter_against(&server).await;
        assert!(adapter.delete_lun("missing-id").await.is_ok());
    }

    #[tokio::test]
    async fn delete_lun_surfaces_non_benign_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/lun/.*"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result_code": 123456})))
            .mount(&server)
            .await;
        let adapter = adapter_against(&server).await;
        let err = adapter.delete_lun("some-id").await.unwrap_err();
        assert!(matches!(err, ArrayError::Server { code: 123456, .. }));
    }
}
