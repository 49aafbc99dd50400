use array_protocol::ArrayError;
use serde::{Deserialize, Serialize};

/// The logical API exposed upward for both LUN and filesystem volumes (spec
/// §6.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub size_bytes: i64,
    pub lun_wwn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub creation_time: String,
    pub size_bytes: i64,
    pub parent_id: String,
}

/// Which array object family an orchestrator call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeKind {
    San,
    Nas,
}

pub type OrchestratorResult<T> = Result<T, ArrayError>;
