//! Tagged records transcoded from `Document` at the adapter boundary (spec §3,
//! "Array objects"). Only the fields spec §6 actually consumes are modeled;
//! everything else stays in the raw `Document` the adapter returns alongside
//! (callers that need an exotic field can fall back to it).

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ArrayError;

/// RUNNINGSTATUS codes the array reports on a LUN while it is still the
/// target of a converging ClonePair or LunCopy operation (spec §3
/// invariant: "a LUN/FS with a non-final clone/split status MUST NOT be
/// exposed to clients"). Any other value, including an absent field, is
/// treated as terminal.
const LUN_CLONING_RUNNING_STATUS: &[&str] = &["35", "39"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lun {
    pub id: String,
    pub name: String,
    pub capacity: i64,
    pub wwn: Option<String>,
    pub parent_id: Option<String>,
    pub health_status: String,
    pub running_status: String,
    /// True while a clone/split is still converging; such a LUN must not be
    /// exposed to clients (spec §3 invariant).
    pub is_clone_split_terminal: bool,
}

impl Lun {
    pub fn from_document(doc: &Document) -> Result<Self, ArrayError> {
        let running_status = doc.opt_str_field("RUNNINGSTATUS").unwrap_or_default();
        let is_clone_split_terminal = !LUN_CLONING_RUNNING_STATUS.contains(&running_status.as_str());
        Ok(Lun {
            id: doc.str_field("ID")?,
            name: doc.str_field("NAME")?,
            capacity: doc.i64_field("CAPACITY")?,
            wwn: doc.opt_str_field("WWN"),
            parent_id: doc.opt_str_field("PARENTID"),
            health_status: doc.opt_str_field("HEALTHSTATUS").unwrap_or_default(),
            running_status,
            is_clone_split_terminal,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystem {
    pub id: String,
    pub name: String,
    pub capacity: i64,
    pub parent_id: Option<String>,
    pub snapshot_count: i64,
    /// True unless the filesystem's own `SPLITSTATUS` field is present and
    /// still transient (spec §3 invariant, mirroring `Lun::
    /// is_clone_split_terminal`). A filesystem that was never a clone/split
    /// target has no `SPLITSTATUS` field at all, which is terminal.
    pub is_clone_split_terminal: bool,
}

impl FileSystem {
    pub fn from_document(doc: &Document) -> Result<Self, ArrayError> {
        let is_clone_split_terminal = match doc.opt_i64_field("SPLITSTATUS") {
            Some(code) => !SplitState::from_code(code).is_transient(),
            None => true,
        };
        Ok(FileSystem {
            id: doc.str_field("ID")?,
            name: doc.str_field("NAME")?,
            capacity: doc.i64_field("CAPACITY")?,
            parent_id: doc.opt_str_field("PARENTID"),
            snapshot_count: doc.opt_i64_field("SNAPSHOTCOUNT").unwrap_or(0),
            is_clone_split_terminal,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub name: String,
    pub parent_id: String,
    pub creation_time: String,
    pub size_bytes: i64,
    pub is_active: bool,
}

/// ClonePair convergence state (spec §4.E.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClonePairState {
    Initializing,
    Syncing,
    Unsyncing,
    Normal,
    Fault,
}

impl ClonePairState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ClonePairState::Initializing,
            1 => ClonePairState::Syncing,
            2 => ClonePairState::Unsyncing,
            3 => ClonePairState::Normal,
            _ => ClonePairState::Fault,
        }
    }

    pub fn is_terminal_success(self) -> bool {
        matches!(self, ClonePairState::Normal)
    }

    pub fn is_terminal_failure(self) -> bool {
        matches!(self, ClonePairState::Fault)
    }
}

/// LunCopy convergence state (spec §4.E.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LunCopyState {
    Queuing,
    Copying,
    Stopped,
    Paused,
    Fault,
    Other(i64),
}

impl LunCopyState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LunCopyState::Queuing,
            1 => LunCopyState::Copying,
            2 => LunCopyState::Stopped,
            3 => LunCopyState::Paused,
            4 => LunCopyState::Fault,
            other => LunCopyState::Other(other),
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(self, LunCopyState::Queuing | LunCopyState::Copying)
    }

    pub fn is_terminal_failure(self) -> bool {
        matches!(
            self,
            LunCopyState::Stopped | LunCopyState::Paused | LunCopyState::Fault
        )
    }

    pub fn is_terminal_success(self) -> bool {
        !self.is_transient() && !self.is_terminal_failure()
    }
}

/// Filesystem clone-split state (spec §4.E.1.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitState {
    NotStart,
    Queuing,
    Splitting,
    Abnormal,
    Other(i64),
}

impl SplitState {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => SplitState::NotStart,
            1 => SplitState::Queuing,
            2 => SplitState::Splitting,
            3 => SplitState::Abnormal,
            other => SplitState::Other(other),
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(
            self,
            SplitState::NotStart | SplitState::Queuing | SplitState::Splitting
        )
    }

    pub fn is_terminal_failure(self) -> bool {
        matches!(self, SplitState::Abnormal)
    }

    pub fn is_terminal_success(self) -> bool {
        !self.is_transient() && !self.is_terminal_failure()
    }
}

/// Running status shared by HyperMetro and Replication pairs: both need
/// "stopped before delete" and "split/sync" transitions (spec §3, §4.E.2/3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairRunningStatus {
    Normal,
    Syncing,
    ToSync,
    Paused,
    Stopped,
    Invalid,
    Other(i64),
}

impl PairRunningStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => PairRunningStatus::Normal,
            23 => PairRunningStatus::Syncing,
            100 => PairRunningStatus::ToSync,
            41 => PairRunningStatus::Paused,
            26 => PairRunningStatus::Stopped,
            35 => PairRunningStatus::Invalid,
            other => PairRunningStatus::Other(other),
        }
    }

    /// Whether the pair must be stopped before it may be deleted (spec §3
    /// invariant: "in-flight running status... MUST be stopped").
    pub fn is_running(self) -> bool {
        matches!(self, PairRunningStatus::Syncing | PairRunningStatus::ToSync)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HyperMetroPair {
    pub id: String,
    pub local_object_id: String,
    pub remote_object_id: String,
    pub running_status: PairRunningStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationPair {
    pub id: String,
    pub local_object_id: String,
    pub remote_object_id: String,
    pub running_status: PairRunningStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QosPolicy {
    pub id: String,
    pub name: String,
    pub associated_object_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsShare {
    pub id: String,
    pub fs_id: String,
    pub share_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfsShareAccess {
    pub id: String,
    pub share_id: String,
    pub access_name: String,
    pub access_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClonePair {
    pub id: String,
    pub state: ClonePairState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LunCopy {
    pub id: String,
    pub state: LunCopyState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePool {
    pub id: String,
    pub name: String,
}

/// Bit-set of dependent relationships read off a LUN/FS before delete (spec
/// §4.E.2 step 2): HyperMetro, RemoteReplication, LunCopy, HyperCopy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssFlags {
    pub hypermetro: bool,
    pub replication: bool,
    pub lun_copy: bool,
    pub hyper_copy: bool,
}
