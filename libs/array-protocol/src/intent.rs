use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ArrayError;

/// Where the new volume's content comes from. At most one may be set on an
/// intent (spec §3 invariant); `preCreate` folds whichever is present into
/// this enum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloneSource {
    None,
    FromVolume(String),
    FromSnapshot(String),
    CloneFrom(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocType {
    Thick,
    Thin,
}

impl Default for AllocType {
    fn default() -> Self {
        AllocType::Thin
    }
}

/// Raw input to an orchestrator call, as handed in by the caller (spec §3,
/// "Volume intent"). Recognized keys are typed fields; array-specific hints
/// that the orchestrator only forwards opaquely stay in `hints`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeIntent {
    pub name: String,
    pub capacity: i64,
    pub storagepool: String,
    pub qos: Option<Value>,
    #[serde(default)]
    pub hypermetro: bool,
    #[serde(default)]
    pub replication: bool,
    /// NAS-only; semicolon-separated client list.
    pub authclient: Option<String>,
    pub sourcevolumename: Option<String>,
    pub sourcesnapshotname: Option<String>,
    pub clonefrom: Option<String>,
    #[serde(default = "default_clone_speed")]
    pub clonespeed: u8,
    #[serde(default)]
    pub alloctype: AllocType,
    #[serde(default)]
    pub hints: HashMap<String, Value>,
}

fn default_clone_speed() -> u8 {
    3
}

/// The fully resolved form produced by `preCreate` (spec §4.E.1 step 1):
/// canonicalized name, resolved pool id, folded clone source, decoded flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIntent {
    pub canonical_name: String,
    pub original_name: String,
    pub capacity: i64,
    pub pool_id: String,
    pub qos: Option<HashMap<String, Value>>,
    pub hypermetro: bool,
    pub replication: bool,
    pub authclient: Option<Vec<String>>,
    pub clone_source: CloneSource,
    pub clonespeed: u8,
    pub alloctype: AllocType,
    /// Decoded `allsquash`/`rootsquash`/`snapshotdirectoryvisibility` hints
    /// (spec §4.E.1 step 1), carried through so the NAS share-access step
    /// (step 5) can apply them instead of discarding them after validation.
    pub allsquash: Option<i64>,
    pub rootsquash: Option<i64>,
    pub snapshot_dir_visibility: Option<i64>,
    pub hints: HashMap<String, Value>,
}

impl VolumeIntent {
    /// Validates the mutual-exclusion / NAS requirements from spec §4.E.1
    /// step 1 that don't require an array round trip. Pool-ID resolution
    /// and qos/squash decoding happen in the orchestrator (they need the
    /// adapter and array-specific decode tables respectively).
    pub fn validate_shape(&self, is_nas: bool) -> Result<(), ArrayError> {
        if self.hypermetro && self.replication {
            return Err(ArrayError::Precondition(
                "both hypermetro and replication requested".into(),
            ));
        }
        let sources = [
            self.sourcevolumename.is_some(),
            self.sourcesnapshotname.is_some(),
            self.clonefrom.is_some(),
        ];
        if sources.iter().filter(|b| **b).count() > 1 {
            return Err(ArrayError::InvalidConfig(
                "at most one of sourcevolumename, sourcesnapshotname, clonefrom may be set".into(),
            ));
        }
        if is_nas {
            match &self.authclient {
                Some(s) if !s.trim().is_empty() => {}
                _ => {
                    return Err(ArrayError::InvalidConfig(
                        "authclient is required for NAS volumes".into(),
                    ));
                }
            }
        }
        if !(1..=4).contains(&self.clonespeed) {
            return Err(ArrayError::InvalidConfig(format!(
                "clonespeed {} out of range [1,4]",
                self.clonespeed
            )));
        }
        Ok(())
    }

    pub fn clone_source(&self) -> CloneSource {
        if let Some(v) = &self.clonefrom {
            CloneSource::CloneFrom(v.clone())
        } else if let Some(v) = &self.sourcesnapshotname {
            CloneSource::FromSnapshot(v.clone())
        } else if let Some(v) = &self.sourcevolumename {
            CloneSource::FromVolume(v.clone())
        } else {
            CloneSource::None
        }
    }
}

/// Parses `authclient` (spec §4.E.1 step 5: "split on `;`") into a
/// deduplicated, order-preserving list of client names.
pub fn parse_authclient(raw: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_string()))
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_intent() -> VolumeIntent {
        VolumeIntent {
            name: "pvc-a".into(),
            capacity: 1024,
            storagepool: "P1".into(),
            qos: None,
            hypermetro: false,
            replication: false,
            authclient: None,
            sourcevolumename: None,
            sourcesnapshotname: None,
            clonefrom: None,
            clonespeed: 3,
            alloctype: AllocType::Thin,
            hints: HashMap::new(),
        }
    }

    #[test]
    fn rejects_hypermetro_and_replication_together() {
        let mut intent = base_intent();
        intent.hypermetro = true;
        intent.replication = true;
        assert!(matches!(
            intent.validate_shape(false),
            Err(ArrayError::Precondition(_))
        ));
    }

    #[test]
    fn rejects_multiple_clone_sources() {
        let mut intent = base_intent();
        intent.sourcevolumename = Some("src".into());
        intent.clonefrom = Some("other".into());
        assert!(matches!(
            intent.validate_shape(false),
            Err(ArrayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn nas_requires_authclient() {
        let intent = base_intent();
        assert!(matches!(
            intent.validate_shape(true),
            Err(ArrayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn parses_and_dedupes_authclient() {
        assert_eq!(
            parse_authclient("k8s1;k8s2;k8s1; ;k8s3"),
            vec!["k8s1", "k8s2", "k8s3"]
        );
    }
}
