use std::collections::HashMap;

use array_protocol::ArrayError;
use serde_json::Value;

/// Decodes the `qos` intent field (string or already-decoded map) into a
/// map of array-side QoS parameters. Treated as a pure decode helper (spec
/// §1 non-goals list "similar config decode helpers" as out of scope for
/// deep modeling; this is the minimal shape the orchestrator needs to call
/// `ArrayAdapter::create_qos_policy`).
pub fn decode_qos(raw: &Value) -> Result<HashMap<String, Value>, ArrayError> {
    match raw {
        Value::Object(map) => Ok(map.clone().into_iter().collect()),
        Value::String(s) => {
            let parsed: HashMap<String, Value> = serde_json::from_str(s)
                .map_err(|e| ArrayError::InvalidConfig(format!("invalid qos string: {e}")))?;
            Ok(parsed)
        }
        _ => Err(ArrayError::InvalidConfig(
            "qos must be a string or an object".into(),
        )),
    }
}

/// `allsquash` / `rootsquash` decode (spec §4.E.1 step 1).
pub fn squash_code(raw: &str) -> Result<i64, ArrayError> {
    match raw {
        "no_all_squash" | "no_root_squash" => Ok(0),
        "all_squash" | "root_squash" => Ok(1),
        other => Err(ArrayError::InvalidConfig(format!(
            "unknown squash value `{other}`"
        ))),
    }
}

/// `snapshotdirectoryvisibility` decode (spec §4.E.1 step 1).
pub fn snapshot_dir_visibility_code(raw: &str) -> Result<i64, ArrayError> {
    match raw {
        "visible" => Ok(0),
        "invisible" => Ok(1),
        other => Err(ArrayError::InvalidConfig(format!(
            "unknown snapshotdirectoryvisibility value `{other}`"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_qos_object_and_string() {
        let obj = json!({"IOTYPE": 2});
        assert_eq!(decode_qos(&obj).unwrap().get("IOTYPE"), Some(&json!(2)));
        let s = json!("{\"IOTYPE\":2}");
        assert_eq!(decode_qos(&s).unwrap().get("IOTYPE"), Some(&json!(2)));
    }

    #[test]
    fn rejects_unknown_squash_value() {
        assert!(squash_code("whatever").is_err());
        assert_eq!(squash_code("all_squash").unwrap(), 1);
    }
}
