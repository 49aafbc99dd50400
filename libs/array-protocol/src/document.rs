use serde_json::Value;

use crate::error::ArrayError;

/// The single opaque type at the REST boundary.
///
/// Per the re-architecture hint in spec §9: the source leans on untyped
/// key/value maps and runtime type assertions for every field it touches.
/// Rather than scatter `serde_json::Value` access through the adapter, every
/// raw array response is wrapped in one `Document` here, and the adapter
/// transcodes into a tagged record (see `record.rs`) at the edge. Nothing
/// above the adapter should ever hold onto a bare `Value`.
#[derive(Debug, Clone, Default)]
pub struct Document(Value);

impl Document {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn str_field(&self, name: &str) -> Result<String, ArrayError> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| ArrayError::Decode(format!("missing string field `{name}`")))
    }

    pub fn opt_str_field(&self, name: &str) -> Option<String> {
        self.0.get(name).and_then(Value::as_str).map(str::to_owned)
    }

    pub fn i64_field(&self, name: &str) -> Result<i64, ArrayError> {
        match self.0.get(name) {
            Some(Value::Number(n)) => n
                .as_i64()
                .ok_or_else(|| ArrayError::Decode(format!("field `{name}` is not an integer"))),
            // The array frequently serializes integers as decimal strings.
            Some(Value::String(s)) => s
                .parse::<i64>()
                .map_err(|_| ArrayError::Decode(format!("field `{name}` is not an integer"))),
            _ => Err(ArrayError::Decode(format!("missing integer field `{name}`"))),
        }
    }

    pub fn opt_i64_field(&self, name: &str) -> Option<i64> {
        self.i64_field(name).ok()
    }

    pub fn bool_field(&self, name: &str) -> bool {
        match self.0.get(name) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true" || s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            _ => false,
        }
    }
}

impl From<Value> for Document {
    fn from(value: Value) -> Self {
        Document::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_typed_fields() {
        let doc = Document::new(json!({"NAME": "lun-a", "CAPACITY": "42", "RUNNINGSTATUS": 27}));
        assert_eq!(doc.str_field("NAME").unwrap(), "lun-a");
        assert_eq!(doc.i64_field("CAPACITY").unwrap(), 42);
        assert_eq!(doc.i64_field("RUNNINGSTATUS").unwrap(), 27);
        assert!(doc.opt_str_field("MISSING").is_none());
    }

    #[test]
    fn missing_field_is_decode_error() {
        let doc = Document::new(json!({}));
        assert!(matches!(doc.str_field("NAME"), Err(ArrayError::Decode(_))));
    }
}
