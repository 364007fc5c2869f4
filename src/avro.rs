//! Avro views of an online feature group's registry subject.
//!
//! Online rows are written with the subject schema, except that complex
//! features (arrays, structs, maps) travel as encoded bytes. The helpers here
//! derive both schemas from the registered subject.

use metastore_core::avro::field;
use metastore_core::records::Subject;
use serde_json::{json, Value};

use crate::error::{FeatureStoreError, RemoteError, Result};
use crate::feature::Feature;

/// Names of the complex features in `schema`.
pub fn complex_features(schema: &[Feature]) -> Vec<String> {
    schema.iter().filter(|f| f.is_complex()).map(|f| f.name.clone()).collect()
}

/// Parses the subject's schema text.
pub fn deserialized_schema(subject: &Subject) -> Result<Value> {
    serde_json::from_str(&subject.schema).map_err(|e| {
        FeatureStoreError::Remote(RemoteError {
            status: tonic::Code::DataLoss,
            message: format!("Subject {} carries an invalid Avro schema: {}", subject.subject, e),
        })
    })
}

/// Avro schema of one feature, without the null branch of its union.
///
/// Returns `None` if the subject has no field with that name.
pub fn feature_schema(subject: &Subject, name: &str) -> Result<Option<String>> {
    let schema = deserialized_schema(subject)?;
    Ok(field(&schema, name).and_then(|f| f.get("type")).map(|t| non_null(t).to_string()))
}

/// Subject schema with every complex feature replaced by nullable bytes.
pub fn encoded_schema(subject: &Subject, complex: &[String]) -> Result<String> {
    let mut schema = deserialized_schema(subject)?;
    if let Some(fields) = schema.get_mut("fields").and_then(Value::as_array_mut) {
        for f in fields.iter_mut() {
            let is_complex = f
                .get("name")
                .and_then(Value::as_str)
                .map(|n| complex.iter().any(|c| c == n))
                .unwrap_or(false);
            if is_complex {
                f["type"] = json!(["null", "bytes"]);
            }
        }
    }
    Ok(schema.to_string())
}

fn non_null(field_type: &Value) -> &Value {
    match field_type.as_array() {
        Some(branches) => branches.iter().find(|b| b.as_str() != Some("null")).unwrap_or(field_type),
        None => field_type,
    }
}
