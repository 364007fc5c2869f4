//! Avro schema derivation for online feature group topics.
//!
//! Feature types are Hive-style type strings (`bigint`, `array<string>`,
//! `struct<a:int,b:string>`, `map<string,double>`). Every top-level field is
//! emitted as a nullable union.

use serde_json::{json, Map, Value};

use crate::records::FeatureGroupRecord;

/// Builds the Avro record schema for a feature group.
pub fn record_schema(record: &FeatureGroupRecord) -> Value {
    let fields: Vec<Value> = record
        .features
        .iter()
        .map(|f| {
            json!({
                "name": f.name,
                "type": ["null", avro_type(&f.name, &f.feature_type)],
            })
        })
        .collect();

    json!({
        "type": "record",
        "name": record.table_name(),
        "namespace": format!("{}.db", record.feature_store_name),
        "fields": fields,
    })
}

/// Maps a Hive type string to an Avro type.
///
/// `name` seeds the record names of nested structs, which must be unique
/// inside one Avro schema.
pub fn avro_type(name: &str, hive_type: &str) -> Value {
    let normalized = hive_type.trim().to_lowercase();

    if let Some(inner) = strip_wrapper(&normalized, "array") {
        return json!({
            "type": "array",
            "items": ["null", avro_type(name, inner)],
        });
    }

    if let Some(inner) = strip_wrapper(&normalized, "map") {
        let parts = split_top_level(inner);
        let value_type = parts.get(1).copied().unwrap_or("string");
        return json!({
            "type": "map",
            "values": ["null", avro_type(name, value_type)],
        });
    }

    if let Some(inner) = strip_wrapper(&normalized, "struct") {
        let fields: Vec<Value> = split_top_level(inner)
            .into_iter()
            .filter_map(|field| field.split_once(':'))
            .map(|(field_name, field_type)| {
                let field_name = field_name.trim();
                json!({
                    "name": field_name,
                    "type": ["null", avro_type(&format!("{}_{}", name, field_name), field_type)],
                })
            })
            .collect();
        return json!({
            "type": "record",
            "name": format!("r_{}", name),
            "fields": fields,
        });
    }

    if let Some(args) = strip_parens(&normalized, "decimal") {
        let parts = split_top_level(args);
        let precision: u64 = parts.first().and_then(|p| p.trim().parse().ok()).unwrap_or(10);
        let scale: u64 = parts.get(1).and_then(|s| s.trim().parse().ok()).unwrap_or(0);
        return json!({
            "type": "bytes",
            "logicalType": "decimal",
            "precision": precision,
            "scale": scale,
        });
    }

    match normalized.as_str() {
        "boolean" => json!("boolean"),
        "tinyint" | "smallint" | "int" | "integer" => json!("int"),
        "bigint" => json!("long"),
        "float" => json!("float"),
        "double" => json!("double"),
        "binary" => json!("bytes"),
        "date" => json!({"type": "int", "logicalType": "date"}),
        "timestamp" => json!({"type": "long", "logicalType": "timestamp-micros"}),
        _ => json!("string"),
    }
}

/// Whether a Hive type string is an array, struct or map.
pub fn is_complex_type(hive_type: &str) -> bool {
    let normalized = hive_type.trim().to_lowercase();
    ["array<", "struct<", "map<"].iter().any(|p| normalized.starts_with(p))
}

/// Looks up a top-level field of a record schema.
pub fn field<'a>(schema: &'a Value, name: &str) -> Option<&'a Map<String, Value>> {
    schema
        .get("fields")?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|f| f.get("name").and_then(Value::as_str) == Some(name))
}

fn strip_wrapper<'a>(hive_type: &'a str, wrapper: &str) -> Option<&'a str> {
    hive_type
        .strip_prefix(wrapper)?
        .trim_start()
        .strip_prefix('<')?
        .strip_suffix('>')
}

fn strip_parens<'a>(hive_type: &'a str, wrapper: &str) -> Option<&'a str> {
    hive_type
        .strip_prefix(wrapper)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

/// Splits on commas that are not nested inside `<>` or `()`.
fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    let last = input[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }
    parts
}
