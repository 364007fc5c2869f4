//! Schema validation.
//!
//! Every schema change passes through these checks before the metadata
//! gateway is called. Name comparisons are case-insensitive throughout.

use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;
use crate::feature::Feature;

/// Key declarations applied to a schema at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyDeclarations {
    pub primary_key: Vec<String>,
    pub partition_key: Vec<String>,
    pub hudi_precombine_key: Option<String>,
    pub event_time: Option<String>,
}

fn contains(schema: &[Feature], name: &str) -> bool {
    schema.iter().any(|f| f.matches(name))
}

/// Fails on the first pair of features whose names collide.
pub fn verify_unique_names(schema: &[Feature]) -> Result<(), SchemaError> {
    let mut seen = HashSet::new();
    for feature in schema {
        if !seen.insert(feature.name.to_lowercase()) {
            return Err(SchemaError::DuplicateFeature {
                name: feature.name.clone(),
            });
        }
    }
    Ok(())
}

/// Checks that primary keys and event time name existing features.
pub fn verify_key_names(
    schema: &[Feature],
    primary_keys: &[String],
    event_time: Option<&str>,
) -> Result<(), SchemaError> {
    verify_unique_names(schema)?;

    if let Some(name) = primary_keys.iter().find(|key| !contains(schema, key)) {
        return Err(SchemaError::UnknownPrimaryKey { name: name.clone() });
    }

    if let Some(name) = event_time {
        if !contains(schema, name) {
            return Err(SchemaError::UnknownEventTime { name: name.to_string() });
        }
    }

    Ok(())
}

/// [`verify_key_names`] plus partition and hudi precombine keys.
pub fn verify_attribute_key_names(schema: &[Feature], keys: &KeyDeclarations) -> Result<(), SchemaError> {
    verify_key_names(schema, &keys.primary_key, keys.event_time.as_deref())?;

    if let Some(name) = keys.partition_key.iter().find(|key| !contains(schema, key)) {
        return Err(SchemaError::UnknownPartitionKey { name: name.clone() });
    }

    if let Some(name) = &keys.hudi_precombine_key {
        if !contains(schema, name) {
            return Err(SchemaError::UnknownPrecombineKey { name: name.clone() });
        }
    }

    Ok(())
}

/// Fails if any proposed feature already exists in `existing`.
pub fn verify_append_only(existing: &[Feature], proposed: &[Feature]) -> Result<(), SchemaError> {
    match proposed.iter().find(|f| contains(existing, &f.name)) {
        Some(feature) => Err(SchemaError::FeatureExists {
            name: feature.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Fails if an update would change more than feature metadata.
///
/// A missing type leaves the type as it is. Key flags can only be repeated,
/// a flag set on the update but not on the existing feature is rejected.
/// Unknown features are skipped, callers look them up first.
pub fn verify_metadata_only(existing: &[Feature], updated: &[Feature]) -> Result<(), SchemaError> {
    for update in updated {
        let Some(current) = existing.iter().find(|f| f.matches(&update.name)) else {
            continue;
        };
        let immutable = |attribute| SchemaError::ImmutableFeature {
            name: current.name.clone(),
            attribute,
        };
        if let (Some(new_type), Some(old_type)) = (&update.feature_type, &current.feature_type) {
            if normalize_type(new_type) != normalize_type(old_type) {
                return Err(immutable("type"));
            }
        }
        if update.primary && !current.primary {
            return Err(immutable("primary key flag"));
        }
        if update.partition && !current.partition {
            return Err(immutable("partition key flag"));
        }
        if update.hudi_precombine_key && !current.hudi_precombine_key {
            return Err(immutable("hudi precombine key flag"));
        }
    }
    Ok(())
}

/// Compares a group schema with a schema inferred from data.
///
/// Every mismatch is collected: wrong types, group features missing from the
/// input and input features unknown to the group. Types are compared
/// lower-cased with whitespace removed, and two struct types always match.
pub fn verify_schema_compatibility(group_features: &[Feature], inferred: &[Feature]) -> Result<(), SchemaError> {
    let mut remaining: HashMap<String, &Feature> = inferred.iter().map(|f| (f.name.to_lowercase(), f)).collect();
    let mut mismatches = Vec::new();

    for feature in group_features {
        match remaining.remove(&feature.name.to_lowercase()) {
            Some(input) => {
                let (Some(group_type), Some(input_type)) = (&feature.feature_type, &input.feature_type) else {
                    continue;
                };
                let group_type = normalize_type(group_type);
                let input_type = normalize_type(input_type);
                let both_structs = group_type.starts_with("struct") && input_type.starts_with("struct");
                if group_type != input_type && !both_structs {
                    mismatches.push(format!(
                        "{} (expected type: '{}', derived from input: '{}') has the wrong type.",
                        feature.name, group_type, input_type
                    ));
                }
            }
            None => mismatches.push(format!(
                "{} (type: '{}') is missing from input dataframe.",
                feature.name,
                feature.feature_type.as_deref().unwrap_or_default()
            )),
        }
    }

    // keep input order for the remaining features
    for input in inferred {
        if remaining.contains_key(&input.name.to_lowercase()) {
            mismatches.push(format!(
                "{} (type: '{}') does not exist in feature group.",
                input.name,
                input.feature_type.as_deref().unwrap_or_default()
            ));
        }
    }

    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::Incompatible { mismatches })
    }
}

fn normalize_type(feature_type: &str) -> String {
    feature_type.to_lowercase().split_whitespace().collect()
}
