//! Error types for feature group operations.
//!
//! Validation failures (`SchemaError`, `QueryError`, `NotFoundError`,
//! `FormatError`) are raised locally before any collaborator is called.
//! `RemoteError` wraps a failed gateway or provider exchange unchanged.

use thiserror::Error;
use tonic::{Code, Status};

/// Schema and key declaration violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Provided primary key `{name}` does not exist in the feature group schema")]
    UnknownPrimaryKey { name: String },

    #[error("Provided event time feature `{name}` does not exist in the feature group schema")]
    UnknownEventTime { name: String },

    #[error("Provided partition key `{name}` does not exist in the feature group schema")]
    UnknownPartitionKey { name: String },

    #[error("Provided hudi precombine key `{name}` does not exist in the feature group schema")]
    UnknownPrecombineKey { name: String },

    #[error("Feature name `{name}` is used more than once (feature names are case-insensitive)")]
    DuplicateFeature { name: String },

    #[error("Feature `{name}` already exists in the schema, use update_feature_description to change its metadata")]
    FeatureExists { name: String },

    #[error("Features are not compatible with Feature Group schema:{}", format_mismatches(.mismatches))]
    Incompatible { mismatches: Vec<String> },

    #[error("Feature group `{name}`, version `{version}` has already been saved")]
    AlreadyPersisted { name: String, version: i32 },

    #[error("Feature group `{name}`, version `{version}` has neither features nor a source to infer them from")]
    MissingSchema { name: String, version: i32 },

    #[error("The {attribute} of feature `{name}` cannot change after creation, only its metadata can be updated")]
    ImmutableFeature { name: String, attribute: &'static str },
}

fn format_mismatches(mismatches: &[String]) -> String {
    mismatches.iter().map(|m| format!("\n - {}", m)).collect()
}

/// Selection of features that are not part of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Feature `{feature}` does not exist in feature group `{group}`, version `{version}`")]
    UnknownFeature { feature: String, group: String, version: i32 },
}

/// Single feature lookup miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Feature with name `{feature}` not found in feature group `{group}`, version `{version}`")]
pub struct NotFoundError {
    pub feature: String,
    pub group: String,
    pub version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("Commit time `{value}` is not a YYYYMMDDhhmmss timestamp")]
    CommitTime { value: String },

    #[error("Commit id `{value}` is not a valid epoch millisecond timestamp")]
    CommitId { value: i64 },
}

/// A failed collaborator exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Remote call failed with status {status:?}: {message}")]
pub struct RemoteError {
    pub status: Code,
    pub message: String,
}

impl From<Status> for RemoteError {
    fn from(status: Status) -> Self {
        Self {
            status: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Top-level error of the feature store engine.
#[derive(Debug, Error)]
pub enum FeatureStoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Feature group `{name}`, version `{version}` is not saved yet")]
    NotPersisted { name: String, version: i32 },

    #[error("{operation} is not supported: {reason}")]
    Unsupported { operation: &'static str, reason: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl From<Status> for FeatureStoreError {
    fn from(status: Status) -> Self {
        FeatureStoreError::Remote(status.into())
    }
}

pub type Result<T> = std::result::Result<T, FeatureStoreError>;
