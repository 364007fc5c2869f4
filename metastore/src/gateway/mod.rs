//! Metadata gateway for feature group records.
//!
//! The gateway is the authoritative store of feature group metadata. This
//! module defines the contract the engine consumes and ships one in-memory
//! implementation:
//! - `memory`: process-local catalog for tests, demos and embedding
//!
//! Every operation is a single request/response exchange. Failures are
//! reported as `tonic::Status`, carrying the status code of the remote side.

pub mod memory;

use crate::records::{
    ArtifactKind, CommitRecord, CommitSelector, FeatureGroupRecord, FeatureRecord, ProvenanceDirection, ProvenanceLinks,
    StatisticsCommit, StatisticsConfig, Subject,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tonic::Status;

/// A partial metadata update applied to an existing feature group.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataUpdate {
    /// Replace the feature group description.
    Description(String),
    /// Update metadata (currently descriptions) of existing features.
    Features(Vec<FeatureRecord>),
    /// Replace the statistics configuration.
    StatisticsConfig(StatisticsConfig),
}

/// Metadata gateway trait.
///
/// This trait defines the interface every metadata store must implement:
/// - Feature group creation, lookup, update and deletion
/// - Schema evolution (append-only)
/// - Tag management
/// - Statistics commits
/// - Data commit history and schema registry subjects
/// - Explicit provenance links
#[async_trait]
pub trait MetadataGateway: Send + Sync + 'static {
    /// Persist a new feature group and return it with its assigned id.
    async fn save(&self, record: FeatureGroupRecord) -> Result<FeatureGroupRecord, Status>;

    /// Fetch a feature group by its compound key.
    async fn fetch(&self, feature_store_id: i64, name: String, version: i32) -> Result<FeatureGroupRecord, Status>;

    /// Apply a metadata update and return the updated record.
    async fn update(&self, id: i64, update: MetadataUpdate) -> Result<FeatureGroupRecord, Status>;

    /// Append features to the schema and return the full updated schema.
    async fn append_features(&self, id: i64, features: Vec<FeatureRecord>) -> Result<Vec<FeatureRecord>, Status>;

    /// Delete a feature group with its data and jobs.
    async fn delete(&self, id: i64) -> Result<(), Status>;

    /// Attach or overwrite a tag.
    async fn add_tag(&self, id: i64, name: String, value: Value) -> Result<(), Status>;

    /// All tags of a feature group.
    async fn get_tags(&self, id: i64) -> Result<BTreeMap<String, Value>, Status>;

    /// A single tag value.
    async fn get_tag(&self, id: i64, name: String) -> Result<Value, Status>;

    /// Remove a tag.
    async fn delete_tag(&self, id: i64, name: String) -> Result<(), Status>;

    /// Fetch a statistics commit, `None` if no commit matches.
    async fn get_statistics_commit(
        &self,
        id: i64,
        selector: CommitSelector,
    ) -> Result<Option<StatisticsCommit>, Status>;

    /// Persist a statistics commit.
    async fn save_statistics_commit(&self, id: i64, commit: StatisticsCommit) -> Result<StatisticsCommit, Status>;

    /// Data commits at or before `wallclock` (epoch millis), newest first.
    async fn get_commit_details(
        &self,
        id: i64,
        wallclock: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<CommitRecord>, Status>;

    /// Schema registry subject bound to an online topic.
    async fn get_subject(&self, topic: String) -> Result<Subject, Status>;

    /// Provenance links of `artifact` kind in `direction` from a feature group.
    async fn get_provenance(
        &self,
        id: i64,
        direction: ProvenanceDirection,
        artifact: ArtifactKind,
    ) -> Result<ProvenanceLinks, Status>;
}
