//! Persisted feature group records.
//!
//! These are the shapes the metadata gateway stores and returns. The engine
//! consumes them as data and converts them into its own in-memory types; nothing
//! in this module carries behavior beyond naming helpers and defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::statistics::StatisticsPayload;

/// A single column of a persisted feature group schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub partition: bool,
    #[serde(default)]
    pub hudi_precombine_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub online_type: Option<String>,
}

impl FeatureRecord {
    pub fn new(name: impl Into<String>, feature_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_type: feature_type.into(),
            primary: false,
            partition: false,
            hudi_precombine_key: false,
            description: None,
            online_type: None,
        }
    }
}

/// Physical table format backing a feature group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeTravelFormat {
    #[default]
    Hudi,
    Delta,
    None,
}

impl Display for TimeTravelFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeTravelFormat::Hudi => write!(f, "HUDI"),
            TimeTravelFormat::Delta => write!(f, "DELTA"),
            TimeTravelFormat::None => write!(f, "NONE"),
        }
    }
}

/// Record discriminator, one per feature group variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureGroupType {
    Managed,
    External,
    Stream,
}

impl Display for FeatureGroupType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureGroupType::Managed => write!(f, "managed"),
            FeatureGroupType::External => write!(f, "external"),
            FeatureGroupType::Stream => write!(f, "stream"),
        }
    }
}

/// Statistics configuration of a feature group.
///
/// An empty `columns` list means every column is included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsConfig {
    pub enabled: bool,
    #[serde(default)]
    pub histograms: bool,
    #[serde(default)]
    pub correlations: bool,
    #[serde(default)]
    pub exact_uniqueness: bool,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histograms: false,
            correlations: false,
            exact_uniqueness: false,
            columns: Vec::new(),
        }
    }
}

/// Where an external feature group reads its data from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRecord {
    pub connector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl SourceRecord {
    pub fn query(connector: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            query: Some(query.into()),
            data_format: None,
            path: None,
            options: BTreeMap::new(),
        }
    }

    pub fn path(connector: impl Into<String>, path: impl Into<String>, data_format: impl Into<String>) -> Self {
        Self {
            connector: connector.into(),
            query: None,
            data_format: Some(data_format.into()),
            path: Some(path.into()),
            options: BTreeMap::new(),
        }
    }

    /// Stable key identifying the data behind this source.
    pub fn key(&self) -> String {
        let target = self.query.as_deref().or(self.path.as_deref()).unwrap_or_default();
        format!("{}/{}", self.connector, target)
    }
}

/// A single name/value option of a materialization job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOption {
    pub name: String,
    pub value: String,
}

/// Write configuration captured when a stream feature group is created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaStreamerJobConf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_options: Option<Vec<JobOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spark_job_configuration: Option<serde_json::Value>,
}

/// The persisted shape of a feature group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureGroupRecord {
    #[serde(default)]
    pub id: Option<i64>,
    pub feature_store_id: i64,
    pub feature_store_name: String,
    #[serde(rename = "type")]
    pub group_type: FeatureGroupType,
    pub name: String,
    pub version: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureRecord>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub time_travel_format: TimeTravelFormat,
    #[serde(default)]
    pub statistics_config: StatisticsConfig,
    #[serde(default)]
    pub expectations_names: Vec<String>,
    #[serde(default)]
    pub online_enabled: bool,
    #[serde(default)]
    pub online_topic_name: Option<String>,
    #[serde(default)]
    pub source: Option<SourceRecord>,
    #[serde(default)]
    pub deltastreamer_jobconf: Option<DeltaStreamerJobConf>,
    /// Creation time in epoch milliseconds, assigned by the gateway.
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub creator: Option<String>,
}

impl FeatureGroupRecord {
    /// An unsaved managed record with no features.
    pub fn new(feature_store_id: i64, feature_store_name: impl Into<String>, name: impl Into<String>, version: i32) -> Self {
        Self {
            id: None,
            feature_store_id,
            feature_store_name: feature_store_name.into(),
            group_type: FeatureGroupType::Managed,
            name: name.into(),
            version,
            description: None,
            features: Vec::new(),
            event_time: None,
            location: None,
            time_travel_format: TimeTravelFormat::default(),
            statistics_config: StatisticsConfig::default(),
            expectations_names: Vec::new(),
            online_enabled: false,
            online_topic_name: None,
            source: None,
            deltastreamer_jobconf: None,
            created: None,
            creator: None,
        }
    }

    /// Physical table name, `<name>_<version>`.
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }

    /// Key of the dataset this record materializes from.
    pub fn data_key(&self) -> String {
        match &self.source {
            Some(source) => source.key(),
            None => format!("{}/{}", self.feature_store_name, self.table_name()),
        }
    }
}

/// A persisted statistics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsCommit {
    /// Commit time formatted as `YYYYMMDDhhmmss`.
    pub commit_time: String,
    /// Computation time in epoch milliseconds.
    pub computation_time: i64,
    pub content: StatisticsPayload,
}

/// Which statistics commit to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitSelector {
    Latest,
    At(String),
}

/// A data commit on a time travel enabled feature group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    /// Commit id, the commit time in epoch milliseconds.
    pub commit_id: i64,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
}

/// Direction of an explicit provenance lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvenanceDirection {
    /// Artifacts the feature group was generated from.
    Upstream,
    /// Artifacts generated from the feature group.
    Downstream,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtifactKind {
    FeatureGroup,
    FeatureView,
}

/// Minimal description of an artifact on the other end of a provenance link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    /// Only known for accessible artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub feature_store_name: String,
    pub name: String,
    pub version: i32,
}

impl ArtifactRef {
    pub fn feature_group(record: &FeatureGroupRecord) -> Self {
        Self {
            kind: ArtifactKind::FeatureGroup,
            id: record.id,
            feature_store_name: record.feature_store_name.clone(),
            name: record.name.clone(),
            version: record.version,
        }
    }

    pub fn feature_view(feature_store_name: impl Into<String>, name: impl Into<String>, version: i32) -> Self {
        Self {
            kind: ArtifactKind::FeatureView,
            id: None,
            feature_store_name: feature_store_name.into(),
            name: name.into(),
            version,
        }
    }
}

/// Provenance links of one kind, split by what the caller may still see.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceLinks {
    #[serde(default)]
    pub accessible: Vec<ArtifactRef>,
    #[serde(default)]
    pub deleted: Vec<ArtifactRef>,
    #[serde(default)]
    pub inaccessible: Vec<ArtifactRef>,
}

impl ProvenanceLinks {
    pub fn is_empty(&self) -> bool {
        self.accessible.is_empty() && self.deleted.is_empty() && self.inaccessible.is_empty()
    }
}

/// A schema registry subject bound to an online topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: i64,
    pub subject: String,
    pub version: i32,
    /// Avro schema as JSON text.
    pub schema: String,
}
