//! Feature group entity.
//!
//! A [`FeatureGroup`] is a named, versioned collection of features. It keeps an
//! in-memory copy of its schema that mirrors the record held by the metadata
//! gateway:
//! - Mutations validate locally, call the gateway once, and only then adopt
//!   the returned state. A failed call leaves the entity untouched.
//! - Selections and lookups work on the in-memory schema and never call out.
//! - Primary keys and the registry subject are cached until a fresh schema is
//!   adopted or the subject is unloaded.
//!
//! Variant specific behavior is gated by [`Capabilities`]; operations a variant
//! does not support return `None` or [`FeatureStoreError::Unsupported`].

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, NaiveDateTime, Utc};
use metastore_core::gateway::MetadataUpdate;
use metastore_core::records::{
    ArtifactKind, CommitSelector, DeltaStreamerJobConf, FeatureGroupRecord, FeatureRecord, JobOption, ProvenanceDirection,
    ProvenanceLinks, SourceRecord, StatisticsCommit, StatisticsConfig, Subject, TimeTravelFormat,
};
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::advisory::Advisory;
use crate::avro;
use crate::config::DefaultSettings;
use crate::error::{FeatureStoreError, FormatError, NotFoundError, QueryError, Result, SchemaError};
use crate::feature::Feature;
use crate::feature_store::{Collaborators, FeatureStoreRef};
use crate::kind::{Capabilities, FeatureGroupKind};
use crate::query::{self, FeatureGroupRef, FilterLogic, Query};
use crate::validate::{
    verify_append_only, verify_attribute_key_names, verify_metadata_only, verify_schema_compatibility,
    verify_unique_names, KeyDeclarations,
};

/// Format of statistics commit times and commit timestamps.
pub const COMMIT_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// Parses a `YYYYMMDDhhmmss` commit time.
pub fn parse_commit_time(value: &str) -> std::result::Result<NaiveDateTime, FormatError> {
    let malformed = || FormatError::CommitTime {
        value: value.to_string(),
    };
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    NaiveDateTime::parse_from_str(value, COMMIT_TIME_FORMAT).map_err(|_| malformed())
}

/// A data commit of a time travel enabled feature group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDetails {
    /// Commit time formatted as `YYYYMMDDhhmmss` (UTC).
    pub committed_on: String,
    pub rows_inserted: i64,
    pub rows_updated: i64,
    pub rows_deleted: i64,
}

pub struct FeatureGroup {
    id: Option<i64>,
    kind: FeatureGroupKind,
    feature_store: FeatureStoreRef,
    name: String,
    version: i32,
    description: Option<String>,
    features: Vec<Feature>,
    event_time: Option<String>,
    location: Option<String>,
    time_travel_format: TimeTravelFormat,
    statistics_config: StatisticsConfig,
    expectations_names: Vec<String>,
    primary_key: Vec<String>,
    partition_key: Vec<String>,
    hudi_precombine_key: Option<String>,
    online_enabled: bool,
    online_topic_name: Option<String>,
    source: Option<SourceRecord>,
    write_options: BTreeMap<String, Value>,
    deltastreamer_jobconf: Option<DeltaStreamerJobConf>,
    created: Option<DateTime<Utc>>,
    creator: Option<String>,
    primary_keys: OnceLock<Vec<String>>,
    subject: OnceCell<Subject>,
    collaborators: Collaborators,
}

impl FeatureGroup {
    fn unsaved(
        kind: FeatureGroupKind,
        feature_store: FeatureStoreRef,
        name: String,
        version: i32,
        defaults: &DefaultSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            id: None,
            kind,
            feature_store,
            name,
            version,
            description: None,
            features: Vec::new(),
            event_time: None,
            location: None,
            time_travel_format: defaults.time_travel_format,
            statistics_config: defaults.statistics.clone(),
            expectations_names: Vec::new(),
            primary_key: Vec::new(),
            partition_key: Vec::new(),
            hudi_precombine_key: None,
            online_enabled: kind.capabilities().always_online,
            online_topic_name: None,
            source: None,
            write_options: BTreeMap::new(),
            deltastreamer_jobconf: None,
            created: None,
            creator: None,
            primary_keys: OnceLock::new(),
            subject: OnceCell::new(),
            collaborators,
        }
    }

    pub(crate) fn from_record(
        record: FeatureGroupRecord,
        feature_store: FeatureStoreRef,
        collaborators: Collaborators,
    ) -> Self {
        let mut group = Self::unsaved(
            record.group_type.into(),
            feature_store,
            record.name.clone(),
            record.version,
            &DefaultSettings::default(),
            collaborators,
        );
        group.adopt(record);
        group
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn kind(&self) -> FeatureGroupKind {
        self.kind
    }

    pub fn capabilities(&self) -> Capabilities {
        self.kind.capabilities()
    }

    pub fn feature_store(&self) -> &FeatureStoreRef {
        &self.feature_store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn event_time(&self) -> Option<&str> {
        self.event_time.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn time_travel_format(&self) -> TimeTravelFormat {
        self.time_travel_format
    }

    pub fn statistics_config(&self) -> &StatisticsConfig {
        &self.statistics_config
    }

    pub fn expectations_names(&self) -> &[String] {
        &self.expectations_names
    }

    pub fn partition_key(&self) -> &[String] {
        &self.partition_key
    }

    pub fn hudi_precombine_key(&self) -> Option<&str> {
        self.hudi_precombine_key.as_deref()
    }

    pub fn online_enabled(&self) -> bool {
        self.online_enabled
    }

    pub fn source(&self) -> Option<&SourceRecord> {
        self.source.as_ref()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    /// Write options captured for the ingestion job, stream groups only.
    pub fn deltastreamer_jobconf(&self) -> Option<&DeltaStreamerJobConf> {
        if self.capabilities().write_options {
            self.deltastreamer_jobconf.as_ref()
        } else {
            None
        }
    }

    pub fn reference(&self) -> FeatureGroupRef {
        FeatureGroupRef {
            id: self.id,
            feature_store_name: self.feature_store.name.clone(),
            name: self.name.clone(),
            version: self.version,
        }
    }

    /// The persisted shape of this feature group.
    pub fn record(&self) -> FeatureGroupRecord {
        self.to_record(self.features.clone())
    }

    fn to_record(&self, features: Vec<Feature>) -> FeatureGroupRecord {
        FeatureGroupRecord {
            id: self.id,
            feature_store_id: self.feature_store.id,
            feature_store_name: self.feature_store.name.clone(),
            group_type: self.kind.record_type(),
            name: self.name.clone(),
            version: self.version,
            description: self.description.clone(),
            features: features.into_iter().map(FeatureRecord::from).collect(),
            event_time: self.event_time.clone(),
            location: self.location.clone(),
            time_travel_format: self.time_travel_format,
            statistics_config: self.statistics_config.clone(),
            expectations_names: self.expectations_names.clone(),
            online_enabled: self.online_enabled,
            online_topic_name: self.online_topic_name.clone(),
            source: self.source.clone(),
            deltastreamer_jobconf: self.deltastreamer_jobconf.clone(),
            created: self.created.map(|c| c.timestamp_millis()),
            creator: self.creator.clone(),
        }
    }

    fn adopt(&mut self, record: FeatureGroupRecord) {
        self.id = record.id;
        self.kind = record.group_type.into();
        self.description = record.description;
        self.event_time = record.event_time;
        self.location = record.location;
        self.time_travel_format = record.time_travel_format;
        self.statistics_config = record.statistics_config;
        self.expectations_names = record.expectations_names;
        self.online_enabled = record.online_enabled;
        self.online_topic_name = record.online_topic_name;
        self.source = record.source;
        self.deltastreamer_jobconf = record.deltastreamer_jobconf;
        self.created = record.created.and_then(DateTime::from_timestamp_millis);
        self.creator = record.creator;
        self.adopt_features(record.features);
    }

    fn adopt_features(&mut self, records: Vec<FeatureRecord>) {
        let id = self.id;
        self.features = records
            .into_iter()
            .map(|record| Feature {
                feature_group_id: id,
                ..Feature::from(record)
            })
            .collect();
        self.primary_key = self.features.iter().filter(|f| f.primary).map(|f| f.name.clone()).collect();
        self.partition_key = self.features.iter().filter(|f| f.partition).map(|f| f.name.clone()).collect();
        self.hudi_precombine_key = self
            .features
            .iter()
            .find(|f| f.hudi_precombine_key)
            .map(|f| f.name.clone());
        self.primary_keys = OnceLock::new();
    }

    fn persisted_id(&self) -> Result<i64> {
        self.id.ok_or_else(|| FeatureStoreError::NotPersisted {
            name: self.name.clone(),
            version: self.version,
        })
    }

    fn key_declarations(&self) -> KeyDeclarations {
        KeyDeclarations {
            primary_key: self.primary_key.clone(),
            partition_key: self.partition_key.clone(),
            // precombine keys only exist on hudi tables
            hudi_precombine_key: match self.time_travel_format {
                TimeTravelFormat::Hudi => self.hudi_precombine_key.clone(),
                _ => None,
            },
            event_time: self.event_time.clone(),
        }
    }

    fn stream_jobconf(&self) -> DeltaStreamerJobConf {
        let mut options = self.write_options.clone();
        let spark = options.remove("spark");
        let write_options: Vec<JobOption> = options
            .into_iter()
            .map(|(name, value)| JobOption {
                name,
                value: match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                },
            })
            .collect();
        DeltaStreamerJobConf {
            write_options: (!write_options.is_empty()).then_some(write_options),
            spark_job_configuration: spark,
        }
    }

    async fn infer_schema(&self) -> Result<Vec<Feature>> {
        let provider = &self.collaborators.provider;
        let alias = self.kind.temporary_view_alias().to_string();
        let handle = provider.register_temporary_view(self.record(), alias).await?;
        debug!(view = %handle, name = %self.name, "inferring schema");
        let inferred = provider.infer_schema(handle, self.time_travel_format).await?;
        Ok(inferred.into_iter().map(Feature::from).collect())
    }

    /// Creates the feature group in the metadata gateway.
    ///
    /// Without features the schema is inferred from the source. With both
    /// features and a source, managed and stream groups check that the source
    /// matches the declared schema.
    pub async fn save(&mut self) -> Result<()> {
        if self.id.is_some() {
            return Err(SchemaError::AlreadyPersisted {
                name: self.name.clone(),
                version: self.version,
            }
            .into());
        }

        let missing_schema = || SchemaError::MissingSchema {
            name: self.name.clone(),
            version: self.version,
        };
        if self.capabilities().requires_source && self.source.is_none() {
            return Err(missing_schema().into());
        }

        let mut features = self.features.clone();
        if features.is_empty() {
            if self.source.is_none() {
                return Err(missing_schema().into());
            }
            features = self.infer_schema().await?;
        } else if self.kind != FeatureGroupKind::External && self.source.is_some() {
            let inferred = self.infer_schema().await?;
            verify_schema_compatibility(&features, &inferred)?;
        }

        let keys = self.key_declarations();
        verify_attribute_key_names(&features, &keys)?;
        apply_key_flags(&mut features, &keys);

        let mut record = self.to_record(features);
        if self.capabilities().write_options {
            record.deltastreamer_jobconf = Some(self.stream_jobconf());
        }

        let saved = self.collaborators.gateway.save(record).await?;
        info!(
            name = %saved.name,
            version = saved.version,
            id = ?saved.id,
            kind = %self.kind,
            features = saved.features.len(),
            "created feature group"
        );
        self.adopt(saved);
        Ok(())
    }

    /// Re-reads the record from the metadata gateway.
    pub async fn refresh(&mut self) -> Result<()> {
        let record = self
            .collaborators
            .gateway
            .fetch(self.feature_store.id, self.name.clone(), self.version)
            .await?;
        self.adopt(record);
        Ok(())
    }

    /// Adds new features to the schema. Existing features cannot be appended
    /// again, use [`FeatureGroup::update_feature_description`] instead.
    pub async fn append_features(&mut self, features: Vec<Feature>) -> Result<()> {
        let id = self.persisted_id()?;
        verify_append_only(&self.features, &features)?;
        verify_unique_names(&features)?;

        let added = features.len();
        let records = features.into_iter().map(FeatureRecord::from).collect();
        let schema = self.collaborators.gateway.append_features(id, records).await?;

        self.adopt_features(schema);
        self.subject.take();
        info!(name = %self.name, version = self.version, added, "appended features");
        Ok(())
    }

    pub async fn update_description(&mut self, description: impl Into<String>) -> Result<()> {
        let id = self.persisted_id()?;
        let record = self
            .collaborators
            .gateway
            .update(id, MetadataUpdate::Description(description.into()))
            .await?;
        self.description = record.description;
        Ok(())
    }

    pub async fn update_feature_description(&mut self, name: &str, description: impl Into<String>) -> Result<()> {
        let id = self.persisted_id()?;
        let feature = self.get_feature(name)?.clone().with_description(description);
        let record = self
            .collaborators
            .gateway
            .update(id, MetadataUpdate::Features(vec![feature.into()]))
            .await?;
        self.adopt_features(record.features);
        Ok(())
    }

    /// Updates metadata of existing features.
    ///
    /// Only descriptions and online types are taken from `features`. Names,
    /// types and key flags stay as they are, and an update that tries to
    /// change a type or add a key flag fails before the gateway is called.
    pub async fn update_features(&mut self, features: Vec<Feature>) -> Result<()> {
        let id = self.persisted_id()?;
        let mut updated = Vec::with_capacity(features.len());
        for feature in features {
            let current = self.get_feature(&feature.name)?;
            verify_metadata_only(std::slice::from_ref(current), std::slice::from_ref(&feature))?;
            updated.push(overlay_metadata(current, feature));
        }
        let merged = merge_features(&self.features, updated);
        let record = self
            .collaborators
            .gateway
            .update(
                id,
                MetadataUpdate::Features(merged.into_iter().map(FeatureRecord::from).collect()),
            )
            .await?;
        self.adopt_features(record.features);
        Ok(())
    }

    pub async fn update_statistics_config(&mut self, config: StatisticsConfig) -> Result<()> {
        let id = self.persisted_id()?;
        let record = self
            .collaborators
            .gateway
            .update(id, MetadataUpdate::StatisticsConfig(config))
            .await?;
        self.statistics_config = record.statistics_config;
        Ok(())
    }

    pub async fn add_tag(&self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let id = self.persisted_id()?;
        Ok(self.collaborators.gateway.add_tag(id, name.into(), value.into()).await?)
    }

    pub async fn get_tags(&self) -> Result<BTreeMap<String, Value>> {
        let id = self.persisted_id()?;
        Ok(self.collaborators.gateway.get_tags(id).await?)
    }

    pub async fn get_tag(&self, name: &str) -> Result<Value> {
        let id = self.persisted_id()?;
        Ok(self.collaborators.gateway.get_tag(id, name.to_string()).await?)
    }

    pub async fn delete_tag(&self, name: &str) -> Result<()> {
        let id = self.persisted_id()?;
        Ok(self.collaborators.gateway.delete_tag(id, name.to_string()).await?)
    }

    /// Computes and persists statistics over the full dataset.
    ///
    /// Returns `None`, raising [`Advisory::StatisticsDisabled`], when
    /// statistics are disabled for this feature group.
    pub async fn compute_statistics(&self) -> Result<Option<StatisticsCommit>> {
        if !self.statistics_config.enabled {
            self.collaborators.advisories.notify(&Advisory::StatisticsDisabled {
                name: self.name.clone(),
                version: self.version,
            });
            return Ok(None);
        }

        let id = self.persisted_id()?;
        let provider = &self.collaborators.provider;
        let dataset = provider.read_all(self.record()).await?;
        let content = provider
            .compute_statistics(dataset, self.statistics_config.clone())
            .await?;

        let now = Utc::now();
        let commit = StatisticsCommit {
            commit_time: now.format(COMMIT_TIME_FORMAT).to_string(),
            computation_time: now.timestamp_millis(),
            content,
        };
        let saved = self.collaborators.gateway.save_statistics_commit(id, commit).await?;
        info!(name = %self.name, version = self.version, commit_time = %saved.commit_time, "computed statistics");
        Ok(Some(saved))
    }

    /// Latest statistics commit.
    pub async fn get_statistics(&self) -> Result<Option<StatisticsCommit>> {
        let id = self.persisted_id()?;
        Ok(self
            .collaborators
            .gateway
            .get_statistics_commit(id, CommitSelector::Latest)
            .await?)
    }

    /// Statistics commit at `commit_time` (`YYYYMMDDhhmmss`).
    pub async fn get_statistics_at(&self, commit_time: &str) -> Result<Option<StatisticsCommit>> {
        parse_commit_time(commit_time)?;
        let id = self.persisted_id()?;
        Ok(self
            .collaborators
            .gateway
            .get_statistics_commit(id, CommitSelector::At(commit_time.to_string()))
            .await?)
    }

    /// Data commits keyed by commit id, newest first up to `limit`.
    ///
    /// Only time travel enabled (hudi) feature groups keep commit history.
    pub async fn commit_details(
        &self,
        wallclock_time: Option<&str>,
        limit: Option<usize>,
    ) -> Result<BTreeMap<i64, CommitDetails>> {
        if self.time_travel_format != TimeTravelFormat::Hudi {
            return Err(FeatureStoreError::Unsupported {
                operation: "commit_details",
                reason: format!(
                    "feature group `{}` uses time travel format {}, commit history needs HUDI",
                    self.name, self.time_travel_format
                ),
            });
        }
        let wallclock = wallclock_time
            .map(parse_commit_time)
            .transpose()?
            .map(|t| t.and_utc().timestamp_millis());
        let id = self.persisted_id()?;

        let commits = self
            .collaborators
            .gateway
            .get_commit_details(id, wallclock, limit)
            .await?;
        commits
            .into_iter()
            .map(|commit| -> Result<(i64, CommitDetails)> {
                let committed_on = DateTime::from_timestamp_millis(commit.commit_id)
                    .ok_or(FormatError::CommitId { value: commit.commit_id })?
                    .format(COMMIT_TIME_FORMAT)
                    .to_string();
                Ok((
                    commit.commit_id,
                    CommitDetails {
                        committed_on,
                        rows_inserted: commit.rows_inserted,
                        rows_updated: commit.rows_updated,
                        rows_deleted: commit.rows_deleted,
                    },
                ))
            })
            .collect()
    }

    /// Reads the full dataset of this feature group.
    pub async fn read(&self) -> Result<RecordBatch> {
        Ok(self.collaborators.provider.read_all(self.record()).await?)
    }

    /// Deletes the feature group, its data and the jobs writing to it.
    ///
    /// On success the entity is detached: its id is cleared and operations
    /// that need a persisted group fail with `NotPersisted`. A failed call
    /// leaves it untouched, so the delete can be retried.
    pub async fn delete(&mut self) -> Result<()> {
        let id = self.persisted_id()?;
        self.collaborators.advisories.notify(&Advisory::JobsRemoved {
            name: self.name.clone(),
            version: self.version,
        });
        self.collaborators.gateway.delete(id).await?;

        self.id = None;
        self.online_topic_name = None;
        self.subject.take();
        for feature in &mut self.features {
            feature.feature_group_id = None;
        }
        info!(name = %self.name, version = self.version, "deleted feature group");
        Ok(())
    }

    async fn provenance(&self, direction: ProvenanceDirection, artifact: ArtifactKind) -> Result<ProvenanceLinks> {
        let id = self.persisted_id()?;
        Ok(self
            .collaborators
            .gateway
            .get_provenance(id, direction, artifact)
            .await?)
    }

    /// Feature groups this one was generated from, based on explicit provenance.
    pub async fn get_parent_feature_groups(&self) -> Result<ProvenanceLinks> {
        self.provenance(ProvenanceDirection::Upstream, ArtifactKind::FeatureGroup)
            .await
    }

    /// Feature views generated from this feature group. Deleted links are
    /// not tracked, so `deleted` is always empty.
    pub async fn get_generated_feature_views(&self) -> Result<ProvenanceLinks> {
        self.provenance(ProvenanceDirection::Downstream, ArtifactKind::FeatureView)
            .await
    }

    /// Feature groups generated from this feature group. Deleted links are
    /// not tracked, so `deleted` is always empty.
    pub async fn get_generated_feature_groups(&self) -> Result<ProvenanceLinks> {
        self.provenance(ProvenanceDirection::Downstream, ArtifactKind::FeatureGroup)
            .await
    }

    /// Case-insensitive feature lookup.
    pub fn get_feature(&self, name: &str) -> std::result::Result<&Feature, NotFoundError> {
        self.features
            .iter()
            .find(|f| f.matches(name))
            .ok_or_else(|| NotFoundError {
                feature: name.to_string(),
                group: self.name.clone(),
                version: self.version,
            })
    }

    /// Names of the primary key features, cached on first access.
    pub fn primary_keys(&self) -> &[String] {
        self.primary_keys
            .get_or_init(|| self.features.iter().filter(|f| f.primary).map(|f| f.name.clone()).collect())
    }

    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> std::result::Result<Query, QueryError> {
        let features = names
            .iter()
            .map(|name| Feature::reference(name.as_ref(), self.id))
            .collect();
        self.select_features(features)
    }

    pub fn select_features(&self, features: Vec<Feature>) -> std::result::Result<Query, QueryError> {
        query::select_features(&self.reference(), &self.features, features)
    }

    pub fn select_all(&self) -> Query {
        self.select_all_with(true, true)
    }

    pub fn select_all_with(&self, include_primary_key: bool, include_event_time: bool) -> Query {
        query::select_all(
            &self.reference(),
            &self.features,
            self.primary_keys(),
            self.event_time.as_deref(),
            include_primary_key,
            include_event_time,
        )
    }

    pub fn select_except<S: AsRef<str>>(&self, names: &[S]) -> Query {
        query::select_except(&self.reference(), &self.features, names)
    }

    pub fn select_except_features(&self, features: &[Feature]) -> Query {
        let names: Vec<&str> = features.iter().map(|f| f.name.as_str()).collect();
        self.select_except(&names)
    }

    /// All features, filtered.
    pub fn filter(&self, filter: impl Into<FilterLogic>) -> Query {
        self.select_all().filter(filter)
    }

    fn has_online_topic(&self) -> bool {
        let caps = self.capabilities();
        caps.online && (caps.always_online || self.online_enabled)
    }

    /// Online topic, for variants that write to one.
    pub fn online_topic_name(&self) -> Option<&str> {
        if self.has_online_topic() {
            self.online_topic_name.as_deref()
        } else {
            None
        }
    }

    /// Registry subject of the online topic, resolved once and cached.
    pub async fn subject(&self) -> Result<Option<&Subject>> {
        let Some(topic) = self.online_topic_name() else {
            return Ok(None);
        };
        let subject = self
            .subject
            .get_or_try_init(|| async {
                debug!(topic = %topic, "resolving subject");
                self.collaborators
                    .gateway
                    .get_subject(topic.to_string())
                    .await
                    .map_err(FeatureStoreError::from)
            })
            .await?;
        Ok(Some(subject))
    }

    /// Drops the cached subject so the next access resolves it again.
    pub fn unload_subject(&mut self) {
        self.subject.take();
    }

    /// Complex features, for variants with an online representation.
    pub fn complex_features(&self) -> Option<Vec<String>> {
        self.has_online_topic().then(|| avro::complex_features(&self.features))
    }

    /// Avro schema of one feature as registered with the subject.
    pub async fn feature_avro_schema(&self, name: &str) -> Result<Option<String>> {
        if !self.has_online_topic() {
            return Ok(None);
        }
        let feature_name = self.get_feature(name)?.name.clone();
        match self.subject().await? {
            Some(subject) => avro::feature_schema(subject, &feature_name),
            None => Ok(None),
        }
    }

    /// Subject schema with complex features encoded as bytes.
    pub async fn encoded_avro_schema(&self) -> Result<Option<String>> {
        let complex = match self.complex_features() {
            Some(complex) => complex,
            None => return Ok(None),
        };
        match self.subject().await? {
            Some(subject) => avro::encoded_schema(subject, &complex).map(Some),
            None => Ok(None),
        }
    }

    /// Subject schema as registered.
    pub async fn avro_schema(&self) -> Result<Option<String>> {
        Ok(self.subject().await?.map(|s| s.schema.clone()))
    }
}

impl fmt::Debug for FeatureGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureGroup")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("features", &self.features)
            .field("event_time", &self.event_time)
            .field("time_travel_format", &self.time_travel_format)
            .finish_non_exhaustive()
    }
}

/// Sets key flags on every feature named by a declaration.
fn apply_key_flags(features: &mut [Feature], keys: &KeyDeclarations) {
    for key in &keys.primary_key {
        for feature in features.iter_mut() {
            if feature.matches(key) {
                feature.primary = true;
            }
        }
    }
    for key in &keys.partition_key {
        for feature in features.iter_mut() {
            if feature.matches(key) {
                feature.partition = true;
            }
        }
    }
    if let Some(key) = &keys.hudi_precombine_key {
        for feature in features.iter_mut() {
            if feature.matches(key) {
                feature.hudi_precombine_key = true;
            }
        }
    }
}

/// `current` with the metadata of `update` laid over it.
fn overlay_metadata(current: &Feature, update: Feature) -> Feature {
    Feature {
        description: update.description,
        online_type: update.online_type.or_else(|| current.online_type.clone()),
        ..current.clone()
    }
}

/// Current features not being updated, followed by the updated ones.
fn merge_features(current: &[Feature], updated: Vec<Feature>) -> Vec<Feature> {
    let mut merged: Vec<Feature> = current
        .iter()
        .filter(|f| !updated.iter().any(|u| u.matches(&f.name)))
        .cloned()
        .collect();
    merged.extend(updated);
    merged
}

/// Builder for unsaved feature groups, obtained from a feature store.
pub struct FeatureGroupBuilder {
    group: FeatureGroup,
}

impl FeatureGroupBuilder {
    pub(crate) fn new(
        kind: FeatureGroupKind,
        feature_store: FeatureStoreRef,
        name: &str,
        version: i32,
        defaults: &DefaultSettings,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            group: FeatureGroup::unsaved(kind, feature_store, name.to_string(), version, defaults, collaborators),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.group.description = Some(description.into());
        self
    }

    pub fn features(mut self, features: Vec<Feature>) -> Self {
        self.group.features = features;
        self
    }

    pub fn primary_key<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.group.primary_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn partition_key<S: Into<String>>(mut self, keys: impl IntoIterator<Item = S>) -> Self {
        self.group.partition_key = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn hudi_precombine_key(mut self, key: impl Into<String>) -> Self {
        self.group.hudi_precombine_key = Some(key.into());
        self
    }

    pub fn event_time(mut self, name: impl Into<String>) -> Self {
        self.group.event_time = Some(name.into());
        self
    }

    pub fn time_travel_format(mut self, format: TimeTravelFormat) -> Self {
        self.group.time_travel_format = format;
        self
    }

    pub fn statistics_config(mut self, config: StatisticsConfig) -> Self {
        self.group.statistics_config = config;
        self
    }

    pub fn expectations<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.group.expectations_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Ignored by variants that are never or always online.
    pub fn online_enabled(mut self, enabled: bool) -> Self {
        let caps = self.group.kind.capabilities();
        self.group.online_enabled = caps.always_online || (caps.online && enabled);
        self
    }

    pub fn source(mut self, source: SourceRecord) -> Self {
        self.group.source = Some(source);
        self
    }

    /// Ingestion job option; the `spark` key holds spark job configuration.
    pub fn write_option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.group.write_options.insert(name.into(), value.into());
        self
    }

    pub fn build(self) -> FeatureGroup {
        self.group
    }
}
