//! In-memory metadata gateway implementation.
//!
//! This module keeps the whole feature store catalog in process memory. It
//! behaves like the remote metadata service as far as the engine can observe:
//! - Ids are assigned on save and `(feature store, name, version)` is unique
//! - Locations, creation time and creator are filled in on save
//! - Online-enabled and stream feature groups get a topic and a registry subject
//! - Deleting a feature group removes its tags, statistics and commits
//! - Provenance links outlive their parents, which then show up as deleted
//!
//! # Configuration
//!
//! ```toml
//! [gateway]
//! engine = "memory"
//! connection = "memory://catalog"   # Must use the memory:// scheme
//! options = {
//!     location = "memory://warehouse",  # Optional: base location of tables
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tonic::Status;
use tracing::{debug, info};

use crate::avro;
use crate::config::Credentials;
use crate::gateway::{MetadataGateway, MetadataUpdate};
use crate::records::{
    ArtifactKind, ArtifactRef, CommitRecord, CommitSelector, FeatureGroupRecord, FeatureGroupType, FeatureRecord,
    ProvenanceDirection, ProvenanceLinks, StatisticsCommit, Subject,
};

const MEMORY_SCHEME: &str = "memory://";
const DEFAULT_LOCATION: &str = "memory://warehouse";
const DEFAULT_CREATOR: &str = "featurestore";

#[derive(Debug, Default)]
struct Catalog {
    groups: HashMap<i64, FeatureGroupRecord>,
    tags: HashMap<i64, BTreeMap<String, Value>>,
    statistics: HashMap<i64, Vec<StatisticsCommit>>,
    commits: HashMap<i64, Vec<CommitRecord>>,
    subjects: HashMap<String, Subject>,
    lineage: Vec<(ArtifactRef, ArtifactRef)>,
}

impl Catalog {
    fn group(&self, id: i64) -> Result<&FeatureGroupRecord, Status> {
        self.groups
            .get(&id)
            .ok_or_else(|| Status::not_found(format!("Feature group {} not found", id)))
    }

    fn group_mut(&mut self, id: i64) -> Result<&mut FeatureGroupRecord, Status> {
        self.groups
            .get_mut(&id)
            .ok_or_else(|| Status::not_found(format!("Feature group {} not found", id)))
    }
}

/// Process-local metadata gateway.
#[derive(Debug, Clone)]
pub struct InMemoryGateway {
    catalog: Arc<RwLock<Catalog>>,
    next_id: Arc<AtomicI64>,
    next_subject_id: Arc<AtomicI64>,
    location: String,
    creator: String,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(RwLock::new(Catalog::default())),
            next_id: Arc::new(AtomicI64::new(1)),
            next_subject_id: Arc::new(AtomicI64::new(1)),
            location: DEFAULT_LOCATION.to_string(),
            creator: DEFAULT_CREATOR.to_string(),
        }
    }

    /// Create a new instance for `connection` with the given options.
    pub fn new_with_options(
        connection: &str,
        options: &HashMap<String, String>,
        credentials: Option<&Credentials>,
    ) -> Result<Self, Status> {
        let catalog = connection.strip_prefix(MEMORY_SCHEME).ok_or_else(|| {
            Status::invalid_argument(format!("Unsupported gateway connection: {}", connection))
        })?;
        let mut gateway = Self::new();
        if let Some(location) = options.get("location") {
            if location.is_empty() {
                return Err(Status::invalid_argument("Gateway location must not be empty"));
            }
            gateway.location = location.trim_end_matches('/').to_string();
        }
        if let Some(creds) = credentials {
            gateway.creator = creds.username.clone();
        }
        info!(catalog = %catalog, location = %gateway.location, "opened in-memory catalog");
        Ok(gateway)
    }

    /// Records a data commit, as a write to the feature group would.
    pub async fn record_commit(&self, id: i64, commit: CommitRecord) -> Result<(), Status> {
        let mut catalog = self.catalog.write().await;
        catalog.group(id)?;
        catalog.commits.entry(id).or_default().push(commit);
        Ok(())
    }

    /// Records that `child` was generated from feature group `parent_id`.
    pub async fn record_lineage(&self, parent_id: i64, child: ArtifactRef) -> Result<(), Status> {
        let mut catalog = self.catalog.write().await;
        let parent = ArtifactRef::feature_group(catalog.group(parent_id)?);
        if child.kind == ArtifactKind::FeatureGroup {
            match child.id {
                Some(id) => {
                    catalog.group(id)?;
                }
                None => return Err(Status::invalid_argument("Generated feature group must have an id")),
            }
        }
        debug!(parent = parent_id, child = %child.name, "recorded provenance link");
        catalog.lineage.push((parent, child));
        Ok(())
    }

    /// Number of feature groups currently stored.
    pub async fn len(&self) -> usize {
        self.catalog.read().await.groups.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn topic_name(record: &FeatureGroupRecord, id: i64) -> String {
        format!("{}_{}_{}_{}_onlinefs", record.feature_store_id, id, record.name, record.version)
    }

    fn register_subject(&self, catalog: &mut Catalog, topic: &str, record: &FeatureGroupRecord) {
        let schema = avro::record_schema(record).to_string();
        let version = catalog.subjects.get(topic).map(|s| s.version + 1).unwrap_or(1);
        let subject = Subject {
            id: self.next_subject_id.fetch_add(1, Ordering::SeqCst),
            subject: topic.to_string(),
            version,
            schema,
        };
        catalog.subjects.insert(topic.to_string(), subject);
    }
}

#[async_trait]
impl MetadataGateway for InMemoryGateway {
    async fn save(&self, mut record: FeatureGroupRecord) -> Result<FeatureGroupRecord, Status> {
        if record.id.is_some() {
            return Err(Status::invalid_argument(format!(
                "Feature group {} version {} is already persisted",
                record.name, record.version
            )));
        }
        if record.features.is_empty() {
            return Err(Status::invalid_argument("Feature group must have at least one feature"));
        }

        let mut catalog = self.catalog.write().await;
        let exists = catalog.groups.values().any(|g| {
            g.feature_store_id == record.feature_store_id && g.name == record.name && g.version == record.version
        });
        if exists {
            return Err(Status::already_exists(format!(
                "Feature group {} version {} already exists",
                record.name, record.version
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        record.id = Some(id);
        record.created = Some(chrono::Utc::now().timestamp_millis());
        record.creator = Some(self.creator.clone());
        if record.group_type != FeatureGroupType::External {
            record.location = Some(format!(
                "{}/{}.db/{}",
                self.location,
                record.feature_store_name,
                record.table_name()
            ));
        }
        if record.group_type == FeatureGroupType::Stream {
            record.online_enabled = true;
        }
        if record.online_enabled {
            let topic = Self::topic_name(&record, id);
            self.register_subject(&mut catalog, &topic, &record);
            record.online_topic_name = Some(topic);
        }

        info!(id, name = %record.name, version = record.version, "saved feature group");
        catalog.groups.insert(id, record.clone());
        Ok(record)
    }

    async fn fetch(&self, feature_store_id: i64, name: String, version: i32) -> Result<FeatureGroupRecord, Status> {
        let catalog = self.catalog.read().await;
        catalog
            .groups
            .values()
            .find(|g| g.feature_store_id == feature_store_id && g.name == name && g.version == version)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("Feature group {} version {} not found", name, version)))
    }

    async fn update(&self, id: i64, update: MetadataUpdate) -> Result<FeatureGroupRecord, Status> {
        let mut catalog = self.catalog.write().await;
        let group = catalog.group_mut(id)?;

        match update {
            MetadataUpdate::Description(description) => {
                group.description = Some(description);
            }
            MetadataUpdate::Features(features) => {
                // validate everything before touching the record
                for feature in &features {
                    if !group.features.iter().any(|f| f.name.eq_ignore_ascii_case(&feature.name)) {
                        return Err(Status::not_found(format!(
                            "Feature {} not found in feature group {}",
                            feature.name, group.name
                        )));
                    }
                }
                for feature in features {
                    if let Some(existing) = group
                        .features
                        .iter_mut()
                        .find(|f| f.name.eq_ignore_ascii_case(&feature.name))
                    {
                        existing.description = feature.description;
                    }
                }
            }
            MetadataUpdate::StatisticsConfig(config) => {
                group.statistics_config = config;
            }
        }

        debug!(id, "updated feature group metadata");
        Ok(group.clone())
    }

    async fn append_features(&self, id: i64, features: Vec<FeatureRecord>) -> Result<Vec<FeatureRecord>, Status> {
        let mut catalog = self.catalog.write().await;
        let group = catalog.group_mut(id)?;

        for feature in &features {
            if group.features.iter().any(|f| f.name.eq_ignore_ascii_case(&feature.name)) {
                return Err(Status::already_exists(format!(
                    "Feature {} already exists in feature group {}",
                    feature.name, group.name
                )));
            }
        }
        group.features.extend(features);

        let updated = group.clone();
        if let Some(topic) = updated.online_topic_name.clone() {
            self.register_subject(&mut catalog, &topic, &updated);
        }

        debug!(id, features = updated.features.len(), "appended features");
        Ok(updated.features)
    }

    async fn delete(&self, id: i64) -> Result<(), Status> {
        let mut catalog = self.catalog.write().await;
        let record = catalog
            .groups
            .remove(&id)
            .ok_or_else(|| Status::not_found(format!("Feature group {} not found", id)))?;

        catalog.tags.remove(&id);
        catalog.statistics.remove(&id);
        catalog.commits.remove(&id);
        if let Some(topic) = &record.online_topic_name {
            catalog.subjects.remove(topic);
        }

        info!(id, name = %record.name, version = record.version, "deleted feature group");
        Ok(())
    }

    async fn add_tag(&self, id: i64, name: String, value: Value) -> Result<(), Status> {
        let mut catalog = self.catalog.write().await;
        catalog.group(id)?;
        catalog.tags.entry(id).or_default().insert(name, value);
        Ok(())
    }

    async fn get_tags(&self, id: i64) -> Result<BTreeMap<String, Value>, Status> {
        let catalog = self.catalog.read().await;
        catalog.group(id)?;
        Ok(catalog.tags.get(&id).cloned().unwrap_or_default())
    }

    async fn get_tag(&self, id: i64, name: String) -> Result<Value, Status> {
        let catalog = self.catalog.read().await;
        catalog.group(id)?;
        catalog
            .tags
            .get(&id)
            .and_then(|tags| tags.get(&name))
            .cloned()
            .ok_or_else(|| Status::not_found(format!("Tag {} not found", name)))
    }

    async fn delete_tag(&self, id: i64, name: String) -> Result<(), Status> {
        let mut catalog = self.catalog.write().await;
        catalog.group(id)?;
        match catalog.tags.get_mut(&id).and_then(|tags| tags.remove(&name)) {
            Some(_) => Ok(()),
            None => Err(Status::not_found(format!("Tag {} not found", name))),
        }
    }

    async fn get_statistics_commit(
        &self,
        id: i64,
        selector: CommitSelector,
    ) -> Result<Option<StatisticsCommit>, Status> {
        let catalog = self.catalog.read().await;
        catalog.group(id)?;
        let commits = match catalog.statistics.get(&id) {
            Some(commits) => commits,
            None => return Ok(None),
        };

        // commit times are fixed width, so string order is time order
        let found = match selector {
            CommitSelector::Latest => commits.iter().max_by(|a, b| a.commit_time.cmp(&b.commit_time)),
            CommitSelector::At(time) => commits.iter().find(|c| c.commit_time == time),
        };
        Ok(found.cloned())
    }

    async fn save_statistics_commit(&self, id: i64, commit: StatisticsCommit) -> Result<StatisticsCommit, Status> {
        let mut catalog = self.catalog.write().await;
        catalog.group(id)?;
        let commits = catalog.statistics.entry(id).or_default();
        commits.retain(|c| c.commit_time != commit.commit_time);
        commits.push(commit.clone());
        debug!(id, commit_time = %commit.commit_time, "saved statistics commit");
        Ok(commit)
    }

    async fn get_commit_details(
        &self,
        id: i64,
        wallclock: Option<i64>,
        limit: Option<usize>,
    ) -> Result<Vec<CommitRecord>, Status> {
        let catalog = self.catalog.read().await;
        catalog.group(id)?;

        let mut commits: Vec<CommitRecord> = catalog
            .commits
            .get(&id)
            .map(|c| {
                c.iter()
                    .filter(|commit| wallclock.map_or(true, |w| commit.commit_id <= w))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        commits.sort_by(|a, b| b.commit_id.cmp(&a.commit_id));
        if let Some(limit) = limit {
            commits.truncate(limit);
        }
        Ok(commits)
    }

    async fn get_subject(&self, topic: String) -> Result<Subject, Status> {
        let catalog = self.catalog.read().await;
        catalog
            .subjects
            .get(&topic)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("Subject {} not found", topic)))
    }

    async fn get_provenance(
        &self,
        id: i64,
        direction: ProvenanceDirection,
        artifact: ArtifactKind,
    ) -> Result<ProvenanceLinks, Status> {
        let catalog = self.catalog.read().await;
        catalog.group(id)?;

        let mut links = ProvenanceLinks::default();
        match direction {
            ProvenanceDirection::Upstream => {
                let parents = catalog
                    .lineage
                    .iter()
                    .filter(|(parent, child)| {
                        parent.kind == artifact && child.kind == ArtifactKind::FeatureGroup && child.id == Some(id)
                    })
                    .map(|(parent, _)| parent);
                for parent in parents {
                    match parent.id.and_then(|pid| catalog.groups.get(&pid)) {
                        Some(record) => links.accessible.push(ArtifactRef::feature_group(record)),
                        None => links.deleted.push(ArtifactRef { id: None, ..parent.clone() }),
                    }
                }
            }
            ProvenanceDirection::Downstream => {
                let children = catalog
                    .lineage
                    .iter()
                    .filter(|(parent, child)| parent.id == Some(id) && child.kind == artifact)
                    .map(|(_, child)| child);
                for child in children {
                    match child.kind {
                        // links to deleted children are not tracked
                        ArtifactKind::FeatureGroup => {
                            if let Some(record) = child.id.and_then(|cid| catalog.groups.get(&cid)) {
                                links.accessible.push(ArtifactRef::feature_group(record));
                            }
                        }
                        ArtifactKind::FeatureView => links.accessible.push(child.clone()),
                    }
                }
            }
        }
        Ok(links)
    }
}
