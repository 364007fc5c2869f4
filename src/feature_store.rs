//! Feature store handle.
//!
//! The feature store hands out feature groups: unsaved ones through builders,
//! persisted ones by fetching their record from the metadata gateway. Every
//! group it creates shares the store's collaborators.

use std::sync::Arc;

use metastore_core::gateway::MetadataGateway;
use metastore_core::provider::MaterializationProvider;
use metastore_core::records::SourceRecord;
use tracing::debug;

use crate::advisory::{AdvisorySink, LogSink};
use crate::config::{DefaultSettings, StoreSettings};
use crate::error::Result;
use crate::feature_group::{FeatureGroup, FeatureGroupBuilder};
use crate::kind::FeatureGroupKind;

/// Back-reference from a feature group to the store it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureStoreRef {
    pub id: i64,
    pub name: String,
}

#[derive(Clone)]
pub(crate) struct Collaborators {
    pub gateway: Arc<dyn MetadataGateway>,
    pub provider: Arc<dyn MaterializationProvider>,
    pub advisories: Arc<dyn AdvisorySink>,
}

pub struct FeatureStore {
    reference: FeatureStoreRef,
    defaults: DefaultSettings,
    collaborators: Collaborators,
}

impl FeatureStore {
    pub fn new(
        settings: &StoreSettings,
        gateway: Arc<dyn MetadataGateway>,
        provider: Arc<dyn MaterializationProvider>,
    ) -> Self {
        Self {
            reference: FeatureStoreRef {
                id: settings.feature_store.id,
                name: settings.feature_store.name.clone(),
            },
            defaults: settings.defaults.clone(),
            collaborators: Collaborators {
                gateway,
                provider,
                advisories: Arc::new(LogSink),
            },
        }
    }

    /// Routes advisories of every group built from here to `sink`.
    pub fn with_advisory_sink(mut self, sink: Arc<dyn AdvisorySink>) -> Self {
        self.collaborators.advisories = sink;
        self
    }

    pub fn id(&self) -> i64 {
        self.reference.id
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    fn builder(&self, kind: FeatureGroupKind, name: &str, version: i32) -> FeatureGroupBuilder {
        FeatureGroupBuilder::new(
            kind,
            self.reference.clone(),
            name,
            version,
            &self.defaults,
            self.collaborators.clone(),
        )
    }

    pub fn create_feature_group(&self, name: &str, version: i32) -> FeatureGroupBuilder {
        self.builder(FeatureGroupKind::Managed, name, version)
    }

    pub fn create_external_feature_group(&self, name: &str, version: i32, source: SourceRecord) -> FeatureGroupBuilder {
        self.builder(FeatureGroupKind::External, name, version).source(source)
    }

    pub fn create_stream_feature_group(&self, name: &str, version: i32) -> FeatureGroupBuilder {
        self.builder(FeatureGroupKind::Streaming, name, version)
    }

    /// Fetches a persisted feature group of any kind.
    pub async fn get_feature_group(&self, name: &str, version: i32) -> Result<FeatureGroup> {
        let record = self
            .collaborators
            .gateway
            .fetch(self.reference.id, name.to_string(), version)
            .await?;
        debug!(name = %record.name, version = record.version, id = ?record.id, "fetched feature group");
        Ok(FeatureGroup::from_record(
            record,
            self.reference.clone(),
            self.collaborators.clone(),
        ))
    }
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("reference", &self.reference)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
