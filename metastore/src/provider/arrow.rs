//! Arrow in-memory materialization provider.
//!
//! Source data is held as Arrow record batches keyed by the data key of a
//! feature group record (the source key for external groups, the
//! `<feature store>/<name>_<version>` table for managed ones). Temporary views
//! follow create-or-replace semantics: registering an alias twice replaces the
//! earlier view.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{DataType, Field};
use arrow_array::RecordBatch;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::Status;
use tracing::debug;

use crate::provider::{MaterializationProvider, ViewHandle};
use crate::records::{FeatureGroupRecord, FeatureRecord, StatisticsConfig, TimeTravelFormat};
use crate::statistics::{compute_statistics, StatisticsPayload};

/// Metadata columns Hudi adds to every table.
pub const HUDI_SPEC_FEATURE_NAMES: [&str; 5] = [
    "_hoodie_record_key",
    "_hoodie_partition_path",
    "_hoodie_commit_time",
    "_hoodie_file_name",
    "_hoodie_commit_seqno",
];

#[derive(Debug, Clone, Default)]
pub struct ArrowProvider {
    sources: Arc<RwLock<HashMap<String, RecordBatch>>>,
    views: Arc<RwLock<HashMap<String, RecordBatch>>>,
}

impl ArrowProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `batch` the data behind `key`, replacing earlier data.
    pub async fn register_source(&self, key: impl Into<String>, batch: RecordBatch) {
        let key = key.into();
        debug!(key = %key, rows = batch.num_rows(), "registered source data");
        self.sources.write().await.insert(key, batch);
    }

    /// Registered data keys.
    pub async fn list_sources(&self) -> Vec<String> {
        self.sources.read().await.keys().cloned().collect()
    }

    async fn source(&self, record: &FeatureGroupRecord) -> Result<RecordBatch, Status> {
        let key = record.data_key();
        self.sources
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("No data registered for {}", key)))
    }

    /// Converts an Arrow field into a feature type string.
    pub fn arrow_type_to_feature_type(data_type: &DataType) -> String {
        match data_type {
            DataType::Boolean => "boolean".to_string(),
            DataType::Int8 | DataType::UInt8 => "tinyint".to_string(),
            DataType::Int16 | DataType::UInt16 => "smallint".to_string(),
            DataType::Int32 | DataType::UInt32 => "int".to_string(),
            DataType::Int64 | DataType::UInt64 => "bigint".to_string(),
            DataType::Float32 => "float".to_string(),
            DataType::Float64 => "double".to_string(),
            DataType::Utf8 | DataType::LargeUtf8 => "string".to_string(),
            DataType::Binary | DataType::LargeBinary => "binary".to_string(),
            DataType::Date32 | DataType::Date64 => "date".to_string(),
            DataType::Timestamp(_, _) => "timestamp".to_string(),
            DataType::Decimal128(precision, scale) => format!("decimal({},{})", precision, scale),
            DataType::List(item) | DataType::LargeList(item) => {
                format!("array<{}>", Self::arrow_type_to_feature_type(item.data_type()))
            }
            DataType::Struct(fields) => {
                let inner: Vec<String> = fields
                    .iter()
                    .map(|f| format!("{}:{}", f.name(), Self::arrow_type_to_feature_type(f.data_type())))
                    .collect();
                format!("struct<{}>", inner.join(","))
            }
            DataType::Map(entries, _) => match entries.data_type() {
                DataType::Struct(kv) if kv.len() == 2 => format!(
                    "map<{},{}>",
                    Self::arrow_type_to_feature_type(kv[0].data_type()),
                    Self::arrow_type_to_feature_type(kv[1].data_type())
                ),
                _ => "map<string,string>".to_string(),
            },
            _ => "string".to_string(), // Default to string for unsupported types
        }
    }

    fn field_to_feature(field: &Field) -> FeatureRecord {
        FeatureRecord::new(field.name().to_lowercase(), Self::arrow_type_to_feature_type(field.data_type()))
    }
}

#[async_trait]
impl MaterializationProvider for ArrowProvider {
    async fn register_temporary_view(&self, record: FeatureGroupRecord, alias: String) -> Result<ViewHandle, Status> {
        let batch = self.source(&record).await?;
        self.views.write().await.insert(alias.clone(), batch);
        debug!(alias = %alias, group = %record.name, "registered temporary view");
        Ok(ViewHandle(alias))
    }

    async fn infer_schema(&self, handle: ViewHandle, format: TimeTravelFormat) -> Result<Vec<FeatureRecord>, Status> {
        let views = self.views.read().await;
        let batch = views
            .get(&handle.0)
            .ok_or_else(|| Status::not_found(format!("View {} not found", handle)))?;

        Ok(batch
            .schema()
            .fields()
            .iter()
            .filter(|f| format != TimeTravelFormat::Hudi || !HUDI_SPEC_FEATURE_NAMES.contains(&f.name().as_str()))
            .map(|f| Self::field_to_feature(f))
            .collect())
    }

    async fn read_all(&self, record: FeatureGroupRecord) -> Result<RecordBatch, Status> {
        self.source(&record).await
    }

    async fn compute_statistics(
        &self,
        dataset: RecordBatch,
        config: StatisticsConfig,
    ) -> Result<StatisticsPayload, Status> {
        compute_statistics(&dataset, &config)
    }
}
