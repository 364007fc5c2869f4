//! Materialization providers.
//!
//! A materialization provider is the dataframe side of the feature store: it
//! makes source data readable, infers schemas from it and computes statistics
//! over materialized data. Implementations:
//! - `arrow`: in-memory Arrow record batches keyed by source

pub mod arrow;

use crate::records::{FeatureGroupRecord, FeatureRecord, StatisticsConfig, TimeTravelFormat};
use crate::statistics::StatisticsPayload;
use arrow_array::RecordBatch;
use async_trait::async_trait;
use std::fmt::{Display, Formatter};
use tonic::Status;

/// Opaque handle of a temporary view registered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ViewHandle(pub String);

impl Display for ViewHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Materialization provider trait.
#[async_trait]
pub trait MaterializationProvider: Send + Sync + 'static {
    /// Register a readable temporary view over the record's source data.
    async fn register_temporary_view(&self, record: FeatureGroupRecord, alias: String) -> Result<ViewHandle, Status>;

    /// Infer an ordered feature list from a registered view.
    async fn infer_schema(&self, handle: ViewHandle, format: TimeTravelFormat) -> Result<Vec<FeatureRecord>, Status>;

    /// Read the full dataset of a feature group.
    async fn read_all(&self, record: FeatureGroupRecord) -> Result<RecordBatch, Status>;

    /// Compute statistics over a materialized dataset.
    async fn compute_statistics(
        &self,
        dataset: RecordBatch,
        config: StatisticsConfig,
    ) -> Result<StatisticsPayload, Status>;
}
