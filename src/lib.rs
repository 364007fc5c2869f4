//! Featurestore: feature group metadata and schema evolution.
//!
//! This library models versioned feature groups whose schema is kept in sync
//! with a remote metadata gateway. Schemas evolve append-only, primary keys and
//! event time are validated before anything is persisted, and queries over a
//! group are built from its in-memory schema without touching data.
//!
//! Collaborators come from the `metastore` crate: a [`MetadataGateway`] that
//! owns the authoritative records and a [`MaterializationProvider`] that reads
//! data, infers schemas and computes statistics.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use featurestore::{Feature, FeatureStore, StoreSettings};
//! use metastore_core::{ArrowProvider, InMemoryGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = FeatureStore::new(
//!         &StoreSettings::default(),
//!         Arc::new(InMemoryGateway::new()),
//!         Arc::new(ArrowProvider::new()),
//!     );
//!
//!     let mut sales = store
//!         .create_feature_group("sales", 1)
//!         .features(vec![
//!             Feature::new("id", "bigint"),
//!             Feature::new("ts", "timestamp"),
//!             Feature::new("amount", "double"),
//!         ])
//!         .primary_key(["id"])
//!         .event_time("ts")
//!         .build();
//!     sales.save().await?;
//!
//!     sales.append_features(vec![Feature::new("region", "string")]).await?;
//!
//!     let amount = sales.get_feature("amount")?.clone();
//!     let query = sales.select_all_with(true, false).filter(amount.gt(100));
//!     println!("{}", query);
//!
//!     Ok(())
//! }
//! ```
//!
//! [`MetadataGateway`]: metastore_core::gateway::MetadataGateway
//! [`MaterializationProvider`]: metastore_core::provider::MaterializationProvider

pub mod advisory;
pub mod avro;
pub mod config;
pub mod error;
pub mod feature;
pub mod feature_group;
pub mod feature_store;
pub mod kind;
pub mod query;
pub mod validate;

#[cfg(test)]
mod tests;

pub use advisory::{Advisory, AdvisorySink, CollectingSink, LogSink};
pub use config::StoreSettings;
pub use error::{FeatureStoreError, FormatError, NotFoundError, QueryError, RemoteError, Result, SchemaError};
pub use feature::Feature;
pub use feature_group::{CommitDetails, FeatureGroup, FeatureGroupBuilder};
pub use feature_store::{FeatureStore, FeatureStoreRef};
pub use kind::{Capabilities, FeatureGroupKind};
pub use query::{Condition, Filter, FilterLogic, Query};
