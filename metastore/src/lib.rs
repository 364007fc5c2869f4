/*!
# Metastore: feature group records and their collaborators

This crate holds everything a feature group engine talks to but does not own:

- **Records** ([`records`]): the persisted shape of feature groups, features,
  statistics commits, data commits and schema registry subjects, serialized as
  camelCase JSON.
- **Metadata gateway** ([`gateway`]): the authoritative metadata store contract,
  with an in-memory catalog implementation.
- **Materialization provider** ([`provider`]): the dataframe contract (temporary
  views, schema inference, reads, statistics), with an Arrow in-memory
  implementation.
- **Statistics** ([`statistics`]): descriptive statistics over Arrow record
  batches.
- **Avro** ([`avro`]): Avro schemas for online topics.
- **Configuration** ([`config`]): layered settings and CLI arguments.

## Usage

```rust,no_run
use metastore_core::gateway::{memory::InMemoryGateway, MetadataGateway};
use metastore_core::records::{FeatureGroupRecord, FeatureRecord};

#[tokio::main]
async fn main() -> Result<(), tonic::Status> {
    let gateway = InMemoryGateway::new();
    let mut record = FeatureGroupRecord::new(1, "fs", "sales", 1);
    record.features.push(FeatureRecord::new("id", "bigint"));

    let saved = gateway.save(record).await?;
    println!("created feature group {:?}", saved.id);
    Ok(())
}
```
*/

pub mod avro;
pub mod config;
pub mod gateway;
pub mod provider;
pub mod records;
pub mod statistics;

pub use config::Settings;
pub use gateway::{memory::InMemoryGateway, MetadataGateway, MetadataUpdate};
pub use provider::{arrow::ArrowProvider, MaterializationProvider, ViewHandle};
pub use records::{ArtifactKind, ArtifactRef, FeatureGroupRecord, FeatureRecord, ProvenanceDirection, ProvenanceLinks};
pub use statistics::StatisticsPayload;
