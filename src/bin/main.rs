//! Feature store demo binary.
//!
//! Builds an in-memory feature store, registers a small sales dataset and
//! walks a feature group through its lifecycle: creation with an inferred
//! schema, schema evolution, queries and statistics.
//!
//! # Configuration
//!
//! Collaborators are configured the same way as the `metastore` crate:
//!
//! ```text
//! Options:
//!   -c, --config <FILE>                  Path to configuration file
//!       --gateway <TYPE>                 Metadata gateway type [env: FEATURESTORE_GATEWAY_ENGINE]
//!       --gateway-connection <STR>       Gateway connection string [env: FEATURESTORE_GATEWAY_CONNECTION]
//!       --gateway-options <KEY=VAL>      Gateway options [env: FEATURESTORE_GATEWAY_OPTIONS]
//!       --provider <TYPE>                Materialization provider type [env: FEATURESTORE_PROVIDER_ENGINE]
//!       --log-level <LEVEL>              Log level [env: FEATURESTORE_LOG_LEVEL]
//! ```
//!
//! `RUST_LOG` takes precedence over the configured log level.

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use featurestore::{Feature, FeatureStore, StoreSettings};
use metastore_core::config::{CliArgs, Settings};
use metastore_core::records::SourceRecord;
use metastore_core::{ArrowProvider, InMemoryGateway};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn sales_batch() -> Result<RecordBatch, arrow::error::ArrowError> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("ts", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("amount", DataType::Float64, true),
        Field::new("region", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3, 4])),
            Arc::new(TimestampMillisecondArray::from(vec![
                1_704_067_200_000,
                1_704_070_800_000,
                1_704_074_400_000,
                1_704_078_000_000,
            ])),
            Arc::new(Float64Array::from(vec![Some(12.5), Some(99.0), None, Some(250.0)])),
            Arc::new(StringArray::from(vec![Some("eu"), Some("us"), Some("eu"), None])),
        ],
    )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let settings = Settings::new(CliArgs::parse())?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gateway: Arc<InMemoryGateway> = match settings.gateway.engine.as_str() {
        "memory" => Arc::new(InMemoryGateway::new_with_options(
            &settings.gateway.connection,
            &settings.gateway.options,
            settings.gateway.credentials.as_ref(),
        )?),
        other => return Err(format!("Unsupported gateway type: {}", other).into()),
    };
    let provider = match settings.provider.engine.as_str() {
        "arrow" => Arc::new(ArrowProvider::new()),
        other => return Err(format!("Unsupported provider type: {}", other).into()),
    };

    let source = SourceRecord::query("jdbc", "SELECT * FROM sales");
    provider.register_source(source.key(), sales_batch()?).await;

    let store_settings = StoreSettings::new()?;
    let store = FeatureStore::new(&store_settings, gateway.clone(), provider.clone());
    info!(store = %store.name(), "feature store ready");

    let mut sales = store
        .create_external_feature_group("sales", 1, source)
        .description("Sales facts")
        .primary_key(["id"])
        .event_time("ts")
        .build();
    sales.save().await?;
    println!("Created {} v{} with {} features", sales.name(), sales.version(), sales.features().len());

    let mut clicks = store
        .create_stream_feature_group("clicks", 1)
        .features(vec![Feature::new("id", "bigint"), Feature::new("pages", "array<string>")])
        .primary_key(["id"])
        .build();
    clicks.save().await?;
    clicks.append_features(vec![Feature::new("device", "string")]).await?;
    println!("Online topic: {}", clicks.online_topic_name().unwrap_or("-"));
    if let Some(schema) = clicks.encoded_avro_schema().await? {
        println!("Encoded schema: {}", schema);
    }

    let amount = sales.get_feature("amount")?.clone();
    let region = sales.get_feature("region")?.clone();
    println!("\nQueries:");
    println!("- {}", sales.select_all());
    println!("- {}", sales.select_all_with(false, false));
    println!("- {}", sales.select(&["id", "amount"])?.filter(amount.gt(50)));
    println!("- {}", sales.filter(region.isin(vec!["eu", "us"]).or(amount.lt(20))));

    if let Some(commit) = sales.compute_statistics().await? {
        println!("\nStatistics at {}:", commit.commit_time);
        for column in &commit.content.columns {
            println!(
                "- {}: completeness {:.2}, mean {:?}",
                column.column, column.completeness, column.mean
            );
        }
    }

    sales.add_tag("owner", "analytics").await?;
    println!("\nTags: {:?}", sales.get_tags().await?);

    Ok(())
}
