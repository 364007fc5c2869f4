use std::collections::BTreeMap;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use metastore_core::gateway::{MetadataGateway, MetadataUpdate};
use metastore_core::provider::{MaterializationProvider, ViewHandle};
use metastore_core::records::{
    ArtifactKind, ArtifactRef, CommitRecord, CommitSelector, FeatureGroupRecord, FeatureGroupType, FeatureRecord,
    ProvenanceDirection, ProvenanceLinks, SourceRecord, StatisticsCommit, StatisticsConfig, Subject, TimeTravelFormat,
};
use metastore_core::statistics::StatisticsPayload;
use metastore_core::{ArrowProvider, InMemoryGateway};
use mockall::{mock, predicate::eq, Sequence};
use serde_json::{json, Value};
use tonic::{Code, Status};

use crate::advisory::{Advisory, CollectingSink};
use crate::config::StoreSettings;
use crate::error::{FeatureStoreError, FormatError, SchemaError};
use crate::feature::Feature;
use crate::feature_store::FeatureStore;

mock! {
    pub Gateway {}

    #[async_trait]
    impl MetadataGateway for Gateway {
        async fn save(&self, record: FeatureGroupRecord) -> Result<FeatureGroupRecord, Status>;
        async fn fetch(&self, feature_store_id: i64, name: String, version: i32) -> Result<FeatureGroupRecord, Status>;
        async fn update(&self, id: i64, update: MetadataUpdate) -> Result<FeatureGroupRecord, Status>;
        async fn append_features(&self, id: i64, features: Vec<FeatureRecord>) -> Result<Vec<FeatureRecord>, Status>;
        async fn delete(&self, id: i64) -> Result<(), Status>;
        async fn add_tag(&self, id: i64, name: String, value: Value) -> Result<(), Status>;
        async fn get_tags(&self, id: i64) -> Result<BTreeMap<String, Value>, Status>;
        async fn get_tag(&self, id: i64, name: String) -> Result<Value, Status>;
        async fn delete_tag(&self, id: i64, name: String) -> Result<(), Status>;
        async fn get_statistics_commit(&self, id: i64, selector: CommitSelector) -> Result<Option<StatisticsCommit>, Status>;
        async fn save_statistics_commit(&self, id: i64, commit: StatisticsCommit) -> Result<StatisticsCommit, Status>;
        async fn get_commit_details(&self, id: i64, wallclock: Option<i64>, limit: Option<usize>) -> Result<Vec<CommitRecord>, Status>;
        async fn get_subject(&self, topic: String) -> Result<Subject, Status>;
        async fn get_provenance(&self, id: i64, direction: ProvenanceDirection, artifact: ArtifactKind) -> Result<ProvenanceLinks, Status>;
    }
}

mock! {
    pub Provider {}

    #[async_trait]
    impl MaterializationProvider for Provider {
        async fn register_temporary_view(&self, record: FeatureGroupRecord, alias: String) -> Result<ViewHandle, Status>;
        async fn infer_schema(&self, handle: ViewHandle, format: TimeTravelFormat) -> Result<Vec<FeatureRecord>, Status>;
        async fn read_all(&self, record: FeatureGroupRecord) -> Result<RecordBatch, Status>;
        async fn compute_statistics(&self, dataset: RecordBatch, config: StatisticsConfig) -> Result<StatisticsPayload, Status>;
    }
}

fn store_with(
    gateway: impl MetadataGateway,
    provider: impl MaterializationProvider,
) -> (FeatureStore, Arc<CollectingSink>) {
    let sink = Arc::new(CollectingSink::new());
    let store = FeatureStore::new(&StoreSettings::default(), Arc::new(gateway), Arc::new(provider))
        .with_advisory_sink(sink.clone());
    (store, sink)
}

fn sales_features() -> Vec<Feature> {
    vec![
        Feature::new("id", "bigint"),
        Feature::new("ts", "timestamp"),
        Feature::new("amount", "double"),
    ]
}

/// A persisted managed record as the gateway would return it.
fn persisted_record(name: &str) -> FeatureGroupRecord {
    FeatureGroupRecord {
        id: Some(5),
        features: vec![
            FeatureRecord {
                primary: true,
                ..FeatureRecord::new("id", "bigint")
            },
            FeatureRecord::new("ts", "timestamp"),
            FeatureRecord::new("amount", "double"),
        ],
        event_time: Some("ts".to_string()),
        ..FeatureGroupRecord::new(1, "featurestore", name, 1)
    }
}

fn gateway_serving(record: FeatureGroupRecord) -> MockGateway {
    let mut gateway = MockGateway::new();
    gateway
        .expect_fetch()
        .times(1)
        .returning(move |_, _, _| Ok(record.clone()));
    gateway
}

fn names(features: &[Feature]) -> Vec<&str> {
    features.iter().map(|f| f.name.as_str()).collect()
}

fn sales_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("region", DataType::Utf8, true),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(Float64Array::from(vec![Some(10.0), None, Some(30.0)])),
            Arc::new(StringArray::from(vec!["eu", "us", "eu"])),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn test_create_with_primary_key_round_trip() {
    let mut gateway = MockGateway::new();
    gateway
        .expect_save()
        .withf(|record| record.id.is_none() && record.features[0].primary && !record.features[1].primary)
        .times(1)
        .returning(|mut record| {
            record.id = Some(10);
            record.created = Some(1_700_000_000_000);
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .primary_key(["ID"])
        .event_time("ts")
        .build();
    assert!(group.id().is_none());

    group.save().await.unwrap();

    assert_eq!(group.id(), Some(10));
    assert_eq!(group.primary_keys(), ["id".to_string()]);
    assert!(group.created().is_some());
    assert!(group.features().iter().all(|f| f.feature_group_id == Some(10)));
}

#[tokio::test]
async fn test_save_is_at_most_once() {
    let mut gateway = MockGateway::new();
    gateway.expect_save().times(1).returning(|mut record| {
        record.id = Some(1);
        Ok(record)
    });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.create_feature_group("sales", 1).features(sales_features()).build();
    group.save().await.unwrap();

    let err = group.save().await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::Schema(SchemaError::AlreadyPersisted { .. })));
}

#[tokio::test]
async fn test_failed_save_leaves_entity_unsaved() {
    let mut gateway = MockGateway::new();
    let mut seq = Sequence::new();
    gateway
        .expect_save()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(Status::unavailable("metadata service down")));
    gateway
        .expect_save()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|mut record| {
            record.id = Some(3);
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .primary_key(["id"])
        .build();

    match group.save().await {
        Err(FeatureStoreError::Remote(remote)) => {
            assert_eq!(remote.status, Code::Unavailable);
            assert_eq!(remote.message, "metadata service down");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(group.id().is_none());
    assert!(!group.features()[0].primary);

    group.save().await.unwrap();
    assert_eq!(group.id(), Some(3));
}

#[tokio::test]
async fn test_key_validation_precedes_remote_calls() {
    // no expectations: any collaborator call panics
    let (store, _) = store_with(MockGateway::new(), MockProvider::new());

    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .primary_key(["order_id"])
        .build();
    let err = group.save().await.unwrap_err();
    assert!(matches!(
        err,
        FeatureStoreError::Schema(SchemaError::UnknownPrimaryKey { ref name }) if name == "order_id"
    ));

    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .event_time("event_ts")
        .build();
    assert!(matches!(
        group.save().await.unwrap_err(),
        FeatureStoreError::Schema(SchemaError::UnknownEventTime { .. })
    ));

    let mut group = store.create_feature_group("sales", 1).build();
    assert!(matches!(
        group.save().await.unwrap_err(),
        FeatureStoreError::Schema(SchemaError::MissingSchema { .. })
    ));
}

#[tokio::test]
async fn test_external_group_infers_schema() {
    let mut provider = MockProvider::new();
    provider
        .expect_register_temporary_view()
        .withf(|record, alias| alias == "read_ondmd" && record.features.is_empty() && record.source.is_some())
        .times(1)
        .returning(|_, alias| Ok(ViewHandle(alias)));
    provider
        .expect_infer_schema()
        .with(eq(ViewHandle("read_ondmd".to_string())), eq(TimeTravelFormat::None))
        .times(1)
        .returning(|_, _| Ok(vec![FeatureRecord::new("id", "bigint"), FeatureRecord::new("amount", "double")]));

    let mut gateway = MockGateway::new();
    gateway
        .expect_save()
        .withf(|record| record.group_type == FeatureGroupType::External)
        .times(1)
        .returning(|mut record| {
            record.id = Some(8);
            Ok(record)
        });
    let (store, _) = store_with(gateway, provider);

    let mut group = store
        .create_external_feature_group("orders", 1, SourceRecord::query("jdbc", "SELECT * FROM orders"))
        .time_travel_format(TimeTravelFormat::None)
        .primary_key(["id"])
        .build();
    group.save().await.unwrap();

    assert_eq!(names(group.features()), vec!["id", "amount"]);
    assert_eq!(group.primary_keys(), ["id".to_string()]);
}

#[tokio::test]
async fn test_managed_group_with_source_checks_compatibility() {
    let mut provider = MockProvider::new();
    provider
        .expect_register_temporary_view()
        .withf(|_, alias| alias == "read_source")
        .returning(|_, alias| Ok(ViewHandle(alias)));
    provider
        .expect_infer_schema()
        .returning(|_, _| Ok(vec![FeatureRecord::new("id", "int"), FeatureRecord::new("ts", "timestamp")]));
    let (store, _) = store_with(MockGateway::new(), provider);

    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .source(SourceRecord::path("s3", "s3://bucket/sales", "parquet"))
        .build();

    match group.save().await {
        Err(FeatureStoreError::Schema(SchemaError::Incompatible { mismatches })) => {
            assert_eq!(mismatches.len(), 2);
            assert!(mismatches[0].starts_with("id (expected type: 'bigint'"));
            assert!(mismatches[1].starts_with("amount (type: 'double') is missing"));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(group.id().is_none());
}

#[tokio::test]
async fn test_select_all_scenarios() {
    let (store, _) = store_with(gateway_serving(persisted_record("sales")), MockProvider::new());
    let group = store.get_feature_group("sales", 1).await.unwrap();

    assert_eq!(names(group.select_all().features()), names(group.features()));
    assert_eq!(group.select_all_with(true, false).feature_names(), vec!["id", "amount"]);
    assert_eq!(group.select_all_with(false, true).feature_names(), vec!["ts", "amount"]);

    let bare = group.select_all_with(false, false);
    assert_eq!(bare.feature_names(), vec!["amount"]);
    assert_eq!(group.select_except(&["id", "ts", "id"]), bare);
    assert_eq!(group.select_except(&["id", "ts", "unknown"]), bare);
}

#[tokio::test]
async fn test_selection_matching_rules() {
    let (store, _) = store_with(gateway_serving(persisted_record("sales")), MockProvider::new());
    let group = store.get_feature_group("sales", 1).await.unwrap();

    // membership ignores case, exclusion does not
    let query = group.select(&["AMOUNT", "id"]).unwrap();
    assert_eq!(query.feature_names(), vec!["AMOUNT", "id"]);
    assert!(query.features().iter().all(|f| f.feature_group_id == Some(5)));
    assert_eq!(group.select_except(&["ID"]).features().len(), 3);

    assert!(group.select(&["region"]).is_err());

    let ts = group.get_feature("ts").unwrap().clone();
    assert_eq!(group.select_except_features(&[ts]).feature_names(), vec!["id", "amount"]);

    let amount = group.get_feature("amount").unwrap().clone();
    let query = group.filter(amount.ge(20.5));
    assert_eq!(query.features().len(), 3);
    assert_eq!(
        query.to_sql(),
        "SELECT `id`, `ts`, `amount` FROM `featurestore`.`sales_1` WHERE `amount` >= 20.5"
    );
}

#[tokio::test]
async fn test_get_feature_ignores_case() {
    let (store, _) = store_with(gateway_serving(persisted_record("sales")), MockProvider::new());
    let group = store.get_feature_group("sales", 1).await.unwrap();

    assert_eq!(group.get_feature("AMOUNT").unwrap(), group.get_feature("amount").unwrap());

    let err = group.get_feature("region").unwrap_err();
    assert_eq!(err.group, "sales");
    assert_eq!(err.version, 1);
    assert_eq!(
        err.to_string(),
        "Feature with name `region` not found in feature group `sales`, version `1`"
    );
}

#[tokio::test]
async fn test_primary_keys_are_cached_until_schema_refresh() {
    let mut refreshed = persisted_record("sales");
    refreshed.features[1].primary = true;

    let mut gateway = MockGateway::new();
    let mut seq = Sequence::new();
    let first = persisted_record("sales");
    gateway
        .expect_fetch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, _, _| Ok(first.clone()));
    gateway
        .expect_fetch()
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_, _, _| Ok(refreshed.clone()));
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    let keys = group.primary_keys().to_vec();
    assert_eq!(keys, vec!["id".to_string()]);
    assert_eq!(group.primary_keys(), keys.as_slice());

    group.refresh().await.unwrap();
    assert_eq!(group.primary_keys(), ["id".to_string(), "ts".to_string()]);
}

#[tokio::test]
async fn test_append_features_is_append_only() {
    let mut record = persisted_record("sales");
    record.features.truncate(2);

    let mut gateway = gateway_serving(record);
    gateway
        .expect_append_features()
        .withf(|id, features| *id == 5 && features.len() == 1 && features[0].name == "region")
        .times(1)
        .returning(|_, _| {
            Ok(vec![
                FeatureRecord {
                    primary: true,
                    ..FeatureRecord::new("id", "bigint")
                },
                FeatureRecord::new("ts", "timestamp"),
                FeatureRecord::new("region", "string"),
            ])
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    group.append_features(vec![Feature::new("region", "string")]).await.unwrap();
    assert_eq!(names(group.features()), vec!["id", "ts", "region"]);

    let err = group.append_features(vec![Feature::new("TS", "timestamp")]).await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::Schema(SchemaError::FeatureExists { .. })));

    let err = group
        .append_features(vec![Feature::new("a", "int"), Feature::new("A", "int")])
        .await
        .unwrap_err();
    assert!(matches!(err, FeatureStoreError::Schema(SchemaError::DuplicateFeature { .. })));
    assert_eq!(group.features().len(), 3);
}

#[tokio::test]
async fn test_append_on_unsaved_group_fails_locally() {
    let (store, _) = store_with(MockGateway::new(), MockProvider::new());
    let mut group = store.create_feature_group("sales", 1).features(sales_features()).build();

    let err = group.append_features(vec![Feature::new("region", "string")]).await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::NotPersisted { .. }));
}

#[tokio::test]
async fn test_update_description_only_after_success() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    let mut seq = Sequence::new();
    gateway
        .expect_update()
        .with(eq(5), eq(MetadataUpdate::Description("daily sales".to_string())))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(Status::internal("boom")));
    gateway
        .expect_update()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, update| {
            let mut record = persisted_record("sales");
            if let MetadataUpdate::Description(description) = update {
                record.description = Some(description);
            }
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    assert!(group.update_description("daily sales").await.is_err());
    assert!(group.description().is_none());

    group.update_description("daily sales").await.unwrap();
    assert_eq!(group.description(), Some("daily sales"));
}

#[tokio::test]
async fn test_update_feature_description() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_update()
        .withf(|_, update| match update {
            MetadataUpdate::Features(features) => {
                features.len() == 1 && features[0].name == "amount" && features[0].description.as_deref() == Some("gross")
            }
            _ => false,
        })
        .times(1)
        .returning(|_, _| {
            let mut record = persisted_record("sales");
            record.features[2].description = Some("gross".to_string());
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    group.update_feature_description("AMOUNT", "gross").await.unwrap();
    assert_eq!(group.get_feature("amount").unwrap().description.as_deref(), Some("gross"));

    let err = group.update_feature_description("region", "n/a").await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::NotFound(_)));
}

#[tokio::test]
async fn test_update_features_rejects_schema_changes_before_remote_call() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway.expect_update().never();
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    let err = group
        .update_features(vec![Feature::new("amount", "string").with_primary(true)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeatureStoreError::Schema(SchemaError::ImmutableFeature { ref name, attribute: "type" }) if name == "amount"
    ));

    let err = group
        .update_features(vec![Feature::new("amount", "double").with_primary(true)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        FeatureStoreError::Schema(SchemaError::ImmutableFeature {
            attribute: "primary key flag",
            ..
        })
    ));

    assert_eq!(group.primary_keys(), &["id".to_string()]);
    assert_eq!(group.get_feature("amount").unwrap().feature_type.as_deref(), Some("double"));
}

#[tokio::test]
async fn test_update_features_keeps_type_and_key_flags() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_update()
        .withf(|_, update| match update {
            MetadataUpdate::Features(features) => features.iter().any(|f| {
                f.name == "id" && f.feature_type == "bigint" && f.primary && f.description.as_deref() == Some("order id")
            }),
            _ => false,
        })
        .times(1)
        .returning(|_, _| {
            let mut record = persisted_record("sales");
            record.features[0].description = Some("order id".to_string());
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    group
        .update_features(vec![Feature::reference("ID", None).with_description("order id")])
        .await
        .unwrap();
    let id = group.get_feature("id").unwrap();
    assert!(id.primary);
    assert_eq!(id.description.as_deref(), Some("order id"));
}

#[tokio::test]
async fn test_update_statistics_config() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_update()
        .withf(|_, update| matches!(update, MetadataUpdate::StatisticsConfig(config) if config.histograms))
        .times(1)
        .returning(|_, update| {
            let mut record = persisted_record("sales");
            if let MetadataUpdate::StatisticsConfig(config) = update {
                record.statistics_config = config;
            }
            Ok(record)
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    let config = StatisticsConfig {
        histograms: true,
        ..StatisticsConfig::default()
    };
    group.update_statistics_config(config.clone()).await.unwrap();
    assert_eq!(group.statistics_config(), &config);
}

#[tokio::test]
async fn test_tags_are_never_cached() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_add_tag()
        .with(eq(5), eq("owner".to_string()), eq(json!({"team": "growth"})))
        .times(1)
        .returning(|_, _, _| Ok(()));
    let mut seq = Sequence::new();
    gateway
        .expect_get_tags()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(BTreeMap::from([("owner".to_string(), json!({"team": "growth"}))])));
    gateway
        .expect_get_tags()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(BTreeMap::new()));
    gateway
        .expect_get_tag()
        .returning(|_, name| Err(Status::not_found(format!("Tag {} not found", name))));
    gateway.expect_delete_tag().times(1).returning(|_, _| Ok(()));
    let (store, _) = store_with(gateway, MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    group.add_tag("owner", json!({"team": "growth"})).await.unwrap();
    assert_eq!(group.get_tags().await.unwrap().len(), 1);
    group.delete_tag("owner").await.unwrap();
    assert!(group.get_tags().await.unwrap().is_empty());

    match group.get_tag("owner").await {
        Err(FeatureStoreError::Remote(remote)) => assert_eq!(remote.status, Code::NotFound),
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_statistics_disabled_makes_no_remote_call() {
    let mut record = persisted_record("sales");
    record.statistics_config.enabled = false;
    // only the fetch is expected; the provider has no expectations at all
    let (store, sink) = store_with(gateway_serving(record), MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    assert!(group.compute_statistics().await.unwrap().is_none());
    assert_eq!(
        sink.take(),
        vec![Advisory::StatisticsDisabled {
            name: "sales".to_string(),
            version: 1
        }]
    );
}

#[tokio::test]
async fn test_compute_statistics_persists_commit() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_save_statistics_commit()
        .withf(|id, commit| *id == 5 && commit.commit_time.len() == 14 && commit.content.row_count == 3)
        .times(1)
        .returning(|_, commit| Ok(commit));

    let mut provider = MockProvider::new();
    provider
        .expect_read_all()
        .withf(|record| record.id == Some(5))
        .times(1)
        .returning(|_| Ok(sales_batch()));
    provider
        .expect_compute_statistics()
        .times(1)
        .returning(|batch, config| metastore_core::statistics::compute_statistics(&batch, &config));
    let (store, sink) = store_with(gateway, provider);

    let group = store.get_feature_group("sales", 1).await.unwrap();
    let commit = group.compute_statistics().await.unwrap().unwrap();
    assert!(crate::feature_group::parse_commit_time(&commit.commit_time).is_ok());
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn test_get_statistics() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_get_statistics_commit()
        .with(eq(5), eq(CommitSelector::Latest))
        .times(1)
        .returning(|_, _| Ok(None));
    gateway
        .expect_get_statistics_commit()
        .with(eq(5), eq(CommitSelector::At("20240101120000".to_string())))
        .times(1)
        .returning(|_, _| {
            Ok(Some(StatisticsCommit {
                commit_time: "20240101120000".to_string(),
                computation_time: 0,
                content: StatisticsPayload::default(),
            }))
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    assert!(group.get_statistics().await.unwrap().is_none());
    assert!(group.get_statistics_at("20240101120000").await.unwrap().is_some());

    // malformed commit times never reach the gateway
    for bad in ["2024-01-01", "202401011200", "20241301120000"] {
        assert!(matches!(
            group.get_statistics_at(bad).await.unwrap_err(),
            FeatureStoreError::Format(_)
        ));
    }
}

#[tokio::test]
async fn test_delete_raises_advisory() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway.expect_delete().with(eq(5)).times(1).returning(|_| Ok(()));
    let (store, sink) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    group.delete().await.unwrap();
    assert_eq!(
        sink.take(),
        vec![Advisory::JobsRemoved {
            name: "sales".to_string(),
            version: 1
        }]
    );
}

#[tokio::test]
async fn test_failed_delete_keeps_group_usable() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    let mut seq = Sequence::new();
    gateway
        .expect_delete()
        .with(eq(5))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Err(Status::unavailable("gateway down")));
    gateway
        .expect_delete()
        .with(eq(5))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("sales", 1).await.unwrap();
    let err = group.delete().await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::Remote(ref remote) if remote.status == Code::Unavailable));
    assert_eq!(group.id(), Some(5));
    assert!(group.get_feature("amount").is_ok());

    group.delete().await.unwrap();
    assert_eq!(group.id(), None);
    let err = group.get_tags().await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::NotPersisted { .. }));
    let err = group.delete().await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::NotPersisted { .. }));
}

#[tokio::test]
async fn test_provenance_reads_ask_the_gateway() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_get_provenance()
        .with(eq(5), eq(ProvenanceDirection::Upstream), eq(ArtifactKind::FeatureGroup))
        .times(1)
        .returning(|_, _, _| {
            Ok(ProvenanceLinks {
                deleted: vec![ArtifactRef {
                    id: None,
                    ..ArtifactRef::feature_group(&FeatureGroupRecord::new(1, "featurestore", "raw", 1))
                }],
                ..ProvenanceLinks::default()
            })
        });
    gateway
        .expect_get_provenance()
        .with(eq(5), eq(ProvenanceDirection::Downstream), eq(ArtifactKind::FeatureView))
        .times(1)
        .returning(|_, _, _| {
            Ok(ProvenanceLinks {
                accessible: vec![ArtifactRef::feature_view("featurestore", "training", 1)],
                ..ProvenanceLinks::default()
            })
        });
    gateway
        .expect_get_provenance()
        .with(eq(5), eq(ProvenanceDirection::Downstream), eq(ArtifactKind::FeatureGroup))
        .times(1)
        .returning(|_, _, _| Ok(ProvenanceLinks::default()));
    let (store, _) = store_with(gateway, MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    let parents = group.get_parent_feature_groups().await.unwrap();
    assert!(parents.accessible.is_empty());
    assert_eq!(parents.deleted[0].name, "raw");
    let views = group.get_generated_feature_views().await.unwrap();
    assert_eq!(views.accessible[0].kind, ArtifactKind::FeatureView);
    assert!(group.get_generated_feature_groups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_provenance_on_unsaved_group_fails_locally() {
    let (store, _) = store_with(MockGateway::new(), MockProvider::new());
    let group = store.create_feature_group("sales", 1).features(sales_features()).build();

    let err = group.get_parent_feature_groups().await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::NotPersisted { .. }));
}

#[tokio::test]
async fn test_subject_is_cached_and_unloadable() {
    let mut record = persisted_record("clicks");
    record.group_type = FeatureGroupType::Stream;
    record.online_enabled = true;
    record.online_topic_name = Some("1_5_clicks_1_onlinefs".to_string());
    record.features.push(FeatureRecord::new("pages", "array<string>"));

    let schema = metastore_core::avro::record_schema(&record).to_string();
    let mut gateway = gateway_serving(record);
    gateway
        .expect_get_subject()
        .with(eq("1_5_clicks_1_onlinefs".to_string()))
        .times(2)
        .returning(move |topic| {
            Ok(Subject {
                id: 1,
                subject: topic,
                version: 1,
                schema: schema.clone(),
            })
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let mut group = store.get_feature_group("clicks", 1).await.unwrap();
    assert_eq!(group.online_topic_name(), Some("1_5_clicks_1_onlinefs"));
    assert_eq!(group.complex_features(), Some(vec!["pages".to_string()]));

    assert_eq!(group.subject().await.unwrap().map(|s| s.version), Some(1));
    assert!(group.avro_schema().await.unwrap().is_some());
    assert_eq!(group.feature_avro_schema("ID").await.unwrap().as_deref(), Some("\"long\""));

    let encoded: Value = serde_json::from_str(&group.encoded_avro_schema().await.unwrap().unwrap()).unwrap();
    assert_eq!(encoded["fields"][3]["type"], json!(["null", "bytes"]));

    group.unload_subject();
    assert!(group.subject().await.unwrap().is_some());
}

#[tokio::test]
async fn test_external_group_has_no_online_capabilities() {
    let mut record = persisted_record("orders");
    record.group_type = FeatureGroupType::External;
    record.online_topic_name = Some("ignored".to_string());
    record.source = Some(SourceRecord::query("jdbc", "SELECT * FROM orders"));
    let (store, _) = store_with(gateway_serving(record), MockProvider::new());

    let group = store.get_feature_group("orders", 1).await.unwrap();
    assert!(group.online_topic_name().is_none());
    assert!(group.complex_features().is_none());
    assert!(group.subject().await.unwrap().is_none());
    assert!(group.feature_avro_schema("id").await.unwrap().is_none());
    assert!(group.encoded_avro_schema().await.unwrap().is_none());
    assert!(group.avro_schema().await.unwrap().is_none());
    assert!(group.deltastreamer_jobconf().is_none());
}

#[tokio::test]
async fn test_commit_details_requires_hudi() {
    let mut record = persisted_record("sales");
    record.time_travel_format = TimeTravelFormat::None;
    let (store, _) = store_with(gateway_serving(record), MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    let err = group.commit_details(None, None).await.unwrap_err();
    assert!(matches!(err, FeatureStoreError::Unsupported { operation: "commit_details", .. }));
}

#[tokio::test]
async fn test_commit_details_converts_wallclock() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway
        .expect_get_commit_details()
        .with(eq(5), eq(Some(1_704_110_400_000)), eq(Some(1)))
        .times(1)
        .returning(|_, _, _| {
            Ok(vec![CommitRecord {
                commit_id: 1_704_067_200_000,
                rows_inserted: 10,
                rows_updated: 2,
                rows_deleted: 0,
            }])
        });
    let (store, _) = store_with(gateway, MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    let details = group.commit_details(Some("20240101120000"), Some(1)).await.unwrap();
    let commit = &details[&1_704_067_200_000];
    assert_eq!(commit.committed_on, "20240101000000");
    assert_eq!(commit.rows_inserted, 10);
    assert_eq!(commit.rows_updated, 2);
}

#[tokio::test]
async fn test_commit_details_rejects_out_of_range_commit_id() {
    let mut gateway = gateway_serving(persisted_record("sales"));
    gateway.expect_get_commit_details().times(1).returning(|_, _, _| {
        Ok(vec![CommitRecord {
            commit_id: i64::MAX,
            rows_inserted: 1,
            rows_updated: 0,
            rows_deleted: 0,
        }])
    });
    let (store, _) = store_with(gateway, MockProvider::new());

    let group = store.get_feature_group("sales", 1).await.unwrap();
    let err = group.commit_details(None, None).await.unwrap_err();
    assert!(matches!(
        err,
        FeatureStoreError::Format(FormatError::CommitId { value: i64::MAX })
    ));
}

#[tokio::test]
async fn test_provenance_with_in_memory_gateway() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = FeatureStore::new(&StoreSettings::default(), gateway.clone(), Arc::new(ArrowProvider::new()));

    let mut raw = store
        .create_feature_group("raw", 1)
        .features(sales_features())
        .primary_key(["id"])
        .build();
    raw.save().await.unwrap();
    let mut daily = store
        .create_feature_group("daily", 1)
        .features(sales_features())
        .primary_key(["id"])
        .build();
    daily.save().await.unwrap();

    let raw_id = raw.id().unwrap();
    gateway
        .record_lineage(raw_id, ArtifactRef::feature_group(&daily.record()))
        .await
        .unwrap();

    let children = raw.get_generated_feature_groups().await.unwrap();
    assert_eq!(children.accessible.len(), 1);
    assert_eq!(children.accessible[0].name, "daily");
    assert_eq!(daily.get_parent_feature_groups().await.unwrap().accessible[0].id, Some(raw_id));

    raw.delete().await.unwrap();
    let parents = daily.get_parent_feature_groups().await.unwrap();
    assert!(parents.accessible.is_empty());
    assert_eq!(parents.deleted[0].name, "raw");
    assert_eq!(parents.deleted[0].id, None);
}

#[tokio::test]
async fn test_end_to_end_with_in_memory_collaborators() {
    let gateway = Arc::new(InMemoryGateway::new());
    let provider = Arc::new(ArrowProvider::new());
    let source = SourceRecord::query("jdbc", "SELECT * FROM sales");
    provider.register_source(source.key(), sales_batch()).await;

    let sink = Arc::new(CollectingSink::new());
    let store = FeatureStore::new(&StoreSettings::default(), gateway.clone(), provider.clone())
        .with_advisory_sink(sink.clone());

    let mut group = store
        .create_external_feature_group("sales", 1, source)
        .primary_key(["id"])
        .statistics_config(StatisticsConfig {
            exact_uniqueness: true,
            ..StatisticsConfig::default()
        })
        .build();
    group.save().await.unwrap();
    let id = group.id().unwrap();
    assert_eq!(names(group.features()), vec!["id", "amount", "region"]);
    assert_eq!(group.features()[0].feature_type.as_deref(), Some("bigint"));

    group
        .update_features(vec![Feature::new("amount", "double").with_description("gross amount")])
        .await
        .unwrap();
    assert_eq!(names(group.features()), vec!["id", "amount", "region"]);
    assert_eq!(group.get_feature("amount").unwrap().description.as_deref(), Some("gross amount"));

    let commit = group.compute_statistics().await.unwrap().unwrap();
    assert_eq!(commit.content.column("region").unwrap().distinct, Some(2));
    assert_eq!(group.get_statistics().await.unwrap(), Some(commit));

    gateway
        .record_commit(
            id,
            CommitRecord {
                commit_id: 1_704_067_200_000,
                rows_inserted: 3,
                rows_updated: 0,
                rows_deleted: 0,
            },
        )
        .await
        .unwrap();
    assert_eq!(group.commit_details(None, None).await.unwrap().len(), 1);

    let fetched = store.get_feature_group("sales", 1).await.unwrap();
    assert_eq!(fetched.features(), group.features());
    assert_eq!(fetched.read().await.unwrap().num_rows(), 3);

    group.delete().await.unwrap();
    assert!(gateway.is_empty().await);
    assert!(store.get_feature_group("sales", 1).await.is_err());
    assert_eq!(sink.take().len(), 1);
}

#[tokio::test]
async fn test_stream_group_captures_write_options() {
    let gateway = Arc::new(InMemoryGateway::new());
    let store = FeatureStore::new(&StoreSettings::default(), gateway, Arc::new(ArrowProvider::new()));

    let mut group = store
        .create_stream_feature_group("clicks", 1)
        .features(vec![Feature::new("id", "bigint"), Feature::new("pages", "array<string>")])
        .primary_key(["id"])
        .online_enabled(false)
        .write_option("hoodie.datasource.write.operation", "upsert")
        .write_option("spark", json!({"spark.executor.memory": "2g"}))
        .build();
    group.save().await.unwrap();

    assert!(group.online_enabled());
    assert!(group.online_topic_name().is_some());

    let jobconf = group.deltastreamer_jobconf().unwrap();
    let options = jobconf.write_options.as_ref().unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0].name, "hoodie.datasource.write.operation");
    assert_eq!(options[0].value, "upsert");
    assert_eq!(
        jobconf.spark_job_configuration,
        Some(json!({"spark.executor.memory": "2g"}))
    );

    let encoded: Value = serde_json::from_str(&group.encoded_avro_schema().await.unwrap().unwrap()).unwrap();
    assert_eq!(encoded["fields"][1]["type"], json!(["null", "bytes"]));

    group.append_features(vec![Feature::new("region", "string")]).await.unwrap();
    assert_eq!(group.subject().await.unwrap().map(|s| s.version), Some(2));
}

#[test]
fn test_precombine_key_ignored_outside_hudi() {
    let store = FeatureStore::new(
        &StoreSettings::default(),
        Arc::new(InMemoryGateway::new()),
        Arc::new(ArrowProvider::new()),
    );
    let mut group = store
        .create_feature_group("sales", 1)
        .features(sales_features())
        .time_travel_format(TimeTravelFormat::Delta)
        .hudi_precombine_key("missing")
        .build();

    tokio_test::block_on(group.save()).unwrap();
    assert!(group.hudi_precombine_key().is_none());
    assert!(group.features().iter().all(|f| !f.hudi_precombine_key));
    assert_eq!(group.location(), Some("memory://warehouse/featurestore.db/sales_1"));
}
