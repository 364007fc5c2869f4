//! A single column of a feature group.

use metastore_core::avro::is_complex_type;
use metastore_core::records::FeatureRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{Condition, Filter};

/// One named, typed column of a feature group schema.
///
/// Names are unique within a group when compared case-insensitively. A
/// feature without a type is a name-only reference, as built by
/// [`Feature::reference`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(rename = "type")]
    pub feature_type: Option<String>,
    pub primary: bool,
    pub partition: bool,
    pub hudi_precombine_key: bool,
    pub description: Option<String>,
    pub online_type: Option<String>,
    pub feature_group_id: Option<i64>,
}

impl Feature {
    pub fn new(name: impl Into<String>, feature_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_type: Some(feature_type.into()),
            ..Default::default()
        }
    }

    /// Name-only reference to a feature of the group `feature_group_id`.
    pub fn reference(name: impl Into<String>, feature_group_id: Option<i64>) -> Self {
        Self {
            name: name.into(),
            feature_group_id,
            ..Default::default()
        }
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_partition(mut self, partition: bool) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_hudi_precombine_key(mut self, precombine: bool) -> Self {
        self.hudi_precombine_key = precombine;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_online_type(mut self, online_type: impl Into<String>) -> Self {
        self.online_type = Some(online_type.into());
        self
    }

    /// Case-insensitive name comparison.
    pub fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    /// Whether the feature is an array, struct or map.
    pub fn is_complex(&self) -> bool {
        self.feature_type.as_deref().map(is_complex_type).unwrap_or(false)
    }

    /// Filter constructors. `equals` and `not_equals` are named so they do
    /// not shadow `PartialEq::eq` and `PartialEq::ne`.
    pub fn equals(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Eq, value)
    }

    pub fn not_equals(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Ne, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Ge, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> Filter {
        Filter::new(self.clone(), Condition::Le, value)
    }

    pub fn isin<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Filter {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        Filter::new(self.clone(), Condition::In, Value::Array(values))
    }

    pub fn like(&self, pattern: impl Into<String>) -> Filter {
        Filter::new(self.clone(), Condition::Like, Value::String(pattern.into()))
    }
}

impl From<FeatureRecord> for Feature {
    fn from(record: FeatureRecord) -> Self {
        Self {
            name: record.name,
            feature_type: Some(record.feature_type),
            primary: record.primary,
            partition: record.partition,
            hudi_precombine_key: record.hudi_precombine_key,
            description: record.description,
            online_type: record.online_type,
            feature_group_id: None,
        }
    }
}

impl From<Feature> for FeatureRecord {
    fn from(feature: Feature) -> Self {
        Self {
            name: feature.name,
            feature_type: feature.feature_type.unwrap_or_default(),
            primary: feature.primary,
            partition: feature.partition,
            hudi_precombine_key: feature.hudi_precombine_key,
            description: feature.description,
            online_type: feature.online_type,
        }
    }
}
