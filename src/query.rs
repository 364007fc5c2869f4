//! Queries over feature group schemas.
//!
//! A [`Query`] is an immutable projection of a feature group plus an optional
//! filter expression. Nothing here touches data: queries are built from the
//! in-memory schema and rendered as SQL for the materialization side.
//!
//! Selection helpers in this module are pure functions over a schema slice.
//! Exclusion ([`select_except`], [`select_all`]) compares names exactly, while
//! membership checks in [`select_features`] ignore case.

use serde_json::Value;
use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::error::QueryError;
use crate::feature::Feature;

/// Identity of the feature group a query reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureGroupRef {
    pub id: Option<i64>,
    pub feature_store_name: String,
    pub name: String,
    pub version: i32,
}

impl FeatureGroupRef {
    /// Physical table name, `<name>_<version>`.
    pub fn table_name(&self) -> String {
        format!("{}_{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Like,
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Condition::Eq => "=",
            Condition::Ne => "!=",
            Condition::Gt => ">",
            Condition::Ge => ">=",
            Condition::Lt => "<",
            Condition::Le => "<=",
            Condition::In => "IN",
            Condition::Like => "LIKE",
        };
        write!(f, "{}", op)
    }
}

/// A single comparison of a feature against a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub feature: Feature,
    pub condition: Condition,
    pub value: Value,
}

impl Filter {
    pub fn new(feature: Feature, condition: Condition, value: impl Into<Value>) -> Self {
        Self {
            feature,
            condition,
            value: value.into(),
        }
    }

    pub fn and(self, other: impl Into<FilterLogic>) -> FilterLogic {
        FilterLogic::from(self).and(other)
    }

    pub fn or(self, other: impl Into<FilterLogic>) -> FilterLogic {
        FilterLogic::from(self).or(other)
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            quote_identifier(&self.feature.name),
            self.condition,
            sql_literal(&self.value)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logic {
    And,
    Or,
}

/// Boolean combination of filters.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterLogic {
    Single(Filter),
    Combined {
        logic: Logic,
        left: Box<FilterLogic>,
        right: Box<FilterLogic>,
    },
}

impl FilterLogic {
    pub fn and(self, other: impl Into<FilterLogic>) -> FilterLogic {
        FilterLogic::Combined {
            logic: Logic::And,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    pub fn or(self, other: impl Into<FilterLogic>) -> FilterLogic {
        FilterLogic::Combined {
            logic: Logic::Or,
            left: Box::new(self),
            right: Box::new(other.into()),
        }
    }

    /// Every feature referenced by the expression, left to right.
    pub fn features(&self) -> Vec<&Feature> {
        match self {
            FilterLogic::Single(filter) => vec![&filter.feature],
            FilterLogic::Combined { left, right, .. } => {
                let mut features = left.features();
                features.extend(right.features());
                features
            }
        }
    }
}

impl From<Filter> for FilterLogic {
    fn from(filter: Filter) -> Self {
        FilterLogic::Single(filter)
    }
}

impl Display for FilterLogic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterLogic::Single(filter) => write!(f, "{}", filter),
            FilterLogic::Combined { logic, left, right } => {
                let op = match logic {
                    Logic::And => "AND",
                    Logic::Or => "OR",
                };
                write!(f, "({} {} {})", left, op, right)
            }
        }
    }
}

/// Projection of a feature group with an optional filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: FeatureGroupRef,
    features: Vec<Feature>,
    filter: Option<FilterLogic>,
}

impl Query {
    pub fn new(source: FeatureGroupRef, features: Vec<Feature>) -> Self {
        Self {
            source,
            features,
            filter: None,
        }
    }

    pub fn source(&self) -> &FeatureGroupRef {
        &self.source
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn filter_logic(&self) -> Option<&FilterLogic> {
        self.filter.as_ref()
    }

    /// Returns the query with `filter` ANDed onto any existing filter.
    pub fn filter(self, filter: impl Into<FilterLogic>) -> Query {
        let filter = filter.into();
        let combined = match self.filter {
            Some(existing) => existing.and(filter),
            None => filter,
        };
        Query {
            filter: Some(combined),
            ..self
        }
    }

    pub fn to_sql(&self) -> String {
        self.to_string()
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let projection = if self.features.is_empty() {
            "*".to_string()
        } else {
            self.features
                .iter()
                .map(|feature| quote_identifier(&feature.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "SELECT {} FROM {}.{}",
            projection,
            quote_identifier(&self.source.feature_store_name),
            quote_identifier(&self.source.table_name())
        )?;
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", filter)?;
        }
        Ok(())
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Array(values) => {
            let items: Vec<String> = values.iter().map(sql_literal).collect();
            format!("({})", items.join(", "))
        }
        Value::Object(_) => format!("'{}'", value.to_string().replace('\'', "''")),
    }
}

/// Query over exactly `features`, every one of which must be in `schema`.
pub fn select_features(
    source: &FeatureGroupRef,
    schema: &[Feature],
    features: Vec<Feature>,
) -> Result<Query, QueryError> {
    if let Some(unknown) = features
        .iter()
        .find(|requested| !schema.iter().any(|f| f.matches(&requested.name)))
    {
        return Err(QueryError::UnknownFeature {
            feature: unknown.name.clone(),
            group: source.name.clone(),
            version: source.version,
        });
    }
    Ok(Query::new(source.clone(), features))
}

/// Query over the schema features whose name is not in `excluded`.
pub fn select_except<S: AsRef<str>>(source: &FeatureGroupRef, schema: &[Feature], excluded: &[S]) -> Query {
    let excluded: HashSet<&str> = excluded.iter().map(AsRef::as_ref).collect();
    let features = schema
        .iter()
        .filter(|f| !excluded.contains(f.name.as_str()))
        .cloned()
        .collect();
    Query::new(source.clone(), features)
}

/// Full projection, optionally without primary keys and/or event time.
pub fn select_all(
    source: &FeatureGroupRef,
    schema: &[Feature],
    primary_keys: &[String],
    event_time: Option<&str>,
    include_primary_key: bool,
    include_event_time: bool,
) -> Query {
    let event_time: Vec<String> = event_time.map(str::to_string).into_iter().collect();
    match (include_primary_key, include_event_time) {
        (true, true) => Query::new(source.clone(), schema.to_vec()),
        (true, false) => select_except(source, schema, &event_time),
        (false, true) => select_except(source, schema, primary_keys),
        (false, false) => {
            let mut excluded = primary_keys.to_vec();
            excluded.extend(event_time);
            select_except(source, schema, &excluded)
        }
    }
}
