//! Descriptive statistics over materialized feature data.
//!
//! This module computes the statistics payload persisted in a statistics
//! commit. It covers:
//! - Per-column counts and completeness
//! - Numeric summaries (Sum, Avg, Min, Max)
//! - Exact distinct counts, when uniqueness is requested
//! - Equal-width histograms for numeric columns
//! - Pearson correlations between numeric columns
//!
//! The computation is a reference implementation for in-memory data; providers
//! backed by a real dataframe engine are free to compute the same payload
//! their own way.

use arrow::compute::cast;
use arrow_array::{Array, ArrayRef, Float64Array, RecordBatch, StringArray};
use arrow_schema::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tonic::Status;

use crate::records::StatisticsConfig;

/// Number of buckets in a numeric histogram.
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Statistics for a whole dataset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsPayload {
    pub row_count: usize,
    pub columns: Vec<ColumnStatistics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub correlations: Vec<Correlation>,
}

impl StatisticsPayload {
    pub fn column(&self, name: &str) -> Option<&ColumnStatistics> {
        self.columns.iter().find(|c| c.column == name)
    }
}

/// Statistics for a single column.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStatistics {
    pub column: String,
    pub data_type: String,
    pub count: usize,
    pub num_non_null: usize,
    pub completeness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Vec<HistogramBucket>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Correlation {
    pub column_a: String,
    pub column_b: String,
    pub value: f64,
}

/// Computes statistics for the columns selected by `config`.
///
/// An empty column list in the config selects every column of the batch.
/// Naming a column the batch does not have is an error.
pub fn compute_statistics(batch: &RecordBatch, config: &StatisticsConfig) -> Result<StatisticsPayload, Status> {
    let schema = batch.schema();
    let selected: Vec<String> = if config.columns.is_empty() {
        schema.fields().iter().map(|f| f.name().clone()).collect()
    } else {
        config.columns.clone()
    };

    let mut columns = Vec::with_capacity(selected.len());
    let mut numeric: Vec<(String, Float64Array)> = Vec::new();

    for name in &selected {
        let column = batch
            .column_by_name(name)
            .ok_or_else(|| Status::invalid_argument(format!("Column {} not found in dataset", name)))?;

        let mut stats = ColumnStatistics {
            column: name.clone(),
            data_type: column.data_type().to_string(),
            count: column.len(),
            num_non_null: column.len() - column.null_count(),
            completeness: completeness(column.len(), column.null_count()),
            ..Default::default()
        };

        if let Some(values) = as_float64(column)? {
            summarize(&values, &mut stats);
            if config.histograms {
                stats.histogram = Some(histogram(&values, stats.min, stats.max));
            }
            numeric.push((name.clone(), values));
        }

        if config.exact_uniqueness {
            stats.distinct = distinct_count(column);
        }

        columns.push(stats);
    }

    let correlations = if config.correlations {
        pairwise_correlations(&numeric)
    } else {
        Vec::new()
    };

    Ok(StatisticsPayload {
        row_count: batch.num_rows(),
        columns,
        correlations,
    })
}

fn completeness(len: usize, nulls: usize) -> f64 {
    if len == 0 {
        0.0
    } else {
        (len - nulls) as f64 / len as f64
    }
}

fn is_numeric(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
    )
}

fn as_float64(column: &ArrayRef) -> Result<Option<Float64Array>, Status> {
    if !is_numeric(column.data_type()) {
        return Ok(None);
    }
    let casted = cast(column, &DataType::Float64)
        .map_err(|e| Status::internal(format!("Failed to cast column to double: {}", e)))?;
    Ok(casted.as_any().downcast_ref::<Float64Array>().cloned())
}

fn summarize(values: &Float64Array, stats: &mut ColumnStatistics) {
    let mut sum = 0.0;
    let mut count = 0usize;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for value in values.iter().flatten() {
        sum += value;
        count += 1;
        min = min.min(value);
        max = max.max(value);
    }

    if count > 0 {
        stats.sum = Some(sum);
        stats.mean = Some(sum / count as f64);
        stats.min = Some(min);
        stats.max = Some(max);
    }
}

fn histogram(values: &Float64Array, min: Option<f64>, max: Option<f64>) -> Vec<HistogramBucket> {
    let (Some(min), Some(max)) = (min, max) else {
        return Vec::new();
    };

    if min == max {
        return vec![HistogramBucket {
            lower: min,
            upper: max,
            count: values.len() - values.null_count(),
        }];
    }

    let width = (max - min) / HISTOGRAM_BUCKETS as f64;
    let mut buckets: Vec<HistogramBucket> = (0..HISTOGRAM_BUCKETS)
        .map(|i| HistogramBucket {
            lower: min + width * i as f64,
            upper: min + width * (i + 1) as f64,
            count: 0,
        })
        .collect();

    for value in values.iter().flatten() {
        // the maximum lands in the last bucket
        let idx = (((value - min) / width) as usize).min(HISTOGRAM_BUCKETS - 1);
        buckets[idx].count += 1;
    }

    buckets
}

fn distinct_count(column: &ArrayRef) -> Option<usize> {
    let as_text = cast(column, &DataType::Utf8).ok()?;
    let strings = as_text.as_any().downcast_ref::<StringArray>()?;
    let distinct: HashSet<&str> = strings.iter().flatten().collect();
    Some(distinct.len())
}

fn pairwise_correlations(numeric: &[(String, Float64Array)]) -> Vec<Correlation> {
    let mut correlations = Vec::new();
    for (i, (name_a, a)) in numeric.iter().enumerate() {
        for (name_b, b) in numeric.iter().skip(i + 1) {
            if let Some(value) = pearson(a, b) {
                correlations.push(Correlation {
                    column_a: name_a.clone(),
                    column_b: name_b.clone(),
                    value,
                });
            }
        }
    }
    correlations
}

fn pearson(a: &Float64Array, b: &Float64Array) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
