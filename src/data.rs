//! Entity tables and feature matrices extracted from Polars data frames

use crate::config::ColumnNames;
use crate::error::MetricsError;
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Segment identifier produced by the upstream clustering pipeline.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClusterLabel {
    Int(i64),
    Text(String),
}

impl fmt::Display for ClusterLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for ClusterLabel {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for ClusterLabel {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ClusterLabel {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// One business entity (a PYME) with its segment assignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entity {
    pub id: Option<String>,
    /// `None` when the upstream assignment is missing; such rows belong to no cluster
    pub label: Option<ClusterLabel>,
    pub revenue: f64,
    pub transactions: f64,
    pub ticket: f64,
    pub unique_products: f64,
    pub activity_days: f64,
}

impl Entity {
    pub fn new(label: impl Into<ClusterLabel>, revenue: f64, transactions: f64) -> Self {
        Self {
            id: None,
            label: Some(label.into()),
            revenue,
            transactions,
            ticket: 0.0,
            unique_products: 0.0,
            activity_days: 0.0,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_ticket(mut self, ticket: f64) -> Self {
        self.ticket = ticket;
        self
    }

    pub fn with_unique_products(mut self, unique_products: f64) -> Self {
        self.unique_products = unique_products;
        self
    }

    pub fn with_activity_days(mut self, activity_days: f64) -> Self {
        self.activity_days = activity_days;
        self
    }

    pub fn unlabeled(mut self) -> Self {
        self.label = None;
        self
    }

    /// Numeric attributes in [`ColumnNames::numeric`] order.
    pub fn features(&self) -> [f64; 5] {
        [
            self.revenue,
            self.transactions,
            self.ticket,
            self.unique_products,
            self.activity_days,
        ]
    }
}

/// Ordered collection of entities; labels partition the labelled rows into clusters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EntityTable {
    entities: Vec<Entity>,
}

impl EntityTable {
    /// Build a table from rows, rejecting non-finite numeric attributes.
    pub fn from_entities(entities: Vec<Entity>) -> crate::Result<Self> {
        let defaults = ColumnNames::default();
        for (row, entity) in entities.iter().enumerate() {
            for (column, value) in defaults.numeric().into_iter().zip(entity.features()) {
                if !value.is_finite() {
                    return Err(MetricsError::invalid_value(
                        column,
                        row,
                        format!("expected a finite number, got {value}"),
                    ));
                }
            }
        }
        Ok(Self { entities })
    }

    /// Extract an entity table from a data frame using the configured column names.
    ///
    /// Null labels are kept as unlabelled rows. Null or non-finite numeric
    /// values are rejected.
    pub fn from_dataframe(df: &DataFrame, columns: &ColumnNames) -> crate::Result<Self> {
        let labels = extract_labels(df, &columns.label)?;
        let ids = match &columns.id {
            Some(name) => Some(extract_ids(df, name)?),
            None => None,
        };
        let revenue = extract_finite(df, &columns.revenue)?;
        let transactions = extract_finite(df, &columns.transactions)?;
        let ticket = extract_finite(df, &columns.ticket)?;
        let unique_products = extract_finite(df, &columns.unique_products)?;
        let activity_days = extract_finite(df, &columns.activity_days)?;

        let entities = (0..df.height())
            .map(|i| Entity {
                id: ids.as_ref().and_then(|ids| ids[i].clone()),
                label: labels[i].clone(),
                revenue: revenue[i],
                transactions: transactions[i],
                ticket: ticket[i],
                unique_products: unique_products[i],
                activity_days: activity_days[i],
            })
            .collect();

        Ok(Self { entities })
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Rows that carry a cluster label.
    pub fn labelled(&self) -> impl Iterator<Item = (&ClusterLabel, &Entity)> {
        self.entities
            .iter()
            .filter_map(|e| e.label.as_ref().map(|label| (label, e)))
    }

    /// Distinct labels present in the table, in ascending order.
    pub fn cluster_labels(&self) -> BTreeSet<ClusterLabel> {
        self.labelled().map(|(label, _)| label.clone()).collect()
    }

    /// Rows assigned to `label`, in table order.
    pub fn cluster<'a>(
        &'a self,
        label: &'a ClusterLabel,
    ) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities
            .iter()
            .filter(move |e| e.label.as_ref() == Some(label))
    }

    /// Feature matrix `(n_labelled, 5)` and aligned labels, skipping unlabelled rows.
    pub fn feature_matrix(&self) -> (Array2<f64>, Vec<ClusterLabel>) {
        let labelled: Vec<_> = self.labelled().collect();
        let matrix = Array2::from_shape_fn((labelled.len(), 5), |(i, j)| {
            labelled[i].1.features()[j]
        });
        let labels = labelled.iter().map(|(label, _)| (*label).clone()).collect();
        (matrix, labels)
    }
}

/// Extract numeric columns of a data frame as a `(height, columns.len())` matrix.
///
/// Every value must be present and finite.
pub fn feature_matrix(df: &DataFrame, columns: &[&str]) -> crate::Result<Array2<f64>> {
    if columns.is_empty() {
        return Err(MetricsError::EmptyInput {
            what: "feature column list",
        });
    }
    let extracted = columns
        .iter()
        .map(|name| extract_finite(df, name))
        .collect::<crate::Result<Vec<_>>>()?;

    Ok(Array2::from_shape_fn(
        (df.height(), columns.len()),
        |(i, j)| extracted[j][i],
    ))
}

/// Read a column as optional `f64`s, treating nulls and NaN as missing.
pub(crate) fn extract_optional(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .map_err(|_| MetricsError::column_not_found(name))?;
    if !series.dtype().is_numeric() {
        return Err(MetricsError::InvalidColumnType {
            column: name.to_string(),
            dtype: series.dtype().to_string(),
        });
    }
    let values = series
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

fn extract_finite(df: &DataFrame, name: &str) -> crate::Result<Vec<f64>> {
    extract_optional(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(MetricsError::invalid_value(
                name,
                row,
                format!("expected a finite number, got {v}"),
            )),
            None => Err(MetricsError::invalid_value(name, row, "missing value")),
        })
        .collect()
}

fn extract_labels(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<ClusterLabel>>> {
    let series = df
        .column(name)
        .map_err(|_| MetricsError::column_not_found(name))?;

    if series.dtype() == &DataType::String {
        return Ok(series
            .str()?
            .into_iter()
            .map(|v| v.map(|s| ClusterLabel::Text(s.to_string())))
            .collect());
    }

    // Integer labels may arrive as floats after a CSV round trip.
    extract_optional(df, name)?
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            None => Ok(None),
            Some(v) if is_integral_label(v) => Ok(Some(ClusterLabel::Int(v as i64))),
            Some(v) => Err(MetricsError::invalid_value(
                name,
                row,
                format!("cluster label must be an i64 integer, got {v}"),
            )),
        })
        .collect()
}

/// Finite, whole and inside the `i64` range; `as` would saturate otherwise.
fn is_integral_label(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64
}

fn extract_ids(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .map_err(|_| MetricsError::column_not_found(name))?;
    let ids = series.cast(&DataType::String)?;
    let ids = ids
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(ids)
}
