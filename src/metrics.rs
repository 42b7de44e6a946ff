//! Per-cluster business metrics
//!
//! Derived ratios are ratios of cluster means, not means of per-row ratios.
//! For revenue `[100, 200]` and transactions `[1, 4]` the efficiency ratio is
//! `150 / 2.5 = 60`, whereas averaging the row ratios would give `75`.

use crate::config::ColumnNames;
use crate::data::{ClusterLabel, Entity, EntityTable};
use crate::measure::{Measure, Undefined};
use crate::stats;
use polars::prelude::DataFrame;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregates for one cluster, recomputed from a table snapshot on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterMetrics {
    pub count: usize,
    pub revenue_mean: f64,
    /// Sample standard deviation (`ddof = 1`); undefined for a single member
    pub revenue_std: Measure,
    pub revenue_median: f64,
    pub transactions_mean: f64,
    pub ticket_mean: f64,
    pub products_mean: f64,
    pub activity_days_mean: f64,
    /// `mean(revenue) / mean(activity_days)`
    pub revenue_per_day: Measure,
    /// `mean(revenue) / mean(transactions)`
    pub efficiency_ratio: Measure,
    /// `mean(unique_products) / mean(transactions)`
    pub product_diversity: Measure,
    pub revenue_p25: f64,
    pub revenue_p75: f64,
}

impl ClusterMetrics {
    /// Aggregate a non-empty set of cluster members; `None` if `members` is empty.
    pub fn from_members(members: &[&Entity]) -> Option<Self> {
        let revenue = column(members, |e| e.revenue);
        let revenue_mean = stats::mean(&revenue)?;
        let transactions_mean = stats::mean(&column(members, |e| e.transactions))?;
        let ticket_mean = stats::mean(&column(members, |e| e.ticket))?;
        let products_mean = stats::mean(&column(members, |e| e.unique_products))?;
        let activity_days_mean = stats::mean(&column(members, |e| e.activity_days))?;

        let revenue_std = match stats::sample_std(&revenue) {
            Some(std) => Measure::Defined(std),
            None => Measure::Undefined(Undefined::InsufficientSamples {
                required: 2,
                available: revenue.len(),
            }),
        };

        Some(Self {
            count: members.len(),
            revenue_mean,
            revenue_std,
            revenue_median: stats::median(&revenue)?,
            transactions_mean,
            ticket_mean,
            products_mean,
            activity_days_mean,
            revenue_per_day: Measure::ratio(
                revenue_mean,
                activity_days_mean,
                "mean activity days",
            ),
            efficiency_ratio: Measure::ratio(
                revenue_mean,
                transactions_mean,
                "mean transactions",
            ),
            product_diversity: Measure::ratio(
                products_mean,
                transactions_mean,
                "mean transactions",
            ),
            revenue_p25: stats::quantile(&revenue, 0.25)?,
            revenue_p75: stats::quantile(&revenue, 0.75)?,
        })
    }
}

pub(crate) fn column(members: &[&Entity], field: impl Fn(&Entity) -> f64) -> Vec<f64> {
    members.iter().map(|e| field(e)).collect()
}

/// Compute [`ClusterMetrics`] for every label present in the table.
///
/// Rows without a label are excluded, so the counts sum to the number of
/// labelled rows.
pub fn business_metrics(table: &EntityTable) -> BTreeMap<ClusterLabel, ClusterMetrics> {
    let mut groups: BTreeMap<&ClusterLabel, Vec<&Entity>> = BTreeMap::new();
    for (label, entity) in table.labelled() {
        groups.entry(label).or_default().push(entity);
    }

    let metrics: BTreeMap<_, _> = groups
        .into_iter()
        .filter_map(|(label, members)| {
            ClusterMetrics::from_members(&members).map(|m| (label.clone(), m))
        })
        .collect();

    tracing::debug!(
        clusters = metrics.len(),
        rows = table.len(),
        "computed business metrics"
    );
    metrics
}

/// Build an [`EntityTable`] from `df` and aggregate it per cluster.
pub fn calculate_business_metrics(
    df: &DataFrame,
    columns: &ColumnNames,
) -> crate::Result<BTreeMap<ClusterLabel, ClusterMetrics>> {
    let table = EntityTable::from_dataframe(df, columns)?;
    Ok(business_metrics(&table))
}
