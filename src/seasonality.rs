//! Calendar seasonality of a historical series

use crate::error::MetricsError;
use crate::measure::Measure;
use crate::stats;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Monthly and quarterly averages of a dated series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonalityProfile {
    /// Month (1-12) to mean value, only months that occur in the series
    pub monthly_means: BTreeMap<u32, f64>,
    /// Quarter (1-4) to mean value
    pub quarterly_means: BTreeMap<u32, f64>,
    pub peak_month: u32,
    pub low_month: u32,
    /// `(max - min) / mean` of the monthly means
    pub seasonality_strength: Measure,
}

/// Group `series` by calendar month and quarter.
///
/// Non-finite values are dropped. Ties for peak and low resolve to the
/// earliest month.
pub fn analyze_seasonality(series: &[(NaiveDate, f64)]) -> crate::Result<SeasonalityProfile> {
    let mut by_month: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    let mut by_quarter: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for &(date, value) in series.iter().filter(|(_, v)| v.is_finite()) {
        by_month.entry(date.month()).or_default().push(value);
        by_quarter
            .entry((date.month() - 1) / 3 + 1)
            .or_default()
            .push(value);
    }

    let monthly_means = group_means(by_month);
    let quarterly_means = group_means(by_quarter);

    let (mut peak, mut low) = match monthly_means.iter().next() {
        Some((&month, &mean)) => ((month, mean), (month, mean)),
        None => {
            return Err(MetricsError::NoValidData {
                reason: "series has no finite values",
            })
        }
    };
    for (&month, &mean) in &monthly_means {
        if mean > peak.1 {
            peak = (month, mean);
        }
        if mean < low.1 {
            low = (month, mean);
        }
    }

    let means: Vec<f64> = monthly_means.values().copied().collect();
    let overall = stats::mean(&means).unwrap_or_default();
    let seasonality_strength = Measure::ratio(peak.1 - low.1, overall, "mean of monthly means");

    Ok(SeasonalityProfile {
        monthly_means,
        quarterly_means,
        peak_month: peak.0,
        low_month: low.0,
        seasonality_strength,
    })
}

fn group_means(groups: BTreeMap<u32, Vec<f64>>) -> BTreeMap<u32, f64> {
    groups
        .into_iter()
        .filter_map(|(key, values)| stats::mean(&values).map(|m| (key, m)))
        .collect()
}
