//! Interquartile-range outlier detection

use crate::data::extract_optional;
use crate::stats::quantile_sorted;
use polars::prelude::DataFrame;

/// Conventional Tukey fence multiplier.
pub const DEFAULT_IQR_FACTOR: f64 = 1.5;

/// Lower and upper IQR fences of a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Fences from the present, finite values; `None` when there are none.
    pub fn from_values(values: &[Option<f64>], factor: f64) -> Option<Self> {
        let mut present: Vec<f64> = values
            .iter()
            .flatten()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if present.is_empty() {
            return None;
        }
        present.sort_by(f64::total_cmp);

        let q1 = quantile_sorted(&present, 0.25);
        let q3 = quantile_sorted(&present, 0.75);
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        })
    }

    /// Strictly outside the fences. NaN never is.
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }
}

/// One flag per value; missing values are never flagged.
pub fn iqr_outlier_mask(values: &[Option<f64>], factor: f64) -> Vec<bool> {
    match IqrFence::from_values(values, factor) {
        Some(fence) => values
            .iter()
            .map(|v| v.map_or(false, |x| fence.is_outlier(x)))
            .collect(),
        None => vec![false; values.len()],
    }
}

/// Flag rows of `df` whose `column` value lies outside the IQR fences.
///
/// Nulls and NaN count as missing and are never flagged.
pub fn detect_outliers_iqr(df: &DataFrame, column: &str, factor: f64) -> crate::Result<Vec<bool>> {
    let values = extract_optional(df, column)?;
    let mask = iqr_outlier_mask(&values, factor);
    tracing::debug!(
        column,
        flagged = mask.iter().filter(|f| **f).count(),
        "iqr outlier scan"
    );
    Ok(mask)
}
