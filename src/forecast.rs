//! Forecast accuracy scoring over paired actual/predicted sequences

use crate::error::MetricsError;
use crate::measure::{Measure, Undefined};
use serde::Serialize;

/// Accuracy of a forecast over the pairs where both values were present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastAccuracy {
    /// Pairs used for scoring
    pub samples: usize,
    /// Pairs discarded because either side was missing
    pub dropped: usize,
    pub mae: f64,
    pub mse: f64,
    pub rmse: f64,
    /// Mean absolute percentage error, in percent
    pub mape: Measure,
    /// Coefficient of determination
    pub r_squared: Measure,
}

/// Score `predicted` against `actual`.
///
/// Indices where either value is non-finite are dropped pairwise before
/// scoring. MAPE is undefined when a kept actual value is exactly zero and R²
/// is undefined when the kept actual values are all equal.
///
/// # Arguments
/// * `actual` - Observed values
/// * `predicted` - Forecast values, same length as `actual`
///
/// # Returns
/// * `ForecastAccuracy` with MAE, MSE, RMSE, MAPE (percent) and R²
pub fn calculate_forecast_accuracy(
    actual: &[f64],
    predicted: &[f64],
) -> crate::Result<ForecastAccuracy> {
    if actual.len() != predicted.len() {
        return Err(MetricsError::LengthMismatch {
            left_name: "actual",
            right_name: "predicted",
            left: actual.len(),
            right: predicted.len(),
        });
    }

    let pairs: Vec<(f64, f64)> = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a.is_finite() && p.is_finite())
        .map(|(&a, &p)| (a, p))
        .collect();

    if pairs.is_empty() {
        return Err(MetricsError::NoValidData {
            reason: "no index has both an actual and a predicted value",
        });
    }

    let n = pairs.len() as f64;
    let mae = pairs.iter().map(|(a, p)| (a - p).abs()).sum::<f64>() / n;
    let sse: f64 = pairs.iter().map(|(a, p)| (a - p).powi(2)).sum();
    let mse = sse / n;

    let zero_actuals = pairs.iter().filter(|(a, _)| *a == 0.0).count();
    let mape = if zero_actuals > 0 {
        Measure::Undefined(Undefined::ZeroActual {
            count: zero_actuals,
        })
    } else {
        let total: f64 = pairs.iter().map(|(a, p)| ((a - p) / a).abs()).sum();
        Measure::Defined(total / n * 100.0)
    };

    let actual_mean = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let sst: f64 = pairs.iter().map(|(a, _)| (a - actual_mean).powi(2)).sum();
    let r_squared = if sst == 0.0 {
        Measure::Undefined(Undefined::ZeroVariance)
    } else {
        Measure::Defined(1.0 - sse / sst)
    };

    Ok(ForecastAccuracy {
        samples: pairs.len(),
        dropped: actual.len() - pairs.len(),
        mae,
        mse,
        rmse: mse.sqrt(),
        mape,
        r_squared,
    })
}
