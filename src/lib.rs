//! segmetrics: evaluation and business metrics for customer segmentation results
//!
//! This library scores clusterings and forecasts that already exist: internal
//! validation indices and their stability, per-segment business metrics,
//! IQR outliers, forecast accuracy, rule-based recommendations, seasonality
//! profiles and an HTML report.

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod insights;
pub mod measure;
pub mod metrics;
pub mod outliers;
pub mod report;
pub mod seasonality;
pub mod stats;
pub mod validation;

// Re-export public items for easier access
pub use config::{ClusterProfile, ColumnNames, EngineConfig};
pub use data::{feature_matrix, ClusterLabel, Entity, EntityTable};
pub use error::MetricsError;
pub use forecast::{calculate_forecast_accuracy, ForecastAccuracy};
pub use insights::{
    generate_cluster_insights, ClusterInsights, GrowthPotential, RecommendationPolicy,
    RecommendationRule, RuleCondition, RuleMetric,
};
pub use measure::{Measure, Undefined};
pub use metrics::{business_metrics, calculate_business_metrics, ClusterMetrics};
pub use outliers::{detect_outliers_iqr, iqr_outlier_mask, DEFAULT_IQR_FACTOR};
pub use report::{export_cluster_report, render_cluster_report};
pub use seasonality::{analyze_seasonality, SeasonalityProfile};
pub use validation::{
    calinski_harabasz_score, davies_bouldin_score, silhouette_score,
    validate_clustering_stability, StabilityConfig, StabilityReport, ValidationOutcome,
};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, MetricsError>;
