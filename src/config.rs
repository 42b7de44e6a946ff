//! Engine configuration: column names, cluster profiles and tuning knobs
//!
//! Every struct deserialises with `#[serde(default)]`, so a host only needs to
//! spell out the fields it wants to override.

use crate::data::ClusterLabel;
use crate::error::MetricsError;
use crate::insights::RecommendationPolicy;
use crate::outliers::DEFAULT_IQR_FACTOR;
use crate::validation::StabilityConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Names of the table columns the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    /// Optional entity identifier, carried into top-performer listings
    pub id: Option<String>,
    pub label: String,
    pub revenue: String,
    pub transactions: String,
    pub ticket: String,
    pub unique_products: String,
    pub activity_days: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: None,
            label: "cluster_kmedoids".to_string(),
            revenue: "ingresos_totales".to_string(),
            transactions: "numero_transacciones".to_string(),
            ticket: "ticket_promedio".to_string(),
            unique_products: "numero_productos_unicos".to_string(),
            activity_days: "periodo_actividad_dias".to_string(),
        }
    }
}

impl ColumnNames {
    /// The five numeric columns in feature-matrix order.
    pub fn numeric(&self) -> [&str; 5] {
        [
            self.revenue.as_str(),
            self.transactions.as_str(),
            self.ticket.as_str(),
            self.unique_products.as_str(),
            self.activity_days.as_str(),
        ]
    }
}

/// Display metadata and fixed report copy for one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub label: ClusterLabel,
    pub name: String,
    /// Hex colour used by dashboards, e.g. `#1f77b4`
    pub color: String,
    /// Growth targets as fractions, keyed by metric name
    #[serde(default)]
    pub targets: BTreeMap<String, f64>,
    /// Recommendation bullets printed in the exported report
    #[serde(default)]
    pub report_recommendations: Vec<String>,
}

impl ClusterProfile {
    fn new(
        label: i64,
        name: &str,
        color: &str,
        targets: &[(&str, f64)],
        report_recommendations: &[&str],
    ) -> Self {
        Self {
            label: ClusterLabel::Int(label),
            name: name.to_string(),
            color: color.to_string(),
            targets: targets
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            report_recommendations: report_recommendations
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// The three segments of the PYME study.
    pub fn study_defaults() -> Vec<Self> {
        vec![
            Self::new(
                0,
                "Transactional Leaders",
                "#1f77b4",
                &[
                    ("transactions_growth", 0.10),
                    ("revenue_growth", 0.15),
                    ("retention_rate", 0.95),
                ],
                &[
                    "Run multi-tier VIP programs",
                    "Develop cross-selling strategies",
                    "Consider strategic expansion",
                ],
            ),
            Self::new(
                1,
                "High-Value Premium",
                "#2ca02c",
                &[
                    ("ticket_growth", 0.12),
                    ("revenue_growth", 0.18),
                    ("retention_rate", 0.98),
                ],
                &[
                    "Differentiated premium services",
                    "Smart seasonal upselling",
                    "Value-based marketing",
                ],
            ),
            Self::new(
                2,
                "Moderate Emerging",
                "#ff7f0e",
                &[
                    ("transactions_growth", 0.28),
                    ("ticket_growth", 0.41),
                    ("retention_rate", 0.85),
                ],
                &[
                    "Average ticket optimisation",
                    "Purchase frequency growth",
                    "Mentoring programs",
                ],
            ),
        ]
    }
}

/// Top-level configuration handed to the engine by its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub columns: ColumnNames,
    /// IQR fence multiplier for outlier detection
    pub outlier_factor: f64,
    pub stability: StabilityConfig,
    pub clusters: Vec<ClusterProfile>,
    pub recommendations: RecommendationPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            outlier_factor: DEFAULT_IQR_FACTOR,
            stability: StabilityConfig::default(),
            clusters: ClusterProfile::study_defaults(),
            recommendations: RecommendationPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| MetricsError::InvalidConfig {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |reason: String| Err(MetricsError::InvalidConfig { reason });

        if !self.outlier_factor.is_finite() || self.outlier_factor < 0.0 {
            return invalid(format!(
                "outlier_factor must be a non-negative number, got {}",
                self.outlier_factor
            ));
        }

        self.stability.validate()?;

        let mut names = BTreeSet::new();
        let all_columns = std::iter::once(self.columns.label.as_str())
            .chain(self.columns.numeric())
            .chain(self.columns.id.as_deref());
        for name in all_columns {
            if name.is_empty() {
                return invalid("column names must not be empty".to_string());
            }
            if !names.insert(name) {
                return invalid(format!("column '{name}' is mapped more than once"));
            }
        }

        let mut labels = BTreeSet::new();
        for profile in &self.clusters {
            if !labels.insert(&profile.label) {
                return invalid(format!("duplicate cluster profile for {}", profile.label));
            }
        }

        Ok(())
    }

    pub fn profile(&self, label: &ClusterLabel) -> Option<&ClusterProfile> {
        self.clusters.iter().find(|p| &p.label == label)
    }
}
