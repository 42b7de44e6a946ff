//! Cluster insights and rule-based recommendations
//!
//! Recommendations come from a [`RecommendationPolicy`]: an ordered table of
//! `(cluster, condition, message)` rules. The policy is a set of business
//! heuristics, not a fitted model. Every rule whose cluster matches and whose
//! condition holds contributes its message, in table order.

use crate::data::{ClusterLabel, Entity, EntityTable};
use crate::error::MetricsError;
use crate::measure::Measure;
use crate::metrics::column;
use crate::stats;
use serde::{Deserialize, Serialize};

/// Number of entities listed in [`ClusterInsights::top_performers`].
pub const TOP_PERFORMERS: usize = 3;

/// Cluster-level mean a rule can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleMetric {
    Revenue,
    Transactions,
    Ticket,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleCondition {
    Always,
    Above { metric: RuleMetric, threshold: f64 },
    Below { metric: RuleMetric, threshold: f64 },
}

impl RuleCondition {
    fn holds(&self, means: &ClusterMeans) -> bool {
        match *self {
            Self::Always => true,
            Self::Above { metric, threshold } => means.get(metric) > threshold,
            Self::Below { metric, threshold } => means.get(metric) < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRule {
    pub cluster: ClusterLabel,
    pub condition: RuleCondition,
    pub message: String,
}

impl RecommendationRule {
    pub fn new(cluster: impl Into<ClusterLabel>, condition: RuleCondition, message: &str) -> Self {
        Self {
            cluster: cluster.into(),
            condition,
            message: message.to_string(),
        }
    }
}

/// Ordered recommendation rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecommendationPolicy {
    pub rules: Vec<RecommendationRule>,
}

impl Default for RecommendationPolicy {
    /// Heuristics of the PYME study for its three segments.
    fn default() -> Self {
        use RuleCondition::{Above, Always, Below};
        use RuleMetric::{Revenue, Ticket, Transactions};

        Self {
            rules: vec![
                RecommendationRule::new(
                    0,
                    Above {
                        metric: Transactions,
                        threshold: 30.0,
                    },
                    "Launch a top-tier VIP loyalty program",
                ),
                RecommendationRule::new(
                    0,
                    Above {
                        metric: Revenue,
                        threshold: 35_000.0,
                    },
                    "Consider geographic expansion",
                ),
                RecommendationRule::new(
                    1,
                    Above {
                        metric: Ticket,
                        threshold: 1_400.0,
                    },
                    "Focus on ultra-premium services",
                ),
                RecommendationRule::new(1, Always, "Develop high-value service bundles"),
                RecommendationRule::new(
                    2,
                    Below {
                        metric: Transactions,
                        threshold: 20.0,
                    },
                    "Run an intensive reactivation campaign",
                ),
                RecommendationRule::new(
                    2,
                    Below {
                        metric: Ticket,
                        threshold: 900.0,
                    },
                    "Introduce product bundling strategies",
                ),
            ],
        }
    }
}

impl RecommendationPolicy {
    pub fn new(rules: Vec<RecommendationRule>) -> Self {
        Self { rules }
    }

    /// Messages of every matching rule for `cluster`, in rule order.
    pub fn recommend(&self, cluster: &ClusterLabel, means: &ClusterMeans) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| &rule.cluster == cluster && rule.condition.holds(means))
            .map(|rule| rule.message.clone())
            .collect()
    }
}

/// Means of the attributes the recommendation rules look at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterMeans {
    pub revenue: f64,
    pub transactions: f64,
    pub ticket: f64,
}

impl ClusterMeans {
    fn of(members: &[&Entity]) -> Option<Self> {
        Some(Self {
            revenue: stats::mean(&column(members, |e| e.revenue))?,
            transactions: stats::mean(&column(members, |e| e.transactions))?,
            ticket: stats::mean(&column(members, |e| e.ticket))?,
        })
    }

    pub fn get(&self, metric: RuleMetric) -> f64 {
        match metric {
            RuleMetric::Revenue => self.revenue,
            RuleMetric::Transactions => self.transactions,
            RuleMetric::Ticket => self.ticket,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrowthPotential {
    High,
    Moderate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterInsights {
    pub cluster: ClusterLabel,
    /// Share of all table rows, in percent
    pub size_percentage: f64,
    /// Cluster mean as a percentage of the population mean; above 100 is above average
    pub revenue_vs_average: Measure,
    pub transactions_vs_average: Measure,
    pub ticket_vs_average: Measure,
    pub means: ClusterMeans,
    /// Highest-revenue members, descending; ties keep table order
    pub top_performers: Vec<Entity>,
    pub growth_potential: GrowthPotential,
    pub recommendations: Vec<String>,
}

/// Summarise `cluster` against the whole table and apply `policy`.
///
/// The population is every row of the table, labelled or not. Growth
/// potential is `High` when the cluster's revenue sample std exceeds the
/// population's; an undefined std (single member) never exceeds.
///
/// # Arguments
/// * `table` - Every business, labelled or not
/// * `cluster` - Label to summarise; must be present in `table`
/// * `policy` - Ordered recommendation rules
///
/// # Returns
/// * `ClusterInsights` with shares, ratios to average, top performers and
///   recommendations
pub fn generate_cluster_insights(
    table: &EntityTable,
    cluster: &ClusterLabel,
    policy: &RecommendationPolicy,
) -> crate::Result<ClusterInsights> {
    let members: Vec<&Entity> = table.cluster(cluster).collect();
    let unknown = || MetricsError::UnknownCluster {
        label: cluster.to_string(),
    };
    let means = ClusterMeans::of(&members).ok_or_else(unknown)?;

    let population: Vec<&Entity> = table.entities().iter().collect();
    let overall = ClusterMeans::of(&population).ok_or_else(unknown)?;

    let vs_average = |metric: RuleMetric| {
        Measure::ratio(means.get(metric), overall.get(metric), "population mean")
            .map(|ratio| ratio * 100.0)
    };

    let mut top_performers: Vec<&Entity> = members.clone();
    top_performers.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    top_performers.truncate(TOP_PERFORMERS);

    let cluster_std = stats::sample_std(&column(&members, |e| e.revenue));
    let population_std = stats::sample_std(&column(&population, |e| e.revenue));
    let growth_potential = match (cluster_std, population_std) {
        (Some(c), Some(p)) if c > p => GrowthPotential::High,
        _ => GrowthPotential::Moderate,
    };

    Ok(ClusterInsights {
        cluster: cluster.clone(),
        size_percentage: members.len() as f64 / table.len() as f64 * 100.0,
        revenue_vs_average: vs_average(RuleMetric::Revenue),
        transactions_vs_average: vs_average(RuleMetric::Transactions),
        ticket_vs_average: vs_average(RuleMetric::Ticket),
        means,
        top_performers: top_performers.into_iter().cloned().collect(),
        growth_potential,
        recommendations: policy.recommend(cluster, &means),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn study_table() -> EntityTable {
        EntityTable::from_entities(vec![
            Entity::new(0, 40_000.0, 35.0).with_ticket(1_100.0).with_id("a"),
            Entity::new(0, 38_000.0, 33.0).with_ticket(1_150.0).with_id("b"),
            Entity::new(1, 30_000.0, 18.0).with_ticket(1_600.0).with_id("c"),
            Entity::new(1, 32_000.0, 20.0).with_ticket(1_500.0).with_id("d"),
            Entity::new(2, 9_000.0, 12.0).with_ticket(750.0).with_id("e"),
            Entity::new(2, 11_000.0, 14.0).with_ticket(800.0).with_id("f"),
            Entity::new(2, 10_000.0, 25.0).with_ticket(950.0).with_id("g"),
            Entity::new(2, 12_000.0, 16.0).with_ticket(700.0).with_id("h"),
        ])
        .unwrap()
    }

    #[test]
    fn test_shares_and_ratios() {
        let table = study_table();
        let policy = RecommendationPolicy::default();
        let insights = generate_cluster_insights(&table, &ClusterLabel::Int(2), &policy).unwrap();

        assert_eq!(insights.size_percentage, 50.0);
        // cluster mean revenue 10_500 over population mean 22_750
        assert_close(
            insights.revenue_vs_average.value().unwrap(),
            10_500.0 / 22_750.0 * 100.0,
        );
        assert!(insights.ticket_vs_average.value().unwrap() < 100.0);
        assert_eq!(insights.growth_potential, GrowthPotential::Moderate);
    }

    #[test]
    fn test_top_performers_sorted_and_capped() {
        let table = study_table();
        let policy = RecommendationPolicy::default();
        let insights = generate_cluster_insights(&table, &ClusterLabel::Int(2), &policy).unwrap();

        let ids: Vec<_> = insights
            .top_performers
            .iter()
            .map(|e| e.id.as_deref().unwrap())
            .collect();
        assert_eq!(ids, vec!["h", "f", "g"]);
    }

    #[test]
    fn test_default_policy_messages() {
        let table = study_table();
        let policy = RecommendationPolicy::default();
        let recs = |label: i64| {
            generate_cluster_insights(&table, &ClusterLabel::Int(label), &policy)
                .unwrap()
                .recommendations
        };

        assert_eq!(
            recs(0),
            vec![
                "Launch a top-tier VIP loyalty program",
                "Consider geographic expansion"
            ]
        );
        assert_eq!(
            recs(1),
            vec![
                "Focus on ultra-premium services",
                "Develop high-value service bundles"
            ]
        );
        // mean transactions 16.75, mean ticket 800
        assert_eq!(
            recs(2),
            vec![
                "Run an intensive reactivation campaign",
                "Introduce product bundling strategies"
            ]
        );
    }

    #[test]
    fn test_thresholds_are_strict() {
        let policy = RecommendationPolicy::default();
        let means = ClusterMeans {
            revenue: 35_000.0,
            transactions: 30.0,
            ticket: 1_000.0,
        };
        assert!(policy.recommend(&ClusterLabel::Int(0), &means).is_empty());
        assert_eq!(
            policy.recommend(&ClusterLabel::Int(1), &means),
            vec!["Develop high-value service bundles"]
        );
        assert!(policy.recommend(&ClusterLabel::Int(9), &means).is_empty());
    }

    #[test]
    fn test_growth_potential_high() {
        let table = EntityTable::from_entities(vec![
            Entity::new(0, 100.0, 1.0),
            Entity::new(0, 10_000.0, 1.0),
            Entity::new(1, 5_000.0, 1.0),
            Entity::new(1, 5_100.0, 1.0),
            Entity::new(1, 4_900.0, 1.0),
        ])
        .unwrap();
        let policy = RecommendationPolicy::new(Vec::new());

        let spread = generate_cluster_insights(&table, &ClusterLabel::Int(0), &policy).unwrap();
        assert_eq!(spread.growth_potential, GrowthPotential::High);
        assert!(spread.recommendations.is_empty());

        let tight = generate_cluster_insights(&table, &ClusterLabel::Int(1), &policy).unwrap();
        assert_eq!(tight.growth_potential, GrowthPotential::Moderate);
    }

    #[test]
    fn test_single_member_cluster_growth_is_moderate() {
        let table = EntityTable::from_entities(vec![
            Entity::new(0, 1_000_000.0, 1.0),
            Entity::new(1, 10.0, 1.0),
            Entity::new(1, 20.0, 1.0),
        ])
        .unwrap();
        let policy = RecommendationPolicy::new(Vec::new());

        let insights = generate_cluster_insights(&table, &ClusterLabel::Int(0), &policy).unwrap();
        assert_eq!(insights.growth_potential, GrowthPotential::Moderate);
        assert_eq!(insights.top_performers.len(), 1);
    }

    #[test]
    fn test_unlabelled_rows_count_in_population() {
        let table = EntityTable::from_entities(vec![
            Entity::new(0, 100.0, 10.0),
            Entity::new(1, 300.0, 10.0),
            Entity::new(1, 500.0, 10.0),
            Entity::new(0, 1_100.0, 10.0).unlabeled(),
        ])
        .unwrap();
        let policy = RecommendationPolicy::new(Vec::new());

        let insights = generate_cluster_insights(&table, &ClusterLabel::Int(0), &policy).unwrap();
        assert_eq!(insights.size_percentage, 25.0);
        // population mean revenue is 500 over all four rows
        assert_close(insights.revenue_vs_average.value().unwrap(), 20.0);
        assert_close(insights.transactions_vs_average.value().unwrap(), 100.0);
    }

    #[test]
    fn test_unknown_cluster() {
        let result = generate_cluster_insights(
            &study_table(),
            &ClusterLabel::from("missing"),
            &RecommendationPolicy::default(),
        );
        assert!(matches!(result, Err(MetricsError::UnknownCluster { .. })));
    }

    #[test]
    fn test_zero_population_mean_is_undefined() {
        let table = EntityTable::from_entities(vec![
            Entity::new(0, 10.0, 0.0),
            Entity::new(1, 20.0, 0.0),
        ])
        .unwrap();
        let policy = RecommendationPolicy::default();
        let insights = generate_cluster_insights(&table, &ClusterLabel::Int(0), &policy).unwrap();
        assert!(!insights.transactions_vs_average.is_defined());
        assert!(insights.revenue_vs_average.is_defined());
    }

    #[test]
    fn test_policy_json_round_trip_shape() {
        let policy: RecommendationPolicy = serde_json::from_str(
            r#"[
                { "cluster": "vip", "condition": { "kind": "above", "metric": "revenue", "threshold": 10.0 }, "message": "upsell" },
                { "cluster": 3, "condition": { "kind": "always" }, "message": "call" }
            ]"#,
        )
        .unwrap();

        assert_eq!(policy.rules.len(), 2);
        assert_eq!(policy.rules[0].cluster, ClusterLabel::from("vip"));
        assert_eq!(
            policy.rules[0].condition,
            RuleCondition::Above {
                metric: RuleMetric::Revenue,
                threshold: 10.0
            }
        );
        assert_eq!(policy.rules[1].condition, RuleCondition::Always);
    }
}
