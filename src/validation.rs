//! Internal validation indices and repeated stability validation
//!
//! The label assignment is fixed: these functions score an existing
//! clustering, they never re-run the clustering algorithm.

use crate::error::MetricsError;
use crate::measure::{Measure, Undefined};
use crate::stats;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings for [`validate_clustering_stability`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Number of repeated evaluations
    pub repetitions: usize,
    /// Base seed; repetition `i` uses `seed + i`
    pub seed: u64,
    /// Evaluate each repetition on a random subsample of this many rows.
    /// `None` scores the full matrix every time, making all repetitions equal.
    pub sample_size: Option<usize>,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            repetitions: 10,
            seed: 42,
            sample_size: None,
        }
    }
}

impl StabilityConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.repetitions == 0 {
            return Err(MetricsError::InvalidConfig {
                reason: "stability repetitions must be at least 1".to_string(),
            });
        }
        if self.sample_size == Some(0) {
            return Err(MetricsError::InvalidConfig {
                reason: "stability sample_size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Mean, spread and raw scores of one index across repetitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSummary {
    pub mean: Measure,
    /// Population standard deviation over successful repetitions
    pub std: Measure,
    /// Scores in repetition order, successful repetitions only
    pub scores: Vec<f64>,
}

impl IndexSummary {
    fn from_scores(scores: Vec<f64>) -> Self {
        let undefined = Measure::Undefined(Undefined::NoSuccessfulRepetitions);
        // Identical repetitions report the score itself with zero spread,
        // free of summation rounding.
        if let Some(&first) = scores.first() {
            if scores.iter().all(|&s| s == first) {
                return Self {
                    mean: Measure::Defined(first),
                    std: Measure::Defined(0.0),
                    scores,
                };
            }
        }
        Self {
            mean: stats::mean(&scores).map_or(undefined, Measure::Defined),
            std: stats::population_std(&scores).map_or(undefined, Measure::Defined),
            scores,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepetitionFailure {
    pub repetition: usize,
    pub seed: u64,
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationOutcome {
    Complete,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StabilityReport {
    pub requested: usize,
    pub succeeded: usize,
    pub silhouette: IndexSummary,
    pub davies_bouldin: IndexSummary,
    pub calinski_harabasz: IndexSummary,
    pub failures: Vec<RepetitionFailure>,
}

impl StabilityReport {
    pub fn outcome(&self) -> ValidationOutcome {
        match self.succeeded {
            0 => ValidationOutcome::Failed,
            n if n == self.requested => ValidationOutcome::Complete,
            _ => ValidationOutcome::Partial,
        }
    }
}

/// Score an existing label assignment repeatedly with all three indices.
///
/// A repetition whose index computation fails is logged, recorded in
/// [`StabilityReport::failures`] and skipped. Contract violations (row/label
/// count mismatch, empty matrix, non-finite features, invalid config) fail
/// immediately.
///
/// # Arguments
/// * `features` - One row per sample, every cell finite
/// * `labels` - Cluster label of each row
/// * `config` - Repetition count, base seed and optional subsample size
///
/// # Returns
/// * `StabilityReport` with per-index mean, population std and raw scores
pub fn validate_clustering_stability<L: Ord>(
    features: ArrayView2<f64>,
    labels: &[L],
    config: &StabilityConfig,
) -> crate::Result<StabilityReport> {
    config.validate()?;
    check_alignment(features, labels)?;

    let n_samples = features.nrows();
    let mut silhouette = Vec::with_capacity(config.repetitions);
    let mut davies_bouldin = Vec::with_capacity(config.repetitions);
    let mut calinski_harabasz = Vec::with_capacity(config.repetitions);
    let mut failures = Vec::new();

    for repetition in 0..config.repetitions {
        let seed = config.seed.wrapping_add(repetition as u64);

        let result = match config.sample_size {
            Some(size) if size < n_samples => {
                let (sub_features, sub_labels) = subsample(features, labels, size, seed);
                score_all(sub_features.view(), &sub_labels)
            }
            _ => score_all(features, labels),
        };

        match result {
            Ok((sil, db, ch)) => {
                silhouette.push(sil);
                davies_bouldin.push(db);
                calinski_harabasz.push(ch);
            }
            Err(e) => {
                tracing::warn!(repetition, seed, error = %e, "stability repetition failed");
                failures.push(RepetitionFailure {
                    repetition,
                    seed,
                    error: e.to_string(),
                });
            }
        }
    }

    let report = StabilityReport {
        requested: config.repetitions,
        succeeded: silhouette.len(),
        silhouette: IndexSummary::from_scores(silhouette),
        davies_bouldin: IndexSummary::from_scores(davies_bouldin),
        calinski_harabasz: IndexSummary::from_scores(calinski_harabasz),
        failures,
    };

    tracing::debug!(
        requested = report.requested,
        succeeded = report.succeeded,
        "stability validation finished"
    );
    Ok(report)
}

fn score_all<L: Ord>(features: ArrayView2<f64>, labels: &[L]) -> crate::Result<(f64, f64, f64)> {
    let assignment = Assignment::new(features, labels)?;
    Ok((
        assignment.silhouette(features),
        assignment.davies_bouldin(features),
        assignment.calinski_harabasz(features),
    ))
}

fn subsample<'a, L>(
    features: ArrayView2<f64>,
    labels: &'a [L],
    size: usize,
    seed: u64,
) -> (Array2<f64>, Vec<&'a L>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, features.nrows(), size).into_vec();
    indices.sort_unstable();
    let sub_labels = indices.iter().map(|&i| &labels[i]).collect();
    (features.select(Axis(0), &indices), sub_labels)
}

/// Mean silhouette coefficient over all samples, in `[-1, 1]`; higher is better.
///
/// Members of singleton clusters contribute 0.
pub fn silhouette_score<L: Ord>(features: ArrayView2<f64>, labels: &[L]) -> crate::Result<f64> {
    Ok(Assignment::new(features, labels)?.silhouette(features))
}

/// Davies–Bouldin index, `>= 0`; lower is better.
pub fn davies_bouldin_score<L: Ord>(features: ArrayView2<f64>, labels: &[L]) -> crate::Result<f64> {
    Ok(Assignment::new(features, labels)?.davies_bouldin(features))
}

/// Calinski–Harabasz variance ratio; higher is better.
pub fn calinski_harabasz_score<L: Ord>(
    features: ArrayView2<f64>,
    labels: &[L],
) -> crate::Result<f64> {
    Ok(Assignment::new(features, labels)?.calinski_harabasz(features))
}

fn check_alignment<L>(features: ArrayView2<f64>, labels: &[L]) -> crate::Result<()> {
    if features.nrows() != labels.len() {
        return Err(MetricsError::LengthMismatch {
            left_name: "feature rows",
            right_name: "labels",
            left: features.nrows(),
            right: labels.len(),
        });
    }
    if features.nrows() == 0 {
        return Err(MetricsError::EmptyInput {
            what: "feature matrix",
        });
    }
    for (row, values) in features.outer_iter().enumerate() {
        if let Some(v) = values.iter().find(|v| !v.is_finite()) {
            return Err(MetricsError::invalid_value(
                "features",
                row,
                format!("expected a finite number, got {v}"),
            ));
        }
    }
    Ok(())
}

/// Labels encoded as dense cluster indices `0..n_clusters`.
struct Assignment {
    clusters: Vec<usize>,
    sizes: Vec<usize>,
}

impl Assignment {
    fn new<L: Ord>(features: ArrayView2<f64>, labels: &[L]) -> crate::Result<Self> {
        check_alignment(features, labels)?;

        let mut index: BTreeMap<&L, usize> = BTreeMap::new();
        for label in labels {
            let next = index.len();
            index.entry(label).or_insert(next);
        }
        let clusters: Vec<usize> = labels.iter().map(|l| index[l]).collect();

        let n_clusters = index.len();
        let n_samples = labels.len();
        if n_clusters < 2 || n_clusters >= n_samples {
            return Err(MetricsError::InvalidClusterCount {
                clusters: n_clusters,
                samples: n_samples,
            });
        }

        let mut sizes = vec![0; n_clusters];
        for &c in &clusters {
            sizes[c] += 1;
        }
        Ok(Self { clusters, sizes })
    }

    fn n_clusters(&self) -> usize {
        self.sizes.len()
    }

    fn centroids(&self, features: ArrayView2<f64>) -> Array2<f64> {
        let mut centroids = Array2::zeros((self.n_clusters(), features.ncols()));
        for (row, &c) in features.outer_iter().zip(&self.clusters) {
            let mut centroid = centroids.row_mut(c);
            centroid += &row;
        }
        for (mut centroid, &size) in centroids.outer_iter_mut().zip(&self.sizes) {
            centroid /= size as f64;
        }
        centroids
    }

    fn silhouette(&self, features: ArrayView2<f64>) -> f64 {
        let n_samples = features.nrows();
        let mut total = 0.0;

        for i in 0..n_samples {
            let own = self.clusters[i];
            if self.sizes[own] == 1 {
                continue;
            }

            let mut distance_sums = vec![0.0; self.n_clusters()];
            let point = features.row(i);
            for j in 0..n_samples {
                if i != j {
                    distance_sums[self.clusters[j]] += euclidean_distance(&point, &features.row(j));
                }
            }

            let a = distance_sums[own] / (self.sizes[own] - 1) as f64;
            let b = distance_sums
                .iter()
                .zip(&self.sizes)
                .enumerate()
                .filter(|&(c, _)| c != own)
                .map(|(_, (sum, &size))| sum / size as f64)
                .fold(f64::INFINITY, f64::min);

            let scale = a.max(b);
            if scale > 0.0 {
                total += (b - a) / scale;
            }
        }

        total / n_samples as f64
    }

    fn davies_bouldin(&self, features: ArrayView2<f64>) -> f64 {
        let centroids = self.centroids(features);
        let k = self.n_clusters();

        let mut scatter = vec![0.0; k];
        for (row, &c) in features.outer_iter().zip(&self.clusters) {
            scatter[c] += euclidean_distance(&row, &centroids.row(c));
        }
        for (s, &size) in scatter.iter_mut().zip(&self.sizes) {
            *s /= size as f64;
        }

        let mut separation = Array2::zeros((k, k));
        for i in 0..k {
            for j in 0..k {
                separation[[i, j]] = euclidean_distance(&centroids.row(i), &centroids.row(j));
            }
        }

        if all_near_zero(scatter.iter()) || all_near_zero(separation.iter()) {
            return 0.0;
        }

        let worst_ratio_sum: f64 = (0..k)
            .map(|i| {
                (0..k)
                    .filter(|&j| j != i && separation[[i, j]] > 0.0)
                    .map(|j| (scatter[i] + scatter[j]) / separation[[i, j]])
                    .fold(0.0, f64::max)
            })
            .sum();

        worst_ratio_sum / k as f64
    }

    fn calinski_harabasz(&self, features: ArrayView2<f64>) -> f64 {
        let n_samples = features.nrows() as f64;
        let k = self.n_clusters() as f64;
        let centroids = self.centroids(features);
        let overall = features.mean_axis(Axis(0)).unwrap_or_else(|| centroids.row(0).to_owned());

        let between: f64 = centroids
            .outer_iter()
            .zip(&self.sizes)
            .map(|(centroid, &size)| size as f64 * squared_distance(&centroid, &overall.view()))
            .sum();

        let within: f64 = features
            .outer_iter()
            .zip(&self.clusters)
            .map(|(row, &c)| squared_distance(&row, &centroids.row(c)))
            .sum();

        if within == 0.0 {
            1.0
        } else {
            between * (n_samples - k) / (within * (k - 1.0))
        }
    }
}

fn all_near_zero<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.abs() <= 1e-8)
}

fn squared_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    point1
        .iter()
        .zip(point2.iter())
        .map(|(a, b)| (a - b).powi(2))
        .sum()
}

/// Calculate Euclidean distance between two points
fn euclidean_distance(point1: &ArrayView1<f64>, point2: &ArrayView1<f64>) -> f64 {
    squared_distance(point1, point2).sqrt()
}
