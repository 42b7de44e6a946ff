//! Integration tests for segmetrics

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use segmetrics::{
    analyze_seasonality, business_metrics, calculate_business_metrics,
    calculate_forecast_accuracy, detect_outliers_iqr, export_cluster_report,
    generate_cluster_insights, validate_clustering_stability, ClusterLabel, ColumnNames,
    EngineConfig, EntityTable, Measure, StabilityConfig, ValidationOutcome,
};
use tempfile::tempdir;

/// Synthetic PYME table with three well-separated segments
fn create_test_frame() -> DataFrame {
    let mut rng = StdRng::seed_from_u64(42);
    let mut labels = Vec::new();
    let mut revenue = Vec::new();
    let mut transactions = Vec::new();
    let mut ticket = Vec::new();
    let mut products = Vec::new();
    let mut days = Vec::new();

    for i in 0..90i64 {
        let cluster = i % 3;
        let (rev, tx, tk) = match cluster {
            0 => (40_000.0, 35.0, 1_100.0),
            1 => (30_000.0, 18.0, 1_600.0),
            _ => (10_000.0, 14.0, 800.0),
        };
        labels.push(cluster);
        revenue.push(rev * rng.gen_range(0.9..1.1));
        transactions.push(tx * rng.gen_range(0.9..1.1));
        ticket.push(tk * rng.gen_range(0.9..1.1));
        products.push(rng.gen_range(5.0..20.0));
        days.push(rng.gen_range(600.0..900.0));
    }

    df!(
        "cluster_kmedoids" => labels,
        "ingresos_totales" => revenue,
        "numero_transacciones" => transactions,
        "ticket_promedio" => ticket,
        "numero_productos_unicos" => products,
        "periodo_actividad_dias" => days
    )
    .unwrap()
}

#[test]
fn test_end_to_end_pipeline() {
    let config = EngineConfig::default();
    let df = create_test_frame();

    let table = EntityTable::from_dataframe(&df, &config.columns).unwrap();
    assert_eq!(table.len(), 90);

    // Business metrics
    let metrics = business_metrics(&table);
    assert_eq!(metrics.len(), 3);
    assert_eq!(metrics.values().map(|m| m.count).sum::<usize>(), 90);
    for m in metrics.values() {
        assert!(m.revenue_mean > 0.0);
        assert!(m.efficiency_ratio.is_defined());
        assert!(m.revenue_p25 <= m.revenue_median && m.revenue_median <= m.revenue_p75);
    }

    // Stability over the revenue / transactions / ticket features
    let features = segmetrics::feature_matrix(
        &df,
        &["ingresos_totales", "numero_transacciones", "ticket_promedio"],
    )
    .unwrap();
    let (_, labels) = table.feature_matrix();
    let report =
        validate_clustering_stability(features.view(), &labels, &config.stability).unwrap();
    assert_eq!(report.outcome(), ValidationOutcome::Complete);
    assert_eq!(report.silhouette.scores.len(), 10);
    assert_eq!(report.silhouette.std, Measure::Defined(0.0));
    assert!(report.silhouette.mean.value().unwrap() > 0.5);

    // Insights
    let insights = generate_cluster_insights(
        &table,
        &ClusterLabel::Int(0),
        &config.recommendations,
    )
    .unwrap();
    assert!((insights.size_percentage - 100.0 / 3.0).abs() < 1e-9);
    assert!(insights.revenue_vs_average.value().unwrap() > 100.0);
    assert_eq!(insights.top_performers.len(), 3);
    assert!(insights
        .recommendations
        .contains(&"Consider geographic expansion".to_string()));

    // Report
    let temp_dir = tempdir().unwrap();
    let output_path = temp_dir.path().join("cluster_report.html");
    export_cluster_report(&table, &metrics, &config.clusters, &output_path).unwrap();
    let html = std::fs::read_to_string(&output_path).unwrap();
    assert!(html.contains("Total businesses analysed: 90"));
    assert!(html.contains("Transactional Leaders"));
}

#[test]
fn test_calculate_business_metrics_from_frame() {
    let metrics =
        calculate_business_metrics(&create_test_frame(), &ColumnNames::default()).unwrap();
    assert_eq!(
        metrics.keys().cloned().collect::<Vec<_>>(),
        vec![ClusterLabel::Int(0), ClusterLabel::Int(1), ClusterLabel::Int(2)]
    );

    let columns = ColumnNames {
        label: "segment".to_string(),
        ..ColumnNames::default()
    };
    assert!(calculate_business_metrics(&create_test_frame(), &columns).is_err());
}

#[test]
fn test_outlier_injection() {
    let mut df = create_test_frame();
    let mut revenue: Vec<f64> = df
        .column("ingresos_totales")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    revenue[0] = 1_000_000.0;
    df.with_column(Series::new("ingresos_totales", revenue)).unwrap();

    let mask = detect_outliers_iqr(&df, "ingresos_totales", 1.5).unwrap();
    assert!(mask[0]);
    assert_eq!(mask.iter().filter(|f| **f).count(), 1);
}

#[test]
fn test_stability_with_subsampling() {
    let df = create_test_frame();
    let table = EntityTable::from_dataframe(&df, &ColumnNames::default()).unwrap();
    let (features, labels) = table.feature_matrix();

    let config = StabilityConfig {
        repetitions: 4,
        seed: 42,
        sample_size: Some(30),
    };
    let first = validate_clustering_stability(features.view(), &labels, &config).unwrap();
    let second = validate_clustering_stability(features.view(), &labels, &config).unwrap();

    assert_eq!(first.succeeded, 4);
    // same seeds, same subsamples
    assert_eq!(first.davies_bouldin.scores, second.davies_bouldin.scores);
    assert!(first.davies_bouldin.std.value().unwrap() >= 0.0);
}

#[test]
fn test_forecast_accuracy() {
    let actual = [100.0, f64::NAN, 120.0, 130.0, 140.0];
    let predicted = [98.0, 112.0, f64::NAN, 132.0, 138.0];

    let accuracy = calculate_forecast_accuracy(&actual, &predicted).unwrap();
    assert_eq!(accuracy.samples, 3);
    assert_eq!(accuracy.mae, 2.0);
    assert!(accuracy.mape.value().unwrap() > 0.0 && accuracy.mape.value().unwrap() < 100.0);
}

#[test]
fn test_seasonality_of_cluster_history() {
    let history: Vec<_> = (1..=12)
        .map(|month| {
            let date = chrono::NaiveDate::from_ymd_opt(2023, month, 1).unwrap();
            (date, if month == 11 { 500.0 } else { 200.0 })
        })
        .collect();

    let profile = analyze_seasonality(&history).unwrap();
    assert_eq!(profile.peak_month, 11);
    assert_eq!(profile.low_month, 1);
    assert!(profile.seasonality_strength.value().unwrap() > 1.0);
}
