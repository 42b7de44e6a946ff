//! HTML report export for cluster summaries

use crate::config::ClusterProfile;
use crate::data::{ClusterLabel, EntityTable};
use crate::measure::Measure;
use crate::metrics::ClusterMetrics;
use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use std::collections::BTreeMap;
use std::path::Path;

const STYLE: &str = "\
body { font-family: Arial, sans-serif; margin: 40px; }
.header { background-color: #f0f0f0; padding: 20px; border-radius: 5px; }
.cluster-section { margin: 20px 0; padding: 15px; border-left: 4px solid #007acc; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background-color: #f2f2f2; }";

const METRIC_COLUMNS: [&str; 14] = [
    "Cluster",
    "Count",
    "Revenue mean",
    "Revenue std",
    "Revenue median",
    "Revenue p25",
    "Revenue p75",
    "Transactions",
    "Ticket",
    "Products",
    "Activity days",
    "Revenue / day",
    "Efficiency",
    "Diversity",
];

/// Render the cluster report as a standalone HTML document.
///
/// `profiles` supplies the display name, colour and fixed recommendation
/// bullets per cluster; clusters without a profile are listed by label only.
pub fn render_cluster_report(
    table: &EntityTable,
    metrics: &BTreeMap<ClusterLabel, ClusterMetrics>,
    profiles: &[ClusterProfile],
    generated_at: NaiveDateTime,
) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<title>Clustering Report - PYMEs</title>\n");
    html.push_str(&format!("<style>\n{STYLE}\n</style>\n"));
    html.push_str("</head>\n<body>\n");

    html.push_str("<div class=\"header\">\n");
    html.push_str("<h1>Clustering Analysis Report - PYMEs</h1>\n");
    html.push_str(&format!(
        "<p>Generated on: {}</p>\n",
        generated_at.format("%d/%m/%Y %H:%M")
    ));
    html.push_str("</div>\n");

    html.push_str("<h2>Executive Summary</h2>\n");
    html.push_str(&format!("<p>Total businesses analysed: {}</p>\n", table.len()));
    html.push_str(&format!("<p>Clusters identified: {}</p>\n", metrics.len()));

    html.push_str("<h2>Metrics by Cluster</h2>\n");
    html.push_str(&metrics_table(metrics));

    html.push_str("<h2>Key Recommendations</h2>\n");
    for profile in profiles {
        html.push_str(&profile_section(profile));
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn metrics_table(metrics: &BTreeMap<ClusterLabel, ClusterMetrics>) -> String {
    let header: String = METRIC_COLUMNS
        .iter()
        .map(|column| format!("<th>{column}</th>"))
        .collect();
    let mut rows = format!("<table>\n<tr>{header}</tr>\n");

    for (label, m) in metrics {
        let mut cells = vec![escape(&label.to_string()), m.count.to_string()];
        cells.push(number(m.revenue_mean));
        cells.push(measure_cell(m.revenue_std));
        cells.extend(
            [
                m.revenue_median,
                m.revenue_p25,
                m.revenue_p75,
                m.transactions_mean,
                m.ticket_mean,
                m.products_mean,
                m.activity_days_mean,
            ]
            .into_iter()
            .map(number),
        );
        cells.extend(
            [m.revenue_per_day, m.efficiency_ratio, m.product_diversity]
                .into_iter()
                .map(measure_cell),
        );

        let cells: String = cells
            .iter()
            .map(|cell| format!("<td>{cell}</td>"))
            .collect();
        rows.push_str(&format!("<tr>{cells}</tr>\n"));
    }

    rows.push_str("</table>\n");
    rows
}

fn profile_section(profile: &ClusterProfile) -> String {
    let items: String = profile
        .report_recommendations
        .iter()
        .map(|item| format!("<li>{}</li>\n", escape(item)))
        .collect();
    format!(
        "<div class=\"cluster-section\" style=\"border-left-color: {}\">\n\
         <h3>Cluster {}: {}</h3>\n<ul>\n{items}</ul>\n</div>\n",
        escape(&profile.color),
        escape(&profile.label.to_string()),
        escape(&profile.name),
    )
}

/// Render the report with the current local time and write it to `output_path`.
pub fn export_cluster_report(
    table: &EntityTable,
    metrics: &BTreeMap<ClusterLabel, ClusterMetrics>,
    profiles: &[ClusterProfile],
    output_path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let output_path = output_path.as_ref();
    let html = render_cluster_report(table, metrics, profiles, Local::now().naive_local());
    std::fs::write(output_path, html)
        .with_context(|| format!("failed to write cluster report to {}", output_path.display()))?;

    tracing::info!(
        path = %output_path.display(),
        clusters = metrics.len(),
        "cluster report exported"
    );
    Ok(())
}

fn number(value: f64) -> String {
    if value.is_finite() {
        format!("{value:.2}")
    } else {
        "n/a".to_string()
    }
}

fn measure_cell(measure: Measure) -> String {
    match measure {
        Measure::Defined(v) => number(v),
        Measure::Undefined(reason) => {
            format!("<span title=\"{}\">n/a</span>", escape(&reason.to_string()))
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Entity;
    use crate::metrics::business_metrics;
    use chrono::NaiveDate;
    use std::path::Path;
    use tempfile::tempdir;

    fn create_test_data() -> (EntityTable, BTreeMap<ClusterLabel, ClusterMetrics>) {
        let table = EntityTable::from_entities(vec![
            Entity::new(0, 40_000.0, 35.0).with_activity_days(700.0),
            Entity::new(0, 38_000.0, 33.0).with_activity_days(650.0),
            Entity::new(1, 30_000.0, 18.0).with_activity_days(0.0),
        ])
        .unwrap();
        let metrics = business_metrics(&table);
        (table, metrics)
    }

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 0)
            .unwrap()
    }

    #[test]
    fn test_render_cluster_report() {
        let (table, metrics) = create_test_data();
        let html = render_cluster_report(
            &table,
            &metrics,
            &ClusterProfile::study_defaults(),
            generated_at(),
        );

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Generated on: 05/03/2024 14:07"));
        assert!(html.contains("Total businesses analysed: 3"));
        assert!(html.contains("Clusters identified: 2"));
        assert!(html.contains("<td>39000.00</td>"));
        assert!(html.contains("Cluster 1: High-Value Premium"));
        assert!(html.contains("<li>Mentoring programs</li>"));
        // cluster 1 has zero activity days, so revenue / day is undefined
        assert!(html.contains("<span title=\"mean activity days is zero\">n/a</span>"));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[test]
    fn test_undefined_std_carries_reason() {
        let (table, metrics) = create_test_data();
        let html = render_cluster_report(&table, &metrics, &[], generated_at());

        // cluster 1 has a single member, so its revenue std is undefined
        let row = html
            .lines()
            .find(|line| line.starts_with("<tr><td>1</td>"))
            .unwrap();
        assert!(row.contains("<td><span title=\"needs 2 samples, got 1\">n/a</span></td>"));
        assert!(!row.contains("<td>n/a</td>"));
    }

    #[test]
    fn test_render_escapes_profile_text() {
        let (table, metrics) = create_test_data();
        let profiles = vec![ClusterProfile {
            label: ClusterLabel::from("<b>"),
            name: "R&D \"labs\"".to_string(),
            color: "#123456".to_string(),
            targets: BTreeMap::new(),
            report_recommendations: vec!["<script>".to_string()],
        }];

        let html = render_cluster_report(&table, &metrics, &profiles, generated_at());
        assert!(html.contains("Cluster &lt;b&gt;: R&amp;D &quot;labs&quot;"));
        assert!(html.contains("<li>&lt;script&gt;</li>"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_export_cluster_report() {
        let (table, metrics) = create_test_data();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("cluster_report.html");

        let result = export_cluster_report(
            &table,
            &metrics,
            &ClusterProfile::study_defaults(),
            &output_path,
        );
        assert!(result.is_ok());
        assert!(Path::new(&output_path).exists());

        let written = std::fs::read_to_string(&output_path).unwrap();
        assert!(written.contains("Metrics by Cluster"));
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let (table, metrics) = create_test_data();
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("missing").join("report.html");

        let err = export_cluster_report(&table, &metrics, &[], &output_path).unwrap_err();
        assert!(err.to_string().contains("failed to write cluster report"));
    }
}
