//! Daily brief text report.

use crate::model::{AnomalyRecord, RunSummary, Timeframe};
use crate::prompt::anomaly_table;
use chrono::{DateTime, TimeZone};
use itertools::Itertools;
use std::cmp::Ordering;
use std::fmt::Display;

const RAW_SUMMARY_ROWS: usize = 5;

pub fn generate_daily_brief<Tz>(summary: &RunSummary, narrative: &str, generated_at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let anomalies = summary.anomalies();
    let mut out = String::new();

    out.push_str("# Gross New Subscriptions - Daily Intelligence Brief\n");
    out.push_str(&format!(
        "*Generated: {}*\n\n---\n\n",
        generated_at.format("%B %d, %Y at %I:%M %p")
    ));

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!(
        "Automated analysis of {} performance anomalies across {} timeframes.\n\n",
        anomalies.len(),
        Timeframe::ALL.iter().map(|tf| tf.label()).join(", ")
    ));
    out.push_str("**Anomalies Analyzed:**\n");
    for timeframe in Timeframe::ALL {
        out.push_str(&format!("- {}: {} items\n", timeframe, summary.count_for(timeframe)));
    }

    if !summary.warnings.is_empty() {
        out.push_str("\n**Degraded timeframes:**\n");
        for warning in &summary.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }

    out.push_str("\n---\n\n");
    out.push_str(narrative.trim());
    out.push_str("\n\n---\n\n## Raw Data Summary\n\n");

    out.push_str("**Top 5 Largest Positive Variances:**\n");
    out.push_str(&section_table(largest(&anomalies, Ordering::Greater)));
    out.push_str("\n\n**Top 5 Largest Negative Variances:**\n");
    out.push_str(&section_table(largest(&anomalies, Ordering::Less)));

    out.push_str(
        "\n\n---\n\n## Next Steps\n\n\
         1. Review priority stories and validate hypotheses\n\
         2. Drill into dimensional breakdowns for root cause analysis\n\
         3. Coordinate with channel/product owners on corrective actions\n\
         4. Monitor WTD trends for early warning signals\n",
    );
    out
}

/// Up to five distinct anomalies on one side of zero, largest `variance_abs`
/// magnitude first.
fn largest(anomalies: &[AnomalyRecord], sign: Ordering) -> Vec<&AnomalyRecord> {
    anomalies
        .iter()
        .filter(|a| a.row.variance_abs.partial_cmp(&0.0) == Some(sign))
        .unique_by(|a| {
            (
                a.row.timeframe,
                a.row.grouping.clone(),
                a.row.dimension.clone(),
                a.row.comparison_type.clone(),
            )
        })
        .sorted_by(|a, b| {
            b.row
                .variance_abs
                .abs()
                .partial_cmp(&a.row.variance_abs.abs())
                .unwrap_or(Ordering::Equal)
        })
        .take(RAW_SUMMARY_ROWS)
        .collect()
}

fn section_table(rows: Vec<&AnomalyRecord>) -> String {
    if rows.is_empty() {
        "(none)".to_string()
    } else {
        anomaly_table(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregateRow, RankDirection, ScanResult, TimeframeWarning};
    use chrono::Utc;

    fn anomaly(timeframe: Timeframe, dimension: &str, abs: f64, direction: RankDirection) -> AnomalyRecord {
        AnomalyRecord {
            row: AggregateRow {
                timeframe,
                grouping: "Country".to_string(),
                group_values: vec![dimension.to_string()],
                dimension: dimension.to_string(),
                comparison_type: "Forecast".to_string(),
                actual: 10000.0 + abs,
                comparison: 10000.0,
                variance_pct: abs / 100.0,
                variance_abs: abs,
            },
            direction,
            rank: 1,
        }
    }

    fn summary() -> RunSummary {
        let mut anomalies: Vec<AnomalyRecord> = (1..=7)
            .map(|i| anomaly(Timeframe::Mtd, &format!("C{}", i), i as f64 * 100.0, RankDirection::High))
            .collect();
        anomalies.push(anomaly(Timeframe::Mtd, "US", -900.0, RankDirection::Low));
        // Same group picked in both directions only shows once.
        anomalies.push(anomaly(Timeframe::Mtd, "US", -900.0, RankDirection::High));

        RunSummary {
            scans: vec![
                ScanResult::empty(Timeframe::Wtd, "File not found: gns_wtd.csv"),
                ScanResult {
                    timeframe: Timeframe::Mtd,
                    anomalies,
                    candidate_count: 8,
                    warning: None,
                },
            ],
            warnings: vec![TimeframeWarning {
                timeframe: Timeframe::Wtd,
                message: "File not found: gns_wtd.csv".to_string(),
            }],
        }
    }

    #[test]
    fn brief_has_counts_narrative_and_raw_tables() {
        let generated_at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap();
        let brief = generate_daily_brief(&summary(), "## Priority 1: Canada slump\n", &generated_at);

        assert!(brief.contains("*Generated: March 05, 2024 at 02:30 PM*"));
        assert!(brief.contains("- WTD: 0 items"));
        assert!(brief.contains("- MTD: 9 items"));
        assert!(brief.contains("- WTD: File not found: gns_wtd.csv"));
        assert!(brief.contains("## Priority 1: Canada slump"));
        assert!(brief.contains("## Next Steps"));
    }

    #[test]
    fn raw_summary_takes_five_per_side_by_magnitude() {
        let summary = summary();
        let anomalies = summary.anomalies();

        let positive: Vec<&str> = largest(&anomalies, Ordering::Greater)
            .into_iter()
            .map(|a| a.row.dimension.as_str())
            .collect();
        assert_eq!(positive, vec!["C7", "C6", "C5", "C4", "C3"]);

        let negative = largest(&anomalies, Ordering::Less);
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].row.dimension, "US");
    }
}
