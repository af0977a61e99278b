//! Prompt text for the narrative call, plus the anomaly table shared with
//! the brief.

use crate::model::{AnomalyRecord, Timeframe};
use itertools::Itertools;

const TABLE_HEADER: &str =
    "| timeframe | grouping | dimension | base | direction | actual | comparison | variance_pct | variance_abs |";
const TABLE_RULE: &str = "|---|---|---|---|---|---|---|---|---|";

/// Markdown table, one line per anomaly, in the order given.
pub fn anomaly_table<'a>(anomalies: impl IntoIterator<Item = &'a AnomalyRecord>) -> String {
    let mut lines = vec![TABLE_HEADER.to_string(), TABLE_RULE.to_string()];
    lines.extend(anomalies.into_iter().map(|a| {
        format!(
            "| {} | {} | {} | {} | {} | {:.0} | {:.0} | {:.1} | {:.0} |",
            a.row.timeframe,
            a.row.grouping,
            a.row.dimension,
            a.row.comparison_type,
            a.direction.label(),
            a.row.actual,
            a.row.comparison,
            a.row.variance_pct,
            a.row.variance_abs
        )
    }));
    lines.join("\n")
}

pub fn build_prioritization_prompt(anomalies: &[AnomalyRecord]) -> String {
    let timeframes = anomalies
        .iter()
        .map(AnomalyRecord::timeframe)
        .unique()
        .sorted()
        .map(Timeframe::label)
        .join(", ");

    format!(
        r#"You are analyzing Gross New Subscriptions performance.

Below are {count} anomalies flagged across {timeframes}. Each grouping and comparison base contributes its largest wins (high) and largest losses (low) by variance percentage.

Your task:
1. Identify the top 3-5 STORIES that matter most to business stakeholders
2. For each story, explain what's happening, why it matters, likely cause, and next steps
3. Rank by importance (biggest needle-movers first)

CRITICAL: When citing specific numbers, ALWAYS include the timeframe (WTD, MTD, QTD, or YTD).
Example: "Web down 60% vs Forecast (MTD)"

ANOMALY DATA:
{table}

Format each priority like this:

## Priority N: [Story Title]

**What's happening:**
[Pattern description with timeframe labels]

**Business impact:**
[Why this matters, with numbers and timeframes]

**Likely cause:**
[Hypothesis in 1-2 sentences]

**Recommendation:**
[What to investigate in 1 sentence]

Keep each section tight and scannable."#,
        count = anomalies.len(),
        timeframes = if timeframes.is_empty() { "no timeframes".to_string() } else { timeframes },
        table = anomaly_table(anomalies),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregateRow, RankDirection};

    fn anomaly(timeframe: Timeframe, dimension: &str, pct: f64) -> AnomalyRecord {
        AnomalyRecord {
            row: AggregateRow {
                timeframe,
                grouping: "Channel".to_string(),
                group_values: vec![dimension.to_string()],
                dimension: dimension.to_string(),
                comparison_type: "Forecast".to_string(),
                actual: 4000.0,
                comparison: 10000.0,
                variance_pct: pct,
                variance_abs: -6000.0,
            },
            direction: RankDirection::Low,
            rank: 1,
        }
    }

    #[test]
    fn table_has_one_line_per_anomaly() {
        let anomalies = vec![anomaly(Timeframe::Mtd, "Web", -60.0), anomaly(Timeframe::Wtd, "Phone", -12.5)];
        let table = anomaly_table(&anomalies);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[2], "| MTD | Channel | Web | Forecast | low | 4000 | 10000 | -60.0 | -6000 |");
    }

    #[test]
    fn prompt_lists_timeframes_and_data() {
        let anomalies = vec![anomaly(Timeframe::Ytd, "Web", -60.0), anomaly(Timeframe::Wtd, "Web", -60.0)];
        let prompt = build_prioritization_prompt(&anomalies);
        assert!(prompt.contains("Below are 2 anomalies flagged across WTD, YTD."));
        assert!(prompt.contains("| YTD | Channel | Web |"));
        assert!(prompt.contains("ALWAYS include the timeframe"));
    }
}
