//! Core data model shared by the scan stages.
//!
//! Raw and pivoted tables stay as polars `DataFrame`s; the types here are the
//! small, owned records that come out of the aggregation step.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Long-format column holding the scenario label.
pub const SCENARIO_COL: &str = "scenario";
/// Long-format column holding the observed value.
pub const VALUE_COL: &str = "value";
/// Scenario every comparison base is diffed against.
pub const ACTUAL: &str = "Actual";

/// Grouping label for the whole-timeframe total.
pub const OVERALL_LABEL: &str = "Overall";
/// Dimension label used for the Overall pseudo-group.
pub const OVERALL_DIMENSION: &str = "All";

/// Rolling analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    Wtd,
    Mtd,
    Qtd,
    Ytd,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::Wtd, Timeframe::Mtd, Timeframe::Qtd, Timeframe::Ytd];

    pub fn label(self) -> &'static str {
        match self {
            Timeframe::Wtd => "WTD",
            Timeframe::Mtd => "MTD",
            Timeframe::Qtd => "QTD",
            Timeframe::Ytd => "YTD",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One rolled-up group compared against one comparison base.
///
/// Only groups with a usable base (non-null, non-zero) and enough Actual
/// volume become an `AggregateRow`, so `variance_pct` is always defined here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateRow {
    pub timeframe: Timeframe,
    /// Human-readable grouping, e.g. "Country" or "Country+Product".
    pub grouping: String,
    /// Key values in grouping-key order. Empty for Overall.
    pub group_values: Vec<String>,
    /// Key values joined with `" | "`, or "All" for Overall.
    pub dimension: String,
    pub comparison_type: String,
    pub actual: f64,
    pub comparison: f64,
    pub variance_pct: f64,
    pub variance_abs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankDirection {
    High,
    Low,
}

impl RankDirection {
    pub fn label(self) -> &'static str {
        match self {
            RankDirection::High => "high",
            RankDirection::Low => "low",
        }
    }
}

/// An `AggregateRow` selected as an extreme within its grouping/base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    #[serde(flatten)]
    pub row: AggregateRow,
    pub direction: RankDirection,
    /// 1-based position within its direction.
    pub rank: usize,
}

impl AnomalyRecord {
    pub fn timeframe(&self) -> Timeframe {
        self.row.timeframe
    }
}

/// Anomalies for one timeframe across every grouping.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub timeframe: Timeframe,
    pub anomalies: Vec<AnomalyRecord>,
    /// Number of eligible aggregate rows the selector ranked.
    pub candidate_count: usize,
    pub warning: Option<String>,
}

impl ScanResult {
    pub fn empty(timeframe: Timeframe, warning: impl Into<String>) -> Self {
        Self {
            timeframe,
            anomalies: Vec::new(),
            candidate_count: 0,
            warning: Some(warning.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.warning.is_some()
    }
}

/// A non-fatal problem attached to one timeframe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeWarning {
    pub timeframe: Timeframe,
    pub message: String,
}

impl fmt::Display for TimeframeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.timeframe, self.message)
    }
}

/// Consolidated output of a multi-timeframe run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub scans: Vec<ScanResult>,
    pub warnings: Vec<TimeframeWarning>,
}

impl RunSummary {
    /// All anomalies in timeframe order, each timeframe in scan order.
    pub fn anomalies(&self) -> Vec<AnomalyRecord> {
        self.scans
            .iter()
            .flat_map(|s| s.anomalies.iter().cloned())
            .collect()
    }

    pub fn count_for(&self, timeframe: Timeframe) -> usize {
        self.scans
            .iter()
            .filter(|s| s.timeframe == timeframe)
            .map(|s| s.anomalies.len())
            .sum()
    }

    pub fn degraded_timeframes(&self) -> Vec<Timeframe> {
        let mut out: Vec<Timeframe> = self.warnings.iter().map(|w| w.timeframe).collect();
        out.sort();
        out.dedup();
        out
    }
}
