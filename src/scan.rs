//! Scan Orchestrator
//!
//! Drives pivot → aggregate → select for one timeframe, then consolidates
//! independent timeframe scans. A bad timeframe turns into a warning; it never
//! stops the others.

use crate::aggregate::{aggregate, Grouping};
use crate::config::ScanConfig;
use crate::error::{PulseError, Result};
use crate::extremes::select_extremes;
use crate::model::{AggregateRow, RunSummary, ScanResult, Timeframe, TimeframeWarning};
use crate::pivot::pivot_scenarios;
use itertools::Itertools;
use polars::prelude::DataFrame;
use tracing::{info, warn};

pub struct ScanOrchestrator {
    config: ScanConfig,
}

impl ScanOrchestrator {
    pub fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Overall, each dimension, then every unordered pair of dimensions.
    pub fn groupings(&self) -> Vec<Grouping> {
        let dims: Vec<&str> = self.config.pivot_dims.iter().map(String::as_str).collect();

        let mut out = vec![Grouping::overall()];
        out.extend(dims.iter().map(|d| Grouping::single(d)));
        out.extend(
            dims.iter()
                .tuple_combinations()
                .map(|(a, b)| Grouping::combined(&[*a, *b])),
        );
        out
    }

    /// Scan one timeframe. Never fails; problems come back as a warning on an
    /// empty result.
    pub fn scan_timeframe(&self, timeframe: Timeframe, raw: &DataFrame) -> ScanResult {
        if raw.height() == 0 {
            warn!("{}: empty dataset, skipping", timeframe);
            return ScanResult::empty(timeframe, "empty dataset");
        }

        match self.try_scan(timeframe, raw) {
            Ok(result) => result,
            Err(e) => {
                warn!("{}: scan failed: {}", timeframe, e);
                ScanResult::empty(timeframe, e.to_string())
            }
        }
    }

    fn try_scan(&self, timeframe: Timeframe, raw: &DataFrame) -> Result<ScanResult> {
        let pivot = pivot_scenarios(raw, &self.config.pivot_dims, &self.config.comparison_types)?;

        let mut candidates: Vec<AggregateRow> = Vec::new();
        for grouping in self.groupings() {
            let rows = aggregate(
                &pivot,
                &grouping,
                timeframe,
                &self.config.comparison_types,
                self.config.min_volume,
            )?;
            candidates.extend(rows);
        }

        let anomalies = select_extremes(&candidates, self.config.top_n);
        info!(
            "{}: {} candidates, {} anomalies flagged",
            timeframe,
            candidates.len(),
            anomalies.len()
        );

        Ok(ScanResult {
            timeframe,
            anomalies,
            candidate_count: candidates.len(),
            warning: None,
        })
    }

    /// Scan every loaded timeframe and consolidate.
    ///
    /// Fails only when no timeframe produced a usable table.
    pub fn scan_all(&self, mut inputs: Vec<(Timeframe, Result<DataFrame>)>) -> Result<RunSummary> {
        let mut scans = Vec::new();
        let mut warnings = Vec::new();

        inputs.sort_by_key(|(timeframe, _)| *timeframe);

        for (timeframe, loaded) in inputs {
            let scan = match loaded {
                Ok(df) => self.scan_timeframe(timeframe, &df),
                Err(e) => ScanResult::empty(timeframe, e.to_string()),
            };
            if let Some(message) = &scan.warning {
                warnings.push(TimeframeWarning {
                    timeframe,
                    message: message.clone(),
                });
            }
            scans.push(scan);
        }

        let usable = scans.iter().filter(|s| !s.is_degraded()).count();
        if usable == 0 {
            let detail = warnings.iter().map(|w| w.to_string()).join("; ");
            return Err(PulseError::NoData(if detail.is_empty() {
                "no timeframes configured".to_string()
            } else {
                detail
            }));
        }

        Ok(RunSummary { scans, warnings })
    }
}
