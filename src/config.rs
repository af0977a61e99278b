//! Run configuration.
//!
//! Everything is an explicit value passed into the scan and the narrative
//! client; nothing here is process-global. A JSON file may override any
//! subset of fields, the rest fall back to the defaults below.

use crate::error::{PulseError, Result};
use crate::model::{Timeframe, ACTUAL};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parameters of the anomaly scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Extremes kept per grouping, comparison base and direction.
    pub top_n: usize,
    /// Scenario labels diffed against Actual, in report order.
    pub comparison_types: Vec<String>,
    /// Dimension columns, in drill-down order.
    pub pivot_dims: Vec<String>,
    /// Groups whose Actual is below this are never ranked.
    pub min_volume: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            top_n: 3,
            comparison_types: vec!["Forecast".to_string(), "PriorYear".to_string()],
            pivot_dims: vec!["country".to_string(), "product".to_string(), "channel".to_string()],
            min_volume: 2000.0,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_n == 0 {
            return Err(PulseError::Config("top_n must be at least 1".to_string()));
        }
        if self.comparison_types.is_empty() {
            return Err(PulseError::Config("comparison_types must not be empty".to_string()));
        }
        if self.comparison_types.iter().any(|c| c == ACTUAL) {
            return Err(PulseError::Config(format!(
                "comparison_types must not contain '{}'",
                ACTUAL
            )));
        }
        let mut seen = HashSet::new();
        for base in &self.comparison_types {
            if !seen.insert(base.as_str()) {
                return Err(PulseError::Config(format!("duplicate comparison type: {}", base)));
            }
        }
        if self.pivot_dims.is_empty() {
            return Err(PulseError::Config("pivot_dims must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for dim in &self.pivot_dims {
            if !seen.insert(dim.as_str()) {
                return Err(PulseError::Config(format!("duplicate pivot dimension: {}", dim)));
            }
        }
        if !self.min_volume.is_finite() || self.min_volume < 0.0 {
            return Err(PulseError::Config(format!(
                "min_volume must be a finite, non-negative number (got {})",
                self.min_volume
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: usize,
    pub base_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1500,
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

/// Pass-through parameters for the narrative model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub base_url: String,
    pub system_prompt: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5".to_string(),
            temperature: 0.2,
            max_tokens: 4000,
            base_url: "https://api.anthropic.com".to_string(),
            system_prompt: "You are a data analyst helping interpret subscription metrics. \
                            Be concise and actionable."
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub scan: ScanConfig,
    pub retry: RetrySettings,
    pub llm: LlmSettings,
    /// Input file per timeframe, relative to the data directory.
    pub files: BTreeMap<Timeframe, PathBuf>,
}

impl Default for PulseConfig {
    fn default() -> Self {
        let files = Timeframe::ALL
            .iter()
            .map(|tf| (*tf, PathBuf::from(format!("gns_{}.csv", tf.label().to_lowercase()))))
            .collect();
        Self {
            scan: ScanConfig::default(),
            retry: RetrySettings::default(),
            llm: LlmSettings::default(),
            files,
        }
    }
}

impl PulseConfig {
    /// Load a JSON config file; absent fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| PulseError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: PulseConfig = serde_json::from_str(&content)
            .map_err(|e| PulseError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.scan.validate()?;
        if self.retry.max_retries == 0 {
            return Err(PulseError::Config("retry.max_retries must be at least 1".to_string()));
        }
        if self.llm.model.trim().is_empty() {
            return Err(PulseError::Config("llm.model must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PulseConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scan.top_n, 3);
        assert_eq!(config.scan.min_volume, 2000.0);
        assert_eq!(config.files[&Timeframe::Qtd], PathBuf::from("gns_qtd.csv"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: PulseConfig =
            serde_json::from_str(r#"{"scan": {"top_n": 5}, "files": {"WTD": "week.csv"}}"#).unwrap();
        assert_eq!(config.scan.top_n, 5);
        assert_eq!(config.scan.comparison_types, vec!["Forecast", "PriorYear"]);
        assert_eq!(config.files.len(), 1);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn rejects_bad_scan_settings() {
        let mut scan = ScanConfig::default();
        scan.top_n = 0;
        assert!(matches!(scan.validate(), Err(PulseError::Config(_))));

        let mut scan = ScanConfig::default();
        scan.pivot_dims.push("country".to_string());
        assert!(scan.validate().is_err());

        let mut scan = ScanConfig::default();
        scan.comparison_types = vec![ACTUAL.to_string()];
        assert!(scan.validate().is_err());
    }

    #[test]
    fn rejects_repeated_comparison_type() {
        let mut scan = ScanConfig::default();
        scan.comparison_types = vec!["Forecast".to_string(), "Forecast".to_string()];
        match scan.validate() {
            Err(PulseError::Config(msg)) => assert!(msg.contains("duplicate comparison type: Forecast")),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
