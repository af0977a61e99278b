//! Timeframe CSV loading.
//!
//! Each timeframe is one headered CSV in long format. Dimension columns are
//! stored categorical to keep the raw table small; the pivot converts them
//! back to plain strings.

use crate::config::PulseConfig;
use crate::data_utils::ensure_columns;
use crate::error::{PulseError, Result};
use crate::model::{Timeframe, SCENARIO_COL, VALUE_COL};
use polars::prelude::*;
use std::path::Path;
use tracing::{info, warn};

/// Scenario spellings seen in exports, mapped to the canonical label.
const SCENARIO_ALIASES: &[(&str, &str)] = &[
    ("PY", "PriorYear"),
    ("Prior Year", "PriorYear"),
    ("prior_year", "PriorYear"),
    ("FCST", "Forecast"),
    ("ACT", "Actual"),
];

/// Load one timeframe file.
pub fn load_timeframe(path: &Path, dims: &[String]) -> Result<DataFrame> {
    if !path.exists() {
        return Err(PulseError::Input(format!("File not found: {}", path.display())));
    }
    let size = std::fs::metadata(path)?.len();
    if size == 0 {
        return Err(PulseError::EmptyDataset(format!("{} is empty", path.display())));
    }

    // Read every column as text; typing happens below, after the headers are
    // normalized, so a late non-numeric code cannot fail the whole file.
    let mut df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
        .map_err(|e| PulseError::Input(format!("Failed to read CSV {}: {}", path.display(), e)))?
        .collect()
        .map_err(|e| PulseError::Input(format!("Failed to load CSV {}: {}", path.display(), e)))?;

    let normalized: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| normalize_header_name(name))
        .collect();
    df.set_column_names(&normalized)?;

    let mut required: Vec<&str> = vec![SCENARIO_COL, VALUE_COL];
    required.extend(dims.iter().map(String::as_str));
    ensure_columns(&df, &required)?;

    let mut casts: Vec<Expr> = dims
        .iter()
        .map(|d| {
            col(d)
                .cast(DataType::String)
                .cast(DataType::Categorical(None, CategoricalOrdering::Physical))
        })
        .collect();
    casts.push(canonical_scenario());
    casts.push(col(VALUE_COL).cast(DataType::Float64));

    let df = df.lazy().with_columns(casts).collect()?;
    info!("Loaded {} rows from {}", df.height(), path.display());
    Ok(df)
}

/// Load every configured timeframe, keeping failures per timeframe.
pub fn load_all(data_dir: &Path, config: &PulseConfig) -> Vec<(Timeframe, Result<DataFrame>)> {
    config
        .files
        .iter()
        .map(|(timeframe, file)| {
            let path = data_dir.join(file);
            let loaded = load_timeframe(&path, &config.scan.pivot_dims);
            if let Err(e) = &loaded {
                warn!("{}: {}", timeframe, e);
            }
            (*timeframe, loaded)
        })
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

fn canonical_scenario() -> Expr {
    let raw = || col(SCENARIO_COL).cast(DataType::String);
    let mut expr = raw();
    for (alias, canonical) in SCENARIO_ALIASES {
        expr = when(raw().eq(lit(*alias)))
            .then(lit(*canonical))
            .otherwise(expr);
    }
    expr.alias(SCENARIO_COL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_utils::string_values;
    use std::path::PathBuf;

    fn dims() -> Vec<String> {
        vec!["country".to_string(), "product".to_string(), "channel".to_string()]
    }

    fn temp_csv(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("metric_pulse_ingest_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn normalizes_headers_aliases_and_types() {
        let path = temp_csv(
            "normalize.csv",
            "\u{feff}Scenario,Country,Product,Channel,Value\n\
             Actual,US,A,Web,100\n\
             PY,US,A,Web,90\n\
             Prior Year,CA,B,Phone,\n",
        );

        let df = load_timeframe(&path, &dims()).unwrap();

        assert_eq!(df.height(), 3);
        assert_eq!(
            string_values(&df, "scenario").unwrap(),
            vec!["Actual", "PriorYear", "PriorYear"]
        );
        assert!(matches!(df.column("country").unwrap().dtype(), DataType::Categorical(_, _)));
        assert_eq!(df.column("value").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("value").unwrap().null_count(), 1);
    }

    #[test]
    fn late_non_numeric_codes_and_decimals_still_load() {
        let mut content = String::from("scenario,country,product,channel,value\n");
        for i in 0..150 {
            content.push_str(&format!("Actual,US,{},Web,{}\n", i, 100 + i));
        }
        content.push_str("Forecast,US,X1,Web,1500.5\n");
        let path = temp_csv("late_codes.csv", &content);

        let df = load_timeframe(&path, &dims()).unwrap();

        assert_eq!(df.height(), 151);
        let products = string_values(&df, "product").unwrap();
        assert_eq!(products[0], "0");
        assert_eq!(products[150], "X1");
        let values = crate::data_utils::f64_values(&df, "value").unwrap();
        assert_eq!(values[0], Some(100.0));
        assert_eq!(values[150], Some(1500.5));
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_timeframe(Path::new("/nonexistent/metric_pulse.csv"), &dims()).unwrap_err();
        assert!(matches!(err, PulseError::Input(_)));
    }

    #[test]
    fn empty_file_is_reported_as_empty() {
        let path = temp_csv("empty.csv", "");
        let err = load_timeframe(&path, &dims()).unwrap_err();
        assert!(matches!(err, PulseError::EmptyDataset(_)));
    }

    #[test]
    fn missing_column_is_reported() {
        let path = temp_csv("no_channel.csv", "scenario,country,product,value\nActual,US,A,1\n");
        let err = load_timeframe(&path, &dims()).unwrap_err();
        assert!(matches!(err, PulseError::MissingColumn(_)));
    }
}
