//! Scenario Pivot
//!
//! Turns long rows (`scenario, <dims...>, value`) into one row per dimension
//! combination with one Float64 column per scenario. Dimension columns leave
//! this module as plain `String` columns whatever they were encoded as on the
//! way in, so later stages can introduce labels the loader never saw.

use crate::data_utils::{ensure_columns, string_values};
use crate::error::{PulseError, Result};
use crate::model::{ACTUAL, SCENARIO_COL, VALUE_COL};
use polars::prelude::*;

/// Pivot scenario rows into wide columns, summing duplicates.
///
/// `required` scenarios (plus Actual) are always present in the output, filled
/// with nulls when the input has no row for them.
pub fn pivot_scenarios(raw: &DataFrame, dims: &[String], required: &[String]) -> Result<DataFrame> {
    let mut needed: Vec<&str> = vec![SCENARIO_COL, VALUE_COL];
    needed.extend(dims.iter().map(String::as_str));
    ensure_columns(raw, &needed)?;

    let mut casts: Vec<Expr> = dims.iter().map(|d| col(d).cast(DataType::String)).collect();
    casts.push(col(SCENARIO_COL).cast(DataType::String));
    // NaN is missing, same as null; left in, it would poison every sum it touches.
    casts.push(col(VALUE_COL).cast(DataType::Float64).fill_nan(lit(NULL)));
    let long = raw.clone().lazy().with_columns(casts);

    let seen = long
        .clone()
        .select([col(SCENARIO_COL).drop_nulls().unique_stable()])
        .collect()?;
    let labels = scenario_columns(string_values(&seen, SCENARIO_COL)?, required);

    if let Some(clash) = labels.iter().find(|l| dims.contains(l)) {
        return Err(PulseError::Input(format!(
            "scenario label '{}' collides with a dimension column",
            clash
        )));
    }

    let keys: Vec<Expr> = dims.iter().map(|d| col(d)).collect();
    let sums: Vec<Expr> = labels.iter().map(|l| scenario_sum(l)).collect();

    let pivot = long.group_by_stable(keys).agg(sums).collect()?;
    Ok(pivot)
}

/// Output column order: Actual, the required bases, then anything else seen.
fn scenario_columns(seen: Vec<String>, required: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = vec![ACTUAL.to_string()];
    for label in required.iter().cloned().chain(seen) {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

fn scenario_sum(label: &str) -> Expr {
    let hit = col(SCENARIO_COL).eq(lit(label));
    when(hit.clone().and(col(VALUE_COL).is_not_null()).sum().gt(lit(0)))
        .then(col(VALUE_COL).filter(hit).sum())
        .otherwise(lit(NULL))
        .cast(DataType::Float64)
        .alias(label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_utils::f64_values;

    fn dims() -> Vec<String> {
        vec!["country".to_string(), "product".to_string()]
    }

    fn bases() -> Vec<String> {
        vec!["Forecast".to_string(), "PriorYear".to_string()]
    }

    #[test]
    fn sums_duplicates_into_one_row_per_combination() {
        let raw = df![
            "scenario" => ["Actual", "Actual", "Forecast", "Actual"],
            "country" => ["US", "US", "US", "CA"],
            "product" => ["A", "A", "A", "A"],
            "value" => [100.0, 50.0, 120.0, 10.0]
        ]
        .unwrap();

        let pivot = pivot_scenarios(&raw, &dims(), &bases()).unwrap();

        assert_eq!(pivot.height(), 2);
        assert_eq!(string_values(&pivot, "country").unwrap(), vec!["US", "CA"]);
        assert_eq!(f64_values(&pivot, "Actual").unwrap(), vec![Some(150.0), Some(10.0)]);
        assert_eq!(f64_values(&pivot, "Forecast").unwrap(), vec![Some(120.0), None]);
    }

    #[test]
    fn absent_scenarios_become_null_columns() {
        let raw = df![
            "scenario" => ["Actual", "Forecast"],
            "country" => ["US", "US"],
            "product" => ["A", "A"],
            "value" => [1000.0, 800.0]
        ]
        .unwrap();

        let pivot = pivot_scenarios(&raw, &dims(), &bases()).unwrap();

        let names = pivot.get_column_names();
        assert!(names.contains(&"PriorYear"));
        assert_eq!(f64_values(&pivot, "PriorYear").unwrap(), vec![None]);
    }

    #[test]
    fn extra_scenarios_get_their_own_columns() {
        let raw = df![
            "scenario" => ["Actual", "Budget"],
            "country" => ["US", "US"],
            "product" => ["A", "A"],
            "value" => [5.0, 7.0]
        ]
        .unwrap();

        let pivot = pivot_scenarios(&raw, &dims(), &bases()).unwrap();
        assert_eq!(f64_values(&pivot, "Budget").unwrap(), vec![Some(7.0)]);
    }

    #[test]
    fn categorical_dimensions_come_out_as_plain_strings() {
        let raw = df![
            "scenario" => ["Actual", "Forecast"],
            "country" => ["US", "US"],
            "product" => ["A", "A"],
            "value" => [1.0, 2.0]
        ]
        .unwrap()
        .lazy()
        .with_columns([
            col("country").cast(DataType::Categorical(None, CategoricalOrdering::Physical)),
            col("scenario").cast(DataType::Categorical(None, CategoricalOrdering::Physical)),
        ])
        .collect()
        .unwrap();

        let pivot = pivot_scenarios(&raw, &dims(), &bases()).unwrap();
        assert_eq!(pivot.column("country").unwrap().dtype(), &DataType::String);

        // A label that never existed in the source encoding must be assignable.
        let relabeled = pivot
            .lazy()
            .with_column(lit("Overall").alias("country"))
            .collect()
            .unwrap();
        assert_eq!(string_values(&relabeled, "country").unwrap(), vec!["Overall"]);
    }

    #[test]
    fn missing_dimension_column_is_reported() {
        let raw = df![
            "scenario" => ["Actual"],
            "country" => ["US"],
            "value" => [1.0]
        ]
        .unwrap();

        let err = pivot_scenarios(&raw, &dims(), &bases()).unwrap_err();
        assert!(matches!(err, PulseError::MissingColumn(_)));
    }
}
