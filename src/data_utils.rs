use crate::error::{PulseError, Result};
use polars::prelude::*;

/// Fail with `MissingColumn` naming the first absent column.
pub fn ensure_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let present = df.get_column_names();
    for name in required {
        if !present.iter().any(|c| c == name) {
            return Err(PulseError::MissingColumn(format!(
                "{} (available: {:?})",
                name, present
            )));
        }
    }
    Ok(())
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| *c == name)
}

/// Sum that stays null when every input in the group is null.
///
/// Polars sums an all-null group to 0, which would turn "no forecast" into
/// "forecast of zero".
pub fn null_aware_sum(name: &str) -> Expr {
    when(col(name).is_not_null().sum().gt(lit(0)))
        .then(col(name).sum())
        .otherwise(lit(NULL))
        .cast(DataType::Float64)
        .alias(name)
}

/// Read a column as owned strings; nulls become the literal "null".
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = df.column(name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("null").to_string())
        .collect();
    Ok(values)
}

pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    let values = series.f64()?.into_iter().collect();
    Ok(values)
}
