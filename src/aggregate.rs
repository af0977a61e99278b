//! Aggregator
//!
//! Rolls a pivoted table up to one grouping and compares Actual against each
//! comparison base. Everything up to the final extraction is a polars lazy
//! plan; the only Rust-side loop walks the already-aggregated groups.

use crate::data_utils::{ensure_columns, f64_values, has_column, null_aware_sum, string_values};
use crate::error::Result;
use crate::model::{AggregateRow, Timeframe, ACTUAL, OVERALL_DIMENSION, OVERALL_LABEL};
use polars::prelude::*;
use tracing::debug;

pub const VARIANCE_PCT: &str = "variance_pct";
pub const VARIANCE_ABS: &str = "variance_abs";

/// Synthetic key column used to run the Overall total through the same
/// group-by as every other grouping.
const OVERALL_KEY: &str = "__overall";

/// A named set of dimension columns to roll up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grouping {
    pub label: String,
    pub keys: Vec<String>,
}

impl Grouping {
    pub fn overall() -> Self {
        Self {
            label: OVERALL_LABEL.to_string(),
            keys: Vec::new(),
        }
    }

    pub fn single(dim: &str) -> Self {
        Self {
            label: dimension_title(dim),
            keys: vec![dim.to_string()],
        }
    }

    pub fn combined(dims: &[&str]) -> Self {
        Self {
            label: dims.iter().map(|d| dimension_title(d)).collect::<Vec<_>>().join("+"),
            keys: dims.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn is_overall(&self) -> bool {
        self.keys.is_empty()
    }

    fn key_columns(&self) -> Vec<String> {
        if self.is_overall() {
            vec![OVERALL_KEY.to_string()]
        } else {
            self.keys.clone()
        }
    }
}

/// "sales_channel" -> "Sales Channel"
fn dimension_title(dim: &str) -> String {
    dim.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sum Actual and every base per group, preserving first-seen group order.
pub fn group_totals(pivot: &DataFrame, grouping: &Grouping, bases: &[String]) -> Result<DataFrame> {
    let keys: Vec<&str> = grouping.keys.iter().map(String::as_str).collect();
    ensure_columns(pivot, &keys)?;

    let mut lf = pivot.clone().lazy();
    if grouping.is_overall() {
        lf = lf.with_column(lit(OVERALL_DIMENSION).alias(OVERALL_KEY));
    }

    let mut value_cols: Vec<&str> = vec![ACTUAL];
    for base in bases {
        if !value_cols.contains(&base.as_str()) {
            value_cols.push(base);
        }
    }

    // A scenario nobody reported is "no comparison possible", not an error.
    let missing: Vec<Expr> = value_cols
        .iter()
        .filter(|c| !has_column(pivot, c))
        .map(|c| lit(NULL).cast(DataType::Float64).alias(c))
        .collect();
    if !missing.is_empty() {
        lf = lf.with_columns(missing);
    }

    let by: Vec<Expr> = grouping.key_columns().iter().map(|k| col(k)).collect();
    let sums: Vec<Expr> = value_cols.iter().map(|c| null_aware_sum(c)).collect();

    Ok(lf.group_by_stable(by).agg(sums).collect()?)
}

/// Add `variance_pct` / `variance_abs` for one base.
///
/// `variance_pct` is null exactly where the base is null or zero (given a
/// non-null Actual); it is never infinite or NaN.
pub fn variance_frame(grouped: &DataFrame, base: &str) -> Result<DataFrame> {
    let pct = (col(ACTUAL) - col(base)) / col(base) * lit(100.0);
    let out = grouped
        .clone()
        .lazy()
        .with_columns([
            when(usable_base(base))
                .then(pct.round(1))
                .otherwise(lit(NULL))
                .cast(DataType::Float64)
                .alias(VARIANCE_PCT),
            (col(ACTUAL) - col(base)).round(0).alias(VARIANCE_ABS),
        ])
        .collect()?;
    Ok(out)
}

fn usable_base(base: &str) -> Expr {
    col(base).is_not_null().and(col(base).neq(lit(0.0)))
}

fn eligible(base: &str, min_volume: f64) -> Expr {
    usable_base(base)
        .and(col(ACTUAL).gt_eq(lit(min_volume)))
        .and(col(VARIANCE_PCT).is_not_null())
        .and(col(VARIANCE_PCT).is_finite())
}

/// Roll `pivot` up by `grouping` and compare against each base.
///
/// Groups with a null/zero base or with Actual below `min_volume` are left out
/// for that base.
pub fn aggregate(
    pivot: &DataFrame,
    grouping: &Grouping,
    timeframe: Timeframe,
    bases: &[String],
    min_volume: f64,
) -> Result<Vec<AggregateRow>> {
    let grouped = group_totals(pivot, grouping, bases)?;

    let mut rows = Vec::new();
    for base in bases {
        let kept = variance_frame(&grouped, base)?
            .lazy()
            .filter(eligible(base, min_volume))
            .collect()?;
        debug!(
            "{} {} vs {}: {} of {} groups eligible",
            timeframe,
            grouping.label,
            base,
            kept.height(),
            grouped.height()
        );
        rows.extend(extract_rows(&kept, grouping, timeframe, base)?);
    }

    Ok(rows)
}

fn extract_rows(
    df: &DataFrame,
    grouping: &Grouping,
    timeframe: Timeframe,
    base: &str,
) -> Result<Vec<AggregateRow>> {
    let key_values: Vec<Vec<String>> = grouping
        .keys
        .iter()
        .map(|k| string_values(df, k))
        .collect::<Result<_>>()?;
    let actual = f64_values(df, ACTUAL)?;
    let comparison = f64_values(df, base)?;
    let pct = f64_values(df, VARIANCE_PCT)?;
    let abs = f64_values(df, VARIANCE_ABS)?;

    let mut out = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(actual), Some(comparison), Some(variance_pct), Some(variance_abs)) =
            (actual[idx], comparison[idx], pct[idx], abs[idx])
        else {
            continue;
        };

        let group_values: Vec<String> = key_values.iter().map(|vals| vals[idx].clone()).collect();
        let dimension = if grouping.is_overall() {
            OVERALL_DIMENSION.to_string()
        } else {
            group_values.join(" | ")
        };

        out.push(AggregateRow {
            timeframe,
            grouping: grouping.label.clone(),
            group_values,
            dimension,
            comparison_type: base.to_string(),
            actual,
            comparison,
            variance_pct,
            variance_abs,
        });
    }
    Ok(out)
}
