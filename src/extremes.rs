//! Extreme Selector
//!
//! Picks the highest and lowest `variance_pct` rows independently for every
//! (grouping, comparison base) pair, so a grouping with small swings still
//! contributes its own extremes.

use crate::model::{AggregateRow, AnomalyRecord, RankDirection};
use std::cmp::Ordering;

/// Select up to `top_n` High and `top_n` Low rows per (grouping, base).
///
/// Pairs are emitted in first-seen order, High before Low. Exact ties keep
/// their input order. A pair with fewer than `top_n` rows returns all of
/// them in each direction.
pub fn select_extremes(candidates: &[AggregateRow], top_n: usize) -> Vec<AnomalyRecord> {
    let mut out = Vec::new();
    for (_, rows) in partition_by_pair(candidates) {
        out.extend(rank(&rows, top_n, RankDirection::High));
        out.extend(rank(&rows, top_n, RankDirection::Low));
    }
    out
}

/// Split candidates by (grouping, comparison_type), keeping first-seen order
/// of both pairs and rows.
fn partition_by_pair(candidates: &[AggregateRow]) -> Vec<((&str, &str), Vec<&AggregateRow>)> {
    let mut pairs: Vec<((&str, &str), Vec<&AggregateRow>)> = Vec::new();
    for row in candidates {
        let key = (row.grouping.as_str(), row.comparison_type.as_str());
        match pairs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, rows)) => rows.push(row),
            None => pairs.push((key, vec![row])),
        }
    }
    pairs
}

fn rank(rows: &[&AggregateRow], top_n: usize, direction: RankDirection) -> Vec<AnomalyRecord> {
    let mut sorted = rows.to_vec();
    // `sort_by` is stable, which is what gives first-seen tie-breaking.
    sorted.sort_by(|a, b| {
        let ord = a.variance_pct.partial_cmp(&b.variance_pct).unwrap_or(Ordering::Equal);
        match direction {
            RankDirection::High => ord.reverse(),
            RankDirection::Low => ord,
        }
    });

    sorted
        .into_iter()
        .take(top_n)
        .enumerate()
        .map(|(idx, row)| AnomalyRecord {
            row: row.clone(),
            direction,
            rank: idx + 1,
        })
        .collect()
}
