mod builder;
mod config;
pub mod manual;

use log::{debug, info};

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;

pub use crate::builder::Builder;
pub use crate::config::*;

// The extraction window around a withdrawal date, in days. The asymmetry
// reflects the lag before post-withdrawal polls are published.
const WINDOW_DAYS_BEFORE: i64 = 7;
const WINDOW_DAYS_AFTER: i64 = 9;

// Rows are considered balanced within this tolerance, which also makes
// reconciliation idempotent under floating point.
const RECONCILE_TOLERANCE: f64 = 1e-9;

/// Extracts the polling rows relevant to a withdrawal event: strictly later
/// than 7 days before the withdrawal date and strictly earlier than 9 days
/// after it.
///
/// An empty result is not an error. It means there is insufficient data
/// around this event and callers are expected to check for it.
pub fn extract_window(polls: &PollingTable, withdrawal: NaiveDate) -> PollingTable {
    let lo = withdrawal - Duration::days(WINDOW_DAYS_BEFORE);
    let hi = withdrawal + Duration::days(WINDOW_DAYS_AFTER);
    let mut dates: Vec<NaiveDate> = Vec::new();
    let mut cells: Vec<Vec<Option<f64>>> = Vec::new();
    for (d, row) in polls.dates.iter().zip(polls.cells.iter()) {
        if *d > lo && *d < hi {
            dates.push(*d);
            cells.push(row.clone());
        }
    }
    debug!(
        "extract_window: withdrawal {:?}: kept {} of {} rows",
        withdrawal,
        dates.len(),
        polls.num_rows()
    );
    PollingTable {
        columns: polls.columns.clone(),
        dates,
        cells,
    }
}

/// Repairs rows whose non-missing cells do not sum to 100 by adding the
/// signed deficit to the "Undecided" column. The upstream sources publish
/// integer percentages, so most raw rows are off by a point or two.
///
/// Idempotent: a balanced row is left untouched. The "Undecided" column is
/// only required for rows that actually need a repair.
pub fn reconcile(polls: &mut PollingTable) -> Result<(), StatsError> {
    let undecided = polls.columns.iter().position(|c| c == UNDECIDED);
    for (d, row) in polls.dates.iter().zip(polls.cells.iter_mut()) {
        let sum: f64 = row.iter().flatten().sum();
        let deficit = 100.0 - sum;
        if deficit.abs() > RECONCILE_TOLERANCE {
            let idx = undecided.ok_or_else(|| StatsError::UnknownCandidate {
                name: UNDECIDED.to_string(),
            })?;
            debug!("reconcile: row {:?} sums to {}, adjusting", d, sum);
            let cell = row[idx].get_or_insert(0.0);
            *cell += deficit;
        }
    }
    Ok(())
}

/// Computes the per-event differential statistics from the before and after
/// snapshot tables.
///
/// Both tables must share the same row index (withdrawn candidates) and
/// column set; anything else is a contract violation reported as
/// [StatsError::ShapeMismatch]. One [DropoutStats] is produced per event,
/// in row order.
pub fn run_dropout_stats(
    before: &SnapshotTable,
    after: &SnapshotTable,
    rules: &StatsRules,
) -> Result<Vec<DropoutStats>, StatsError> {
    info!(
        "run_dropout_stats: {} events, {} candidates, tiers {:?}",
        before.events.len(),
        before.columns.len(),
        rules.winner_tiers
    );
    if before.columns != after.columns || before.events != after.events {
        return Err(StatsError::ShapeMismatch);
    }

    let excluded_by_dropout: HashMap<&str, &str> = rules
        .exclusions
        .iter()
        .map(|p| (p.dropout.as_str(), p.excluded.as_str()))
        .collect();

    let mut res: Vec<DropoutStats> = Vec::new();
    for (ev, name) in before.events.iter().enumerate() {
        let excluded = excluded_by_dropout.get(name.as_str()).copied();
        res.push(event_stats(ev, name, before, after, rules, excluded)?);
    }
    Ok(res)
}

fn event_stats(
    ev: usize,
    name: &str,
    before: &SnapshotTable,
    after: &SnapshotTable,
    rules: &StatsRules,
    excluded: Option<&str>,
) -> Result<DropoutStats, StatsError> {
    let b = &before.cells[ev];
    let a = &after.cells[ev];
    let mut diffs: Vec<f64> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();

    // The dropout's own collapse is recorded apart and must never count as
    // a gain or a loss among the remaining candidates.
    let dropout_col = before.column_index(name)?;
    let dropout_change = diffs[dropout_col];
    diffs[dropout_col] = 0.0;

    let mut excluded_names: Vec<String> = Vec::new();
    if let Some(ex) = excluded {
        let ex_col = before.column_index(ex)?;
        diffs[ex_col] = 0.0;
        excluded_names.push(ex.to_string());
    }

    let negative_sum: f64 = diffs.iter().filter(|d| **d < 0.0).sum();
    let positive_sum: f64 = diffs.iter().filter(|d| **d > 0.0).sum();

    // Degenerate case: no candidate gained over the window. All shares are
    // zero and no winner can be declared.
    let positive_shares: Vec<f64> = if positive_sum > 0.0 {
        diffs
            .iter()
            .map(|d| if *d < 0.0 { 0.0 } else { d / positive_sum })
            .collect()
    } else {
        vec![0.0; diffs.len()]
    };
    let all_shares: Vec<f64> = if positive_sum > 0.0 {
        diffs.iter().map(|d| d / positive_sum).collect()
    } else {
        vec![0.0; diffs.len()]
    };

    let mut winner_cols = select_winners(&positive_shares, &rules.winner_tiers);
    // Ascending share order, ties in column order.
    winner_cols.sort_by(|x, y| positive_shares[*x].total_cmp(&positive_shares[*y]));
    let winners: Vec<WinnerStats> = winner_cols
        .iter()
        .map(|&c| WinnerStats {
            name: before.columns[c].clone(),
            share: positive_shares[c],
            before: b[c],
            after: a[c],
            diff: diffs[c],
        })
        .collect();

    let active_candidates: Vec<String> = before
        .columns
        .iter()
        .enumerate()
        .filter(|(k, cname)| {
            (b[*k] != 0.0 || a[*k] != 0.0) && !excluded_names.contains(*cname)
        })
        .map(|(_, cname)| cname.clone())
        .collect();

    debug!(
        "event_stats: {}: dropout change {}, positive sum {}, winners {:?}",
        name,
        dropout_change,
        positive_sum,
        winners.iter().map(|w| w.name.as_str()).collect::<Vec<_>>()
    );

    let named = |values: &[f64]| -> Vec<(String, f64)> {
        before
            .columns
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .collect()
    };

    Ok(DropoutStats {
        name: name.to_string(),
        diffs: named(&diffs),
        dropout_change,
        negative_sum,
        positive_sum,
        positive_shares: named(&positive_shares),
        all_shares: named(&all_shares),
        excluded: excluded_names,
        active_candidates,
        winners,
    })
}

// The tiered cascade: the first threshold with at least one candidate
// strictly above it decides the winner set. Ties within a tier are all
// reported.
fn select_winners(shares: &[f64], tiers: &[f64]) -> Vec<usize> {
    for &tier in tiers {
        let hits: Vec<usize> = shares
            .iter()
            .enumerate()
            .filter(|(_, s)| **s > tier)
            .map(|(idx, _)| idx)
            .collect();
        if !hits.is_empty() {
            debug!("select_winners: tier {} selected {:?}", tier, hits);
            return hits;
        }
    }
    Vec::new()
}
