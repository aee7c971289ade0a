// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

use chrono::NaiveDate;

/// The name of the catch-all polling column that absorbs rounding
/// deficit or surplus so that every row sums to 100.
pub const UNDECIDED: &str = "Undecided";

/// One entry of the candidate registry: a candidate that took part in the
/// race, with the date at which they withdrew (if they did).
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CandidateRecord {
    pub name: String,
    /// The withdrawal date. None for candidates still in the race.
    pub date: Option<NaiveDate>,
    pub dropped: bool,
}

/// A paired-withdrawal exclusion: when `dropout` is the event under
/// analysis, the `excluded` candidate had already left the race as part of
/// the same sequence and their zeroed column is not meaningful.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ExclusionPair {
    pub dropout: String,
    pub excluded: String,
}

/// The rules that govern the winner determination.
#[derive(PartialEq, Debug, Clone)]
pub struct StatsRules {
    /// Ordered gain-share thresholds, evaluated in sequence with a strict
    /// comparison. The first tier with at least one qualifying candidate
    /// decides the winner set.
    pub winner_tiers: Vec<f64>,
    pub exclusions: Vec<ExclusionPair>,
}

impl StatsRules {
    pub const DEFAULT_TIERS: [f64; 4] = [0.5, 0.375, 0.3, 0.25];
}

impl Default for StatsRules {
    fn default() -> StatsRules {
        StatsRules {
            winner_tiers: StatsRules::DEFAULT_TIERS.to_vec(),
            exclusions: Vec::new(),
        }
    }
}

/// The full polling time series: rows indexed by date (chronological,
/// unique), one column per candidate, cells in percent (0-100).
///
/// A missing cell means the candidate was not polled on that date. It is
/// excluded from row sums during reconciliation.
///
/// Built through [crate::Builder], which enforces the uniqueness
/// invariants.
#[derive(PartialEq, Debug, Clone)]
pub struct PollingTable {
    pub(crate) columns: Vec<String>,
    pub(crate) dates: Vec<NaiveDate>,
    pub(crate) cells: Vec<Vec<Option<f64>>>,
}

impl PollingTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn num_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn row(&self, idx: usize) -> &[Option<f64>] {
        &self.cells[idx]
    }

    /// The position of a candidate column, or an error naming the missing
    /// candidate.
    pub fn column_index(&self, name: &str) -> Result<usize, StatsError> {
        column_position(&self.columns, name)
    }
}

/// A snapshot of the race around withdrawal events: one row per withdrawn
/// candidate, one column per candidate, dense cells. A candidate absent
/// from the race at the snapshot time holds 0.
#[derive(PartialEq, Debug, Clone)]
pub struct SnapshotTable {
    pub(crate) columns: Vec<String>,
    pub(crate) events: Vec<String>,
    pub(crate) cells: Vec<Vec<f64>>,
}

impl SnapshotTable {
    /// Assembles a snapshot table from (dropout name, cells) rows.
    /// Column and event names must be unique and every row must have one
    /// cell per column.
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<(String, Vec<f64>)>,
    ) -> Result<SnapshotTable, StatsError> {
        check_unique_columns(&columns)?;
        let mut events: Vec<String> = Vec::new();
        let mut cells: Vec<Vec<f64>> = Vec::new();
        for (name, row) in rows {
            if events.contains(&name) {
                return Err(StatsError::DuplicateEvent { name });
            }
            if row.len() != columns.len() {
                return Err(StatsError::RowArityMismatch {
                    expected: columns.len(),
                    got: row.len(),
                });
            }
            events.push(name);
            cells.push(row);
        }
        Ok(SnapshotTable {
            columns,
            events,
            cells,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The withdrawn-candidate names, in row order.
    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn row(&self, idx: usize) -> &[f64] {
        &self.cells[idx]
    }

    pub fn column_index(&self, name: &str) -> Result<usize, StatsError> {
        column_position(&self.columns, name)
    }

    /// The row of a withdrawal event, or an error naming the missing
    /// candidate.
    pub fn event_index(&self, name: &str) -> Result<usize, StatsError> {
        self.events
            .iter()
            .position(|e| e == name)
            .ok_or_else(|| StatsError::UnknownCandidate {
                name: name.to_string(),
            })
    }
}

pub(crate) fn column_position(columns: &[String], name: &str) -> Result<usize, StatsError> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| StatsError::UnknownCandidate {
            name: name.to_string(),
        })
}

pub(crate) fn check_unique_columns(columns: &[String]) -> Result<(), StatsError> {
    for (idx, c) in columns.iter().enumerate() {
        if columns[..idx].contains(c) {
            return Err(StatsError::DuplicateColumn { name: c.clone() });
        }
    }
    Ok(())
}

// ******** Output data structures *********

/// Polling movement of a single winner over the withdrawal window.
#[derive(PartialEq, Debug, Clone)]
pub struct WinnerStats {
    pub name: String,
    /// Share of all polling gains captured by this candidate, in [0, 1].
    pub share: f64,
    pub before: f64,
    pub after: f64,
    pub diff: f64,
}

/// Statistics for one withdrawal event.
#[derive(PartialEq, Debug, Clone)]
pub struct DropoutStats {
    /// The candidate who withdrew.
    pub name: String,
    /// Per-candidate polling difference over the window, in column order.
    /// The dropout's own column and any excluded co-candidate are zeroed.
    pub diffs: Vec<(String, f64)>,
    /// The dropout's own change, recorded before zeroing. Expected <= 0.
    pub dropout_change: f64,
    /// Sum of all negative differences (losses unrelated to this event).
    pub negative_sum: f64,
    /// Sum of all positive differences.
    pub positive_sum: f64,
    /// Per-candidate share of the positive sum, negatives clamped to 0.
    /// All zero when no candidate gained.
    pub positive_shares: Vec<(String, f64)>,
    /// Per-candidate signed share of the positive sum, unclamped. For
    /// display only, never used for winner determination.
    pub all_shares: Vec<(String, f64)>,
    /// Co-candidates excluded from this event by an [ExclusionPair].
    pub excluded: Vec<String>,
    /// Candidates polling non-zero in either snapshot, minus exclusions.
    pub active_candidates: Vec<String>,
    /// Winners in ascending share order. Empty when no candidate cleared
    /// any tier.
    pub winners: Vec<WinnerStats>,
}

/// Errors that prevent the statistics from being computed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum StatsError {
    /// The before and after snapshots do not share the same row index and
    /// column set.
    ShapeMismatch,
    UnknownCandidate { name: String },
    DuplicateColumn { name: String },
    DuplicateDate { date: NaiveDate },
    DuplicateEvent { name: String },
    RowArityMismatch { expected: usize, got: usize },
}

impl Error for StatsError {}

impl Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::ShapeMismatch => {
                write!(f, "before/after snapshot tables have different shapes")
            }
            StatsError::UnknownCandidate { name } => {
                write!(f, "unknown candidate: {}", name)
            }
            StatsError::DuplicateColumn { name } => {
                write!(f, "duplicate candidate column: {}", name)
            }
            StatsError::DuplicateDate { date } => {
                write!(f, "duplicate polling date: {}", date)
            }
            StatsError::DuplicateEvent { name } => {
                write!(f, "duplicate withdrawal event: {}", name)
            }
            StatsError::RowArityMismatch { expected, got } => {
                write!(f, "row has {} cells, expected {}", got, expected)
            }
        }
    }
}
