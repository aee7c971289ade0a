pub use crate::config::*;

use chrono::NaiveDate;

/// A builder for assembling a polling table row by row.
///
/// Rows may be added in any order; the finished table is chronological.
///
/// ```
/// use poll_shift::Builder;
/// # use poll_shift::StatsError;
/// use chrono::NaiveDate;
///
/// let mut builder = Builder::new(&["Anna".to_string(), "Undecided".to_string()])?;
/// builder.add_row(
///     NaiveDate::from_ymd_opt(2016, 1, 14).unwrap(),
///     vec![Some(55.0), Some(45.0)],
/// )?;
/// let polls = builder.build();
/// assert_eq!(polls.num_rows(), 1);
///
/// # Ok::<(), StatsError>(())
/// ```
pub struct Builder {
    pub(crate) _columns: Vec<String>,
    pub(crate) _rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
}

impl Builder {
    pub fn new(columns: &[String]) -> Result<Builder, StatsError> {
        check_unique_columns(columns)?;
        Ok(Builder {
            _columns: columns.to_vec(),
            _rows: Vec::new(),
        })
    }

    /// Adds one dated polling row. A cell of None marks a candidate not
    /// polled on that date.
    pub fn add_row(&mut self, date: NaiveDate, cells: Vec<Option<f64>>) -> Result<(), StatsError> {
        if cells.len() != self._columns.len() {
            return Err(StatsError::RowArityMismatch {
                expected: self._columns.len(),
                got: cells.len(),
            });
        }
        if self._rows.iter().any(|(d, _)| *d == date) {
            return Err(StatsError::DuplicateDate { date });
        }
        self._rows.push((date, cells));
        Ok(())
    }

    pub fn build(self) -> PollingTable {
        let mut rows = self._rows;
        rows.sort_by_key(|(d, _)| *d);
        let mut dates: Vec<NaiveDate> = Vec::new();
        let mut cells: Vec<Vec<Option<f64>>> = Vec::new();
        for (d, row) in rows {
            dates.push(d);
            cells.push(row);
        }
        PollingTable {
            columns: self._columns,
            dates,
            cells,
        }
    }
}
