// Primitives for reading the CSV inputs.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDate;
use log::debug;

use poll_shift::{Builder, CandidateRecord, PollingTable, SnapshotTable};

use crate::analysis::*;

/// Reads the full polling time series. The first column must be `date`;
/// every other column is a candidate. Blank cells are missing values.
pub fn read_polls(path: &Path) -> AnalysisResult<PollingTable> {
    let mut rdr = csv_reader(path)?;
    let headers = rdr.headers().context(CsvLineParseSnafu {})?.clone();
    ensure!(
        headers.get(0) == Some("date"),
        CsvMissingColumnSnafu {
            name: "date",
            path: path.display().to_string(),
        }
    );
    let columns: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    let mut builder = Builder::new(&columns).context(StatsSnafu)?;

    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        debug!("read_polls: {:?} {:?}", lineno, line);
        let date_s = line.get(0).context(CsvLineTooShortSnafu { lineno })?;
        let date = parse_date(date_s, lineno)?;
        let mut cells: Vec<Option<f64>> = Vec::new();
        for s in line.iter().skip(1) {
            cells.push(parse_opt_number(s, lineno)?);
        }
        if cells.len() != columns.len() {
            return CsvLineTooShortSnafu { lineno }.fail();
        }
        builder.add_row(date, cells).context(StatsSnafu)?;
    }
    Ok(builder.build())
}

/// Reads the candidate registry: `name,date,dropped`, with a blank date for
/// candidates still in the race.
pub fn read_candidates(path: &Path) -> AnalysisResult<Vec<CandidateRecord>> {
    let mut rdr = csv_reader(path)?;
    let headers = rdr.headers().context(CsvLineParseSnafu {})?.clone();
    for (pos, name) in [(0, "name"), (1, "date"), (2, "dropped")] {
        ensure!(
            headers.get(pos) == Some(name),
            CsvMissingColumnSnafu {
                name,
                path: path.display().to_string(),
            }
        );
    }

    let mut res: Vec<CandidateRecord> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        let name = line
            .get(0)
            .context(CsvLineTooShortSnafu { lineno })?
            .to_string();
        let date_s = line.get(1).context(CsvLineTooShortSnafu { lineno })?;
        let date = if date_s.trim().is_empty() {
            None
        } else {
            Some(parse_date(date_s, lineno)?)
        };
        let dropped_s = line.get(2).context(CsvLineTooShortSnafu { lineno })?;
        let dropped = parse_bool(dropped_s, lineno)?;
        res.push(CandidateRecord {
            name,
            date,
            dropped,
        });
    }
    debug!("read_candidates: {} records", res.len());
    Ok(res)
}

/// Reads a before/after snapshot table: the first column is the withdrawn
/// candidate name, the rest are candidate columns. Blank cells read as 0
/// (not in the race at the snapshot time).
pub fn read_snapshot(path: &Path) -> AnalysisResult<SnapshotTable> {
    let mut rdr = csv_reader(path)?;
    let headers = rdr.headers().context(CsvLineParseSnafu {})?.clone();
    ensure!(
        headers.get(0) == Some("name"),
        CsvMissingColumnSnafu {
            name: "name",
            path: path.display().to_string(),
        }
    );
    let columns: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu {})?;
        let name = line
            .get(0)
            .context(CsvLineTooShortSnafu { lineno })?
            .to_string();
        let mut cells: Vec<f64> = Vec::new();
        for s in line.iter().skip(1) {
            cells.push(parse_opt_number(s, lineno)?.unwrap_or(0.0));
        }
        if cells.len() != columns.len() {
            return CsvLineTooShortSnafu { lineno }.fail();
        }
        rows.push((name, cells));
    }
    SnapshotTable::from_rows(columns, rows).context(StatsSnafu)
}

fn csv_reader(path: &Path) -> AnalysisResult<csv::Reader<File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu {
            path: path.display().to_string(),
        })
}

fn parse_date(s: &str, lineno: usize) -> AnalysisResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .ok()
        .context(BadDateSnafu { value: s, lineno })
}

fn parse_opt_number(s: &str, lineno: usize) -> AnalysisResult<Option<f64>> {
    let t = s.trim();
    if t.is_empty() {
        return Ok(None);
    }
    t.parse::<f64>()
        .ok()
        .map(Some)
        .context(BadNumberSnafu { value: t, lineno })
}

fn parse_bool(s: &str, lineno: usize) -> AnalysisResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" | "" => Ok(false),
        _ => BadBoolSnafu { value: s, lineno }.fail(),
    }
}
