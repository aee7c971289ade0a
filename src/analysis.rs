use log::{info, warn};

use poll_shift::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::analysis::config_reader::*;
use crate::args::Args;

pub mod charts;
pub mod io_csv;

#[derive(Debug, Snafu)]
pub enum AnalysisError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON content"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing a CSV line"))]
    CsvLineParse { source: csv::Error },
    #[snafu(display("CSV line {lineno} is too short"))]
    CsvLineTooShort { lineno: usize },
    #[snafu(display("Missing column {name} in {path}"))]
    CsvMissingColumn { name: String, path: String },
    #[snafu(display("Invalid date {value} at line {lineno}"))]
    BadDate { value: String, lineno: usize },
    #[snafu(display("Invalid number {value} at line {lineno}"))]
    BadNumber { value: String, lineno: usize },
    #[snafu(display("Invalid boolean {value} at line {lineno}"))]
    BadBool { value: String, lineno: usize },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},

    #[snafu(display("Stats engine failure: {source}"))]
    Stats { source: StatsError },
    #[snafu(display("Chart rendering failed for {path}: {message}"))]
    ChartRender { path: String, message: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

pub mod config_reader {
    use crate::analysis::*;

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "contestName")]
        pub contest_name: String,
        #[serde(rename = "summaryFile")]
        pub summary_file: Option<String>,
        #[serde(rename = "chartsDirectory")]
        pub charts_directory: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct DataFiles {
        pub polls: String,
        pub candidates: String,
        pub before: String,
        pub after: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ExclusionEntry {
        pub dropout: String,
        pub excluded: String,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct AnalysisConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: OutputSettings,
        #[serde(rename = "dataFiles")]
        pub data_files: DataFiles,
        #[serde(rename = "winnerTiers")]
        pub winner_tiers: Option<Vec<f64>>,
        pub exclusions: Option<Vec<ExclusionEntry>>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputConfig {
        pub contest: String,
        pub tiers: Vec<String>,
    }

    pub fn read_config(path: &str) -> AnalysisResult<AnalysisConfig> {
        let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
        let config: AnalysisConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_summary(path: String) -> AnalysisResult<JSValue> {
        let contents = fs::read_to_string(&path).context(OpeningFileSnafu { path })?;
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn validate_rules(config: &AnalysisConfig) -> AnalysisResult<StatsRules> {
    let tiers = config
        .winner_tiers
        .clone()
        .unwrap_or_else(|| StatsRules::DEFAULT_TIERS.to_vec());
    if tiers.iter().any(|t| !(0.0..=1.0).contains(t)) {
        whatever!("Winner tiers must lie within [0, 1]: {:?}", tiers);
    }
    if tiers.windows(2).any(|w| w[1] >= w[0]) {
        whatever!("Winner tiers must be strictly decreasing: {:?}", tiers);
    }
    let exclusions: Vec<ExclusionPair> = config
        .exclusions
        .clone()
        .unwrap_or_default()
        .into_iter()
        .map(|e| ExclusionPair {
            dropout: e.dropout,
            excluded: e.excluded,
        })
        .collect();
    Ok(StatsRules {
        winner_tiers: tiers,
        exclusions,
    })
}

fn resolve(root: &Path, path: &str) -> PathBuf {
    let pb = PathBuf::from(path);
    if pb.is_absolute() {
        pb
    } else {
        root.join(pb)
    }
}

fn fmt_num(v: f64) -> String {
    format!("{:.4}", v)
}

/// The display label of an event: the dropout, prefixed with the
/// co-candidates that withdrew in the same sequence.
pub fn event_label(stat: &DropoutStats) -> String {
    if stat.excluded.is_empty() {
        stat.name.clone()
    } else {
        format!("{} and {}", stat.excluded.join(" and "), stat.name)
    }
}

/// The narrative summary of one withdrawal event.
pub fn event_summary(stat: &DropoutStats, date: Option<NaiveDate>) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    match date {
        Some(d) => lines.push(format!("{} - {}", event_label(stat), d)),
        None => lines.push(event_label(stat)),
    }
    if stat.winners.is_empty() {
        lines.push(
            "No clear winner: no one gained a considerable amount more than anyone else."
                .to_string(),
        );
    } else {
        for w in &stat.winners {
            lines.push(format!(
                "{} gained {:.2} percentage points in polling, or {:.2}% of all polling gains, \
                 going up from {:.2} to {:.2}",
                w.name,
                w.diff,
                w.share * 100.0,
                w.before,
                w.after
            ));
        }
        lines.push(format!(
            "after {} suspended their campaign giving up {:.2} polling percentage and other \
             candidates lost a cumulative {:.2}.",
            stat.name,
            -stat.dropout_change,
            -stat.negative_sum
        ));
    }
    lines
}

fn result_stats_to_json(stats: &[DropoutStats], dates: &HashMap<&str, NaiveDate>) -> Vec<JSValue> {
    let mut l: Vec<JSValue> = Vec::new();
    for stat in stats {
        let winners: Vec<JSValue> = stat
            .winners
            .iter()
            .map(|w| {
                json!({
                    "name": w.name,
                    "share": fmt_num(w.share),
                    "before": fmt_num(w.before),
                    "after": fmt_num(w.after),
                    "diff": fmt_num(w.diff),
                })
            })
            .collect();
        let js = json!({
            "name": stat.name,
            "date": dates.get(stat.name.as_str()).map(|d| d.to_string()),
            "dropoutChange": fmt_num(stat.dropout_change),
            "negativeSum": fmt_num(stat.negative_sum),
            "positiveSum": fmt_num(stat.positive_sum),
            "excluded": stat.excluded,
            "activeCandidates": stat.active_candidates,
            "winners": winners,
        });
        l.push(js);
    }
    l
}

fn build_summary_js(
    config: &AnalysisConfig,
    rules: &StatsRules,
    stats: &[DropoutStats],
    dates: &HashMap<&str, NaiveDate>,
) -> JSValue {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        tiers: rules.winner_tiers.iter().map(|t| fmt_num(*t)).collect(),
    };
    json!({
        "config": c,
        "results": result_stats_to_json(stats, dates),
    })
}

pub fn run_analysis(args: &Args) -> AnalysisResult<()> {
    let config = read_config(&args.config)?;
    info!("config: {:?}", config);

    let rules = validate_rules(&config)?;
    let root = Path::new(&args.config)
        .parent()
        .context(MissingParentDirSnafu {})?
        .to_path_buf();

    let mut polls = io_csv::read_polls(&resolve(&root, &config.data_files.polls))?;
    reconcile(&mut polls).context(StatsSnafu)?;
    info!(
        "Loaded {} polling rows over {} candidate columns",
        polls.num_rows(),
        polls.columns().len()
    );

    let candidates = io_csv::read_candidates(&resolve(&root, &config.data_files.candidates))?;
    let before = io_csv::read_snapshot(&resolve(&root, &config.data_files.before))?;
    let after = io_csv::read_snapshot(&resolve(&root, &config.data_files.after))?;

    let stats = run_dropout_stats(&before, &after, &rules).context(StatsSnafu)?;

    let dates: HashMap<&str, NaiveDate> = candidates
        .iter()
        .filter_map(|c| c.date.map(|d| (c.name.as_str(), d)))
        .collect();

    let charts_dir: Option<PathBuf> = args
        .charts_dir
        .clone()
        .or_else(|| config.output_settings.charts_directory.clone())
        .map(|d| resolve(&root, &d));
    if let Some(dir) = &charts_dir {
        fs::create_dir_all(dir).context(OpeningFileSnafu {
            path: dir.display().to_string(),
        })?;
    }

    for stat in &stats {
        let date = dates.get(stat.name.as_str()).copied();
        for line in event_summary(stat, date) {
            println!("{}", line);
        }
        println!();

        if let Some(dir) = &charts_dir {
            match date {
                Some(d) => {
                    let window = extract_window(&polls, d);
                    if window.is_empty() {
                        warn!(
                            "No polls within the window of {}: insufficient data, \
                             skipping the window chart",
                            stat.name
                        );
                    } else {
                        charts::render_window_chart(dir, &event_label(stat), &stat.name, d, &window)?;
                    }
                }
                None => warn!(
                    "No withdrawal date registered for {}: skipping the window chart",
                    stat.name
                ),
            }
            charts::render_event_panel(dir, stat, &before, &after)?;
        }
    }

    // Assemble the final json
    let summary_js = build_summary_js(&config, &rules, &stats, &dates);
    let pretty_js_stats = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;

    match args
        .out
        .clone()
        .or_else(|| config.output_settings.summary_file.clone())
    {
        Some(s) if s != "stdout" => {
            let p = resolve(&root, &s);
            fs::write(&p, &pretty_js_stats).context(OpeningFileSnafu {
                path: p.display().to_string(),
            })?;
            info!("Summary written to {}", p.display());
        }
        _ => println!("stats:{}", pretty_js_stats),
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.reference.clone() {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLLS_CSV: &str = "\
date,Trump,Cruz,Rubio,Bush,Undecided
2016-02-12,34,20,15,6,24
2016-02-15,35,20,15,5,25
2016-02-22,38,21,16,,25
";

    const CANDIDATES_CSV: &str = "\
name,date,dropped
Bush,2016-02-20,true
Trump,,false
";

    const BEFORE_CSV: &str = "\
name,Trump,Cruz,Rubio,Bush,Undecided
Bush,35,20,15,5,25
";

    const AFTER_CSV: &str = "\
name,Trump,Cruz,Rubio,Bush,Undecided
Bush,38,21,16,,25
";

    const CONFIG_JSON: &str = r#"{
    "outputSettings": {
        "contestName": "test contest",
        "summaryFile": "summary.json"
    },
    "dataFiles": {
        "polls": "polls.csv",
        "candidates": "candidates.csv",
        "before": "before.csv",
        "after": "after.csv"
    }
}"#;

    fn fixture_dir(test_name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pollshift_{}_{}", test_name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("polls.csv"), POLLS_CSV).unwrap();
        fs::write(dir.join("candidates.csv"), CANDIDATES_CSV).unwrap();
        fs::write(dir.join("before.csv"), BEFORE_CSV).unwrap();
        fs::write(dir.join("after.csv"), AFTER_CSV).unwrap();
        fs::write(dir.join("config.json"), CONFIG_JSON).unwrap();
        dir
    }

    fn test_args(dir: &Path) -> Args {
        Args {
            config: dir.join("config.json").display().to_string(),
            reference: None,
            out: None,
            charts_dir: None,
            verbose: false,
        }
    }

    #[test]
    fn config_parsing() {
        let config: AnalysisConfig = serde_json::from_str(CONFIG_JSON).unwrap();
        assert_eq!(config.output_settings.contest_name, "test contest");
        assert_eq!(config.data_files.polls, "polls.csv");
        assert_eq!(config.winner_tiers, None);
        assert_eq!(config.exclusions, None);
        let rules = validate_rules(&config).unwrap();
        assert_eq!(rules.winner_tiers, StatsRules::DEFAULT_TIERS.to_vec());
        assert!(rules.exclusions.is_empty());
    }

    #[test]
    fn increasing_tiers_are_rejected() {
        let mut config: AnalysisConfig = serde_json::from_str(CONFIG_JSON).unwrap();
        config.winner_tiers = Some(vec![0.25, 0.5]);
        assert!(validate_rules(&config).is_err());
    }

    #[test]
    fn polls_reading_and_reconciliation() {
        let dir = fixture_dir("polls");
        let mut polls = io_csv::read_polls(&dir.join("polls.csv")).unwrap();
        assert_eq!(polls.num_rows(), 3);
        assert_eq!(polls.columns()[0], "Trump");
        // The blank Bush cell stays missing.
        assert_eq!(polls.row(2)[3], None);

        reconcile(&mut polls).unwrap();
        // The first row summed to 99: the deficit lands on Undecided.
        assert_eq!(polls.row(0)[4], Some(25.0));
        for idx in 0..polls.num_rows() {
            let sum: f64 = polls.row(idx).iter().flatten().sum();
            assert!((sum - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn candidates_reading() {
        let dir = fixture_dir("candidates");
        let cands = io_csv::read_candidates(&dir.join("candidates.csv")).unwrap();
        assert_eq!(cands.len(), 2);
        assert_eq!(cands[0].name, "Bush");
        assert!(cands[0].dropped);
        assert_eq!(
            cands[0].date,
            Some(NaiveDate::from_ymd_opt(2016, 2, 20).unwrap())
        );
        assert!(!cands[1].dropped);
        assert_eq!(cands[1].date, None);
    }

    #[test]
    fn snapshot_reading() {
        let dir = fixture_dir("snapshot");
        let after = io_csv::read_snapshot(&dir.join("after.csv")).unwrap();
        assert_eq!(after.events(), &["Bush".to_string()]);
        // The blank cell reads as 0: Bush had left the race.
        assert_eq!(after.row(0)[3], 0.0);
    }

    #[test]
    fn end_to_end_summary() {
        let dir = fixture_dir("end_to_end");
        run_analysis(&test_args(&dir)).unwrap();

        let summary = read_summary(dir.join("summary.json").display().to_string()).unwrap();
        let results = summary["results"].as_array().unwrap();
        assert_eq!(results.len(), 1);
        let bush = &results[0];
        assert_eq!(bush["name"], "Bush");
        assert_eq!(bush["date"], "2016-02-20");
        assert_eq!(bush["dropoutChange"], "-5.0000");
        assert_eq!(bush["positiveSum"], "5.0000");
        // Trump captured 3 of the 5 gained points: first tier winner.
        let winners = bush["winners"].as_array().unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0]["name"], "Trump");
        assert_eq!(winners[0]["share"], "0.6000");
        assert_eq!(winners[0]["before"], "35.0000");
        assert_eq!(winners[0]["after"], "38.0000");
    }

    #[test]
    fn reference_comparison() {
        let dir = fixture_dir("reference");
        run_analysis(&test_args(&dir)).unwrap();

        // The summary we just produced must compare clean against itself.
        let mut args = test_args(&dir);
        args.reference = Some(dir.join("summary.json").display().to_string());
        run_analysis(&args).unwrap();

        // And a diverging reference must be reported.
        fs::write(dir.join("other.json"), "{\"results\": []}").unwrap();
        args.reference = Some(dir.join("other.json").display().to_string());
        assert!(run_analysis(&args).is_err());
    }

    #[test]
    fn narrative_no_winner() {
        let stat = DropoutStats {
            name: "Gilmore".to_string(),
            diffs: vec![],
            dropout_change: 0.0,
            negative_sum: 0.0,
            positive_sum: 0.0,
            positive_shares: vec![],
            all_shares: vec![],
            excluded: vec![],
            active_candidates: vec![],
            winners: vec![],
        };
        let lines = event_summary(&stat, None);
        assert_eq!(lines[0], "Gilmore");
        assert!(lines[1].starts_with("No clear winner"));
    }

    #[test]
    fn event_labels_include_paired_candidates() {
        let mut stat = DropoutStats {
            name: "Santorum".to_string(),
            diffs: vec![],
            dropout_change: 0.0,
            negative_sum: 0.0,
            positive_sum: 0.0,
            positive_shares: vec![],
            all_shares: vec![],
            excluded: vec![],
            active_candidates: vec![],
            winners: vec![],
        };
        assert_eq!(event_label(&stat), "Santorum");
        stat.excluded = vec!["Paul".to_string()];
        assert_eq!(event_label(&stat), "Paul and Santorum");
    }
}
