use clap::Parser;

/// Polling-shift analysis for candidate withdrawals.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON analysis configuration: data file locations, output
    /// settings, winner tiers and paired-withdrawal exclusions. For more
    /// information about the format, read the manual of the poll_shift crate.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (file path) A reference summary in JSON format. If provided, pollshift
    /// will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path or 'stdout') If specified, the JSON summary will be written
    /// to the given location. Setting this option overrides the path that may
    /// be specified in the configuration file.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (directory) If specified, per-event charts will be written to the given
    /// directory. Setting this option overrides what may be specified in the
    /// configuration file.
    #[clap(long, value_parser)]
    pub charts_dir: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
