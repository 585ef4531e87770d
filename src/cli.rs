use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::ConfigKey;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sift duplicate charges and fee tiers out of invoice spreadsheets",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Flag adjacent duplicate rows and export the flagged subset
    Filter(FilterArgs),
    /// Split an invoice file into standard and non-standard fee records
    Classify(ClassifyArgs),
    /// List the available processing configurations
    Configs,
}

#[derive(Debug, Args)]
pub struct NotifyArgs {
    /// YAML notification settings; a run summary is delivered when present
    #[arg(long = "notify")]
    pub notify: Option<PathBuf>,
    /// Name recorded as the uploader in the run summary
    #[arg(long = "uploaded-by", default_value = "automated-script")]
    pub uploaded_by: String,
}

#[derive(Debug, Args)]
pub struct FilterArgs {
    /// Input spreadsheet (.csv, .xlsx or .xls)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output file for the flagged rows (.csv, .xlsx or .json)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Processing configuration to apply
    #[arg(short = 'c', long = "config", value_enum, default_value_t = ConfigKey::VinDuplicates)]
    pub config: ConfigKey,
    /// Character encoding of CSV input (detected when omitted)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Also write the flagged rows as `{"filtered": [...]}` JSON
    #[arg(long = "json")]
    pub json: Option<PathBuf>,
    #[command(flatten)]
    pub notify: NotifyArgs,
}

#[derive(Debug, Args)]
pub struct ClassifyArgs {
    /// Input invoice spreadsheet (.csv, .xlsx or .xls)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output JSON file with the fee buckets
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Character encoding of CSV input (detected when omitted)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Workbook listing rejected rows (.xlsx or .csv)
    #[arg(long = "error-report")]
    pub error_report: Option<PathBuf>,
    #[command(flatten)]
    pub notify: NotifyArgs,
}
