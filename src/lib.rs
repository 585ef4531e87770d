pub mod adjacency;
pub mod cli;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod export;
pub mod ingest;
pub mod io_utils;
pub mod notify;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod sort;
pub mod table;
pub mod validate;
pub mod workbook;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, info, warn};

use crate::{
    cli::{ClassifyArgs, Cli, Commands, FilterArgs, NotifyArgs},
    config::{ProcessingConfig, Strategy},
    notify::{Attachment, DropDirectoryTransport, MailSettings, RunStatus, RunSummary},
    pipeline::{RunOutcome, RunRequest},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("invoice_sieve", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Filter(args) => handle_filter(&args),
        Commands::Classify(args) => handle_classify(&args),
        Commands::Configs => {
            print!("{}", table::render_registry());
            Ok(())
        }
    }
}

fn handle_filter(args: &FilterArgs) -> Result<()> {
    let config = ProcessingConfig::for_key(args.config);
    if let Strategy::FeeSchedule(_) = config.strategy {
        bail!(
            "Config '{}' partitions by fee amount; use the classify command",
            config.key
        );
    }
    let mut request = RunRequest::new(&args.input, &args.output);
    request.encoding = resolve_input_encoding(args.input_encoding.as_deref())?;
    request.json_output = args.json.clone();
    execute(&request, &config, &args.notify)
}

fn handle_classify(args: &ClassifyArgs) -> Result<()> {
    let config = ProcessingConfig::for_key(config::ConfigKey::CprInvoice);
    let mut request = RunRequest::new(&args.input, &args.output);
    request.encoding = resolve_input_encoding(args.input_encoding.as_deref())?;
    request.error_report = args.error_report.clone();
    execute(&request, &config, &args.notify)
}

fn resolve_input_encoding(label: Option<&str>) -> Result<Option<&'static encoding_rs::Encoding>> {
    label
        .map(|label| io_utils::resolve_encoding(Some(label)))
        .transpose()
}

fn execute(request: &RunRequest, config: &ProcessingConfig, notify_args: &NotifyArgs) -> Result<()> {
    let settings = notify_args
        .notify
        .as_deref()
        .map(MailSettings::load)
        .transpose()?;
    let summary = RunSummary::new(
        &request.input,
        &notify_args.uploaded_by,
        Local::now().naive_local(),
    );

    let outcome = match pipeline::run(request, config) {
        Ok(outcome) => outcome,
        Err(err) => {
            if let Some(settings) = &settings {
                send_summary(settings, &summary.failed(&err), Vec::new());
            }
            return Err(err).with_context(|| format!("Processing {:?}", request.input));
        }
    };

    report_outcome(&outcome);
    if let Some(settings) = &settings {
        let (total, success, error) = outcome.counts();
        let mut summary = summary
            .with_counts(total, success, error)
            .described(outcome.describe());
        if !outcome.exported_cleanly() && summary.status == RunStatus::ProcessingCompleted {
            summary.status = RunStatus::CompletedWithErrors;
        }
        let attachments = outcome
            .artifacts
            .iter()
            .cloned()
            .map(Attachment::Path)
            .collect();
        send_summary(settings, &summary, attachments);
    }

    match outcome.export_errors.into_iter().next() {
        Some(err) => Err(err).with_context(|| format!("Exporting results of {:?}", request.input)),
        None => Ok(()),
    }
}

fn report_outcome(outcome: &RunOutcome) {
    info!("{}", outcome.describe());
    for path in &outcome.artifacts {
        info!("Wrote {path:?}");
    }
}

fn send_summary(settings: &MailSettings, summary: &RunSummary, attachments: Vec<Attachment>) {
    let transport = DropDirectoryTransport::new(&settings.outbox);
    let outcome = notify::notify(&transport, settings, summary, attachments);
    if !outcome.is_delivered() {
        warn!("Run summary for {} was not delivered", summary.file_name);
    }
}
