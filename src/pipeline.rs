//! End-to-end runs: ingest → validate → sort → classify → partition → export.
//!
//! Structural failures return `Err` before any row is processed. Export
//! failures do not: they are collected on the [`RunOutcome`] next to the
//! classification results so the caller can still report what was computed.

use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use encoding_rs::Encoding;
use log::{debug, info, warn};

use crate::{
    adjacency,
    config::{ProcessingConfig, Strategy},
    dataset::TabularDataset,
    error::PipelineError,
    export, ingest,
    partition::{self, FILTERED_BUCKET, FeePartition},
    report::{self, FailedRecord},
    sort, validate,
};

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    /// CSV input encoding; sniffed when absent.
    pub encoding: Option<&'static Encoding>,
    /// Extra `{"filtered": [...]}` document for adjacency runs.
    pub json_output: Option<PathBuf>,
    /// Failed-record workbook for fee runs.
    pub error_report: Option<PathBuf>,
}

impl RunRequest {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        RunRequest {
            input: input.into(),
            output: output.into(),
            ..RunRequest::default()
        }
    }
}

#[derive(Debug)]
pub enum Classification {
    Filtered {
        flagged: usize,
        filtered: TabularDataset,
    },
    Fees(FeePartition),
}

#[derive(Debug)]
pub struct RunOutcome {
    /// The sorted, classified dataset.
    pub dataset: TabularDataset,
    pub classification: Classification,
    pub artifacts: Vec<PathBuf>,
    pub export_errors: Vec<PipelineError>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn exported_cleanly(&self) -> bool {
        self.export_errors.is_empty()
    }

    /// `(total, success, error)` row counts for the run summary.
    pub fn counts(&self) -> (usize, usize, usize) {
        match &self.classification {
            Classification::Filtered { .. } => (self.dataset.len(), self.dataset.len(), 0),
            Classification::Fees(fees) => (fees.total(), fees.accepted(), fees.errors.len()),
        }
    }

    pub fn describe(&self) -> String {
        let mut description = match &self.classification {
            Classification::Filtered { flagged, .. } => {
                format!("{flagged} flagged row(s) of {}", self.dataset.len())
            }
            Classification::Fees(fees) => format!(
                "{} standard fee, {} non-standard fee, {} rejected",
                fees.standard_fee.len(),
                fees.non_standard_fee.len(),
                fees.errors.len()
            ),
        };
        for err in &self.export_errors {
            description.push_str("; ");
            description.push_str(&err.to_string());
        }
        description
    }
}

struct Exports {
    artifacts: Vec<PathBuf>,
    errors: Vec<PipelineError>,
}

impl Exports {
    fn new() -> Self {
        Exports {
            artifacts: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, path: &Path, result: Result<(), PipelineError>) {
        match result {
            Ok(()) => self.artifacts.push(path.to_path_buf()),
            Err(err) => {
                warn!("Export to {path:?} skipped: {err}");
                self.errors.push(err);
            }
        }
    }
}

/// Loads and prepares the input: read, check required columns, coerce and sort.
pub fn prepare(
    request: &RunRequest,
    config: &ProcessingConfig,
) -> Result<TabularDataset, PipelineError> {
    let mut dataset = ingest::read_dataset(&request.input, request.encoding)?;
    validate::validate_columns(&dataset, &config.required_columns)?;
    sort::coerce_numeric_columns(&mut dataset, &config.numeric_columns);
    sort::sort_dataset(&mut dataset, &config.sort_by)?;
    debug!("Prepared {} row(s) for '{}'", dataset.len(), config.key);
    Ok(dataset)
}

pub fn run(request: &RunRequest, config: &ProcessingConfig) -> Result<RunOutcome, PipelineError> {
    let started = Instant::now();
    info!(
        "Running '{}' on {:?} -> {:?}",
        config.key, request.input, request.output
    );
    let mut dataset = prepare(request, config)?;
    let mut exports = Exports::new();

    let classification = match &config.strategy {
        Strategy::Adjacency(formula) => {
            let flagged = adjacency::classify(&mut dataset, formula)?;
            let filtered = partition::filter_flagged(&dataset, &config.export_columns)?;
            exports.record(
                &request.output,
                export::export_dataset(&filtered, &request.output),
            );
            if let Some(json) = &request.json_output {
                exports.record(
                    json,
                    export::export_bucket_json(FILTERED_BUCKET, &filtered, json),
                );
            }
            Classification::Filtered { flagged, filtered }
        }
        Strategy::FeeSchedule(schedule) => {
            let fees = partition::partition_fees(&dataset, schedule)?;
            exports.record(&request.output, export::export_json(&fees, &request.output));
            if let Some(path) = &request.error_report {
                let failed = fees.errors.iter().map(FailedRecord::from).collect::<Vec<_>>();
                exports.record(path, report::write_error_report(&failed, path));
            }
            Classification::Fees(fees)
        }
    };

    let elapsed = started.elapsed();
    info!(
        "Finished '{}' in {:.3}s ({} artifact(s), {} export failure(s))",
        config.key,
        elapsed.as_secs_f64(),
        exports.artifacts.len(),
        exports.errors.len()
    );
    Ok(RunOutcome {
        dataset,
        classification,
        artifacts: exports.artifacts,
        export_errors: exports.errors,
        elapsed,
    })
}
