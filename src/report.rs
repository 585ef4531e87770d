//! Failed-record report: one row per record that could not be processed.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    error::PipelineError,
    export::{Table, export_table},
    partition::RejectedRow,
};

pub const ERROR_REPORT_SHEET: &str = "Failed Invoices";

const ERROR_REPORT_HEADERS: [&str; 4] = ["Invoice #", "Claim #", "Status", "Status Description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureStatus {
    ValidationFailed,
    ProcessingFailed,
}

impl fmt::Display for FailureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStatus::ValidationFailed => "VALIDATION_FAILED",
            FailureStatus::ProcessingFailed => "PROCESSING_FAILED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedRecord {
    pub invoice_number: String,
    pub claim_number: String,
    pub status: FailureStatus,
    pub status_description: String,
}

impl From<&RejectedRow> for FailedRecord {
    fn from(rejected: &RejectedRow) -> Self {
        FailedRecord {
            invoice_number: rejected.invoice_number.clone(),
            claim_number: rejected.claim_number.clone(),
            status: FailureStatus::ValidationFailed,
            status_description: rejected.rejection.to_string(),
        }
    }
}

/// Writes the report as XLSX or CSV, depending on the extension of `path`.
pub fn write_error_report(records: &[FailedRecord], path: &Path) -> Result<(), PipelineError> {
    let headers = ERROR_REPORT_HEADERS.map(String::from);
    let rows = records
        .iter()
        .map(|record| {
            vec![
                Cell::Text(record.invoice_number.clone()),
                Cell::Text(record.claim_number.clone()),
                Cell::Text(record.status.to_string()),
                Cell::Text(record.status_description.clone()),
            ]
        })
        .collect::<Vec<_>>();
    export_table(
        Table {
            sheet_name: ERROR_REPORT_SHEET,
            headers: &headers,
            rows: &rows,
        },
        path,
    )
}
