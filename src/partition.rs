//! Bucket assignment for classified datasets.
//!
//! Two strategies are supported:
//!
//! - **Derived flag**: rows whose [`DERIVED_COLUMN`] is 1 form the `filtered`
//!   bucket; everything else is left out of the export.
//! - **Fee schedule**: each row passes an identity guard, is built into an
//!   [`InvoiceRecord`] and lands in `standardFee` or `nonStandardFee` by amount.
//!   Rows failing the guard go to `errors` with their line and reason.

use log::{info, warn};
use serde::Serialize;

use crate::{
    adjacency::DERIVED_COLUMN,
    config::{ExportColumns, FeeSchedule},
    data::{clean_value, parse_whole_amount},
    dataset::{ColumnRef, Row, TabularDataset},
    error::{PipelineError, RejectionReason, RowRejection},
    record::{InvoiceColumns, InvoiceRecord},
};

pub const FILTERED_BUCKET: &str = "filtered";
pub const STANDARD_FEE_BUCKET: &str = "standardFee";
pub const NON_STANDARD_FEE_BUCKET: &str = "nonStandardFee";
pub const ERRORS_BUCKET: &str = "errors";

/// Keeps rows flagged by the adjacency classifier, restricted to the export
/// columns. The result keeps the source's original header spellings.
pub fn filter_flagged(
    dataset: &TabularDataset,
    export_columns: &ExportColumns,
) -> Result<TabularDataset, PipelineError> {
    let flag = dataset.require_columns(&[DERIVED_COLUMN])?[0];
    let flagged = dataset.filter_rows(|row| row.get(flag).as_number() == Some(1.0));
    let projected = match export_columns {
        ExportColumns::All => flagged,
        ExportColumns::Only(names) => {
            let columns = flagged.require_columns(names)?;
            flagged.project(&columns)
        }
    };
    info!(
        "Filtered rows where {DERIVED_COLUMN} == 1: {}",
        projected.len()
    );
    Ok(projected)
}

/// A row that failed the identity guard, with what the error report needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    pub rejection: RowRejection,
    pub invoice_number: String,
    pub claim_number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FeePartition {
    #[serde(rename = "standardFee")]
    pub standard_fee: Vec<InvoiceRecord>,
    #[serde(rename = "nonStandardFee")]
    pub non_standard_fee: Vec<InvoiceRecord>,
    #[serde(skip)]
    pub errors: Vec<RejectedRow>,
}

impl FeePartition {
    pub fn accepted(&self) -> usize {
        self.standard_fee.len() + self.non_standard_fee.len()
    }

    pub fn total(&self) -> usize {
        self.accepted() + self.errors.len()
    }
}

/// A row that passed the identity guard.
#[derive(Debug)]
pub struct AcceptedRow<'a> {
    pub row: &'a Row,
    pub standard_fee: bool,
}

struct FeeClassifier<'a> {
    schedule: &'a FeeSchedule,
    amount: ColumnRef,
    identity: Vec<(ColumnRef, &'a str)>,
}

impl<'a> FeeClassifier<'a> {
    fn new(dataset: &'a TabularDataset, schedule: &'a FeeSchedule) -> Result<Self, PipelineError> {
        let amount = dataset.require_columns(&[&schedule.amount_column])?[0];
        let identity = dataset
            .require_columns(&schedule.identity_columns)?
            .into_iter()
            .map(|column| (column, dataset.headers().original_at(column)))
            .collect();
        Ok(FeeClassifier {
            schedule,
            amount,
            identity,
        })
    }

    fn accept<'r>(&self, row: &'r Row) -> Result<AcceptedRow<'r>, RowRejection> {
        if self
            .identity
            .iter()
            .all(|(column, _)| row.get(*column).is_blank())
        {
            return Err(RowRejection {
                line: row.line,
                reason: RejectionReason::MissingIdentity(
                    self.identity.iter().map(|(_, name)| name.to_string()).collect(),
                ),
            });
        }
        let standard_fee = parse_whole_amount(row.get(self.amount))
            .is_some_and(|amount| self.schedule.standard_amounts.contains(&amount));
        Ok(AcceptedRow { row, standard_fee })
    }
}

/// Splits every row into exactly one of `standardFee`, `nonStandardFee` or
/// `errors`.
pub fn partition_fees(
    dataset: &TabularDataset,
    schedule: &FeeSchedule,
) -> Result<FeePartition, PipelineError> {
    let classifier = FeeClassifier::new(dataset, schedule)?;
    let columns = InvoiceColumns::resolve(dataset);
    let mut partition = FeePartition::default();

    for row in dataset.rows() {
        match classifier.accept(row) {
            Ok(accepted) => {
                let record = columns.build(accepted.row);
                if accepted.standard_fee {
                    partition.standard_fee.push(record);
                } else {
                    partition.non_standard_fee.push(record);
                }
            }
            Err(rejection) => {
                warn!("{}", PipelineError::from(rejection.clone()));
                partition.errors.push(RejectedRow {
                    invoice_number: clean_value(row.get_or_null(columns.txn())),
                    claim_number: clean_value(row.get_or_null(columns.claim())),
                    rejection,
                });
            }
        }
    }

    info!(
        "{}: {}, {}: {}, {}: {}",
        STANDARD_FEE_BUCKET,
        partition.standard_fee.len(),
        NON_STANDARD_FEE_BUCKET,
        partition.non_standard_fee.len(),
        ERRORS_BUCKET,
        partition.errors.len()
    );
    Ok(partition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adjacency::classify,
        config::vin_duplicate_formula,
        data::Cell,
    };

    fn invoice(rows: &[[&str; 4]]) -> TabularDataset {
        TabularDataset::from_cells(
            &["Claim #", "Contact", "Insured", "Amount"],
            rows.iter()
                .map(|r| r.iter().map(|v| Cell::from(*v)).collect())
                .collect(),
        )
    }

    #[test]
    fn amounts_select_the_fee_bucket() {
        let dataset = invoice(&[
            ["C1", "K1", "Ann", "$85.00"],
            ["C2", "K2", "Bob", "$86.00"],
            ["C3", "K3", "Cy", "abc"],
            ["C4", "K4", "Di", "$140"],
            ["C5", "K5", "Ed", "85.5"],
        ]);
        let partition = partition_fees(&dataset, &FeeSchedule::default()).unwrap();
        let claims = |records: &[InvoiceRecord]| {
            records.iter().map(|r| r.claim_number.clone()).collect::<Vec<_>>()
        };
        assert_eq!(claims(&partition.standard_fee), vec!["C1", "C4"]);
        assert_eq!(claims(&partition.non_standard_fee), vec!["C2", "C3", "C5"]);
        assert!(partition.errors.is_empty());
    }

    #[test]
    fn blank_identity_rejects_the_row() {
        let dataset = invoice(&[
            ["", "", "", "$85.00"],
            ["Null", " ", "", "$140"],
            ["", "", "Ann", "$85.00"],
        ]);
        let partition = partition_fees(&dataset, &FeeSchedule::default()).unwrap();
        assert_eq!(partition.errors.len(), 2);
        assert_eq!(partition.errors[0].rejection.line, 2);
        assert_eq!(partition.errors[1].rejection.line, 3);
        assert_eq!(
            partition.errors[0].rejection.reason,
            RejectionReason::MissingIdentity(vec![
                "Claim #".to_string(),
                "Contact".to_string(),
                "Insured".to_string()
            ])
        );
        assert_eq!(partition.standard_fee.len(), 1);
        assert_eq!(partition.total(), dataset.len());
    }

    #[test]
    fn fee_partition_serializes_two_buckets() {
        let dataset = invoice(&[["C1", "K1", "Ann", "85"], ["", "", "", "85"]]);
        let partition = partition_fees(&dataset, &FeeSchedule::default()).unwrap();
        let json = serde_json::to_value(&partition).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["standardFee", "nonStandardFee"]);
    }

    #[test]
    fn filter_keeps_flagged_rows_and_original_headers() {
        let mut dataset = TabularDataset::from_cells(
            &["Vin", "Term", "Start Date", "Price"],
            vec![
                vec![Cell::from("A1"), Cell::from("12"), Cell::from("2024-01-01"), Cell::Number(1.6)],
                vec![Cell::from("A1"), Cell::from("12"), Cell::from("2024-01-01"), Cell::Number(1.6)],
            ],
        );
        classify(&mut dataset, &vin_duplicate_formula()).unwrap();
        let filtered = filter_flagged(
            &dataset,
            &ExportColumns::Only(vec!["VIN".into(), "COUNT".into()]),
        )
        .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered.headers().original(), &["Vin", "COUNT"]);
        assert_eq!(filtered.rows()[0].line, 3);
    }

    #[test]
    fn filter_requires_the_derived_column() {
        let dataset = invoice(&[]);
        let err = filter_flagged(&dataset, &ExportColumns::All).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumns(_)));
    }

    #[test]
    fn rejection_names_the_physical_line_after_a_multiline_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpr.csv");
        std::fs::write(&path, "Claim #,Contact,Insured,Amount\nC1,K1,\"Ann\nLee\",85\n,,,85\n")
            .unwrap();
        let dataset = crate::ingest::read_dataset(&path, Some(encoding_rs::UTF_8)).unwrap();
        let partition = partition_fees(&dataset, &FeeSchedule::default()).unwrap();
        assert_eq!(partition.standard_fee.len(), 1);
        assert_eq!(partition.errors.len(), 1);
        assert_eq!(partition.errors[0].rejection.line, 4);
    }
}
