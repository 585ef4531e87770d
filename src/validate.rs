use log::{debug, error};

use crate::{
    dataset::{ColumnRef, TabularDataset},
    error::PipelineError,
};

/// Checks that every required column is present, reporting the full list of
/// absent columns rather than the first one.
pub fn validate_columns<S: AsRef<str>>(
    dataset: &TabularDataset,
    required: &[S],
) -> Result<Vec<ColumnRef>, PipelineError> {
    match dataset.require_columns(required) {
        Ok(columns) => {
            debug!("All {} required column(s) present", columns.len());
            Ok(columns)
        }
        Err(err) => {
            error!("{err}");
            Err(err)
        }
    }
}
