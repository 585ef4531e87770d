//! Export sink: CSV, XLSX or JSON chosen by the destination's extension.
//!
//! Every artifact is written through [`io_utils::write_atomically`], so a
//! destination that cannot be replaced ([`PipelineError::ExportLocked`]) or a
//! failing encoder leaves any existing file untouched.

use std::{io::Write, path::Path};

use log::{error, info};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    data::Cell,
    dataset::TabularDataset,
    error::PipelineError,
    io_utils, workbook,
};

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            "json" => Ok(ExportFormat::Json),
            _ => Err(PipelineError::UnsupportedExportFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            }),
        }
    }
}

/// A table ready for export: display headers plus rows of cells.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    pub sheet_name: &'a str,
    pub headers: &'a [String],
    pub rows: &'a [Vec<Cell>],
}

fn log_failure(path: &Path, err: PipelineError) -> PipelineError {
    match &err {
        PipelineError::ExportLocked(_) => error!(
            "Permission denied while writing to {path:?}; make sure the file is not open in another application"
        ),
        other => error!("Error exporting {path:?}: {other}"),
    }
    err
}

fn write_csv(out: &mut dyn Write, path: &Path, table: Table<'_>) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(out);
    let csv_err = |err: csv::Error| PipelineError::export(path, err.to_string());
    writer.write_record(table.headers).map_err(csv_err)?;
    for row in table.rows {
        writer
            .write_record(row.iter().map(Cell::as_display))
            .map_err(csv_err)?;
    }
    writer
        .flush()
        .map_err(|err| PipelineError::from_export_io(path, err))
}

fn write_json<T: Serialize + ?Sized>(
    out: &mut dyn Write,
    path: &Path,
    value: &T,
) -> Result<(), PipelineError> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|err| PipelineError::export(path, err.to_string()))?;
    out.write_all(b"\n")
        .map_err(|err| PipelineError::from_export_io(path, err))
}

/// Writes a table as CSV or XLSX. JSON destinations receive an array of
/// objects keyed by header.
pub fn export_table(table: Table<'_>, path: &Path) -> Result<(), PipelineError> {
    let format = ExportFormat::from_path(path)?;
    let result = match format {
        ExportFormat::Csv => io_utils::write_atomically(path, |out| write_csv(out, path, table)),
        ExportFormat::Xlsx => {
            let bytes = workbook::codec()
                .encode_sheet(table.sheet_name, table.headers, table.rows)
                .map_err(|message| PipelineError::export(path, message))?;
            io_utils::write_atomically(path, |out| {
                out.write_all(&bytes)
                    .map_err(|err| PipelineError::from_export_io(path, err))
            })
        }
        ExportFormat::Json => {
            let objects = table_objects(table);
            io_utils::write_atomically(path, |out| write_json(out, path, &objects))
        }
    };
    result.map_err(|err| log_failure(path, err))?;
    info!("Exported {} row(s) to {path:?}", table.rows.len());
    Ok(())
}

fn table_objects(table: Table<'_>) -> Vec<Value> {
    table
        .rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> = table
                .headers
                .iter()
                .cloned()
                .zip(row.iter().map(|cell| serde_json::to_value(cell).unwrap_or(Value::Null)))
                .collect();
            Value::Object(object)
        })
        .collect()
}

/// Exports a dataset with its original header spellings.
pub fn export_dataset(dataset: &TabularDataset, path: &Path) -> Result<(), PipelineError> {
    let rows = dataset
        .rows()
        .iter()
        .map(|row| row.cells().to_vec())
        .collect::<Vec<_>>();
    export_table(
        Table {
            sheet_name: DEFAULT_SHEET_NAME,
            headers: dataset.headers().original(),
            rows: &rows,
        },
        path,
    )
}

/// Writes `{"<bucket>": [ ...rows keyed by original header... ]}`.
pub fn export_bucket_json(
    bucket: &str,
    dataset: &TabularDataset,
    path: &Path,
) -> Result<(), PipelineError> {
    let rows = dataset
        .rows()
        .iter()
        .map(|row| row.cells().to_vec())
        .collect::<Vec<_>>();
    let objects = table_objects(Table {
        sheet_name: DEFAULT_SHEET_NAME,
        headers: dataset.headers().original(),
        rows: &rows,
    });
    let mut document = Map::new();
    document.insert(bucket.to_string(), Value::Array(objects));
    export_json(&document, path)
}

/// Serializes any record collection to a `.json` destination.
pub fn export_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), PipelineError> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Json => {}
        _ => {
            return Err(PipelineError::UnsupportedExportFormat {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .unwrap_or_default()
                    .to_string(),
            });
        }
    }
    io_utils::write_atomically(path, |out| write_json(out, path, value))
        .map_err(|err| log_failure(path, err))?;
    info!("Wrote JSON output to {path:?}");
    Ok(())
}
