//! File ingestion: extension dispatch, header canonicalisation and cell
//! trimming.

use std::path::Path;

use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    data::Cell,
    dataset::{HeaderMap, Row, TabularDataset},
    error::PipelineError,
    io_utils, workbook,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
    Xls,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "xlsx" => Ok(SourceFormat::Xlsx),
            "xls" => Ok(SourceFormat::Xls),
            _ => Err(PipelineError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            }),
        }
    }
}

/// Reads a CSV or Excel file into a [`TabularDataset`].
///
/// `encoding` applies to CSV input only; when `None` the encoding is sniffed
/// from the file. Workbooks carry their own encoding.
pub fn read_dataset(
    path: &Path,
    encoding: Option<&'static Encoding>,
) -> Result<TabularDataset, PipelineError> {
    let format = SourceFormat::from_path(path)?;
    if !path.exists() {
        return Err(PipelineError::FileNotFound(path.to_path_buf()));
    }
    let dataset = match format {
        SourceFormat::Csv => {
            let encoding = match encoding {
                Some(encoding) => encoding,
                None => io_utils::detect_encoding(path)?,
            };
            info!(
                "Reading CSV file {path:?} with encoding {}",
                encoding.name()
            );
            read_csv(path, encoding)?
        }
        SourceFormat::Xlsx | SourceFormat::Xls => {
            info!("Reading {format:?} workbook {path:?}");
            read_workbook(path)?
        }
    };
    info!(
        "Read {} row(s) across {} column(s) from {path:?}",
        dataset.len(),
        dataset.headers().len()
    );
    debug!("Canonical headers: {:?}", dataset.headers().canonical());
    Ok(dataset)
}

fn read_csv(path: &Path, encoding: &'static Encoding) -> Result<TabularDataset, PipelineError> {
    let mut reader = io_utils::open_csv_reader_from_path(path, io_utils::DEFAULT_CSV_DELIMITER)?;
    let raw_headers = reader
        .byte_headers()
        .map_err(|err| PipelineError::ingest_caused_by(path, "Reading header row", err))?
        .clone();
    let headers = io_utils::decode_record(&raw_headers, encoding)
        .map_err(|err| PipelineError::ingest(path, format!("Decoding header row: {err}")))?;
    let header_map = HeaderMap::from_headers(&headers);
    let width = header_map.len();

    let mut rows = Vec::new();
    for (ordinal, record) in reader.byte_records().enumerate() {
        let record = record.map_err(|err| {
            let line = err
                .position()
                .map_or(ordinal + 2, |pos| pos.line() as usize);
            PipelineError::ingest_caused_by(path, format!("Reading row {line}"), err)
        })?;
        let line = record
            .position()
            .map_or(ordinal + 2, |pos| pos.line() as usize);
        if record.len() > width {
            return Err(PipelineError::ingest(
                path,
                format!(
                    "Row {line} has {} field(s) but the header declares {width}",
                    record.len()
                ),
            ));
        }
        let decoded = io_utils::decode_record(&record, encoding)
            .map_err(|err| PipelineError::ingest(path, format!("Decoding row {line}: {err}")))?;
        let cells = decoded.iter().map(|raw| Cell::from_text(raw)).collect();
        rows.push(Row::new(line, cells));
    }
    Ok(TabularDataset::new(header_map, rows))
}

fn read_workbook(path: &Path) -> Result<TabularDataset, PipelineError> {
    let sheet = workbook::codec()
        .read_first_sheet(path)
        .map_err(|message| PipelineError::ingest(path, message))?;
    let header_map = HeaderMap::from_headers(&sheet.headers);
    let first_data_line = sheet.header_row + 2;
    let rows = sheet
        .rows
        .into_iter()
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|cell| !cell.is_null()))
        .map(|(ordinal, cells)| Row::new(first_data_line + ordinal, cells))
        .collect();
    Ok(TabularDataset::new(header_map, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture");
        path
    }

    #[test]
    fn csv_headers_and_cells_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "in.csv", b" Vin , Start Date\n A1 ,2024-01-01\nB2,\n");
        let dataset = read_dataset(&path, None).expect("read csv");
        assert_eq!(dataset.headers().canonical(), &["VIN", "START DATE"]);
        assert_eq!(dataset.headers().original(), &["Vin", "Start Date"]);
        let vin = dataset.column("VIN").unwrap();
        let start = dataset.column("START DATE").unwrap();
        assert_eq!(dataset.rows()[0].get(vin), &Cell::Text("A1".into()));
        assert_eq!(dataset.rows()[1].get(start), &Cell::Null);
    }

    #[test]
    fn unsupported_extension_is_rejected_before_io() {
        let err = read_dataset(Path::new("/nowhere/input.txt"), None).unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_dataset(Path::new("/nowhere/input.csv"), None).unwrap_err();
        assert!(matches!(err, PipelineError::FileNotFound(_)));
    }

    #[test]
    fn overlong_rows_name_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bad.csv", b"A,B\n1,2\n1,2,3\n");
        let err = read_dataset(&path, Some(encoding_rs::UTF_8)).unwrap_err();
        assert!(err.to_string().contains("Row 3"), "{err}");
    }

    #[test]
    fn row_lines_follow_the_source_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "multi.csv",
            b"Claim #,Contact,Insured,Amount\nC1,K1,\"Ann\nLee\",85\n\n,,,85\n",
        );
        let dataset = read_dataset(&path, Some(encoding_rs::UTF_8)).unwrap();
        let lines: Vec<usize> = dataset.rows().iter().map(|row| row.line).collect();
        assert_eq!(lines, [2, 5]);
        let insured = dataset.column("INSURED").unwrap();
        assert_eq!(dataset.rows()[0].get(insured), &Cell::Text("Ann\nLee".into()));
    }

    #[cfg(feature = "xlsx")]
    #[test]
    fn workbook_rows_carry_their_sheet_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        sheet.write_string(3, 0, "Vin").unwrap();
        sheet.write_string(4, 0, "A1").unwrap();
        sheet.write_string(6, 0, "B2").unwrap();
        book.save(&path).unwrap();

        let dataset = read_dataset(&path, None).unwrap();
        let lines: Vec<usize> = dataset.rows().iter().map(|row| row.line).collect();
        assert_eq!(lines, [5, 7]);
    }

    #[test]
    fn declared_encoding_is_used_for_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "latin.csv", b"Insured\nJos\xe9\n");
        let dataset = read_dataset(&path, Some(encoding_rs::WINDOWS_1252)).unwrap();
        let insured = dataset.column("insured").unwrap();
        assert_eq!(dataset.rows()[0].get(insured), &Cell::Text("José".into()));
    }
}
