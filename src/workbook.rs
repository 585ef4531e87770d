//! Spreadsheet workbook encode/decode seam.
//!
//! The pipeline only needs two operations from a workbook library: read the
//! first worksheet as a grid of cells, and render a single worksheet to bytes.
//! Both go through the process-wide [`WorkbookCodec`] provider. With the
//! `xlsx` feature (default) the provider is backed by `calamine` for reading
//! and `rust_xlsxwriter` for writing; without it every workbook operation
//! reports that workbook support is unavailable.

use std::{path::Path, sync::OnceLock};

use crate::data::Cell;

/// A decoded worksheet: the header row and the data rows beneath it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    /// 0-based sheet row holding the headers; data starts on the next row.
    pub header_row: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub trait WorkbookCodec: Send + Sync {
    /// Reads the first worksheet; the first row is the header row.
    fn read_first_sheet(&self, path: &Path) -> Result<Sheet, String>;

    /// Encodes one worksheet into workbook bytes.
    fn encode_sheet(
        &self,
        sheet_name: &str,
        headers: &[String],
        rows: &[Vec<Cell>],
    ) -> Result<Vec<u8>, String>;
}

#[cfg(feature = "xlsx")]
mod native {
    use std::path::Path;

    use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
    use rust_xlsxwriter::Workbook;

    use super::{Sheet, WorkbookCodec};
    use crate::data::Cell;

    pub(super) struct NativeCodec;

    /// Date-only when the time part is midnight, otherwise date and time.
    pub(super) fn format_datetime(value: NaiveDateTime) -> String {
        if value.time() == NaiveTime::MIN {
            value.format("%Y-%m-%d").to_string()
        } else {
            value.format("%Y-%m-%d %H:%M:%S").to_string()
        }
    }

    fn excel_datetime(value: &ExcelDateTime) -> Cell {
        if value.is_duration() {
            return match value.as_duration() {
                Some(duration) => {
                    let secs = duration.num_seconds();
                    Cell::Text(format!(
                        "{:02}:{:02}:{:02}",
                        secs / 3600,
                        (secs % 3600) / 60,
                        secs % 60
                    ))
                }
                None => Cell::Number(value.as_f64()),
            };
        }
        match value.as_datetime() {
            Some(datetime) => Cell::Text(format_datetime(datetime)),
            None => Cell::Number(value.as_f64()),
        }
    }

    fn iso_datetime(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Cell::Text(format_datetime(datetime));
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Cell::Text(format_datetime(date.and_time(NaiveTime::MIN)));
        }
        Cell::from_text(trimmed)
    }

    pub(super) fn to_cell(data: &Data) -> Cell {
        match data {
            Data::Empty | Data::Error(_) => Cell::Null,
            Data::String(s) => Cell::from_text(s),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::DateTime(dt) => excel_datetime(dt),
            Data::DateTimeIso(s) => iso_datetime(s),
            Data::DurationIso(s) => Cell::from_text(s),
        }
    }

    fn header_text(data: &Data) -> String {
        match data {
            Data::String(s) => s.clone(),
            other => to_cell(other).as_display(),
        }
    }

    impl WorkbookCodec for NativeCodec {
        fn read_first_sheet(&self, path: &Path) -> Result<Sheet, String> {
            let mut workbook = open_workbook_auto(path).map_err(|err| err.to_string())?;
            let range = workbook
                .worksheet_range_at(0)
                .ok_or_else(|| "Workbook contains no worksheets".to_string())?
                .map_err(|err| err.to_string())?;
            let header_row = range.start().map_or(0, |(row, _)| row as usize);
            let mut rows = range.rows();
            let headers = match rows.next() {
                Some(cells) => cells.iter().map(header_text).collect(),
                None => return Ok(Sheet::default()),
            };
            let rows = rows
                .map(|row| row.iter().map(to_cell).collect())
                .collect();
            Ok(Sheet {
                header_row,
                headers,
                rows,
            })
        }

        fn encode_sheet(
            &self,
            sheet_name: &str,
            headers: &[String],
            rows: &[Vec<Cell>],
        ) -> Result<Vec<u8>, String> {
            let mut workbook = Workbook::new();
            let worksheet = workbook.add_worksheet();
            worksheet
                .set_name(sheet_name)
                .map_err(|err| err.to_string())?;
            for (col, header) in headers.iter().enumerate() {
                worksheet
                    .write_string(0, col as u16, header.as_str())
                    .map_err(|err| err.to_string())?;
            }
            for (idx, row) in rows.iter().enumerate() {
                let row_num = (idx + 1) as u32;
                for (col, cell) in row.iter().enumerate() {
                    let col = col as u16;
                    match cell {
                        Cell::Null => {}
                        Cell::Text(s) => {
                            worksheet
                                .write_string(row_num, col, s.as_str())
                                .map_err(|err| err.to_string())?;
                        }
                        Cell::Number(n) => {
                            worksheet
                                .write_number(row_num, col, *n)
                                .map_err(|err| err.to_string())?;
                        }
                    }
                }
            }
            workbook.save_to_buffer().map_err(|err| err.to_string())
        }
    }
}

#[cfg(not(feature = "xlsx"))]
struct UnavailableCodec;

#[cfg(not(feature = "xlsx"))]
impl WorkbookCodec for UnavailableCodec {
    fn read_first_sheet(&self, _path: &Path) -> Result<Sheet, String> {
        Err("workbook support is not compiled in (enable the `xlsx` feature)".to_string())
    }

    fn encode_sheet(&self, _: &str, _: &[String], _: &[Vec<Cell>]) -> Result<Vec<u8>, String> {
        Err("workbook support is not compiled in (enable the `xlsx` feature)".to_string())
    }
}

static WORKBOOK_CODEC: OnceLock<Box<dyn WorkbookCodec>> = OnceLock::new();

fn default_codec() -> Box<dyn WorkbookCodec> {
    #[cfg(feature = "xlsx")]
    {
        Box::new(native::NativeCodec)
    }
    #[cfg(not(feature = "xlsx"))]
    {
        Box::new(UnavailableCodec)
    }
}

pub fn codec() -> &'static dyn WorkbookCodec {
    WORKBOOK_CODEC.get_or_init(default_codec).as_ref()
}

/// Install a custom workbook codec. Must happen before the first workbook
/// read or write.
pub fn set_codec(codec: Box<dyn WorkbookCodec>) -> Result<(), &'static str> {
    WORKBOOK_CODEC
        .set(codec)
        .map_err(|_| "Workbook codec already set")
}
