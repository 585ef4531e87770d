//! I/O utilities for encoding resolution, CSV reading and atomic writes.
//!
//! All file I/O in invoice-sieve flows through this module. It provides:
//!
//! - **Encoding**: explicit labels resolved through `encoding_rs`, or a best
//!   guess sniffed from the first bytes of the file with `chardet`.
//! - **Reader construction**: `open_csv_reader` over raw bytes so each field
//!   is decoded with the resolved encoding.
//! - **Atomic writes**: artifacts are staged in a temporary file next to the
//!   destination and renamed into place, so a failed export leaves no partial
//!   output behind.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use tempfile::NamedTempFile;

use crate::error::PipelineError;

pub const DEFAULT_CSV_DELIMITER: u8 = b',';

/// Bytes sampled when sniffing a file's encoding.
pub const ENCODING_SAMPLE_BYTES: usize = 10_000;

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Normalizes a detector label to something `encoding_rs` understands.
/// Plain ASCII is treated as UTF-8 (its superset) rather than the WHATWG
/// mapping to windows-1252.
fn normalize_detected_label(label: &str) -> &str {
    match label.to_ascii_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8",
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1",
        "windows-1252" | "cp1252" => "windows-1252",
        _ => label,
    }
}

/// Best-guess encoding from a byte sample; unknown guesses fall back to UTF-8.
pub fn detect_encoding_from_bytes(sample: &[u8]) -> &'static Encoding {
    let (charset, confidence, _) = chardet::detect(sample);
    let label = normalize_detected_label(&charset);
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8);
    debug!(
        "Detected encoding '{charset}' (confidence {confidence:.2}) -> {}",
        encoding.name()
    );
    encoding
}

pub fn detect_encoding(path: &Path) -> Result<&'static Encoding, PipelineError> {
    let file = File::open(path)
        .map_err(|err| PipelineError::ingest_caused_by(path, "Opening file to sniff encoding", err))?;
    let mut sample = Vec::with_capacity(ENCODING_SAMPLE_BYTES);
    file.take(ENCODING_SAMPLE_BYTES as u64)
        .read_to_end(&mut sample)
        .map_err(|err| PipelineError::ingest_caused_by(path, "Reading encoding sample", err))?;
    Ok(detect_encoding_from_bytes(&sample))
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> Result<csv::Reader<BufReader<File>>, PipelineError> {
    let file = File::open(path)
        .map_err(|err| PipelineError::ingest_caused_by(path, "Opening input file", err))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Stages the output in a temporary file in the destination directory and
/// renames it over `path` once `write` succeeds.
pub fn write_atomically<F>(path: &Path, write: F) -> Result<(), PipelineError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), PipelineError>,
{
    let directory = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .map_err(|err| PipelineError::from_export_io(path, err))?;
            parent.to_path_buf()
        }
        None => std::path::PathBuf::from("."),
    };
    let staged =
        NamedTempFile::new_in(&directory).map_err(|err| PipelineError::from_export_io(path, err))?;
    {
        let mut writer = BufWriter::new(staged.as_file());
        write(&mut writer)?;
        writer
            .flush()
            .map_err(|err| PipelineError::from_export_io(path, err))?;
    }
    staged
        .persist(path)
        .map_err(|err| PipelineError::from_export_io(path, err.error))?;
    Ok(())
}
