//! Error taxonomy for the ingest → classify → export pipeline.
//!
//! Structural failures ([`PipelineError::FileNotFound`],
//! [`PipelineError::Ingest`], [`PipelineError::UnsupportedFormat`],
//! [`PipelineError::MissingColumns`]) abort a run before any row is processed.
//! [`RowRejection`] is row-scoped and never aborts; the partitioner collects
//! rejections into a list. Export and notification failures are reported by
//! their own stage and leave upstream results intact.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Input file does not exist: {0:?}")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path:?}: {message}")]
    Ingest {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Unsupported input format {extension:?} for {path:?}; use .csv, .xlsx or .xls")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Unsupported export format {extension:?} for {path:?}; use .csv, .xlsx or .json")]
    UnsupportedExportFormat { path: PathBuf, extension: String },

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {line} rejected: {reason}")]
    RowRejected { line: usize, reason: RejectionReason },

    #[error("Cannot write to {0:?}; close the file if another application has it open and retry")]
    ExportLocked(PathBuf),

    #[error("Failed to export {path:?}: {message}")]
    Export {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Notification delivery failed: {0}")]
    NotificationFailure(String),
}

impl PipelineError {
    pub fn ingest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PipelineError::Ingest {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    pub fn ingest_caused_by<E>(path: impl Into<PathBuf>, message: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PipelineError::Ingest {
            path: path.into(),
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Maps a write failure onto the export taxonomy. Permission denied means
    /// the destination is held open elsewhere (or read-only) and is reported as
    /// [`PipelineError::ExportLocked`].
    pub fn from_export_io(path: impl Into<PathBuf>, err: io::Error) -> Self {
        let path = path.into();
        if err.kind() == io::ErrorKind::PermissionDenied {
            return PipelineError::ExportLocked(path);
        }
        PipelineError::Export {
            path,
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    pub fn export(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PipelineError::Export {
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }
}

/// Why a single row was kept out of every bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// All identity fields were blank or the `Null` sentinel.
    MissingIdentity(Vec<String>),
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::MissingIdentity(fields) => {
                write!(f, "{} are all missing", fields.join(", "))
            }
        }
    }
}

/// A rejected row: its 1-based source line (header is line 1) and the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    pub line: usize,
    pub reason: RejectionReason,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Row {}: {}", self.line, self.reason)
    }
}

impl From<RowRejection> for PipelineError {
    fn from(rejection: RowRejection) -> Self {
        PipelineError::RowRejected {
            line: rejection.line,
            reason: rejection.reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_lists_every_column() {
        let err = PipelineError::MissingColumns(vec!["TERM".into(), "PRICE".into()]);
        assert_eq!(err.to_string(), "Missing required columns: TERM, PRICE");
    }

    #[test]
    fn permission_denied_maps_to_export_locked() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "locked");
        let err = PipelineError::from_export_io("out.xlsx", io_err);
        assert!(matches!(err, PipelineError::ExportLocked(_)));

        let other = io::Error::other("disk full");
        let err = PipelineError::from_export_io("out.xlsx", other);
        assert!(matches!(err, PipelineError::Export { .. }));
    }

    #[test]
    fn row_rejection_names_line_and_fields() {
        let rejection = RowRejection {
            line: 7,
            reason: RejectionReason::MissingIdentity(vec![
                "Claim #".into(),
                "Contact".into(),
                "Insured".into(),
            ]),
        };
        let err: PipelineError = rejection.into();
        assert_eq!(
            err.to_string(),
            "Row 7 rejected: Claim #, Contact, Insured are all missing"
        );
    }
}
