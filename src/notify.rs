//! Run summaries and their delivery to stakeholders.
//!
//! A [`RunSummary`] is rendered as an HTML table and handed, with the run's
//! artifacts attached, to a [`MailTransport`]. Delivery is attempted once;
//! a failure is logged and reported through [`NotificationOutcome`] but never
//! aborts the pipeline.

use std::{
    fmt, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const DEFAULT_SUBJECT_PREFIX: &str = "Processed VAS File";
const DEFAULT_SIGNATURE: &str = "Thanks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    ProcessingCompleted,
    CompletedWithErrors,
    ProcessingFailed,
}

impl RunStatus {
    pub fn from_counts(success: usize, error: usize) -> Self {
        match (success, error) {
            (_, 0) => RunStatus::ProcessingCompleted,
            (0, _) => RunStatus::ProcessingFailed,
            _ => RunStatus::CompletedWithErrors,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStatus::ProcessingCompleted => "PROCESSING_COMPLETED",
            RunStatus::CompletedWithErrors => "COMPLETED_WITH_ERRORS",
            RunStatus::ProcessingFailed => "PROCESSING_FAILED",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub file_name: String,
    pub uploaded_by: String,
    /// ISO-8601 timestamp; only the date part is shown in the message.
    pub uploaded_date: String,
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub pending: usize,
    pub status: RunStatus,
    pub status_description: String,
}

impl RunSummary {
    pub fn new(input: &Path, uploaded_by: &str, uploaded_at: NaiveDateTime) -> Self {
        RunSummary {
            file_name: file_name_of(input),
            uploaded_by: uploaded_by.to_string(),
            uploaded_date: uploaded_at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            total: 0,
            success: 0,
            error: 0,
            pending: 0,
            status: RunStatus::ProcessingCompleted,
            status_description: String::new(),
        }
    }

    /// Fills the counts and derives the terminal status from them.
    pub fn with_counts(mut self, total: usize, success: usize, error: usize) -> Self {
        self.total = total;
        self.success = success;
        self.error = error;
        self.pending = total.saturating_sub(success + error);
        self.status = RunStatus::from_counts(success, error);
        self
    }

    pub fn failed(mut self, reason: impl fmt::Display) -> Self {
        self.status = RunStatus::ProcessingFailed;
        self.status_description = reason.to_string();
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.status_description = description.into();
        self
    }

    pub fn uploaded_day(&self) -> &str {
        self.uploaded_date
            .split('T')
            .next()
            .unwrap_or(&self.uploaded_date)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Renders the summary table followed by the attachment names and signature.
pub fn render_html(summary: &RunSummary, attachment_names: &[String], signature: &str) -> String {
    let rows = [
        ("File Name", summary.file_name.clone()),
        ("Uploaded By", summary.uploaded_by.clone()),
        ("Uploaded Date", summary.uploaded_day().to_string()),
        ("Total Records", summary.total.to_string()),
        ("Success Records", summary.success.to_string()),
        ("Error Records", summary.error.to_string()),
        ("Pending Records", summary.pending.to_string()),
        ("Status", summary.status.to_string()),
        ("Status Description", summary.status_description.clone()),
    ];

    let mut html = String::from("<p>Please find the invoice file processing result as below:</p>\n");
    html.push_str(
        "<table border=\"1\" cellpadding=\"6\" cellspacing=\"0\" style=\"border-collapse: collapse;\">\n",
    );
    for (label, value) in rows {
        html.push_str(&format!(
            "  <tr><td><strong>{label}</strong></td><td>{}</td></tr>\n",
            escape_html(&value)
        ));
    }
    html.push_str("</table>\n");
    if !attachment_names.is_empty() {
        let names = attachment_names
            .iter()
            .map(|name| format!("<strong>{}</strong>", escape_html(name)))
            .collect::<Vec<_>>()
            .join(", ");
        html.push_str(&format!("<p>Attached: {names}</p>\n"));
    }
    html.push_str(&format!("<p>{}</p>\n", escape_html(signature)));
    html
}

/// MIME type by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Bytes {
        filename: String,
        content_type: String,
        data: Vec<u8>,
    },
    /// A file on disk; its MIME type is inferred from the extension.
    Path(PathBuf),
}

impl Attachment {
    pub fn filename(&self) -> String {
        match self {
            Attachment::Bytes { filename, .. } => filename.clone(),
            Attachment::Path(path) => file_name_of(path),
        }
    }

    pub fn content_type(&self) -> String {
        match self {
            Attachment::Bytes { content_type, .. } => content_type.clone(),
            Attachment::Path(path) => content_type_for(path).to_string(),
        }
    }

    pub fn load(&self) -> Result<Vec<u8>, PipelineError> {
        match self {
            Attachment::Bytes { data, .. } => Ok(data.clone()),
            Attachment::Path(path) => fs::read(path).map_err(|err| {
                PipelineError::NotificationFailure(format!(
                    "cannot read attachment {path:?}: {err}"
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body_html: String,
    pub attachments: Vec<Attachment>,
}

/// Notification settings loaded from YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    pub sender: String,
    pub to: Vec<String>,
    #[serde(default)]
    pub cc: Vec<String>,
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Directory receiving one sub-directory per delivered message.
    pub outbox: PathBuf,
    #[serde(default = "default_signature")]
    pub signature: String,
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_string()
}

fn default_signature() -> String {
    DEFAULT_SIGNATURE.to_string()
}

impl MailSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Reading notification settings {path:?}"))?;
        let settings: MailSettings = serde_yaml::from_str(&raw)
            .with_context(|| format!("Parsing notification settings {path:?}"))?;
        if settings.to.is_empty() {
            anyhow::bail!("Notification settings {path:?} list no recipients");
        }
        Ok(settings)
    }

    pub fn compose(&self, summary: &RunSummary, attachments: Vec<Attachment>) -> MailMessage {
        let names = attachments.iter().map(Attachment::filename).collect::<Vec<_>>();
        MailMessage {
            from: self.sender.clone(),
            to: self.to.clone(),
            cc: self.cc.clone(),
            subject: format!("{} - {}", self.subject_prefix, summary.file_name),
            body_html: render_html(summary, &names, &self.signature),
            attachments,
        }
    }
}

pub trait MailTransport {
    /// Delivers the message once, returning where it went.
    fn send(&self, message: &MailMessage) -> Result<String, PipelineError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<'a> {
    from: &'a str,
    to: &'a [String],
    cc: &'a [String],
    subject: &'a str,
    attachments: Vec<EnvelopeAttachment>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeAttachment {
    filename: String,
    content_type: String,
    size: usize,
}

/// Writes each message into its own directory under the outbox:
/// `message.html`, `envelope.json` and the attachment files.
#[derive(Debug, Clone)]
pub struct DropDirectoryTransport {
    outbox: PathBuf,
}

impl DropDirectoryTransport {
    pub fn new(outbox: impl Into<PathBuf>) -> Self {
        DropDirectoryTransport {
            outbox: outbox.into(),
        }
    }

    fn create_message_dir(&self, subject: &str) -> Result<PathBuf, PipelineError> {
        fs::create_dir_all(&self.outbox).map_err(|err| {
            PipelineError::NotificationFailure(format!(
                "cannot create outbox {:?}: {err}",
                self.outbox
            ))
        })?;
        let stem = format!(
            "{}-{}",
            Local::now().format("%Y%m%dT%H%M%S%3f"),
            sanitize(subject)
        );
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}-{attempt}")
            };
            let dir = self.outbox.join(name);
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(dir),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => {
                    return Err(PipelineError::NotificationFailure(format!(
                        "cannot create message directory {dir:?}: {err}"
                    )));
                }
            }
        }
    }
}

fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' { ch } else { '-' })
        .collect()
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), PipelineError> {
    fs::write(path, contents)
        .map_err(|err| PipelineError::NotificationFailure(format!("cannot write {path:?}: {err}")))
}

impl MailTransport for DropDirectoryTransport {
    fn send(&self, message: &MailMessage) -> Result<String, PipelineError> {
        let payloads = message
            .attachments
            .iter()
            .map(|attachment| attachment.load().map(|data| (attachment, data)))
            .collect::<Result<Vec<_>, _>>()?;

        let dir = self.create_message_dir(&message.subject)?;
        write_file(&dir.join("message.html"), message.body_html.as_bytes())?;
        let mut listed = Vec::with_capacity(payloads.len());
        for (attachment, data) in &payloads {
            let filename = sanitize(&attachment.filename());
            write_file(&dir.join(&filename), data)?;
            listed.push(EnvelopeAttachment {
                filename,
                content_type: attachment.content_type(),
                size: data.len(),
            });
        }
        let envelope = Envelope {
            from: &message.from,
            to: &message.to,
            cc: &message.cc,
            subject: &message.subject,
            attachments: listed,
        };
        let json = serde_json::to_vec_pretty(&envelope)
            .map_err(|err| PipelineError::NotificationFailure(err.to_string()))?;
        write_file(&dir.join("envelope.json"), &json)?;
        Ok(dir.display().to_string())
    }
}

#[derive(Debug)]
pub enum NotificationOutcome {
    Delivered(String),
    Failed(PipelineError),
}

impl NotificationOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, NotificationOutcome::Delivered(_))
    }
}

/// Composes and sends the summary. Never fails the caller.
pub fn notify(
    transport: &dyn MailTransport,
    settings: &MailSettings,
    summary: &RunSummary,
    attachments: Vec<Attachment>,
) -> NotificationOutcome {
    let message = settings.compose(summary, attachments);
    match transport.send(&message) {
        Ok(receipt) => {
            info!(
                "Notification '{}' delivered to {} recipient(s): {receipt}",
                message.subject,
                message.to.len() + message.cc.len()
            );
            NotificationOutcome::Delivered(receipt)
        }
        Err(err) => {
            error!("{err}");
            NotificationOutcome::Failed(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn summary() -> RunSummary {
        let at = NaiveDate::from_ymd_opt(2025, 6, 20)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        RunSummary::new(Path::new("/tmp/in/Invoice <May>.xlsx"), "ops & billing", at)
            .with_counts(10, 7, 3)
    }

    fn settings(outbox: &Path) -> MailSettings {
        MailSettings {
            sender: "noreply@example.com".into(),
            to: vec!["claims@example.com".into()],
            cc: vec!["audit@example.com".into()],
            subject_prefix: DEFAULT_SUBJECT_PREFIX.into(),
            outbox: outbox.to_path_buf(),
            signature: "Thanks, Support".into(),
        }
    }

    #[test]
    fn status_follows_counts() {
        assert_eq!(RunStatus::from_counts(5, 0), RunStatus::ProcessingCompleted);
        assert_eq!(RunStatus::from_counts(0, 0), RunStatus::ProcessingCompleted);
        assert_eq!(RunStatus::from_counts(4, 1), RunStatus::CompletedWithErrors);
        assert_eq!(RunStatus::from_counts(0, 2), RunStatus::ProcessingFailed);
        assert_eq!(summary().status, RunStatus::CompletedWithErrors);
    }

    #[test]
    fn html_escapes_values_and_shows_date_only() {
        let html = render_html(&summary(), &["errors.xlsx".to_string()], "Thanks");
        assert!(html.contains("Invoice &lt;May&gt;.xlsx"));
        assert!(html.contains("ops &amp; billing"));
        assert!(html.contains("<td>2025-06-20</td>"));
        assert!(!html.contains("09:30"));
        assert!(html.contains("<td>COMPLETED_WITH_ERRORS</td>"));
        assert!(html.contains("<strong>errors.xlsx</strong>"));
    }

    #[test]
    fn mime_type_is_inferred_from_extension() {
        assert_eq!(content_type_for(Path::new("a.CSV")), "text/csv");
        assert_eq!(content_type_for(Path::new("a.json")), "application/json");
        assert_eq!(content_type_for(Path::new("a.bin")), "application/octet-stream");
        assert!(content_type_for(Path::new("a.xlsx")).contains("spreadsheetml"));
    }

    #[test]
    fn settings_parse_from_yaml_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.yaml");
        fs::write(&path, "sender: a@example.com\nto: [b@example.com]\noutbox: out\n").unwrap();
        let settings = MailSettings::load(&path).unwrap();
        assert_eq!(settings.subject_prefix, DEFAULT_SUBJECT_PREFIX);
        assert!(settings.cc.is_empty());
        assert_eq!(settings.outbox, PathBuf::from("out"));
    }

    #[test]
    fn settings_without_recipients_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.yaml");
        fs::write(&path, "sender: a@example.com\nto: []\noutbox: out\n").unwrap();
        assert!(MailSettings::load(&path).is_err());
    }

    #[test]
    fn drop_directory_writes_message_and_attachments() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("filtered.csv");
        fs::write(&report, "Vin\nA1\n").unwrap();
        let outbox = dir.path().join("outbox");
        let settings = settings(&outbox);
        let attachments = vec![
            Attachment::Path(report),
            Attachment::Bytes {
                filename: "notes.json".into(),
                content_type: "application/json".into(),
                data: b"{}".to_vec(),
            },
        ];
        let outcome = notify(
            &DropDirectoryTransport::new(&outbox),
            &settings,
            &summary(),
            attachments,
        );
        assert!(outcome.is_delivered(), "{outcome:?}");

        let delivered = fs::read_dir(&outbox).unwrap().next().unwrap().unwrap().path();
        assert_eq!(fs::read_to_string(delivered.join("filtered.csv")).unwrap(), "Vin\nA1\n");
        assert_eq!(fs::read(delivered.join("notes.json")).unwrap(), b"{}");
        let envelope: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(delivered.join("envelope.json")).unwrap())
                .unwrap();
        assert_eq!(envelope["subject"], "Processed VAS File - Invoice <May>.xlsx");
        assert_eq!(envelope["attachments"][0]["contentType"], "text/csv");
        assert!(fs::read_to_string(delivered.join("message.html")).unwrap().contains("Thanks, Support"));
    }

    #[test]
    fn missing_attachment_is_reported_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("outbox");
        let outcome = notify(
            &DropDirectoryTransport::new(&outbox),
            &settings(&outbox),
            &summary(),
            vec![Attachment::Path(dir.path().join("gone.xlsx"))],
        );
        assert!(matches!(
            outcome,
            NotificationOutcome::Failed(PipelineError::NotificationFailure(_))
        ));
        assert!(!outbox.exists());
    }
}
