#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// The compiled binary with logging quietened.
pub fn sieve() -> Command {
    let mut cmd = Command::cargo_bin("invoice-sieve").expect("binary exists");
    cmd.env("RUST_LOG", "warn");
    cmd
}

pub fn read_json(path: &Path) -> Value {
    let raw = fs::read_to_string(path).expect("read json output");
    serde_json::from_str(&raw).expect("parse json output")
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Notification settings that drop messages into `<workspace>/outbox`.
    pub fn mail_settings(&self) -> PathBuf {
        let yaml = format!(
            "sender: noreply@example.com\n\
             to:\n  - claims@example.com\n\
             cc:\n  - audit@example.com\n\
             subject_prefix: Processed VAS File\n\
             outbox: {}\n",
            self.join("outbox").display()
        );
        self.write("mail.yaml", yaml)
    }

    /// Directories delivered to the outbox, oldest name first.
    pub fn delivered_messages(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.join("outbox")) else {
            return Vec::new();
        };
        let mut dirs = entries
            .map(|entry| entry.expect("outbox entry").path())
            .collect::<Vec<_>>();
        dirs.sort();
        dirs
    }
}
