//! undoLog - append-only audit trail of successfully executed steps
//! Stores to: ~/.samantha/undo.log
//!
//! One line per step: `<ISO-8601 timestamp> - <verb> <args> <--key=value>`.
//! The engine never reads this file back.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::config;

#[derive(Debug, thiserror::Error)]
pub enum UndoLogError {
    #[error("Failed to create undo log directory {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to append to undo log {path}: {source}")]
    Append {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoLogEntry {
    pub timestamp: String,
    pub command_text: String,
}

impl UndoLogEntry {
    pub fn to_line(&self) -> String {
        format!("{} - {}", self.timestamp, self.command_text)
    }
}

/// `verb args… --key=value…`, trimmed
pub fn format_command(verb: &str, args: &[String], options: &BTreeMap<String, String>) -> String {
    let log_args = args.join(" ");
    let log_options = options
        .iter()
        .map(|(k, v)| format!("--{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{} {} {}", verb, log_args, log_options)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writer for the undo log. Holds only the path: the file is opened,
/// appended and closed on every write.
#[derive(Debug, Clone)]
pub struct UndoLogger {
    path: PathBuf,
}

impl UndoLogger {
    pub fn new() -> Self {
        Self {
            path: config::state_dir().join("undo.log"),
        }
    }

    /// Logger writing to a custom path (useful for testing)
    pub fn new_with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one executed step
    pub async fn append(
        &self,
        verb: &str,
        args: &[String],
        options: &BTreeMap<String, String>,
    ) -> Result<UndoLogEntry, UndoLogError> {
        let entry = UndoLogEntry {
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            command_text: format_command(verb, args, options),
        };
        self.write_line(&entry.to_line()).await?;
        Ok(entry)
    }

    async fn write_line(&self, line: &str) -> Result<(), UndoLogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|source| UndoLogError::CreateDir {
                        path: parent.display().to_string(),
                        source,
                    })?;
            }
        }

        let append_err = |source| UndoLogError::Append {
            path: self.path.display().to_string(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(append_err)?;
        file.write_all(format!("{}\n", line).as_bytes())
            .await
            .map_err(append_err)?;
        file.flush().await.map_err(append_err)?;
        Ok(())
    }
}

impl Default for UndoLogger {
    fn default() -> Self {
        Self::new()
    }
}
