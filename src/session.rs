//! Per-run session state
//!
//! Owned by the execution loop for the duration of one plan run and lent
//! mutably to each dispatched command. There is no process-wide cwd: the
//! engine never calls `std::env::set_current_dir`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::path_resolver;

/// Recorded output of one attempted step, addressable by placeholders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepOutput {
    Scalar(String),
    FileList(Vec<String>),
    Absent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    working_directory: PathBuf,
    pub step_outputs: Vec<StepOutput>,
    pub last_file_list: Vec<String>,
}

impl SessionState {
    /// Start a session in `initial`, falling back to the process cwd, then `/`.
    /// A starting directory that does not exist is replaced by the fallback.
    pub fn new(initial: Option<PathBuf>) -> Self {
        let cwd = initial
            .filter(|p| p.is_dir())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("/"));

        let cwd = cwd.canonicalize().unwrap_or(cwd);

        Self {
            working_directory: cwd,
            step_outputs: Vec::new(),
            last_file_list: Vec::new(),
        }
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn cwd_string(&self) -> String {
        self.working_directory.display().to_string()
    }

    /// Resolve a step argument against this session
    pub fn resolve(&self, raw: &str) -> PathBuf {
        path_resolver::resolve(raw, &self.working_directory)
    }

    /// Move the session to `target` after verifying it is an existing
    /// directory. On failure the session is left untouched.
    pub async fn change_directory(&mut self, target: &Path) -> std::io::Result<PathBuf> {
        let metadata = fs::metadata(target).await?;
        if !metadata.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Not a directory",
            ));
        }

        let resolved = fs::canonicalize(target).await?;
        self.working_directory = resolved.clone();
        Ok(resolved)
    }

    /// Record the output of the step just attempted
    pub fn record(&mut self, output: StepOutput) {
        self.step_outputs.push(output);
    }

    /// Output recorded for 1-indexed step `n`
    pub fn output_of_step(&self, n: usize) -> Option<&StepOutput> {
        n.checked_sub(1).and_then(|idx| self.step_outputs.get(idx))
    }
}
