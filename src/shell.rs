//! Shell boundary for `execute_bash`
//!
//! Hands a literal command string to `<shell> -c` in the session directory
//! and captures exit code, stdout and stderr. No sanitisation happens here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellOpts {
    pub shell: String,
    pub cwd: PathBuf,
    pub timeout_ms: u64,
}

impl Default for ShellOpts {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellResult {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    pub timed_out: bool,
}

impl ShellResult {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.code == Some(0)
    }

    /// Trimmed stdout followed by trimmed stderr
    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (_, true) => stdout.to_string(),
            (true, false) => stderr.to_string(),
            (false, false) => format!("{}\n{}", stdout, stderr),
        }
    }

    fn failed(error: String, timed_out: bool) -> Self {
        Self {
            code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(error),
            timed_out,
        }
    }
}

/// Run `command` through the configured shell, killing it on timeout
pub async fn run_shell(command: &str, opts: &ShellOpts) -> ShellResult {
    let timeout_duration = Duration::from_millis(opts.timeout_ms);

    let mut cmd = Command::new(&opts.shell);
    cmd.arg("-c")
        .arg(command)
        .current_dir(&opts.cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => return ShellResult::failed(e.to_string(), false),
    };

    match timeout(timeout_duration, child.wait_with_output()).await {
        Ok(Ok(output)) => ShellResult {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            error: None,
            timed_out: false,
        },
        Ok(Err(e)) => ShellResult::failed(e.to_string(), false),
        Err(_) => ShellResult::failed(
            format!("Timeout exceeded after {} ms", opts.timeout_ms),
            true,
        ),
    }
}
