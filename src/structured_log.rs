//! Engine event log
//!
//! One JSON object per line on stderr, mirrored to `log_file` when configured:
//!   {"timestamp":"…","level":"info","component":"EXECUTOR","event":"step_finished","data":{"run_id":"…","step":2}}
//!
//! Components log through the `slog_*` macros with a JSON payload, e.g.
//! `slog_info!("EXECUTOR", "run_started", json!({"run_id": id}))`.
//! `samantha logs` reads the mirrored file back with `read_recent_logs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

lazy_static::lazy_static! {
    static ref SINK: Mutex<Option<File>> = Mutex::new(None);
    static ref SETTINGS: Mutex<LogConfig> = Mutex::new(LogConfig::default());
}

/// Ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Level names as written in config files and `SAMANTHA_LOG_LEVEL`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub event: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Plain `[COMPONENT] event {data}` lines when false
    pub json_output: bool,
    pub file_path: Option<PathBuf>,
    pub min_level: LogLevel,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            json_output: true,
            file_path: None,
            min_level: LogLevel::Info,
        }
    }
}

/// Install the logger settings; an unopenable log file leaves stderr only
pub fn init_logger(config: LogConfig) {
    let file = config.file_path.as_ref().and_then(|path| {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    if let Ok(mut sink) = SINK.lock() {
        *sink = file;
    }
    if let Ok(mut settings) = SETTINGS.lock() {
        *settings = config;
    }
}

fn settings() -> LogConfig {
    SETTINGS.lock().map(|s| s.clone()).unwrap_or_default()
}

pub fn log_event(level: LogLevel, component: &str, event: &str, data: serde_json::Value) {
    let config = settings();
    if level < config.min_level {
        return;
    }

    let entry = LogEntry {
        timestamp: Utc::now(),
        level,
        component: component.to_string(),
        event: event.to_string(),
        data,
    };
    let line = render(&entry, config.json_output);

    eprintln!("{}", line);
    if let Ok(mut sink) = SINK.lock() {
        if let Some(file) = sink.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

fn render(entry: &LogEntry, json: bool) -> String {
    if json {
        serde_json::to_string(entry).unwrap_or_else(|_| format!("{:?}", entry))
    } else {
        format!("[{}] {} {}", entry.component, entry.event, entry.data)
    }
}

#[macro_export]
macro_rules! slog_debug {
    ($component:expr, $event:expr, $data:expr) => {
        $crate::structured_log::log_event($crate::structured_log::LogLevel::Debug, $component, $event, $data)
    };
}

#[macro_export]
macro_rules! slog_info {
    ($component:expr, $event:expr, $data:expr) => {
        $crate::structured_log::log_event($crate::structured_log::LogLevel::Info, $component, $event, $data)
    };
}

#[macro_export]
macro_rules! slog_warn {
    ($component:expr, $event:expr, $data:expr) => {
        $crate::structured_log::log_event($crate::structured_log::LogLevel::Warn, $component, $event, $data)
    };
}

#[macro_export]
macro_rules! slog_error {
    ($component:expr, $event:expr, $data:expr) => {
        $crate::structured_log::log_event($crate::structured_log::LogLevel::Error, $component, $event, $data)
    };
}

/// Newest `count` JSON entries from the configured log file
pub fn read_recent_logs(count: usize) -> Vec<LogEntry> {
    let Some(path) = settings().file_path else {
        return Vec::new();
    };
    let Ok(content) = std::fs::read_to_string(&path) else {
        return Vec::new();
    };

    let mut entries: Vec<LogEntry> = content
        .lines()
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();
    entries.reverse();
    entries.truncate(count);
    entries
}
