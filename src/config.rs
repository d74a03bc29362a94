//! Engine configuration
//!
//! Loaded from `~/.samantha/config.yaml` (or `$SAMANTHA_CONFIG`). A missing
//! file means defaults; a malformed one is an error so a typo never silently
//! disables a safety setting.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::structured_log::{LogConfig, LogLevel};

pub const CONFIG_ENV: &str = "SAMANTHA_CONFIG";
pub const UNDO_LOG_ENV: &str = "SAMANTHA_UNDO_LOG";
pub const LOG_LEVEL_ENV: &str = "SAMANTHA_LOG_LEVEL";

/// Per-user state directory (`~/.samantha`)
pub fn state_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".samantha")
}

fn default_undo_log_path() -> PathBuf {
    state_dir().join("undo.log")
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_shell_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

fn default_fuzzy_cutoff() -> f64 {
    0.6
}

fn default_log_level() -> String {
    "warn".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Append-only audit log of successful steps
    pub undo_log_path: PathBuf,
    /// Shell used by `execute_bash` (invoked as `<shell> -c <text>`)
    pub shell: String,
    pub shell_timeout_ms: u64,
    /// Ask before every `execute_bash` step
    pub confirm_shell: bool,
    /// Added to the built-in dangerous path list
    pub extra_dangerous_paths: Vec<PathBuf>,
    pub fuzzy_cutoff: f64,
    pub log_level: String,
    pub log_json: bool,
    pub log_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            undo_log_path: default_undo_log_path(),
            shell: default_shell(),
            shell_timeout_ms: default_shell_timeout_ms(),
            confirm_shell: default_true(),
            extra_dangerous_paths: Vec::new(),
            fuzzy_cutoff: default_fuzzy_cutoff(),
            log_level: default_log_level(),
            log_json: default_true(),
            log_file: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl EngineConfig {
    /// Location of the config file, honouring `$SAMANTHA_CONFIG`
    pub fn default_path() -> PathBuf {
        match std::env::var(CONFIG_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(shellexpand::tilde(&p).to_string()),
            _ => state_dir().join("config.yaml"),
        }
    }

    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like `load`, but an explicit path takes precedence over `$SAMANTHA_CONFIG`
    pub fn load_with(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(path)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML file; a missing file yields defaults
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let mut config: EngineConfig =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.expand_paths();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(p) = std::env::var(UNDO_LOG_ENV) {
            if !p.trim().is_empty() {
                self.undo_log_path = PathBuf::from(shellexpand::tilde(&p).to_string());
            }
        }
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                self.log_level = level;
            }
        }
    }

    fn expand_paths(&mut self) {
        let expand = |p: &Path| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).to_string());
        self.undo_log_path = expand(self.undo_log_path.as_path());
        self.log_file = self.log_file.as_deref().map(expand);
        self.extra_dangerous_paths = self
            .extra_dangerous_paths
            .iter()
            .map(|p| expand(p.as_path()))
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.fuzzy_cutoff) {
            return Err(ConfigError::Invalid {
                field: "fuzzy_cutoff",
                reason: format!("{} is outside 0.0..=1.0", self.fuzzy_cutoff),
            });
        }
        if self.shell.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "shell",
                reason: "must not be empty".to_string(),
            });
        }
        if LogLevel::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid {
                field: "log_level",
                reason: format!("unknown level '{}'", self.log_level),
            });
        }
        Ok(())
    }

    /// Logger settings derived from this config
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            json_output: self.log_json,
            file_path: self.log_file.clone(),
            min_level: LogLevel::parse(&self.log_level).unwrap_or(LogLevel::Warn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(dir.path().join("nope.yaml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.confirm_shell);
        assert_eq!(config.shell_timeout_ms, 60_000);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "shell: bash\nconfirm_shell: false\nextra_dangerous_paths:\n  - /srv\n",
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.shell, "bash");
        assert!(!config.confirm_shell);
        assert_eq!(config.extra_dangerous_paths, vec![PathBuf::from("/srv")]);
        assert_eq!(config.fuzzy_cutoff, 0.6);
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "shell_timeout_ms: [not, a, number]\n").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_cutoff_and_level() {
        let mut config = EngineConfig::default();
        config.fuzzy_cutoff = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.log_level = "chatty".to_string();
        assert!(config.validate().is_err());
    }
}
