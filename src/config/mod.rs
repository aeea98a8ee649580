//! Configuration module for RowFlow-RS
//!
//! Engine settings are read from a TOML file. Every field has a default, so
//! an empty or partial file is valid.
//!
//! # Config Location
//!
//! The default config file lives in the platform config directory:
//! - **Linux**: `~/.config/rowflow-rs/engine.toml`
//! - **macOS**: `~/Library/Application Support/rowflow-rs/engine.toml`
//! - **Windows**: `%APPDATA%\rowflow-rs\engine.toml`
//!
//! # Example
//!
//! ```toml
//! [execution]
//! worker_count = 4
//! best_effort_results = true
//!
//! [logging]
//! filter = "info,rowflow_rs=trace"
//! ```

use crate::error::{Result, ResultExt, RowFlowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "rowflow-rs";

/// Config filename
pub const CONFIG_FILE: &str = "engine.toml";

/// Default bound of the row dispatch queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default number of rows between progress callbacks
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Default cap on stored row errors
pub const DEFAULT_MAX_RECORDED_ERRORS: usize = 1000;

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "info,rowflow_rs=debug";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_progress_interval() -> u64 {
    DEFAULT_PROGRESS_INTERVAL
}

fn default_max_recorded_errors() -> usize {
    DEFAULT_MAX_RECORDED_ERRORS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_true() -> bool {
    true
}

// ==================== Execution ====================

/// Row dispatch and error handling settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Worker threads. `1` processes rows on the calling thread.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Rows that may wait in the dispatch queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Rows between progress callbacks (0 disables them)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Return partial results after cancellation or a source failure
    #[serde(default)]
    pub best_effort_results: bool,

    /// Row errors kept in the run summary; further errors are only counted
    #[serde(default = "default_max_recorded_errors")]
    pub max_recorded_errors: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            best_effort_results: false,
            max_recorded_errors: DEFAULT_MAX_RECORDED_ERRORS,
        }
    }
}

impl ExecutionConfig {
    /// Process rows on the calling thread, in source order.
    pub fn inline() -> Self {
        Self {
            worker_count: 1,
            ..Self::default()
        }
    }

    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            worker_count,
            ..Self::default()
        }
    }
}

// ==================== Logging ====================

/// Tracing subscriber settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Also write logs to this file
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// Colored terminal output
    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
            ansi: true,
        }
    }
}

// ==================== Engine Config ====================

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub logging: LogConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| RowFlowError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RowFlowError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load config from `path`, or from the default location when `None`,
    /// returning defaults if the file is missing or invalid
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => return Self::default(),
            },
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config to a file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    RowFlowError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| RowFlowError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| RowFlowError::Config(format!("Failed to write config: {}", e)))
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.execution.worker_count == 0 {
            return Err(RowFlowError::Config(
                "execution.worker_count must be at least 1".to_string(),
            ));
        }
        if self.execution.queue_capacity == 0 {
            return Err(RowFlowError::Config(
                "execution.queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.execution.worker_count >= 1);
        assert_eq!(config.logging.filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_partial_document() {
        let config = EngineConfig::from_toml_str(
            r#"
            [execution]
            worker_count = 3
            best_effort_results = true
            "#,
        )
        .unwrap();
        assert_eq!(config.execution.worker_count, 3);
        assert!(config.execution.best_effort_results);
        assert_eq!(config.execution.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = EngineConfig::from_toml_str("[execution]\nworker_count = 0\n").unwrap_err();
        assert!(err.to_string().contains("worker_count"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = EngineConfig::default();
        config.execution.worker_count = 2;
        config.logging.file = Some(PathBuf::from("/tmp/rowflow.log"));
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_error_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "[execution]\nqueue_capacity = 0\n").unwrap();

        let err = EngineConfig::load(&path).unwrap_err();
        assert!(matches!(err, RowFlowError::WithContext { .. }));
        let message = err.to_string();
        assert!(message.starts_with("Invalid config file"));
        assert!(message.contains(CONFIG_FILE));
        assert!(message.contains("queue_capacity must be at least 1"));
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(Some(&dir.path().join("missing.toml")));
        assert_eq!(config, EngineConfig::default());
    }
}
