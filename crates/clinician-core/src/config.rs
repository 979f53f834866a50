use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ClinicianError, Result};

/// Top-level configuration for the clinician assistant.
///
/// Loaded from `~/.clinician/config.toml` by default. Every section falls
/// back to its defaults when absent from the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicianConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl ClinicianConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ClinicianConfig = toml::from_str(&text)?;
        config.validate()?;
        info!(path = %path.display(), "Config file read");
        Ok(config)
    }

    /// Like [`ClinicianConfig::load`], but a missing or invalid file yields
    /// the defaults. Only an invalid file is worth a warning.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
            Self::default()
        })
    }

    /// Write the config as pretty TOML, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let text = toml::to_string_pretty(self)?;
        let staging = path.with_extension("toml.tmp");
        std::fs::write(&staging, text)?;
        std::fs::rename(&staging, path)?;
        info!(path = %path.display(), "Config file written");
        Ok(())
    }

    /// Reject settings the assistant cannot run with.
    pub fn validate(&self) -> Result<()> {
        let a = &self.assistant;
        if a.max_message_length == 0 {
            return Err(ClinicianError::Config(
                "assistant.max_message_length must be positive".into(),
            ));
        }
        if a.max_result_rows == 0 {
            return Err(ClinicianError::Config(
                "assistant.max_result_rows must be positive".into(),
            ));
        }
        if a.lookup_timeout_ms == 0 {
            return Err(ClinicianError::Config(
                "assistant.lookup_timeout_ms must be positive".into(),
            ));
        }
        if self.storage.database_file.trim().is_empty() {
            return Err(ClinicianError::Config(
                "storage.database_file must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Full path of the record database (`data_dir` joined with `database_file`).
    pub fn database_path(&self) -> PathBuf {
        expand_home(&self.general.data_dir).join(&self.storage.database_file)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port the API binds to on localhost.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.clinician/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Record storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name, relative to `general.data_dir`.
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "clinic.db".to_string(),
        }
    }
}

/// Clinician Assistant (query pipeline) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Whether the assistant accepts messages at all.
    pub enabled: bool,
    /// Maximum user message length in characters.
    pub max_message_length: usize,
    /// Look-ahead window for "budgets expiring" when no date range is given.
    pub expiring_budget_days: u32,
    /// Look-back window for session history when no date range is given.
    pub session_history_days: u32,
    /// Upper bound on a single record store lookup.
    pub lookup_timeout_ms: u64,
    /// Maximum rows a handler returns.
    pub max_result_rows: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_length: 2000,
            expiring_budget_days: 30,
            session_history_days: 7,
            lookup_timeout_ms: 5000,
            max_result_rows: 200,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(path)
}
