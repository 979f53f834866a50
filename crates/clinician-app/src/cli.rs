//! CLI argument definitions for the clinician assistant server.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use clinician_core::config::ClinicianConfig;

/// Clinician Assistant: natural-language questions over patient records.
#[derive(Parser, Debug)]
#[command(name = "clinician", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Seed an empty record store with sample patients.
    #[arg(long = "demo-data")]
    pub demo_data: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CLINICIAN_CONFIG env var > ~/.clinician/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.config
            .clone()
            .or_else(|| std::env::var_os("CLINICIAN_CONFIG").map(PathBuf::from))
            .unwrap_or_else(default_config_path)
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > CLINICIAN_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        pick_port(
            self.port,
            std::env::var("CLINICIAN_PORT").ok().as_deref(),
            config_port,
        )
    }

    /// Fold CLI and env overrides into a loaded config.
    pub fn apply(&self, config: &mut ClinicianConfig) {
        config.general.port = self.resolve_port(config.general.port);
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

fn pick_port(flag: Option<u16>, env: Option<&str>, config_port: u16) -> u16 {
    if let Some(p) = flag {
        return p;
    }
    if let Some(p) = env.and_then(|v| v.parse::<u16>().ok()) {
        return p;
    }
    if config_port != 0 {
        return config_port;
    }
    3040
}

/// `~/.clinician/config.toml`, or `./config.toml` when no home is known.
fn default_config_path() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join(".clinician").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}
