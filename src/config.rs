//! Server configuration.
//!
//! Precedence: CLI > environment > config file > defaults. The first existing
//! file among `--config`, `NEXUSWIRE_CONFIG` and `./nexuswire.toml` is used.

use crate::errors::DbError;
use crate::wire::DEFAULT_MAX_MESSAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:27017";
pub const CONFIG_FILE_NAME: &str = "nexuswire.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub log_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_retention: Option<usize>,
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            log_dir: None,
            log_level: None,
            log_retention: None,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Values given on the command line; `None` means "not given".
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config: Option<PathBuf>,
    pub listen_addr: Option<String>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
}

/// Keys present in a config file; absent keys fall through to defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    listen_addr: Option<String>,
    log_dir: Option<PathBuf>,
    log_level: Option<String>,
    log_retention: Option<usize>,
    max_message_size: Option<usize>,
}

impl ServerConfig {
    /// Parses a TOML document; missing keys take their defaults.
    ///
    /// # Errors
    /// Returns `BadValue` when the TOML is malformed.
    pub fn from_toml_str(s: &str) -> Result<Self, DbError> {
        let file: FileConfig = toml::from_str(s).map_err(|e| DbError::bad_value(format!("invalid config: {e}")))?;
        let mut cfg = Self::default();
        cfg.merge_file(file);
        Ok(cfg)
    }

    fn merge_file(&mut self, file: FileConfig) {
        if let Some(v) = file.listen_addr {
            self.listen_addr = v;
        }
        if file.log_dir.is_some() {
            self.log_dir = file.log_dir;
        }
        if file.log_level.is_some() {
            self.log_level = file.log_level;
        }
        if file.log_retention.is_some() {
            self.log_retention = file.log_retention;
        }
        if let Some(v) = file.max_message_size {
            self.max_message_size = v;
        }
    }

    /// Applies environment values read through `env`.
    fn merge_env(&mut self, env: &impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("NEXUSWIRE_LISTEN_ADDR") {
            self.listen_addr = v;
        }
        if let Some(v) = env("NEXUSWIRE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("NEXUSWIRE_LOG_LEVEL") {
            self.log_level = Some(v);
        }
        if let Some(v) = env("NEXUSWIRE_LOG_RETENTION").and_then(|s| s.parse().ok()) {
            self.log_retention = Some(v);
        }
    }

    fn merge_cli(&mut self, cli: &CliOverrides) {
        if let Some(v) = &cli.listen_addr {
            self.listen_addr.clone_from(v);
        }
        if let Some(v) = &cli.log_dir {
            self.log_dir = Some(v.clone());
        }
        if let Some(v) = &cli.log_level {
            self.log_level = Some(v.clone());
        }
    }

    /// Loads the configuration from the process environment and working directory.
    ///
    /// # Errors
    /// Returns an error when the chosen config file cannot be read or parsed.
    pub fn load(cli: &CliOverrides) -> Result<Self, DbError> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(cli, |k| std::env::var(k).ok(), &cwd)
    }

    /// [`ServerConfig::load`] with an explicit environment and working directory.
    ///
    /// # Errors
    /// Returns an error when the chosen config file cannot be read or parsed.
    pub fn load_with(
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        cwd: &Path,
    ) -> Result<Self, DbError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(p) = &cli.config {
            candidates.push(p.clone());
        }
        if let Some(p) = env("NEXUSWIRE_CONFIG") {
            candidates.push(PathBuf::from(p));
        }
        candidates.push(cwd.join(CONFIG_FILE_NAME));

        let mut cfg = Self::default();
        if let Some(path) = candidates.iter().find(|p| p.exists()) {
            let text = std::fs::read_to_string(path)?;
            let file: FileConfig = toml::from_str(&text)
                .map_err(|e| DbError::bad_value(format!("invalid config {}: {e}", path.display())))?;
            log::debug!("loaded config from {}", path.display());
            cfg.merge_file(file);
        }
        cfg.merge_env(&env);
        cfg.merge_cli(cli);
        Ok(cfg)
    }
}
