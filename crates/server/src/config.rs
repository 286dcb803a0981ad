use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tresor_import::ImportLimits;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    pub database: PathBuf,
    pub max_upload_bytes: usize,
    pub max_import_rows: usize,
    pub import_timeout_secs: u64,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        let limits = ImportLimits::default();
        Config {
            bind: "127.0.0.1:3001".to_string(),
            database: PathBuf::from("tresor.db"),
            max_upload_bytes: limits.max_bytes,
            max_import_rows: limits.max_rows,
            import_timeout_secs: 30,
            log_format: LogFormat::Pretty,
        }
    }
}

impl Config {
    /// Defaults, then the TOML file named by `TRESOR_CONFIG` (if any), then
    /// individual environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("TRESOR_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Config::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(bind) = lookup("TRESOR_BIND") {
            self.bind = bind;
        }
        if let Some(database) = lookup("TRESOR_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(value) = lookup("TRESOR_MAX_UPLOAD_BYTES") {
            self.max_upload_bytes = parse_var("TRESOR_MAX_UPLOAD_BYTES", value)?;
        }
        if let Some(value) = lookup("TRESOR_MAX_IMPORT_ROWS") {
            self.max_import_rows = parse_var("TRESOR_MAX_IMPORT_ROWS", value)?;
        }
        if let Some(value) = lookup("TRESOR_IMPORT_TIMEOUT_SECS") {
            self.import_timeout_secs = parse_var("TRESOR_IMPORT_TIMEOUT_SECS", value)?;
        }
        if let Some(value) = lookup("LOG_FORMAT") {
            self.log_format = match value.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "json" => LogFormat::Json,
                _ => return Err(ConfigError::InvalidValue { var: "LOG_FORMAT", value }),
            };
        }
        Ok(())
    }

    pub fn import_limits(&self) -> ImportLimits {
        ImportLimits {
            max_bytes: self.max_upload_bytes,
            max_rows: self.max_import_rows,
        }
    }

    pub fn import_timeout(&self) -> Duration {
        Duration::from_secs(self.import_timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue { var, value })
}
