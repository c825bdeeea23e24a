use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const PROVIDERS_FILE: &str = "providers.json";
pub const HISTORY_FILE: &str = "history.json";

/**
 * \brief Runtime settings, read from `CHATRELAY_*` environment variables.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /** \brief Listen address of the HTTP API */
    pub addr: String,
    /** \brief Directory holding providers.json and history.json */
    pub data_dir: PathBuf,
    /** \brief Optional pre-built UI served for non-API paths */
    pub ui_dir: Option<PathBuf>,
    /** \brief Upper bound on one outbound chat request */
    pub request_timeout: Duration,
    pub telemetry_enabled: bool,
    pub log_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5174".to_string(),
            data_dir: PathBuf::from("."),
            ui_dir: None,
            request_timeout: Duration::from_secs(30),
            telemetry_enabled: false,
            log_dir: PathBuf::from("logs"),
        }
    }
}

impl Config {
    /**
     * \brief Load `.env` if present, then read the process environment.
     */
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("CHATRELAY_ADDR") {
            config.addr = addr.trim().to_string();
        }
        if let Some(dir) = get("CHATRELAY_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config.ui_dir = get("CHATRELAY_UI_DIR").map(PathBuf::from);
        if let Some(raw) = get("CHATRELAY_REQUEST_TIMEOUT_SECS") {
            let secs = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: "CHATRELAY_REQUEST_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = get("CHATRELAY_TELEMETRY") {
            config.telemetry_enabled = parse_bool("CHATRELAY_TELEMETRY", &raw)?;
        }
        if let Some(dir) = get("CHATRELAY_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }
        Ok(config)
    }

    pub fn providers_path(&self) -> PathBuf {
        self.data_dir.join(PROVIDERS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("{key} must be a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
}
