use std::path::{Path, PathBuf};

use chargewatch_core::error::CoreError;
use chargewatch_core::station::{validate_stations, StationConfig};

/// Server configuration loaded from environment variables.
///
/// Every field has a default; a malformed value is logged and replaced by
/// its default rather than aborting startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// JSON array of [`StationConfig`] (default: `stations.json`).
    pub stations_file: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default         |
    /// |------------------------|-----------------|
    /// | `HOST`                 | `0.0.0.0`       |
    /// | `PORT`                 | `5000`          |
    /// | `CORS_ORIGINS`         | `*`             |
    /// | `REQUEST_TIMEOUT_SECS` | `30`            |
    /// | `STATIONS_FILE`        | `stations.json` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins = parse_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()),
        );

        Self {
            host,
            port: parse_or_default("PORT", 5000),
            cors_origins,
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", 30),
            stations_file: std::env::var("STATIONS_FILE")
                .unwrap_or_else(|_| "stations.json".into())
                .into(),
        }
    }

    /// Whether `CORS_ORIGINS` allows every origin.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match std::env::var(key) {
        Err(_) => default,
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(variable = key, value = %raw, %default, "Invalid value, using default");
            default
        }),
    }
}

/// Load and validate the station list.
///
/// A missing or unreadable file, malformed JSON, an empty list or a
/// duplicated id all prevent startup.
pub fn load_stations(path: &Path) -> Result<Vec<StationConfig>, CoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CoreError::Config(format!("cannot read stations file {}: {e}", path.display()))
    })?;
    let stations: Vec<StationConfig> = serde_json::from_str(&raw).map_err(|e| {
        CoreError::Config(format!("invalid stations file {}: {e}", path.display()))
    })?;
    validate_stations(&stations)?;
    Ok(stations)
}
