use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::sinks::default_path;

pub const DEFAULT_SERVERS: &str = "8.8.8.8,1.1.1.1";

/// Backend de stockage des épisodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// Base SQLite, une ligne par épisode
    Sqlite,
    /// Fichier JSON, un épisode par ligne
    Jsonl,
}

/// Internet outage monitor
#[derive(Debug, Parser)]
#[command(name = "downage")]
#[command(about = "Records contiguous internet outages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Comma-separated list of hosts to ping
    #[arg(long, env = "DOWNAGE_SERVERS", default_value = DEFAULT_SERVERS)]
    pub servers: String,

    /// Polling interval (e.g. 30s, 1m)
    #[arg(
        long,
        env = "DOWNAGE_POLL",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    pub poll: Duration,

    /// Per-host probe timeout
    #[arg(
        long,
        env = "DOWNAGE_PROBE_TIMEOUT",
        default_value = "2s",
        value_parser = humantime::parse_duration
    )]
    pub probe_timeout: Duration,

    /// Storage backend
    #[arg(long, env = "DOWNAGE_BACKEND", value_enum, default_value_t = SinkBackend::Sqlite)]
    pub backend: SinkBackend,

    /// Storage location (defaults to ./ping.db or ./ping.jsonl)
    #[arg(long, env = "DOWNAGE_DB")]
    pub db: Option<PathBuf>,

    /// Print every stored episode as JSON and exit
    #[arg(long)]
    pub dump: bool,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no servers specified")]
    NoServers,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("probe timeout must be greater than zero")]
    ZeroProbeTimeout,
}

/// Configuration validée du moniteur
#[derive(Debug, Clone, Serialize)]
pub struct MonitorConfig {
    pub servers: Vec<String>,
    #[serde(with = "human_duration")]
    pub poll_interval: Duration,
    #[serde(with = "human_duration")]
    pub probe_timeout: Duration,
    pub backend: SinkBackend,
    pub storage_path: PathBuf,
}

impl Cli {
    /// Valide les arguments. Le mode --dump n'a pas besoin de serveurs.
    pub fn into_config(self) -> Result<MonitorConfig, ConfigError> {
        let servers = parse_servers(&self.servers);
        if servers.is_empty() && !self.dump {
            return Err(ConfigError::NoServers);
        }
        if self.poll.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroProbeTimeout);
        }

        Ok(MonitorConfig {
            servers,
            poll_interval: self.poll,
            probe_timeout: self.probe_timeout,
            backend: self.backend,
            storage_path: self.db.unwrap_or_else(|| default_path(self.backend)),
        })
    }
}

/// Découpe la liste de serveurs, entrées vides ignorées
pub fn parse_servers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Durées affichées en notation humantime dans les logs ("30s")
mod human_duration {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }
}
