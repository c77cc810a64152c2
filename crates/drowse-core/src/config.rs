//! Environment configuration for the launcher and watchdog.
//!
//! Both components are configured through environment variables, matching
//! how the watchdog container receives its settings from the task
//! definition. The variables are read once into an immutable [`Config`]
//! that is passed into each component at construction; nothing reads the
//! process environment after startup.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable: {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Immutable runtime configuration shared by the launcher and watchdog.
#[derive(Debug, Clone)]
pub struct Config {
    /// Orchestration cluster identifier (`CLUSTER`).
    pub cluster: String,
    /// Orchestration service, the scalable unit (`SERVICE`).
    pub service: String,
    /// Hosted zone holding the server record (`DNSZONE`).
    pub dns_zone: String,
    /// Fully qualified server hostname (`SERVERNAME`).
    pub server_name: String,
    /// Notification topic; `None` disables notifications (`SNSTOPIC`).
    pub topic: Option<String>,
    /// Startup grace period before idle checks begin (`STARTUPMIN`).
    pub startup_grace: Duration,
    /// Idle duration before shutdown is triggered (`SHUTDOWNMIN`).
    pub idle_timeout: Duration,
    /// Service port observed by the session probe (`SERVERPORT`).
    pub server_port: u16,
    /// Watchdog poll cadence (`POLLSEC`).
    pub poll_interval: Duration,
    /// TTL for the server record, seconds (`DNSTTL`).
    pub dns_ttl_secs: u32,
    /// Record value parked while the workload is stopped (`PLACEHOLDERIP`).
    pub placeholder_ip: String,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from an explicit variable set.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut cluster = None;
        let mut service = None;
        let mut dns_zone = None;
        let mut server_name = None;
        let mut topic = None;
        let mut startup_min = 10u64;
        let mut shutdown_min = 20u64;
        let mut server_port = 25565u16;
        let mut poll_sec = 60u64;
        let mut dns_ttl_secs = 30u32;
        let mut placeholder_ip = "192.168.1.1".to_string();

        for (key, value) in vars {
            match key.as_str() {
                "CLUSTER" => cluster = Some(value),
                "SERVICE" => service = Some(value),
                "DNSZONE" => dns_zone = Some(value),
                "SERVERNAME" => server_name = Some(value),
                // An empty topic means notifications are disabled; the
                // task definition always sets the variable.
                "SNSTOPIC" if !value.trim().is_empty() => topic = Some(value),
                "SNSTOPIC" => {}
                "STARTUPMIN" => startup_min = parse("STARTUPMIN", &value)?,
                "SHUTDOWNMIN" => shutdown_min = parse("SHUTDOWNMIN", &value)?,
                "SERVERPORT" => server_port = parse("SERVERPORT", &value)?,
                "POLLSEC" => poll_sec = parse("POLLSEC", &value)?,
                "DNSTTL" => dns_ttl_secs = parse("DNSTTL", &value)?,
                "PLACEHOLDERIP" => placeholder_ip = value,
                _ => {}
            }
        }

        Ok(Self {
            cluster: cluster.ok_or(ConfigError::Missing("CLUSTER"))?,
            service: service.ok_or(ConfigError::Missing("SERVICE"))?,
            dns_zone: dns_zone.ok_or(ConfigError::Missing("DNSZONE"))?,
            server_name: server_name.ok_or(ConfigError::Missing("SERVERNAME"))?,
            topic,
            startup_grace: Duration::from_secs(startup_min * 60),
            idle_timeout: Duration::from_secs(shutdown_min * 60),
            server_port,
            poll_interval: Duration::from_secs(poll_sec),
            dns_ttl_secs,
            placeholder_ip,
        })
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: value.to_string(),
    })
}
