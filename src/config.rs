use std::collections::HashMap;

use serde::Deserialize;

use crate::analytics::directory::parse_names;
use crate::sla::DEFAULT_WARNING_PERCENT;

/// Largest accepted retention window, about 1000 years.
pub const MAX_RETENTION_DAYS: i64 = 365_000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Days of workflow history kept by `/cleanup` and the cleanup job.
    /// Set via WFA_RETENTION_DAYS. Default: 90.
    pub retention_days: i64,
    /// Period of the background cleanup job. `None` disables it.
    /// Set via WFA_CLEANUP_INTERVAL_SECS.
    pub cleanup_interval_secs: Option<u64>,
    /// Warning threshold for timers started without a policy.
    /// Set via WFA_WARNING_PERCENT. Default: 80.
    pub warning_percent: f64,
    /// Comma-separated list of webhook URLs notified on SLA breach.
    pub webhook_urls: Vec<String>,
    pub webhook_secret: Option<String>,
    /// Approver display names, from WFA_APPROVER_NAMES (`id=Name,...`).
    pub approver_names: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8090,
            retention_days: 90,
            cleanup_interval_secs: None,
            warning_percent: DEFAULT_WARNING_PERCENT,
            webhook_urls: Vec::new(),
            webhook_secret: None,
            approver_names: HashMap::new(),
        }
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from any key lookup. `load` passes the process
/// environment; tests pass a map.
pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let defaults = Config::default();

    let warning_percent = lookup("WFA_WARNING_PERCENT")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.warning_percent);
    if !(0.0..=100.0).contains(&warning_percent) {
        anyhow::bail!(
            "WFA_WARNING_PERCENT must be between 0 and 100, got {}",
            warning_percent
        );
    }

    let retention_days = lookup("WFA_RETENTION_DAYS")
        .and_then(|v| v.parse().ok())
        .unwrap_or(defaults.retention_days);
    if retention_days < 0 {
        anyhow::bail!("WFA_RETENTION_DAYS must not be negative, got {}", retention_days);
    }
    if retention_days > MAX_RETENTION_DAYS {
        anyhow::bail!(
            "WFA_RETENTION_DAYS must not exceed {}, got {}",
            MAX_RETENTION_DAYS,
            retention_days
        );
    }

    Ok(Config {
        port: lookup("WFA_PORT")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port),
        retention_days,
        cleanup_interval_secs: lookup("WFA_CLEANUP_INTERVAL_SECS")
            .and_then(|v| v.parse().ok())
            .filter(|secs| *secs > 0),
        warning_percent,
        webhook_urls: lookup("WFA_WEBHOOK_URLS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        webhook_secret: lookup("WFA_WEBHOOK_SECRET").filter(|s| !s.is_empty()),
        approver_names: lookup("WFA_APPROVER_NAMES")
            .map(|raw| parse_names(&raw))
            .unwrap_or_default(),
    })
}
