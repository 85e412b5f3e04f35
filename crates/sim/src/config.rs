//! Simulator configuration.
//!
//! All tunables live in one struct that is threaded into the constructors
//! that need it. Process environment is only read in [`SimConfig::from_env`],
//! called from `main`; nothing else looks at ambient state.

use std::time::Duration;

use eyre::WrapErr;

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Base URL of the platform API, no trailing slash.
    pub base_url: String,
    pub api_key: String,

    /// Reporting cadence while the bike is unlocked (being ridden); also
    /// the simulated time between trip waypoints.
    pub fast_interval: Duration,
    /// Reporting cadence while the bike stands still.
    pub slow_interval: Duration,
    /// How often the reporting loop wakes up to tick the bike.
    pub report_tick: Duration,

    /// Timeout for best-effort state reports.
    pub report_timeout: Duration,
    /// Timeout for rent and return calls.
    pub rental_timeout: Duration,
    /// Timeout for bootstrap fetches (bike list, zones).
    pub bootstrap_timeout: Duration,

    /// Delay before the command listener reconnects after a stream failure.
    pub listener_backoff: Duration,

    /// One shared fleet-wide command listener instead of a stream per
    /// bike. Saves connections on large fleets; routing happens locally
    /// by the event's embedded bike id.
    pub shared_listener: bool,
}

impl SimConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            base_url,
            api_key: api_key.into(),
            fast_interval: Duration::from_secs(3),
            slow_interval: Duration::from_secs(30),
            report_tick: Duration::from_secs(1),
            report_timeout: Duration::from_millis(1500),
            rental_timeout: Duration::from_secs(5),
            bootstrap_timeout: Duration::from_secs(10),
            listener_backoff: Duration::from_secs(3),
            shared_listener: false,
        }
    }

    /// Configuration from the process environment: `API_URL` (required),
    /// `API_KEY`, optional `FAST_INTERVAL_SECS` / `SLOW_INTERVAL_SECS`
    /// overrides, and `SHARED_LISTENER` to run one fleet-wide command
    /// stream instead of one per bike.
    pub fn from_env() -> eyre::Result<Self> {
        let base_url = std::env::var("API_URL").wrap_err("API_URL is not set")?;
        let api_key = std::env::var("API_KEY").unwrap_or_default();

        let mut config = Self::new(base_url, api_key);
        if let Some(secs) = env_secs("FAST_INTERVAL_SECS")? {
            config.fast_interval = secs;
        }
        if let Some(secs) = env_secs("SLOW_INTERVAL_SECS")? {
            config.slow_interval = secs;
        }
        if let Ok(value) = std::env::var("SHARED_LISTENER") {
            config.shared_listener = matches!(value.as_str(), "1" | "true" | "yes");
        }
        Ok(config)
    }
}

fn env_secs(name: &str) -> eyre::Result<Option<Duration>> {
    match std::env::var(name) {
        Ok(value) => {
            let secs: u64 = value
                .parse()
                .wrap_err_with(|| format!("{name} must be a whole number of seconds"))?;
            Ok(Some(Duration::from_secs(secs)))
        }
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let config = SimConfig::new("http://localhost:1337/", "key");
        assert_eq!(config.base_url, "http://localhost:1337");
    }

    #[test]
    fn test_defaults() {
        let config = SimConfig::new("http://localhost:1337", "key");
        assert_eq!(config.fast_interval, Duration::from_secs(3));
        assert_eq!(config.slow_interval, Duration::from_secs(30));
        assert!(config.fast_interval < config.slow_interval);
        assert!(!config.shared_listener);
    }
}
