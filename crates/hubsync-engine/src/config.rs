use std::str::FromStr;
use std::time::Duration;

use hubsync_client::ClientOptions;
use tracing::warn;

pub const MIN_REFRESH_SECS: u64 = 10;
pub const MAX_REFRESH_SECS: u64 = 300;
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Refresh period for a configured interval, clamped to 10..=300 seconds.
pub fn clamp_interval(secs: u64) -> Duration {
    Duration::from_secs(secs.clamp(MIN_REFRESH_SECS, MAX_REFRESH_SECS))
}

/// Engine-wide settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Raw configured interval; clamped when the scheduler arms its timer.
    pub refresh_interval_secs: u64,
    /// Quiet period that coalesces interval changes into one restart.
    pub debounce: Duration,
    pub client: ClientOptions,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: DEFAULT_REFRESH_SECS,
            debounce: DEFAULT_DEBOUNCE,
            client: ClientOptions::default(),
        }
    }
}

impl SyncConfig {
    /// Reads `HUBSYNC_*` overrides from the environment.
    ///
    /// Malformed values are logged and replaced by their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut client = defaults.client;

        if let Some(secs) = parse_var::<u64>(&lookup, "HUBSYNC_CONNECT_TIMEOUT_SECS") {
            client = client.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "HUBSYNC_REQUEST_TIMEOUT_SECS") {
            client = client.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(size) = parse_var::<u32>(&lookup, "HUBSYNC_PAGE_SIZE") {
            client = client.with_page_size(size);
        }

        Self {
            refresh_interval_secs: parse_var(&lookup, "HUBSYNC_REFRESH_INTERVAL")
                .unwrap_or(defaults.refresh_interval_secs),
            debounce: defaults.debounce,
            client,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        clamp_interval(self.refresh_interval_secs)
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring malformed setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_clamp_interval() {
        assert_eq!(clamp_interval(5), Duration::from_secs(10));
        assert_eq!(clamp_interval(10), Duration::from_secs(10));
        assert_eq!(clamp_interval(45), Duration::from_secs(45));
        assert_eq!(clamp_interval(1000), Duration::from_secs(300));
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = SyncConfig::from_lookup(lookup(&[]));
        assert_eq!(config.refresh_interval_secs, 30);
        assert_eq!(config.debounce, Duration::from_millis(500));
        assert_eq!(config.client.page_size, 500);
        assert_eq!(config.client.connect_timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_overrides_and_malformed_values() {
        let config = SyncConfig::from_lookup(lookup(&[
            ("HUBSYNC_REFRESH_INTERVAL", "120"),
            ("HUBSYNC_REQUEST_TIMEOUT_SECS", "abc"),
            ("HUBSYNC_PAGE_SIZE", " 50 "),
        ]));
        assert_eq!(config.refresh_interval_secs, 120);
        assert_eq!(config.client.request_timeout, Duration::from_secs(30));
        assert_eq!(config.client.page_size, 50);
    }

    #[test]
    fn test_refresh_interval_is_clamped_at_use() {
        let config = SyncConfig {
            refresh_interval_secs: 2,
            ..Default::default()
        };
        assert_eq!(config.refresh_interval(), Duration::from_secs(10));
    }
}
