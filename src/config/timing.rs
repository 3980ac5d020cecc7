//! Global timing configuration with compile-time defaults and runtime overrides
//!
//! Default values are compile-time constants. They can be overridden once at
//! startup via [`set_config`], e.g. from CLI arguments.

use once_cell::sync::OnceCell;
use std::time::Duration;

/// Default per-query socket/HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;
/// Default number of retries for a failed query
pub const DEFAULT_RETRY_COUNT: u32 = 3;
/// Default pause after a WHOIS server reports its rate limit, in milliseconds
pub const DEFAULT_WHOIS_RATE_LIMIT_WAIT_MS: u64 = 1000;
/// Default pause after an RDAP server answers HTTP 429, in seconds
pub const DEFAULT_RDAP_RATE_LIMIT_TIMEOUT_SECS: u64 = 120;
/// Default timeout for the bulk Cymru WHOIS query in seconds
pub const DEFAULT_BULK_TIMEOUT_SECS: u64 = 120;

/// Requests LACNIC accepts within one rate-limit window
pub const LACNIC_RATE_LIMIT_REQUESTS: u32 = 9;
/// Length of the LACNIC rate-limit window in seconds
pub const LACNIC_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Runtime overrides for the timing defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    /// Per-query timeout
    pub timeout: Duration,
    /// Pause after a WHOIS rate-limit banner
    pub whois_rate_limit_wait: Duration,
    /// Pause after an HTTP 429
    pub rdap_rate_limit_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            whois_rate_limit_wait: Duration::from_millis(DEFAULT_WHOIS_RATE_LIMIT_WAIT_MS),
            rdap_rate_limit_timeout: Duration::from_secs(DEFAULT_RDAP_RATE_LIMIT_TIMEOUT_SECS),
        }
    }
}

// Runtime override storage - set once at program startup
static OVERRIDE_CONFIG: OnceCell<TimingConfig> = OnceCell::new();

/// Get the per-query timeout
pub fn timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.timeout)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Get the pause used after a WHOIS rate-limit banner
pub fn whois_rate_limit_wait() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.whois_rate_limit_wait)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_WHOIS_RATE_LIMIT_WAIT_MS))
}

/// Get the pause used after an HTTP 429
pub fn rdap_rate_limit_timeout() -> Duration {
    OVERRIDE_CONFIG
        .get()
        .map(|c| c.rdap_rate_limit_timeout)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_RDAP_RATE_LIMIT_TIMEOUT_SECS))
}

/// Set the global timing configuration
///
/// Returns the rejected configuration if one was already set.
pub fn set_config(config: TimingConfig) -> Result<(), TimingConfig> {
    OVERRIDE_CONFIG.set(config)
}

/// Check if custom timing configuration has been set
pub fn is_custom_config_set() -> bool {
    OVERRIDE_CONFIG.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        // OnceCell is global; another test may already have set it
        if !is_custom_config_set() {
            assert_eq!(timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
            assert_eq!(
                whois_rate_limit_wait(),
                Duration::from_millis(DEFAULT_WHOIS_RATE_LIMIT_WAIT_MS)
            );
            assert_eq!(
                rdap_rate_limit_timeout(),
                Duration::from_secs(DEFAULT_RDAP_RATE_LIMIT_TIMEOUT_SECS)
            );
        } else {
            assert!(timeout() > Duration::ZERO);
        }
    }

    #[test]
    fn test_default_struct_matches_constants() {
        let config = TimingConfig::default();
        assert_eq!(config.timeout.as_secs(), DEFAULT_TIMEOUT_SECS);
        assert_eq!(
            config.whois_rate_limit_wait.as_millis(),
            u128::from(DEFAULT_WHOIS_RATE_LIMIT_WAIT_MS)
        );
    }

    #[test]
    fn test_lacnic_window() {
        assert!(LACNIC_RATE_LIMIT_REQUESTS > 0);
        assert!(LACNIC_RATE_LIMIT_WINDOW_SECS >= 1);
    }
}
