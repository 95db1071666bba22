//! Configuration management with environment variable support.
//!
//! This module provides centralized configuration for form-sweep, supporting:
//! - Environment variables for all configurable values
//! - Defaults tuned for the questionnaire builder the tool was written against
//! - Builder-style overrides on the structs that consume these settings
//!
//! # Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `FORM_SWEEP_WEBDRIVER` | WebDriver endpoint URL | `http://127.0.0.1:4444` |
//! | `FORM_SWEEP_REQUEST_TIMEOUT` | Per-request WebDriver timeout (seconds) | `60` |
//! | `FORM_SWEEP_IMPLICIT_WAIT_MS` | Implicit element wait during normal lookups | `30000` |
//! | `FORM_SWEEP_PROBE_WAIT_MS` | Implicit wait during "is anything here yet" probes | `10` |
//! | `FORM_SWEEP_POLL_INTERVAL_MS` | Sleep between polling attempts | `250` |
//! | `FORM_SWEEP_POLL_ATTEMPTS` | Polling attempts before a lookup is fatal | `40` |
//! | `FORM_SWEEP_MAX_INTERSTITIAL` | Clicks allowed through pages without questions | `25` |
//! | `FORM_SWEEP_MAX_STEPS` | Question applications allowed in one run | `5000` |
//! | `FORM_SWEEP_SESSION_DIR` | Base directory for sweep sessions | `/tmp/form-sweep` |
//!
//! # Example
//!
//! ```bash
//! # Point at a remote chromedriver and shorten the lookup wait
//! export FORM_SWEEP_WEBDRIVER="http://10.0.0.5:9515"
//! export FORM_SWEEP_IMPLICIT_WAIT_MS=5000
//! ```

use std::env;
use std::sync::OnceLock;
use std::time::Duration;

// ============================================================================
// Default Values
// ============================================================================

/// Default WebDriver endpoint
pub const DEFAULT_WEBDRIVER_ENDPOINT: &str = "http://127.0.0.1:4444";

/// Default WebDriver request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 60;

/// Default implicit wait for element lookups (milliseconds)
pub const DEFAULT_IMPLICIT_WAIT_MS: u64 = 30_000;

/// Default implicit wait while probing for optional elements (milliseconds)
pub const DEFAULT_PROBE_WAIT_MS: u64 = 10;

/// Default sleep between polling attempts (milliseconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Default number of polling attempts
pub const DEFAULT_POLL_ATTEMPTS: usize = 40;

/// Default bound on clicks through question-less pages
pub const DEFAULT_MAX_INTERSTITIAL: usize = 25;

/// Default bound on question applications in a single run
pub const DEFAULT_MAX_STEPS: usize = 5_000;

/// Default session base directory
pub const DEFAULT_SESSION_DIR: &str = "/tmp/form-sweep";

/// Default output sheet name
pub const DEFAULT_SHEET_NAME: &str = "Results";

// ============================================================================
// Environment Variable Names
// ============================================================================

/// Environment variable for the WebDriver endpoint
pub const ENV_WEBDRIVER: &str = "FORM_SWEEP_WEBDRIVER";

/// Environment variable for the WebDriver request timeout
pub const ENV_REQUEST_TIMEOUT: &str = "FORM_SWEEP_REQUEST_TIMEOUT";

/// Environment variable for the implicit wait
pub const ENV_IMPLICIT_WAIT_MS: &str = "FORM_SWEEP_IMPLICIT_WAIT_MS";

/// Environment variable for the probe wait
pub const ENV_PROBE_WAIT_MS: &str = "FORM_SWEEP_PROBE_WAIT_MS";

/// Environment variable for the polling interval
pub const ENV_POLL_INTERVAL_MS: &str = "FORM_SWEEP_POLL_INTERVAL_MS";

/// Environment variable for the number of polling attempts
pub const ENV_POLL_ATTEMPTS: &str = "FORM_SWEEP_POLL_ATTEMPTS";

/// Environment variable for the interstitial click limit
pub const ENV_MAX_INTERSTITIAL: &str = "FORM_SWEEP_MAX_INTERSTITIAL";

/// Environment variable for the per-run step limit
pub const ENV_MAX_STEPS: &str = "FORM_SWEEP_MAX_STEPS";

/// Environment variable for the session directory
pub const ENV_SESSION_DIR: &str = "FORM_SWEEP_SESSION_DIR";

// ============================================================================
// Configuration Getters (with caching)
// ============================================================================

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Get the global configuration (initialized from environment on first access)
pub fn get() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

/// Centralized configuration for form-sweep
#[derive(Debug, Clone)]
pub struct Config {
    /// WebDriver connection settings
    pub webdriver: WebDriverSettings,
    /// Element lookup waits and run limits
    pub timing: TimingSettings,
    /// Session configuration
    pub session: SessionSettings,
}

/// WebDriver-related settings
#[derive(Debug, Clone)]
pub struct WebDriverSettings {
    /// Endpoint URL
    pub endpoint: String,
    /// Per-request timeout (seconds)
    pub request_timeout: u64,
}

/// Lookup waits and run limits
#[derive(Debug, Clone)]
pub struct TimingSettings {
    /// Implicit wait for regular lookups
    pub implicit_wait: Duration,
    /// Implicit wait while probing for optional elements
    pub probe_wait: Duration,
    /// Sleep between polling attempts
    pub poll_interval: Duration,
    /// Polling attempts before giving up
    pub poll_attempts: usize,
    /// Clicks allowed through pages without questions
    pub max_interstitial: usize,
    /// Question applications allowed per run
    pub max_steps: usize,
}

/// Session-related settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Base directory for session storage
    pub base_dir: String,
}

impl Config {
    /// Create configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self {
            webdriver: WebDriverSettings::from_env(),
            timing: TimingSettings::from_env(),
            session: SessionSettings::from_env(),
        }
    }

    /// Create configuration with all defaults (ignoring environment)
    pub fn defaults() -> Self {
        Self {
            webdriver: WebDriverSettings::defaults(),
            timing: TimingSettings::defaults(),
            session: SessionSettings::defaults(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl WebDriverSettings {
    /// Create WebDriver settings from environment variables
    pub fn from_env() -> Self {
        Self {
            endpoint: env::var(ENV_WEBDRIVER)
                .unwrap_or_else(|_| DEFAULT_WEBDRIVER_ENDPOINT.to_string()),
            request_timeout: env_parse(ENV_REQUEST_TIMEOUT).unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Create WebDriver settings with defaults
    pub fn defaults() -> Self {
        Self {
            endpoint: DEFAULT_WEBDRIVER_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl TimingSettings {
    /// Create timing settings from environment variables
    pub fn from_env() -> Self {
        Self {
            implicit_wait: Duration::from_millis(
                env_parse(ENV_IMPLICIT_WAIT_MS).unwrap_or(DEFAULT_IMPLICIT_WAIT_MS),
            ),
            probe_wait: Duration::from_millis(
                env_parse(ENV_PROBE_WAIT_MS).unwrap_or(DEFAULT_PROBE_WAIT_MS),
            ),
            poll_interval: Duration::from_millis(
                env_parse(ENV_POLL_INTERVAL_MS).unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            poll_attempts: env_parse(ENV_POLL_ATTEMPTS).unwrap_or(DEFAULT_POLL_ATTEMPTS),
            max_interstitial: env_parse(ENV_MAX_INTERSTITIAL).unwrap_or(DEFAULT_MAX_INTERSTITIAL),
            max_steps: env_parse(ENV_MAX_STEPS).unwrap_or(DEFAULT_MAX_STEPS),
        }
    }

    /// Create timing settings with defaults
    pub fn defaults() -> Self {
        Self {
            implicit_wait: Duration::from_millis(DEFAULT_IMPLICIT_WAIT_MS),
            probe_wait: Duration::from_millis(DEFAULT_PROBE_WAIT_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_attempts: DEFAULT_POLL_ATTEMPTS,
            max_interstitial: DEFAULT_MAX_INTERSTITIAL,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl SessionSettings {
    /// Create session settings from environment variables
    pub fn from_env() -> Self {
        Self {
            base_dir: env::var(ENV_SESSION_DIR)
                .unwrap_or_else(|_| DEFAULT_SESSION_DIR.to_string()),
        }
    }

    /// Create session settings with defaults
    pub fn defaults() -> Self {
        Self {
            base_dir: DEFAULT_SESSION_DIR.to_string(),
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Read and parse an environment variable, ignoring unparsable values
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|s| parse_setting(&s))
}

fn parse_setting<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.trim().replace('_', "").parse().ok()
}

/// Get the WebDriver endpoint (convenience function)
pub fn webdriver_endpoint() -> String {
    get().webdriver.endpoint.clone()
}

/// Get session base directory (convenience function)
pub fn session_base_dir() -> String {
    get().session.base_dir.clone()
}
