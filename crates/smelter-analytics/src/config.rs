// Analytics Configuration
//
// Configuration for the reporting backends, loaded from environment variables.
// A service is only configured when its key variable is set to a non-empty
// value; nothing is reported anywhere by default.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::environment::ExecutionMode;
use crate::identity::ClientIdStore;

/// Public ingestion endpoints, used when a key is set without an endpoint
pub const DEFAULT_GA_ENDPOINT: &str = "https://www.google-analytics.com/collect";
pub const DEFAULT_ROLLBAR_ENDPOINT: &str = "https://api.rollbar.com/api/1/item/";
pub const DEFAULT_BUGSNAG_ENDPOINT: &str = "https://notify.bugsnag.com/";

/// Per-request timeout; matches how long the host waits before aborting
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 3000;

/// Configuration for all reporting backends
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    /// User consent; false means the user opted out
    pub enabled: bool,

    /// How Smelter is being run; local development is never reported
    pub execution_mode: ExecutionMode,

    /// Location of the identity file holding the client id
    pub identity_path: PathBuf,

    /// Version string reported with every event (e.g. "Smelter 0.3.0")
    pub tool_version: String,

    /// HTTP timeout applied by every backend
    pub request_timeout: Duration,

    pub google_analytics: Option<GoogleAnalyticsConfig>,
    pub sentry: Option<SentryConfig>,
    pub rollbar: Option<RollbarConfig>,
    pub bugsnag: Option<BugsnagConfig>,
}

impl AnalyticsConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SMELTER_ANALYTICS_ENABLED`: set to `false`/`0` to opt out (default: true)
    /// - `SMELTER_EXECUTION_MODE`: `installed` (default), `linked` or `self-test`
    /// - `SMELTER_ANALYTICS_CONFIG_PATH`: identity file (default: ~/.smelter/config.json)
    /// - `SMELTER_ANALYTICS_TIMEOUT_MS`: per-request timeout (default: 3000)
    /// - `SMELTER_GA_TRACKING_ID`, `SMELTER_GA_ENDPOINT`
    /// - `SMELTER_SENTRY_DSN`
    /// - `SMELTER_ROLLBAR_TOKEN`, `SMELTER_ROLLBAR_ENDPOINT`, `SMELTER_ROLLBAR_ENVIRONMENT`
    /// - `SMELTER_BUGSNAG_API_KEY`, `SMELTER_BUGSNAG_ENDPOINT`
    pub fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("SMELTER_ANALYTICS_ENABLED")
            .map(|v| !(v.eq_ignore_ascii_case("false") || v == "0"))
            .unwrap_or(true);

        let execution_mode = lookup("SMELTER_EXECUTION_MODE")
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let identity_path = lookup("SMELTER_ANALYTICS_CONFIG_PATH")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(ClientIdStore::default_path);

        let request_timeout = Duration::from_millis(
            lookup("SMELTER_ANALYTICS_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        );

        let google_analytics = setting(&lookup, "SMELTER_GA_TRACKING_ID")
            .map(|tracking_id| GoogleAnalyticsConfig {
                tracking_id,
                endpoint: lookup("SMELTER_GA_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_GA_ENDPOINT.to_string()),
            });

        let sentry = setting(&lookup, "SMELTER_SENTRY_DSN").map(|dsn| SentryConfig { dsn });

        let rollbar = setting(&lookup, "SMELTER_ROLLBAR_TOKEN").map(|access_token| RollbarConfig {
            access_token,
            endpoint: lookup("SMELTER_ROLLBAR_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_ROLLBAR_ENDPOINT.to_string()),
            environment: lookup("SMELTER_ROLLBAR_ENVIRONMENT")
                .unwrap_or_else(|| "production".to_string()),
        });

        let bugsnag = setting(&lookup, "SMELTER_BUGSNAG_API_KEY").map(|api_key| BugsnagConfig {
            api_key,
            endpoint: lookup("SMELTER_BUGSNAG_ENDPOINT")
                .unwrap_or_else(|| DEFAULT_BUGSNAG_ENDPOINT.to_string()),
        });

        Self {
            enabled,
            execution_mode,
            identity_path,
            tool_version: default_tool_version(),
            request_timeout,
            google_analytics,
            sentry,
            rollbar,
            bugsnag,
        }
    }

    /// A configuration with reporting switched off and no backends
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            execution_mode: ExecutionMode::default(),
            identity_path: ClientIdStore::default_path(),
            tool_version: default_tool_version(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            google_analytics: None,
            sentry: None,
            rollbar: None,
            bugsnag: None,
        }
    }

    /// User consent and not a local development run
    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.execution_mode.is_local_dev()
    }

}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn default_tool_version() -> String {
    format!("Smelter {}", env!("CARGO_PKG_VERSION"))
}

/// Read a backend key: unset or empty → backend not configured
fn setting(lookup: &impl Fn(&str) -> Option<String>, var: &str) -> Option<String> {
    lookup(var).filter(|value| !value.trim().is_empty())
}

/// Google Analytics Measurement Protocol configuration
#[derive(Debug, Clone)]
pub struct GoogleAnalyticsConfig {
    pub tracking_id: String,
    pub endpoint: String,
}

/// Sentry configuration
#[derive(Debug, Clone)]
pub struct SentryConfig {
    /// `https://{public_key}@{host}/{project_id}`
    pub dsn: String,
}

/// Rollbar configuration
#[derive(Debug, Clone)]
pub struct RollbarConfig {
    pub access_token: String,
    pub endpoint: String,
    pub environment: String,
}

/// Bugsnag configuration
#[derive(Debug, Clone)]
pub struct BugsnagConfig {
    pub api_key: String,
    pub endpoint: String,
}
