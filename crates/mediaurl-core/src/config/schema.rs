//! Configuration structs grouped by concern, loaded from the environment.

use std::time::Duration;

use super::env_keys::{client as client_keys, observability as obv_keys};
use super::loader::{env_bool, env_millis, env_optional, env_or};

/// Version stamped into every request as `clientVersion`.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_ENDPOINT_TEST_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_LOAD_NEXT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Settings threaded into the prober and the invocation engine.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Talk the pre-2.0 route scheme (`<action>.watched`, `watched-sig`).
    pub legacy_routes: bool,
    /// Upper bound for a single discovery probe, redirects included.
    pub endpoint_test_timeout: Duration,
    /// How long the racer waits before starting the next candidate.
    pub load_next_timeout: Duration,
    pub user_agent: String,
    pub client_version: String,
    /// Default signature for calls that don't pass their own.
    pub signature: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            legacy_routes: false,
            endpoint_test_timeout: DEFAULT_ENDPOINT_TEST_TIMEOUT,
            load_next_timeout: DEFAULT_LOAD_NEXT_TIMEOUT,
            user_agent: default_user_agent(),
            client_version: CLIENT_VERSION.to_string(),
            signature: None,
        }
    }
}

impl ClientConfig {
    /// Load from environment variables (loads `.env` first).
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            legacy_routes: env_bool(
                client_keys::MEDIAURL_LEGACY_ROUTES,
                client_keys::LEGACY_ROUTES_ALIASES,
                false,
            ),
            endpoint_test_timeout: env_millis(
                client_keys::MEDIAURL_ENDPOINT_TEST_TIMEOUT_MS,
                &[],
                DEFAULT_ENDPOINT_TEST_TIMEOUT,
            ),
            load_next_timeout: env_millis(
                client_keys::MEDIAURL_LOAD_NEXT_TIMEOUT_MS,
                &[],
                DEFAULT_LOAD_NEXT_TIMEOUT,
            ),
            user_agent: env_or(client_keys::MEDIAURL_USER_AGENT, &[], default_user_agent),
            client_version: CLIENT_VERSION.to_string(),
            signature: env_optional(
                client_keys::MEDIAURL_SIGNATURE,
                client_keys::SIGNATURE_ALIASES,
            ),
        }
    }
}

fn default_user_agent() -> String {
    format!("mediaurl-client/{}", CLIENT_VERSION)
}

/// Logging configuration: quiet, log_level, log_json
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::MEDIAURL_QUIET, &[], false),
                log_level: env_or(obv_keys::MEDIAURL_LOG_LEVEL, &[], || {
                    "mediaurl=info".to_string()
                }),
                log_json: env_bool(obv_keys::MEDIAURL_LOG_JSON, &[], false),
            }
        })
    }
}
