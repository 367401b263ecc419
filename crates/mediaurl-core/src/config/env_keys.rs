//! Environment variable keys and their aliases.
//!
//! Primary variables use the `MEDIAURL_*` prefix; `WATCHED_*` names from the
//! previous protocol generation are still honoured where they existed.

/// Protocol and transport behaviour
pub mod client {
    /// Use `<action>.watched` routes and the `watched-sig` header.
    pub const MEDIAURL_LEGACY_ROUTES: &str = "MEDIAURL_LEGACY_ROUTES";
    pub const LEGACY_ROUTES_ALIASES: &[&str] = &["WATCHED_LEGACY_ROUTES"];

    /// Per-probe timeout during endpoint discovery.
    pub const MEDIAURL_ENDPOINT_TEST_TIMEOUT_MS: &str = "MEDIAURL_ENDPOINT_TEST_TIMEOUT_MS";

    /// Grace interval before the next discovery candidate is started.
    pub const MEDIAURL_LOAD_NEXT_TIMEOUT_MS: &str = "MEDIAURL_LOAD_NEXT_TIMEOUT_MS";

    pub const MEDIAURL_USER_AGENT: &str = "MEDIAURL_USER_AGENT";

    pub const MEDIAURL_SIGNATURE: &str = "MEDIAURL_SIGNATURE";
    pub const SIGNATURE_ALIASES: &[&str] = &["WATCHED_SIG"];
}

/// Observability and logging
pub mod observability {
    pub const MEDIAURL_QUIET: &str = "MEDIAURL_QUIET";

    pub const MEDIAURL_LOG_LEVEL: &str = "MEDIAURL_LOG_LEVEL";

    pub const MEDIAURL_LOG_JSON: &str = "MEDIAURL_LOG_JSON";
}
