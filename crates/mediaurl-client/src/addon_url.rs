//! Addon URL helpers: clean base URLs and action routes.
//!
//! A clean base URL has no action suffix and no trailing slash, e.g.
//! `https://example.com/tmdb`. Action routes are built from it:
//!
//! | action  | current protocol                 | legacy routes              |
//! |---------|----------------------------------|----------------------------|
//! | addon   | `…/mediaurl.json`                | `…/addon.watched`          |
//! | catalog | `…/mediaurl-catalog.json`        | `…/catalog.watched`        |

use std::sync::OnceLock;

use regex::Regex;
use url::Url;

pub use mediaurl_core::addon::strip_addon_url;

use crate::error::AddonError;

/// Failed to parse or resolve an addon URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlError {
    pub url: String,
    pub reason: String,
}

impl From<UrlError> for AddonError {
    fn from(e: UrlError) -> Self {
        AddonError::InvalidUrl {
            url: e.url,
            reason: e.reason,
        }
    }
}

impl From<UrlError> for crate::error::ProbeError {
    fn from(e: UrlError) -> Self {
        crate::error::ProbeError::InvalidUrl {
            url: e.url,
            reason: e.reason,
        }
    }
}

fn parse(url: &str) -> Result<Url, UrlError> {
    Url::parse(url).map_err(|e| UrlError {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn ends_with_mediaurl_json(url: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/mediaurl[^/]*\.json$").expect("valid regex"))
        .is_match(url)
}

/// Route file name for `action`.
fn route_file(action: &str, legacy: bool) -> String {
    if legacy {
        format!("{}.watched", action)
    } else if action == "addon" {
        "mediaurl.json".to_string()
    } else {
        format!("mediaurl-{}.json", action)
    }
}

/// Serialize a URL, dropping the lone `/` path the `url` crate always keeps.
pub(crate) fn to_base_string(url: &Url) -> String {
    let s = url.as_str();
    if url.path() == "/" && url.query().is_none() && url.fragment().is_none() {
        s.strip_suffix('/').unwrap_or(s).to_string()
    } else {
        s.to_string()
    }
}

/// Normalize `url` (optionally resolved relative to `base`) to a clean base
/// URL, or to the route of `action` on it.
///
/// Legacy `.watched` routes are used only when `legacy_routes` is on, the
/// addon's SDK is a `0.x` one (or unknown), and `url` isn't already a
/// `mediaurl*.json` route.
pub fn clean_addon_url(
    url: &str,
    base: Option<&str>,
    action: Option<&str>,
    sdk_version: Option<&str>,
    legacy_routes: bool,
) -> Result<String, UrlError> {
    let mut temp = parse(base.unwrap_or(url))?;
    let path = strip_addon_url(temp.path());
    temp.set_path(&path);
    if base.is_some() {
        temp = temp.join(url).map_err(|e| UrlError {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let path = strip_addon_url(temp.path());
        temp.set_path(&path);
    }

    let Some(action) = action else {
        return Ok(to_base_string(&temp));
    };

    let mut legacy = legacy_routes;
    if legacy && sdk_version.is_some_and(|v| !v.starts_with("0.")) {
        legacy = false;
    }
    if legacy && ends_with_mediaurl_json(url) {
        legacy = false;
    }

    let path = temp.path();
    let separator = if path.is_empty() || path == "/" || path.ends_with('/') {
        ""
    } else {
        "/"
    };
    let new_path = format!("{}{}{}", path, separator, route_file(action, legacy));
    temp.set_path(&new_path);
    Ok(temp.to_string())
}
