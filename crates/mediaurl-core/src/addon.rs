//! Addon descriptor: the self-description an addon's discovery endpoint
//! returns, after migration and validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::DEFAULT_SDK_VERSION;
use crate::version;

/// Validated addon self-description.
///
/// Known fields are typed; everything else the addon sends is kept in
/// `extra` so nothing is lost when the descriptor is serialized again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonDescriptor {
    pub id: String,
    /// Plain string or a language → string map.
    pub name: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "sdkVersion", default, skip_serializing_if = "Option::is_none")]
    pub sdk_version: Option<String>,
    /// Clean base URLs, first = preferred.
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Other addons, by URL (absolute or relative) or legacy bare ID.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<String>,
    #[serde(rename = "urlPatterns", default, skip_serializing_if = "Vec::is_empty")]
    pub url_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalogs: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<Vec<Value>>,
    /// Set by the legacy-v1 migration for `type: "repository"` addons.
    #[serde(
        rename = "_isLegacyRepositoryAddon",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub legacy_repository: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AddonDescriptor {
    /// Build from an already migrated and validated payload, normalizing
    /// endpoints and deriving triggers / URL patterns.
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let addon: Self = serde_json::from_value(value)?;
        Ok(addon.normalized())
    }

    fn normalized(mut self) -> Self {
        let mut endpoints: Vec<String> = Vec::with_capacity(self.endpoints.len());
        for e in self.endpoints.iter().map(|e| strip_addon_url(e)) {
            if !endpoints.contains(&e) {
                endpoints.push(e);
            }
        }
        self.endpoints = endpoints;

        if self.has_action("item") || self.has_action("source") || self.has_action("subtitle") {
            let trigger = format!("id/{}", self.id);
            if !self.triggers.contains(&trigger) {
                self.triggers.push(trigger);
            }
        }

        if self.has_action("resolve") {
            for prefix in ["watched-addon", "mediaurl-addon"] {
                let pattern = format!("^({}:)?{}:.*$", prefix, self.id);
                if !self.url_patterns.contains(&pattern) {
                    self.url_patterns.push(pattern);
                }
            }
        }
        self
    }

    pub fn has_action(&self, action: &str) -> bool {
        self.actions.iter().any(|a| a == action)
    }

    /// Declared SDK version, `0.33.0` when absent.
    pub fn sdk_version(&self) -> &str {
        self.sdk_version.as_deref().unwrap_or(DEFAULT_SDK_VERSION)
    }

    pub fn is_sdk_newer_than(&self, other: &str) -> bool {
        version::sdk_newer_than(Some(self.sdk_version()), Some(other))
    }

    /// Compares the addon's own `version` (default `0.0.0`).
    pub fn is_newer_than(&self, other: Option<&str>) -> bool {
        version::is_newer(self.version.as_deref(), other, "0.0.0")
    }

    /// Legacy repository addons and everything not newer than 2.0.0-alpha.0.
    pub fn is_legacy(&self) -> bool {
        self.legacy_repository || !self.is_sdk_newer_than(version::V2_THRESHOLD)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Remove discovery / action suffixes and the trailing slash from a URL or
/// path: `…/catalog.watched`, `…/mediaurl-item.json`, `…/`.
pub fn strip_addon_url(url: &str) -> String {
    static WATCHED: OnceLock<Regex> = OnceLock::new();
    static MEDIAURL: OnceLock<Regex> = OnceLock::new();
    let watched = WATCHED.get_or_init(|| Regex::new(r"/[^/]+\.watched$").expect("valid regex"));
    let mediaurl =
        MEDIAURL.get_or_init(|| Regex::new(r"/mediaurl[^/]*\.json$").expect("valid regex"));
    let s = watched.replace(url, "");
    let s = mediaurl.replace(&s, "");
    s.strip_suffix('/').unwrap_or(&s).to_string()
}
