//! Response classifier: server pointer lists vs. addon descriptors.

use std::collections::HashMap;

use serde_json::Value;
use url::Url;

use mediaurl_core::{Action, AddonDescriptor, Direction, SchemaError, Validator};

use crate::addon_url::{clean_addon_url, strip_addon_url, UrlError};
use crate::error::{truncate_body, ProbeError};
use crate::migration::validate_action;

/// Raw response of a discovery probe, after redirects.
#[derive(Debug, Clone)]
pub struct ResponseData {
    pub url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// A classified discovery result.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeResult {
    /// A working addon. `endpoints` holds the URL that answered.
    Addon {
        endpoints: Vec<String>,
        addon: Box<AddonDescriptor>,
    },
    /// One addon URL listed by a server. Probe it again; it is not an addon.
    Server { endpoints: Vec<String> },
}

impl ProbeResult {
    pub fn endpoints(&self) -> &[String] {
        match self {
            Self::Addon { endpoints, .. } | Self::Server { endpoints } => endpoints,
        }
    }

    pub fn addon(&self) -> Option<&AddonDescriptor> {
        match self {
            Self::Addon { addon, .. } => Some(addon),
            Self::Server { .. } => None,
        }
    }

    pub fn into_addon(self) -> Option<AddonDescriptor> {
        match self {
            Self::Addon { addon, .. } => Some(*addon),
            Self::Server { .. } => None,
        }
    }
}

fn is_server_response(body: &Value) -> bool {
    body.get("type").and_then(Value::as_str) == Some("server")
}

fn is_addon_response(body: &Value) -> bool {
    body.get("id").is_some_and(Value::is_string)
        && body.get("name").is_some_and(|n| n.is_string() || n.is_object())
}

/// Classify a discovery response.
pub fn handle_response(
    data: &ResponseData,
    allow_server_responses: bool,
    validator: &dyn Validator,
) -> Result<Vec<ProbeResult>, ProbeError> {
    let body: Value = serde_json::from_str(&data.body).map_err(|_| ProbeError::MalformedResponse {
        status: data.status,
        body: truncate_body(&data.body),
    })?;

    if is_server_response(&body) {
        if !allow_server_responses {
            return Err(ProbeError::ServerResponseForbidden);
        }
        let server = validate_action(validator, &Action::Addon, Direction::Response, &body, None)?;
        let base = server_base(&data.url)?;
        let addons = server
            .payload
            .get("addons")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        return addons
            .iter()
            .filter_map(Value::as_str)
            .map(|addon_url| -> Result<ProbeResult, ProbeError> {
                let url = clean_addon_url(addon_url, Some(&base), None, None, false)?;
                Ok(ProbeResult::Server {
                    endpoints: vec![url],
                })
            })
            .collect();
    }

    if is_addon_response(&body) {
        let validated = validate_action(validator, &Action::Addon, Direction::Response, &body, None)?;
        let mut addon = AddonDescriptor::from_value(validated.payload)
            .map_err(|e| SchemaError::new("addon", e.to_string()))?;

        let clean_url = clean_addon_url(&data.url, None, None, None, false)?;
        let mut endpoints: Vec<String> = Vec::with_capacity(addon.endpoints.len() + 1);
        for endpoint in &addon.endpoints {
            // Relative entries resolve against the responding URL
            match clean_addon_url(endpoint, Some(&data.url), None, None, false) {
                Ok(endpoint) if !endpoints.contains(&endpoint) => endpoints.push(endpoint),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(addon = %addon.id, endpoint = %endpoint, err = %e.reason, "Skipping invalid endpoint");
                }
            }
        }
        if !endpoints.contains(&clean_url) {
            endpoints.insert(0, clean_url.clone());
        }
        addon.endpoints = endpoints;

        return Ok(vec![ProbeResult::Addon {
            endpoints: vec![clean_url],
            addon: Box::new(addon),
        }]);
    }

    Err(ProbeError::UnrecognizedResponse)
}

/// `…/mediaurl.json` → `…/server`, the base server-listed URLs resolve against.
fn server_base(url: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url).map_err(|e| UrlError {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    let path = format!("{}/server", strip_addon_url(url.path()));
    url.set_path(&path);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaurl_core::StructuralValidator;
    use serde_json::json;

    fn response(url: &str, body: Value) -> ResponseData {
        ResponseData {
            url: url.to_string(),
            status: 200,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_server_response_expands_relative_urls() {
        let data = response(
            "https://www.mediaurl.io/test/mediaurl.json",
            json!({ "type": "server", "addons": ["xample-worker1", "https://other.io/y/mediaurl.json"] }),
        );
        let results = handle_response(&data, true, &StructuralValidator).unwrap();
        assert_eq!(
            results,
            vec![
                ProbeResult::Server {
                    endpoints: vec!["https://www.mediaurl.io/test/xample-worker1".into()]
                },
                ProbeResult::Server {
                    endpoints: vec!["https://other.io/y".into()]
                },
            ]
        );
        assert!(results.iter().all(|r| r.addon().is_none()));
    }

    #[test]
    fn test_server_response_forbidden() {
        let data = response("https://a.io/mediaurl.json", json!({ "type": "server", "addons": [] }));
        let err = handle_response(&data, false, &StructuralValidator).unwrap_err();
        assert!(matches!(err, ProbeError::ServerResponseForbidden));
        assert_eq!(err.to_string(), "MediaURL server responses are forbidden");
    }

    #[test]
    fn test_addon_response_puts_responder_first() {
        let data = response(
            "https://b.io/tmdb/mediaurl.json",
            json!({
                "id": "tmdb",
                "name": "TMDB",
                "sdkVersion": "2.3.0",
                "endpoints": ["https://a.io/tmdb/", "https://a.io/tmdb/mediaurl.json"]
            }),
        );
        let results = handle_response(&data, false, &StructuralValidator).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].endpoints(), ["https://b.io/tmdb".to_string()]);
        let addon = results[0].addon().unwrap();
        assert_eq!(addon.endpoints, vec!["https://b.io/tmdb", "https://a.io/tmdb"]);
    }

    #[test]
    fn test_relative_and_invalid_endpoints_do_not_reject_addon() {
        let data = response(
            "https://b.io/tmdb/mediaurl.json",
            json!({
                "id": "tmdb",
                "name": "TMDB",
                "sdkVersion": "2.3.0",
                "endpoints": ["/mirror", "http://[::1", "https://a.io/tmdb"]
            }),
        );
        let results = handle_response(&data, false, &StructuralValidator).unwrap();
        assert_eq!(
            results[0].addon().unwrap().endpoints,
            vec!["https://b.io/tmdb", "https://b.io/mirror", "https://a.io/tmdb"]
        );
    }

    #[test]
    fn test_addon_response_keeps_listed_order_when_present() {
        let data = response(
            "https://b.io/mediaurl.json",
            json!({
                "id": "x",
                "name": { "en": "X" },
                "sdkVersion": "2.3.0",
                "endpoints": ["https://a.io", "https://b.io"]
            }),
        );
        let results = handle_response(&data, true, &StructuralValidator).unwrap();
        assert_eq!(
            results[0].addon().unwrap().endpoints,
            vec!["https://a.io", "https://b.io"]
        );
    }

    #[test]
    fn test_legacy_addon_is_migrated() {
        let data = response(
            "https://a.io/addon.watched",
            json!({ "id": "old", "name": "Old", "flags": { "adult": false }, "metadata": { "url": "https://m.io" } }),
        );
        let results = handle_response(&data, true, &StructuralValidator).unwrap();
        let addon = results[0].addon().unwrap();
        assert_eq!(addon.endpoints, vec!["https://a.io", "https://m.io"]);
        assert_eq!(addon.extra.get("adult"), Some(&json!(false)));
    }

    #[test]
    fn test_malformed_and_unrecognized() {
        let data = ResponseData {
            url: "https://a.io/mediaurl.json".into(),
            status: 502,
            headers: HashMap::new(),
            body: "<html>bad gateway</html>".into(),
        };
        let err = handle_response(&data, true, &StructuralValidator).unwrap_err();
        assert_eq!(err.to_string(), "502 - <html>bad gateway</html>");

        let data = response("https://a.io/mediaurl.json", json!({ "hello": "world" }));
        let err = handle_response(&data, true, &StructuralValidator).unwrap_err();
        assert!(matches!(err, ProbeError::UnrecognizedResponse));
    }

    #[test]
    fn test_schema_error_is_probe_failure() {
        let data = response(
            "https://a.io/mediaurl.json",
            json!({ "id": "x", "name": "X", "sdkVersion": "2.3.0", "endpoints": "nope" }),
        );
        let err = handle_response(&data, true, &StructuralValidator).unwrap_err();
        assert!(matches!(err, ProbeError::Schema(_)));
    }
}
