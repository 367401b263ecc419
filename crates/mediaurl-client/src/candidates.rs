//! Candidate URLs for free-form user input.
//!
//! `localhost` → `http://localhost:3000/mediaurl.json`,
//! `http://localhost:3000/addon.watched`, `http://localhost:3000/`,
//! `https://localhost/mediaurl.json`, ...

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use mediaurl_core::protocol::{DISCOVERY_SUFFIX, LEGACY_DISCOVERY_SUFFIX};

/// Stand-in scheme so that scheme-less input parses as a URL.
const PLACEHOLDER_SCHEME: &str = "x";

/// Port tried first for local development hosts.
pub const DEV_PORT: u16 = 3000;

fn is_local_host(host: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(localhost|127\.|192\.168\.)").expect("valid regex"))
        .is_match(host)
}

struct Variant {
    scheme: &'static str,
    port: Option<u16>,
}

/// Ordered, deduplicated probe list for `input`.
///
/// Discovery-suffix candidates come before the bare URL of the same
/// scheme/port variant. Unparseable input yields an empty list.
pub fn candidate_urls(input: &str) -> Vec<String> {
    let input = input.trim();
    let raw = if input.contains("://") {
        input.to_string()
    } else {
        format!("{}://{}", PLACEHOLDER_SCHEME, input)
    };

    let url = match Url::parse(&raw) {
        Ok(u) => u,
        Err(e) => {
            tracing::debug!(input = %input, err = %e, "Input is not a URL");
            return Vec::new();
        }
    };
    let Some(host) = url.host_str().filter(|h| !h.is_empty()) else {
        tracing::debug!(input = %input, "Input has no host");
        return Vec::new();
    };
    // Hosts of non-special schemes keep their case
    let host = host.to_ascii_lowercase();
    let host = host.as_str();
    let path = if url.path().is_empty() { "/" } else { url.path() };

    let mut variants = Vec::new();
    if url.scheme() == PLACEHOLDER_SCHEME {
        match url.port() {
            Some(80) => variants.push(Variant { scheme: "http", port: None }),
            Some(443) => variants.push(Variant { scheme: "https", port: None }),
            port => {
                if is_local_host(host) {
                    variants.push(Variant {
                        scheme: "http",
                        port: Some(port.unwrap_or(DEV_PORT)),
                    });
                }
                variants.push(Variant { scheme: "https", port });
                variants.push(Variant { scheme: "http", port });
            }
        }
    } else {
        variants.push(Variant { scheme: "https", port: url.port() });
        variants.push(Variant { scheme: "http", port: url.port() });
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |candidate: Option<String>| {
        if let Some(c) = candidate {
            if seen.insert(c.clone()) {
                out.push(c);
            }
        }
    };

    for v in &variants {
        let has_suffix = path.contains(&format!("/{}", DISCOVERY_SUFFIX))
            || path.contains(&format!("/{}", LEGACY_DISCOVERY_SUFFIX));
        if !has_suffix {
            let base = path.strip_suffix('/').unwrap_or(path);
            for suffix in [DISCOVERY_SUFFIX, LEGACY_DISCOVERY_SUFFIX] {
                let p = format!("{}/{}", base, suffix);
                push(render(v, host, &p, url.query()));
            }
        }
        push(render(v, host, path, url.query()));
    }
    out
}

/// Rebuild a URL from parts. `Url::set_scheme` can't move between the
/// placeholder and a special scheme, so go through the string form.
fn render(v: &Variant, host: &str, path: &str, query: Option<&str>) -> Option<String> {
    let mut s = format!("{}://{}", v.scheme, host);
    if let Some(port) = v.port {
        s.push_str(&format!(":{}", port));
    }
    s.push_str(path);
    if let Some(q) = query {
        s.push('?');
        s.push_str(q);
    }
    Url::parse(&s).ok().map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localhost_dev_port_first() {
        let c = candidate_urls("localhost");
        assert_eq!(
            c,
            vec![
                "http://localhost:3000/mediaurl.json",
                "http://localhost:3000/addon.watched",
                "http://localhost:3000/",
                "https://localhost/mediaurl.json",
                "https://localhost/addon.watched",
                "https://localhost/",
                "http://localhost/mediaurl.json",
                "http://localhost/addon.watched",
                "http://localhost/",
            ]
        );
    }

    #[test]
    fn test_local_host_is_case_insensitive() {
        assert_eq!(candidate_urls("LocalHost"), candidate_urls("localhost"));
        assert_eq!(candidate_urls("LOCALHOST:4000")[0], "http://localhost:4000/mediaurl.json");
    }

    #[test]
    fn test_local_host_keeps_given_port() {
        let c = candidate_urls("192.168.1.5:8080/x");
        assert_eq!(c[0], "http://192.168.1.5:8080/x/mediaurl.json");
        assert_eq!(c[2], "http://192.168.1.5:8080/x");
        assert_eq!(c[3], "https://192.168.1.5:8080/x/mediaurl.json");
        // http variant on the same port collapses into the first one
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn test_well_known_ports() {
        assert_eq!(
            candidate_urls("example.com:443/foo"),
            vec![
                "https://example.com/foo/mediaurl.json",
                "https://example.com/foo/addon.watched",
                "https://example.com/foo",
            ]
        );
        assert_eq!(candidate_urls("example.com:80")[0], "http://example.com/mediaurl.json");
        assert_eq!(candidate_urls("example.com:80").len(), 3);
    }

    #[test]
    fn test_explicit_scheme_with_discovery_path() {
        assert_eq!(
            candidate_urls("https://a.io/x/mediaurl.json?k=v"),
            vec![
                "https://a.io/x/mediaurl.json?k=v",
                "http://a.io/x/mediaurl.json?k=v",
            ]
        );
    }

    #[test]
    fn test_suffixes_precede_bare_variant() {
        let c = candidate_urls("http://a.io/tmdb/");
        assert_eq!(
            c,
            vec![
                "https://a.io/tmdb/mediaurl.json",
                "https://a.io/tmdb/addon.watched",
                "https://a.io/tmdb/",
                "http://a.io/tmdb/mediaurl.json",
                "http://a.io/tmdb/addon.watched",
                "http://a.io/tmdb/",
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        for input in ["localhost:4000", "a.io", "https://b.io/x?y=1", "127.0.0.1"] {
            assert_eq!(candidate_urls(input), candidate_urls(input));
        }
    }

    #[test]
    fn test_garbage_input() {
        assert!(candidate_urls("").is_empty());
        assert!(candidate_urls("http://").is_empty());
    }
}
