//! Endpoint prober/racer.
//!
//! Every candidate gets its own task in a [`JoinSet`]. Starts are staggered:
//! the next candidate is spawned when `load_next_timeout` elapses or a probe
//! finishes without a result, whichever comes first. The first probe that
//! classifies successfully wins; the shared [`CancellationToken`] is then
//! cancelled and the remaining tasks are dropped.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

use mediaurl_core::protocol::{DISCOVERY_SUFFIX, JSON_CONTENT_TYPE, LEGACY_DISCOVERY_SUFFIX};

use crate::addon_url::{clean_addon_url, UrlError};
use crate::client::ClientContext;
use crate::error::ProbeError;
use crate::responses::{handle_response, ProbeResult, ResponseData};
use crate::transport::{HttpRequest, HttpResponse};

/// What the caller expects behind an endpoint. Selects legacy GET routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndpointType {
    Addon,
    Server,
    #[default]
    Unknown,
}

impl EndpointType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Addon => "addon",
            Self::Server => "server",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discovery URLs to probe for `endpoints`, deduplicated, in order. Under
/// legacy routes the 2.x `mediaurl.json` route of every endpoint is added.
fn probe_urls(ctx: &ClientContext, endpoints: &[String]) -> Vec<String> {
    let legacy = ctx.config.legacy_routes;
    let mut passes = vec![None];
    if legacy {
        passes.push(Some("2.0.0"));
    }

    let mut urls: Vec<String> = Vec::new();
    for sdk_version in passes {
        for endpoint in endpoints {
            match clean_addon_url(endpoint, None, Some("addon"), sdk_version, legacy) {
                Ok(url) => {
                    if !urls.contains(&url) {
                        urls.push(url);
                    }
                }
                Err(e) if sdk_version.is_none() => {
                    let err = ProbeError::from(e);
                    tracing::debug!(endpoint = %endpoint, err = %err, "Skipping endpoint");
                    ctx.observer.on_probe_error(endpoint, &err);
                }
                Err(_) => {}
            }
        }
    }
    urls
}

/// Race discovery probes against `endpoints`. `None` if nothing answered
/// with a usable response; per-probe errors only reach the observer.
pub(crate) async fn race(
    ctx: &Arc<ClientContext>,
    endpoints: &[String],
    body: &Value,
    endpoint_type: EndpointType,
    allow_server_responses: bool,
) -> Option<Vec<ProbeResult>> {
    let mut queue: VecDeque<String> = probe_urls(ctx, endpoints).into();
    if queue.is_empty() {
        return None;
    }

    let body: Arc<str> = Arc::from(body.to_string());
    let cancel = CancellationToken::new();
    let mut set = JoinSet::new();
    let mut winner = None;

    while winner.is_none() {
        if let Some(url) = queue.pop_front() {
            tracing::debug!(endpoint = %url, endpoint_type = %endpoint_type, "Probing");
            let probe = Probe {
                ctx: Arc::clone(ctx),
                url,
                body: Arc::clone(&body),
                endpoint_type,
                allow_server_responses,
                cancel: cancel.clone(),
            };
            set.spawn(async move {
                let result = probe.run().await;
                (probe.url, result)
            });
        }
        if set.is_empty() {
            break;
        }

        let joined = if queue.is_empty() {
            set.join_next().await
        } else {
            tokio::select! {
                joined = set.join_next() => joined,
                _ = tokio::time::sleep(ctx.config.load_next_timeout) => continue,
            }
        };

        match joined {
            Some(Ok((url, Ok(results)))) => {
                tracing::debug!(endpoint = %url, results = results.len(), "Probe succeeded");
                winner = Some(results);
            }
            Some(Ok((_, Err(ProbeError::Cancelled)))) => {}
            Some(Ok((url, Err(e)))) => {
                tracing::debug!(endpoint = %url, err = %e, "Probe failed");
                ctx.observer.on_probe_error(&url, &e);
            }
            Some(Err(e)) => tracing::warn!(err = %e, "Probe task did not complete"),
            None => break,
        }
    }

    cancel.cancel();
    set.abort_all();
    winner
}

struct Probe {
    ctx: Arc<ClientContext>,
    url: String,
    body: Arc<str>,
    endpoint_type: EndpointType,
    allow_server_responses: bool,
    cancel: CancellationToken,
}

impl Probe {
    async fn run(&self) -> Result<Vec<ProbeResult>, ProbeError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            res = tokio::time::timeout(self.ctx.config.endpoint_test_timeout, self.fetch()) => {
                res.unwrap_or_else(|_| Err(ProbeError::Timeout))
            }
        }
    }

    /// Old SDK servers only understand `GET ?data=<json>`.
    fn legacy_get(&self) -> bool {
        self.ctx.config.legacy_routes && self.endpoint_type != EndpointType::Addon
    }

    async fn fetch(&self) -> Result<Vec<ProbeResult>, ProbeError> {
        let mut current = self.url.clone();
        let mut seen = HashSet::new();
        let response = loop {
            seen.insert(current.clone());
            let request = self.request(&current)?;
            let res = self.ctx.transport.fetch(request).await?;
            if self.cancel.is_cancelled() || !res.is_redirect() {
                break res;
            }
            let Some(location) = res.header("location") else {
                break res;
            };
            let next = resolve(&res.url, location)?;
            if seen.contains(&next) {
                tracing::debug!(endpoint = %self.url, location = %next, "Redirect loop");
                break res;
            }
            current = next;
        };
        self.classify(response)
    }

    fn request(&self, url: &str) -> Result<HttpRequest, ProbeError> {
        let mut headers = vec![("user-agent".to_string(), self.ctx.config.user_agent.clone())];
        if self.legacy_get() {
            let mut url = parse(url)?;
            url.query_pairs_mut().clear().append_pair("data", &self.body);
            Ok(HttpRequest::get(url.to_string()).with_headers(&headers))
        } else {
            headers.push(("content-type".to_string(), JSON_CONTENT_TYPE.to_string()));
            Ok(HttpRequest::post(url, self.body.to_string()).with_headers(&headers))
        }
    }

    fn classify(&self, res: HttpResponse) -> Result<Vec<ProbeResult>, ProbeError> {
        let mut url = parse(&res.url)?;
        if self.legacy_get() {
            remove_query_param(&mut url, "data");
        }

        let path = url.path();
        let is_discovery = path.contains(&format!("/{}", DISCOVERY_SUFFIX))
            || path.contains(&format!("/{}", LEGACY_DISCOVERY_SUFFIX));
        if !is_discovery {
            return Err(if (400..600).contains(&res.status) {
                ProbeError::HttpStatus(res.status)
            } else {
                ProbeError::UnknownRequestError
            });
        }

        let data = ResponseData {
            url: url.to_string(),
            status: res.status,
            headers: res.headers,
            body: res.body,
        };
        handle_response(&data, self.allow_server_responses, self.ctx.validator.as_ref())
    }
}

fn parse(url: &str) -> Result<Url, UrlError> {
    Url::parse(url).map_err(|e| UrlError {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn resolve(base: &str, location: &str) -> Result<String, UrlError> {
    parse(base)?
        .join(location)
        .map(String::from)
        .map_err(|e| UrlError {
            url: location.to_string(),
            reason: e.to_string(),
        })
}

fn remove_query_param(url: &mut Url, name: &str) {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != name)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use mediaurl_core::config::ClientConfig;
    use mediaurl_core::StructuralValidator;
    use serde_json::json;

    use super::*;
    use crate::observer::Observer;
    use crate::transport::{Method, Transport, TransportError};

    #[derive(Clone)]
    struct Reply {
        latency: Duration,
        status: u16,
        headers: Vec<(&'static str, String)>,
        body: String,
    }

    fn ok(latency_ms: u64, body: Value) -> Reply {
        Reply {
            latency: Duration::from_millis(latency_ms),
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    fn redirect(to: &str) -> Reply {
        Reply {
            latency: Duration::from_millis(1),
            status: 302,
            headers: vec![("location", to.to_string())],
            body: String::new(),
        }
    }

    fn addon(id: &str) -> Value {
        json!({ "id": id, "name": id, "sdkVersion": "2.3.0", "actions": ["catalog"] })
    }

    /// In-process transport keyed by URL without query.
    #[derive(Default)]
    struct FakeTransport {
        replies: HashMap<String, Reply>,
        requests: Mutex<Vec<HttpRequest>>,
        finished: Mutex<Vec<String>>,
    }

    impl FakeTransport {
        fn with(mut self, url: &str, reply: Reply) -> Self {
            self.replies.insert(url.to_string(), reply);
            self
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let key = request.url.split('?').next().unwrap_or_default().to_string();
            let Some(reply) = self.replies.get(&key).cloned() else {
                return Err(TransportError::new(&request.url, "connection refused"));
            };
            tokio::time::sleep(reply.latency).await;
            self.finished.lock().unwrap().push(key);
            Ok(HttpResponse {
                status: reply.status,
                url: request.url,
                headers: reply
                    .headers
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect(),
                body: reply.body,
            })
        }
    }

    #[derive(Default)]
    struct RecordingObserver {
        probe_errors: Mutex<Vec<(String, String)>>,
    }

    impl Observer for RecordingObserver {
        fn on_probe_error(&self, url: &str, error: &ProbeError) {
            self.probe_errors
                .lock()
                .unwrap()
                .push((url.to_string(), error.to_string()));
        }
    }

    fn context(
        transport: Arc<FakeTransport>,
        observer: Arc<RecordingObserver>,
        config: ClientConfig,
    ) -> Arc<ClientContext> {
        Arc::new(ClientContext {
            transport,
            validator: Arc::new(StructuralValidator),
            observer,
            config: Arc::new(config),
        })
    }

    fn config(load_next_ms: u64, timeout_ms: u64) -> ClientConfig {
        ClientConfig {
            load_next_timeout: Duration::from_millis(load_next_ms),
            endpoint_test_timeout: Duration::from_millis(timeout_ms),
            ..ClientConfig::default()
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_valid_responder_wins_regardless_of_position() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://a.io/mediaurl.json", ok(5, json!({ "nope": true })))
                .with("https://b.io/mediaurl.json", ok(2000, addon("b")))
                .with("https://c.io/mediaurl.json", ok(10, json!("garbage"))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport, observer.clone(), config(100, 5000));

        let results = race(
            &ctx,
            &strings(&["https://a.io", "https://b.io", "https://c.io"]),
            &json!({}),
            EndpointType::Unknown,
            true,
        )
        .await
        .unwrap();
        assert_eq!(results[0].addon().unwrap().id, "b");
        assert_eq!(observer.probe_errors.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fastest_responder_wins_and_rest_is_cancelled() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://slow.io/mediaurl.json", ok(800, addon("slow")))
                .with("https://fast.io/mediaurl.json", ok(10, addon("fast"))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport.clone(), observer, config(100, 5000));

        let results = race(
            &ctx,
            &strings(&["https://slow.io", "https://fast.io"]),
            &json!({}),
            EndpointType::Addon,
            false,
        )
        .await
        .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].endpoints(), ["https://fast.io".to_string()]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            *transport.finished.lock().unwrap(),
            vec!["https://fast.io/mediaurl.json".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_staggered_start() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://a.io/mediaurl.json", ok(50, addon("a")))
                .with("https://b.io/mediaurl.json", ok(1, addon("b"))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport.clone(), observer, config(1000, 5000));

        let results = race(
            &ctx,
            &strings(&["https://a.io", "https://b.io"]),
            &json!({}),
            EndpointType::Addon,
            false,
        )
        .await
        .unwrap();
        // a finished before the grace interval, so b never started
        assert_eq!(results[0].addon().unwrap().id, "a");
        assert_eq!(transport.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_probe_not_race() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://hang.io/mediaurl.json", ok(60_000, addon("hang"))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport, observer.clone(), config(100, 500));

        let result = race(&ctx, &strings(&["https://hang.io"]), &json!({}), EndpointType::Addon, true).await;
        assert!(result.is_none());
        assert_eq!(
            *observer.probe_errors.lock().unwrap(),
            vec![("https://hang.io/mediaurl.json".to_string(), "Timeout".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_follows_redirects_and_breaks_loops() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://old.io/mediaurl.json", redirect("https://new.io/x/mediaurl.json"))
                .with("https://new.io/x/mediaurl.json", ok(1, addon("moved")))
                .with("https://loop.io/mediaurl.json", redirect("/again/mediaurl.json"))
                .with("https://loop.io/again/mediaurl.json", redirect("https://loop.io/mediaurl.json")),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport, observer.clone(), config(100, 5000));

        let results = race(&ctx, &strings(&["https://old.io"]), &json!({}), EndpointType::Addon, false)
            .await
            .unwrap();
        assert_eq!(results[0].endpoints(), ["https://new.io/x".to_string()]);
        assert_eq!(
            results[0].addon().unwrap().endpoints,
            vec!["https://new.io/x".to_string()]
        );

        let none = race(&ctx, &strings(&["https://loop.io"]), &json!({}), EndpointType::Addon, false).await;
        assert!(none.is_none());
        let errors = observer.probe_errors.lock().unwrap();
        assert!(errors[0].1.starts_with("302 - "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_discovery_final_url_is_http_error() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://a.io/mediaurl.json", redirect("https://a.io/login"))
                .with(
                    "https://a.io/login",
                    Reply {
                        latency: Duration::from_millis(1),
                        status: 404,
                        headers: Vec::new(),
                        body: String::new(),
                    },
                ),
        );
        let observer = Arc::new(RecordingObserver::default());
        let ctx = context(transport, observer.clone(), config(100, 5000));

        assert!(race(&ctx, &strings(&["https://a.io"]), &json!({}), EndpointType::Addon, true)
            .await
            .is_none());
        assert_eq!(observer.probe_errors.lock().unwrap()[0].1, "404");
    }

    #[tokio::test(start_paused = true)]
    async fn test_legacy_routes_probe_both_generations_with_get() {
        let transport = Arc::new(
            FakeTransport::default()
                .with("https://a.io/mediaurl.json", ok(1, addon("a"))),
        );
        let observer = Arc::new(RecordingObserver::default());
        let cfg = ClientConfig {
            legacy_routes: true,
            ..config(1000, 5000)
        };
        let ctx = context(transport.clone(), observer.clone(), cfg);

        let results = race(
            &ctx,
            &strings(&["https://a.io"]),
            &json!({ "q": 1 }),
            EndpointType::Server,
            true,
        )
        .await
        .unwrap();
        assert_eq!(results[0].endpoints(), ["https://a.io".to_string()]);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests[0].method, Method::Get);
        assert!(requests[0].url.starts_with("https://a.io/addon.watched?data="));
        assert!(requests[0].body.is_none());
        assert!(requests[1].url.starts_with("https://a.io/mediaurl.json?data="));
        assert_eq!(
            observer.probe_errors.lock().unwrap()[0].1,
            "connection refused"
        );
    }

    #[tokio::test]
    async fn test_no_endpoints() {
        let ctx = context(
            Arc::new(FakeTransport::default()),
            Arc::new(RecordingObserver::default()),
            ClientConfig::default(),
        );
        assert!(race(&ctx, &[], &json!({}), EndpointType::Unknown, true).await.is_none());
    }
}
