//! End-to-end call tests against a local HTTP server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediaurl_client::{
    Action, AddonDescriptor, AddonError, CallOptions, Client, ClientConfig, Observer,
    TaskHandlers,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config() -> ClientConfig {
    ClientConfig {
        endpoint_test_timeout: Duration::from_secs(2),
        load_next_timeout: Duration::from_millis(50),
        ..ClientConfig::default()
    }
}

fn descriptor(id: &str, sdk: &str, actions: &[&str], endpoints: &[String]) -> AddonDescriptor {
    AddonDescriptor::from_value(json!({
        "id": id,
        "name": id,
        "sdkVersion": sdk,
        "actions": actions,
        "endpoints": endpoints,
    }))
    .unwrap()
}

#[derive(Default)]
struct EndpointErrors(Mutex<Vec<String>>);

impl Observer for EndpointErrors {
    fn on_endpoint_error(&self, _addon_id: &str, endpoint: &str, _error: &AddonError) {
        self.0.lock().unwrap().push(endpoint.to_string());
    }
}

#[tokio::test]
async fn test_failing_first_endpoint_is_demoted() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-catalog.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal error"))
        .expect(1)
        .mount(&a)
        .await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-catalog.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(2)
        .mount(&b)
        .await;

    let observer = Arc::new(EndpointErrors::default());
    let client = Client::builder()
        .config(config())
        .observer(observer.clone())
        .build()
        .unwrap();
    let mut addon = client.addon(descriptor("cat", "2.3.0", &["catalog"], &[a.uri(), b.uri()]));

    let result = addon
        .call(Action::Catalog, json!({ "catalogId": "" }), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(result, json!({ "items": [] }));
    assert_eq!(addon.endpoints(), [b.uri(), a.uri()]);
    assert_eq!(*observer.0.lock().unwrap(), vec![a.uri()]);

    // The next call goes to b directly
    addon
        .call(Action::Catalog, json!({ "catalogId": "" }), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(addon.endpoints(), [b.uri(), a.uri()]);
}

#[tokio::test]
async fn test_task_loop_runs_handlers_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-item.json"))
        .and(body_partial_json(json!({ "ids": { "id": "1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "taskRequest", "id": "t1", "data": { "type": "x" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-item.json"))
        .and(body_partial_json(json!({
            "kind": "taskResponse", "id": "t1", "data": { "answer": "x" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "taskRequest", "id": "t2", "data": { "type": "y" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-item.json"))
        .and(body_partial_json(json!({
            "kind": "taskResponse", "id": "t2", "data": { "answer": "y" }
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "1", "name": "Movie" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut handlers = TaskHandlers::new();
    for task_type in ["x", "y"] {
        let seen = Arc::clone(&seen);
        handlers.register_fn(task_type, move |_addon, data: Value| {
            let seen = Arc::clone(&seen);
            async move {
                let t = data["type"].as_str().unwrap_or_default().to_string();
                seen.lock().unwrap().push(t.clone());
                Ok::<_, anyhow::Error>(json!({ "answer": t }))
            }
        });
    }
    let options = CallOptions {
        signature: None,
        task_handlers: handlers,
    };

    let client = Client::builder().config(config()).build().unwrap();
    let mut addon = client.addon(descriptor("movies", "2.3.0", &["item"], &[server.uri()]));
    let result = addon
        .call(Action::Item, json!({ "type": "movie", "ids": { "id": "1" } }), &options)
        .await
        .unwrap();

    assert_eq!(result, json!({ "id": "1", "name": "Movie" }));
    assert_eq!(*seen.lock().unwrap(), vec!["x", "y"]);
}

#[tokio::test]
async fn test_failed_task_sends_error_payload_and_continues() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-source.json"))
        .and(body_partial_json(json!({ "type": "movie" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "taskRequest", "id": "t1", "data": { "type": "fetch" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-source.json"))
        .and(body_partial_json(json!({
            "kind": "taskResponse", "id": "t1", "data": { "error": "Unknown task type \"fetch\"" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().config(config()).build().unwrap();
    let mut addon = client.addon(descriptor("src", "2.3.0", &["source"], &[server.uri()]));
    let result = addon
        .call(Action::Source, json!({ "type": "movie", "ids": {} }), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(result, json!([]));
}

#[tokio::test]
async fn test_application_error_wins_over_task_envelope() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "taskRequest", "id": "t", "data": { "type": "x" }, "error": "quota exceeded"
        })))
        .expect(1)
        .mount(&a)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&b)
        .await;

    let called = Arc::new(Mutex::new(false));
    let mut handlers = TaskHandlers::new();
    let flag = Arc::clone(&called);
    handlers.register_fn("x", move |_addon, _data| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap() = true;
            Ok::<_, anyhow::Error>(json!({}))
        }
    });

    let client = Client::builder().config(config()).build().unwrap();
    let mut addon = client.addon(descriptor("app", "2.3.0", &["catalog"], &[a.uri(), b.uri()]));
    let err = addon
        .call(
            Action::Catalog,
            json!({}),
            &CallOptions {
                signature: None,
                task_handlers: handlers,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AddonError::Application(ref m) if m == "quota exceeded"));
    assert!(!*called.lock().unwrap());
    // A syntactically valid answer is not an endpoint failure
    assert_eq!(addon.endpoints(), [a.uri(), b.uri()]);
}

#[tokio::test]
async fn test_schema_error_is_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": "nope" })))
        .mount(&server)
        .await;

    let client = Client::builder().config(config()).build().unwrap();
    let mut addon = client.addon(descriptor("bad", "2.3.0", &["catalog"], &[server.uri()]));
    let err = addon
        .call(Action::Catalog, json!({}), &CallOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AddonError::SchemaValidation(_)));
}

#[tokio::test]
async fn test_legacy_catalog_is_migrated_both_ways() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/mediaurl-directory.json"))
        .and(body_partial_json(json!({ "rootId": "top" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rootId": "top",
            "items": [{ "type": "directory", "id": "d", "rootId": "sub" }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Client::builder().config(config()).build().unwrap();
    let mut addon = client.addon(descriptor("old", "1.0.0", &["catalog"], &[server.uri()]));
    let result = addon
        .call(Action::Catalog, json!({ "catalogId": "top" }), &CallOptions::default())
        .await
        .unwrap();
    assert_eq!(
        result,
        json!({
            "catalogId": "top",
            "items": [{ "type": "directory", "id": "d", "catalogId": "sub" }]
        })
    );
}

#[tokio::test]
async fn test_legacy_routes_use_watched_paths_and_task_route() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/item.watched"))
        .and(header("watched-sig", "s3cret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "taskRequest", "id": "t1", "data": { "type": "x" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/task.watched"))
        .and(body_partial_json(json!({ "kind": "taskResponse", "id": "t1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "i" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut handlers = TaskHandlers::new();
    handlers.register_fn("x", |_addon, _data| async move { Ok::<_, anyhow::Error>(json!({})) });

    let client = Client::builder()
        .config(ClientConfig {
            legacy_routes: true,
            ..config()
        })
        .build()
        .unwrap();
    let mut addon = client.addon(descriptor("old", "0.30.0", &["item"], &[server.uri()]));
    let result = addon
        .call(
            Action::Item,
            json!({ "type": "movie", "ids": {} }),
            &CallOptions {
                signature: Some("s3cret".into()),
                task_handlers: handlers,
            },
        )
        .await
        .unwrap();
    assert_eq!(result, json!({ "id": "i" }));
}
