//! Invocation engine: calls against one addon.
//!
//! `addon` (discovery) calls race all endpoints and promote the winner.
//! Every other action walks the endpoints one at a time so side-effecting
//! calls are never issued twice; a failing *first* endpoint is moved to the
//! back of the list. Responses that are task requests are answered through
//! the registered [`TaskHandlers`] until the addon sends a final payload.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use mediaurl_core::protocol::{
    application_error, is_task_request, JSON_CONTENT_TYPE, LEGACY_SIGNATURE_HEADER,
    SIGNATURE_HEADER,
};
use mediaurl_core::{
    Action, AddonDescriptor, Direction, ModelKind, SchemaError, TaskRequest, TaskResponse,
};

use crate::addon_url::clean_addon_url;
use crate::client::ClientContext;
use crate::error::{truncate_body, AddonError};
use crate::migration::{validate_action, Validated};
use crate::prober::{self, EndpointType};
use crate::task::{error_data, TaskHandlers};
use crate::transport::{HttpRequest, HttpResponse};

/// SDKs up to this version expect task responses on the `task` route.
const TASK_ROUTE_SDK: &str = "1.1.0";

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the configured signature.
    pub signature: Option<String>,
    pub task_handlers: TaskHandlers,
}

/// Owns one addon's descriptor. Only `endpoints` ever changes, and only
/// through [`call`](Self::call).
pub struct AddonClient {
    ctx: Arc<ClientContext>,
    descriptor: AddonDescriptor,
    allowed_actions: Vec<Action>,
}

impl std::fmt::Debug for AddonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonClient")
            .field("id", &self.descriptor.id)
            .field("endpoints", &self.descriptor.endpoints)
            .field("allowed_actions", &self.allowed_actions)
            .finish()
    }
}

impl AddonClient {
    pub(crate) fn new(ctx: Arc<ClientContext>, descriptor: AddonDescriptor) -> Self {
        let mut allowed_actions = vec![Action::Selftest, Action::Addon];
        for action in descriptor.actions.iter().map(|a| Action::parse(a)) {
            if !allowed_actions.contains(&action) {
                allowed_actions.push(action);
            }
        }
        if descriptor.legacy_repository && !allowed_actions.contains(&Action::Repository) {
            allowed_actions.push(Action::Repository);
        }
        Self {
            ctx,
            descriptor,
            allowed_actions,
        }
    }

    pub fn descriptor(&self) -> &AddonDescriptor {
        &self.descriptor
    }

    pub fn into_descriptor(self) -> AddonDescriptor {
        self.descriptor
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Current endpoint order, preferred first.
    pub fn endpoints(&self) -> &[String] {
        &self.descriptor.endpoints
    }

    pub fn allowed_actions(&self) -> &[Action] {
        &self.allowed_actions
    }

    pub fn is_allowed(&self, action: &Action) -> bool {
        self.allowed_actions.contains(action)
    }

    /// Call `action` with `input` and return the migrated, validated result.
    ///
    /// Takes `&mut self` because a call may reorder the endpoints.
    pub async fn call(
        &mut self,
        action: Action,
        input: Value,
        options: &CallOptions,
    ) -> Result<Value, AddonError> {
        if !self.is_allowed(&action) {
            return Err(AddonError::ActionNotAllowed {
                addon_id: self.descriptor.id.clone(),
                action,
            });
        }

        let mut input = match input {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        if let Some(obj) = input.as_object_mut() {
            obj.insert(
                "clientVersion".into(),
                Value::from(self.ctx.config.client_version.clone()),
            );
        }

        let authority = self.descriptor.sdk_version.clone();
        let request = validate_action(
            self.ctx.validator.as_ref(),
            &action,
            Direction::Request,
            &input,
            authority.as_deref(),
        )?;
        let headers = self.headers(options);

        tracing::debug!(addon = %self.descriptor.id, action = %action, wire_action = %request.action, "Calling addon");
        let (mut url, mut data) = if action == Action::Addon {
            self.call_discovery(&request).await?
        } else {
            self.call_endpoints(&request, &headers).await?
        };

        if self.ctx.config.legacy_routes && !self.descriptor.is_sdk_newer_than(TASK_ROUTE_SDK) {
            url = clean_addon_url(
                &url,
                None,
                Some(Action::Task.as_str()),
                authority.as_deref(),
                true,
            )?;
        }

        loop {
            if let Some(message) = application_error(&data) {
                return Err(AddonError::Application(message));
            }
            if !is_task_request(&data) {
                let validated = validate_action(
                    self.ctx.validator.as_ref(),
                    &action,
                    Direction::Response,
                    &data,
                    authority.as_deref(),
                )?;
                return Ok(validated.payload);
            }

            let task = self.ctx.validator.validate_model(ModelKind::TaskRequest, data)?;
            let task: TaskRequest = serde_json::from_value(task)
                .map_err(|e| SchemaError::new("task.request", e.to_string()))?;
            tracing::debug!(addon = %self.descriptor.id, task = %task.id, task_type = ?task.task_type(), "Task request");

            let task_data = match options.task_handlers.run(&self.descriptor, &task).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(addon = %self.descriptor.id, task = %task.id, err = %e, "Failed executing task");
                    self.ctx.observer.on_task_error(&self.descriptor.id, &task.id, &e);
                    error_data(&e)
                }
            };

            let response = TaskResponse::new(task.id, task_data);
            let response = serde_json::to_value(&response)
                .map_err(|e| SchemaError::new("task.response", e.to_string()))?;
            let response = self
                .ctx
                .validator
                .validate_model(ModelKind::TaskResponse, response)?;
            data = self.post_json(&url, &headers, response.to_string()).await?;
        }
    }

    fn headers(&self, options: &CallOptions) -> Vec<(String, String)> {
        let signature_header = if self.ctx.config.legacy_routes {
            LEGACY_SIGNATURE_HEADER
        } else {
            SIGNATURE_HEADER
        };
        let signature = options
            .signature
            .clone()
            .or_else(|| self.ctx.config.signature.clone())
            .unwrap_or_default();
        vec![
            ("user-agent".to_string(), self.ctx.config.user_agent.clone()),
            ("content-type".to_string(), JSON_CONTENT_TYPE.to_string()),
            (signature_header.to_string(), signature),
        ]
    }

    fn route(&self, endpoint: &str, wire_action: &str) -> Result<String, AddonError> {
        Ok(clean_addon_url(
            endpoint,
            None,
            Some(wire_action),
            self.descriptor.sdk_version.as_deref(),
            self.ctx.config.legacy_routes,
        )?)
    }

    /// Race all endpoints and promote the one that answered.
    async fn call_discovery(&mut self, request: &Validated) -> Result<(String, Value), AddonError> {
        let results = prober::race(
            &self.ctx,
            &self.descriptor.endpoints,
            &request.payload,
            EndpointType::Addon,
            false,
        )
        .await;

        let Some(first) = results.and_then(|r| r.into_iter().next()) else {
            return Err(self.no_working_endpoint(None));
        };
        let Some(endpoint) = first.endpoints().first().cloned() else {
            return Err(self.no_working_endpoint(None));
        };
        let Some(addon) = first.into_addon() else {
            return Err(self.no_working_endpoint(None));
        };

        if self.descriptor.endpoints.first() != Some(&endpoint) {
            self.descriptor.endpoints.retain(|e| *e != endpoint);
            self.descriptor.endpoints.insert(0, endpoint.clone());
            tracing::debug!(addon = %self.descriptor.id, endpoint = %endpoint, "Promoted endpoint");
        }

        let url = self.route(&endpoint, &request.action)?;
        let addon = addon
            .to_value()
            .map_err(|e| SchemaError::new("addon", e.to_string()))?;
        Ok((url, addon))
    }

    /// Try endpoints in order until one answers with JSON.
    async fn call_endpoints(
        &mut self,
        request: &Validated,
        headers: &[(String, String)],
    ) -> Result<(String, Value), AddonError> {
        let body = request.payload.to_string();
        let mut tried: HashSet<String> = HashSet::new();
        let mut last_error: Option<AddonError> = None;

        loop {
            let Some(endpoint) = self
                .descriptor
                .endpoints
                .iter()
                .find(|e| !tried.contains(*e))
                .cloned()
            else {
                return Err(self.no_working_endpoint(last_error));
            };
            tried.insert(endpoint.clone());

            let url = self.route(&endpoint, &request.action)?;
            match self.post_json(&url, headers, body.clone()).await {
                Ok(data) => return Ok((url, data)),
                Err(e) => {
                    tracing::warn!(addon = %self.descriptor.id, endpoint = %endpoint, err = %e, "Endpoint failed");
                    self.ctx
                        .observer
                        .on_endpoint_error(&self.descriptor.id, &endpoint, &e);
                    self.demote(&endpoint);
                    last_error = Some(e);
                }
            }
        }
    }

    /// Move `endpoint` to the back, but only if it is currently first.
    fn demote(&mut self, endpoint: &str) {
        let endpoints = &mut self.descriptor.endpoints;
        if endpoints.first().map(String::as_str) == Some(endpoint) {
            let first = endpoints.remove(0);
            endpoints.push(first);
        }
    }

    fn no_working_endpoint(&self, last_error: Option<AddonError>) -> AddonError {
        AddonError::NoWorkingEndpoint {
            addon_id: self.descriptor.id.clone(),
            last_error: last_error.map(Box::new),
        }
    }

    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
    ) -> Result<Value, AddonError> {
        let request = HttpRequest::post(url, body).with_headers(headers);
        let res = self.send(request).await?;
        serde_json::from_str(&res.body).map_err(|_| AddonError::MalformedResponse {
            status: res.status,
            body: truncate_body(&res.body),
        })
    }

    /// Fetch, following redirects with the same request until a URL repeats.
    async fn send(&self, mut request: HttpRequest) -> Result<HttpResponse, AddonError> {
        let mut seen = HashSet::new();
        loop {
            seen.insert(request.url.clone());
            let res = self.ctx.transport.fetch(request.clone()).await?;
            let next = res
                .is_redirect()
                .then(|| res.header("location"))
                .flatten()
                .and_then(|location| Url::parse(&res.url).ok()?.join(location).ok())
                .map(String::from);
            match next {
                Some(next) if !seen.contains(&next) => request.url = next,
                _ => return Ok(res),
            }
        }
    }
}
