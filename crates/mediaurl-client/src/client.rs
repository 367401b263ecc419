//! Client facade: shared capabilities, discovery, per-addon engines.

use std::fmt;
use std::sync::Arc;

use serde_json::json;

use mediaurl_core::config::ClientConfig;
use mediaurl_core::{AddonDescriptor, StructuralValidator, Validator};

use crate::addon::AddonClient;
use crate::candidates::candidate_urls;
use crate::observer::{NoopObserver, Observer};
use crate::prober::{self, EndpointType};
use crate::responses::ProbeResult;
use crate::transport::{ReqwestTransport, Transport, TransportError};

/// Capabilities shared by every probe and call of one [`Client`].
pub(crate) struct ClientContext {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) observer: Arc<dyn Observer>,
    pub(crate) config: Arc<ClientConfig>,
}

/// Entry point: discovery and addon engines sharing one transport,
/// validator, observer and configuration. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    ctx: Arc<ClientContext>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.ctx.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// reqwest transport, structural validator, no observer.
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.ctx.config
    }

    /// Probe every candidate URL derived from free-form `user_input`.
    ///
    /// Server responses are allowed; each listed addon URL comes back as a
    /// [`ProbeResult::Server`] for the caller to probe again.
    pub async fn discover(&self, user_input: &str) -> Option<Vec<ProbeResult>> {
        let candidates = candidate_urls(user_input);
        tracing::debug!(input = %user_input, candidates = candidates.len(), "Discovering");
        self.probe(&candidates, true, EndpointType::Unknown).await
    }

    /// Race discovery probes against `endpoints`.
    pub async fn probe(
        &self,
        endpoints: &[String],
        allow_server_responses: bool,
        endpoint_type: EndpointType,
    ) -> Option<Vec<ProbeResult>> {
        let body = json!({ "clientVersion": self.ctx.config.client_version });
        prober::race(&self.ctx, endpoints, &body, endpoint_type, allow_server_responses).await
    }

    /// Invocation engine for `descriptor`.
    pub fn addon(&self, descriptor: AddonDescriptor) -> AddonClient {
        AddonClient::new(Arc::clone(&self.ctx), descriptor)
    }
}

/// Builder for [`Client`] with injectable capabilities.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    validator: Option<Arc<dyn Validator>>,
    observer: Option<Arc<dyn Observer>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Must not follow redirects on its own.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<Client, TransportError> {
        let transport = match self.transport {
            Some(t) => t,
            None => Arc::new(ReqwestTransport::new()?),
        };
        Ok(Client {
            ctx: Arc::new(ClientContext {
                transport,
                validator: self
                    .validator
                    .unwrap_or_else(|| Arc::new(StructuralValidator)),
                observer: self.observer.unwrap_or_else(|| Arc::new(NoopObserver)),
                config: Arc::new(self.config.unwrap_or_default()),
            }),
        })
    }
}
