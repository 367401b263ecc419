//! MediaURL addon client.
//!
//! - `candidates`: candidate URLs for free-form input
//! - `prober`: staggered endpoint racing with cancellation
//! - `responses`: server/addon response classification
//! - `migration`: legacy SDK wire shapes → current shapes
//! - `addon`: per-addon invocation engine and task loop
//! - `client`: shared capabilities and discovery entry point

pub mod addon;
pub mod addon_url;
pub mod candidates;
pub mod client;
pub mod error;
pub mod migration;
pub mod observer;
pub mod prober;
pub mod requirements;
pub mod responses;
pub mod task;
pub mod transport;

pub use addon::{AddonClient, CallOptions};
pub use addon_url::{clean_addon_url, strip_addon_url};
pub use candidates::candidate_urls;
pub use client::{Client, ClientBuilder};
pub use error::{AddonError, ProbeError};
pub use observer::{NoopObserver, Observer};
pub use prober::EndpointType;
pub use requirements::{ConvertedRequirement, Requirements};
pub use responses::{handle_response, ProbeResult, ResponseData};
pub use task::{TaskHandler, TaskHandlers};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};

pub use mediaurl_core::config::ClientConfig;
pub use mediaurl_core::{Action, AddonDescriptor};
