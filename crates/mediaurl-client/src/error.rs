//! Error taxonomy.
//!
//! [`ProbeError`] describes why a single discovery probe failed; it never
//! escapes the racer. [`AddonError`] is what a caller of
//! [`AddonClient::call`](crate::AddonClient::call) sees.

use mediaurl_core::{Action, SchemaError};
use thiserror::Error;

use crate::transport::TransportError;

/// Per-probe failure during endpoint discovery.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Timeout")]
    Timeout,

    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{0}")]
    HttpStatus(u16),

    #[error("Unknown request error")]
    UnknownRequestError,

    #[error("{status} - {body}")]
    MalformedResponse { status: u16, body: String },

    #[error("MediaURL server responses are forbidden")]
    ServerResponseForbidden,

    #[error("Not a MediaURL response")]
    UnrecognizedResponse,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Terminal failure of an addon call.
#[derive(Debug, Error)]
pub enum AddonError {
    #[error("Addon {addon_id} does not have the action \"{action}\"")]
    ActionNotAllowed { addon_id: String, action: Action },

    #[error("No working endpoint found{}", suffix(.last_error))]
    NoWorkingEndpoint {
        addon_id: String,
        /// Failure of the last endpoint that was tried, if any was.
        last_error: Option<Box<AddonError>>,
    },

    #[error(transparent)]
    SchemaValidation(#[from] SchemaError),

    /// The addon answered with its own top-level `error` field.
    #[error("{0}")]
    Application(String),

    #[error("Unknown task type \"{0}\"")]
    UnknownTaskType(String),

    #[error("Task handler failed: {0}")]
    TaskHandler(String),

    #[error("{0}")]
    Transport(#[from] TransportError),

    #[error("{status} - {body}")]
    MalformedResponse { status: u16, body: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn suffix(last_error: &Option<Box<AddonError>>) -> String {
    match last_error {
        Some(e) => format!(": {}", e),
        None => String::new(),
    }
}

/// First 200 characters of a response body, for diagnostics.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}
