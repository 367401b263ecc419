//! Wire-level vocabulary shared by the prober, the migration engine and the
//! invocation engine: action names, header names, route suffixes and the
//! task sub-protocol envelopes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Headers & route suffixes ────────────────────────────────────────────────

pub const SIGNATURE_HEADER: &str = "mediaurl-signature";
pub const LEGACY_SIGNATURE_HEADER: &str = "watched-sig";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Discovery path of the current protocol.
pub const DISCOVERY_SUFFIX: &str = "mediaurl.json";
/// Discovery path of the legacy `watched` protocol.
pub const LEGACY_DISCOVERY_SUFFIX: &str = "addon.watched";

/// SDK version assumed for addons that don't declare one.
pub const DEFAULT_SDK_VERSION: &str = "0.33.0";

// ─── Actions ─────────────────────────────────────────────────────────────────

/// An addon action. Known actions are enumerated; anything an addon declares
/// beyond them is carried as [`Action::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Addon,
    Repository,
    Catalog,
    Item,
    Source,
    Subtitle,
    Resolve,
    PushNotification,
    Captcha,
    Selftest,
    /// Legacy name of `catalog` on the wire.
    Directory,
    /// Legacy task route for very old SDKs.
    Task,
    Other(String),
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Addon => "addon",
            Self::Repository => "repository",
            Self::Catalog => "catalog",
            Self::Item => "item",
            Self::Source => "source",
            Self::Subtitle => "subtitle",
            Self::Resolve => "resolve",
            Self::PushNotification => "push-notification",
            Self::Captcha => "captcha",
            Self::Selftest => "selftest",
            Self::Directory => "directory",
            Self::Task => "task",
            Self::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "addon" => Self::Addon,
            "repository" => Self::Repository,
            "catalog" => Self::Catalog,
            "item" => Self::Item,
            "source" => Self::Source,
            "subtitle" => Self::Subtitle,
            "resolve" => Self::Resolve,
            "push-notification" => Self::PushNotification,
            "captcha" => Self::Captcha,
            "selftest" => Self::Selftest,
            "directory" => Self::Directory,
            "task" => Self::Task,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Which half of an action exchange a payload belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Request,
    Response,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => write!(f, "request"),
            Self::Response => write!(f, "response"),
        }
    }
}

// ─── Task sub-protocol ───────────────────────────────────────────────────────

pub const TASK_REQUEST_KIND: &str = "taskRequest";
pub const TASK_RESPONSE_KIND: &str = "taskResponse";

/// Sent by an addon mid-call instead of a final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub kind: String,
    pub id: String,
    /// `{ "type": ..., ... }`
    pub data: Value,
}

impl TaskRequest {
    /// The handler key, `data.type`.
    pub fn task_type(&self) -> Option<&str> {
        self.data.get("type").and_then(Value::as_str)
    }
}

/// Sent back by the client; `id` always echoes the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResponse {
    pub kind: String,
    pub id: String,
    pub data: Value,
}

impl TaskResponse {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            kind: TASK_RESPONSE_KIND.to_string(),
            id: id.into(),
            data,
        }
    }
}

/// True if `payload` is a task request envelope.
pub fn is_task_request(payload: &Value) -> bool {
    payload.get("kind").and_then(Value::as_str) == Some(TASK_REQUEST_KIND)
}

/// The addon's own application error, if the payload carries a truthy
/// top-level `error` field.
pub fn application_error(payload: &Value) -> Option<String> {
    match payload.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
