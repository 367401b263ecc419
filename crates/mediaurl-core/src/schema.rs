//! Structural validation capability.
//!
//! The full MediaURL JSON schema is owned elsewhere; the engine only needs a
//! `validate(action, direction, payload)` seam. [`StructuralValidator`] is the
//! built-in implementation: it checks the shapes the engine itself relies on
//! and rejects residual legacy markers that migration should have removed.

use serde_json::Value;
use thiserror::Error;

use crate::protocol::{Action, Direction, TASK_REQUEST_KIND, TASK_RESPONSE_KIND};

/// A payload that does not match the current schema.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{subject}: {message}")]
pub struct SchemaError {
    /// `action.direction` or model name.
    pub subject: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            message: message.into(),
        }
    }

    fn action(action: &Action, direction: Direction, message: impl Into<String>) -> Self {
        Self::new(format!("{}.{}", action, direction), message)
    }
}

/// Standalone models validated outside the action table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Addon,
    TaskRequest,
    TaskResponse,
}

impl ModelKind {
    fn name(self) -> &'static str {
        match self {
            Self::Addon => "addon",
            Self::TaskRequest => "task.request",
            Self::TaskResponse => "task.response",
        }
    }
}

/// Schema validation seam. Implementations may coerce (fill defaults) and
/// return the accepted payload.
pub trait Validator: Send + Sync {
    fn validate(
        &self,
        action: &Action,
        direction: Direction,
        payload: Value,
    ) -> Result<Value, SchemaError>;

    fn validate_model(&self, kind: ModelKind, payload: Value) -> Result<Value, SchemaError>;
}

/// Built-in validator covering the shapes the engine depends on.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

/// Keys that only exist in pre-2.0 addon descriptors.
const LEGACY_ADDON_KEYS: &[&str] = &["flags", "metadata", "rootDirectories", "dashboards"];

impl Validator for StructuralValidator {
    fn validate(
        &self,
        action: &Action,
        direction: Direction,
        payload: Value,
    ) -> Result<Value, SchemaError> {
        let fail = |msg: &str| SchemaError::action(action, direction, msg);
        match (action, direction) {
            (Action::Other(_), _) => Err(fail("no validator for this action")),
            (_, Direction::Request) => {
                if payload.is_object() {
                    Ok(payload)
                } else {
                    Err(fail("request must be an object"))
                }
            }
            (Action::Addon, Direction::Response) => {
                if payload.get("type").and_then(Value::as_str) == Some("server") {
                    check_server(&payload).map_err(|m| fail(&m))?;
                } else {
                    check_addon(&payload).map_err(|m| fail(&m))?;
                }
                Ok(payload)
            }
            (Action::Repository, Direction::Response) => {
                let addons = payload
                    .as_array()
                    .ok_or_else(|| fail("expected an array of addons"))?;
                for addon in addons {
                    check_addon(addon).map_err(|m| fail(&m))?;
                }
                Ok(payload)
            }
            (Action::Catalog | Action::Directory, Direction::Response) => {
                let obj = payload
                    .as_object()
                    .ok_or_else(|| fail("expected an object"))?;
                let items = obj
                    .get("items")
                    .and_then(Value::as_array)
                    .ok_or_else(|| fail("missing items array"))?;
                if items.iter().any(|i| !i.is_object()) {
                    return Err(fail("items must be objects"));
                }
                if obj.contains_key("rootId") {
                    return Err(fail("legacy field rootId"));
                }
                Ok(payload)
            }
            (Action::Item, Direction::Response) => {
                if payload.is_null() || payload.is_object() {
                    Ok(payload)
                } else {
                    Err(fail("expected an object or null"))
                }
            }
            (_, Direction::Response) => Ok(payload),
        }
    }

    fn validate_model(&self, kind: ModelKind, payload: Value) -> Result<Value, SchemaError> {
        let fail = |msg: &str| SchemaError::new(kind.name(), msg);
        match kind {
            ModelKind::Addon => check_addon(&payload).map_err(|m| fail(&m))?,
            ModelKind::TaskRequest => {
                check_envelope(&payload, TASK_REQUEST_KIND).map_err(|m| fail(&m))?;
                if payload["data"].get("type").and_then(Value::as_str).is_none() {
                    return Err(fail("data.type must be a string"));
                }
            }
            ModelKind::TaskResponse => {
                check_envelope(&payload, TASK_RESPONSE_KIND).map_err(|m| fail(&m))?
            }
        }
        Ok(payload)
    }
}

fn check_addon(payload: &Value) -> Result<(), String> {
    let obj = payload.as_object().ok_or("addon must be an object")?;
    if !obj.get("id").is_some_and(Value::is_string) {
        return Err("id must be a string".into());
    }
    if !obj.get("name").is_some_and(|n| n.is_string() || n.is_object()) {
        return Err("name must be a string or a localized object".into());
    }
    for key in ["endpoints", "actions", "requirements", "triggers"] {
        if let Some(v) = obj.get(key) {
            if !is_string_array(v) {
                return Err(format!("{} must be an array of strings", key));
            }
        }
    }
    if obj.get("sdkVersion").is_some_and(|v| !v.is_string()) {
        return Err("sdkVersion must be a string".into());
    }
    for key in ["catalogs", "pages"] {
        if obj.get(key).is_some_and(|v| !v.is_array()) {
            return Err(format!("{} must be an array", key));
        }
    }
    if let Some(key) = LEGACY_ADDON_KEYS.iter().find(|k| obj.contains_key(**k)) {
        return Err(format!("legacy field {}", key));
    }
    Ok(())
}

fn check_server(payload: &Value) -> Result<(), String> {
    match payload.get("addons") {
        Some(v) if is_string_array(v) => Ok(()),
        _ => Err("server addons must be an array of strings".into()),
    }
}

fn check_envelope(payload: &Value, kind: &str) -> Result<(), String> {
    if payload.get("kind").and_then(Value::as_str) != Some(kind) {
        return Err(format!("kind must be {}", kind));
    }
    if !payload.get("id").is_some_and(Value::is_string) {
        return Err("id must be a string".into());
    }
    if payload.get("data").is_none() {
        return Err("missing data".into());
    }
    Ok(())
}

fn is_string_array(v: &Value) -> bool {
    v.as_array()
        .is_some_and(|a| a.iter().all(Value::is_string))
}
