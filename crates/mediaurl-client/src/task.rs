//! Task sub-protocol: local callbacks an addon can request mid-call.
//!
//! An addon answers a call with `{ kind: "taskRequest", id, data: { type } }`
//! instead of a result; the client runs the handler registered for `type`
//! and posts `{ kind: "taskResponse", id, data }` back to the same URL.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use mediaurl_core::{AddonDescriptor, TaskRequest};

use crate::error::AddonError;

#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Handle `data` (the task request's `data`, including `type`). The
    /// returned value becomes the task response's `data`.
    async fn handle(&self, addon: &AddonDescriptor, data: &Value) -> Result<Value>;
}

/// Adapter for async closures taking owned arguments.
struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(AddonDescriptor, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn handle(&self, addon: &AddonDescriptor, data: &Value) -> Result<Value> {
        (self.0)(addon.clone(), data.clone()).await
    }
}

/// Handlers keyed by task `type`.
#[derive(Clone, Default)]
pub struct TaskHandlers {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl fmt::Debug for TaskHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.handlers.keys().collect();
        types.sort();
        f.debug_struct("TaskHandlers").field("types", &types).finish()
    }
}

impl TaskHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, task_type: impl Into<String>, handler: impl TaskHandler + 'static) {
        self.handlers.insert(task_type.into(), Arc::new(handler));
    }

    /// Register an async closure.
    pub fn register_fn<F, Fut>(&mut self, task_type: impl Into<String>, f: F)
    where
        F: Fn(AddonDescriptor, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        self.register(task_type, FnHandler(f));
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(task_type).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `task`. Failures come back as `Err` so the caller
    /// can report them; [`error_data`] turns them into a response payload.
    pub(crate) async fn run(
        &self,
        addon: &AddonDescriptor,
        task: &TaskRequest,
    ) -> Result<Value, AddonError> {
        let task_type = task.task_type().unwrap_or_default();
        let handler = self
            .get(task_type)
            .ok_or_else(|| AddonError::UnknownTaskType(task_type.to_string()))?;
        handler
            .handle(addon, &task.data)
            .await
            .map_err(|e| AddonError::TaskHandler(format!("{:#}", e)))
    }
}

/// Task response `data` for a failed task.
pub(crate) fn error_data(error: &AddonError) -> Value {
    let message = match error {
        AddonError::TaskHandler(msg) => msg.clone(),
        other => other.to_string(),
    };
    json!({ "error": message })
}
