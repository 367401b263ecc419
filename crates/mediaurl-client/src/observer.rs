//! Diagnostics callbacks.
//!
//! Probe and endpoint failures are swallowed by the racer and the fallback
//! loop; callers that want to see them implement [`Observer`].

use crate::error::{AddonError, ProbeError};

pub trait Observer: Send + Sync {
    /// A discovery probe against `url` failed.
    fn on_probe_error(&self, _url: &str, _error: &ProbeError) {}
    /// An endpoint failed during a call and the engine moved on.
    fn on_endpoint_error(&self, _addon_id: &str, _endpoint: &str, _error: &AddonError) {}
    /// A task handler failed or was missing; an error task response was sent.
    fn on_task_error(&self, _addon_id: &str, _task_id: &str, _error: &AddonError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}
