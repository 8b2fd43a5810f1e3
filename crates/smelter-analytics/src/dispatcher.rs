// Event Dispatcher
//
// Fans a single task hit or error report out to every registered backend at
// once and hands back one handle for all of them. The dispatcher only
// composes: it never waits on a backend, never races them, and imposes no
// timeout of its own.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::ReportingBackend;
use crate::handle::{Completion, DispatchHandle};
use crate::registry::BackendRegistry;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

/// Parallel fan-out over a fixed set of backends
#[derive(Clone)]
pub struct EventDispatcher {
    backends: Arc<[Arc<dyn ReportingBackend>]>,
}

impl EventDispatcher {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            backends: registry.into_backends().into(),
        }
    }

    /// Start a task hit on every backend and return immediately
    ///
    /// Aborting the returned handle aborts every backend's send; its
    /// completion resolves once all of them resolved.
    pub fn dispatch_task_hit(&self, event: &TaskEvent) -> DispatchHandle {
        debug!(
            task = %event.task_name,
            kind = %event.task_kind,
            backends = self.backends.len(),
            "Dispatching task hit"
        );

        let handles = self.backends.iter().filter_map(|backend| {
            match catch_unwind(AssertUnwindSafe(|| backend.send_task_hit(event))) {
                Ok(handle) => Some(handle),
                Err(_) => {
                    warn!(backend = backend.name(), "Backend panicked starting a task hit");
                    None
                }
            }
        });

        DispatchHandle::merge(handles)
    }

    /// Send an error report to every backend
    ///
    /// All sends start right away; the completion resolves once every
    /// backend finished. A backend that never finishes keeps it pending.
    pub fn dispatch_error_report(&self, report: ErrorReport) -> Completion {
        debug!(
            error_type = report.error_type(),
            backends = self.backends.len(),
            "Dispatching error report"
        );

        let report = Arc::new(report);
        let completions: Vec<Completion> = self
            .backends
            .iter()
            .map(|backend| {
                let backend = Arc::clone(backend);
                let report = Arc::clone(&report);
                let (_, completion) = DispatchHandle::spawn(backend.name(), async move {
                    backend.send_error_report(&report).await;
                })
                .into_parts();
                completion
            })
            .collect();

        Completion::join_all(completions)
    }
}
