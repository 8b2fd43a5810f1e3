// Reporting Backend Trait
//
// Defines the interface every reporting service adapter implements
// (Google Analytics, Sentry, Rollbar, Bugsnag, ...). Each backend receives
// task hits and error reports and translates them to its service's format.

use async_trait::async_trait;

use crate::handle::DispatchHandle;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

/// Trait for reporting backends
///
/// Implementations must never block and never surface a failure: network
/// and service errors are logged and dropped inside the backend.
#[async_trait]
pub trait ReportingBackend: Send + Sync {
    /// Get the name of this backend (for logging)
    fn name(&self) -> &'static str;

    /// Start sending a task hit and return immediately
    ///
    /// The completion resolves once the send finished, failed or was
    /// aborted. Aborting after completion is a no-op.
    fn send_task_hit(&self, event: &TaskEvent) -> DispatchHandle;

    /// Send an error report; always resolves
    async fn send_error_report(&self, report: &ErrorReport);
}

/// A backend that reports nothing
pub struct NoopBackend;

#[async_trait]
impl ReportingBackend for NoopBackend {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn send_task_hit(&self, _event: &TaskEvent) -> DispatchHandle {
        DispatchHandle::noop()
    }

    async fn send_error_report(&self, _report: &ErrorReport) {}
}
