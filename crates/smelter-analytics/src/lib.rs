// Usage and crash reporting for Smelter
//
// This crate reports which tasks run and which errors escape, to every
// configured reporting service at once.
// Key design decisions:
// - One ReportingBackend per service, registered once at startup
// - EventDispatcher fans each event out in parallel and returns a single
//   handle with a join-all completion and a composite abort
// - Nothing here can fail the build: sends are best-effort and every public
//   operation resolves
// - Reporting is opt-in and decided once, at construction

pub mod analytics;
pub mod backend;
pub mod backends;
pub mod config;
pub mod dispatcher;
pub mod environment;
pub mod error;
pub mod handle;
pub mod identity;
pub mod memory;
pub mod registry;
pub mod report;
pub mod task;
pub mod taxonomy;

// Re-exports
pub use analytics::Analytics;
pub use backend::{NoopBackend, ReportingBackend};
pub use backends::{BugsnagBackend, GoogleAnalyticsBackend, RollbarBackend, SentryBackend};
pub use config::AnalyticsConfig;
pub use dispatcher::EventDispatcher;
pub use environment::{Environment, ExecutionMode, OsKind};
pub use error::{AnalyticsError, Result};
pub use handle::{AbortHandle, Completion, DispatchHandle};
pub use identity::{ClientIdStore, Identity, UserType};
pub use registry::{BackendRegistry, BackendRegistryBuilder};
pub use report::{ErrorContext, ErrorKind, ErrorReport};
pub use task::{TaskEvent, TaskKind};
pub use taxonomy::{ErrorCategory, ErrorDescriptor, PluginError, SmelterError};
