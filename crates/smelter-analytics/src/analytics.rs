// Analytics facade
//
// The one entry point Smelter calls around each task and on unhandled
// errors. Whether anything is reported is decided once, at construction,
// and never changes for the life of the process.

use std::path::Path;

use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::dispatcher::EventDispatcher;
use crate::environment::Environment;
use crate::handle::{Completion, DispatchHandle};
use crate::identity::{ClientIdStore, Identity};
use crate::registry::BackendRegistry;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

/// Usage and crash reporting for one Smelter process
pub struct Analytics {
    dispatcher: EventDispatcher,
    enabled: bool,
    identity: Option<Identity>,
}

impl Analytics {
    /// Resolve identity, configure every backend and build the facade
    ///
    /// When reporting is off (user opt-out, or Smelter running from a local
    /// checkout or its own tests) the identity file is not touched.
    pub async fn init(root_path: &Path, config: AnalyticsConfig) -> Self {
        if !config.is_enabled() {
            debug!(
                opted_in = config.enabled,
                mode = ?config.execution_mode,
                "Analytics disabled"
            );
            return Self::disabled();
        }

        let environment = Environment::detect(config.tool_version.clone());
        let store = ClientIdStore::new(&config.identity_path);
        let identity = Identity::resolve(root_path, &store, environment).await;

        Self::with_identity(identity, &config)
    }

    /// Build the facade from an already-resolved identity
    pub fn with_identity(identity: Identity, config: &AnalyticsConfig) -> Self {
        let registry = BackendRegistry::from_config(config, &identity);
        Self {
            dispatcher: EventDispatcher::new(registry),
            enabled: config.is_enabled(),
            identity: Some(identity),
        }
    }

    /// Build the facade around an existing dispatcher
    pub fn new(dispatcher: EventDispatcher, enabled: bool) -> Self {
        Self {
            dispatcher,
            enabled,
            identity: None,
        }
    }

    /// A facade that never reports anything
    pub fn disabled() -> Self {
        Self::new(EventDispatcher::new(BackendRegistry::new()), false)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Report that a task is about to run
    ///
    /// Returns immediately. Callers that must not be slowed down should give
    /// the handle a deadline (`settle_within`) or abort it outright.
    pub fn report_task_event(&self, task_name: &str) -> DispatchHandle {
        let event = TaskEvent::new(task_name);

        if !self.enabled {
            return DispatchHandle::noop();
        }

        self.dispatcher.dispatch_task_hit(&event)
    }

    /// Report an unhandled error
    ///
    /// The completion resolves once every backend is done. There is no
    /// internal timeout; wrap it in one before awaiting at exit.
    pub fn report_error(&self, error: anyhow::Error) -> Completion {
        if !self.enabled {
            return Completion::ready();
        }

        self.dispatcher
            .dispatch_error_report(ErrorReport::contextualized(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingBackend;
    use futures::FutureExt;
    use std::sync::Arc;

    fn facade(backend: &Arc<RecordingBackend>, enabled: bool) -> Analytics {
        let registry = BackendRegistry::builder()
            .backend_arc(backend.clone())
            .build();
        Analytics::new(EventDispatcher::new(registry), enabled)
    }

    #[tokio::test]
    async fn test_task_kind_is_classified() {
        let backend = Arc::new(RecordingBackend::new("memory"));
        let analytics = facade(&backend, true);

        analytics.report_task_event("compile").wait().await;
        analytics.report_task_event("my-custom-task").wait().await;

        let hits = backend.task_hits();
        assert_eq!(hits[0].task_kind, crate::task::TaskKind::Builtin);
        assert_eq!(hits[1].task_kind, crate::task::TaskKind::Custom);
    }

    #[tokio::test]
    async fn test_disabled_facade_touches_no_backend() {
        let backend = Arc::new(RecordingBackend::new("memory"));
        let analytics = facade(&backend, false);

        let (_, completion) = analytics.report_task_event("compile").into_parts();
        assert!(completion.now_or_never().is_some());
        assert!(analytics
            .report_error(anyhow::anyhow!("boom"))
            .now_or_never()
            .is_some());

        assert!(backend.task_hits().is_empty());
        assert!(backend.error_reports().is_empty());
    }

    #[tokio::test]
    async fn test_init_disabled_skips_identity_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AnalyticsConfig::disabled();
        config.identity_path = dir.path().join("config.json");

        let analytics = Analytics::init(Path::new("/work/project"), config).await;

        assert!(!analytics.is_enabled());
        assert!(analytics.identity().is_none());
        assert!(!dir.path().join("config.json").exists());
    }
}
