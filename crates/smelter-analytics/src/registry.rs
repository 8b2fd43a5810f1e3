// Backend Registry
//
// The fixed set of reporting backends for this process. Built once at
// startup; a backend that fails to construct is left out and the rest keep
// working. Construction never touches the network.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::ReportingBackend;
use crate::backends::{BugsnagBackend, GoogleAnalyticsBackend, RollbarBackend, SentryBackend};
use crate::config::AnalyticsConfig;
use crate::error::Result;
use crate::identity::Identity;

/// Ordered list of configured backends
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn ReportingBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::new()
    }

    /// Register every service present in the configuration
    ///
    /// Order: Google Analytics, Sentry, Rollbar, Bugsnag.
    pub fn from_config(config: &AnalyticsConfig, identity: &Identity) -> Self {
        let timeout = config.request_timeout;
        let mut builder = Self::builder();

        if let Some(ga) = &config.google_analytics {
            builder = builder.try_backend("google-analytics", || {
                GoogleAnalyticsBackend::new(ga.clone(), identity, timeout)
            });
        }
        if let Some(sentry) = &config.sentry {
            builder = builder.try_backend("sentry", || {
                SentryBackend::new(sentry.clone(), identity, timeout)
            });
        }
        if let Some(rollbar) = &config.rollbar {
            builder = builder.try_backend("rollbar", || {
                RollbarBackend::new(rollbar.clone(), identity, timeout)
            });
        }
        if let Some(bugsnag) = &config.bugsnag {
            builder = builder.try_backend("bugsnag", || {
                BugsnagBackend::new(bugsnag.clone(), identity, timeout)
            });
        }

        let registry = builder.build();
        debug!(backends = ?registry.names(), "Reporting backends configured");
        registry
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Names of the registered backends, in registration order
    pub fn names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|backend| backend.name()).collect()
    }

    pub(crate) fn into_backends(self) -> Vec<Arc<dyn ReportingBackend>> {
        self.backends
    }
}

/// Builder for BackendRegistry
pub struct BackendRegistryBuilder {
    registry: BackendRegistry,
}

impl BackendRegistryBuilder {
    pub fn new() -> Self {
        Self {
            registry: BackendRegistry::new(),
        }
    }

    /// Add a backend
    pub fn backend(mut self, backend: impl ReportingBackend + 'static) -> Self {
        self.registry.backends.push(Arc::new(backend));
        self
    }

    /// Add an Arc-wrapped backend
    pub fn backend_arc(mut self, backend: Arc<dyn ReportingBackend>) -> Self {
        self.registry.backends.push(backend);
        self
    }

    /// Add a backend whose construction may fail
    ///
    /// On failure (error or panic) the backend is skipped and logged.
    pub fn try_backend<B, F>(self, name: &str, build: F) -> Self
    where
        B: ReportingBackend + 'static,
        F: FnOnce() -> Result<B>,
    {
        match catch_unwind(AssertUnwindSafe(build)) {
            Ok(Ok(backend)) => self.backend(backend),
            Ok(Err(e)) => {
                warn!(backend = name, error = %e, "Failed to configure reporting backend, skipping");
                self
            }
            Err(_) => {
                warn!(backend = name, "Reporting backend panicked during construction, skipping");
                self
            }
        }
    }

    /// Build the registry
    pub fn build(self) -> BackendRegistry {
        self.registry
    }
}

impl Default for BackendRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
