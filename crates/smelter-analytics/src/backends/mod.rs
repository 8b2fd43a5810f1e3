// Reporting service adapters
//
// One module per service. All of them talk plain HTTP through reqwest, one
// request per event, no batching or retries. Failures end in a debug log.

mod bugsnag;
mod google_analytics;
mod rollbar;
mod sentry;

pub use bugsnag::BugsnagBackend;
pub use google_analytics::GoogleAnalyticsBackend;
pub use rollbar::RollbarBackend;
pub use sentry::{SentryBackend, SentryDsn};

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use crate::error::{AnalyticsError, Result};
use crate::identity::Identity;

/// Name and version reported as the notifier/SDK by every adapter
pub(crate) const NOTIFIER_NAME: &str = "smelter-analytics";
pub(crate) const NOTIFIER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// HTTP client shared by all requests of one backend
pub(crate) fn http_client(identity: &Identity, timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(identity.user_agent.clone())
        .build()
        .map_err(|e| AnalyticsError::config(e.to_string()))
}

/// Send a prepared request, turning non-success statuses into errors
pub(crate) async fn send(request: RequestBuilder) -> Result<()> {
    let response = request.send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(AnalyticsError::Export {
            status: status.as_u16(),
            body,
        });
    }

    Ok(())
}

/// Send a prepared request and swallow the outcome
pub(crate) async fn deliver(backend: &'static str, what: &'static str, request: RequestBuilder) {
    match send(request).await {
        Ok(()) => debug!(backend = backend, what = what, "Report sent"),
        Err(e) => debug!(backend = backend, what = what, error = %e, "Failed to send report"),
    }
}
