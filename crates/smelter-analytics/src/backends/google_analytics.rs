// Google Analytics backend
//
// Task hits are sent as Measurement Protocol (v1) pageviews on
// `/task/{kind}`. Only the task kind leaves the machine, never the name of a
// user-defined task. Google Analytics has no error channel.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::{deliver, http_client};
use crate::backend::ReportingBackend;
use crate::config::GoogleAnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::handle::DispatchHandle;
use crate::identity::Identity;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

const NAME: &str = "google-analytics";

pub struct GoogleAnalyticsBackend {
    client: Client,
    endpoint: Url,
    /// Parameters shared by every hit
    base_params: Vec<(&'static str, String)>,
}

impl GoogleAnalyticsBackend {
    pub fn new(
        config: GoogleAnalyticsConfig,
        identity: &Identity,
        timeout: Duration,
    ) -> Result<Self> {
        if config.tracking_id.trim().is_empty() {
            return Err(AnalyticsError::config("Google Analytics tracking id is empty"));
        }

        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            AnalyticsError::config(format!("invalid Google Analytics endpoint: {}", e))
        })?;

        let base_params = vec![
            ("v", "1".to_string()),
            ("tid", config.tracking_id),
            ("cid", identity.client_id.clone()),
            ("ua", identity.user_agent.clone()),
            // Custom dimensions
            ("cd1", identity.project_id.clone()),
            ("cd2", identity.user_type.as_str().to_string()),
            ("cd3", identity.tool_version.clone()),
        ];

        Ok(Self {
            client: http_client(identity, timeout)?,
            endpoint,
            base_params,
        })
    }

    /// Form-encoded pageview hit for a task
    fn task_hit_body(&self, event: &TaskEvent) -> String {
        let kind = event.task_kind.as_str();
        let page = format!("/task/{}", kind);
        let title = format!("{} task", kind);

        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.base_params.iter().map(|(k, v)| (*k, v.as_str())))
            .append_pair("t", "pageview")
            .append_pair("dp", &page)
            .append_pair("dt", &title)
            .finish()
    }
}

#[async_trait]
impl ReportingBackend for GoogleAnalyticsBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send_task_hit(&self, event: &TaskEvent) -> DispatchHandle {
        debug!(backend = NAME, kind = %event.task_kind, "Sending task hit");

        let request = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.task_hit_body(event));

        DispatchHandle::spawn(NAME, deliver(NAME, "task hit", request))
    }

    async fn send_error_report(&self, _report: &ErrorReport) {
        debug!(backend = NAME, "Error reports are not sent to Google Analytics");
    }
}
