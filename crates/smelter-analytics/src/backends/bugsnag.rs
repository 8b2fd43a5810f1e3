// Bugsnag backend
//
// Error reports only, as version 5 notify payloads. Bugsnag has no use for
// task hits so those resolve immediately without a request.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use super::{deliver, http_client, NOTIFIER_NAME, NOTIFIER_VERSION};
use crate::backend::ReportingBackend;
use crate::config::BugsnagConfig;
use crate::error::{AnalyticsError, Result};
use crate::handle::DispatchHandle;
use crate::identity::Identity;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

const NAME: &str = "bugsnag";
const PAYLOAD_VERSION: &str = "5";
const NOTIFIER_URL: &str = "https://crates.io/crates/smelter-analytics";

pub struct BugsnagBackend {
    client: Client,
    endpoint: Url,
    api_key: String,
    app_version: String,
    user_id: String,
    device: Value,
    /// metaData tabs shared by every event
    base_metadata: Value,
}

impl BugsnagBackend {
    pub fn new(config: BugsnagConfig, identity: &Identity, timeout: Duration) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AnalyticsError::config("Bugsnag API key is empty"));
        }

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AnalyticsError::config(format!("invalid Bugsnag endpoint: {}", e)))?;

        let env = &identity.environment;
        Ok(Self {
            client: http_client(identity, timeout)?,
            endpoint,
            api_key: config.api_key,
            app_version: identity.tool_version.clone(),
            user_id: identity.client_id.clone(),
            device: json!({
                "osName": env.os.as_str(),
                "cpuAbi": [env.arch],
            }),
            base_metadata: json!({
                "user": { "type": identity.user_type.as_str() },
                "device": {
                    "userAgent": identity.user_agent,
                    "isCi": env.is_ci,
                },
                "project": { "id": identity.project_id },
            }),
        })
    }

    fn notify_payload(&self, report: &ErrorReport) -> Value {
        let mut metadata = self.base_metadata.clone();
        if let (Value::Object(tabs), Some(context)) = (&mut metadata, report.context()) {
            tabs.insert("context".into(), json!(context));
        }

        let exceptions: Vec<Value> = report
            .chain()
            .into_iter()
            .enumerate()
            .map(|(depth, message)| {
                let class = if depth == 0 { report.error_type() } else { "Cause" };
                json!({ "errorClass": class, "message": message, "stacktrace": [] })
            })
            .collect();

        json!({
            "apiKey": self.api_key,
            "payloadVersion": PAYLOAD_VERSION,
            "notifier": {
                "name": NOTIFIER_NAME,
                "version": NOTIFIER_VERSION,
                "url": NOTIFIER_URL,
            },
            "events": [{
                "exceptions": exceptions,
                "severity": "error",
                "unhandled": true,
                "severityReason": { "type": "unhandledException" },
                "app": { "version": self.app_version, "releaseStage": "production" },
                "device": self.device,
                "user": { "id": self.user_id },
                "metaData": metadata,
            }],
        })
    }
}

#[async_trait]
impl ReportingBackend for BugsnagBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send_task_hit(&self, _event: &TaskEvent) -> DispatchHandle {
        DispatchHandle::noop()
    }

    async fn send_error_report(&self, report: &ErrorReport) {
        debug!(backend = NAME, error_type = report.error_type(), "Sending error report");

        let request = self
            .client
            .post(self.endpoint.clone())
            .header("Bugsnag-Api-Key", &self.api_key)
            .header("Bugsnag-Payload-Version", PAYLOAD_VERSION)
            .header("Bugsnag-Sent-At", Utc::now().to_rfc3339())
            .json(&self.notify_payload(report));

        deliver(NAME, "error report", request).await;
    }
}
