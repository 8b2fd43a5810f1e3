// Rollbar backend
//
// Items are posted to the Rollbar item API. Every item carries the person,
// project, device and code version; task hits add the task and error reports
// add the taxonomy context as custom data.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{deliver, http_client, NOTIFIER_NAME, NOTIFIER_VERSION};
use crate::backend::ReportingBackend;
use crate::config::RollbarConfig;
use crate::error::{AnalyticsError, Result};
use crate::handle::DispatchHandle;
use crate::identity::Identity;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

const NAME: &str = "rollbar";

pub struct RollbarBackend {
    client: Client,
    endpoint: Url,
    access_token: String,
    environment: String,
    code_version: String,
    platform: &'static str,
    person: Value,
    project: Value,
    device: Value,
}

impl RollbarBackend {
    pub fn new(config: RollbarConfig, identity: &Identity, timeout: Duration) -> Result<Self> {
        if config.access_token.trim().is_empty() {
            return Err(AnalyticsError::config("Rollbar access token is empty"));
        }

        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| AnalyticsError::config(format!("invalid Rollbar endpoint: {}", e)))?;

        let env = &identity.environment;
        Ok(Self {
            client: http_client(identity, timeout)?,
            endpoint,
            access_token: config.access_token,
            environment: config.environment,
            code_version: identity.tool_version.clone(),
            platform: env.os.as_str(),
            person: json!({
                "id": identity.client_id,
                "type": identity.user_type.as_str(),
            }),
            project: json!({ "id": identity.project_id }),
            device: json!({
                "os": env.os.as_str(),
                "arch": env.arch,
                "userAgent": identity.user_agent,
                "isCi": env.is_ci,
            }),
        })
    }

    fn item(&self, level: &str, body: Value, custom: Value) -> Value {
        let mut custom = custom;
        if let Value::Object(map) = &mut custom {
            map.insert("project".into(), self.project.clone());
            map.insert("device".into(), self.device.clone());
        }

        json!({
            "data": {
                "environment": self.environment,
                "level": level,
                "timestamp": Utc::now().timestamp(),
                "uuid": Uuid::new_v4().to_string(),
                "platform": self.platform,
                "language": "rust",
                "framework": "smelter",
                "code_version": self.code_version,
                "body": body,
                "person": self.person,
                "custom": custom,
                "notifier": { "name": NOTIFIER_NAME, "version": NOTIFIER_VERSION },
            }
        })
    }

    fn task_hit_item(&self, event: &TaskEvent) -> Value {
        let body = json!({
            "message": {
                "body": format!(
                    "Task hit: {} (type \"{}\")",
                    event.task_name, event.task_kind
                ),
            }
        });
        let custom = json!({
            "task": { "name": event.task_name, "type": event.task_kind },
        });

        self.item("info", body, custom)
    }

    fn error_item(&self, report: &ErrorReport) -> Value {
        let body = json!({
            "message": {
                "body": format!("{}: {}", report.error_type(), report.message()),
            }
        });
        let custom = json!({
            "context": report.context(),
            "chain": report.chain(),
        });

        self.item("error", body, custom)
    }
}

#[async_trait]
impl ReportingBackend for RollbarBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send_task_hit(&self, event: &TaskEvent) -> DispatchHandle {
        debug!(backend = NAME, task = %event.task_name, "Sending task hit");

        let request = self
            .client
            .post(self.endpoint.clone())
            .header("X-Rollbar-Access-Token", &self.access_token)
            .json(&self.task_hit_item(event));

        DispatchHandle::spawn(NAME, deliver(NAME, "task hit", request))
    }

    async fn send_error_report(&self, report: &ErrorReport) {
        debug!(backend = NAME, error_type = report.error_type(), "Sending error report");

        let request = self
            .client
            .post(self.endpoint.clone())
            .header("X-Rollbar-Access-Token", &self.access_token)
            .json(&self.error_item(report));

        deliver(NAME, "error report", request).await;
    }
}
