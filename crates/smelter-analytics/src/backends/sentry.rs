// Sentry backend
//
// Events go straight to the store endpoint derived from the DSN. Task hits
// are info-level message events; error reports are error-level events with
// the exception chain plus taxonomy tags and extras.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{deliver, http_client, NOTIFIER_NAME, NOTIFIER_VERSION};
use crate::backend::ReportingBackend;
use crate::config::SentryConfig;
use crate::error::{AnalyticsError, Result};
use crate::handle::DispatchHandle;
use crate::identity::Identity;
use crate::report::ErrorReport;
use crate::task::TaskEvent;

const NAME: &str = "sentry";

/// Parsed Sentry DSN: `{scheme}://{public_key}@{host}[/{path}]/{project_id}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentryDsn {
    pub public_key: String,
    pub project_id: String,
    store_url: String,
}

impl SentryDsn {
    /// URL events are posted to
    pub fn store_url(&self) -> &str {
        &self.store_url
    }

    /// Value of the `X-Sentry-Auth` header
    pub fn auth_header(&self) -> String {
        format!(
            "Sentry sentry_version=7, sentry_client={}/{}, sentry_key={}",
            NOTIFIER_NAME, NOTIFIER_VERSION, self.public_key
        )
    }
}

impl FromStr for SentryDsn {
    type Err = AnalyticsError;

    fn from_str(dsn: &str) -> Result<Self> {
        let url = Url::parse(dsn)
            .map_err(|e| AnalyticsError::config(format!("invalid Sentry DSN: {}", e)))?;

        let public_key = url.username();
        if public_key.is_empty() {
            return Err(AnalyticsError::config("Sentry DSN has no public key"));
        }

        let host = url
            .host_str()
            .ok_or_else(|| AnalyticsError::config("Sentry DSN has no host"))?;

        let path = url.path().trim_matches('/');
        let (prefix, project_id) = match path.rsplit_once('/') {
            Some((prefix, project)) => (format!("/{}", prefix), project),
            None => (String::new(), path),
        };
        if project_id.is_empty() {
            return Err(AnalyticsError::config("Sentry DSN has no project id"));
        }

        let port = url.port().map(|p| format!(":{}", p)).unwrap_or_default();
        let store_url = format!(
            "{}://{}{}{}/api/{}/store/",
            url.scheme(),
            host,
            port,
            prefix,
            project_id
        );

        Ok(Self {
            public_key: public_key.to_string(),
            project_id: project_id.to_string(),
            store_url,
        })
    }
}

pub struct SentryBackend {
    client: Client,
    dsn: SentryDsn,
    release: String,
    user: Value,
    /// Tags attached to every event
    base_tags: BTreeMap<&'static str, String>,
}

impl SentryBackend {
    pub fn new(config: SentryConfig, identity: &Identity, timeout: Duration) -> Result<Self> {
        let dsn: SentryDsn = config.dsn.parse()?;

        let mut base_tags = BTreeMap::new();
        base_tags.insert("projectId", identity.project_id.clone());
        base_tags.insert("version", identity.tool_version.clone());
        base_tags.insert("os", identity.environment.os.as_str().to_string());
        base_tags.insert("userAgent", identity.user_agent.clone());

        Ok(Self {
            client: http_client(identity, timeout)?,
            dsn,
            release: identity.tool_version.clone(),
            user: json!({
                "id": identity.client_id,
                "type": identity.user_type.as_str(),
            }),
            base_tags,
        })
    }

    fn event(
        &self,
        level: &str,
        tags: BTreeMap<&'static str, String>,
        body: Map<String, Value>,
    ) -> Value {
        let mut all_tags = self.base_tags.clone();
        all_tags.extend(tags);

        let mut event = Map::new();
        event.insert("event_id".into(), json!(Uuid::new_v4().simple().to_string()));
        event.insert("timestamp".into(), json!(Utc::now().to_rfc3339()));
        event.insert("platform".into(), json!("other"));
        event.insert("logger".into(), json!("smelter"));
        event.insert("level".into(), json!(level));
        event.insert("release".into(), json!(self.release));
        event.insert("user".into(), self.user.clone());
        event.insert("tags".into(), json!(all_tags));
        event.insert(
            "sdk".into(),
            json!({ "name": NOTIFIER_NAME, "version": NOTIFIER_VERSION }),
        );
        event.extend(body);

        Value::Object(event)
    }

    fn task_hit_event(&self, event: &TaskEvent) -> Value {
        let mut tags = BTreeMap::new();
        tags.insert("name", event.task_name.clone());
        tags.insert("taskKind", event.task_kind.as_str().to_string());

        let mut body = Map::new();
        body.insert(
            "message".into(),
            json!({
                "formatted": format!(
                    "Task hit: '{}' (kind: {})",
                    event.task_name, event.task_kind
                ),
            }),
        );

        self.event("info", tags, body)
    }

    fn error_event(&self, report: &ErrorReport) -> Value {
        let mut tags = BTreeMap::new();
        let mut extra = Map::new();

        tags.insert("errorType", report.error_type().to_string());
        if let Some(context) = report.context() {
            extra.insert("message".into(), json!(context.message));
            if let Some(plugin) = &context.plugin_name {
                tags.insert("pluginName", plugin.clone());
            }
            if let Some(name) = &context.name {
                tags.insert("name", name.clone());
            }
            if let Some(code) = context.code {
                tags.insert("number", code.to_string());
            }
            if let Some(category) = &context.category {
                tags.insert("category.name", category.name.to_string());
                extra.insert("category.title".into(), json!(category.title));
            }
            if let Some(title) = &context.title {
                extra.insert("title".into(), json!(title));
            }
            if let Some(message) = &context.context_message {
                extra.insert("contextMessage".into(), json!(message));
            }
            if let Some(description) = &context.description {
                extra.insert("description".into(), json!(description));
            }
        }

        // Sentry lists exceptions innermost first
        let chain = report.chain();
        let values: Vec<Value> = chain
            .iter()
            .enumerate()
            .rev()
            .map(|(depth, message)| {
                let kind = if depth == 0 { report.error_type() } else { "Cause" };
                json!({ "type": kind, "value": message })
            })
            .collect();

        let mut body = Map::new();
        body.insert("exception".into(), json!({ "values": values }));
        body.insert("extra".into(), Value::Object(extra));

        self.event("error", tags, body)
    }
}

#[async_trait]
impl ReportingBackend for SentryBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn send_task_hit(&self, event: &TaskEvent) -> DispatchHandle {
        debug!(backend = NAME, task = %event.task_name, "Sending task hit");

        let request = self
            .client
            .post(self.dsn.store_url())
            .header("X-Sentry-Auth", self.dsn.auth_header())
            .json(&self.task_hit_event(event));

        DispatchHandle::spawn(NAME, deliver(NAME, "task hit", request))
    }

    async fn send_error_report(&self, report: &ErrorReport) {
        debug!(backend = NAME, error_type = report.error_type(), "Sending error report");

        let request = self
            .client
            .post(self.dsn.store_url())
            .header("X-Sentry-Auth", self.dsn.auth_header())
            .json(&self.error_event(report));

        deliver(NAME, "error report", request).await;
    }
}
