// Integration tests for the HTTP reporting backends
//
// Every service is stood in for by a wiremock server, so these tests check
// what actually goes over the wire without talking to real services.
//
// Run with: cargo test -p smelter-analytics --test backends_test

use std::time::Duration;

use serde_json::json;
use smelter_analytics::config::{BugsnagConfig, GoogleAnalyticsConfig, RollbarConfig, SentryConfig};
use smelter_analytics::{
    Analytics, AnalyticsConfig, BugsnagBackend, Environment, ErrorReport, GoogleAnalyticsBackend,
    Identity, ReportingBackend, RollbarBackend, SentryBackend, SmelterError, TaskEvent,
};
use wiremock::matchers::{body_partial_json, body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(2);

fn identity() -> Identity {
    Identity::new(
        "client-1",
        "project-1",
        Environment::detect_with("Smelter 1.2.3", |_| None),
    )
}

/// Configuration pointing every backend at the mock server
fn mock_config(server: &MockServer) -> AnalyticsConfig {
    let uri = server.uri();
    let address = server.address().to_string();
    AnalyticsConfig::from_lookup(|var| match var {
        "SMELTER_GA_TRACKING_ID" => Some("UA-1-1".to_string()),
        "SMELTER_GA_ENDPOINT" => Some(format!("{}/collect", uri)),
        "SMELTER_SENTRY_DSN" => Some(format!("http://public@{}/42", address)),
        "SMELTER_ROLLBAR_TOKEN" => Some("token".to_string()),
        "SMELTER_ROLLBAR_ENDPOINT" => Some(format!("{}/api/1/item/", uri)),
        "SMELTER_BUGSNAG_API_KEY" => Some("key".to_string()),
        "SMELTER_BUGSNAG_ENDPOINT" => Some(format!("{}/notify", uri)),
        _ => None,
    })
}

fn compile_failure() -> anyhow::Error {
    anyhow::Error::new(SmelterError::with_code(600, "Compilation failed"))
}

#[tokio::test]
async fn test_google_analytics_task_hit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collect"))
        .and(body_string_contains("t=pageview"))
        .and(body_string_contains("dp=%2Ftask%2Fbuiltin"))
        .and(body_string_contains("cid=client-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = GoogleAnalyticsBackend::new(
        GoogleAnalyticsConfig {
            tracking_id: "UA-1-1".to_string(),
            endpoint: format!("{}/collect", server.uri()),
        },
        &identity(),
        TIMEOUT,
    )
    .unwrap();

    backend.send_task_hit(&TaskEvent::new("compile")).wait().await;
    // Error reports have no Google Analytics channel
    backend
        .send_error_report(&ErrorReport::contextualized(compile_failure()))
        .await;
}

#[tokio::test]
async fn test_sentry_task_hit_and_error_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/42/store/"))
        .and(header_exists("X-Sentry-Auth"))
        .and(body_partial_json(json!({
            "level": "info",
            "message": { "formatted": "Task hit: 'compile' (kind: builtin)" },
            "tags": { "taskKind": "builtin", "projectId": "project-1" },
            "user": { "id": "client-1" },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/42/store/"))
        .and(body_partial_json(json!({
            "level": "error",
            "tags": { "errorType": "SmelterError", "number": "600" },
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = SentryBackend::new(
        SentryConfig {
            dsn: format!("http://public@{}/42", server.address()),
        },
        &identity(),
        TIMEOUT,
    )
    .unwrap();

    backend.send_task_hit(&TaskEvent::new("compile")).wait().await;
    backend
        .send_error_report(&ErrorReport::contextualized(compile_failure()))
        .await;

    let requests = server.received_requests().await.unwrap();
    let auth = requests[0].headers.get("X-Sentry-Auth").unwrap();
    assert!(auth.to_str().unwrap().contains("sentry_key=public"));
}

#[tokio::test]
async fn test_rollbar_items() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/1/item/"))
        .and(header("X-Rollbar-Access-Token", "token"))
        .and(body_partial_json(json!({
            "data": {
                "level": "info",
                "body": { "message": { "body": "Task hit: deploy (type \"custom\")" } },
                "custom": { "task": { "name": "deploy", "type": "custom" } },
                "person": { "id": "client-1" },
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/1/item/"))
        .and(body_partial_json(json!({
            "data": {
                "level": "error",
                "custom": { "context": { "errorType": "SmelterError", "number": 600 } },
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = RollbarBackend::new(
        RollbarConfig {
            access_token: "token".to_string(),
            endpoint: format!("{}/api/1/item/", server.uri()),
            environment: "production".to_string(),
        },
        &identity(),
        TIMEOUT,
    )
    .unwrap();

    backend.send_task_hit(&TaskEvent::new("deploy")).wait().await;
    backend
        .send_error_report(&ErrorReport::contextualized(compile_failure()))
        .await;
}

#[tokio::test]
async fn test_bugsnag_error_report() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notify"))
        .and(header("Bugsnag-Api-Key", "key"))
        .and(header("Bugsnag-Payload-Version", "5"))
        .and(body_partial_json(json!({
            "apiKey": "key",
            "payloadVersion": "5",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let backend = BugsnagBackend::new(
        BugsnagConfig {
            api_key: "key".to_string(),
            endpoint: format!("{}/notify", server.uri()),
        },
        &identity(),
        TIMEOUT,
    )
    .unwrap();

    // Task hits never reach Bugsnag
    backend.send_task_hit(&TaskEvent::new("compile")).wait().await;
    backend
        .send_error_report(&ErrorReport::contextualized(compile_failure()))
        .await;
}

#[tokio::test]
async fn test_service_errors_are_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let analytics = Analytics::with_identity(identity(), &mock_config(&server));

    analytics.report_task_event("compile").wait().await;
    analytics.report_error(compile_failure()).await;

    assert!(!server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_service_is_swallowed() {
    let backend = GoogleAnalyticsBackend::new(
        GoogleAnalyticsConfig {
            tracking_id: "UA-1-1".to_string(),
            // Nothing listens on port 1
            endpoint: "http://127.0.0.1:1/collect".to_string(),
        },
        &identity(),
        TIMEOUT,
    )
    .unwrap();

    let settled = backend
        .send_task_hit(&TaskEvent::new("compile"))
        .settle_within(Duration::from_secs(10))
        .await;
    assert!(settled);
}

#[tokio::test]
async fn test_slow_service_is_aborted_at_deadline() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;

    let mut config = mock_config(&server);
    config.request_timeout = Duration::from_secs(60);
    let analytics = Analytics::with_identity(identity(), &config);

    let settled = analytics
        .report_task_event("compile")
        .settle_within(Duration::from_millis(200))
        .await;
    assert!(!settled);
}

#[tokio::test]
async fn test_facade_fans_out_to_every_service() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let analytics = Analytics::with_identity(identity(), &mock_config(&server));
    assert!(analytics.is_enabled());

    analytics.report_task_event("compile").wait().await;
    let task_paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(task_paths.len(), 3);
    assert!(task_paths.contains(&"/collect".to_string()));
    assert!(task_paths.contains(&"/api/42/store/".to_string()));
    assert!(task_paths.contains(&"/api/1/item/".to_string()));

    server.reset().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    analytics.report_error(compile_failure()).await;
    let error_paths: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect();
    assert_eq!(error_paths.len(), 3);
    assert!(error_paths.contains(&"/api/42/store/".to_string()));
    assert!(error_paths.contains(&"/api/1/item/".to_string()));
    assert!(error_paths.contains(&"/notify".to_string()));
}
