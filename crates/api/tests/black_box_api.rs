use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;

use sovereign_ai::{CompletionError, CompletionService};
use sovereign_api::app::{AppServices, build_app};
use sovereign_auth::{InMemoryRoleDirectory, Role};
use sovereign_core::OrganizationId;
use sovereign_infra::PipelineParts;

/// Answers every prompt with the same reply.
struct Scripted(&'static str);

#[async_trait]
impl CompletionService for Scripted {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Ok(self.0.to_string())
    }
}

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(reply: &'static str) -> Self {
        let roles = InMemoryRoleDirectory::new();
        roles.grant("hr-1", OrganizationId::new(1), Role::new(Role::HR));
        roles.grant("member-1", OrganizationId::new(1), Role::new(Role::MEMBER));

        let parts = PipelineParts::in_memory(Arc::new(Scripted(reply)), Arc::new(roles));
        let services = AppServices::new(parts, Duration::from_secs(5));

        // Same router as prod, bound to an ephemeral port.
        let app = build_app(Arc::new(services));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    async fn post_intent(&self, caller: &str, organization: &str, intent: &str) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("{}/v1/intents", self.base_url))
            .header("x-caller-id", caller)
            .header("x-organization-id", organization)
            .json(&json!({ "intent": intent }))
            .send()
            .await
            .unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

const CREATE_EMPLOYEE: &str =
    r#"{"action":"CREATE","target":"EMPLOYEE","payload":{"name":"Jane Doe","organizationId":1}}"#;
const DELETE_EMPLOYEE: &str =
    r#"{"action":"DELETE","target":"EMPLOYEE","payload":{"employeeId":"X","organizationId":1}}"#;

#[tokio::test]
async fn health_needs_no_identity() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;

    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn caller_header_required_for_v1_endpoints() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;

    let res = reqwest::Client::new()
        .post(format!("{}/v1/intents", srv.base_url))
        .json(&json!({ "intent": "create employee Jane Doe" }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_organization_is_a_bad_request() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;

    let res = srv.post_intent("hr-1", "acme", "create employee Jane Doe").await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn whoami_echoes_identity_headers() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;

    let res = reqwest::Client::new()
        .get(format!("{}/v1/whoami", srv.base_url))
        .header("x-caller-id", "hr-1")
        .header("x-organization-id", "1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "callerId": "hr-1", "organizationId": 1 }));
}

#[tokio::test]
async fn intent_is_processed_end_to_end() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;

    let res = srv.post_intent("hr-1", "1", "create employee Jane Doe").await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(true), "{body}");
    assert_eq!(body["command"]["action"], json!("CREATE"));
    assert_eq!(body["command"]["target"], json!("EMPLOYEE"));
    assert!(body["command"]["payload"]["employeeId"].is_string());

    let phases: Vec<&str> = body["trace"]["phases"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["phase"].as_str().unwrap())
        .collect();
    assert_eq!(phases, vec!["synthesize", "generate", "validate", "dispatch"]);
}

#[tokio::test]
async fn rejection_is_reported_in_the_body() {
    let srv = TestServer::spawn(DELETE_EMPLOYEE).await;

    let res = srv.post_intent("member-1", "1", "delete employee X").await;

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["validation"]["rejectedBy"], json!("authorization"));
    assert!(body.get("execution").is_none());
}

#[tokio::test]
async fn stats_reflect_processed_intents() {
    let srv = TestServer::spawn(CREATE_EMPLOYEE).await;
    srv.post_intent("hr-1", "1", "create employee Jane Doe").await;

    let res = reqwest::Client::new()
        .get(format!("{}/v1/stats", srv.base_url))
        .header("x-caller-id", "hr-1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["totalCommands"], json!(1));
    assert_eq!(body["successfulCommands"], json!(1));
}
