//! Mock TestRail server for E2E tests.
//!
//! TestRail puts the endpoint in the query string
//! (`/index.php?/api/v2/get_cases/1&limit=250`), so requests are matched on
//! the query rather than the path.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use screening_ci::config::TestRailConfig;
use screening_ci::services::{RetryPolicy, TestRailClient};
use secrecy::SecretString;
use serde_json::{Value, json};
use wiremock::{Match, MockServer, Request, Respond, ResponseTemplate};

pub const TEST_USER: &str = "ci@example.com";
pub const TEST_API_KEY: &str = "test-api-key";
pub const PROJECT_ID: i64 = 1;

/// Matches `index.php?/api/v2/{endpoint}` with any trailing `&k=v` filters.
pub struct ApiEndpoint(String);

pub fn api(endpoint: &str) -> ApiEndpoint {
    ApiEndpoint(format!("/api/v2/{}", endpoint))
}

impl Match for ApiEndpoint {
    fn matches(&self, request: &Request) -> bool {
        request.url.query().is_some_and(|q| {
            q == self.0 || q.starts_with(&format!("{}&", self.0))
        })
    }
}

/// Matches a `name=value` segment of the TestRail query string.
pub struct QueryParam(&'static str, String);

pub fn query_param(name: &'static str, value: impl ToString) -> QueryParam {
    QueryParam(name, value.to_string())
}

impl Match for QueryParam {
    fn matches(&self, request: &Request) -> bool {
        let expected = format!("{}={}", self.0, self.1);
        request
            .url
            .query()
            .is_some_and(|q| q.split('&').any(|segment| segment == expected))
    }
}

/// Matches a results upload whose first entry is for `case_id`.
pub struct BatchStartingAt(pub i64);

impl Match for BatchStartingAt {
    fn matches(&self, request: &Request) -> bool {
        serde_json::from_slice::<Value>(&request.body)
            .ok()
            .and_then(|body| body["results"][0]["case_id"].as_i64())
            == Some(self.0)
    }
}

/// Responds to `add_results_for_cases` with the posted results, as TestRail does.
pub struct EchoResults;

impl Respond for EchoResults {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        ResponseTemplate::new(200).set_body_json(body["results"].clone())
    }
}

/// Responds to `add_section` / `add_case` with the posted entity and a fresh ID.
pub struct CreateEntity {
    next_id: AtomicI64,
    field: &'static str,
}

impl CreateEntity {
    pub fn new(first_id: i64, field: &'static str) -> Self {
        CreateEntity {
            next_id: AtomicI64::new(first_id),
            field,
        }
    }
}

impl Respond for CreateEntity {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let section_id = request
            .url
            .query()
            .and_then(|q| q.strip_prefix("/api/v2/add_case/"))
            .and_then(|s| s.parse::<i64>().ok());
        let mut entity = serde_json::Map::new();
        entity.insert("id".to_string(), json!(id));
        entity.insert(self.field.to_string(), body[self.field].clone());
        entity.insert("section_id".to_string(), json!(section_id));
        ResponseTemplate::new(200).set_body_json(Value::Object(entity))
    }
}

/// `count` cases with consecutive IDs starting at `first_id`.
pub fn cases(first_id: i64, count: i64) -> Vec<Value> {
    (first_id..first_id + count)
        .map(|id| json!({ "id": id, "title": format!("Case {}", id), "section_id": 1 }))
        .collect()
}

pub fn config(server: &MockServer, suite_id: Option<i64>) -> TestRailConfig {
    TestRailConfig {
        host: server.uri(),
        user: TEST_USER.to_string(),
        api_key: SecretString::from(TEST_API_KEY.to_string()),
        project_id: PROJECT_ID,
        suite_id,
        request_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(2),
    }
}

pub fn client(server: &MockServer) -> TestRailClient {
    TestRailClient::new(&config(server, None)).unwrap()
}

/// Retry policy that keeps tests fast.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 3,
        base_delay: Duration::from_millis(5),
    }
}

/// Bodies of received requests whose query starts with `/api/v2/{endpoint}`.
pub async fn posted_bodies(server: &MockServer, endpoint: &str) -> Vec<Value> {
    let prefix = format!("/api/v2/{}", endpoint);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.query().is_some_and(|q| q.starts_with(&prefix)))
        .map(|r| serde_json::from_slice(&r.body).unwrap_or(Value::Null))
        .collect()
}
