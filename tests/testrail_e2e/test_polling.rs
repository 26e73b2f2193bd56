//! Polling helpers against live HTTP endpoints.

use std::time::Duration;

use async_trait::async_trait;
use screening_ci::error::{AppError, AppResult};
use screening_ci::services::polling::{FlagQuery, HttpJsonSource, JsonFieldCondition};
use screening_ci::services::{PollOptions, PollRefresh, poll_condition, poll_for_flag};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast(description: &str) -> PollOptions {
    PollOptions::new(description)
        .max_poll_time(Duration::from_millis(500))
        .poll_interval(Duration::from_millis(10))
}

/// Re-triggers flag evaluation on the server.
struct Reevaluate {
    http_client: reqwest::Client,
    url: String,
    calls: usize,
}

#[async_trait]
impl PollRefresh for Reevaluate {
    async fn refresh(&mut self) -> AppResult<()> {
        self.calls += 1;
        self.http_client.post(&self.url).send().await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_poll_for_flag_refreshes_until_flag_appears() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/applications/9/flags"))
        .and(header("authorization", "Bearer ci-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/applications/9/flags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "key": "EMPLOYMENT_MISMATCH", "severity": "high" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/applications/9/evaluate"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let http_client = reqwest::Client::new();
    let source = HttpJsonSource::new(
        http_client.clone(),
        format!("{}/api/applications/9/flags", server.uri()),
    )
    .bearer_token("ci-token");
    let query = FlagQuery::new("EMPLOYMENT_MISMATCH").list_pointer("/data");
    let mut refresh = Reevaluate {
        http_client,
        url: format!("{}/api/applications/9/evaluate", server.uri()),
        calls: 0,
    };

    let document = poll_for_flag(
        &source,
        &query,
        &fast("employment flag"),
        Some(&mut refresh),
    )
    .await
    .unwrap();

    assert_eq!(document["data"][0]["severity"], "high");
    assert_eq!(refresh.calls, 2);
}

#[tokio::test]
async fn test_json_field_condition_waits_for_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/applications/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "pending" })))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/applications/9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "approved" })))
        .mount(&server)
        .await;

    let source = HttpJsonSource::new(
        reqwest::Client::new(),
        format!("{}/api/applications/9", server.uri()),
    );
    let mut condition = JsonFieldCondition::new(source, "/status", json!("approved"));
    poll_condition(&mut condition, &fast("application approval"))
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4);
}

#[tokio::test]
async fn test_timeout_reports_last_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let source = HttpJsonSource::new(reqwest::Client::new(), server.uri());
    let options = PollOptions::new("flag list")
        .max_poll_time(Duration::from_millis(60))
        .poll_interval(Duration::from_millis(20));

    let err = poll_for_flag(&source, &FlagQuery::new("ANY"), &options, None)
        .await
        .unwrap_err();
    match err {
        AppError::Timeout {
            description,
            last_error,
            ..
        } => {
            assert_eq!(description, "flag list");
            assert!(last_error.unwrap().contains("503"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}
