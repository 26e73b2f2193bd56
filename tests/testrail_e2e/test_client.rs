//! TestRail HTTP client: pagination, batching, auth, errors.

use screening_ci::error::AppError;
use screening_ci::models::{CaseStatus, TestResult};
use screening_ci::services::{TestRailBackend, TestRailClient, robust_api_call, upload_results};
use serde_json::json;
use wiremock::matchers::{basic_auth, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::mock_testrail::{
    BatchStartingAt, EchoResults, PROJECT_ID, TEST_API_KEY, TEST_USER, api, cases, client, config, fast_retry,
    posted_bodies, query_param,
};

fn passed_results(count: i64) -> Vec<TestResult> {
    (1..=count)
        .map(|case_id| TestResult {
            case_id,
            status_id: CaseStatus::Passed,
            comment: "Passed".to_string(),
            elapsed: Some("3s".to_string()),
        })
        .collect()
}

#[tokio::test]
async fn test_get_cases_returns_union_of_all_pages() {
    let server = MockServer::start().await;

    // First page as a bare array, second in the paginated envelope
    Mock::given(method("GET"))
        .and(api("get_cases/1"))
        .and(query_param("offset", 0))
        .and(query_param("limit", 250))
        .respond_with(ResponseTemplate::new(200).set_body_json(cases(1, 250)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(api("get_cases/1"))
        .and(query_param("offset", 250))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "offset": 250,
            "limit": 250,
            "size": 10,
            "cases": cases(251, 10),
        })))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server).get_cases(None).await.unwrap();
    assert_eq!(all.len(), 260);
    assert_eq!(all.first().map(|c| c.id), Some(1));
    assert_eq!(all.last().map(|c| c.id), Some(260));
}

#[tokio::test]
async fn test_exact_page_boundary_fetches_one_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(api("get_cases/1"))
        .and(query_param("offset", 0))
        .respond_with(ResponseTemplate::new(200).set_body_json(cases(1, 250)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(api("get_cases/1"))
        .and(query_param("offset", 250))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "cases": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server).get_cases(None).await.unwrap();
    assert_eq!(all.len(), 250);
}

#[tokio::test]
async fn test_suite_and_section_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(api("get_cases/1"))
        .and(query_param("suite_id", 9))
        .and(query_param("section_id", 4))
        .respond_with(ResponseTemplate::new(200).set_body_json(cases(1, 2)))
        .expect(1)
        .mount(&server)
        .await;

    let client = TestRailClient::new(&config(&server, Some(9))).unwrap();
    let found = client.get_cases(Some(4)).await.unwrap();
    assert_eq!(found.len(), 2);
}

#[tokio::test]
async fn test_results_are_uploaded_in_batches_of_250() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_results_for_cases/42"))
        .respond_with(EchoResults)
        .expect(2)
        .mount(&server)
        .await;

    let uploaded = upload_results(&client(&server), 42, &passed_results(300), fast_retry())
        .await
        .unwrap();
    assert_eq!(uploaded, 300);

    let bodies = posted_bodies(&server, "add_results_for_cases/42").await;
    let sizes: Vec<usize> = bodies
        .iter()
        .map(|b| b["results"].as_array().map_or(0, Vec::len))
        .collect();
    assert_eq!(sizes, vec![250, 50]);
    assert_eq!(bodies[1]["results"][0]["case_id"], 251);
    assert_eq!(bodies[0]["results"][0]["status_id"], 1);
}

#[tokio::test]
async fn test_failed_batch_is_retried_alone() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_results_for_cases/42"))
        .and(BatchStartingAt(251))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(api("add_results_for_cases/42"))
        .respond_with(EchoResults)
        .mount(&server)
        .await;

    let uploaded = upload_results(&client(&server), 42, &passed_results(300), fast_retry())
        .await
        .unwrap();
    assert_eq!(uploaded, 300);

    let bodies = posted_bodies(&server, "add_results_for_cases/42").await;
    let first_cases: Vec<i64> = bodies
        .iter()
        .filter_map(|b| b["results"][0]["case_id"].as_i64())
        .collect();
    assert_eq!(first_cases, vec![1, 251, 251]);
}

#[tokio::test]
async fn test_single_request_rejects_oversized_batch() {
    let server = MockServer::start().await;
    let err = client(&server)
        .add_results_for_cases(42, &passed_results(251))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_requests_use_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(api("get_run/5"))
        .and(basic_auth(TEST_USER, TEST_API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5,
            "name": "Nightly",
            "url": "https://testrail.example/index.php?/runs/view/5",
            "is_completed": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let run = client(&server).get_run(5).await.unwrap();
    assert_eq!(run.name, "Nightly");
    assert!(!run.is_completed);
}

#[tokio::test]
async fn test_error_embeds_upstream_status_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(api(&format!("get_sections/{}", PROJECT_ID)))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_string(r#"{"error":"Authentication failed: invalid or missing user/password or session cookie."}"#),
        )
        .mount(&server)
        .await;

    let err = client(&server).get_sections().await.unwrap_err();
    assert_eq!(err.status(), Some(403));
    match err {
        AppError::Api { body, .. } => {
            assert!(body.contains("get_sections/1"));
            assert!(body.contains("Authentication failed"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_robust_call_recovers_from_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("close_run/8"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(api("close_run/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 8,
            "name": "Nightly",
            "is_completed": true,
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let run = robust_api_call(fast_retry(), "close_run", || client.close_run(8))
        .await
        .unwrap();
    assert!(run.is_completed);
    assert_eq!(posted_bodies(&server, "close_run/8").await.len(), 2);
}

#[tokio::test]
async fn test_robust_call_gives_up_after_max_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(api("get_sections/1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = robust_api_call(fast_retry(), "get_sections", || client.get_sections()).await;
    assert_eq!(result.unwrap_err().status(), Some(500));
}

#[tokio::test]
async fn test_attachment_is_sent_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_attachment_to_case/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "attachment_id": 443 })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let video = dir.path().join("video.webm");
    std::fs::write(&video, b"fake webm bytes").unwrap();

    let attachment = client(&server)
        .add_attachment_to_case(7, &video)
        .await
        .unwrap();
    assert_eq!(attachment.attachment_id, json!(443));

    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains(r#"name="attachment""#));
    assert!(body.contains(r#"filename="video.webm""#));
    assert!(body.contains("fake webm bytes"));
}

#[tokio::test]
async fn test_public_link_and_run_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("create_public_link/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "url": "https://testrail.example/index.php?/runs/overview/12&key=abc",
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let link = client.create_public_link(12).await.unwrap();
    assert!(link.url.ends_with("key=abc"));
    assert_eq!(
        client.run_url(12),
        format!("{}/index.php?/runs/view/12", server.uri())
    );
}
