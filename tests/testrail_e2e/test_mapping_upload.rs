//! Mapping-driven run creation and result upload.

use chrono::Utc;
use screening_ci::error::AppError;
use screening_ci::models::{CaseMapping, TestCaseMapping};
use screening_ci::services::mapping::{create_run_from_mapping, upload_with_mapping};
use screening_ci::services::parse_junit_xml;
use screening_ci::services::similarity::DEFAULT_THRESHOLD;
use serde_json::json;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::mock_testrail::{EchoResults, api, client, fast_retry, posted_bodies};

fn mapping(entries: &[(&str, i64)]) -> TestCaseMapping {
    TestCaseMapping {
        generated_at: Utc::now(),
        threshold: DEFAULT_THRESHOLD,
        mappings: entries
            .iter()
            .map(|(title, case_id)| CaseMapping {
                test_title: title.to_string(),
                file: "flags.spec.js".to_string(),
                case_id: *case_id,
                case_title: title.to_string(),
                similarity: 1.0,
            })
            .collect(),
        unmatched: Vec::new(),
    }
}

#[tokio::test]
async fn test_create_run_from_mapping_scopes_cases() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_run/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 31, "name": "Nightly" })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mapping = mapping(&[("Flags › raises", 5), ("Flags › clears", 6), ("Flags › again", 5)]);
    let run = create_run_from_mapping(&client, &mapping, Some(2), "Nightly", fast_retry())
        .await
        .unwrap();
    assert_eq!(run.id, 31);

    let body = &posted_bodies(&server, "add_run/1").await[0];
    assert_eq!(body["suite_id"], 2);
    assert_eq!(body["include_all"], false);
    assert_eq!(body["case_ids"], json!([5, 6]));
}

#[tokio::test]
async fn test_create_run_rejects_empty_mapping() {
    let server = MockServer::start().await;
    let client = client(&server);
    let result =
        create_run_from_mapping(&client, &mapping(&[]), None, "Nightly", fast_retry()).await;
    assert!(matches!(result, Err(AppError::InvalidInput(_))));
}

#[tokio::test]
async fn test_upload_uses_exact_titles_and_drops_unmapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_results_for_cases/31"))
        .respond_with(EchoResults)
        .expect(1)
        .mount(&server)
        .await;

    let report = parse_junit_xml(
        r#"<testsuite name="flags.spec.js">
            <testcase name="Flags › raises" classname="flags.spec.js" time="4"/>
            <testcase name="Flags › clears" classname="flags.spec.js" time="2">
              <failure message="flag still visible"/>
            </testcase>
            <testcase name="Flags › renamed test" classname="flags.spec.js" time="1"/>
            <testcase name="Flags › skipped" classname="flags.spec.js"><skipped/></testcase>
        </testsuite>"#,
    )
    .unwrap();

    let client = client(&server);
    let mapping = mapping(&[
        ("Flags › raises", 5),
        ("Flags › clears", 6),
        ("Flags › skipped", 7),
    ]);
    let outcome = upload_with_mapping(&client, &report, 31, &mapping, fast_retry())
        .await
        .unwrap();
    assert_eq!(outcome.uploaded, 2);
    assert_eq!(outcome.dropped, 1);

    let results = &posted_bodies(&server, "add_results_for_cases/31").await[0]["results"];
    assert_eq!(results[0]["case_id"], 5);
    assert_eq!(results[0]["status_id"], 1);
    assert_eq!(results[1]["case_id"], 6);
    assert_eq!(results[1]["status_id"], 5);
    assert_eq!(results[1]["comment"], "flag still visible");
}

#[tokio::test]
async fn test_upload_matches_title_within_its_own_file() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(api("add_results_for_cases/31"))
        .respond_with(EchoResults)
        .expect(1)
        .mount(&server)
        .await;

    let report = parse_junit_xml(
        r#"<testsuites>
          <testsuite name="identity.spec.js">
            <testcase name="Smoke › loads page" classname="identity.spec.js" time="1"/>
          </testsuite>
          <testsuite name="income.spec.js">
            <testcase name="Smoke › loads page" classname="income.spec.js" time="1">
              <failure message="income broke"/>
            </testcase>
          </testsuite>
        </testsuites>"#,
    )
    .unwrap();

    let client = client(&server);
    let mapping = TestCaseMapping {
        mappings: vec![CaseMapping {
            file: "applicant/identity.spec.js".to_string(),
            ..mapping(&[("Smoke › loads page", 5)]).mappings[0].clone()
        }],
        ..mapping(&[])
    };
    let outcome = upload_with_mapping(&client, &report, 31, &mapping, fast_retry())
        .await
        .unwrap();
    assert_eq!(outcome.uploaded, 1);
    assert_eq!(outcome.dropped, 1);

    let results = &posted_bodies(&server, "add_results_for_cases/31").await[0]["results"];
    assert_eq!(results.as_array().map(Vec::len), Some(1));
    assert_eq!(results[0]["case_id"], 5);
    assert_eq!(results[0]["status_id"], 1);
}
