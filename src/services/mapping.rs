//! Similarity-based mapping from spec tests to existing TestRail cases,
//! and uploads of JUnit results through that mapping.

use std::collections::HashSet;
use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    CaseMapping, JunitReport, NewRun, Run, SpecFileInfo, SpecTest, TestCase, TestCaseMapping,
    TestResult, UnmatchedTest,
};
use crate::models::testrail::format_elapsed;
use crate::services::retry::{RetryPolicy, robust_api_call};
use crate::services::similarity::best_match;
use crate::services::testrail::{TestRailBackend, upload_results};

/// Separator Playwright puts between describe titles and the test title in
/// JUnit `name` attributes.
pub const TITLE_SEPARATOR: &str = " › ";

/// Full title of a spec test as it appears in JUnit output.
pub fn full_title(test: &SpecTest) -> String {
    let mut parts: Vec<&str> = test.describe_path.iter().map(String::as_str).collect();
    parts.push(&test.title);
    parts.join(TITLE_SEPARATOR)
}

/// Match every scanned test to its best-scoring case.
///
/// The case title is compared against the test's own title; the mapping is
/// keyed by spec file name and full JUnit title so uploads can look results
/// up exactly.
pub fn generate_mapping(
    specs: &[SpecFileInfo],
    cases: &[TestCase],
    threshold: f64,
) -> TestCaseMapping {
    let mut mappings = Vec::new();
    let mut unmatched = Vec::new();
    let mut seen = HashSet::new();

    for spec in specs {
        for test in &spec.tests {
            let test_title = full_title(test);
            if !seen.insert((spec.file_name(), test_title.clone())) {
                warn!("Duplicate test title '{}' in {}, keeping first", test_title, spec.path);
                continue;
            }

            match best_match(&test.title, cases, |c| c.title.as_str(), threshold) {
                (Some(case), score) => mappings.push(CaseMapping {
                    test_title,
                    file: spec.path.clone(),
                    case_id: case.id,
                    case_title: case.title.clone(),
                    similarity: score,
                }),
                (None, score) => unmatched.push(UnmatchedTest {
                    test_title,
                    file: spec.path.clone(),
                    best_similarity: score,
                }),
            }
        }
    }

    info!(
        "Mapped {} tests to TestRail cases, {} unmatched (threshold {})",
        mappings.len(),
        unmatched.len(),
        threshold
    );

    TestCaseMapping {
        generated_at: Utc::now(),
        threshold,
        mappings,
        unmatched,
    }
}

pub async fn write_mapping(path: &Path, mapping: &TestCaseMapping) -> AppResult<()> {
    let json = serde_json::to_string_pretty(mapping)?;
    tokio::fs::write(path, json).await.map_err(|e| {
        AppError::FileSystem(format!("Failed to write {}: {}", path.display(), e))
    })?;
    info!("Wrote {} mappings to {}", mapping.mappings.len(), path.display());
    Ok(())
}

pub async fn read_mapping(path: &Path) -> AppResult<TestCaseMapping> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::FileSystem(format!(
            "Failed to read mapping {}: {} (run generate-mapping first)",
            path.display(),
            e
        ))
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Create a run scoped to every mapped case.
pub async fn create_run_from_mapping(
    backend: &dyn TestRailBackend,
    mapping: &TestCaseMapping,
    suite_id: Option<i64>,
    name: &str,
    retry: RetryPolicy,
) -> AppResult<Run> {
    let case_ids = mapping.case_ids();
    if case_ids.is_empty() {
        return Err(AppError::InvalidInput(
            "Mapping contains no cases; cannot create an empty run".to_string(),
        ));
    }
    let new_run = NewRun::scoped(suite_id, name, None, case_ids);
    robust_api_call(retry, "add_run", || backend.add_run(&new_run)).await
}

/// Outcome of [`upload_with_mapping`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadOutcome {
    pub uploaded: usize,
    pub dropped: usize,
}

/// Upload executed JUnit results to an existing run, looking each test up by
/// spec file name and exact title. Tests absent from the mapping are logged
/// and dropped.
pub async fn upload_with_mapping(
    backend: &dyn TestRailBackend,
    report: &JunitReport,
    run_id: i64,
    mapping: &TestCaseMapping,
    retry: RetryPolicy,
) -> AppResult<UploadOutcome> {
    let by_test = mapping.by_test();
    let mut results = Vec::new();
    let mut dropped = 0;

    for test in report.executed() {
        match by_test.get(&(test.file_name(), test.name.as_str())) {
            Some(&case_id) => results.push(TestResult {
                case_id,
                status_id: test.status.to_case_status(),
                comment: test
                    .failure_message
                    .clone()
                    .unwrap_or_else(|| test.status.to_string()),
                elapsed: format_elapsed(test.time),
            }),
            None => {
                warn!(
                    "'{}' ({}) is not in the mapping, dropping result",
                    test.name,
                    test.file_name()
                );
                dropped += 1;
            }
        }
    }

    let uploaded = if results.is_empty() {
        warn!("No mapped results to upload to run R{}", run_id);
        0
    } else {
        upload_results(backend, run_id, &results, retry).await?
    };

    info!(
        "Uploaded {} results to run R{} ({} dropped)",
        uploaded, run_id, dropped
    );
    Ok(UploadOutcome { uploaded, dropped })
}
