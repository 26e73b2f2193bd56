//! Publishes Playwright JUnit results to TestRail.
//!
//! Pipeline for one report:
//! 1. Keep executed (non-skipped) tests from the parsed JUnit report
//! 2. Fetch sections and cases concurrently
//! 3. Per source file, find or create a section named after the file
//! 4. Per test, find or create a case by exact title within that section only
//! 5. Create a run scoped to exactly the collected cases
//! 6. Upload results through the same test → case map; unmapped results are dropped
//! 7. Attach videos of failed tests to their cases (failures are skipped)
//!
//! Cases are never matched across sections, so two spec files with a test of
//! the same title get two cases.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use futures_util::future::try_join;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{
    GitHubContext, JunitReport, JunitStatus, JunitTestCase, NewRun, PublishSummary, Section,
    TestCase, TestResult,
};
use crate::models::testrail::format_elapsed;
use crate::services::retry::{RetryPolicy, robust_api_call};
use crate::services::testrail::{TestRailBackend, upload_results};

/// Longest failure message copied into a result comment.
const MAX_COMMENT_CHARS: usize = 4000;

/// Publisher options.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Run name; defaults to "Playwright UI results" plus the CI label
    pub run_name: Option<String>,
    pub suite_id: Option<i64>,
    /// Close the run after uploading
    pub close_run: bool,
    /// Attach videos of failed tests to their cases
    pub attach_videos: bool,
    /// Directory attachment paths are resolved against
    pub attachment_root: PathBuf,
    pub retry: RetryPolicy,
}

impl Default for PublishOptions {
    fn default() -> Self {
        PublishOptions {
            run_name: None,
            suite_id: None,
            close_run: false,
            attach_videos: true,
            attachment_root: PathBuf::from("."),
            retry: RetryPolicy::default(),
        }
    }
}

/// Key identifying a test across the pipeline: source file name + title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestKey {
    pub file: String,
    pub title: String,
}

impl TestKey {
    pub fn of(test: &JunitTestCase) -> Self {
        TestKey {
            file: test.file_name().to_string(),
            title: test.name.clone(),
        }
    }
}

/// Publishes JUnit reports through a [`TestRailBackend`].
pub struct ResultPublisher<'a, B: TestRailBackend + ?Sized> {
    backend: &'a B,
    github: GitHubContext,
    options: PublishOptions,
}

impl<'a, B: TestRailBackend + ?Sized> ResultPublisher<'a, B> {
    pub fn new(backend: &'a B, github: GitHubContext, options: PublishOptions) -> Self {
        ResultPublisher {
            backend,
            github,
            options,
        }
    }

    /// Run the full pipeline for a parsed report.
    pub async fn publish(&self, report: &JunitReport) -> AppResult<PublishSummary> {
        let executed: Vec<&JunitTestCase> = report.executed().collect();
        if executed.is_empty() {
            return Err(AppError::InvalidInput(
                "No executed tests in report; nothing to publish".to_string(),
            ));
        }
        info!(
            "Publishing {} executed tests ({} skipped)",
            executed.len(),
            report.skipped
        );

        let case_map = self.find_or_create_cases(&executed).await?;
        let case_ids = unique_case_ids(&executed, &case_map);

        let run_name = self.run_name();
        let new_run = NewRun::scoped(
            self.options.suite_id,
            run_name.clone(),
            self.run_description(report),
            case_ids,
        );
        let run = robust_api_call(self.options.retry, "add_run", || {
            self.backend.add_run(&new_run)
        })
        .await?;

        let (results, dropped) = build_results(&executed, &case_map, self.github.run_url());
        let uploaded = if results.is_empty() {
            0
        } else {
            upload_results(self.backend, run.id, &results, self.options.retry).await?
        };

        let attachments = if self.options.attach_videos {
            self.attach_failure_videos(&executed, &case_map).await
        } else {
            0
        };

        let closed = if self.options.close_run {
            match robust_api_call(self.options.retry, "close_run", || {
                self.backend.close_run(run.id)
            })
            .await
            {
                Ok(_) => true,
                Err(e) => {
                    warn!("Failed to close run R{}: {}", run.id, e);
                    false
                }
            }
        } else {
            false
        };

        let summary = PublishSummary {
            run_id: run.id,
            run_name,
            run_url: Some(run.url.clone().unwrap_or_else(|| self.backend.run_url(run.id))),
            total: report.total,
            passed: report.passed,
            failed: report.failed,
            skipped: report.skipped,
            uploaded,
            dropped,
            attachments,
            closed,
        };
        info!(
            "Published run R{}: {} uploaded, {} dropped, {} attachments",
            summary.run_id, summary.uploaded, summary.dropped, summary.attachments
        );
        Ok(summary)
    }

    /// Resolve every executed test to a case, creating sections and cases as needed.
    pub async fn find_or_create_cases(
        &self,
        tests: &[&JunitTestCase],
    ) -> AppResult<HashMap<TestKey, i64>> {
        let retry = self.options.retry;
        let (sections, cases) = try_join(
            robust_api_call(retry, "get_sections", || self.backend.get_sections()),
            robust_api_call(retry, "get_cases", || self.backend.get_cases(None)),
        )
        .await?;
        info!(
            "Loaded {} sections and {} cases from TestRail",
            sections.len(),
            cases.len()
        );

        let mut sections_by_name: HashMap<String, Section> = HashMap::new();
        for section in sections {
            // First section wins when names repeat
            sections_by_name.entry(section.name.clone()).or_insert(section);
        }
        let mut cases_by_section: HashMap<i64, Vec<TestCase>> = HashMap::new();
        for case in cases {
            if let Some(section_id) = case.section_id {
                cases_by_section.entry(section_id).or_default().push(case);
            }
        }

        let mut case_map = HashMap::new();
        let mut created_sections = 0;
        let mut created_cases = 0;

        for test in tests {
            let key = TestKey::of(test);
            if case_map.contains_key(&key) {
                continue;
            }

            let section_id = match sections_by_name.get(&key.file) {
                Some(section) => section.id,
                None => {
                    let name = key.file.clone();
                    let section = robust_api_call(retry, "add_section", || {
                        self.backend.add_section(&name)
                    })
                    .await?;
                    created_sections += 1;
                    let id = section.id;
                    sections_by_name.insert(name, section);
                    id
                }
            };

            let section_cases = cases_by_section.entry(section_id).or_default();
            let case_id = match section_cases.iter().find(|c| c.title == key.title) {
                Some(case) => case.id,
                None => {
                    let case = robust_api_call(retry, "add_case", || {
                        self.backend.add_case(section_id, &key.title)
                    })
                    .await?;
                    created_cases += 1;
                    let id = case.id;
                    section_cases.push(case);
                    id
                }
            };

            case_map.insert(key, case_id);
        }

        info!(
            "Resolved {} tests to cases ({} sections and {} cases created)",
            case_map.len(),
            created_sections,
            created_cases
        );
        Ok(case_map)
    }

    async fn attach_failure_videos(
        &self,
        tests: &[&JunitTestCase],
        case_map: &HashMap<TestKey, i64>,
    ) -> usize {
        let mut attached = 0;
        for test in tests.iter().filter(|t| t.status == JunitStatus::Failed) {
            let Some(&case_id) = case_map.get(&TestKey::of(test)) else {
                continue;
            };
            for video in test.videos() {
                let path = resolve_attachment(&self.options.attachment_root, video);
                if !path.exists() {
                    warn!("Video {} for '{}' not found, skipping", path.display(), test.name);
                    continue;
                }
                match self.backend.add_attachment_to_case(case_id, &path).await {
                    Ok(_) => attached += 1,
                    Err(e) => warn!(
                        "Failed to attach {} to case C{}: {}",
                        path.display(),
                        case_id,
                        e
                    ),
                }
            }
        }
        attached
    }

    fn run_name(&self) -> String {
        if let Some(ref name) = self.options.run_name {
            return name.clone();
        }
        match self.github.run_label() {
            Some(label) => format!("Playwright UI results - {}", label),
            None => format!(
                "Playwright UI results - {}",
                Utc::now().format("%Y-%m-%d %H:%M UTC")
            ),
        }
    }

    fn run_description(&self, report: &JunitReport) -> Option<String> {
        let mut lines = vec![format!(
            "{} tests: {} passed, {} failed, {} skipped",
            report.total, report.passed, report.failed, report.skipped
        )];
        if let Some(url) = self.github.run_url() {
            lines.push(format!("CI run: {}", url));
        }
        Some(lines.join("\n"))
    }
}

/// Case IDs in first-seen test order, without duplicates.
fn unique_case_ids(tests: &[&JunitTestCase], case_map: &HashMap<TestKey, i64>) -> Vec<i64> {
    let mut ids = Vec::new();
    for test in tests {
        if let Some(&id) = case_map.get(&TestKey::of(test))
            && !ids.contains(&id)
        {
            ids.push(id);
        }
    }
    ids
}

/// Build result entries for executed tests. Returns the results and the
/// number of tests dropped because they had no case.
pub fn build_results(
    tests: &[&JunitTestCase],
    case_map: &HashMap<TestKey, i64>,
    ci_url: Option<String>,
) -> (Vec<TestResult>, usize) {
    let mut results = Vec::new();
    let mut dropped = 0;

    for test in tests {
        let Some(&case_id) = case_map.get(&TestKey::of(test)) else {
            warn!(
                "No TestRail case for '{}' ({}), dropping result",
                test.name, test.file
            );
            dropped += 1;
            continue;
        };
        results.push(TestResult {
            case_id,
            status_id: test.status.to_case_status(),
            comment: result_comment(test, ci_url.as_deref()),
            elapsed: format_elapsed(test.time),
        });
    }

    (results, dropped)
}

fn result_comment(test: &JunitTestCase, ci_url: Option<&str>) -> String {
    let mut comment = match test.status {
        JunitStatus::Failed => {
            let message = test
                .failure_message
                .as_deref()
                .unwrap_or("Test failed without a message");
            let truncated: String = message.chars().take(MAX_COMMENT_CHARS).collect();
            format!("Failed: {}", truncated)
        }
        _ => "Passed".to_string(),
    };
    if let Some(url) = ci_url {
        comment.push_str(&format!("\n\nCI run: {}", url));
    }
    comment
}

fn resolve_attachment(root: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() { p.to_path_buf() } else { root.join(p) }
}

/// Write the summary JSON consumed by later CI steps.
pub async fn write_summary(path: &Path, summary: &PublishSummary) -> AppResult<()> {
    let json = serde_json::to_string_pretty(summary)?;
    tokio::fs::write(path, json).await.map_err(|e| {
        AppError::FileSystem(format!("Failed to write {}: {}", path.display(), e))
    })?;
    info!("Wrote run summary to {}", path.display());
    Ok(())
}
