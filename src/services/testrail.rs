//! TestRail REST API client.
//!
//! Thin wrapper over `index.php?/api/v2/*`:
//! - HTTP Basic auth with user + API key
//! - JSON request/response bodies, upstream status and text embedded in errors
//! - `limit`/`offset` pagination for list endpoints (bare array or envelope)
//! - Result uploads chunked to the 250-entry API limit, retried per batch
//! - Attachments sent as multipart form data

use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::TestRailConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    Attachment, NewRun, PublicLink, Run, Section, TESTRAIL_PAGE_LIMIT, TestCase, TestResult,
};
use crate::services::retry::{RetryPolicy, robust_api_call};

/// Operations the publishers need from TestRail.
///
/// Implemented by [`TestRailClient`]; tests drive publishers with an
/// in-memory implementation.
#[async_trait]
pub trait TestRailBackend: Send + Sync {
    /// All sections of the configured project/suite.
    async fn get_sections(&self) -> AppResult<Vec<Section>>;

    /// Create a section named `name` at the suite root.
    async fn add_section(&self, name: &str) -> AppResult<Section>;

    /// All cases of the configured project/suite, optionally in one section.
    async fn get_cases(&self, section_id: Option<i64>) -> AppResult<Vec<TestCase>>;

    /// Create a case titled `title` in `section_id`.
    async fn add_case(&self, section_id: i64, title: &str) -> AppResult<TestCase>;

    /// Create a run.
    async fn add_run(&self, run: &NewRun) -> AppResult<Run>;

    /// Upload one batch of at most [`TESTRAIL_PAGE_LIMIT`] results in a
    /// single request, returning how many entries TestRail accepted.
    /// Use [`upload_results`] for larger sets.
    async fn add_results_for_cases(
        &self,
        run_id: i64,
        results: &[TestResult],
    ) -> AppResult<usize>;

    /// Attach a file to a case.
    async fn add_attachment_to_case(&self, case_id: i64, path: &Path) -> AppResult<Attachment>;

    /// Close a run, making it read-only.
    async fn close_run(&self, run_id: i64) -> AppResult<Run>;

    /// Browser URL of a run.
    fn run_url(&self, run_id: i64) -> String;
}

/// Upload results in batches of [`TESTRAIL_PAGE_LIMIT`], retrying each batch
/// on its own so a failed batch never resends ones TestRail already accepted.
/// Returns the total number of accepted entries.
pub async fn upload_results<B: TestRailBackend + ?Sized>(
    backend: &B,
    run_id: i64,
    results: &[TestResult],
    retry: RetryPolicy,
) -> AppResult<usize> {
    let batches = results.len().div_ceil(TESTRAIL_PAGE_LIMIT);
    let mut uploaded = 0;
    for (i, batch) in results.chunks(TESTRAIL_PAGE_LIMIT).enumerate() {
        let description = format!("add_results_for_cases batch {}/{}", i + 1, batches);
        let accepted = robust_api_call(retry, &description, || {
            backend.add_results_for_cases(run_id, batch)
        })
        .await?;
        info!(
            "Uploaded batch {}/{} to run R{}: {} results",
            i + 1,
            batches,
            run_id,
            accepted
        );
        uploaded += accepted;
    }
    Ok(uploaded)
}

/// Paginated list responses come back either as a bare array (older
/// TestRail) or wrapped in an envelope keyed by entity name.
#[derive(serde::Deserialize)]
#[serde(untagged)]
enum Page<T> {
    Bare(Vec<T>),
    Envelope(serde_json::Map<String, serde_json::Value>),
}

/// TestRail HTTP client.
#[derive(Clone)]
pub struct TestRailClient {
    base_url: String,
    user: String,
    api_key: SecretString,
    project_id: i64,
    suite_id: Option<i64>,
    http_client: reqwest::Client,
}

impl TestRailClient {
    /// Create a client from settings.
    pub fn new(config: &TestRailConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Http(format!("Failed to build HTTP client: {}", e)))?;

        info!(
            "TestRail client initialized (host={}, project={}, suite={:?})",
            config.host, config.project_id, config.suite_id
        );

        Ok(Self {
            base_url: config.host.trim_end_matches('/').to_string(),
            user: config.user.clone(),
            api_key: config.api_key.clone(),
            project_id: config.project_id,
            suite_id: config.suite_id,
            http_client,
        })
    }

    pub fn project_id(&self) -> i64 {
        self.project_id
    }

    pub fn suite_id(&self) -> Option<i64> {
        self.suite_id
    }

    /// Full URL of an API endpoint, e.g. `get_cases/1&suite_id=2`.
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}/index.php?/api/v2/{}", self.base_url, endpoint)
    }

    /// `&suite_id=N` when a suite is configured.
    fn suite_filter(&self) -> String {
        self.suite_id
            .map(|id| format!("&suite_id={}", id))
            .unwrap_or_default()
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> AppResult<T> {
        debug!("TestRail GET {}", endpoint);
        let response = self
            .http_client
            .get(self.api_url(endpoint))
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .header("Content-Type", "application/json")
            .send()
            .await?;
        Self::decode(endpoint, response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> AppResult<T> {
        debug!("TestRail POST {}", endpoint);
        let response = self
            .http_client
            .post(self.api_url(endpoint))
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .json(body)
            .send()
            .await?;
        Self::decode(endpoint, response).await
    }

    /// Decode a JSON body, or turn a non-success status into `AppError::Api`.
    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(AppError::Api {
                status: status.as_u16(),
                body: format!("{} failed: {}", endpoint, text),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            AppError::Parse(format!("Invalid JSON from TestRail {}: {}", endpoint, e))
        })
    }

    /// Fetch every page of a list endpoint.
    ///
    /// Requests `limit=250` pages until one returns fewer than the limit.
    async fn get_paginated<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        key: &str,
    ) -> AppResult<Vec<T>> {
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let page_endpoint = format!(
                "{}&limit={}&offset={}",
                endpoint, TESTRAIL_PAGE_LIMIT, offset
            );
            let page: Page<T> = self.get(&page_endpoint).await?;
            let items: Vec<T> = match page {
                Page::Bare(items) => items,
                Page::Envelope(mut map) => match map.remove(key) {
                    Some(value) => serde_json::from_value(value)?,
                    None => {
                        return Err(AppError::Parse(format!(
                            "TestRail {} response has no '{}' field",
                            endpoint, key
                        )));
                    }
                },
            };

            let count = items.len();
            all.extend(items);
            debug!("{}: fetched {} items at offset {}", endpoint, count, offset);

            if count < TESTRAIL_PAGE_LIMIT {
                break;
            }
            offset += count;
        }

        Ok(all)
    }

    /// Fetch one run.
    pub async fn get_run(&self, run_id: i64) -> AppResult<Run> {
        self.get(&format!("get_run/{}", run_id)).await
    }

    /// Create a shareable link for a run.
    pub async fn create_public_link(&self, run_id: i64) -> AppResult<PublicLink> {
        self.post(
            &format!("create_public_link/{}", run_id),
            &serde_json::json!({}),
        )
        .await
    }
}

#[async_trait]
impl TestRailBackend for TestRailClient {
    async fn get_sections(&self) -> AppResult<Vec<Section>> {
        let endpoint = format!("get_sections/{}{}", self.project_id, self.suite_filter());
        self.get_paginated(&endpoint, "sections").await
    }

    async fn add_section(&self, name: &str) -> AppResult<Section> {
        let body = serde_json::json!({
            "suite_id": self.suite_id,
            "name": name,
        });
        let section: Section = self
            .post(&format!("add_section/{}", self.project_id), &body)
            .await?;
        info!("Created TestRail section '{}' (id={})", name, section.id);
        Ok(section)
    }

    async fn get_cases(&self, section_id: Option<i64>) -> AppResult<Vec<TestCase>> {
        let mut endpoint = format!("get_cases/{}{}", self.project_id, self.suite_filter());
        if let Some(id) = section_id {
            endpoint.push_str(&format!("&section_id={}", id));
        }
        self.get_paginated(&endpoint, "cases").await
    }

    async fn add_case(&self, section_id: i64, title: &str) -> AppResult<TestCase> {
        let body = serde_json::json!({ "title": title });
        let case: TestCase = self
            .post(&format!("add_case/{}", section_id), &body)
            .await?;
        info!(
            "Created TestRail case C{} '{}' in section {}",
            case.id, title, section_id
        );
        Ok(case)
    }

    async fn add_run(&self, run: &NewRun) -> AppResult<Run> {
        let created: Run = self
            .post(&format!("add_run/{}", self.project_id), run)
            .await?;
        info!(
            "Created TestRail run R{} '{}' with {} cases",
            created.id,
            created.name,
            run.case_ids.len()
        );
        Ok(created)
    }

    async fn add_results_for_cases(
        &self,
        run_id: i64,
        results: &[TestResult],
    ) -> AppResult<usize> {
        if results.len() > TESTRAIL_PAGE_LIMIT {
            return Err(AppError::InvalidInput(format!(
                "add_results_for_cases accepts at most {} results per request, got {}",
                TESTRAIL_PAGE_LIMIT,
                results.len()
            )));
        }
        let body = serde_json::json!({ "results": results });
        let accepted: Vec<serde_json::Value> = self
            .post(&format!("add_results_for_cases/{}", run_id), &body)
            .await?;
        Ok(accepted.len())
    }

    async fn add_attachment_to_case(&self, case_id: i64, path: &Path) -> AppResult<Attachment> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            AppError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());

        let form = Form::new().part("attachment", Part::bytes(bytes).file_name(file_name));
        let endpoint = format!("add_attachment_to_case/{}", case_id);
        debug!("TestRail POST {} (multipart)", endpoint);

        let response = self
            .http_client
            .post(self.api_url(&endpoint))
            .basic_auth(&self.user, Some(self.api_key.expose_secret()))
            .multipart(form)
            .send()
            .await?;
        Self::decode(&endpoint, response).await
    }

    async fn close_run(&self, run_id: i64) -> AppResult<Run> {
        let run: Run = self
            .post(&format!("close_run/{}", run_id), &serde_json::json!({}))
            .await?;
        info!("Closed TestRail run R{}", run_id);
        Ok(run)
    }

    fn run_url(&self, run_id: i64) -> String {
        format!("{}/index.php?/runs/view/{}", self.base_url, run_id)
    }
}
