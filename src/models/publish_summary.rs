//! Per-run summary written to `testrail_output.json` for downstream CI steps.

use serde::{Deserialize, Serialize};

/// Outcome of publishing one JUnit report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishSummary {
    pub run_id: i64,
    pub run_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Results accepted by TestRail
    pub uploaded: usize,
    /// Executed tests that could not be mapped to a case
    pub dropped: usize,
    /// Videos attached to cases
    #[serde(default)]
    pub attachments: usize,
    #[serde(default)]
    pub closed: bool,
}
