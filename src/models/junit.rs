//! JUnit report model produced by the Playwright junit reporter.

use serde::{Deserialize, Serialize};

use super::testrail::CaseStatus;

/// Outcome of a single `<testcase>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JunitStatus {
    Passed,
    Failed,
    Skipped,
}

impl JunitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    /// Whether the test actually ran.
    pub fn is_executed(&self) -> bool {
        !matches!(self, Self::Skipped)
    }

    /// TestRail status for an executed test.
    pub fn to_case_status(&self) -> CaseStatus {
        match self {
            Self::Passed => CaseStatus::Passed,
            Self::Failed => CaseStatus::Failed,
            Self::Skipped => CaseStatus::Untested,
        }
    }
}

impl std::fmt::Display for JunitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One `<testcase>` element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JunitTestCase {
    /// Test title (`name` attribute)
    pub name: String,
    /// `classname` attribute; Playwright writes the spec file path here
    pub classname: String,
    /// Source file: `file` attribute, else the enclosing suite name, else classname
    pub file: String,
    /// Duration in seconds
    pub time: f64,
    pub status: JunitStatus,
    /// `message` attribute or text of `<failure>`/`<error>`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    /// Paths from `[[ATTACHMENT|path]]` markers in `<system-out>`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<String>,
}

impl JunitTestCase {
    /// File name without directories, used as the TestRail section name.
    pub fn file_name(&self) -> &str {
        let path = self.file.as_str();
        path.rsplit(['/', '\\']).next().unwrap_or(path)
    }

    /// Attached video recordings.
    pub fn videos(&self) -> impl Iterator<Item = &str> {
        self.attachments
            .iter()
            .map(String::as_str)
            .filter(|p| p.ends_with(".webm") || p.ends_with(".mp4"))
    }
}

/// Parsed JUnit report with summary counts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JunitReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Test cases in source order
    pub test_cases: Vec<JunitTestCase>,
}

impl JunitReport {
    /// Build a report and compute the counts from its test cases.
    pub fn from_cases(test_cases: Vec<JunitTestCase>) -> Self {
        let count = |s: JunitStatus| test_cases.iter().filter(|t| t.status == s).count();
        JunitReport {
            total: test_cases.len(),
            passed: count(JunitStatus::Passed),
            failed: count(JunitStatus::Failed),
            skipped: count(JunitStatus::Skipped),
            test_cases,
        }
    }

    /// Tests that ran (passed or failed).
    pub fn executed(&self) -> impl Iterator<Item = &JunitTestCase> {
        self.test_cases.iter().filter(|t| t.status.is_executed())
    }
}
