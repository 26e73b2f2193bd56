//! TestRail entities: sections, cases, runs and results.

use serde::{Deserialize, Serialize};

/// Maximum number of entities TestRail returns (or accepts) per request.
pub const TESTRAIL_PAGE_LIMIT: usize = 250;

/// TestRail result status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Passed,
    Blocked,
    Untested,
    Retest,
    Failed,
}

impl CaseStatus {
    /// TestRail `status_id` for this status.
    pub fn id(&self) -> i64 {
        match self {
            Self::Passed => 1,
            Self::Blocked => 2,
            Self::Untested => 3,
            Self::Retest => 4,
            Self::Failed => 5,
        }
    }

    /// Parse a TestRail `status_id`.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(Self::Passed),
            2 => Some(Self::Blocked),
            3 => Some(Self::Untested),
            4 => Some(Self::Retest),
            5 => Some(Self::Failed),
            _ => None,
        }
    }
}

impl Serialize for CaseStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.id())
    }
}

impl<'de> Deserialize<'de> for CaseStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = i64::deserialize(deserializer)?;
        CaseStatus::from_id(id)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown status_id {}", id)))
    }
}

/// A TestRail section (one per spec source file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub suite_id: Option<i64>,
}

/// A TestRail test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub section_id: Option<i64>,
}

/// A TestRail test run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

/// Body of `add_run`.
#[derive(Debug, Clone, Serialize)]
pub struct NewRun {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suite_id: Option<i64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Always false: runs are scoped to an explicit case list.
    pub include_all: bool,
    pub case_ids: Vec<i64>,
}

impl NewRun {
    /// Create a run definition scoped to exactly `case_ids`.
    pub fn scoped(
        suite_id: Option<i64>,
        name: impl Into<String>,
        description: Option<String>,
        case_ids: Vec<i64>,
    ) -> Self {
        NewRun {
            suite_id,
            name: name.into(),
            description,
            include_all: false,
            case_ids,
        }
    }
}

/// One entry of `add_results_for_cases`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub case_id: i64,
    pub status_id: CaseStatus,
    pub comment: String,
    /// TestRail timespan, e.g. `"1m 5s"`; omitted when under one second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed: Option<String>,
}

/// Attachment created by `add_attachment_to_case`.
#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    pub attachment_id: serde_json::Value,
}

/// Response of `create_public_link`.
#[derive(Debug, Clone, Deserialize)]
pub struct PublicLink {
    pub url: String,
}

/// Format seconds as a TestRail timespan. Returns `None` below one second,
/// which TestRail rejects.
pub fn format_elapsed(seconds: f64) -> Option<String> {
    let total = seconds.round() as u64;
    if total == 0 {
        return None;
    }
    let minutes = total / 60;
    let secs = total % 60;
    Some(match (minutes, secs) {
        (0, s) => format!("{}s", s),
        (m, 0) => format!("{}m", m),
        (m, s) => format!("{}m {}s", m, s),
    })
}
