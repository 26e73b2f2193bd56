//! Persisted test ↔ TestRail case mapping (`test-case-mapping.json`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A spec test matched to a TestRail case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMapping {
    pub test_title: String,
    pub file: String,
    pub case_id: i64,
    pub case_title: String,
    pub similarity: f64,
}

impl CaseMapping {
    /// Spec file name without directories, as JUnit reports it.
    pub fn file_name(&self) -> &str {
        base_name(&self.file)
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// A spec test with no case above the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedTest {
    pub test_title: String,
    pub file: String,
    /// Best score seen, for tuning the threshold
    pub best_similarity: f64,
}

/// Contents of the mapping file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseMapping {
    pub generated_at: DateTime<Utc>,
    pub threshold: f64,
    pub mappings: Vec<CaseMapping>,
    #[serde(default)]
    pub unmatched: Vec<UnmatchedTest>,
}

impl TestCaseMapping {
    /// Index mappings by spec file name and exact test title.
    ///
    /// The same title may appear in several spec files, so the title alone
    /// does not identify a test.
    pub fn by_test(&self) -> HashMap<(&str, &str), i64> {
        self.mappings
            .iter()
            .map(|m| ((m.file_name(), m.test_title.as_str()), m.case_id))
            .collect()
    }

    /// Distinct case IDs in mapping order.
    pub fn case_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for m in &self.mappings {
            if !ids.contains(&m.case_id) {
                ids.push(m.case_id);
            }
        }
        ids
    }
}
