//! Spec-file documentation models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `test(...)` call found in a spec file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecTest {
    pub title: String,
    /// Enclosing `test.describe` titles, outermost first
    pub describe_path: Vec<String>,
    pub tags: Vec<String>,
    /// `only` / `skip` / `fixme` modifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    pub line: usize,
}

/// Everything extracted from one spec file.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpecFileInfo {
    /// Path relative to the scanned root, `/`-separated
    pub path: String,
    pub describes: Vec<String>,
    pub tests: Vec<SpecTest>,
    /// Tags from titles and `tag:` options, deduplicated
    pub tags: Vec<String>,
    /// String literals that look like API endpoints
    pub api_endpoints: Vec<String>,
    /// Arguments of `getByTestId(...)`
    pub test_ids: Vec<String>,
}

impl SpecFileInfo {
    /// File name without directories.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Per-file entry of `.test-docs-metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Hex SHA-256 of the spec file contents
    pub hash: String,
    pub test_count: usize,
}

/// Contents of `.test-docs-metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsMetadata {
    pub template_version: String,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub files: BTreeMap<String, FileMetadata>,
}
