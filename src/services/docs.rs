//! Markdown documentation generated from Playwright spec files.
//!
//! Each spec file gets one markdown page plus an entry in `index.md`. A
//! SHA-256 of every spec's contents is stored in `.test-docs-metadata.json`
//! so unchanged files are skipped on the next run. Bumping
//! [`TEMPLATE_VERSION`] (or passing `force`) regenerates everything.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::defaults;
use crate::error::{AppError, AppResult};
use crate::models::{DocsMetadata, FileMetadata, SpecFileInfo};
use crate::services::mapping::full_title;
use crate::services::spec_scanner::scan_spec_dir;

/// Version of the page layout. Changing it invalidates stored hashes.
pub const TEMPLATE_VERSION: &str = "2";

/// Rendered in place of any field the scanner could not extract.
pub const NOT_FOUND: &str = "{data not found for this field}";

/// Hex SHA-256 of file contents.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Counts from one generator run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocsReport {
    pub generated: usize,
    pub skipped: usize,
    /// Pages deleted because their spec file is gone
    pub removed: usize,
}

pub struct DocGenerator {
    specs_dir: PathBuf,
    output_dir: PathBuf,
    force: bool,
}

impl DocGenerator {
    pub fn new(specs_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        DocGenerator {
            specs_dir: specs_dir.into(),
            output_dir: output_dir.into(),
            force: false,
        }
    }

    /// Regenerate every page regardless of stored hashes.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    fn metadata_path(&self) -> PathBuf {
        self.output_dir.join(defaults::DOCS_METADATA_FILE)
    }

    /// Load stored metadata. A missing or unreadable file means "nothing
    /// generated yet".
    pub fn load_metadata(&self) -> Option<DocsMetadata> {
        let path = self.metadata_path();
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!("Ignoring corrupt {}: {}", path.display(), e);
                None
            }
        }
    }

    fn save_metadata(&self, metadata: &DocsMetadata) -> AppResult<()> {
        let json = serde_json::to_string_pretty(metadata)?;
        write_file(&self.metadata_path(), &json)
    }

    /// Scan the spec directory and write changed pages, the index and the
    /// metadata file.
    pub fn generate(&self) -> AppResult<DocsReport> {
        let scanned = scan_spec_dir(&self.specs_dir)?;
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            AppError::FileSystem(format!(
                "Failed to create {}: {}",
                self.output_dir.display(),
                e
            ))
        })?;

        let previous = self.load_metadata();
        let stale_template = previous
            .as_ref()
            .is_some_and(|m| m.template_version != TEMPLATE_VERSION);
        if stale_template {
            info!("Template version changed, regenerating all pages");
        }
        let previous_files = previous.map(|m| m.files).unwrap_or_default();

        let mut report = DocsReport::default();
        let mut files = BTreeMap::new();

        for (spec, source) in &scanned {
            let hash = content_hash(source);
            let page = self.output_dir.join(page_path(&spec.path));
            let unchanged = previous_files
                .get(&spec.path)
                .is_some_and(|m| m.hash == hash);

            if unchanged && !stale_template && !self.force && page.exists() {
                debug!("{} unchanged, skipping", spec.path);
                report.skipped += 1;
            } else {
                write_file(&page, &render_spec_page(spec))?;
                report.generated += 1;
            }

            files.insert(
                spec.path.clone(),
                FileMetadata {
                    hash,
                    test_count: spec.tests.len(),
                },
            );
        }

        for path in previous_files.keys().filter(|p| !files.contains_key(*p)) {
            let page = self.output_dir.join(page_path(path));
            match fs::remove_file(&page) {
                Ok(()) => {
                    info!("Removed page for deleted spec {}", path);
                    report.removed += 1;
                }
                Err(e) => warn!("Failed to remove {}: {}", page.display(), e),
            }
        }

        let specs: Vec<&SpecFileInfo> = scanned.iter().map(|(spec, _)| spec).collect();
        write_file(&self.output_dir.join("index.md"), &render_index(&specs))?;

        self.save_metadata(&DocsMetadata {
            template_version: TEMPLATE_VERSION.to_string(),
            generated_at: Utc::now(),
            files,
        })?;

        info!(
            "Test docs: {} generated, {} unchanged, {} removed",
            report.generated, report.skipped, report.removed
        );
        Ok(report)
    }
}

fn write_file(path: &Path, content: &str) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
        .map_err(|e| AppError::FileSystem(format!("Failed to write {}: {}", path.display(), e)))
}

/// Output page for a spec path: `a/b.spec.js` -> `a/b.md`.
pub fn page_path(spec_path: &str) -> String {
    for suffix in [".spec.js", ".spec.ts", ".spec.mjs"] {
        if let Some(stem) = spec_path.strip_suffix(suffix) {
            return format!("{}.md", stem);
        }
    }
    format!("{}.md", spec_path)
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn code_list(items: &[String]) -> String {
    if items.is_empty() {
        return format!("{}\n", NOT_FOUND);
    }
    items.iter().map(|i| format!("- `{}`\n", i)).collect()
}

/// Markdown page for one spec file.
pub fn render_spec_page(spec: &SpecFileInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}\n", spec.path);
    let _ = writeln!(out, "Source: `{}`\n", spec.path);

    out.push_str("## Describe blocks\n\n");
    if spec.describes.is_empty() {
        let _ = writeln!(out, "{}\n", NOT_FOUND);
    } else {
        for describe in &spec.describes {
            let _ = writeln!(out, "- {}", describe);
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Tests ({})\n", spec.tests.len());
    if spec.tests.is_empty() {
        let _ = writeln!(out, "{}\n", NOT_FOUND);
    } else {
        out.push_str("| Test | Tags | Modifier | Line |\n");
        out.push_str("|------|------|----------|------|\n");
        for test in &spec.tests {
            let tags = if test.tags.is_empty() {
                NOT_FOUND.to_string()
            } else {
                test.tags.join(", ")
            };
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                escape_cell(&full_title(test)),
                escape_cell(&tags),
                test.modifier.as_deref().unwrap_or("-"),
                test.line
            );
        }
        out.push('\n');
    }

    out.push_str("## Tags\n\n");
    out.push_str(&code_list(&spec.tags));
    out.push_str("\n## API endpoints\n\n");
    out.push_str(&code_list(&spec.api_endpoints));
    out.push_str("\n## Test IDs\n\n");
    out.push_str(&code_list(&spec.test_ids));
    out
}

/// `index.md` linking every page.
pub fn render_index(specs: &[&SpecFileInfo]) -> String {
    let total: usize = specs.iter().map(|s| s.tests.len()).sum();
    let mut out = String::from("# Test documentation\n\n");
    let _ = writeln!(out, "{} spec files, {} tests.\n", specs.len(), total);
    if specs.is_empty() {
        let _ = writeln!(out, "{}", NOT_FOUND);
        return out;
    }
    out.push_str("| Spec | Tests | Tags |\n");
    out.push_str("|------|-------|------|\n");
    for spec in specs {
        let tags = if spec.tags.is_empty() {
            NOT_FOUND.to_string()
        } else {
            spec.tags.join(", ")
        };
        let _ = writeln!(
            out,
            "| [{}]({}) | {} | {} |",
            spec.path,
            page_path(&spec.path),
            spec.tests.len(),
            escape_cell(&tags)
        );
    }
    out
}
