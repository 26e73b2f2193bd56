//! GitHub Actions context model for CI/CD metadata.

use std::env;

use serde::Serialize;

/// GitHub Actions context metadata.
/// All fields are optional so the tools also run outside CI.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitHubContext {
    /// Repository in "owner/repo" format (from GITHUB_REPOSITORY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// Workflow run ID (from GITHUB_RUN_ID)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,

    /// Branch or tag name (from GITHUB_REF_NAME)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ref_name: Option<String>,
}

impl GitHubContext {
    /// Read the context from the standard GitHub Actions variables.
    pub fn from_env() -> Self {
        let read = |name: &str| env::var(name).ok().filter(|v| !v.is_empty());
        GitHubContext {
            repository: read("GITHUB_REPOSITORY"),
            run_id: read("GITHUB_RUN_ID").and_then(|v| v.parse().ok()),
            ref_name: read("GITHUB_REF_NAME"),
        }
    }

    /// Link to the workflow run, when repository and run ID are known.
    pub fn run_url(&self) -> Option<String> {
        match (&self.repository, self.run_id) {
            (Some(repo), Some(run_id)) => Some(format!(
                "https://github.com/{}/actions/runs/{}",
                repo, run_id
            )),
            _ => None,
        }
    }

    /// Human-readable run name suffix, e.g. `main #1234`.
    pub fn run_label(&self) -> Option<String> {
        match (&self.ref_name, self.run_id) {
            (Some(r), Some(id)) => Some(format!("{} #{}", r, id)),
            (Some(r), None) => Some(r.clone()),
            (None, Some(id)) => Some(format!("#{}", id)),
            (None, None) => None,
        }
    }
}
