//! Application configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use secrecy::SecretString;

use crate::models::GitHubContext;

/// Default values used when optional variables are unset.
pub mod defaults {
    pub const REQUEST_TIMEOUT_SECS: u64 = 30;
    pub const CONNECT_TIMEOUT_SECS: u64 = 10;
    pub const JUNIT_PATH: &str = "playwright-report/results.xml";
    pub const MAPPING_PATH: &str = "test-case-mapping.json";
    pub const DOCS_METADATA_FILE: &str = ".test-docs-metadata.json";
    pub const OUTPUT_PATH: &str = "testrail_output.json";
    pub const SPECS_DIR: &str = "tests";
    pub const DOCS_DIR: &str = "docs/tests";
}

/// TestRail connection settings.
#[derive(Debug, Clone)]
pub struct TestRailConfig {
    /// Base URL, e.g. `https://example.testrail.io`
    pub host: String,
    /// Account email used for Basic auth
    pub user: String,
    /// API key used as the Basic auth password
    pub api_key: SecretString,
    /// Project that owns sections, cases and runs
    pub project_id: i64,
    /// Suite within the project (required for multi-suite projects)
    pub suite_id: Option<i64>,
    /// Total request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TestRail settings
    pub testrail: TestRailConfig,
    /// CI metadata used to label runs
    pub github: GitHubContext,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `TESTRAIL_HOST`: TestRail base URL - REQUIRED
    /// - `TESTRAIL_USER`: TestRail user email - REQUIRED
    /// - `TESTRAIL_API_KEY`: TestRail API key - REQUIRED
    /// - `TESTRAIL_PROJECT_ID`: Numeric project ID - REQUIRED
    /// - `TESTRAIL_SUITE_ID`: Numeric suite ID (optional)
    /// - `TESTRAIL_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `GITHUB_REPOSITORY`, `GITHUB_RUN_ID`, `GITHUB_REF_NAME`:
    ///   CI metadata (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = required("TESTRAIL_HOST")?;
        let host = host.trim_end_matches('/').to_string();
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "TESTRAIL_HOST must start with http:// or https://",
            ));
        }

        let user = required("TESTRAIL_USER")?;
        let api_key = SecretString::from(required("TESTRAIL_API_KEY")?);

        let project_id = required("TESTRAIL_PROJECT_ID")?
            .trim()
            .trim_start_matches('P')
            .parse::<i64>()
            .map_err(|_| ConfigError::InvalidValue("TESTRAIL_PROJECT_ID must be a number"))?;

        let suite_id = match optional("TESTRAIL_SUITE_ID") {
            Some(s) => Some(
                s.trim()
                    .trim_start_matches('S')
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidValue("TESTRAIL_SUITE_ID must be a number"))?,
            ),
            None => None,
        };

        let request_timeout = optional("TESTRAIL_TIMEOUT_SECS")
            .unwrap_or_else(|| defaults::REQUEST_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidValue("TESTRAIL_TIMEOUT_SECS must be a valid number"))?;

        Ok(Config {
            testrail: TestRailConfig {
                host,
                user,
                api_key,
                project_id,
                suite_id,
                request_timeout: Duration::from_secs(request_timeout),
                connect_timeout: Duration::from_secs(defaults::CONNECT_TIMEOUT_SECS),
            },
            github: GitHubContext::from_env(),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::MissingEnvVar(name))
}

/// Read a variable, treating empty values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),
}
