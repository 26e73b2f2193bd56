//! Domain models for the CI tooling.

pub mod docs;
pub mod github_context;
pub mod junit;
pub mod mapping;
pub mod publish_summary;
pub mod testrail;

// Re-export commonly used types
pub use docs::{DocsMetadata, FileMetadata, SpecFileInfo, SpecTest};
pub use github_context::GitHubContext;
pub use junit::{JunitReport, JunitStatus, JunitTestCase};
pub use mapping::{CaseMapping, TestCaseMapping, UnmatchedTest};
pub use publish_summary::PublishSummary;
pub use testrail::{
    Attachment, CaseStatus, NewRun, PublicLink, Run, Section, TESTRAIL_PAGE_LIMIT, TestCase,
    TestResult,
};
