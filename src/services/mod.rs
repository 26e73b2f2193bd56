//! CI services: TestRail access, report parsing, publishing, polling and docs.

pub mod docs;
pub mod junit;
pub mod mapping;
pub mod polling;
pub mod publisher;
pub mod retry;
pub mod similarity;
pub mod spec_scanner;
pub mod testrail;

pub use docs::{DocGenerator, DocsReport};
pub use junit::{parse_junit_file, parse_junit_xml};
pub use polling::{
    PollCondition, PollOptions, PollRefresh, poll_condition, poll_for_flag, poll_until,
};
pub use publisher::{PublishOptions, ResultPublisher};
pub use retry::{RetryPolicy, robust_api_call};
pub use similarity::calculate_similarity;
pub use testrail::{TestRailBackend, TestRailClient, upload_results};
