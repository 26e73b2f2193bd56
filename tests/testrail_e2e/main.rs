//! TestRail end-to-end suite.
//!
//! Drives the real HTTP client, publisher, mapping upload and polling helpers
//! against an in-process wiremock server standing in for TestRail.
//!
//! Run with: cargo test --test testrail_e2e

mod mock_testrail;

mod test_client;
mod test_mapping_upload;
mod test_polling;
