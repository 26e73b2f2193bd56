//! e2e CI tooling library.
//!
//! Publishes Playwright JUnit results to TestRail, maps spec tests to
//! TestRail cases, polls REST state and generates markdown docs from spec
//! files. The binaries under `src/bin` and `src/main.rs` are thin wrappers.

pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
