//! JUnit XML parsing for Playwright `results.xml`.
//!
//! Uses a streaming XML reader so attribute order, self-closing elements,
//! entities and CDATA sections are handled without pattern matching on text.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{JunitReport, JunitStatus, JunitTestCase};

/// Marker Playwright writes into `<system-out>` for each attachment.
const ATTACHMENT_PREFIX: &str = "[[ATTACHMENT|";

/// Read and parse a JUnit XML file.
pub async fn parse_junit_file(path: &Path) -> AppResult<JunitReport> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::FileSystem(format!("Failed to read {}: {}", path.display(), e))
    })?;
    let report = parse_junit_xml(&content)?;
    info!(
        "Parsed {}: {} tests ({} passed, {} failed, {} skipped)",
        path.display(),
        report.total,
        report.passed,
        report.failed,
        report.skipped
    );
    Ok(report)
}

/// Text currently being collected inside a `<testcase>`.
enum Capture {
    Failure,
    SystemOut,
}

/// Parse JUnit XML content. Test cases are returned in source order.
pub fn parse_junit_xml(content: &str) -> AppResult<JunitReport> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut saw_root = false;
    let mut suites: Vec<String> = Vec::new();
    let mut cases: Vec<JunitTestCase> = Vec::new();
    let mut current: Option<JunitTestCase> = None;
    let mut capture: Option<Capture> = None;
    let mut system_out = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"testsuites" => saw_root = true,
                b"testsuite" => {
                    saw_root = true;
                    suites.push(attribute(&e, b"name")?.unwrap_or_default());
                }
                b"testcase" => {
                    saw_root = true;
                    current = Some(start_case(&e, suites.last())?);
                }
                b"failure" | b"error" => {
                    if let Some(case) = current.as_mut() {
                        mark_failed(case, &e)?;
                        capture = Some(Capture::Failure);
                    }
                }
                b"skipped" => {
                    if let Some(case) = current.as_mut() {
                        mark_skipped(case);
                    }
                }
                b"system-out" => {
                    if current.is_some() {
                        capture = Some(Capture::SystemOut);
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"testsuites" | b"testsuite" => saw_root = true,
                b"testcase" => {
                    saw_root = true;
                    cases.push(start_case(&e, suites.last())?);
                }
                b"failure" | b"error" => {
                    if let Some(case) = current.as_mut() {
                        mark_failed(case, &e)?;
                    }
                }
                b"skipped" => {
                    if let Some(case) = current.as_mut() {
                        mark_skipped(case);
                    }
                }
                _ => {}
            },
            Event::Text(t) => {
                let text = t.unescape()?;
                collect_text(current.as_mut(), &capture, &mut system_out, &text);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                collect_text(current.as_mut(), &capture, &mut system_out, &text);
            }
            Event::End(e) => match e.name().as_ref() {
                b"testsuite" => {
                    suites.pop();
                }
                b"testcase" => {
                    if let Some(mut case) = current.take() {
                        case.attachments = parse_attachments(&system_out);
                        cases.push(case);
                    }
                    system_out.clear();
                    capture = None;
                }
                b"failure" | b"error" | b"system-out" => capture = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(AppError::Parse(
            "No <testsuites>, <testsuite> or <testcase> element found".to_string(),
        ));
    }

    Ok(JunitReport::from_cases(cases))
}

fn attribute(e: &BytesStart<'_>, name: &[u8]) -> AppResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn start_case(e: &BytesStart<'_>, suite: Option<&String>) -> AppResult<JunitTestCase> {
    let name = attribute(e, b"name")?.unwrap_or_default();
    let classname = attribute(e, b"classname")?.unwrap_or_default();
    let file = attribute(e, b"file")?
        .or_else(|| suite.filter(|s| !s.is_empty()).cloned())
        .unwrap_or_else(|| classname.clone());
    let time = match attribute(e, b"time")? {
        Some(t) => t.trim().parse::<f64>().unwrap_or_else(|_| {
            warn!("Invalid time '{}' on testcase '{}', using 0", t, name);
            0.0
        }),
        None => 0.0,
    };

    Ok(JunitTestCase {
        name,
        classname,
        file,
        time,
        status: JunitStatus::Passed,
        failure_message: None,
        attachments: Vec::new(),
    })
}

fn mark_failed(case: &mut JunitTestCase, e: &BytesStart<'_>) -> AppResult<()> {
    case.status = JunitStatus::Failed;
    if case.failure_message.is_none() {
        case.failure_message = attribute(e, b"message")?.filter(|m| !m.is_empty());
    }
    Ok(())
}

/// A failure outranks a skip marker on the same test.
fn mark_skipped(case: &mut JunitTestCase) {
    if case.status != JunitStatus::Failed {
        case.status = JunitStatus::Skipped;
    }
}

fn collect_text(
    case: Option<&mut JunitTestCase>,
    capture: &Option<Capture>,
    system_out: &mut String,
    text: &str,
) {
    match (capture, case) {
        (Some(Capture::Failure), Some(case)) => {
            if case.failure_message.is_none() {
                case.failure_message = Some(text.to_string());
            }
        }
        (Some(Capture::SystemOut), Some(_)) => {
            system_out.push_str(text);
            system_out.push('\n');
        }
        _ => {}
    }
}

/// Extract paths from `[[ATTACHMENT|path]]` markers.
pub fn parse_attachments(system_out: &str) -> Vec<String> {
    let mut paths = Vec::new();
    let mut rest = system_out;
    while let Some(start) = rest.find(ATTACHMENT_PREFIX) {
        let after = &rest[start + ATTACHMENT_PREFIX.len()..];
        match after.find("]]") {
            Some(end) => {
                let path = after[..end].trim();
                if !path.is_empty() {
                    paths.push(path.to_string());
                }
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    paths
}
