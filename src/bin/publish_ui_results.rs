//! Publish Playwright UI results to TestRail.
//!
//! Usage:
//!   publish-ui-results [junit-path] [--close] [--output <path>] [--no-videos]
//!
//! Defaults: `playwright-report/results.xml`, summary written to
//! `testrail_output.json`.

use std::env;
use std::path::{Path, PathBuf};

use tracing::{error, info};

use screening_ci::config::{Config, defaults};
use screening_ci::error::{AppError, AppResult};
use screening_ci::logging::init_tracing;
use screening_ci::services::publisher::write_summary;
use screening_ci::services::{PublishOptions, ResultPublisher, TestRailClient, parse_junit_file};

struct Args {
    junit_path: PathBuf,
    output_path: PathBuf,
    close_run: bool,
    attach_videos: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let parsed = match parse_args(&args[1..]) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = run(parsed).await {
        error!("Publishing failed: {}", e);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: publish-ui-results [junit-path] [--close] [--output <path>] [--no-videos]");
    println!();
    println!("  junit-path     JUnit XML report (default: {})", defaults::JUNIT_PATH);
    println!("  --close        Close the TestRail run after uploading");
    println!("  --output       Summary JSON path (default: {})", defaults::OUTPUT_PATH);
    println!("  --no-videos    Skip attaching failure videos");
}

fn parse_args(args: &[String]) -> AppResult<Args> {
    let mut parsed = Args {
        junit_path: PathBuf::from(defaults::JUNIT_PATH),
        output_path: PathBuf::from(defaults::OUTPUT_PATH),
        close_run: false,
        attach_videos: true,
    };
    let mut positional = 0;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--close" => parsed.close_run = true,
            "--no-videos" => parsed.attach_videos = false,
            "--output" | "-o" => {
                i += 1;
                let value = args.get(i).ok_or_else(|| {
                    AppError::InvalidInput("--output requires a path".to_string())
                })?;
                parsed.output_path = PathBuf::from(value);
            }
            flag if flag.starts_with("--") => {
                return Err(AppError::InvalidInput(format!("Unknown option: {}", flag)));
            }
            value => {
                if positional > 0 {
                    return Err(AppError::InvalidInput(format!(
                        "Unexpected argument: {}",
                        value
                    )));
                }
                parsed.junit_path = PathBuf::from(value);
                positional += 1;
            }
        }
        i += 1;
    }
    Ok(parsed)
}

async fn run(args: Args) -> AppResult<()> {
    let config = Config::from_env()?;
    let client = TestRailClient::new(&config.testrail)?;
    let report = parse_junit_file(&args.junit_path).await?;

    // Attachment paths in the report are relative to the project root, one
    // level above `playwright-report/`.
    let attachment_root = args
        .junit_path
        .parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let options = PublishOptions {
        suite_id: client.suite_id(),
        close_run: args.close_run,
        attach_videos: args.attach_videos,
        attachment_root,
        ..PublishOptions::default()
    };
    let publisher = ResultPublisher::new(&client, config.github.clone(), options);
    let summary = publisher.publish(&report).await?;

    write_summary(&args.output_path, &summary).await?;
    info!(
        "Run R{}: {} passed, {} failed, {} skipped",
        summary.run_id, summary.passed, summary.failed, summary.skipped
    );
    if let Some(ref url) = summary.run_url {
        println!("{}", url);
    }
    Ok(())
}
