//! TestRail integration CLI.
//!
//! Usage:
//!   testrail-integration generate-mapping <specs-dir> [mapping-path]
//!   testrail-integration create-run [name]
//!   testrail-integration upload-results <junit-path> <run-id> [mapping-path]
//!   testrail-integration public-link <run-id>
//!   testrail-integration close-run <run-id>

use std::env;
use std::path::Path;

use tracing::{error, info};

use screening_ci::config::{Config, defaults};
use screening_ci::error::{AppError, AppResult};
use screening_ci::logging::init_tracing;
use screening_ci::services::mapping::{
    create_run_from_mapping, generate_mapping, read_mapping, upload_with_mapping, write_mapping,
};
use screening_ci::services::similarity::DEFAULT_THRESHOLD;
use screening_ci::services::spec_scanner::scan_spec_dir;
use screening_ci::services::{
    RetryPolicy, TestRailBackend, TestRailClient, parse_junit_file, robust_api_call,
};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = args[1].as_str();
    if matches!(command, "help" | "--help" | "-h") {
        print_usage();
        return;
    }

    if let Err(e) = run(command, &args[2..]).await {
        error!("{} failed: {}", command, e);
        std::process::exit(1);
    }
}

async fn run(command: &str, args: &[String]) -> AppResult<()> {
    match command {
        "generate-mapping" => {
            let specs_dir = required_arg(args, 0, "<specs-dir>")?;
            let mapping_path = args.get(1).map_or(defaults::MAPPING_PATH, String::as_str);
            generate(Path::new(specs_dir), Path::new(mapping_path)).await
        }
        "create-run" => create_run(args.first().map(String::as_str)).await,
        "upload-results" => {
            let junit_path = required_arg(args, 0, "<junit-path>")?;
            let run_id = parse_run_id(required_arg(args, 1, "<run-id>")?)?;
            let mapping_path = args.get(2).map_or(defaults::MAPPING_PATH, String::as_str);
            upload(Path::new(junit_path), run_id, Path::new(mapping_path)).await
        }
        "public-link" => {
            let run_id = parse_run_id(required_arg(args, 0, "<run-id>")?)?;
            let client = connect()?;
            let link = robust_api_call(RetryPolicy::default(), "create_public_link", || {
                client.create_public_link(run_id)
            })
            .await?;
            println!("{}", link.url);
            Ok(())
        }
        "close-run" => {
            let run_id = parse_run_id(required_arg(args, 0, "<run-id>")?)?;
            let client = connect()?;
            robust_api_call(RetryPolicy::default(), "close_run", || {
                client.close_run(run_id)
            })
            .await?;
            println!("Closed run R{}", run_id);
            Ok(())
        }
        _ => {
            print_usage();
            Err(AppError::InvalidInput(format!("Unknown command: {}", command)))
        }
    }
}

fn print_usage() {
    println!("TestRail integration");
    println!();
    println!("Usage:");
    println!("  testrail-integration generate-mapping <specs-dir> [mapping-path]");
    println!("  testrail-integration create-run [name]");
    println!("  testrail-integration upload-results <junit-path> <run-id> [mapping-path]");
    println!("  testrail-integration public-link <run-id>");
    println!("  testrail-integration close-run <run-id>");
    println!();
    println!("Environment:");
    println!("  TESTRAIL_HOST, TESTRAIL_USER, TESTRAIL_API_KEY, TESTRAIL_PROJECT_ID (required)");
    println!("  TESTRAIL_SUITE_ID (optional)");
}

fn required_arg<'a>(args: &'a [String], index: usize, name: &str) -> AppResult<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| AppError::InvalidInput(format!("Missing argument {}", name)))
}

fn parse_run_id(value: &str) -> AppResult<i64> {
    value
        .trim()
        .trim_start_matches('R')
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid run ID: {}", value)))
}

fn connect() -> AppResult<TestRailClient> {
    let config = Config::from_env()?;
    TestRailClient::new(&config.testrail)
}

async fn generate(specs_dir: &Path, mapping_path: &Path) -> AppResult<()> {
    let client = connect()?;
    let specs = scan_spec_dir(specs_dir)?;
    let specs: Vec<_> = specs.into_iter().map(|(info, _)| info).collect();
    info!("Scanned {} spec files under {}", specs.len(), specs_dir.display());

    let cases = robust_api_call(RetryPolicy::default(), "get_cases", || {
        client.get_cases(None)
    })
    .await?;

    let mapping = generate_mapping(&specs, &cases, DEFAULT_THRESHOLD);
    write_mapping(mapping_path, &mapping).await
}

async fn create_run(name: Option<&str>) -> AppResult<()> {
    let config = Config::from_env()?;
    let client = TestRailClient::new(&config.testrail)?;
    let mapping = read_mapping(Path::new(defaults::MAPPING_PATH)).await?;

    let name = match name {
        Some(n) => n.to_string(),
        None => match config.github.run_label() {
            Some(label) => format!("Automated run - {}", label),
            None => format!("Automated run - {}", mapping.generated_at.format("%Y-%m-%d")),
        },
    };

    let run = create_run_from_mapping(
        &client,
        &mapping,
        client.suite_id(),
        &name,
        RetryPolicy::default(),
    )
    .await?;
    let url = run.url.clone().unwrap_or_else(|| client.run_url(run.id));
    info!("Created run R{} '{}': {}", run.id, run.name, url);
    println!("{}", run.id);
    Ok(())
}

async fn upload(junit_path: &Path, run_id: i64, mapping_path: &Path) -> AppResult<()> {
    let client = connect()?;
    let mapping = read_mapping(mapping_path).await?;
    let report = parse_junit_file(junit_path).await?;

    let outcome =
        upload_with_mapping(&client, &report, run_id, &mapping, RetryPolicy::default()).await?;
    println!(
        "Uploaded {} results to R{} ({} dropped)",
        outcome.uploaded, run_id, outcome.dropped
    );
    Ok(())
}
