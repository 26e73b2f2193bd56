//! Generate markdown documentation from Playwright spec files.
//!
//! Usage:
//!   generate-test-docs [specs-dir] [output-dir] [--force]

use std::env;

use tracing::error;

use screening_ci::config::defaults;
use screening_ci::logging::init_tracing;
use screening_ci::services::DocGenerator;

fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return;
    }

    let force = args.iter().any(|a| a == "--force" || a == "-f");
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.starts_with('-'))
        .collect();
    if positional.len() > 2 {
        eprintln!("Error: too many arguments");
        print_usage();
        std::process::exit(1);
    }

    let specs_dir = positional.first().copied().unwrap_or(defaults::SPECS_DIR);
    let output_dir = positional.get(1).copied().unwrap_or(defaults::DOCS_DIR);

    match DocGenerator::new(specs_dir, output_dir).force(force).generate() {
        Ok(report) => println!(
            "{} pages generated, {} unchanged, {} removed",
            report.generated, report.skipped, report.removed
        ),
        Err(e) => {
            error!("Doc generation failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Usage: generate-test-docs [specs-dir] [output-dir] [--force]");
    println!();
    println!("  specs-dir    Directory scanned for *.spec.js (default: {})", defaults::SPECS_DIR);
    println!("  output-dir   Markdown output directory (default: {})", defaults::DOCS_DIR);
    println!("  --force      Regenerate every page, ignoring stored hashes");
}
