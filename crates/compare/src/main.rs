use anyhow::{Context, Result};
use burst_core::{
    compare_runs, load_snapshot, Comparison, MetricDelta, ResultStore, RunSnapshot,
    DEFAULT_RESULTS_DIR,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "compare")]
#[command(about = "Compare two webhook burst test result files")]
#[command(
    after_help = "Example:\n  compare webhook_test_20250105_143000.json webhook_test_20250105_150000.json"
)]
struct Args {
    /// Earlier (baseline) result file
    file1: PathBuf,

    /// Later result file
    file2: PathBuf,

    /// Directory searched when a relative path does not exist as given
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let store = ResultStore::new(args.results_dir.clone());

    let first = load_snapshot(&store, &args.file1)
        .with_context(|| format!("Failed to load {:?}", args.file1))?;
    let second = load_snapshot(&store, &args.file2)
        .with_context(|| format!("Failed to load {:?}", args.file2))?;
    debug!(
        first_batches = first.batches.len(),
        second_batches = second.batches.len(),
        "loaded result files"
    );

    let comparison = compare_runs(&first, &second);
    print_report(&args, &first, &second, &comparison);

    Ok(())
}

fn print_report(args: &Args, first: &RunSnapshot, second: &RunSnapshot, comparison: &Comparison) {
    println!("\n{}", "=".repeat(60));
    println!("Webhook Test Results Comparison");
    println!("{}", "=".repeat(60));

    for (label, path, run) in [("File 1", &args.file1, first), ("File 2", &args.file2, second)] {
        println!("\n{label}: {}", path.display());
        println!("  URL: {}", or_na(&run.target_identifier));
        println!("  Timestamp: {}", or_na(&run.run_timestamp));
    }

    println!("\n{}", "=".repeat(60));
    println!("OVERALL COMPARISON");
    println!("{}", "=".repeat(60));
    for delta in &comparison.overall {
        print_delta(delta, "");
    }

    println!("\n{}", "=".repeat(60));
    println!("BATCH-BY-BATCH COMPARISON");
    println!("{}", "=".repeat(60));
    for batch in &comparison.batches {
        println!("\nBatch Size: {} requests", batch.requested_size);
        for delta in &batch.deltas {
            print_delta(delta, "  ");
        }
    }
    for skipped in &comparison.skipped {
        println!(
            "\nBatch #{} skipped: size {} vs {}",
            skipped.position + 1,
            skipped.first_size,
            skipped.second_size
        );
    }

    println!("\n{}", "=".repeat(60));
}

fn print_delta(delta: &MetricDelta, indent: &str) {
    let metric = delta.metric;
    let unit = metric.unit();
    let precision = if unit == "s" { 4 } else if unit.is_empty() { 0 } else { 2 };

    println!("\n{indent}{}:", metric.label());
    println!("{indent}  File 1: {:.*}{unit}", precision, delta.first);
    println!("{indent}  File 2: {:.*}{unit}", precision, delta.second);

    if let Some(favorable) = delta.favorable() {
        let marker = if favorable { "better" } else { "worse" };
        println!(
            "{indent}  Difference: {:+.*}{unit} ({marker})",
            precision, delta.difference
        );
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}
