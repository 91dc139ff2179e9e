use anyhow::{Context, Result};
use burst_core::{
    build_payload, BatchDispatcher, BatchPlan, BatchResult, Config, HttpSessionFactory,
    MockSessionFactory, RequestExecutor, ResultStore, RunOrchestrator, RunResult, SessionFactory,
};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "runner")]
#[command(about = "Webhook burst test - fires escalating batches of parallel requests")]
struct Args {
    /// Webhook URL (prompted for when omitted)
    #[arg(long)]
    url: Option<String>,

    /// Skip the interactive confirmation
    #[arg(long, short = 'y')]
    yes: bool,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Submission mode: http or mock
    #[arg(long, default_value = "http")]
    mode: String,

    /// Result file name inside the results directory
    #[arg(long)]
    output: Option<String>,

    /// Results directory (overrides config)
    #[arg(long)]
    results_dir: Option<PathBuf>,

    /// Only print the batch plan without running
    #[arg(long)]
    plan_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(dir) = args.results_dir.clone() {
        config.output.results_dir = dir;
    }

    let plan = BatchPlan::from_config(&config.plan);
    if plan.is_empty() {
        anyhow::bail!("Batch plan is empty: plan.batch_sizes must list at least one size");
    }

    print_banner(&plan)?;
    if args.plan_only {
        print_plan(&plan);
        return Ok(());
    }

    let url = match args.url.as_deref().or(config.target.url.as_deref()) {
        Some(raw) => {
            let url = validate_url(raw)?;
            if !args.yes && !confirm(&url)? {
                anyhow::bail!("Aborted: URL not confirmed");
            }
            url
        }
        None => prompt_url(args.yes)?,
    };

    let sessions = session_factory(&args.mode)?;
    info!("Using {} sessions", sessions.name());

    let executor = RequestExecutor::new(url, config.target.timeout());
    let orchestrator =
        RunOrchestrator::new(BatchDispatcher::new(sessions.clone(), executor), plan);

    println!("\n{}", "=".repeat(60));
    println!("Starting performance test...");
    println!("Batch sizes: {:?}", orchestrator.plan().sizes());
    println!("{}", "=".repeat(60));

    let run = orchestrator.run_observed(|_, batch| print_batch(batch));
    let result = tokio::select! {
        result = run => result.context("Error during testing")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Test interrupted by user; in-flight requests are abandoned, nothing is saved");
            anyhow::bail!("Test interrupted by user");
        }
    };

    print_summary(&result);

    if !should_persist(sessions.name()) {
        println!("\nMock run: results are not saved.");
        return Ok(());
    }

    let store = ResultStore::new(config.output.results_dir.clone());
    let path = store
        .save(&result, args.output.as_deref())
        .context("Failed to save results")?;

    println!("\nTest completed successfully!");
    println!("Results saved to: {}", path.display());
    println!(
        "Compare with an earlier run: compare <earlier.json> {}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    );

    Ok(())
}

fn session_factory(mode: &str) -> Result<Arc<dyn SessionFactory>> {
    match mode {
        "http" => Ok(Arc::new(HttpSessionFactory::new())),
        "mock" => Ok(Arc::new(MockSessionFactory::accepting(Duration::from_millis(5)))),
        _ => anyhow::bail!("Invalid mode: {}, must be 'http' or 'mock'", mode),
    }
}

/// Mock runs never reach the target, so they stay out of the results directory.
fn should_persist(session_kind: &str) -> bool {
    session_kind != "mock"
}

fn validate_url(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        anyhow::bail!("URL cannot be empty");
    }
    let url = url::Url::parse(raw).with_context(|| format!("Invalid URL: {raw}"))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("URL must start with http:// or https:// (got {raw})");
    }
    if url.host_str().is_none() {
        anyhow::bail!("URL must include a host (got {raw})");
    }

    if let Some((base, _)) = raw.rsplit_once("/chat") {
        println!("\nNote: URL contains '/chat' path");
        println!("   If you get 404 errors, try the base URL without '/chat'");
        println!("   Base URL would be: {base}");
    }

    Ok(raw.to_string())
}

fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    let read = io::stdin().lock().read_line(&mut line)?;
    if read == 0 {
        anyhow::bail!("stdin closed before input was given");
    }
    Ok(line.trim().to_string())
}

fn confirm(url: &str) -> Result<bool> {
    println!("\nWebhook URL: {url}");
    let answer = read_line("Is this correct? (y/n): ")?.to_lowercase();
    Ok(matches!(answer.as_str(), "y" | "yes" | ""))
}

fn prompt_url(skip_confirm: bool) -> Result<String> {
    loop {
        let raw = read_line("\nPlease paste your webhook URL: ")?;
        let url = match validate_url(&raw) {
            Ok(url) => url,
            Err(e) => {
                println!("Error: {e}");
                println!("Example: http://localhost:5678/webhook/abc123");
                continue;
            }
        };

        if skip_confirm || confirm(&url)? {
            return Ok(url);
        }
        println!("Please enter the URL again.");
    }
}

fn print_banner(plan: &BatchPlan) -> Result<()> {
    println!("\n{}", "=".repeat(60));
    println!("Webhook Performance Test Tool");
    println!("{}", "=".repeat(60));
    println!("\nThis tool tests your webhook with parallel requests.");
    println!("Batches of {:?} requests are sent in order.", plan.sizes());
    println!("\nPayload format:");
    println!("{}", serde_json::to_string_pretty(&build_payload("<unique-id>"))?);
    println!("\n{}", "-".repeat(60));
    Ok(())
}

fn print_plan(plan: &BatchPlan) {
    println!("\n=== Batch Plan ===");
    println!("Total requests: {}", plan.total_requests());
    println!("Pause between batches: {}ms", plan.pause().as_millis());
    println!();

    for (idx, size) in plan.sizes().iter().enumerate() {
        println!("Batch {}: {} parallel requests", idx + 1, size);
    }
    println!();
}

fn print_batch(batch: &BatchResult) {
    println!("\n{}", "=".repeat(60));
    println!("Batch of {} parallel requests", batch.requested_size);
    println!("{}", "=".repeat(60));
    println!("  Total Time: {:.4} seconds", batch.total_duration);
    println!("  Requests/Second: {:.2}", batch.requests_per_second);
    println!("  Successful: {}/{}", batch.successful_count, batch.requested_size);
    println!("  Failed: {}/{}", batch.failed_count, batch.requested_size);
    println!("  Success Rate: {:.2}%", batch.success_rate_percent);

    if let Some(hint) = batch.failure_hint() {
        println!("\n  Warning: {hint}");
    }

    println!("\nIndividual Request Times:");
    println!("  Min: {:.4}s", batch.stats.min);
    println!("  Max: {:.4}s", batch.stats.max);
    println!("  Avg: {:.4}s", batch.stats.mean);
    println!("  Median: {:.4}s", batch.stats.median);
}

fn print_summary(result: &RunResult) {
    let overall = &result.overall;
    println!("\n{}", "#".repeat(60));
    println!("# OVERALL TEST SUMMARY");
    println!("# URL: {}", result.target_identifier);
    println!("# Timestamp: {}", result.run_timestamp.to_rfc3339());
    println!("{}", "#".repeat(60));
    println!("Total Requests: {}", overall.total_requests);
    println!("Successful: {}", overall.total_successful);
    println!("Failed: {}", overall.total_failed);
    println!("Success Rate: {:.2}%", overall.overall_success_rate_percent);
    println!("Total Test Duration: {:.4} seconds", overall.total_duration);
    println!(
        "Overall Throughput: {:.2} requests/second",
        overall.overall_requests_per_second
    );
    println!("\nIndividual Request Performance:");
    println!("  Min: {:.4}s", overall.stats.min);
    println!("  Max: {:.4}s", overall.stats.max);
    println!("  Avg: {:.4}s", overall.stats.mean);
    println!("  Median: {:.4}s", overall.stats.median);
    println!("{}", "#".repeat(60));
}
