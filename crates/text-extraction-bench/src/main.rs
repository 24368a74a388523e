//! Text extraction benchmark CLI

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use text_extraction_bench::output::{JsonResultWriter, ResultSink, load_results};
use text_extraction_bench::registry::FrameworkEntry;
use text_extraction_bench::summary::{BenchmarkSummary, summarize};
use text_extraction_bench::{
    BenchmarkConfig, BenchmarkRunner, DocumentCategory, DocumentCorpus, Error, FileType, FrameworkRegistry, Result,
};

#[derive(Parser)]
#[command(name = "text-extraction-bench")]
#[command(about = "Benchmark text extraction frameworks with timeouts, retries and resource profiling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run benchmarks over a document directory
    Run {
        /// Directory of test documents
        #[arg(short, long)]
        documents: PathBuf,

        /// Configuration file (TOML or JSON); defaults to a discovered extraction-bench.toml
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frameworks to benchmark (comma-separated, default: all available)
        #[arg(short = 'F', long, value_delimiter = ',')]
        frameworks: Vec<String>,

        /// Categories to benchmark (comma-separated, default: all non-empty)
        #[arg(short = 'C', long, value_delimiter = ',')]
        categories: Vec<DocumentCategory>,

        /// File types to include (comma-separated, default: all)
        #[arg(short = 'T', long, value_delimiter = ',')]
        file_types: Vec<FileType>,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of measured passes
        #[arg(short = 'i', long)]
        iterations: Option<usize>,

        /// Number of warmup passes
        #[arg(short = 'w', long)]
        warmup: Option<usize>,

        /// Seconds to idle between passes
        #[arg(long)]
        cooldown: Option<u64>,

        /// Timeout per attempt in seconds
        #[arg(short = 't', long)]
        timeout: Option<u64>,

        /// Total attempts per file
        #[arg(long)]
        max_retries: Option<u32>,

        /// Base of the exponential retry backoff, in seconds
        #[arg(long)]
        retry_backoff: Option<f64>,

        /// Resource sampling interval in milliseconds
        #[arg(long)]
        sampling_interval: Option<u64>,

        /// Worker threads for synchronous frameworks
        #[arg(long)]
        workers: Option<usize>,

        /// Abort the run on the first exhausted failure
        #[arg(long)]
        fail_fast: bool,

        /// Keep attempting files that failed repeatedly
        #[arg(long)]
        no_skip_failed: bool,

        /// Save extracted text with each result
        #[arg(long)]
        save_text: bool,

        /// Save the raw resource time series with each result
        #[arg(long)]
        save_samples: bool,

        /// Keep only the first line of error messages
        #[arg(long)]
        brief_errors: bool,

        /// Disable progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Summarize a results file from a previous run
    Summarize {
        /// Path to benchmark_results.json
        results: PathBuf,

        /// Print summaries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known frameworks and whether they can run here
    ListFrameworks {
        #[arg(long)]
        json: bool,
    },

    /// List document categories
    ListCategories {
        #[arg(long)]
        json: bool,
    },

    /// List recognised file types
    ListFileTypes,
}

fn print_summaries(summaries: &[BenchmarkSummary]) {
    if summaries.is_empty() {
        println!("\nNo outcomes recorded");
        return;
    }

    println!("\nSummary:");
    for summary in summaries {
        println!("  {}", summary);
    }
}

async fn discover_frameworks() -> Result<FrameworkRegistry> {
    tokio::task::spawn_blocking(FrameworkRegistry::discover)
        .await
        .map_err(|e| Error::Benchmark(format!("Framework discovery failed: {}", e)))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            documents,
            config,
            frameworks,
            categories,
            file_types,
            output,
            iterations,
            warmup,
            cooldown,
            timeout,
            max_retries,
            retry_backoff,
            sampling_interval,
            workers,
            fail_fast,
            no_skip_failed,
            save_text,
            save_samples,
            brief_errors,
            no_progress,
        } => {
            let mut config = match config {
                Some(path) => BenchmarkConfig::from_file(path)?,
                None => BenchmarkConfig::discover()?.unwrap_or_default(),
            };

            if !frameworks.is_empty() {
                config.frameworks = frameworks;
            }
            if !categories.is_empty() {
                config.categories = categories;
            }
            if !file_types.is_empty() {
                config.file_types = Some(file_types);
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            config.iterations = iterations.unwrap_or(config.iterations);
            config.warmup_runs = warmup.unwrap_or(config.warmup_runs);
            config.cooldown_seconds = cooldown.unwrap_or(config.cooldown_seconds);
            config.timeout_seconds = timeout.unwrap_or(config.timeout_seconds);
            config.max_retries = max_retries.unwrap_or(config.max_retries);
            config.retry_backoff = retry_backoff.unwrap_or(config.retry_backoff);
            config.sampling_interval_ms = sampling_interval.unwrap_or(config.sampling_interval_ms);
            config.worker_threads = workers.unwrap_or(config.worker_threads);
            config.continue_on_error &= !fail_fast;
            config.skip_on_repeated_failure &= !no_skip_failed;
            config.save_extracted_text |= save_text;
            config.save_resource_samples |= save_samples;
            config.detailed_errors &= !brief_errors;
            config.show_progress &= !no_progress;

            config.validate()?;

            let registry = discover_frameworks().await?;
            for (name, entry) in registry.entries() {
                match entry {
                    FrameworkEntry::Available(_) => eprintln!("[framework] ✓ {} (available)", name),
                    FrameworkEntry::Unavailable { reason } => eprintln!("[framework] ✗ {} ({})", name, reason),
                }
            }

            let corpus = DocumentCorpus::from_dir(&documents)?;
            println!("Loaded {} document(s) from {}", corpus.len(), corpus.root().display());
            if corpus.is_empty() {
                println!("No documents to benchmark");
                return Ok(());
            }
            for (category, count) in corpus.category_counts() {
                if count > 0 {
                    println!("  {:<16} {}", category.as_str(), count);
                }
            }

            let writer = JsonResultWriter::new(&config.output_dir, config.save_extracted_text);
            let mut runner = BenchmarkRunner::new(config, registry)?.with_sink(writer.clone());

            let token = runner.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, stopping benchmark");
                    token.cancel();
                }
            });

            match runner.run(&corpus).await {
                Ok(results) => {
                    print_summaries(&summarize(&results));
                    println!("\nResults written to: {}", writer.results_path().display());
                    Ok(())
                }
                Err(e) if e.has_partial_results() => {
                    let partial = runner.results();
                    if !partial.is_empty() {
                        writer.persist(partial)?;
                        println!("\nPartial results written to: {}", writer.results_path().display());
                    }
                    print_summaries(&summarize(partial));
                    Err(e)
                }
                Err(e) => Err(e),
            }
        }

        Commands::Summarize { results, json } => {
            let outcomes = load_results(&results)?;
            let summaries = summarize(&outcomes);

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                println!("Loaded {} outcome(s) from {}", outcomes.len(), results.display());
                print_summaries(&summaries);
            }
            Ok(())
        }

        Commands::ListFrameworks { json } => {
            let registry = discover_frameworks().await?;

            if json {
                let entries: Vec<serde_json::Value> = registry
                    .entries()
                    .map(|(name, entry)| match entry {
                        FrameworkEntry::Available(framework) => serde_json::json!({
                            "name": name,
                            "available": true,
                            "async": framework.capability.is_async(),
                        }),
                        FrameworkEntry::Unavailable { reason } => serde_json::json!({
                            "name": name,
                            "available": false,
                            "reason": reason,
                        }),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for (name, entry) in registry.entries() {
                    match entry {
                        FrameworkEntry::Available(framework) => {
                            let mode = if framework.capability.is_async() { "async" } else { "sync" };
                            println!("✓ {} ({})", name, mode);
                        }
                        FrameworkEntry::Unavailable { reason } => println!("✗ {}: {}", name, reason),
                    }
                }
            }
            Ok(())
        }

        Commands::ListCategories { json } => {
            if json {
                let names: Vec<&str> = DocumentCategory::ALL.iter().map(|c| c.as_str()).collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for category in DocumentCategory::ALL {
                    println!("{}", category);
                }
            }
            Ok(())
        }

        Commands::ListFileTypes => {
            for file_type in FileType::ALL {
                println!("{}", file_type);
            }
            Ok(())
        }
    }
}
