mod cache;
mod config;
mod metrics;
mod pipeline;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extract::{CaseRecord, OllamaClient};
use ingest::{FileReader, case_id_from_path};
use qa::CaseAnswerer;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use synthesis::CaseSummarizer;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::cache::{CachingClient, ResponseCache};
use crate::config::AppConfig;
use crate::metrics::RunMetrics;
use crate::pipeline::Pipeline;

#[derive(Debug, Parser)]
#[command(name = "casegen", version, about = "Turn court judgments into structured case records and training data")]
struct Cli {
    /// TOML config file; defaults apply to anything it leaves out
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model id, overrides the config file
    #[arg(long, global = true)]
    model: Option<String>,

    /// Completion service base URL, overrides the config file
    #[arg(long, global = true, value_name = "URL")]
    base_url: Option<String>,

    /// Echo streamed model output to stderr
    #[arg(long, global = true, default_value_t = false)]
    stream: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract, synthesize and build Q&A/training artifacts for a file or a directory of files
    Run {
        #[arg(value_name = "PATH")]
        input: PathBuf,

        /// Output directory; a directory input gets one subdirectory per case
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Also generate per-chunk Q&A and context-prefixed instruction.json
        #[arg(long, default_value_t = false)]
        chunk_qa: bool,
    },

    /// Answer a question strictly from a case_structured.json
    Ask {
        #[arg(value_name = "CASE_JSON")]
        case: PathBuf,
        question: String,
    },

    /// One-pass headnote and IRAC summary of a short judgment
    Summarize {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        #[arg(long)]
        words: Option<usize>,
    },

    /// Download judgment PDFs linked from a listing page
    Fetch {
        #[arg(value_name = "LISTING_URL")]
        listing_url: String,

        #[arg(long, value_name = "DIR")]
        cases_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let run_id = Uuid::new_v4();
    let span = info_span!("casegen", %run_id);

    let outcome = tokio::select! {
        result = execute(cli).instrument(span) => result,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the run future cancels in-flight completion calls
            warn!(%run_id, "Interrupted, aborting run");
            return ExitCode::from(130);
        }
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!(%run_id, "{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn execute(cli: Cli) -> Result<ExitCode> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.llm.model = model;
    }
    if let Some(base_url) = cli.base_url {
        config.llm.base_url = base_url;
    }

    match cli.command {
        Command::Run { input, out, chunk_qa } => {
            if let Some(out) = out {
                config.output_dir = out;
            }
            if chunk_qa {
                config.chunk_qa.enabled = true;
            }
            run(&config, &input, cli.stream).await
        }
        Command::Ask { case, question } => ask(&config, &case, &question, cli.stream).await,
        Command::Summarize { input, words } => {
            if let Some(words) = words {
                config.summary_words = words;
            }
            summarize(&config, &input, cli.stream).await
        }
        Command::Fetch {
            listing_url,
            cases_dir,
        } => {
            if let Some(dir) = cases_dir {
                config.acquire.cases_dir = dir;
            }
            fetch(&config, &listing_url).await
        }
    }
}

fn completion_client(config: &AppConfig, stream: bool) -> Result<OllamaClient> {
    let client = OllamaClient::new(&config.llm).context("Failed to build completion client")?;
    info!(model = %config.llm.model, base_url = %config.llm.base_url, "Completion service");

    if stream {
        Ok(client.with_progress(Arc::new(|delta: &str| eprint!("{delta}"))))
    } else {
        Ok(client)
    }
}

async fn run(config: &AppConfig, input: &Path, stream: bool) -> Result<ExitCode> {
    let cache = ResponseCache::new(&config.cache);
    let llm_client = Arc::new(CachingClient::new(completion_client(config, stream)?, cache.clone()));
    let metrics = RunMetrics::new();

    let pipeline = Pipeline::new(llm_client, config, metrics.clone());
    let report = pipeline.run_batch(input, &config.output_dir).await?;

    metrics.snapshot(cache.stats()).log();

    for document in &report.succeeded {
        if !document.reconcile_clean {
            warn!(case_id = %document.case_id, "Case record kept invariant violations");
        }
    }

    if report.failed.is_empty() {
        info!(documents = report.succeeded.len(), "All documents processed");
        Ok(ExitCode::SUCCESS)
    } else {
        for failure in &report.failed {
            error!(case_id = %failure.case_id, stage = %failure.stage, "Failed: {}", failure.error);
        }
        error!(
            failed = report.failed.len(),
            succeeded = report.succeeded.len(),
            "Some documents failed"
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn ask(config: &AppConfig, case_path: &Path, question: &str, stream: bool) -> Result<ExitCode> {
    let case: CaseRecord = dataset::read_json(case_path).await?;
    let answerer = CaseAnswerer::new(completion_client(config, stream)?, config.tokens.answer);

    let answer = answerer.answer(question, &case).await?;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(ExitCode::SUCCESS)
}

async fn summarize(config: &AppConfig, input: &Path, stream: bool) -> Result<ExitCode> {
    let text = FileReader::read_file(input)
        .await
        .context(format!("Failed to read {:?}", input))?;

    let summarizer = CaseSummarizer::new(
        completion_client(config, stream)?,
        config.tokens.summary,
        config.summary_words,
    );
    let summary = summarizer.summarize(&case_id_from_path(input), &text).await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(ExitCode::SUCCESS)
}

async fn fetch(config: &AppConfig, listing_url: &str) -> Result<ExitCode> {
    let scraper = acquire::CaseScraper::new(&config.acquire)?;
    let summary = scraper.run(listing_url).await?;

    info!(
        downloaded = summary.downloaded.len(),
        missing_pdf = summary.missing_pdf.len(),
        failed = summary.failed.len(),
        dir = %config.acquire.cases_dir.display(),
        "Fetch complete"
    );

    if summary.failed.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
