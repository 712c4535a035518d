//! Reference launcher binary (§6, A.1, A.7).
//!
//! Reads newline-delimited JSON [`analytics_core::element::StreamElement`]
//! records from stdin, feeds each one through the worker's processor
//! graph, and writes every element the graph emits back out as NDJSON on
//! stdout, one object per line. A periodic tick drives the window graph
//! (the heatmap sender) independent of the input stream.
//!
//! A configuration error at startup exits non-zero before any element is
//! read; SIGINT/SIGTERM finish the in-flight element and then exit 0.

#[cfg(feature = "cli")]
use analytics_worker::{build_graphs, load_config, MatchSeeder};
#[cfg(feature = "cli")]
use anyhow::{Context, Result};
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use std::io::{BufRead, Write};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "cli")]
use std::sync::Arc;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "analytics_worker")]
#[command(about = "Streaming match-analytics worker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Read NDJSON stream elements from stdin, emit detector output as
    /// NDJSON on stdout.
    Start {
        /// Path to the shared/global configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to a worker-specific configuration file; its keys win over
        /// `--config` on conflict.
        #[arg(long)]
        worker_config: Option<PathBuf>,

        /// How often the window graph is ticked, in milliseconds.
        #[arg(long, default_value = "1000")]
        tick_interval_ms: u64,
    },
}

#[cfg(feature = "cli")]
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config, worker_config, tick_interval_ms } => run(config.as_deref(), worker_config.as_deref(), Duration::from_millis(tick_interval_ms)),
    }
}

#[cfg(feature = "cli")]
fn run(global_config: Option<&std::path::Path>, worker_config: Option<&std::path::Path>, tick_interval: Duration) -> Result<()> {
    let config = load_config(global_config, worker_config).context("failed to load worker configuration")?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst)).context("failed to install signal handler")?;
    }

    let sink = analytics_worker::OutputSink::new();
    let (element_graph, window_graph) = build_graphs(&config, sink.clone());
    let seeder = MatchSeeder::new();
    let mut backend = analytics_core::state::StateBackend::new();

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    let mut last_tick = Instant::now();
    let mut last_match_id: Option<String> = None;

    for line in stdin.lock().lines() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let line = line.context("failed to read from stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let element: analytics_core::element::StreamElement = match serde_json::from_str(&line) {
            Ok(element) => element,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed input line");
                continue;
            }
        };

        seeder.seed_if_new(&mut backend, &config, &element.key);
        last_match_id = Some(element.key.clone());
        element_graph.process(&mut backend, &element);
        flush_sink(&sink, &mut stdout)?;

        if last_tick.elapsed() >= tick_interval {
            if let Some(match_id) = &last_match_id {
                window_graph.tick(&mut backend, match_id, element.generation_timestamp);
                flush_sink(&sink, &mut stdout)?;
            }
            last_tick = Instant::now();
        }
    }

    if let Some(match_id) = &last_match_id {
        window_graph.tick(&mut backend, match_id, 0);
        flush_sink(&sink, &mut stdout)?;
    }

    Ok(())
}

#[cfg(feature = "cli")]
fn flush_sink(sink: &analytics_worker::OutputSink, stdout: &mut impl Write) -> Result<()> {
    for element in sink.drain() {
        let line = serde_json::to_string(&element).context("failed to serialize output element")?;
        writeln!(stdout, "{line}").context("failed to write to stdout")?;
    }
    stdout.flush().context("failed to flush stdout")?;
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("analytics_worker CLI is not available. Enable the 'cli' feature to use it.");
    std::process::exit(1);
}
