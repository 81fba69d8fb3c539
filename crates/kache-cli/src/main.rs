#![forbid(unsafe_code)]
//! Thin argument-parsing shell around `kache-graph` and `kache-exec`.
//!
//! All behavior lives in the library crates; this binary only parses
//! arguments, wires up the observable error channels, and translates the
//! result into an exit code.

use std::error::Error;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;
use kache_exec::{ExecError, ExecutorOptions, TopologicalExecutor};
use kache_graph::{filter, list_targets, AnalyzerOptions, DependencyAnalyzer, GraphError, Node};

type CliResult = Result<(), Box<dyn Error>>;

const IGNORE_FILE_NAME: &str = ".kacheignore";

#[derive(Debug, Parser)]
#[command(name = "kache", about = "Parallel dependency-aware renderer for Kustomize overlays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discover and print the overlay dependency graph, without rendering
    Analyze {
        /// Root directory to scan for overlay manifests
        root: PathBuf,
    },
    /// Render the overlay tree under ROOT in dependency order
    Run {
        /// Root directory to scan for overlay manifests
        root: PathBuf,
        /// Treat corrupt manifests as warnings instead of fatal errors
        #[arg(long = "ignore-errors")]
        ignore_errors: bool,
        /// Arguments forwarded verbatim to the renderer subprocess
        #[arg(last = true)]
        renderer_opts: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Analyze { root } => cmd_analyze(&root),
        Command::Run {
            root,
            ignore_errors,
            renderer_opts,
        } => cmd_run(&root, ignore_errors, &renderer_opts),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

/// Number of worker threads to use for a parallel stage, per spec.md §5:
/// "bounded by a caller-supplied degree (defaulting to available CPU
/// count)".
fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

fn cmd_analyze(root: &Path) -> CliResult {
    let nodes = analyze(root, AnalyzerOptions::default())?;
    let json = serde_json::to_string_pretty(&nodes)?;
    println!("{json}");
    Ok(())
}

fn cmd_run(root: &Path, ignore_errors: bool, renderer_opts: &[String]) -> CliResult {
    let options = AnalyzerOptions { ignore_errors };
    let nodes = analyze(root, options)?;

    eprintln!("    Analyzed {} overlay(s)", nodes.len());

    let executor_options = ExecutorOptions {
        renderer_args: renderer_opts.to_vec(),
    };
    let (executor, error_rx) = TopologicalExecutor::new(nodes, executor_options);
    let drain = spawn_exec_drain(error_rx);

    let workers = worker_count();
    let result = executor.run(workers);
    drain.join().ok();

    result?;
    eprintln!("    Finished rendering");
    Ok(())
}

/// List, filter, and analyze the overlays under `root`, draining the
/// analyzer's observable error channel on a side thread while `run`
/// (a blocking call) is in progress.
fn analyze(root: &Path, options: AnalyzerOptions) -> Result<Vec<Node>, Box<dyn Error>> {
    let targets = list_targets(root)?;
    let ignore_path = root.join(IGNORE_FILE_NAME);
    let pattern_file = ignore_path.is_file().then_some(ignore_path.as_path());
    let targets = filter(pattern_file, targets)?;

    let (analyzer, error_rx) = DependencyAnalyzer::new(targets, options);
    let drain = spawn_analyzer_drain(error_rx);

    let workers = worker_count();
    let result = analyzer.run(workers);
    drain.join().ok();

    Ok(result?)
}

fn spawn_analyzer_drain(error_rx: Receiver<GraphError>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for err in error_rx.iter() {
            eprintln!("warning: {err}");
        }
    })
}

fn spawn_exec_drain(error_rx: Receiver<ExecError>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for err in error_rx.iter() {
            eprintln!("warning: {err}");
        }
    })
}
