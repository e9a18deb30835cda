use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use hhrun::cli::Cli;
use hhrun::config::RunConfig;
use hhrun::input::{FastaReader, build_jobs, open_input};
use hhrun::output::open_output;
use hhrun::pipeline::{BatchOptions, run_batch};
use hhrun::worker::{BatchId, Dispatcher, ResultExtractor, TempFileBroker, Worker, WorkerDeps};

/// Exit status after a second interrupt, as a shell reports SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Default to warn so log lines don't tear through the progress bar.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()).await {
        // `hhrun in.fa | head`: the reader went away, nothing left to report.
        Err(e) if is_broken_pipe(&e) => {
            tracing::debug!("Output closed by reader");
            Ok(())
        }
        other => other,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = RunConfig::resolve(&cli).context("invalid configuration")?;

    let reader = open_input(&cli.file)?;
    let jobs = build_jobs(FastaReader::new(reader), &config, BatchId::new())
        .with_context(|| format!("failed to read {}", cli.file.display()))?;

    let worker = Worker::new(WorkerDeps {
        broker: TempFileBroker::new(&config.scratch_dir),
        invoker: Arc::new(config.command_invoker()),
        extractor: ResultExtractor::new(),
    });
    let dispatcher = Dispatcher::new(worker, config.concurrency)?;

    let sink = open_output(cli.out.as_ref()).context("failed to open output")?;

    let cancel = CancellationToken::new();
    install_interrupt_handler(cancel.clone())?;

    eprintln!(
        "#JOBS TO RUN: {} | #CONCURRENT PROCESSES TO USE: {}",
        jobs.len(),
        dispatcher.concurrency()
    );

    let options = BatchOptions {
        top_n: config.top_n,
        progress: config.progress,
        failure_policy: config.failure_policy,
    };
    let (summary, sink) = run_batch(&dispatcher, jobs, sink, &options, cancel).await?;
    sink.finish().context("failed to finish output")?;

    if config.timing {
        eprintln!(
            "\nRUNTIME(s): {:.4} | AVG/JOB: {:.4}",
            summary.elapsed.as_secs_f64(),
            summary.average_per_job().as_secs_f64()
        );
    }
    if summary.failed > 0 || summary.cancelled > 0 {
        tracing::warn!(
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Some jobs produced no results"
        );
    }

    Ok(())
}

/// First interrupt stops admitting jobs and lets running ones finish. A
/// second one exits immediately.
fn install_interrupt_handler(cancel: CancellationToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        // Registered here, not on first poll, so an early Ctrl-C is not lost.
        let mut interrupts =
            signal(SignalKind::interrupt()).context("failed to listen for interrupts")?;
        tokio::spawn(async move {
            if interrupts.recv().await.is_none() {
                return;
            }
            on_interrupt(&cancel);
            if interrupts.recv().await.is_some() {
                force_exit();
            }
        });
    }

    #[cfg(not(unix))]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        on_interrupt(&cancel);
        if tokio::signal::ctrl_c().await.is_ok() {
            force_exit();
        }
    });

    Ok(())
}

fn on_interrupt(cancel: &CancellationToken) {
    tracing::warn!("Interrupted, finishing running jobs and skipping the rest (interrupt again to quit now)");
    cancel.cancel();
}

fn force_exit() -> ! {
    eprintln!("Interrupted again, exiting");
    std::process::exit(INTERRUPTED_EXIT_CODE);
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<io::Error>())
        .any(|e| e.kind() == io::ErrorKind::BrokenPipe)
}
