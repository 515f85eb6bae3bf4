use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use ferry_core::{Config, ObjectLocator};
use ferry_pipeline::{RunOptions, Runner};
use ferry_rules::Resolver;

use crate::request::ImportRequest;

/// Long-running receive loop; SIGINT/SIGTERM stops it gracefully.
pub async fn run(config: &Config, shutdown_timeout: Duration) -> Result<()> {
    config.require_queue_name()?;
    let options = RunOptions::default();
    run_until_signal(config, options, shutdown_timeout).await
}

/// Drain one queue, stopping at the first empty receive or failed message.
pub async fn batch(config: &Config, queue: Option<String>) -> Result<()> {
    if queue.is_none() {
        config.require_queue_name()?;
    }
    let options = RunOptions {
        queue_name: queue,
        exit_on_no_message: true,
        exit_on_error: true,
    };
    run_until_signal(config, options, Duration::from_secs(30)).await
}

async fn run_until_signal(config: &Config, options: RunOptions, shutdown_timeout: Duration) -> Result<()> {
    let pipeline = ferry_pipeline::build(config)
        .await
        .context("failed to build pipeline")?;
    let runner = Arc::new(Runner::new(pipeline.orchestrator));

    let mut task = tokio::spawn({
        let runner = runner.clone();
        async move { runner.run(&options).await }
    });

    let joined = tokio::select! {
        joined = &mut task => joined,
        signal = shutdown_signal() => {
            signal.context("failed to listen for shutdown signals")?;
            info!("shutdown signal received");
            if !runner.shutdown(shutdown_timeout).await {
                task.abort();
                bail!("shutdown timed out after {}s", shutdown_timeout.as_secs());
            }
            task.await
        }
    };

    let summary = joined.context("runner task failed")??;
    info!(
        messages = summary.messages,
        loaded = summary.loaded,
        failures = summary.failures,
        "Done"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM (Unix) or Ctrl+C elsewhere.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Print the jobs each `s3://bucket/key` line of `input` resolves to.
pub fn check(resolver: &Resolver, input: impl BufRead, mut output: impl Write) -> Result<()> {
    for line in input.lines() {
        let line = line.context("failed to read input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let locator: ObjectLocator = match line.parse() {
            Ok(locator) => locator,
            Err(e) => {
                warn!(input = %line, error = %e, "skipping invalid locator");
                continue;
            }
        };
        let jobs = resolver.resolve(std::slice::from_ref(&locator));
        if jobs.is_empty() {
            writeln!(output, "{locator}: no match rules")?;
        }
        for job in jobs {
            writeln!(output, "{job}")?;
        }
    }
    Ok(())
}

/// Import every object listed in the request files, one file at a time.
pub async fn request(config: &Config, files: &[PathBuf]) -> Result<()> {
    let pipeline = ferry_pipeline::build(config)
        .await
        .context("failed to build pipeline")?;
    for path in files {
        let label = path.display().to_string();
        let request = ImportRequest::from_file(path)?;
        let locators = request.locators();
        info!(request = %label, objects = locators.len(), "Processing request");
        match pipeline.orchestrator.process_locators(&label, &locators).await {
            Ok(loaded) => info!(request = %label, loaded, "Request done"),
            Err(e) => {
                error!(request = %label, error = %e, kind = %e.kind(), "Request failed");
                return Err(e).with_context(|| format!("request {label} failed"));
            }
        }
    }
    Ok(())
}
