#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod output;
mod telemetry;

use std::process;

use anyhow::Context;
use nvisy_splitter::{SplitStatus, Splitter, engine, format_file_size};

use crate::config::Cli;

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "nvisy_cli::startup";
pub const TRACING_TARGET_CONFIG: &str = "nvisy_cli::config";
pub const TRACING_TARGET_OUTPUT: &str = "nvisy_cli::output";

#[tokio::main]
async fn main() {
    let error = match run().await {
        Ok(status) => process::exit(exit_code(status)),
        Err(error) => error,
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_STARTUP,
            error = %error,
            "split terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<SplitStatus> {
    let cli = Cli::init();

    telemetry::init_tracing(&cli.telemetry)?;
    cli.log();
    cli.validate()?;

    engine::initialize();
    let splitter = Splitter::new(cli.splitter.clone()).context("failed to create splitter")?;

    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("failed to read {}", cli.input.display()))?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        input = %cli.input.display(),
        size = %format_file_size(bytes.len() as u64),
        "Read input document"
    );

    let name = cli.source_name();
    let mut stdout = output::stdout();

    if cli.output.dry_run {
        let plan = splitter
            .plan(bytes, name.clone())
            .await
            .context("failed to plan split")?;
        output::print_plan(&mut stdout, &name, &plan, cli.output.json)?;
        return Ok(SplitStatus::Complete);
    }

    let report = splitter
        .split(bytes, name)
        .await
        .context("failed to split document")?;

    if report.status() != SplitStatus::Failed {
        output::write_fragments(&report, &cli.output_dir(), cli.output.overwrite).await?;
    }

    output::print_report(&mut stdout, &report, cli.output.json)?;
    Ok(report.status())
}

/// Maps the split status to the process exit code.
fn exit_code(status: SplitStatus) -> i32 {
    match status {
        SplitStatus::Complete => 0,
        SplitStatus::Failed => 1,
        SplitStatus::Partial => 2,
    }
}
