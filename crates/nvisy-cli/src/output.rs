//! Writing fragments and printing reports.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use nvisy_splitter::{ChunkPlan, SplitReport, format_file_size};

use crate::TRACING_TARGET_OUTPUT;

/// Writes every produced fragment into `dir`, returning the written paths.
///
/// Existing files are only replaced when `overwrite` is set; the check runs
/// for all fragments before anything is written.
pub async fn write_fragments(
    report: &SplitReport,
    dir: &Path,
    overwrite: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let targets = report
        .fragments()
        .map(|fragment| (dir.join(fragment.name()), fragment))
        .collect::<Vec<_>>();

    if !overwrite {
        for (path, _) in &targets {
            let exists = tokio::fs::try_exists(path)
                .await
                .with_context(|| format!("failed to inspect {}", path.display()))?;
            if exists {
                anyhow::bail!(
                    "{} already exists, pass --overwrite to replace it",
                    path.display()
                );
            }
        }
    }

    let mut written = Vec::with_capacity(targets.len());
    for (path, fragment) in targets {
        tokio::fs::write(&path, fragment.content())
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        tracing::info!(
            target: TRACING_TARGET_OUTPUT,
            path = %path.display(),
            range = %fragment.range(),
            size = %format_file_size(fragment.byte_size()),
            "Wrote fragment"
        );
        written.push(path);
    }

    Ok(written)
}

/// Prints the split report as a table or as JSON.
pub fn print_report(out: &mut impl Write, report: &SplitReport, json: bool) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, &report.summary())?;
        writeln!(out)?;
        return Ok(());
    }

    let plan = report.plan();
    writeln!(
        out,
        "{}: {} pages, {}, {} chunks ({})",
        report.source_name(),
        plan.page_count(),
        format_file_size(plan.total_byte_size()),
        plan.total_chunks(),
        report.status(),
    )?;

    for outcome in report.outcomes() {
        match &outcome.result {
            Ok(fragment) => {
                let marker = if fragment.byte_size() > plan.max_chunk_bytes() {
                    "  (over budget)"
                } else {
                    ""
                };
                writeln!(
                    out,
                    "  {:<32} {:<14} {:>10}{marker}",
                    fragment.name(),
                    fragment.range().to_string(),
                    format_file_size(fragment.byte_size()),
                )?;
            }
            Err(err) => {
                writeln!(out, "  chunk {} ({}) failed: {err}", outcome.index + 1, outcome.range)?;
            }
        }
    }

    writeln!(
        out,
        "total: {} in {} fragments",
        format_file_size(report.total_fragment_bytes()),
        report.fragments().count(),
    )?;
    Ok(())
}

/// Prints a plan produced by a dry run.
pub fn print_plan(
    out: &mut impl Write,
    source_name: &str,
    plan: &ChunkPlan,
    json: bool,
) -> anyhow::Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, plan)?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(
        out,
        "{source_name}: {} pages, {}, ~{} per page, budget {}",
        plan.page_count(),
        format_file_size(plan.total_byte_size()),
        format_file_size(plan.avg_page_size() as u64),
        format_file_size(plan.max_chunk_bytes()),
    )?;
    writeln!(
        out,
        "{} pages per chunk, {} chunks",
        plan.pages_per_chunk(),
        plan.total_chunks()
    )?;
    for (index, range) in plan.iter().enumerate() {
        writeln!(out, "  chunk {:<4} {range}", index + 1)?;
    }
    Ok(())
}

/// Returns a locked stdout handle.
pub fn stdout() -> io::StdoutLock<'static> {
    io::stdout().lock()
}
