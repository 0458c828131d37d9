// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Result reporting
//!
//! Human-readable lines for the console and a flat text dump with one ranked
//! result list per loop.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::identification::pipeline::LoopReport;

/// One-line summary of the best fit of a loop.
///
/// A loop without any fit yields a line stating the error instead.
pub fn best_line(report: &LoopReport) -> String {
    match report.ranked.best() {
        Ok(best) => format!(
            "{} controller's fitness is {:.2e}, using gain(Kc): {:.2}, and integration time(Ti): {:.2}, found by {}",
            report.loop_name(),
            best.fitness,
            best.kc,
            best.ti,
            best.method
        ),
        Err(e) => format!("{} controller: {}", report.loop_name(), e),
    }
}

/// The whole ranked list of a loop on one line.
pub fn ranked_line(report: &LoopReport) -> String {
    report.ranked.to_string()
}

/// Write ranked lists (optionally) and best lines for every loop.
pub fn write_summary<W: Write>(out: &mut W, reports: &[LoopReport], with_ranked: bool) -> io::Result<()> {
    if with_ranked {
        for report in reports {
            writeln!(
                out,
                "{} ({} of {} attempts kept): {}",
                report.loop_name(),
                report.ranked.len(),
                report.attempts,
                ranked_line(report)
            )?;
        }
        writeln!(out)?;
    }
    for report in reports {
        writeln!(out, "{}", best_line(report))?;
    }
    Ok(())
}

/// Print the summary on stdout.
pub fn print_summary(reports: &[LoopReport], with_ranked: bool) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    write_summary(&mut handle, reports, with_ranked).context("Failed to write summary to stdout")
}

/// Write one ranked line per loop to `path`, creating parent directories.
pub fn save_ranked_results<P: AsRef<Path>>(path: P, reports: &[LoopReport]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
    }

    let mut contents = String::new();
    for report in reports {
        contents.push_str(&ranked_line(report));
        contents.push('\n');
    }
    fs::write(path, contents).with_context(|| format!("Failed to write results to {:?}", path))?;
    info!("Ranked results of {} loops saved to {:?}", reports.len(), path);
    Ok(())
}
