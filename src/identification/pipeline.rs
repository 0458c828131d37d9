// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-loop identification runs
//!
//! Loops are independent: each one is searched and ranked on its own, and a
//! loop without any usable fit is reported as such without stopping the
//! others. [`identify_loops`] runs every loop on tokio's blocking pool.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use super::loops::ControlLoopSpec;
use super::ranking::{rank, RankedResultSet};
use super::search::{AttemptOutcome, SearchDriver};

/// Identification result of one loop.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopReport {
    /// Fits ranked best first, possibly empty
    pub ranked: RankedResultSet,
    /// Number of (guess, method) attempts made
    pub attempts: usize,
    /// Number of attempts that were dropped
    pub failures: usize,
}

impl LoopReport {
    pub fn loop_name(&self) -> &str {
        self.ranked.loop_name()
    }
}

/// Search and rank a single loop.
pub fn identify_loop(spec: &ControlLoopSpec, driver: &SearchDriver) -> LoopReport {
    let outcomes = driver.sweep(spec);
    let attempts = outcomes.len();
    let fits: Vec<_> = outcomes
        .into_iter()
        .filter_map(AttemptOutcome::into_fit)
        .collect();
    let failures = attempts - fits.len();
    let ranked = rank(spec.name(), fits);

    match ranked.best() {
        Ok(best) => info!(
            "Loop '{}': {} of {} attempts succeeded, best fitness {:.3e} ({})",
            spec.name(),
            ranked.len(),
            attempts,
            best.fitness,
            best.method
        ),
        Err(e) => warn!("Loop '{}': {}", spec.name(), e),
    }

    LoopReport {
        ranked,
        attempts,
        failures,
    }
}

/// Identify every loop one after the other, in order.
pub fn identify_loops_blocking(specs: &[ControlLoopSpec], driver: &SearchDriver) -> Vec<LoopReport> {
    specs.iter().map(|spec| identify_loop(spec, driver)).collect()
}

/// Identify every loop in parallel, one blocking task per loop.
///
/// Reports come back in the order of `specs`.
pub async fn identify_loops(
    specs: Vec<ControlLoopSpec>,
    driver: Arc<SearchDriver>,
) -> Result<Vec<LoopReport>> {
    let handles: Vec<_> = specs
        .into_iter()
        .map(|spec| {
            let driver = Arc::clone(&driver);
            let name = spec.name().to_string();
            let handle = tokio::task::spawn_blocking(move || identify_loop(&spec, &driver));
            (name, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let report = handle
            .await
            .with_context(|| format!("Identification task for loop '{}' failed", name))?;
        reports.push(report);
    }
    Ok(reports)
}
