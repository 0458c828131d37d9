// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PI gain identification binary
//!
//! Loads the recorded process data, identifies the gains of every configured
//! loop with all optimization methods and reports the ranked results.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use rust_pi_identification::acquisition::{DataSource, DelimitedFileSource};
use rust_pi_identification::config::{self, Config};
use rust_pi_identification::identification::loops::LoopConfigurationBuilder;
use rust_pi_identification::identification::optim::Method;
use rust_pi_identification::identification::pipeline::{identify_loops, identify_loops_blocking};
use rust_pi_identification::identification::search::SearchDriver;
use rust_pi_identification::reporting;

/// Identify PI controller gains from recorded process data
#[derive(Parser, Debug)]
#[command(name = "pi_identify")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Recorded data file (overrides data.path)
    #[arg(long)]
    data_file: Option<PathBuf>,

    /// Number of warm-up rows to discard (overrides data.start_row)
    #[arg(long)]
    start_row: Option<usize>,

    /// Seed of the shared random initial guesses
    #[arg(long)]
    seed: Option<u64>,

    /// Ranked results output file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optimization method to run, may be repeated (default: all)
    #[arg(short = 'm', long = "method", value_enum)]
    methods: Vec<Method>,

    /// Wall-clock cap of a single optimization attempt in milliseconds
    #[arg(long)]
    attempt_timeout_ms: Option<u64>,

    /// Identify loops one after the other instead of in parallel
    #[arg(long)]
    sequential: bool,

    /// Validate a configuration file and exit
    #[arg(long, value_name = "FILE")]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = &args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.data_file.clone(),
        args.start_row,
        args.seed,
        args.output.clone(),
        args.methods.clone(),
        args.attempt_timeout_ms,
        args.sequential,
    );
    config::validate_specific_rules(&config).context("Invalid command line overrides")?;

    run(&config).await
}

async fn run(config: &Config) -> Result<()> {
    let data = DelimitedFileSource::from_config(&config.data).read()?;
    let loops = LoopConfigurationBuilder::new(&config.identification)
        .build(&data)
        .context("Failed to assemble control loops")?;

    let driver = SearchDriver::from_config(&config.search);
    info!(
        "Identifying {} loops with {} methods ({})",
        loops.len(),
        driver.methods().len(),
        if config.search.parallel {
            "parallel"
        } else {
            "sequential"
        }
    );

    let reports = if config.search.parallel {
        identify_loops(loops, Arc::new(driver)).await?
    } else {
        identify_loops_blocking(&loops, &driver)
    };

    let empty = reports.iter().filter(|r| r.ranked.is_empty()).count();
    if empty > 0 {
        warn!("{} of {} loops have no usable result", empty, reports.len());
    }

    reporting::print_summary(&reports, config.output.print_ranked)?;
    reporting::save_ranked_results(&config.output.results_path, &reports)?;
    Ok(())
}
