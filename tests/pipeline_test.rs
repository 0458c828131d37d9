// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fs;
use std::path::Path;
use std::sync::{Arc, Once};

use anyhow::Result;
use rust_pi_identification::acquisition::{DataSource, DelimitedFileSource};
use rust_pi_identification::config::{Config, IdentificationConfig};
use rust_pi_identification::identification::loops::{GainGuess, GuessStrategy, LoopConfigurationBuilder};
use rust_pi_identification::identification::objective::simulate_actuator;
use rust_pi_identification::identification::optim::{Method, OptimizerSettings};
use rust_pi_identification::identification::pipeline::{identify_loops, identify_loops_blocking};
use rust_pi_identification::identification::search::SearchDriver;
use rust_pi_identification::reporting;
use tempfile::tempdir;

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

const ROWS: usize = 60;
const WARM_UP: usize = 10;

/// Write a six-column recording whose actuators follow the PI law exactly.
fn write_recording(path: &Path) -> Result<()> {
    let measurement = |offset: f64, amplitude: f64, rate: f64| -> Vec<f64> {
        (0..ROWS)
            .map(|i| offset + amplitude * (rate * i as f64).sin())
            .collect()
    };
    let vc = measurement(195.0, 4.0, 0.3);
    let tco = measurement(38.0, 1.5, 0.2);
    let thi = measurement(48.0, 2.0, 0.15);
    let uc = simulate_actuator(10.0, &vc, 200.0, 1.5, 20.0, 1.0)?;
    let uh = simulate_actuator(5.0, &tco, 40.0, 0.8, 12.0, 1.0)?;
    let up = simulate_actuator(2.0, &thi, 50.0, 2.5, 40.0, 1.0)?;

    let mut text = String::from("# synthetic multi-loop recording\n");
    for i in 0..ROWS {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            uc[i], uh[i], up[i], vc[i], tco[i], thi[i]
        ));
    }
    fs::write(path, text)?;
    Ok(())
}

fn load(path: &Path) -> Result<rust_pi_identification::identification::series::ProcessData> {
    DelimitedFileSource::new(path).with_start_row(WARM_UP).read()
}

#[test]
fn test_same_seed_gives_identical_ranked_output() -> Result<()> {
    setup();
    let dir = tempdir()?;
    let data_path = dir.path().join("multi_control_data.txt");
    write_recording(&data_path)?;
    let data = load(&data_path)?;
    assert_eq!(data.len(), ROWS - WARM_UP);

    let config = IdentificationConfig::default();
    let driver = SearchDriver::default();

    let mut outputs = Vec::new();
    for run in 0..2 {
        let loops = LoopConfigurationBuilder::new(&config).build(&data)?;
        let reports = identify_loops_blocking(&loops, &driver);
        let path = dir.path().join(format!("run_{}/solution_list.txt", run));
        reporting::save_ranked_results(&path, &reports)?;
        outputs.push(fs::read(&path)?);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(String::from_utf8(outputs[0].clone())?.lines().count(), 3);
    Ok(())
}

#[test]
fn test_fixed_guess_loop_recovers_recorded_gains() -> Result<()> {
    setup();
    let dir = tempdir()?;
    let data_path = dir.path().join("data.txt");
    write_recording(&data_path)?;
    let data = load(&data_path)?;

    let loops = LoopConfigurationBuilder::new(&IdentificationConfig::default()).build(&data)?;
    let driver = SearchDriver::new(
        vec![Method::NelderMead, Method::Powell],
        OptimizerSettings::default(),
    );
    let reports = identify_loops_blocking(&loops[..1], &driver);
    let best = reports[0].ranked.best()?;
    assert!(best.fitness < 1e-3, "fitness = {}", best.fitness);
    assert!((best.kc - 1.5).abs() < 1e-2, "Kc = {}", best.kc);
    Ok(())
}

#[tokio::test]
async fn test_loop_without_fit_does_not_abort_run() -> Result<()> {
    setup();
    let dir = tempdir()?;
    let data_path = dir.path().join("data.txt");
    write_recording(&data_path)?;
    let data = load(&data_path)?;

    let mut config = IdentificationConfig::default();
    config.loops[1].initial_guesses = GuessStrategy::Fixed {
        guesses: vec![GainGuess::new(1.0, 0.0)],
    };
    let loops = LoopConfigurationBuilder::new(&config).build(&data)?;
    let driver = Arc::new(SearchDriver::new(
        vec![Method::NelderMead, Method::Bfgs],
        OptimizerSettings::default(),
    ));
    let reports = identify_loops(loops, driver).await?;

    assert_eq!(reports.len(), 3);
    assert!(reports[0].ranked.best().is_ok());
    assert!(reports[1].ranked.best().is_err());
    assert_eq!(reports[1].failures, 2);
    assert!(reports[2].ranked.best().is_ok());

    let line = reporting::best_line(&reports[1]);
    assert!(line.starts_with("uh controller: "), "{}", line);
    Ok(())
}

#[tokio::test]
async fn test_parallel_run_matches_sequential_run() -> Result<()> {
    setup();
    let dir = tempdir()?;
    let data_path = dir.path().join("data.txt");
    write_recording(&data_path)?;
    let data = load(&data_path)?;

    let config = Config::default();
    let loops = LoopConfigurationBuilder::new(&config.identification)
        .with_seed(3)
        .build(&data)?;
    let driver = SearchDriver::from_config(&config.search);
    let sequential = identify_loops_blocking(&loops, &driver);
    let parallel = identify_loops(loops, Arc::new(driver)).await?;
    assert_eq!(sequential, parallel);
    Ok(())
}
