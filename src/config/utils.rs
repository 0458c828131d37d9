// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::debug;

use super::Config;
use crate::identification::loops::GuessStrategy;

/// JSON schema of the configuration file, generated from [`Config`].
pub fn config_schema() -> Result<serde_json::Value> {
    let schema = schemars::schema_for!(Config);
    serde_json::to_value(&schema).context("Failed to serialize configuration schema")
}

/// Output the configuration JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./pi_identify --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema = config_schema()?;
    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;
    println!("{}", formatted_schema);
    Ok(())
}

fn check_range(name: &str, range: [f64; 2]) -> Result<()> {
    let [low, high] = range;
    if !(low.is_finite() && high.is_finite()) {
        anyhow::bail!("{} bounds must be finite, got [{}, {}]", name, low, high);
    }
    if low > high {
        anyhow::bail!("{} is empty: {} > {}", name, low, high);
    }
    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Arguments
///
/// * `config` - The configuration object to validate
///
/// # Returns
///
/// * `Ok(())` if all validations pass
/// * `Err(anyhow::Error)` with descriptive message if any validation fails
///
/// # Validation Rules
///
/// - **Data layout**: at least two columns, unique names, a delimiter that cannot
///   appear in a number
/// - **Sample interval**: finite and strictly positive
/// - **Random guesses**: finite, ordered ranges and at least one guess when a
///   loop uses them
/// - **Loops**: at least one, unique names, finite setpoints, columns present
///   in the data layout, explicit guess lists not empty
/// - **Search**: at least one method, positive limits and non-negative tolerances,
///   bounds given for both parameters
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let data = &config.data;
    if data.columns.len() < 2 {
        anyhow::bail!("At least two data columns are required");
    }
    let mut columns = HashSet::new();
    for column in &data.columns {
        if !columns.insert(column.as_str()) {
            anyhow::bail!("Duplicate data column '{}'", column);
        }
    }
    if data.delimiter.is_ascii_digit() || matches!(data.delimiter, '.' | '-' | '+' | '#') {
        anyhow::bail!("Invalid delimiter '{}'", data.delimiter);
    }

    let identification = &config.identification;
    let ts = identification.sample_interval;
    if !(ts.is_finite() && ts > 0.0) {
        anyhow::bail!("Sample interval must be strictly positive, got {}", ts);
    }
    check_range("kc_range", identification.random_guess.kc_range)?;
    check_range("ti_range", identification.random_guess.ti_range)?;

    if identification.loops.is_empty() {
        anyhow::bail!("At least one loop must be defined");
    }
    let mut names = HashSet::new();
    for definition in &identification.loops {
        if !names.insert(definition.name.as_str()) {
            anyhow::bail!("Duplicate loop name '{}'", definition.name);
        }
        if !definition.setpoint.is_finite() {
            anyhow::bail!("Setpoint of loop '{}' must be finite", definition.name);
        }
        for column in [&definition.actuator, &definition.measurement] {
            if !columns.contains(column.as_str()) {
                anyhow::bail!(
                    "Loop '{}' uses column '{}' which is not a data column",
                    definition.name,
                    column
                );
            }
        }
        match &definition.initial_guesses {
            GuessStrategy::Fixed { guesses } => {
                if guesses.is_empty() {
                    anyhow::bail!("Loop '{}' has an empty guess list", definition.name);
                }
                if guesses.iter().any(|g| !(g.kc.is_finite() && g.ti.is_finite())) {
                    anyhow::bail!("Loop '{}' has a non-finite guess", definition.name);
                }
            }
            GuessStrategy::SharedRandom => {
                if identification.random_guess.count == 0 {
                    anyhow::bail!(
                        "Loop '{}' uses shared random guesses but random_guess.count is 0",
                        definition.name
                    );
                }
            }
        }
    }

    let search = &config.search;
    if search.methods.is_empty() {
        anyhow::bail!("At least one optimization method is required");
    }
    if search.attempt_timeout_ms == Some(0) {
        anyhow::bail!("attempt_timeout_ms must be positive");
    }
    let optimizer = &search.optimizer;
    if optimizer.max_iterations == 0 {
        anyhow::bail!("max_iterations must be positive");
    }
    if optimizer.lbfgs_memory == 0 {
        anyhow::bail!("lbfgs_memory must be positive");
    }
    for (name, value) in [
        ("x_tolerance", optimizer.x_tolerance),
        ("f_tolerance", optimizer.f_tolerance),
        ("gradient_tolerance", optimizer.gradient_tolerance),
    ] {
        if !(value.is_finite() && value >= 0.0) {
            anyhow::bail!("{} must be a non-negative number, got {}", name, value);
        }
    }
    if !(optimizer.initial_trust_radius.is_finite() && optimizer.initial_trust_radius > 0.0) {
        anyhow::bail!(
            "initial_trust_radius must be positive, got {}",
            optimizer.initial_trust_radius
        );
    }
    if let Some(bounds) = &optimizer.bounds {
        if bounds.lower.len() != 2 || bounds.upper.len() != 2 {
            anyhow::bail!("Bounds must give exactly two values (Kc, Ti) per side");
        }
        for (i, (low, high)) in bounds.lower.iter().zip(&bounds.upper).enumerate() {
            if low > high {
                anyhow::bail!("Bound {} is empty: {} > {}", i, low, high);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoopDefinition;
    use crate::identification::optim::Bounds;

    #[test]
    fn test_rejects_non_positive_sample_interval() {
        let mut config = Config::default();
        config.identification.sample_interval = 0.0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_rejects_unknown_loop_column() {
        let mut config = Config::default();
        config.identification.loops.push(LoopDefinition::new(
            "extra",
            "uc",
            "Pressure",
            1.0,
            GuessStrategy::SharedRandom,
        ));
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("Pressure"));
    }

    #[test]
    fn test_rejects_duplicate_loop_names_and_reversed_ranges() {
        let mut config = Config::default();
        config.identification.loops[1].name = "uc".to_string();
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.identification.random_guess.ti_range = [100.0, 1.0];
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_search_settings() {
        let mut config = Config::default();
        config.search.methods.clear();
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.search.optimizer.bounds = Some(Bounds {
            lower: vec![0.0],
            upper: vec![1.0],
        });
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_schema_describes_sections() {
        let schema = config_schema().unwrap();
        let properties = schema["properties"].as_object().unwrap();
        for section in ["data", "identification", "search", "output"] {
            assert!(properties.contains_key(section), "missing {}", section);
        }
    }
}
