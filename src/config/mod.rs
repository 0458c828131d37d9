// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the identification application
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema generated from the configuration types.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `data`: Location and layout of the recorded process data
//! - `identification`: Loops to identify, sample interval and random guesses
//! - `search`: Optimization methods, tolerances and time budget
//! - `output`: Where ranked results are written
//!
//! ## Usage
//!
//! ```no_run
//! use rust_pi_identification::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("data/run_2.txt".into()), // Data file
//!     Some(100),                     // Start row
//!     Some(42),                      // Seed
//!     None,                          // Output file
//!     Vec::new(),                    // Methods (keep configured)
//!     Some(5000),                    // Attempt timeout in ms
//!     false,                         // Sequential
//! );
//!
//! println!("Sample interval: {}", config.identification.sample_interval);
//! ```

pub mod data;
pub mod identification;
pub mod output;
pub mod search;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identification::optim::Method;

// Re-export all types for public API
pub use data::DataConfig;
pub use identification::{IdentificationConfig, LoopDefinition, RandomGuessConfig};
pub use output::OutputConfig;
pub use search::SearchConfig;
pub use utils::{config_schema, output_config_schema, validate_specific_rules};

/// Root configuration structure for the identification application.
///
/// # Structure
///
/// The configuration is deserialized from and serialized to YAML using the
/// serde framework. It is validated against a JSON schema to ensure all
/// fields have the expected types before deserialization.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file. The defaults reproduce the reference three-loop run:
/// setpoints 200, 40 and 50, a sample interval of 1 and seed 10.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Location and layout of the recorded process data.
    ///
    /// If not specified, default values will be used.
    #[serde(default)]
    pub data: DataConfig,

    /// Loops to identify and how they are seeded.
    ///
    /// If not specified, the three standard loops `uc`, `uh` and `up` are used.
    #[serde(default)]
    pub identification: IdentificationConfig,

    /// Optimization methods and their settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Result reporting settings.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// A missing file is created with the default configuration. An existing
    /// file is validated against the configuration schema, deserialized, then
    /// checked with [`validate_specific_rules`]. When any step fails a
    /// `<name>.sample.yaml` file with default values is written next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema = config_schema()?;
        let validator = jsonschema::draft202012::options()
            .build(&schema)
            .map_err(|e| anyhow::anyhow!("Invalid configuration schema: {}", e))?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided override the existing configuration.
    ///
    /// # Parameters
    ///
    /// * `data_file` - Path of the recorded data file
    /// * `start_row` - Number of warm-up rows to discard
    /// * `seed` - Seed of the shared random initial guesses
    /// * `output` - Path of the ranked results file
    /// * `methods` - Methods to run; an empty list keeps the configured ones
    /// * `attempt_timeout_ms` - Wall-clock cap of one optimization attempt
    /// * `sequential` - If true, loops are identified one after the other
    pub fn apply_args(
        &mut self,
        data_file: Option<PathBuf>,
        start_row: Option<usize>,
        seed: Option<u64>,
        output: Option<PathBuf>,
        methods: Vec<Method>,
        attempt_timeout_ms: Option<u64>,
        sequential: bool,
    ) {
        if let Some(file) = data_file {
            debug!("Overriding data file from command line: {:?}", file);
            self.data.path = file.to_string_lossy().to_string();
        }
        if let Some(start_row) = start_row {
            debug!("Overriding start row from command line: {}", start_row);
            self.data.start_row = start_row;
        }
        if let Some(seed) = seed {
            debug!("Overriding seed from command line: {}", seed);
            self.identification.seed = seed;
        }
        if let Some(output) = output {
            debug!("Overriding output file from command line: {:?}", output);
            self.output.results_path = output.to_string_lossy().to_string();
        }
        if !methods.is_empty() {
            debug!("Overriding methods from command line: {:?}", methods);
            self.search.methods = methods;
        }
        if let Some(timeout) = attempt_timeout_ms {
            debug!("Overriding attempt timeout from command line: {} ms", timeout);
            self.search.attempt_timeout_ms = Some(timeout);
        }
        if sequential {
            self.search.parallel = false;
        }
    }
}
