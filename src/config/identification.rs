// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Control loop configuration
//!
//! This module defines which loops are identified, which recorded columns
//! belong to each of them, their setpoints and how their initial gain
//! guesses are obtained.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identification::loops::{GainGuess, GuessStrategy};

/// Identification settings shared by every loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct IdentificationConfig {
    /// Sampling interval `Ts` of the recording, in seconds.
    ///
    /// Shared by every series of a run. Must be strictly positive.
    pub sample_interval: f64,

    /// Seed of the generator drawing the shared random initial guesses.
    ///
    /// Two runs with the same data and the same seed produce identical results.
    pub seed: u64,

    /// Ranges and size of the shared random guess set.
    pub random_guess: RandomGuessConfig,

    /// Loops to identify, in reporting order.
    pub loops: Vec<LoopDefinition>,
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            sample_interval: 1.0,
            seed: 10,
            random_guess: RandomGuessConfig::default(),
            loops: vec![
                LoopDefinition::new(
                    "uc",
                    "uc",
                    "Vc",
                    200.0,
                    GuessStrategy::Fixed {
                        guesses: vec![GainGuess::new(0.5, 0.5)],
                    },
                ),
                LoopDefinition::new("uh", "uh", "Tco", 40.0, GuessStrategy::SharedRandom),
                LoopDefinition::new("up", "up", "Thi", 50.0, GuessStrategy::SharedRandom),
            ],
        }
    }
}

/// Uniform ranges the shared random guesses are drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct RandomGuessConfig {
    /// Inclusive `[low, high]` range of the proportional gain
    pub kc_range: [f64; 2],
    /// Inclusive `[low, high]` range of the integration time
    pub ti_range: [f64; 2],
    /// Number of guesses drawn
    pub count: usize,
}

impl Default for RandomGuessConfig {
    fn default() -> Self {
        Self {
            kc_range: [-1.0, 5.0],
            ti_range: [1.0, 100.0],
            count: 1,
        }
    }
}

/// One loop: an actuator column controlled against a measurement column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoopDefinition {
    /// Name used in logs and reports
    pub name: String,
    /// Column holding the actuator command `u`
    pub actuator: String,
    /// Column holding the measured process output `y`
    pub measurement: String,
    /// Setpoint `r` of the loop
    pub setpoint: f64,
    /// Where the initial guesses come from
    pub initial_guesses: GuessStrategy,
}

impl LoopDefinition {
    pub fn new(
        name: impl Into<String>,
        actuator: impl Into<String>,
        measurement: impl Into<String>,
        setpoint: f64,
        initial_guesses: GuessStrategy,
    ) -> Self {
        Self {
            name: name.into(),
            actuator: actuator.into(),
            measurement: measurement.into(),
            setpoint,
            initial_guesses,
        }
    }
}
