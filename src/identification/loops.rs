// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Control loop assembly
//!
//! Pairs each actuator command series with its process measurement, setpoint
//! and initial gain guesses. Random guesses come from an owned, explicitly
//! seeded generator, so a build is reproducible for a given seed.

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::error::IdentificationError;
use super::series::{ProcessData, TimeSeries};
use crate::config::identification::{IdentificationConfig, LoopDefinition, RandomGuessConfig};

/// A `(Kc, Ti)` pair seeding one optimization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GainGuess {
    /// Proportional gain
    pub kc: f64,
    /// Integration time
    pub ti: f64,
}

impl GainGuess {
    pub fn new(kc: f64, ti: f64) -> Self {
        Self { kc, ti }
    }
}

/// Where a loop's initial guesses come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GuessStrategy {
    /// Explicit guesses
    Fixed { guesses: Vec<GainGuess> },
    /// The random guess set drawn once per build and shared by every loop using it
    SharedRandom,
}

/// One PI loop to identify.
#[derive(Debug, Clone)]
pub struct ControlLoopSpec {
    name: String,
    u: TimeSeries,
    y: TimeSeries,
    setpoint: f64,
    sample_interval: f64,
    guesses: Vec<GainGuess>,
}

impl ControlLoopSpec {
    /// Validate and assemble a loop.
    ///
    /// # Errors
    ///
    /// * [`IdentificationError::ShapeMismatch`] if `u` and `y` differ in length
    /// * [`IdentificationError::TooFewSamples`] if fewer than 2 samples remain
    /// * [`IdentificationError::InvalidParameter`] for a non-finite setpoint or a
    ///   non-positive sample interval
    /// * [`IdentificationError::NoInitialGuess`] if `guesses` is empty
    pub fn new(
        name: impl Into<String>,
        u: TimeSeries,
        y: TimeSeries,
        setpoint: f64,
        sample_interval: f64,
        guesses: Vec<GainGuess>,
    ) -> Result<Self, IdentificationError> {
        let name = name.into();
        if u.len() != y.len() {
            return Err(IdentificationError::ShapeMismatch {
                u_len: u.len(),
                y_len: y.len(),
            });
        }
        if u.len() < 2 {
            return Err(IdentificationError::TooFewSamples { len: u.len() });
        }
        if !setpoint.is_finite() {
            return Err(IdentificationError::invalid(format!(
                "setpoint of loop '{}' must be finite",
                name
            )));
        }
        if !(sample_interval.is_finite() && sample_interval > 0.0) {
            return Err(IdentificationError::invalid(format!(
                "sample interval must be positive, got {}",
                sample_interval
            )));
        }
        if guesses.is_empty() {
            return Err(IdentificationError::NoInitialGuess { loop_name: name });
        }
        Ok(Self {
            name,
            u,
            y,
            setpoint,
            sample_interval,
            guesses,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn u(&self) -> &[f64] {
        &self.u
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn sample_interval(&self) -> f64 {
        self.sample_interval
    }

    pub fn guesses(&self) -> &[GainGuess] {
        &self.guesses
    }
}

fn check_range(name: &str, [low, high]: [f64; 2]) -> Result<(), IdentificationError> {
    if low.is_finite() && high.is_finite() && low <= high {
        Ok(())
    } else {
        Err(IdentificationError::invalid(format!(
            "{} must be a finite [low, high] range, got [{}, {}]",
            name, low, high
        )))
    }
}

/// Draw `count` guesses uniformly from the configured ranges, Kc before Ti.
fn draw_random_guesses(
    rng: &mut StdRng,
    config: &RandomGuessConfig,
) -> Result<Vec<GainGuess>, IdentificationError> {
    check_range("kc_range", config.kc_range)?;
    check_range("ti_range", config.ti_range)?;
    let [kc_lo, kc_hi] = config.kc_range;
    let [ti_lo, ti_hi] = config.ti_range;
    Ok((0..config.count)
        .map(|_| {
            let kc = rng.random_range(kc_lo..=kc_hi);
            let ti = rng.random_range(ti_lo..=ti_hi);
            GainGuess::new(kc, ti)
        })
        .collect())
}

/// Builds [`ControlLoopSpec`]s from process data and loop definitions.
pub struct LoopConfigurationBuilder<'a> {
    loops: &'a [LoopDefinition],
    random: &'a RandomGuessConfig,
    sample_interval: f64,
    rng: StdRng,
}

impl<'a> LoopConfigurationBuilder<'a> {
    pub fn new(config: &'a IdentificationConfig) -> Self {
        Self {
            loops: &config.loops,
            random: &config.random_guess,
            sample_interval: config.sample_interval,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Replace the configured seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Assemble one spec per loop definition, in definition order.
    pub fn build(mut self, data: &ProcessData) -> Result<Vec<ControlLoopSpec>, IdentificationError> {
        let mut shared_random: Option<Vec<GainGuess>> = None;
        let mut specs = Vec::with_capacity(self.loops.len());

        for definition in self.loops {
            let guesses = match &definition.initial_guesses {
                GuessStrategy::Fixed { guesses } => guesses.clone(),
                GuessStrategy::SharedRandom => match &shared_random {
                    Some(drawn) => drawn.clone(),
                    None => {
                        let drawn = draw_random_guesses(&mut self.rng, self.random)?;
                        info!("Drew shared random initial guesses: {:?}", drawn);
                        shared_random = Some(drawn.clone());
                        drawn
                    }
                },
            };

            let u = data.column(&definition.actuator)?.clone();
            let y = data.column(&definition.measurement)?.clone();
            debug!(
                "Loop '{}': {} -> {}, setpoint {}, {} guess(es)",
                definition.name,
                definition.actuator,
                definition.measurement,
                definition.setpoint,
                guesses.len()
            );
            specs.push(ControlLoopSpec::new(
                definition.name.clone(),
                u,
                y,
                definition.setpoint,
                self.sample_interval,
                guesses,
            )?);
        }

        Ok(specs)
    }
}

/// The three standard loops of the multi-loop recording.
///
/// `data` must provide the columns `uc, uh, up` (actuators) and `Vc, Tco, Thi`
/// (measurements); `setpoints` are given in the same loop order. The first
/// loop starts from the fixed guess `(0.5, 0.5)`, the other two share one
/// random guess drawn from `seed`.
pub fn build_default_loops(
    data: &ProcessData,
    setpoints: [f64; 3],
    sample_interval: f64,
    seed: u64,
) -> Result<Vec<ControlLoopSpec>, IdentificationError> {
    let mut config = IdentificationConfig {
        sample_interval,
        seed,
        ..IdentificationConfig::default()
    };
    for (definition, setpoint) in config.loops.iter_mut().zip(setpoints) {
        definition.setpoint = setpoint;
    }
    LoopConfigurationBuilder::new(&config).build(data)
}
