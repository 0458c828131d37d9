// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Multi-start, multi-method search
//!
//! Every (initial guess, method) pair is one isolated attempt. A failed
//! attempt is recorded as [`AttemptOutcome::Failed`] and the sweep moves on,
//! so one diverging method never costs the results of the others.

use std::time::Duration;

use log::{debug, warn};
use ndarray::array;

use super::error::IdentificationError;
use super::loops::{ControlLoopSpec, GainGuess};
use super::objective::PiObjective;
use super::optim::{Budgeted, Method, OptimError, OptimizerSettings};
use super::ranking::FitResult;
use crate::config::search::SearchConfig;

/// Result of one (guess, method) attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Fit(FitResult),
    Failed {
        method: Method,
        guess_index: usize,
        reason: IdentificationError,
    },
}

impl AttemptOutcome {
    /// The fit of a successful attempt.
    pub fn into_fit(self) -> Option<FitResult> {
        match self {
            AttemptOutcome::Fit(fit) => Some(fit),
            AttemptOutcome::Failed { .. } => None,
        }
    }
}

/// Runs every configured method from every initial guess of a loop.
#[derive(Debug, Clone)]
pub struct SearchDriver {
    methods: Vec<Method>,
    settings: OptimizerSettings,
    attempt_timeout: Option<Duration>,
    accept_unconverged: bool,
}

impl Default for SearchDriver {
    fn default() -> Self {
        Self::new(Method::ALL.to_vec(), OptimizerSettings::default())
    }
}

impl SearchDriver {
    pub fn new(methods: Vec<Method>, settings: OptimizerSettings) -> Self {
        Self {
            methods,
            settings,
            attempt_timeout: None,
            accept_unconverged: true,
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.methods.clone(), config.optimizer.clone())
            .with_attempt_timeout(config.attempt_timeout_ms.map(Duration::from_millis))
            .with_accept_unconverged(config.accept_unconverged)
    }

    /// Cap the wall-clock time of each attempt; a timed out attempt is dropped.
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Keep results of minimizers that stopped without converging.
    pub fn with_accept_unconverged(mut self, accept: bool) -> Self {
        self.accept_unconverged = accept;
        self
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Run one attempt.
    pub fn attempt(
        &self,
        spec: &ControlLoopSpec,
        guess_index: usize,
        guess: GainGuess,
        method: Method,
    ) -> AttemptOutcome {
        match self.try_attempt(spec, guess_index, guess, method) {
            Ok(fit) => AttemptOutcome::Fit(fit),
            Err(reason) => AttemptOutcome::Failed {
                method,
                guess_index,
                reason,
            },
        }
    }

    fn try_attempt(
        &self,
        spec: &ControlLoopSpec,
        guess_index: usize,
        guess: GainGuess,
        method: Method,
    ) -> Result<FitResult, IdentificationError> {
        let failure = |reason: OptimError| IdentificationError::OptimizerFailure {
            method: method.name().to_string(),
            reason,
        };

        let mut objective =
            PiObjective::new(spec.u(), spec.y(), spec.setpoint(), spec.sample_interval())?;
        let mut budgeted = Budgeted::new(&mut objective, self.attempt_timeout);
        let minimizer = method.minimizer(&self.settings);
        let minimum = minimizer
            .minimize(&mut budgeted, &array![guess.kc, guess.ti])
            .map_err(failure)?;
        let evaluations = budgeted.evaluations();

        if !minimum.fx.is_finite() || minimum.x.iter().any(|v| !v.is_finite()) {
            return Err(failure(OptimError::NotFinite));
        }
        if !minimum.converged() {
            if !self.accept_unconverged {
                return Err(failure(OptimError::Objective(format!(
                    "did not converge ({:?})",
                    minimum.termination
                ))));
            }
            debug!(
                "Loop '{}': {} stopped without converging ({:?})",
                spec.name(),
                method,
                minimum.termination
            );
        }

        debug!(
            "Loop '{}', guess {} ({}, {}), {}: fitness {:.3e} at Kc={:.4}, Ti={:.4} after {} iterations / {} evaluations",
            spec.name(),
            guess_index,
            guess.kc,
            guess.ti,
            method,
            minimum.fx,
            minimum.x[0],
            minimum.x[1],
            minimum.iterations,
            evaluations
        );

        Ok(FitResult {
            fitness: minimum.fx,
            kc: minimum.x[0],
            ti: minimum.x[1],
            method,
            guess_index,
            converged: minimum.converged(),
        })
    }

    /// Every attempt outcome for a loop, guesses outer and methods inner.
    pub fn sweep(&self, spec: &ControlLoopSpec) -> Vec<AttemptOutcome> {
        let mut outcomes = Vec::with_capacity(spec.guesses().len() * self.methods.len());
        for (guess_index, guess) in spec.guesses().iter().enumerate() {
            for &method in &self.methods {
                let outcome = self.attempt(spec, guess_index, *guess, method);
                if let AttemptOutcome::Failed { reason, .. } = &outcome {
                    warn!(
                        "Loop '{}': attempt from guess {} dropped: {}",
                        spec.name(),
                        guess_index,
                        reason
                    );
                }
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// The successful fits of a loop, possibly empty.
    pub fn search(&self, spec: &ControlLoopSpec) -> Vec<FitResult> {
        self.sweep(spec)
            .into_iter()
            .filter_map(AttemptOutcome::into_fit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identification::objective::simulate_actuator;
    use crate::identification::series::TimeSeries;
    use approx::assert_relative_eq;

    fn synthetic_loop(n: usize, guesses: Vec<GainGuess>) -> ControlLoopSpec {
        let y: Vec<f64> = (0..n)
            .map(|i| 3.0 + (0.7 * i as f64).sin() + 0.1 * i as f64)
            .collect();
        let u = simulate_actuator(1.0, &y, 5.0, 2.0, 10.0, 1.0).unwrap();
        ControlLoopSpec::new(
            "synthetic",
            TimeSeries::new(u),
            TimeSeries::new(y),
            5.0,
            1.0,
            guesses,
        )
        .unwrap()
    }

    #[test]
    fn test_nelder_mead_recovers_generated_gains() {
        let spec = synthetic_loop(10, vec![GainGuess::new(1.0, 1.0)]);
        let driver = SearchDriver::new(vec![Method::NelderMead], OptimizerSettings::default());
        let results = driver.search(&spec);
        assert_eq!(results.len(), 1);
        assert!(results[0].fitness < 1e-6, "fitness = {}", results[0].fitness);
        assert_relative_eq!(results[0].kc, 2.0, epsilon = 1e-4);
        assert_relative_eq!(results[0].ti, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_sweep_order_is_guesses_outer_methods_inner() {
        let spec = synthetic_loop(
            12,
            vec![GainGuess::new(1.5, 8.0), GainGuess::new(2.5, 12.0)],
        );
        let driver = SearchDriver::new(
            vec![Method::Powell, Method::NelderMead],
            OptimizerSettings::default(),
        );
        let outcomes = driver.sweep(&spec);
        let order: Vec<(usize, Method)> = outcomes
            .iter()
            .map(|o| match o {
                AttemptOutcome::Fit(fit) => (fit.guess_index, fit.method),
                AttemptOutcome::Failed {
                    guess_index,
                    method,
                    ..
                } => (*guess_index, *method),
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (0, Method::Powell),
                (0, Method::NelderMead),
                (1, Method::Powell),
                (1, Method::NelderMead),
            ]
        );
    }

    #[test]
    fn test_zero_ti_guess_drops_every_attempt() {
        let spec = synthetic_loop(10, vec![GainGuess::new(1.0, 0.0)]);
        let driver = SearchDriver::default();
        let outcomes = driver.sweep(&spec);
        assert_eq!(outcomes.len(), Method::ALL.len());
        for outcome in &outcomes {
            match outcome {
                AttemptOutcome::Failed { reason, .. } => assert!(matches!(
                    reason,
                    IdentificationError::OptimizerFailure {
                        reason: OptimError::Objective(_),
                        ..
                    }
                )),
                AttemptOutcome::Fit(fit) => panic!("unexpected fit {}", fit),
            }
        }
        assert!(driver.search(&spec).is_empty());
    }

    #[test]
    fn test_unconverged_results_can_be_rejected() {
        let spec = synthetic_loop(10, vec![GainGuess::new(1.0, 1.0)]);
        let settings = OptimizerSettings {
            max_iterations: 2,
            ..OptimizerSettings::default()
        };
        let lenient = SearchDriver::new(vec![Method::NelderMead], settings.clone());
        let strict = lenient.clone().with_accept_unconverged(false);

        let kept = lenient.search(&spec);
        assert_eq!(kept.len(), 1);
        assert!(!kept[0].converged);
        assert!(strict.search(&spec).is_empty());
    }

    #[test]
    fn test_search_is_deterministic() {
        let spec = synthetic_loop(15, vec![GainGuess::new(0.5, 0.5)]);
        let driver = SearchDriver::default();
        let a = driver.search(&spec);
        let b = driver.search(&spec);
        assert_eq!(a, b);
    }
}
