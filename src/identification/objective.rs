// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PI control-law objective
//!
//! The discrete PI law in velocity form predicts each actuator command from
//! the previous command and the current and previous control errors:
//!
//! ```text
//! u[i] = u[i-1] + Kc * ((1 + Ts/Ti) * (r - y[i]) - (r - y[i-1]))
//! ```
//!
//! The fitness of a gain pair is the mean absolute difference between that
//! prediction and the recorded command, over every sample that has a
//! predecessor.

use ndarray::Array1;

use super::error::IdentificationError;
use super::optim::{CostFunction, OptimError};

fn check_finite(name: &str, value: f64) -> Result<(), IdentificationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(IdentificationError::invalid(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}

fn check_shape(u: &[f64], y: &[f64]) -> Result<(), IdentificationError> {
    if u.len() != y.len() {
        return Err(IdentificationError::ShapeMismatch {
            u_len: u.len(),
            y_len: y.len(),
        });
    }
    if u.len() < 2 {
        return Err(IdentificationError::TooFewSamples { len: u.len() });
    }
    Ok(())
}

fn check_gains(kc: f64, ti: f64) -> Result<(), IdentificationError> {
    check_finite("Kc", kc)?;
    check_finite("Ti", ti)?;
    if ti == 0.0 {
        return Err(IdentificationError::invalid(
            "integration time Ti must be non-zero",
        ));
    }
    Ok(())
}

/// `1 + Ts/Ti`, rejected when a tiny `Ti` overflows it.
fn integral_factor(ti: f64, ts: f64) -> Result<f64, IdentificationError> {
    let factor = 1.0 + ts / ti;
    if factor.is_finite() {
        Ok(factor)
    } else {
        Err(IdentificationError::invalid(format!(
            "Ts/Ti overflows for Ti = {:e}",
            ti
        )))
    }
}

/// Mean absolute prediction error of the PI recurrence.
///
/// # Errors
///
/// * [`IdentificationError::ShapeMismatch`] if `u` and `y` differ in length
/// * [`IdentificationError::TooFewSamples`] if fewer than 2 samples are given
/// * [`IdentificationError::InvalidParameter`] if `Ti == 0`, any scalar is not finite,
///   or the gains overflow the recurrence
///
/// # Example
///
/// ```
/// use rust_pi_identification::identification::objective::evaluate;
///
/// let y = [4.0, 4.5, 4.8];
/// let u = [1.0, 2.0, 2.5];
/// let fitness = evaluate(&u, &y, 5.0, 2.0, 10.0, 1.0).unwrap();
/// assert!(fitness >= 0.0);
/// ```
pub fn evaluate(
    u: &[f64],
    y: &[f64],
    setpoint: f64,
    kc: f64,
    ti: f64,
    ts: f64,
) -> Result<f64, IdentificationError> {
    check_shape(u, y)?;
    check_finite("setpoint", setpoint)?;
    check_finite("Ts", ts)?;
    check_gains(kc, ti)?;
    mean_abs_error(u, y, setpoint, kc, integral_factor(ti, ts)?)
}

fn mean_abs_error(
    u: &[f64],
    y: &[f64],
    setpoint: f64,
    kc: f64,
    integral_factor: f64,
) -> Result<f64, IdentificationError> {
    let total: f64 = (1..u.len())
        .map(|i| {
            let predicted = u[i - 1]
                + kc * (integral_factor * (setpoint - y[i]) - (setpoint - y[i - 1]));
            (predicted - u[i]).abs()
        })
        .sum();
    let fitness = total / (u.len() - 1) as f64;
    if fitness.is_nan() {
        return Err(IdentificationError::invalid(format!(
            "Kc = {:e} with Ts/Ti = {:e} overflows the PI recurrence",
            kc,
            integral_factor - 1.0
        )));
    }
    Ok(fitness)
}

/// Actuator commands produced by the PI recurrence for a measured output.
///
/// `u[0]` is `u0`; every later command follows the control law exactly, so
/// [`evaluate`] on the result with the same gains returns zero (up to rounding).
pub fn simulate_actuator(
    u0: f64,
    y: &[f64],
    setpoint: f64,
    kc: f64,
    ti: f64,
    ts: f64,
) -> Result<Vec<f64>, IdentificationError> {
    check_finite("u0", u0)?;
    check_finite("setpoint", setpoint)?;
    check_finite("Ts", ts)?;
    check_gains(kc, ti)?;
    let factor = integral_factor(ti, ts)?;
    if y.is_empty() {
        return Ok(Vec::new());
    }

    let mut u = Vec::with_capacity(y.len());
    u.push(u0);
    for i in 1..y.len() {
        let next = u[i - 1] + kc * (factor * (setpoint - y[i]) - (setpoint - y[i - 1]));
        u.push(next);
    }
    Ok(u)
}

/// The PI objective bound to one loop's data, evaluated over `[Kc, Ti]`.
#[derive(Debug, Clone, Copy)]
pub struct PiObjective<'a> {
    u: &'a [f64],
    y: &'a [f64],
    setpoint: f64,
    ts: f64,
}

impl<'a> PiObjective<'a> {
    pub fn new(
        u: &'a [f64],
        y: &'a [f64],
        setpoint: f64,
        ts: f64,
    ) -> Result<Self, IdentificationError> {
        check_shape(u, y)?;
        check_finite("setpoint", setpoint)?;
        check_finite("Ts", ts)?;
        Ok(Self {
            u,
            y,
            setpoint,
            ts,
        })
    }

    /// Fitness of the gain pair `(kc, ti)`.
    pub fn evaluate(&self, kc: f64, ti: f64) -> Result<f64, IdentificationError> {
        check_gains(kc, ti)?;
        mean_abs_error(
            self.u,
            self.y,
            self.setpoint,
            kc,
            integral_factor(ti, self.ts)?,
        )
    }
}

impl CostFunction for PiObjective<'_> {
    fn cost(&mut self, x: &Array1<f64>) -> Result<f64, OptimError> {
        if x.len() != 2 {
            return Err(OptimError::DimensionMismatch {
                expected: 2,
                found: x.len(),
            });
        }
        self.evaluate(x[0], x[1])
            .map_err(|e| OptimError::Objective(e.to_string()))
    }
}
