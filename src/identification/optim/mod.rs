// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! General nonlinear minimizers
//!
//! Every method of the catalog implements [`Minimizer`] and works on any
//! [`CostFunction`] over an `n`-dimensional parameter vector. The catalog
//! itself is the [`Method`] enumeration, which maps each variant to a boxed
//! minimizer configured from [`OptimizerSettings`].
//!
//! # Derivative-free
//!
//! - [`NelderMead`]: downhill simplex with restarts
//! - [`Powell`]: conjugate direction set with Brent line minimization
//! - [`Cobyla`]: linear models on a simplex inside a shrinking trust region,
//!   with optional box bounds
//!
//! # Gradient-based (central finite differences)
//!
//! - [`ConjugateGradient`]: Polak-Ribière+ nonlinear conjugate gradient
//! - [`Bfgs`]: quasi-Newton with Armijo backtracking
//! - [`LBfgsB`]: limited-memory BFGS with optional box bounds
//! - [`Tnc`]: truncated Newton with Hessian-vector products and optional box bounds
//! - [`Slsqp`]: sequential quadratic programming with optional box bounds
//! - [`TrustRegion`]: Steihaug-CG trust region with optional box bounds

mod bfgs;
mod cobyla;
mod conjugate_gradient;
mod finite_difference;
mod lbfgsb;
pub(crate) mod line_search;
mod lu;
mod nelder_mead;
mod powell;
mod slsqp;
mod tnc;
mod trust_region;

use std::fmt;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bfgs::Bfgs;
pub use cobyla::Cobyla;
pub use conjugate_gradient::ConjugateGradient;
pub use finite_difference::central_gradient;
pub use lbfgsb::LBfgsB;
pub use nelder_mead::NelderMead;
pub use powell::Powell;
pub use slsqp::Slsqp;
pub use tnc::Tnc;
pub use trust_region::TrustRegion;

/// Errors from a single minimization run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    #[error("objective is not finite at the initial point")]
    NonFiniteStart,

    #[error("computed value is NaN or infinity")]
    NotFinite,

    #[error("attempt exceeded its time budget after {elapsed:?}")]
    TimedOut { elapsed: Duration },

    #[error("expected a {expected}-dimensional parameter vector, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("objective evaluation failed: {0}")]
    Objective(String),
}

/// A scalar function to minimize.
pub trait CostFunction {
    fn cost(&mut self, x: &Array1<f64>) -> Result<f64, OptimError>;
}

impl<F> CostFunction for F
where
    F: FnMut(&Array1<f64>) -> f64,
{
    fn cost(&mut self, x: &Array1<f64>) -> Result<f64, OptimError> {
        Ok(self(x))
    }
}

/// How a minimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A convergence criterion was met.
    Converged,
    /// The iteration limit was reached first.
    IterationLimit,
    /// No further decrease could be found (precision loss).
    Stalled,
}

/// Final point of a minimization run.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Array1<f64>,
    pub fx: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl Minimum {
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Capability shared by all methods of the catalog.
pub trait Minimizer: Send + Sync {
    /// Minimize `cost` starting from `x0`.
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError>;
}

/// Optional box constraints, one `[lower, upper]` pair per parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    /// Clamp `x` into the box in place.
    pub fn project(&self, x: &mut Array1<f64>) {
        for (i, xi) in x.iter_mut().enumerate() {
            if let Some(lo) = self.lower.get(i) {
                *xi = xi.max(*lo);
            }
            if let Some(hi) = self.upper.get(i) {
                *xi = xi.min(*hi);
            }
        }
    }

    pub(crate) fn projected(&self, x: &Array1<f64>) -> Array1<f64> {
        let mut p = x.clone();
        self.project(&mut p);
        p
    }
}

/// Tolerances and limits shared by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Maximum number of iterations per run
    pub max_iterations: usize,
    /// Absolute tolerance on the parameters
    pub x_tolerance: f64,
    /// Absolute tolerance on the objective value
    pub f_tolerance: f64,
    /// Tolerance on the gradient norm for gradient-based methods
    pub gradient_tolerance: f64,
    /// Number of simplex restarts after Nelder-Mead convergence
    pub simplex_restarts: usize,
    /// Number of correction pairs kept by L-BFGS-B
    pub lbfgs_memory: usize,
    /// Initial trust region radius
    pub initial_trust_radius: f64,
    /// Box constraints; Nelder-Mead, Powell, CG and BFGS ignore them
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            x_tolerance: 1e-10,
            f_tolerance: 1e-12,
            gradient_tolerance: 1e-8,
            simplex_restarts: 3,
            lbfgs_memory: 10,
            initial_trust_radius: 1.0,
            bounds: None,
        }
    }
}

/// Catalog of optimization methods, in sweep order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
    ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Downhill simplex (derivative-free)
    NelderMead,
    /// Conjugate direction set (derivative-free)
    Powell,
    /// Nonlinear conjugate gradient
    ConjugateGradient,
    /// Quasi-Newton BFGS
    Bfgs,
    /// Limited-memory BFGS with optional bounds
    LBfgsB,
    /// Truncated Newton with optional bounds
    Tnc,
    /// Linear approximation trust region (derivative-free) with optional bounds
    Cobyla,
    /// Sequential quadratic programming with optional bounds
    Slsqp,
    /// Trust region with optional bounds
    TrustRegion,
}

impl Method {
    /// The full catalog in its fixed order.
    pub const ALL: [Method; 9] = [
        Method::NelderMead,
        Method::Powell,
        Method::ConjugateGradient,
        Method::Bfgs,
        Method::LBfgsB,
        Method::Tnc,
        Method::Cobyla,
        Method::Slsqp,
        Method::TrustRegion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Method::NelderMead => "Nelder-Mead",
            Method::Powell => "Powell",
            Method::ConjugateGradient => "CG",
            Method::Bfgs => "BFGS",
            Method::LBfgsB => "L-BFGS-B",
            Method::Tnc => "TNC",
            Method::Cobyla => "COBYLA",
            Method::Slsqp => "SLSQP",
            Method::TrustRegion => "Trust-Region",
        }
    }

    /// Position in the catalog, used to break fitness ties.
    pub fn catalog_index(&self) -> usize {
        Method::ALL
            .iter()
            .position(|m| m == self)
            .unwrap_or(Method::ALL.len())
    }

    /// Build the minimizer implementing this method.
    pub fn minimizer(&self, settings: &OptimizerSettings) -> Box<dyn Minimizer> {
        match self {
            Method::NelderMead => Box::new(NelderMead::new(settings)),
            Method::Powell => Box::new(Powell::new(settings)),
            Method::ConjugateGradient => Box::new(ConjugateGradient::new(settings)),
            Method::Bfgs => Box::new(Bfgs::new(settings)),
            Method::LBfgsB => Box::new(LBfgsB::new(settings)),
            Method::Tnc => Box::new(Tnc::new(settings)),
            Method::Cobyla => Box::new(Cobyla::new(settings)),
            Method::Slsqp => Box::new(Slsqp::new(settings)),
            Method::TrustRegion => Box::new(TrustRegion::new(settings)),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cost function wrapper enforcing an optional wall-clock deadline.
pub struct Budgeted<'a> {
    inner: &'a mut dyn CostFunction,
    started: Instant,
    limit: Option<Duration>,
    evaluations: usize,
}

impl<'a> Budgeted<'a> {
    pub fn new(inner: &'a mut dyn CostFunction, limit: Option<Duration>) -> Self {
        Self {
            inner,
            started: Instant::now(),
            limit,
            evaluations: 0,
        }
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

impl CostFunction for Budgeted<'_> {
    fn cost(&mut self, x: &Array1<f64>) -> Result<f64, OptimError> {
        if let Some(limit) = self.limit {
            let elapsed = self.started.elapsed();
            if elapsed > limit {
                return Err(OptimError::TimedOut { elapsed });
            }
        }
        self.evaluations += 1;
        self.inner.cost(x)
    }
}

/// Euclidean norm.
pub(crate) fn norm(v: &Array1<f64>) -> f64 {
    v.dot(v).sqrt()
}

/// Evaluate the starting point, rejecting non-finite values.
pub(crate) fn start_value(cost: &mut dyn CostFunction, x0: &Array1<f64>) -> Result<f64, OptimError> {
    let f0 = cost.cost(x0)?;
    if f0.is_finite() {
        Ok(f0)
    } else {
        Err(OptimError::NonFiniteStart)
    }
}

/// NaN is an error; infinities are kept and compare worse than any finite value.
pub(crate) fn reject_nan(value: f64) -> Result<f64, OptimError> {
    if value.is_nan() {
        Err(OptimError::NotFinite)
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests;
