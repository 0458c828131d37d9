// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::Array1;

use super::finite_difference::central_gradient;
use super::trust_region::steihaug_cg;
use super::{
    norm, reject_nan, start_value, Bounds, CostFunction, Minimizer, Minimum, OptimError,
    OptimizerSettings, Termination,
};

const ARMIJO_C1: f64 = 1e-4;
const ARMIJO_RHO: f64 = 0.5;
const MAX_LINE_SEARCH: usize = 60;
const MAX_STEP: f64 = 1e3;

/// Truncated Newton minimization with optional box bounds.
///
/// Each outer iteration solves the Newton system `H·p = -g` approximately
/// with conjugate gradient. `H` is never formed: products `H·v` come from
/// differencing central gradients along `v`. Variables held at a bound by
/// the gradient are frozen for the iteration, and the projected step is
/// accepted by Armijo backtracking.
#[derive(Debug, Clone)]
pub struct Tnc {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    gradient_tolerance: f64,
    bounds: Option<Bounds>,
}

impl Tnc {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
            bounds: settings.bounds.clone(),
        }
    }

    fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        match &self.bounds {
            Some(bounds) => bounds.projected(x),
            None => x.clone(),
        }
    }

    /// `true` for components pinned at a bound that the gradient pushes against.
    fn frozen(&self, x: &Array1<f64>, g: &Array1<f64>) -> Vec<bool> {
        let Some(bounds) = &self.bounds else {
            return vec![false; x.len()];
        };
        (0..x.len())
            .map(|i| {
                let at_lower = bounds.lower.get(i).is_some_and(|lo| x[i] <= *lo);
                let at_upper = bounds.upper.get(i).is_some_and(|hi| x[i] >= *hi);
                (at_lower && g[i] > 0.0) || (at_upper && g[i] < 0.0)
            })
            .collect()
    }
}

fn mask(v: &mut Array1<f64>, frozen: &[bool]) {
    for (vi, &fixed) in v.iter_mut().zip(frozen) {
        if fixed {
            *vi = 0.0;
        }
    }
}

/// `H·v` from central gradients at `x ± h·v`.
fn hessian_vector_product(
    cost: &mut dyn CostFunction,
    x: &Array1<f64>,
    v: &Array1<f64>,
) -> Result<Array1<f64>, OptimError> {
    let v_norm = norm(v);
    if v_norm == 0.0 {
        return Ok(Array1::zeros(x.len()));
    }
    let h = f64::EPSILON.powf(0.25) * (1.0 + norm(x)) / v_norm;
    let forward = x + &(v * h);
    let backward = x - &(v * h);
    let product =
        (central_gradient(cost, &forward)? - central_gradient(cost, &backward)?) / (2.0 * h);
    if product.iter().all(|p| p.is_finite()) {
        Ok(product)
    } else {
        Err(OptimError::NotFinite)
    }
}

impl Minimizer for Tnc {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let mut x = self.project(x0);
        let mut fx = start_value(cost, &x)?;
        let mut g = central_gradient(cost, &x)?;

        for iter in 0..self.max_iterations {
            let projected_gradient = &self.project(&(&x - &g)) - &x;
            if norm(&projected_gradient) < self.gradient_tolerance {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            let frozen = self.frozen(&x, &g);
            let mut reduced = g.clone();
            mask(&mut reduced, &frozen);

            // Inexact Newton step on the free variables
            let cg_tol = norm(&reduced).sqrt().min(0.5) * norm(&reduced);
            let radius = MAX_STEP * (1.0 + norm(&x));
            let mut d = steihaug_cg(
                &reduced,
                |v| {
                    let mut v = v.clone();
                    mask(&mut v, &frozen);
                    let mut hv = hessian_vector_product(cost, &x, &v)?;
                    mask(&mut hv, &frozen);
                    Ok(hv)
                },
                radius,
                cg_tol,
            )?;
            mask(&mut d, &frozen);
            if g.dot(&d) >= 0.0 {
                d = -&reduced;
            }
            if g.dot(&d) >= 0.0 {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            // Projected backtracking search
            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..MAX_LINE_SEARCH {
                let trial = self.project(&(&x + &(&d * alpha)));
                let f_trial = reject_nan(cost.cost(&trial)?)?;
                if f_trial <= fx + ARMIJO_C1 * g.dot(&(&trial - &x)) {
                    accepted = Some((trial, f_trial));
                    break;
                }
                alpha *= ARMIJO_RHO;
            }
            let Some((x_new, f_new)) = accepted else {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Stalled,
                });
            };

            let step = norm(&(&x_new - &x));
            if step < self.x_tolerance * (1.0 + norm(&x))
                || (fx - f_new).abs() < self.f_tolerance * (1.0 + fx.abs())
            {
                return Ok(Minimum {
                    x: x_new,
                    fx: f_new,
                    iterations: iter + 1,
                    termination: Termination::Converged,
                });
            }

            g = central_gradient(cost, &x_new)?;
            x = x_new;
            fx = f_new;
        }

        Ok(Minimum {
            x,
            fx,
            iterations: self.max_iterations,
            termination: Termination::IterationLimit,
        })
    }
}
