// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

use super::finite_difference::central_gradient;
use super::line_search::backtracking_armijo;
use super::{
    norm, start_value, CostFunction, Minimizer, Minimum, OptimError, OptimizerSettings,
    Termination,
};

const ARMIJO_C1: f64 = 1e-4;
const ARMIJO_RHO: f64 = 0.5;
const MAX_LINE_SEARCH: usize = 60;

/// BFGS quasi-Newton minimization.
///
/// Maintains an inverse Hessian approximation `H`, initialized to identity,
/// and uses Armijo backtracking for the step length. Gradients come from
/// central finite differences.
#[derive(Debug, Clone)]
pub struct Bfgs {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    gradient_tolerance: f64,
}

impl Bfgs {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
        }
    }
}

impl Minimizer for Bfgs {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let n = x0.len();
        let mut x = x0.clone();
        let mut fx = start_value(cost, x0)?;
        let mut g = central_gradient(cost, &x)?;
        let mut h = Array2::<f64>::eye(n);

        for iter in 0..self.max_iterations {
            if norm(&g) < self.gradient_tolerance {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            // Search direction: p = -H * g, reset H if not a descent direction
            let mut p = -h.dot(&g);
            let mut grad_dot_p = g.dot(&p);
            if grad_dot_p >= 0.0 {
                h = Array2::eye(n);
                p = -&g;
                grad_dot_p = -g.dot(&g);
            }

            let step = backtracking_armijo(
                cost,
                &x,
                &p,
                fx,
                grad_dot_p,
                1.0,
                ARMIJO_C1,
                ARMIJO_RHO,
                MAX_LINE_SEARCH,
            )?;
            let Some((alpha, f_new)) = step else {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Stalled,
                });
            };

            let s = &p * alpha;
            let x_new = &x + &s;
            let g_new = central_gradient(cost, &x_new)?;

            if norm(&s) < self.x_tolerance * (1.0 + norm(&x))
                || (fx - f_new).abs() < self.f_tolerance * (1.0 + fx.abs())
            {
                return Ok(Minimum {
                    x: x_new,
                    fx: f_new,
                    iterations: iter + 1,
                    termination: Termination::Converged,
                });
            }

            let y = &g_new - &g;
            let ys = y.dot(&s);
            if ys > f64::EPSILON {
                let rho = 1.0 / ys;
                let hy = h.dot(&y);
                let factor = (1.0 + rho * y.dot(&hy)) * rho;

                // H += factor * s⊗s - rho * (Hy⊗s + s⊗Hy)
                for i in 0..n {
                    for j in 0..n {
                        h[(i, j)] += factor * s[i] * s[j] - rho * (hy[i] * s[j] + s[i] * hy[j]);
                    }
                }
            }

            x = x_new;
            fx = f_new;
            g = g_new;
        }

        Ok(Minimum {
            x,
            fx,
            iterations: self.max_iterations,
            termination: Termination::IterationLimit,
        })
    }
}
