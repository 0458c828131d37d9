// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::Array1;

use super::finite_difference::central_gradient;
use super::line_search::backtracking_armijo;
use super::{
    norm, start_value, CostFunction, Minimizer, Minimum, OptimError, OptimizerSettings,
    Termination,
};

const ARMIJO_C1: f64 = 1e-4;
const ARMIJO_RHO: f64 = 0.5;
const MAX_LINE_SEARCH: usize = 60;

/// Nonlinear conjugate gradient with the Polak-Ribière+ update.
///
/// The direction is reset to steepest descent whenever it stops being a
/// descent direction or every `n` iterations.
#[derive(Debug, Clone)]
pub struct ConjugateGradient {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    gradient_tolerance: f64,
}

impl ConjugateGradient {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
        }
    }
}

impl Minimizer for ConjugateGradient {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let n = x0.len();
        let mut x = x0.clone();
        let mut fx = start_value(cost, x0)?;
        let mut g = central_gradient(cost, &x)?;
        let mut d = -&g;
        // Previous accepted step length, reused to scale the next trial step
        let mut last_alpha = 1.0 / norm(&g).max(1.0);

        for iter in 0..self.max_iterations {
            if norm(&g) < self.gradient_tolerance {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            let mut slope = g.dot(&d);
            if slope >= 0.0 || (iter > 0 && iter % n == 0) {
                d = -&g;
                slope = -g.dot(&g);
            }

            let alpha0 = (2.0 * last_alpha).min(1e6);
            let step = backtracking_armijo(
                cost,
                &x,
                &d,
                fx,
                slope,
                alpha0,
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
            last_alpha = alpha;

            let s = &d * alpha;
            let x_new = &x + &s;
            let g_new = central_gradient(cost, &x_new)?;

            let small_step = norm(&s) < self.x_tolerance * (1.0 + norm(&x));
            let small_change = (fx - f_new).abs() < self.f_tolerance * (1.0 + fx.abs());

            // Polak-Ribière+ coefficient
            let beta = (g_new.dot(&(&g_new - &g)) / g.dot(&g)).max(0.0);
            d = -&g_new + &(&d * beta);

            x = x_new;
            fx = f_new;
            g = g_new;

            if small_step || small_change {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter + 1,
                    termination: Termination::Converged,
                });
            }
        }

        Ok(Minimum {
            x,
            fx,
            iterations: self.max_iterations,
            termination: Termination::IterationLimit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_cg_quadratic() {
        let mut f = |x: &Array1<f64>| (x[0] - 3.0).powi(2) + 10.0 * (x[1] + 1.0).powi(2);
        let r = ConjugateGradient::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![0.0, 0.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 3.0, epsilon = 1e-4);
        assert_relative_eq!(r.x[1], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_cg_never_increases_objective_on_kink() {
        let mut f = |x: &Array1<f64>| (x[0] - 1.0).abs() * 1e-3 + 5.0;
        let r = ConjugateGradient::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![4.0])
            .unwrap();
        assert!(r.fx <= 5.003 + 1e-12);
        assert!((r.x[0] - 1.0).abs() < 3.0);
    }
}
