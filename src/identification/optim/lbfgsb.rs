// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::collections::VecDeque;

use ndarray::Array1;

use super::finite_difference::central_gradient;
use super::{
    norm, reject_nan, start_value, Bounds, CostFunction, Minimizer, Minimum, OptimError,
    OptimizerSettings, Termination,
};

const ARMIJO_C1: f64 = 1e-4;
const ARMIJO_RHO: f64 = 0.5;
const MAX_LINE_SEARCH: usize = 60;

/// Limited-memory BFGS with optional box bounds.
///
/// The search direction comes from the two-loop recursion over the last
/// `memory` correction pairs. Components blocked by an active bound are
/// frozen, and trial points are projected back into the box before being
/// evaluated. Without bounds this is plain L-BFGS.
#[derive(Debug, Clone)]
pub struct LBfgsB {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    gradient_tolerance: f64,
    memory: usize,
    bounds: Option<Bounds>,
}

impl LBfgsB {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
            memory: settings.lbfgs_memory.max(1),
            bounds: settings.bounds.clone(),
        }
    }

    fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        match &self.bounds {
            Some(bounds) => bounds.projected(x),
            None => x.clone(),
        }
    }

    /// Zero the components of `d` that would leave the box from `x`.
    fn freeze_active(&self, x: &Array1<f64>, d: &mut Array1<f64>) {
        let Some(bounds) = &self.bounds else {
            return;
        };
        for i in 0..d.len() {
            let at_lower = bounds.lower.get(i).is_some_and(|lo| x[i] <= *lo);
            let at_upper = bounds.upper.get(i).is_some_and(|hi| x[i] >= *hi);
            if (at_lower && d[i] < 0.0) || (at_upper && d[i] > 0.0) {
                d[i] = 0.0;
            }
        }
    }

    /// Two-loop recursion computing `-H * g`.
    fn direction(g: &Array1<f64>, pairs: &VecDeque<(Array1<f64>, Array1<f64>, f64)>) -> Array1<f64> {
        let mut q = g.clone();
        let mut alphas = Vec::with_capacity(pairs.len());
        for (s, y, rho) in pairs.iter().rev() {
            let a = rho * s.dot(&q);
            q.scaled_add(-a, y);
            alphas.push(a);
        }
        if let Some((s, y, _)) = pairs.back() {
            let gamma = s.dot(y) / y.dot(y);
            q *= gamma;
        }
        for ((s, y, rho), a) in pairs.iter().zip(alphas.iter().rev()) {
            let b = rho * y.dot(&q);
            q.scaled_add(a - b, s);
        }
        -q
    }
}

impl Minimizer for LBfgsB {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let mut x = self.project(x0);
        let mut fx = start_value(cost, &x)?;
        let mut g = central_gradient(cost, &x)?;
        let mut pairs: VecDeque<(Array1<f64>, Array1<f64>, f64)> =
            VecDeque::with_capacity(self.memory);

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

            let mut d = Self::direction(&g, &pairs);
            self.freeze_active(&x, &mut d);
            if g.dot(&d) >= 0.0 {
                pairs.clear();
                d = -&g;
                self.freeze_active(&x, &mut d);
            }
            if g.dot(&d) >= 0.0 {
                // Every descent component is blocked by a bound
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            // Projected backtracking search
            let mut alpha = if pairs.is_empty() {
                1.0 / norm(&d).max(1.0)
            } else {
                1.0
            };
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

            let g_new = central_gradient(cost, &x_new)?;
            let s = &x_new - &x;
            let y = &g_new - &g;

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

            let ys = y.dot(&s);
            if ys > f64::EPSILON * y.dot(&y) {
                if pairs.len() == self.memory {
                    pairs.pop_front();
                }
                pairs.push_back((s, y, 1.0 / ys));
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

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_lbfgs_unbounded_rosenbrock() {
        let mut f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let r = LBfgsB::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![-1.2, 1.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(r.x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_lbfgsb_active_bound() {
        // Unconstrained minimum at (-3, 2); x0 is bounded below by 0
        let settings = OptimizerSettings {
            bounds: Some(Bounds {
                lower: vec![0.0, -10.0],
                upper: vec![10.0, 10.0],
            }),
            ..OptimizerSettings::default()
        };
        let mut f = |x: &Array1<f64>| (x[0] + 3.0).powi(2) + (x[1] - 2.0).powi(2);
        let r = LBfgsB::new(&settings)
            .minimize(&mut f, &array![5.0, 5.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 0.0, epsilon = 1e-8);
        assert_relative_eq!(r.x[1], 2.0, epsilon = 1e-4);
        assert_relative_eq!(r.fx, 9.0, epsilon = 1e-6);
    }

    #[test]
    fn test_lbfgsb_projects_infeasible_start() {
        let settings = OptimizerSettings {
            bounds: Some(Bounds {
                lower: vec![1.0],
                upper: vec![2.0],
            }),
            ..OptimizerSettings::default()
        };
        let mut f = |x: &Array1<f64>| x[0] * x[0];
        let r = LBfgsB::new(&settings).minimize(&mut f, &array![-4.0]).unwrap();
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-12);
    }
}
