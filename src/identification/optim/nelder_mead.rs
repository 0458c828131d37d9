// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use log::trace;
use ndarray::Array1;

use super::{
    reject_nan, start_value, CostFunction, Minimizer, Minimum, OptimError, OptimizerSettings,
    Termination,
};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Nelder-Mead downhill simplex.
///
/// The initial simplex perturbs each non-zero coordinate by 5% and each zero
/// coordinate by 0.00025. After convergence the search restarts from the best
/// vertex with a fresh simplex, up to `restarts` times, as long as a restart
/// still improves the objective. This guards against simplex collapse on the
/// kinks of non-smooth objectives.
#[derive(Debug, Clone)]
pub struct NelderMead {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    restarts: usize,
}

impl NelderMead {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
            restarts: settings.simplex_restarts,
        }
    }

    fn initial_simplex(x0: &Array1<f64>) -> Vec<Array1<f64>> {
        let mut simplex = Vec::with_capacity(x0.len() + 1);
        simplex.push(x0.clone());
        for i in 0..x0.len() {
            let mut vertex = x0.clone();
            vertex[i] = if vertex[i] != 0.0 {
                vertex[i] * 1.05
            } else {
                0.00025
            };
            simplex.push(vertex);
        }
        simplex
    }

    /// One simplex descent from `x0` with a budget of `max_iterations`.
    fn descend(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
        f0: f64,
        max_iterations: usize,
    ) -> Result<Minimum, OptimError> {
        let n = x0.len();
        let mut simplex = Self::initial_simplex(x0);
        let mut values = Vec::with_capacity(n + 1);
        values.push(f0);
        for vertex in simplex.iter().skip(1) {
            values.push(reject_nan(cost.cost(vertex)?)?);
        }

        for iter in 0..max_iterations {
            // Order vertices by value, best first
            let mut order: Vec<usize> = (0..=n).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let x_spread = simplex
                .iter()
                .skip(1)
                .flat_map(|v| (v - &simplex[0]).into_iter())
                .fold(0.0_f64, |acc, d| acc.max(d.abs()));
            let f_spread = values
                .iter()
                .skip(1)
                .fold(0.0_f64, |acc, f| acc.max((f - values[0]).abs()));
            if x_spread <= self.x_tolerance && f_spread <= self.f_tolerance {
                return Ok(Minimum {
                    x: simplex[0].clone(),
                    fx: values[0],
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            let mut centroid = Array1::<f64>::zeros(n);
            for vertex in simplex.iter().take(n) {
                centroid += vertex;
            }
            centroid /= n as f64;

            let worst = &simplex[n];
            let reflected = &centroid + &((&centroid - worst) * REFLECTION);
            let f_reflected = reject_nan(cost.cost(&reflected)?)?;

            if f_reflected < values[0] {
                let expanded = &centroid + &((&reflected - &centroid) * EXPANSION);
                let f_expanded = reject_nan(cost.cost(&expanded)?)?;
                if f_expanded < f_reflected {
                    simplex[n] = expanded;
                    values[n] = f_expanded;
                } else {
                    simplex[n] = reflected;
                    values[n] = f_reflected;
                }
                continue;
            }

            if f_reflected < values[n - 1] {
                simplex[n] = reflected;
                values[n] = f_reflected;
                continue;
            }

            // Contraction, outside when the reflection improved on the worst vertex
            let (contracted, limit) = if f_reflected < values[n] {
                (
                    &centroid + &((&reflected - &centroid) * CONTRACTION),
                    f_reflected,
                )
            } else {
                (
                    &centroid + &((worst - &centroid) * CONTRACTION),
                    values[n],
                )
            };
            let f_contracted = reject_nan(cost.cost(&contracted)?)?;
            if f_contracted <= limit {
                simplex[n] = contracted;
                values[n] = f_contracted;
                continue;
            }

            // Shrink toward the best vertex
            let best = simplex[0].clone();
            for i in 1..=n {
                simplex[i] = &best + &((&simplex[i] - &best) * SHRINK);
                values[i] = reject_nan(cost.cost(&simplex[i])?)?;
            }
        }

        let best = (0..=n)
            .min_by(|&a, &b| values[a].total_cmp(&values[b]))
            .unwrap_or(0);
        Ok(Minimum {
            x: simplex[best].clone(),
            fx: values[best],
            iterations: max_iterations,
            termination: Termination::IterationLimit,
        })
    }
}

impl Minimizer for NelderMead {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let f0 = start_value(cost, x0)?;
        let mut best = self.descend(cost, x0, f0, self.max_iterations)?;

        for restart in 0..self.restarts {
            let remaining = self.max_iterations.saturating_sub(best.iterations);
            if remaining == 0 || !best.converged() {
                break;
            }
            let candidate = self.descend(cost, &best.x, best.fx, remaining)?;
            let improved = candidate.fx < best.fx - self.f_tolerance;
            trace!(
                "Nelder-Mead restart {}: {:.3e} -> {:.3e}",
                restart + 1,
                best.fx,
                candidate.fx
            );
            let iterations = best.iterations + candidate.iterations;
            if candidate.fx <= best.fx {
                best = Minimum {
                    iterations,
                    ..candidate
                };
            } else {
                best.iterations = iterations;
            }
            if !improved {
                break;
            }
        }

        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_nelder_mead_rosenbrock() {
        let mut f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let nm = NelderMead::new(&OptimizerSettings::default());
        let r = nm.minimize(&mut f, &array![-1.2, 1.0]).unwrap();
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(r.x[1], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_nelder_mead_non_smooth() {
        // f(x) = |x0 - 2| + |x1 + 1|
        let mut f = |x: &Array1<f64>| (x[0] - 2.0).abs() + (x[1] + 1.0).abs();
        let nm = NelderMead::new(&OptimizerSettings::default());
        let r = nm.minimize(&mut f, &array![0.0, 0.0]).unwrap();
        assert!(r.fx < 1e-6, "fx = {}", r.fx);
        assert_relative_eq!(r.x[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(r.x[1], -1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_nelder_mead_non_finite_start() {
        let mut f = |_: &Array1<f64>| f64::INFINITY;
        let nm = NelderMead::new(&OptimizerSettings::default());
        assert_eq!(
            nm.minimize(&mut f, &array![1.0, 1.0]).unwrap_err(),
            OptimError::NonFiniteStart
        );
    }

    #[test]
    fn test_nelder_mead_iteration_limit() {
        let settings = OptimizerSettings {
            max_iterations: 3,
            ..OptimizerSettings::default()
        };
        let mut f = |x: &Array1<f64>| x[0] * x[0] + x[1] * x[1];
        let r = NelderMead::new(&settings)
            .minimize(&mut f, &array![5.0, 5.0])
            .unwrap();
        assert_eq!(r.termination, Termination::IterationLimit);
        assert!(r.fx < 50.0);
    }
}
