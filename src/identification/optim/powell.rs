// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

use super::line_search::minimize_along;
use super::{
    norm, reject_nan, start_value, CostFunction, Minimizer, Minimum, OptimError,
    OptimizerSettings, Termination,
};

const LINE_TOLERANCE: f64 = 1e-8;
const LINE_ITERATIONS: usize = 200;

/// Powell's conjugate direction method.
///
/// Starts from the coordinate directions, minimizes along each one in turn,
/// and replaces the direction of largest decrease with the overall
/// displacement of the sweep when the extrapolation test allows it.
#[derive(Debug, Clone)]
pub struct Powell {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
}

impl Powell {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            f_tolerance: settings.f_tolerance,
        }
    }
}

impl Minimizer for Powell {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let n = x0.len();
        let mut x = x0.clone();
        let mut fx = start_value(cost, x0)?;
        let mut directions = Array2::<f64>::eye(n);

        for iter in 0..self.max_iterations {
            let x_start = x.clone();
            let f_start = fx;
            let mut largest_drop = 0.0;
            let mut largest_index = 0;

            for i in 0..n {
                let d = directions.row(i).to_owned();
                let f_before = fx;
                let (t, f_new) = minimize_along(cost, &x, &d, fx, LINE_TOLERANCE, LINE_ITERATIONS)?;
                if f_new < fx {
                    x.scaled_add(t, &d);
                    fx = f_new;
                }
                if f_before - fx > largest_drop {
                    largest_drop = f_before - fx;
                    largest_index = i;
                }
            }

            let displacement = &x - &x_start;
            let converged_f =
                2.0 * (f_start - fx) <= self.f_tolerance * (f_start.abs() + fx.abs()) + 1e-300;
            if converged_f || norm(&displacement) <= self.x_tolerance {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter + 1,
                    termination: Termination::Converged,
                });
            }

            // Extrapolated point along the sweep displacement
            let extrapolated = &x + &displacement;
            let f_extrapolated = reject_nan(cost.cost(&extrapolated)?)?;
            if f_extrapolated < f_start {
                let t1 = f_start - fx - largest_drop;
                let t2 = f_start - f_extrapolated;
                let test = 2.0 * (f_start - 2.0 * fx + f_extrapolated) * t1 * t1
                    - largest_drop * t2 * t2;
                if test < 0.0 {
                    let (t, f_new) = minimize_along(
                        cost,
                        &x,
                        &displacement,
                        fx,
                        LINE_TOLERANCE,
                        LINE_ITERATIONS,
                    )?;
                    if f_new < fx {
                        x.scaled_add(t, &displacement);
                        fx = f_new;
                    }
                    let last = n - 1;
                    let replaced = directions.row(last).to_owned();
                    directions.row_mut(largest_index).assign(&replaced);
                    directions.row_mut(last).assign(&displacement);
                }
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
    fn test_powell_quadratic_with_coupling() {
        let mut f = |x: &Array1<f64>| {
            let a = x[0] - 1.0;
            let b = x[1] + 2.0;
            a * a + a * b + 2.0 * b * b
        };
        let r = Powell::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![5.0, 5.0])
            .unwrap();
        assert!(r.converged());
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-5);
        assert_relative_eq!(r.x[1], -2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_powell_rosenbrock() {
        let mut f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let r = Powell::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![-1.2, 1.0])
            .unwrap();
        assert!(r.fx < 1e-8, "fx = {}", r.fx);
    }
}
