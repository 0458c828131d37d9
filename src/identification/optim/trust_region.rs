// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::Array1;

use super::finite_difference::{central_gradient, gradient_hessian};
use super::{
    norm, reject_nan, start_value, Bounds, CostFunction, Minimizer, Minimum, OptimError,
    OptimizerSettings, Termination,
};

const ETA: f64 = 0.1;
const MAX_RADIUS: f64 = 1e4;

/// Trust region method with a Steihaug truncated-CG subproblem solver.
///
/// The model uses a finite-difference Hessian, so indefinite curvature is
/// handled by following negative-curvature directions to the region boundary.
/// Optional box bounds are enforced by projecting each trial point.
#[derive(Debug, Clone)]
pub struct TrustRegion {
    max_iterations: usize,
    x_tolerance: f64,
    gradient_tolerance: f64,
    initial_radius: f64,
    bounds: Option<Bounds>,
}

impl TrustRegion {
    pub fn new(settings: &OptimizerSettings) -> Self {
        Self {
            max_iterations: settings.max_iterations,
            x_tolerance: settings.x_tolerance,
            gradient_tolerance: settings.gradient_tolerance,
            initial_radius: settings.initial_trust_radius,
            bounds: settings.bounds.clone(),
        }
    }

    fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        match &self.bounds {
            Some(bounds) => bounds.projected(x),
            None => x.clone(),
        }
    }
}

/// Positive root `τ` of `‖z + τ·d‖ = radius`.
fn boundary_step(z: &Array1<f64>, d: &Array1<f64>, radius: f64) -> f64 {
    let a = d.dot(d);
    let b = 2.0 * z.dot(d);
    let c = z.dot(z) - radius * radius;
    let disc = (b * b - 4.0 * a * c).max(0.0);
    (-b + disc.sqrt()) / (2.0 * a)
}

/// Approximately minimize `g·p + ½ pᵀBp` subject to `‖p‖ ≤ radius`.
///
/// The model Hessian is only seen through `hessian_times`, which returns `B·d`.
pub(crate) fn steihaug_cg<H>(
    g: &Array1<f64>,
    mut hessian_times: H,
    radius: f64,
    tol: f64,
) -> Result<Array1<f64>, OptimError>
where
    H: FnMut(&Array1<f64>) -> Result<Array1<f64>, OptimError>,
{
    let n = g.len();
    let mut z = Array1::<f64>::zeros(n);
    let mut r = g.clone();
    let mut d = -g;

    if norm(&r) < tol {
        return Ok(z);
    }

    for _ in 0..(2 * n).max(2) {
        let bd = hessian_times(&d)?;
        let curvature = d.dot(&bd);
        if curvature <= 0.0 {
            let tau = boundary_step(&z, &d, radius);
            return Ok(&z + &(&d * tau));
        }

        let alpha = r.dot(&r) / curvature;
        let z_next = &z + &(&d * alpha);
        if norm(&z_next) >= radius {
            let tau = boundary_step(&z, &d, radius);
            return Ok(&z + &(&d * tau));
        }

        let r_next = &r + &(&bd * alpha);
        if norm(&r_next) < tol {
            return Ok(z_next);
        }

        let beta = r_next.dot(&r_next) / r.dot(&r);
        d = -&r_next + &(&d * beta);
        z = z_next;
        r = r_next;
    }

    Ok(z)
}

impl Minimizer for TrustRegion {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let mut x = self.project(x0);
        let mut fx = start_value(cost, &x)?;
        let mut g = central_gradient(cost, &x)?;
        let mut hess = gradient_hessian(cost, &x)?;
        let mut radius = self.initial_radius;

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
            if radius < self.x_tolerance * (1.0 + norm(&x)) {
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Stalled,
                });
            }

            let cg_tol = norm(&g).sqrt().min(0.5) * norm(&g);
            let p = steihaug_cg(&g, |d| Ok(hess.dot(d)), radius, cg_tol)?;
            let trial = self.project(&(&x + &p));
            let s = &trial - &x;
            let predicted = -(g.dot(&s) + 0.5 * s.dot(&hess.dot(&s)));

            if predicted <= 0.0 || norm(&s) == 0.0 {
                radius *= 0.25;
                continue;
            }

            let f_trial = reject_nan(cost.cost(&trial)?)?;
            let ratio = (fx - f_trial) / predicted;

            if ratio < 0.25 {
                radius = 0.25 * norm(&s);
            } else if ratio > 0.75 && norm(&s) >= 0.99 * radius {
                radius = (2.0 * radius).min(MAX_RADIUS);
            }

            if ratio > ETA {
                x = trial;
                fx = f_trial;
                g = central_gradient(cost, &x)?;
                hess = gradient_hessian(cost, &x)?;
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
    fn test_trust_region_rosenbrock() {
        let mut f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let r = TrustRegion::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![-1.2, 1.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(r.x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_steihaug_stops_at_boundary_on_negative_curvature() {
        let g = array![1.0, 0.0];
        let b = array![[-1.0, 0.0], [0.0, 1.0]];
        let p = steihaug_cg(&g, |d| Ok(b.dot(d)), 2.0, 1e-10).unwrap();
        assert_relative_eq!(norm(&p), 2.0, epsilon = 1e-12);
        assert!(p[0] < 0.0);
    }

    #[test]
    fn test_steihaug_interior_newton_step() {
        // Positive definite model with its minimizer inside the region
        let g = array![2.0, -4.0];
        let b = array![[2.0, 0.0], [0.0, 4.0]];
        let p = steihaug_cg(&g, |d| Ok(b.dot(d)), 10.0, 1e-12).unwrap();
        assert_relative_eq!(p[0], -1.0, epsilon = 1e-10);
        assert_relative_eq!(p[1], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_trust_region_respects_bounds() {
        let settings = OptimizerSettings {
            bounds: Some(Bounds {
                lower: vec![0.5],
                upper: vec![3.0],
            }),
            ..OptimizerSettings::default()
        };
        let mut f = |x: &Array1<f64>| (x[0] - 5.0).powi(2);
        let r = TrustRegion::new(&settings)
            .minimize(&mut f, &array![1.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 3.0, epsilon = 1e-12);
    }
}
