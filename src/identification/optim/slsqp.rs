// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

use super::finite_difference::central_gradient;
use super::line_search::backtracking_armijo;
use super::lu::Lu;
use super::{
    norm, start_value, Bounds, CostFunction, Minimizer, Minimum, OptimError, OptimizerSettings,
    Termination,
};

const ARMIJO_C1: f64 = 1e-4;
const ARMIJO_RHO: f64 = 0.5;
const MAX_LINE_SEARCH: usize = 60;
const DAMPING: f64 = 0.2;

/// Sequential quadratic programming with optional box bounds.
///
/// Each iteration minimizes the quadratic model `g·p + ½ pᵀBp` over the steps
/// that keep `x + p` inside the box, using a primal active set. `B` is a
/// BFGS approximation of the Hessian with Powell's damping, so it stays
/// positive definite. Steps are accepted by Armijo backtracking; since the
/// box is convex every shortened step stays feasible.
#[derive(Debug, Clone)]
pub struct Slsqp {
    max_iterations: usize,
    x_tolerance: f64,
    f_tolerance: f64,
    gradient_tolerance: f64,
    bounds: Option<Bounds>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Active {
    Lower,
    Upper,
}

impl Slsqp {
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

    /// Admissible step range `[lo, hi]` around `x`, infinite where unbounded.
    fn step_limits(&self, x: &Array1<f64>) -> (Array1<f64>, Array1<f64>) {
        let n = x.len();
        let mut lo = Array1::from_elem(n, f64::NEG_INFINITY);
        let mut hi = Array1::from_elem(n, f64::INFINITY);
        if let Some(bounds) = &self.bounds {
            for i in 0..n {
                if let Some(l) = bounds.lower.get(i) {
                    lo[i] = (l - x[i]).min(0.0);
                }
                if let Some(u) = bounds.upper.get(i) {
                    hi[i] = (u - x[i]).max(0.0);
                }
            }
        }
        (lo, hi)
    }
}

/// Minimize `g·p + ½ pᵀBp` subject to `lo ≤ p ≤ hi`, with `lo ≤ 0 ≤ hi`.
///
/// `None` when a reduced system is singular.
fn box_qp(
    b: &Array2<f64>,
    g: &Array1<f64>,
    lo: &Array1<f64>,
    hi: &Array1<f64>,
) -> Option<Array1<f64>> {
    let n = g.len();
    let mut p = Array1::<f64>::zeros(n);
    let mut active: Vec<Option<Active>> = (0..n)
        .map(|i| {
            if lo[i] == 0.0 && g[i] > 0.0 {
                Some(Active::Lower)
            } else if hi[i] == 0.0 && g[i] < 0.0 {
                Some(Active::Upper)
            } else {
                None
            }
        })
        .collect();

    for _ in 0..(4 * n + 4) {
        let free: Vec<usize> = (0..n).filter(|&i| active[i].is_none()).collect();

        // Minimizer over the free components with the active ones held fixed
        let mut candidate = p.clone();
        if !free.is_empty() {
            let m = free.len();
            let mut reduced = Array2::<f64>::zeros((m, m));
            let mut rhs = Array1::<f64>::zeros(m);
            for (r, &i) in free.iter().enumerate() {
                for (c, &j) in free.iter().enumerate() {
                    reduced[(r, c)] = b[(i, j)];
                }
                let coupling: f64 = (0..n)
                    .filter(|&j| active[j].is_some())
                    .map(|j| b[(i, j)] * p[j])
                    .sum();
                rhs[r] = -(g[i] + coupling);
            }
            let solution = Lu::new(&reduced)?.solve(&rhs);
            for (r, &i) in free.iter().enumerate() {
                candidate[i] = solution[r];
            }
        }

        // Longest feasible move toward the candidate
        let mut t = 1.0;
        let mut blocking = None;
        for &i in &free {
            let delta = candidate[i] - p[i];
            if candidate[i] < lo[i] && delta < 0.0 {
                let ti = (lo[i] - p[i]) / delta;
                if ti < t {
                    t = ti;
                    blocking = Some((i, Active::Lower));
                }
            } else if candidate[i] > hi[i] && delta > 0.0 {
                let ti = (hi[i] - p[i]) / delta;
                if ti < t {
                    t = ti;
                    blocking = Some((i, Active::Upper));
                }
            }
        }
        if let Some((i, side)) = blocking {
            p = &p + &((&candidate - &p) * t);
            p[i] = match side {
                Active::Lower => lo[i],
                Active::Upper => hi[i],
            };
            active[i] = Some(side);
            continue;
        }
        p = candidate;

        // Release the bound whose multiplier has the wrong sign
        let model_gradient = b.dot(&p) + g;
        let release = (0..n)
            .filter_map(|i| match active[i] {
                Some(Active::Lower) if model_gradient[i] < 0.0 => Some((i, -model_gradient[i])),
                Some(Active::Upper) if model_gradient[i] > 0.0 => Some((i, model_gradient[i])),
                _ => None,
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        match release {
            Some((i, _)) => active[i] = None,
            None => return Some(p),
        }
    }

    Some(p)
}

/// Damped BFGS update of the Hessian approximation.
fn damped_update(b: &mut Array2<f64>, s: &Array1<f64>, y: &Array1<f64>) {
    let bs = b.dot(s);
    let sbs = s.dot(&bs);
    if sbs <= 0.0 {
        return;
    }
    let sy = s.dot(y);
    let theta = if sy >= DAMPING * sbs {
        1.0
    } else {
        (1.0 - DAMPING) * sbs / (sbs - sy)
    };
    let r = y * theta + &bs * (1.0 - theta);
    let sr = s.dot(&r);
    if sr <= f64::EPSILON * sbs {
        return;
    }

    // B += r⊗r / s·r - Bs⊗Bs / s·Bs
    let n = s.len();
    for i in 0..n {
        for j in 0..n {
            b[(i, j)] += r[i] * r[j] / sr - bs[i] * bs[j] / sbs;
        }
    }
}

impl Minimizer for Slsqp {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let n = x0.len();
        let mut x = self.project(x0);
        let mut fx = start_value(cost, &x)?;
        let mut g = central_gradient(cost, &x)?;
        let mut b = Array2::<f64>::eye(n);
        let mut reset = true;

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

            let (lo, hi) = self.step_limits(&x);
            let mut p = box_qp(&b, &g, &lo, &hi);
            let descends = p.as_ref().is_some_and(|p| g.dot(p) < 0.0);
            if !descends && !reset {
                b = Array2::eye(n);
                reset = true;
                p = box_qp(&b, &g, &lo, &hi);
            }
            let Some(p) = p.filter(|p| g.dot(p) < 0.0) else {
                // No feasible descent left in the model
                return Ok(Minimum {
                    x,
                    fx,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            };

            let step = backtracking_armijo(
                cost,
                &x,
                &p,
                fx,
                g.dot(&p),
                1.0,
                ARMIJO_C1,
                ARMIJO_RHO,
                MAX_LINE_SEARCH,
            )?;
            let Some((alpha, f_new)) = step else {
                if reset {
                    return Ok(Minimum {
                        x,
                        fx,
                        iterations: iter,
                        termination: Termination::Stalled,
                    });
                }
                b = Array2::eye(n);
                reset = true;
                continue;
            };

            let x_new = self.project(&(&x + &(&p * alpha)));
            let s = &x_new - &x;
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

            let g_new = central_gradient(cost, &x_new)?;
            damped_update(&mut b, &s, &(&g_new - &g));
            reset = false;

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
    fn test_slsqp_rosenbrock() {
        let mut f = |x: &Array1<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let r = Slsqp::new(&OptimizerSettings::default())
            .minimize(&mut f, &array![-1.2, 1.0])
            .unwrap();
        assert_relative_eq!(r.x[0], 1.0, epsilon = 1e-3);
        assert_relative_eq!(r.x[1], 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_box_qp_clamps_and_keeps_free_component_optimal() {
        // Unconstrained minimizer (-16, -6) lies below the lower step limit on axis 0
        let b = Array2::<f64>::eye(2);
        let g = array![16.0, 6.0];
        let p = box_qp(&b, &g, &array![-5.0, -15.0], &array![5.0, 5.0]).unwrap();
        assert_relative_eq!(p[0], -5.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], -6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_box_qp_releases_a_wrong_sign_bound() {
        // Axis 1 starts pinned by its gradient sign, the coupling pulls it off the bound
        let b = array![[2.0, -1.9], [-1.9, 2.0]];
        let g = array![-4.0, 1.0];
        let p = box_qp(&b, &g, &array![-100.0, 0.0], &array![100.0, 100.0]).unwrap();
        let unconstrained = Lu::new(&b).unwrap().solve(&-&g);
        assert!(unconstrained[1] > 0.0);
        assert_relative_eq!(p[0], unconstrained[0], epsilon = 1e-10);
        assert_relative_eq!(p[1], unconstrained[1], epsilon = 1e-10);
    }

    #[test]
    fn test_damped_update_keeps_curvature_positive() {
        let mut b = Array2::<f64>::eye(2);
        // Negative curvature pair would break a plain BFGS update
        damped_update(&mut b, &array![1.0, 0.0], &array![-1.0, 0.0]);
        let lu = Lu::new(&b).unwrap();
        assert!(lu.det() > 0.0);
        assert!(b[(0, 0)] > 0.0);
    }

    #[test]
    fn test_slsqp_active_bound() {
        let settings = OptimizerSettings {
            bounds: Some(Bounds {
                lower: vec![0.0, -10.0],
                upper: vec![10.0, 10.0],
            }),
            ..OptimizerSettings::default()
        };
        let mut f = |x: &Array1<f64>| (x[0] + 3.0).powi(2) + (x[1] - 2.0).powi(2);
        let r = Slsqp::new(&settings).minimize(&mut f, &array![5.0, 5.0]).unwrap();
        assert_relative_eq!(r.x[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(r.x[1], 2.0, epsilon = 1e-4);
        assert_relative_eq!(r.fx, 9.0, epsilon = 1e-6);
    }
}
