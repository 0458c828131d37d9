// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

use super::lu::Lu;
use super::{
    norm, reject_nan, start_value, Bounds, CostFunction, Minimizer, Minimum, OptimError,
    OptimizerSettings, Termination,
};

/// Smallest acceptable `|det|` of the normalized simplex edge matrix.
const MIN_POISEDNESS: f64 = 1e-3;

/// Derivative-free minimization by linear approximation in a trust region.
///
/// A simplex of `n + 1` evaluated points around the best point defines a
/// linear model of the objective. Each iteration steps a distance `rho`
/// down the model slope, clipped to the box when bounds are set. A successful
/// step replaces the simplex vertex farthest from it. When the model stops
/// predicting progress the simplex is rebuilt, and `rho` is halved once a
/// freshly built simplex also fails. The run converges when `rho` falls
/// below the parameter tolerance.
#[derive(Debug, Clone)]
pub struct Cobyla {
    max_iterations: usize,
    rho_begin: f64,
    rho_end: f64,
    bounds: Option<Bounds>,
}

impl Cobyla {
    pub fn new(settings: &OptimizerSettings) -> Self {
        let rho_end = settings.x_tolerance.max(f64::EPSILON);
        Self {
            max_iterations: settings.max_iterations,
            rho_begin: settings.initial_trust_radius.max(rho_end),
            rho_end,
            bounds: settings.bounds.clone(),
        }
    }

    fn project(&self, x: &Array1<f64>) -> Array1<f64> {
        match &self.bounds {
            Some(bounds) => bounds.projected(x),
            None => x.clone(),
        }
    }

    /// Offset along axis `i` from `x`, flipped or shortened to stay in the box.
    fn axis_offset(&self, x: &Array1<f64>, i: usize, rho: f64) -> f64 {
        let Some(bounds) = &self.bounds else {
            return rho;
        };
        let room_up = bounds.upper.get(i).map_or(f64::INFINITY, |hi| hi - x[i]);
        let room_down = bounds.lower.get(i).map_or(f64::INFINITY, |lo| x[i] - lo);
        if room_up >= rho {
            rho
        } else if room_down >= rho {
            -rho
        } else if room_up >= room_down {
            room_up
        } else {
            -room_down
        }
    }

    /// Evaluate a new simplex made of `best` plus one offset per axis.
    fn simplex_around(
        &self,
        cost: &mut dyn CostFunction,
        best: &Array1<f64>,
        rho: f64,
    ) -> Result<Vec<(Array1<f64>, f64)>, OptimError> {
        let mut vertices = Vec::with_capacity(best.len());
        for i in 0..best.len() {
            let mut vertex = best.clone();
            vertex[i] += self.axis_offset(best, i, rho);
            let f = reject_nan(cost.cost(&vertex)?)?;
            vertices.push((vertex, f));
        }
        Ok(vertices)
    }
}

/// Slope of the linear interpolant through `best` and the other vertices.
///
/// `None` when the vertices are too close to degenerate, too far from `best`
/// for the current `rho`, or carry infinite values.
fn linear_model(
    best: &Array1<f64>,
    f_best: f64,
    vertices: &[(Array1<f64>, f64)],
    rho: f64,
) -> Option<Array1<f64>> {
    let n = best.len();
    let mut edges = Array2::<f64>::zeros((n, n));
    let mut normalized = Array2::<f64>::zeros((n, n));
    let mut rise = Array1::<f64>::zeros(n);
    for (row, (vertex, f)) in vertices.iter().enumerate() {
        let edge = vertex - best;
        let length = norm(&edge);
        if length == 0.0 || length > 2.0 * rho || !f.is_finite() {
            return None;
        }
        normalized.row_mut(row).assign(&(&edge / length));
        edges.row_mut(row).assign(&edge);
        rise[row] = f - f_best;
    }

    let poisedness = Lu::new(&normalized)?.det().abs();
    if poisedness < MIN_POISEDNESS {
        return None;
    }
    let slope = Lu::new(&edges)?.solve(&rise);
    slope.iter().all(|s| s.is_finite()).then_some(slope)
}

impl Minimizer for Cobyla {
    fn minimize(
        &self,
        cost: &mut dyn CostFunction,
        x0: &Array1<f64>,
    ) -> Result<Minimum, OptimError> {
        let mut best = self.project(x0);
        let mut f_best = start_value(cost, &best)?;
        let mut rho = self.rho_begin;
        let mut vertices = self.simplex_around(cost, &best, rho)?;
        let mut fresh = true;

        for iter in 0..self.max_iterations {
            if rho < self.rho_end {
                return Ok(Minimum {
                    x: best,
                    fx: f_best,
                    iterations: iter,
                    termination: Termination::Converged,
                });
            }

            let mut improved = false;
            if let Some(slope) = linear_model(&best, f_best, &vertices, rho) {
                let slope_norm = norm(&slope);
                let trial = if slope_norm > 0.0 {
                    self.project(&(&best - &(&slope * (rho / slope_norm))))
                } else {
                    best.clone()
                };
                if trial != best {
                    let f_trial = reject_nan(cost.cost(&trial)?)?;
                    if f_trial < f_best {
                        let farthest = vertices
                            .iter()
                            .enumerate()
                            .map(|(i, (v, _))| (i, norm(&(v - &trial))))
                            .max_by(|a, b| a.1.total_cmp(&b.1))
                            .map_or(0, |(i, _)| i);
                        let previous = std::mem::replace(&mut best, trial);
                        vertices[farthest] = (previous, f_best);
                        f_best = f_trial;
                        improved = true;
                        fresh = false;
                    }
                }
            }

            if !improved {
                if fresh {
                    rho *= 0.5;
                }
                vertices = self.simplex_around(cost, &best, rho)?;
                fresh = true;
            }
        }

        Ok(Minimum {
            x: best,
            fx: f_best,
            iterations: self.max_iterations,
            termination: Termination::IterationLimit,
        })
    }
}
