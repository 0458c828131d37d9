// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::Array1;

use super::{reject_nan, CostFunction, OptimError};

const GOLDEN: f64 = 1.618_033_988_749_895;
const CGOLD: f64 = 0.381_966_011_250_105;

/// Backtracking line search satisfying the Armijo (sufficient decrease) condition.
///
/// Starts with `alpha = alpha0` and contracts by factor `rho` until:
/// `f(x + α·p) ≤ f(x) + c1·α·(∇f · p)`
///
/// Returns `Ok(Some((alpha, f_new)))` on success and `Ok(None)` when no step
/// satisfies the condition within `max_iter` contractions.
#[allow(clippy::too_many_arguments)]
pub(crate) fn backtracking_armijo(
    cost: &mut dyn CostFunction,
    x: &Array1<f64>,
    p: &Array1<f64>,
    f_at_x: f64,
    grad_dot_p: f64,
    alpha0: f64,
    c1: f64,
    rho: f64,
    max_iter: usize,
) -> Result<Option<(f64, f64)>, OptimError> {
    let mut alpha = alpha0;

    for _ in 0..max_iter {
        let x_new = x + &(p * alpha);
        let f_new = reject_nan(cost.cost(&x_new)?)?;

        if f_new <= f_at_x + c1 * alpha * grad_dot_p {
            return Ok(Some((alpha, f_new)));
        }

        alpha *= rho;
    }

    Ok(None)
}

/// Minimize `f(x + t·d)` over the scalar `t`.
///
/// Brackets a minimum by golden-section expansion from `[0, 1]`, then refines
/// it with Brent's parabolic interpolation. Returns `(t, f)`.
pub(crate) fn minimize_along(
    cost: &mut dyn CostFunction,
    x: &Array1<f64>,
    d: &Array1<f64>,
    f_at_x: f64,
    tol: f64,
    max_iter: usize,
) -> Result<(f64, f64), OptimError> {
    let mut phi = |t: f64| -> Result<f64, OptimError> {
        let point = x + &(d * t);
        reject_nan(cost.cost(&point)?)
    };

    // Bracket, walking downhill from the better of t = 0 and t = 1
    let (mut a, mut b, mut fb) = (0.0, 1.0, phi(1.0)?);
    if fb > f_at_x {
        (a, b, fb) = (1.0, 0.0, f_at_x);
    }
    let mut c = b + GOLDEN * (b - a);
    let mut fc = phi(c)?;
    let mut expansions = 0;
    while fb > fc && expansions < 50 {
        a = b;
        b = c;
        fb = fc;
        c = b + GOLDEN * (b - a);
        fc = phi(c)?;
        expansions += 1;
    }
    if fb > fc {
        // Still descending: accept the farthest point
        return Ok((c, fc));
    }

    // Brent refinement on [lo, hi] around b
    let (mut lo, mut hi) = if a < c { (a, c) } else { (c, a) };
    let (mut x_best, mut w, mut v) = (b, b, b);
    let (mut fx_best, mut fw, mut fv) = (fb, fb, fb);
    let mut e: f64 = 0.0;
    let mut step: f64 = 0.0;

    for _ in 0..max_iter {
        let mid = 0.5 * (lo + hi);
        let tol1 = tol * x_best.abs() + 1e-12;
        let tol2 = 2.0 * tol1;
        if (x_best - mid).abs() <= tol2 - 0.5 * (hi - lo) {
            break;
        }

        let mut golden_step = true;
        if e.abs() > tol1 {
            let r = (x_best - w) * (fx_best - fv);
            let mut q = (x_best - v) * (fx_best - fw);
            let mut p = (x_best - v) * q - (x_best - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let e_prev = e;
            e = step;
            if p.abs() < (0.5 * q * e_prev).abs() && p > q * (lo - x_best) && p < q * (hi - x_best)
            {
                step = p / q;
                let u = x_best + step;
                if u - lo < tol2 || hi - u < tol2 {
                    step = if mid >= x_best { tol1 } else { -tol1 };
                }
                golden_step = false;
            }
        }
        if golden_step {
            e = if x_best >= mid { lo - x_best } else { hi - x_best };
            step = CGOLD * e;
        }

        let u = if step.abs() >= tol1 {
            x_best + step
        } else if step > 0.0 {
            x_best + tol1
        } else {
            x_best - tol1
        };
        let fu = phi(u)?;

        if fu <= fx_best {
            if u >= x_best {
                lo = x_best;
            } else {
                hi = x_best;
            }
            v = w;
            fv = fw;
            w = x_best;
            fw = fx_best;
            x_best = u;
            fx_best = fu;
        } else {
            if u < x_best {
                lo = u;
            } else {
                hi = u;
            }
            if fu <= fw || w == x_best {
                v = w;
                fv = fw;
                w = u;
                fw = fu;
            } else if fu <= fv || v == x_best || v == w {
                v = u;
                fv = fu;
            }
        }
    }

    Ok((x_best, fx_best))
}
