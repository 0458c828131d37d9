// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

use super::{CostFunction, OptimError};

/// Approximate the gradient of `f: R^n → R` using central finite differences.
///
/// Uses step size `h_j = ε^(1/3) * max(|x_j|, 1)` for each component,
/// requiring `2n` function evaluations.
pub fn central_gradient(
    cost: &mut dyn CostFunction,
    x: &Array1<f64>,
) -> Result<Array1<f64>, OptimError> {
    let cbrt_eps = f64::EPSILON.cbrt();
    let mut grad = Array1::<f64>::zeros(x.len());

    for j in 0..x.len() {
        let h = cbrt_eps * x[j].abs().max(1.0);
        let mut forward = x.clone();
        let mut backward = x.clone();
        forward[j] += h;
        backward[j] -= h;
        grad[j] = (cost.cost(&forward)? - cost.cost(&backward)?) / (2.0 * h);
    }

    if grad.iter().all(|g| g.is_finite()) {
        Ok(grad)
    } else {
        Err(OptimError::NotFinite)
    }
}

/// Approximate the Hessian by differencing central gradients, then symmetrize.
pub(crate) fn gradient_hessian(
    cost: &mut dyn CostFunction,
    x: &Array1<f64>,
) -> Result<Array2<f64>, OptimError> {
    let n = x.len();
    let step_eps = f64::EPSILON.powf(0.25);
    let mut hess = Array2::<f64>::zeros((n, n));

    for j in 0..n {
        let h = step_eps * x[j].abs().max(1.0);
        let mut forward = x.clone();
        let mut backward = x.clone();
        forward[j] += h;
        backward[j] -= h;
        let column = (central_gradient(cost, &forward)? - central_gradient(cost, &backward)?)
            / (2.0 * h);
        hess.column_mut(j).assign(&column);
    }

    let symmetric = (&hess + &hess.t()) * 0.5;
    Ok(symmetric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_central_gradient_quadratic() {
        // f(x) = x0^2 + 2*x1^2, grad = [2*x0, 4*x1]
        let mut f = |x: &Array1<f64>| x[0] * x[0] + 2.0 * x[1] * x[1];
        let g = central_gradient(&mut f, &array![3.0, 4.0]).unwrap();
        assert_relative_eq!(g[0], 6.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], 16.0, epsilon = 1e-6);
    }

    #[test]
    fn test_gradient_hessian_cross_term() {
        // f(x) = x0^2 + 3*x0*x1 + 5*x1^2
        let mut f = |x: &Array1<f64>| x[0] * x[0] + 3.0 * x[0] * x[1] + 5.0 * x[1] * x[1];
        let h = gradient_hessian(&mut f, &array![1.0, -2.0]).unwrap();
        assert_relative_eq!(h[(0, 0)], 2.0, epsilon = 1e-4);
        assert_relative_eq!(h[(0, 1)], 3.0, epsilon = 1e-4);
        assert_relative_eq!(h[(1, 0)], 3.0, epsilon = 1e-4);
        assert_relative_eq!(h[(1, 1)], 10.0, epsilon = 1e-4);
    }

    #[test]
    fn test_non_finite_gradient_is_rejected() {
        let mut f = |x: &Array1<f64>| if x[0] > 0.0 { f64::INFINITY } else { 0.0 };
        assert_eq!(
            central_gradient(&mut f, &array![0.0]),
            Err(OptimError::NotFinite)
        );
    }
}
