// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use super::*;
use approx::assert_relative_eq;
use ndarray::array;
use std::time::Duration;

fn shifted_bowl(x: &Array1<f64>) -> f64 {
    (x[0] - 0.7).powi(2) + 3.0 * (x[1] - 12.0).powi(2) + 0.5 * (x[0] - 0.7) * (x[1] - 12.0)
}

#[test]
fn test_every_method_minimizes_a_smooth_bowl() {
    let settings = OptimizerSettings::default();
    for method in Method::ALL {
        let mut f = shifted_bowl;
        let r = method
            .minimizer(&settings)
            .minimize(&mut f, &array![1.0, 1.0])
            .unwrap_or_else(|e| panic!("{} failed: {}", method, e));
        assert!(r.fx < 1e-6, "{} stopped at fx = {}", method, r.fx);
        assert_relative_eq!(r.x[0], 0.7, epsilon = 1e-3);
        assert_relative_eq!(r.x[1], 12.0, epsilon = 1e-3);
    }
}

#[test]
fn test_catalog_order_and_names() {
    let names: Vec<&str> = Method::ALL.iter().map(|m| m.name()).collect();
    assert_eq!(
        names,
        vec![
            "Nelder-Mead",
            "Powell",
            "CG",
            "BFGS",
            "L-BFGS-B",
            "TNC",
            "COBYLA",
            "SLSQP",
            "Trust-Region"
        ]
    );
    for (i, method) in Method::ALL.iter().enumerate() {
        assert_eq!(method.catalog_index(), i);
    }
}

#[test]
fn test_method_serde_names() {
    let yaml = serde_yml::to_string(&vec![Method::NelderMead, Method::LBfgsB]).unwrap();
    let back: Vec<Method> = serde_yml::from_str(&yaml).unwrap();
    assert_eq!(back, vec![Method::NelderMead, Method::LBfgsB]);
    let parsed: Method = serde_yml::from_str("trust-region").unwrap();
    assert_eq!(parsed, Method::TrustRegion);
    let parsed: Vec<Method> = serde_yml::from_str("[tnc, cobyla, slsqp]").unwrap();
    assert_eq!(parsed, vec![Method::Tnc, Method::Cobyla, Method::Slsqp]);
}

#[test]
fn test_budget_counts_and_times_out() {
    let mut f = |x: &Array1<f64>| x[0];
    let mut budgeted = Budgeted::new(&mut f, None);
    budgeted.cost(&array![1.0]).unwrap();
    budgeted.cost(&array![2.0]).unwrap();
    assert_eq!(budgeted.evaluations(), 2);

    let mut slow = |x: &Array1<f64>| {
        std::thread::sleep(Duration::from_millis(5));
        x[0] * x[0]
    };
    let mut budgeted = Budgeted::new(&mut slow, Some(Duration::from_millis(1)));
    let result = Method::NelderMead
        .minimizer(&OptimizerSettings::default())
        .minimize(&mut budgeted, &array![3.0]);
    assert!(matches!(result, Err(OptimError::TimedOut { .. })));
}

#[test]
fn test_objective_error_aborts_the_run() {
    struct Failing;
    impl CostFunction for Failing {
        fn cost(&mut self, x: &Array1<f64>) -> Result<f64, OptimError> {
            if x[0] > 1.2 {
                Err(OptimError::Objective("out of domain".to_string()))
            } else {
                Ok(-x[0])
            }
        }
    }
    let result = Method::Powell
        .minimizer(&OptimizerSettings::default())
        .minimize(&mut Failing, &array![1.0]);
    assert_eq!(
        result.unwrap_err(),
        OptimError::Objective("out of domain".to_string())
    );
}

#[test]
fn test_bounds_projection() {
    let bounds = Bounds {
        lower: vec![0.0, 1.0],
        upper: vec![5.0, 100.0],
    };
    let mut x = array![-1.0, 250.0];
    bounds.project(&mut x);
    assert_eq!(x, array![0.0, 100.0]);
}

#[test]
fn test_bounded_methods_stop_on_the_active_edge() {
    // Unconstrained minimum (0.7, 12) lies beyond the upper bound of the second axis
    let settings = OptimizerSettings {
        bounds: Some(Bounds {
            lower: vec![0.0, 0.0],
            upper: vec![5.0, 8.0],
        }),
        ..OptimizerSettings::default()
    };
    for method in [Method::Tnc, Method::Cobyla, Method::Slsqp] {
        let mut f = shifted_bowl;
        let r = method
            .minimizer(&settings)
            .minimize(&mut f, &array![1.0, 1.0])
            .unwrap_or_else(|e| panic!("{} failed: {}", method, e));
        assert!(r.x[1] <= 8.0, "{} left the box at {}", method, r.x);
        assert_relative_eq!(r.x[1], 8.0, epsilon = 1e-6);
        // On the edge x1 = 8 the bowl reduces to (x0 - 0.7)^2 - 2(x0 - 0.7) + 48
        assert_relative_eq!(r.x[0], 1.7, epsilon = 1e-3);
        assert_relative_eq!(r.fx, 47.0, epsilon = 1e-5);
    }
}
