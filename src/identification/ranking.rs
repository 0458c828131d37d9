// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use std::fmt;

use super::error::IdentificationError;
use super::optim::Method;

/// Outcome of one successful optimization attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Mean absolute prediction error, lower is better
    pub fitness: f64,
    /// Proportional gain found
    pub kc: f64,
    /// Integration time found
    pub ti: f64,
    /// Method that produced the result
    pub method: Method,
    /// Index of the initial guess the attempt started from
    pub guess_index: usize,
    /// Whether the minimizer met its convergence criteria
    pub converged: bool,
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:e}, [{}, {}], {})",
            self.fitness, self.kc, self.ti, self.method
        )
    }
}

/// All fits of one loop, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedResultSet {
    loop_name: String,
    results: Vec<FitResult>,
}

impl RankedResultSet {
    pub fn loop_name(&self) -> &str {
        &self.loop_name
    }

    pub fn results(&self) -> &[FitResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// The lowest-error fit.
    pub fn best(&self) -> Result<&FitResult, IdentificationError> {
        self.results
            .first()
            .ok_or_else(|| IdentificationError::EmptyResultSet {
                loop_name: self.loop_name.clone(),
            })
    }
}

impl fmt::Display for RankedResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, result) in self.results.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", result)?;
        }
        f.write_str("]")
    }
}

/// Sort by fitness ascending; ties keep catalog order of the method, then
/// insertion order.
pub fn rank(loop_name: impl Into<String>, mut results: Vec<FitResult>) -> RankedResultSet {
    results.sort_by(|a, b| {
        a.fitness
            .total_cmp(&b.fitness)
            .then_with(|| a.method.catalog_index().cmp(&b.method.catalog_index()))
    });
    RankedResultSet {
        loop_name: loop_name.into(),
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(fitness: f64, method: Method) -> FitResult {
        FitResult {
            fitness,
            kc: 1.0,
            ti: 2.0,
            method,
            guess_index: 0,
            converged: true,
        }
    }

    #[test]
    fn test_rank_is_stable_on_ties() {
        let results = vec![
            fit(3.2, Method::NelderMead),
            fit(1.1, Method::Powell),
            fit(1.1, Method::ConjugateGradient),
            fit(5.0, Method::Bfgs),
        ];
        let ranked = rank("uc", results);
        let order: Vec<(f64, Method)> = ranked
            .results()
            .iter()
            .map(|r| (r.fitness, r.method))
            .collect();
        assert_eq!(
            order,
            vec![
                (1.1, Method::Powell),
                (1.1, Method::ConjugateGradient),
                (3.2, Method::NelderMead),
                (5.0, Method::Bfgs),
            ]
        );
        assert_eq!(ranked.best().unwrap().method, Method::Powell);
    }

    #[test]
    fn test_ties_follow_catalog_then_insertion() {
        let mut second_guess = fit(0.5, Method::NelderMead);
        second_guess.guess_index = 1;
        let results = vec![
            fit(0.5, Method::Bfgs),
            second_guess.clone(),
            fit(0.5, Method::Bfgs),
        ];
        let ranked = rank("uh", results);
        assert_eq!(ranked.results()[0], second_guess);
        assert_eq!(ranked.results()[1].method, Method::Bfgs);
        assert_eq!(ranked.results()[2].method, Method::Bfgs);
    }

    #[test]
    fn test_best_of_empty_set() {
        let ranked = rank("up", Vec::new());
        assert!(ranked.is_empty());
        assert_eq!(
            ranked.best().unwrap_err(),
            IdentificationError::EmptyResultSet {
                loop_name: "up".to_string()
            }
        );
        assert_eq!(ranked.to_string(), "[]");
    }

    #[test]
    fn test_display() {
        let ranked = rank("uc", vec![fit(0.25, Method::Powell), fit(0.125, Method::Bfgs)]);
        assert_eq!(
            ranked.to_string(),
            "[(1.25e-1, [1, 2], BFGS), (2.5e-1, [1, 2], Powell)]"
        );
    }
}
