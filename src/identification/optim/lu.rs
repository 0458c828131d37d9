// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use ndarray::{Array1, Array2};

/// LU decomposition with partial pivoting of a small dense matrix.
///
/// L and U are packed together: U in the upper triangle (diagonal included),
/// L below it with an implicit unit diagonal.
#[derive(Debug, Clone)]
pub(crate) struct Lu {
    packed: Array2<f64>,
    perm: Vec<usize>,
    even: bool,
}

impl Lu {
    /// Factor `a`, or `None` when a pivot vanishes relative to the largest entry.
    pub(crate) fn new(a: &Array2<f64>) -> Option<Self> {
        let n = a.nrows();
        debug_assert_eq!(n, a.ncols());
        let mut packed = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();
        let mut even = true;
        let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
        if !scale.is_finite() {
            return None;
        }
        let threshold = f64::EPSILON * scale.max(f64::MIN_POSITIVE) * n as f64;

        for col in 0..n {
            let mut max_row = col;
            let mut max_val = packed[(col, col)].abs();
            for row in (col + 1)..n {
                let val = packed[(row, col)].abs();
                if val > max_val {
                    max_val = val;
                    max_row = row;
                }
            }
            if max_val <= threshold {
                return None;
            }

            if max_row != col {
                perm.swap(col, max_row);
                for j in 0..n {
                    packed.swap((col, j), (max_row, j));
                }
                even = !even;
            }

            let pivot = packed[(col, col)];
            for row in (col + 1)..n {
                let factor = packed[(row, col)] / pivot;
                packed[(row, col)] = factor;
                for j in (col + 1)..n {
                    packed[(row, j)] -= factor * packed[(col, j)];
                }
            }
        }

        Some(Self { packed, perm, even })
    }

    /// Solve `A x = b`.
    pub(crate) fn solve(&self, b: &Array1<f64>) -> Array1<f64> {
        let n = self.packed.nrows();
        let mut x = Array1::<f64>::zeros(n);

        // Forward substitution on the permuted right-hand side
        for i in 0..n {
            let mut sum = b[self.perm[i]];
            for j in 0..i {
                sum -= self.packed[(i, j)] * x[j];
            }
            x[i] = sum;
        }

        // Back substitution
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in (i + 1)..n {
                sum -= self.packed[(i, j)] * x[j];
            }
            x[i] = sum / self.packed[(i, i)];
        }
        x
    }

    pub(crate) fn det(&self) -> f64 {
        let product: f64 = self.packed.diag().iter().product();
        if self.even {
            product
        } else {
            -product
        }
    }
}
