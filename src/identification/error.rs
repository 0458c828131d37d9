// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use thiserror::Error;

use super::optim::OptimError;

/// Errors raised by the identification core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentificationError {
    #[error("Invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    #[error("Series length mismatch: u has {u_len} samples, y has {y_len}")]
    ShapeMismatch { u_len: usize, y_len: usize },

    #[error("At least 2 samples are required, got {len}")]
    TooFewSamples { len: usize },

    #[error("Optimizer '{method}' failed: {reason}")]
    OptimizerFailure { method: String, reason: OptimError },

    #[error("No usable result for loop '{loop_name}': every attempt failed")]
    EmptyResultSet { loop_name: String },

    #[error("Loop '{loop_name}' has no initial guess")]
    NoInitialGuess { loop_name: String },

    #[error("Column '{column}' not found in process data")]
    UnknownColumn { column: String },
}

impl IdentificationError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        IdentificationError::InvalidParameter {
            reason: reason.into(),
        }
    }
}
