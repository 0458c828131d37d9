// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::identification::optim::{Method, OptimizerSettings};

/// Settings of the multi-method search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct SearchConfig {
    /// Methods tried from every initial guess, in sweep order
    pub methods: Vec<Method>,

    /// Tolerances and limits of the minimizers
    pub optimizer: OptimizerSettings,

    /// Wall-clock cap of a single attempt in milliseconds, none by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_timeout_ms: Option<u64>,

    /// Keep results of minimizers that stopped without converging
    pub accept_unconverged: bool,

    /// Identify loops in parallel
    pub parallel: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            methods: Method::ALL.to_vec(),
            optimizer: OptimizerSettings::default(),
            attempt_timeout_ms: None,
            accept_unconverged: true,
            parallel: true,
        }
    }
}
