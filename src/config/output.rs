// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Where and how results are reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct OutputConfig {
    /// File receiving one ranked result line per loop
    pub results_path: String,

    /// Print the full ranked lists on stdout, not only the best fits
    pub print_ranked: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_path: "data/solution_list.txt".to_string(),
            print_ranked: true,
        }
    }
}
