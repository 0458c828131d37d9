// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Recorded data configuration
//!
//! This module defines where the recorded process data is read from and how
//! the delimited table is laid out.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Configuration of the delimited process data file.
///
/// The file holds one row per sampling step and one column per recorded
/// signal. Columns are named by `columns`, in file order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DataConfig {
    /// Path of the data file.
    pub path: String,

    /// Field separator.
    pub delimiter: char,

    /// Number of leading data rows discarded as warm-up.
    ///
    /// Must be smaller than the number of data rows in the file.
    pub start_row: usize,

    /// Column names, in file order.
    pub columns: Vec<String>,

    /// Whether the first non-comment line is a header to skip.
    pub has_header: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: "data/multi_control_data.txt".to_string(),
            delimiter: ',',
            start_row: 399,
            columns: ["uc", "uh", "up", "Vc", "Tco", "Thi"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            has_header: false,
        }
    }
}
