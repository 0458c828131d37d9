// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Process data acquisition module
//!
//! This module loads recorded control loop signals into [`ProcessData`].

mod file;

use anyhow::Result;

use crate::identification::series::ProcessData;

pub use file::DelimitedFileSource;

/// Represents a source of recorded process data
pub trait DataSource {
    /// Read every configured column
    fn read(&self) -> Result<ProcessData>;
}
