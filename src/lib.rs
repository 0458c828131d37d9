// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust PI identification library
//!
//! This library identifies the gains of discrete PI controllers from recorded
//! actuator and measurement data.

pub mod acquisition;
pub mod config;
pub mod identification;
pub mod reporting;
