// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PI controller gain identification
//!
//! This module fits the discrete PI control law to recorded actuator and
//! measurement series and reports, for each control loop, the gain pair
//! `(Kc, Ti)` that best reproduces the recorded commands.
//!
//! The flow through the submodules is:
//!
//! 1. [`loops`] pairs recorded series with setpoints and initial guesses
//! 2. [`search`] runs every optimization method of [`optim`] from every guess
//!    against the [`objective`]
//! 3. [`ranking`] orders the fits of each loop, best first
//! 4. [`pipeline`] drives the above for several loops, sequentially or in parallel
//!
//! ```no_run
//! use rust_pi_identification::identification::loops::build_default_loops;
//! use rust_pi_identification::identification::pipeline::identify_loops_blocking;
//! use rust_pi_identification::identification::search::SearchDriver;
//! use rust_pi_identification::identification::series::ProcessData;
//!
//! # fn load() -> ProcessData { ProcessData::new() }
//! let data = load();
//! let loops = build_default_loops(&data, [200.0, 40.0, 50.0], 1.0, 10).unwrap();
//! for report in identify_loops_blocking(&loops, &SearchDriver::default()) {
//!     println!("{}: {}", report.loop_name(), report.ranked);
//! }
//! ```

pub mod error;
pub mod loops;
pub mod objective;
pub mod optim;
pub mod pipeline;
pub mod ranking;
pub mod search;
pub mod series;

pub use error::IdentificationError;
pub use loops::{ControlLoopSpec, GainGuess, GuessStrategy, LoopConfigurationBuilder};
pub use pipeline::LoopReport;
pub use ranking::{FitResult, RankedResultSet};
pub use search::{AttemptOutcome, SearchDriver};
pub use series::{ProcessData, TimeSeries};
