// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Recorded process signals
//!
//! A [`TimeSeries`] is immutable once built and shares its samples, so loops
//! can hand the same recording to worker threads without copying.

use std::ops::Deref;
use std::sync::Arc;

use super::error::IdentificationError;

/// An ordered sequence of samples taken at a fixed interval.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    samples: Arc<[f64]>,
}

impl TimeSeries {
    pub fn new(samples: Vec<f64>) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    /// A new series without the first `start` samples.
    pub fn skip(&self, start: usize) -> Self {
        let start = start.min(self.samples.len());
        Self::new(self.samples[start..].to_vec())
    }
}

impl Deref for TimeSeries {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.samples
    }
}

impl From<Vec<f64>> for TimeSeries {
    fn from(samples: Vec<f64>) -> Self {
        Self::new(samples)
    }
}

/// Named columns of one recording, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessData {
    columns: Vec<(String, TimeSeries)>,
}

impl ProcessData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a column.
    pub fn insert(&mut self, name: impl Into<String>, series: TimeSeries) {
        let name = name.into();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = series,
            None => self.columns.push((name, series)),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, series: impl Into<TimeSeries>) -> Self {
        self.insert(name, series.into());
        self
    }

    pub fn column(&self, name: &str) -> Result<&TimeSeries, IdentificationError> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
            .ok_or_else(|| IdentificationError::UnknownColumn {
                column: name.to_string(),
            })
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }

    /// Number of samples in the longest column.
    pub fn len(&self) -> usize {
        self.columns.iter().map(|(_, s)| s.len()).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_series_skip_and_share() {
        let series = TimeSeries::new(vec![1.0, 2.0, 3.0, 4.0]);
        let clone = series.clone();
        assert_eq!(series.skip(1).as_slice(), &[2.0, 3.0, 4.0]);
        assert!(series.skip(10).is_empty());
        assert_eq!(clone.len(), 4);
        assert_eq!(clone[3], 4.0);
    }

    #[test]
    fn test_process_data_columns() {
        let data = ProcessData::new()
            .with_column("uc", vec![1.0, 2.0])
            .with_column("Vc", vec![3.0, 4.0])
            .with_column("uc", vec![5.0, 6.0]);
        assert_eq!(data.column_names().collect::<Vec<_>>(), vec!["uc", "Vc"]);
        assert_eq!(data.column("uc").unwrap().as_slice(), &[5.0, 6.0]);
        assert_eq!(data.len(), 2);
        assert_eq!(
            data.column("Thi").unwrap_err(),
            IdentificationError::UnknownColumn {
                column: "Thi".to_string()
            }
        );
    }
}
