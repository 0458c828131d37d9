// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Delimited text file acquisition
//!
//! Reads a numeric table with one row per sampling step. Blank lines and
//! lines starting with `#` are ignored; the first remaining line may be a
//! header. Leading warm-up rows are discarded after the whole table parsed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, info};

use super::DataSource;
use crate::config::DataConfig;
use crate::identification::series::{ProcessData, TimeSeries};

/// Data source reading a delimited numeric table from disk
#[derive(Debug, Clone)]
pub struct DelimitedFileSource {
    path: PathBuf,
    delimiter: char,
    start_row: usize,
    columns: Vec<String>,
    has_header: bool,
}

impl DelimitedFileSource {
    /// Source with the default layout for the file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let defaults = DataConfig::default();
        Self {
            path: path.as_ref().to_path_buf(),
            delimiter: defaults.delimiter,
            start_row: defaults.start_row,
            columns: defaults.columns,
            has_header: defaults.has_header,
        }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self {
            path: PathBuf::from(&config.path),
            delimiter: config.delimiter,
            start_row: config.start_row,
            columns: config.columns.clone(),
            has_header: config.has_header,
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_start_row(mut self, start_row: usize) -> Self {
        self.start_row = start_row;
        self
    }

    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        if self.delimiter.is_whitespace() {
            line.split_whitespace().collect()
        } else {
            line.split(self.delimiter).map(str::trim).collect()
        }
    }

    /// Parse table text with this source's layout.
    pub fn parse(&self, contents: &str) -> Result<ProcessData> {
        let width = self.columns.len();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); width];
        let mut header_pending = self.has_header;

        for (index, line) in contents.lines().enumerate() {
            let line_number = index + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            if header_pending {
                header_pending = false;
                debug!("Skipping header line {}: {}", line_number, trimmed);
                continue;
            }

            let fields = self.split(trimmed);
            if fields.len() != width {
                return Err(anyhow!(
                    "Line {}: expected {} fields, found {}",
                    line_number,
                    width,
                    fields.len()
                ));
            }
            for (column, field) in columns.iter_mut().zip(fields) {
                let value: f64 = field.parse().with_context(|| {
                    format!("Line {}: '{}' is not a number", line_number, field)
                })?;
                column.push(value);
            }
        }

        let rows = columns.first().map(Vec::len).unwrap_or(0);
        if self.start_row >= rows {
            return Err(anyhow!(
                "Start row {} leaves no data: the table has {} rows",
                self.start_row,
                rows
            ));
        }

        let data = self
            .columns
            .iter()
            .zip(columns)
            .fold(ProcessData::new(), |data, (name, samples)| {
                data.with_column(name.clone(), TimeSeries::new(samples).skip(self.start_row))
            });
        Ok(data)
    }
}

impl DataSource for DelimitedFileSource {
    fn read(&self) -> Result<ProcessData> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read data file {:?}", self.path))?;
        let data = self
            .parse(&contents)
            .with_context(|| format!("Invalid data file {:?}", self.path))?;
        info!(
            "Loaded {} samples of {} columns from {:?} (first {} rows skipped)",
            data.len(),
            self.columns.len(),
            self.path,
            self.start_row
        );
        Ok(data)
    }
}
