// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pi-identification project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_pi_identification::acquisition::{DataSource, DelimitedFileSource};
use rust_pi_identification::config::DataConfig;
use std::fs;
use tempfile::tempdir;

fn table(rows: usize) -> String {
    let mut text = String::new();
    for i in 0..rows {
        let v = i as f64;
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            v,
            v + 0.5,
            -v,
            200.0 + v,
            40.0 - v,
            50.0
        ));
    }
    text
}

#[test]
fn test_default_layout_skips_warm_up_rows() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("multi_control_data.txt");
    fs::write(&path, table(405))?;

    let config = DataConfig {
        path: path.to_string_lossy().to_string(),
        ..DataConfig::default()
    };
    let data = DelimitedFileSource::from_config(&config).read()?;

    assert_eq!(
        data.column_names().collect::<Vec<_>>(),
        vec!["uc", "uh", "up", "Vc", "Tco", "Thi"]
    );
    assert_eq!(data.len(), 6);
    assert_eq!(data.column("uc")?.as_slice()[0], 399.0);
    assert_eq!(data.column("Vc")?.as_slice()[5], 604.0);
    assert_eq!(data.column("Thi")?.as_slice(), &[50.0; 6]);
    Ok(())
}

#[test]
fn test_ragged_row_is_rejected_with_line_number() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("ragged.txt");
    let mut text = table(3);
    text.push_str("1,2,3\n");
    fs::write(&path, text)?;

    let err = DelimitedFileSource::new(&path)
        .with_start_row(0)
        .read()
        .unwrap_err();
    let message = format!("{:#}", err);
    assert!(message.contains("Line 4"), "{}", message);
    assert!(message.contains("expected 6 fields, found 3"), "{}", message);
    Ok(())
}

#[test]
fn test_offset_beyond_table_is_an_error() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("short.txt");
    fs::write(&path, table(10))?;

    assert!(DelimitedFileSource::new(&path).read().is_err());
    let data = DelimitedFileSource::new(&path).with_start_row(9).read()?;
    assert_eq!(data.len(), 1);
    Ok(())
}

#[test]
fn test_missing_file_is_reported() {
    let err = DelimitedFileSource::new("does/not/exist.txt")
        .read()
        .unwrap_err();
    assert!(err.to_string().contains("does/not/exist.txt"), "{}", err);
}
