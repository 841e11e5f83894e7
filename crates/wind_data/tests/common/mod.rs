#![allow(dead_code)]

use anyhow::Result;
use std::io::{BufWriter, Write};
use std::time::Duration;
use tempfile::NamedTempFile;
use wind_data::provider::ProviderConfigBuilder;
use wind_data::ProviderConfig;

pub const FEATURE_HEADER: &str = "xid,yid,date_id,hour,model,wind";
pub const LABEL_HEADER: &str = "xid,yid,date_id,hour,wind";

/// Forecast file whose rows `10g..10g+10` all carry wind value `g`, so a
/// packed record can be matched against the label written for group `g`.
/// `extra_rows` incomplete trailing rows are appended after the full groups.
pub fn write_features(groups: usize, extra_rows: usize) -> Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    let mut out = BufWriter::new(file.reopen()?);
    writeln!(out, "{}", FEATURE_HEADER)?;
    for row in 0..groups * 10 + extra_rows {
        let group = row / 10;
        writeln!(
            out,
            "1,1,3,{},{},{}",
            3 + group % 18,
            row % 10 + 1,
            group
        )?;
    }
    out.flush()?;
    Ok(file)
}

/// Measurement file with one row per value.
pub fn write_labels(values: impl IntoIterator<Item = f32>) -> Result<NamedTempFile> {
    let file = NamedTempFile::new()?;
    let mut out = BufWriter::new(file.reopen()?);
    writeln!(out, "{}", LABEL_HEADER)?;
    for value in values {
        writeln!(out, "1,1,3,3,{}", value)?;
    }
    out.flush()?;
    Ok(file)
}

/// Labels `0..groups` matching [`write_features`].
pub fn write_matching_labels(groups: usize) -> Result<NamedTempFile> {
    write_labels((0..groups).map(|g| g as f32))
}

pub fn write_lines(lines: &[&str]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{}", line)?;
    }
    file.flush()?;
    Ok(file)
}

/// Config with short intervals and a fixed seed so tests run quickly.
pub fn fast_config() -> ProviderConfigBuilder {
    ProviderConfig::builder()
        .shuffle_interval(Duration::from_millis(10))
        .poll_interval(Duration::from_millis(10))
        .seed(42)
}

pub const LOAD_TIMEOUT: Option<Duration> = Some(Duration::from_secs(10));
