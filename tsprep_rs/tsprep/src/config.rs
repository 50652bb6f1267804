//! Run configuration for the two batch operations.
//!
//! Every path, column name and format a run depends on is an explicit
//! field here. Both structs deserialize from JSON with
//! `#[serde(default)]`, so a config file only needs the keys it changes.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::csv_io::OutputEncoding;
use crate::regularize::RegularizeParams;
use crate::timestamp::{Interval, TimestampFormat};
use crate::PrepError;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CombineConfig {
    /// Directory scanned for `*.csv` sources.
    pub dir: PathBuf,
    /// Where the combined file goes; defaults to `dir`.
    pub output_dir: Option<PathBuf>,
    pub output_name: String,
    pub encoding: OutputEncoding,
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            output_dir: None,
            output_name: "Combined output.csv".to_string(),
            encoding: OutputEncoding::Utf8,
        }
    }
}

impl CombineConfig {
    pub fn output_path(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .unwrap_or(&self.dir)
            .join(&self.output_name)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CleanConfig {
    pub input: PathBuf,
    /// Where the cleaned file goes; defaults to the input's directory.
    pub output_dir: Option<PathBuf>,
    pub output_name: String,
    pub timestamp_field: String,
    pub interval: Interval,
    pub timestamp_format: TimestampFormat,
    pub output_timestamp_format: String,
    pub fillable_fields: Vec<String>,
    pub encoding: OutputEncoding,
    pub overwrite: bool,
}

impl Default for CleanConfig {
    fn default() -> Self {
        let params = RegularizeParams::default();
        Self {
            input: PathBuf::new(),
            output_dir: None,
            output_name: "df_final.csv".to_string(),
            timestamp_field: params.timestamp_field,
            interval: params.interval,
            timestamp_format: params.timestamp_format,
            output_timestamp_format: params.output_format,
            fillable_fields: params.fillable_fields,
            encoding: OutputEncoding::Latin1,
            overwrite: false,
        }
    }
}

impl CleanConfig {
    pub fn load_json(path: &Path) -> Result<Self, PrepError> {
        let text = fs::read_to_string(path).map_err(|source| PrepError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| PrepError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn output_path(&self) -> PathBuf {
        match self.output_dir.as_ref() {
            Some(dir) => dir.join(&self.output_name),
            None => default_output_dir(&self.input).join(&self.output_name),
        }
    }

    pub fn regularize_params(&self) -> RegularizeParams {
        RegularizeParams {
            timestamp_field: self.timestamp_field.clone(),
            interval: self.interval,
            timestamp_format: self.timestamp_format.clone(),
            output_format: self.output_timestamp_format.clone(),
            fillable_fields: self.fillable_fields.clone(),
        }
    }
}

fn default_output_dir(input: &Path) -> PathBuf {
    input
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}
