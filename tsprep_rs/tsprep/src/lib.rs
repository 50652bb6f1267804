//! Core CSV preparation library: directory concatenation and fixed-interval
//! time-series regularization.

use std::path::PathBuf;

use thiserror::Error;

pub mod concat;
pub mod config;
pub mod csv_io;
pub mod regularize;
pub mod table;
pub mod timestamp;

pub use concat::{combine_directory, concat_tables, list_csv_files, CombineReport, SourceSummary};
pub use config::{CleanConfig, CombineConfig};
pub use csv_io::{read_table, read_table_from, render_table, write_output, OutputEncoding};
pub use regularize::{
    clean_file, interpolate_interior, regularize, CleanReport, ExpectedGrid, RegularizeParams,
    RegularizeReport, Regularized,
};
pub use table::Table;
pub use timestamp::{parse_interval_token, round_to_interval, Interval, TimestampFormat};

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("failed to render CSV output: {0}")]
    Render(String),
    #[error("row {row}: cannot parse timestamp '{value}' with format '{format}'")]
    TimestampParse {
        row: usize,
        value: String,
        format: String,
    },
    #[error("input table has no records")]
    EmptyInput,
    #[error("no record falls exactly on a {interval} boundary; cannot establish a grid")]
    EmptyGrid { interval: Interval },
    #[error("no input: {0}")]
    NoInput(String),
    #[error("output already exists: {0}; remove or rename it before running")]
    OutputCollision(PathBuf),
    #[error("source #{index} has {found} columns, expected {expected}")]
    ColumnCountMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("column '{0}' not found in header")]
    MissingColumn(String),
    #[error("row {row}: column '{field}' holds non-numeric value '{value}'")]
    NonNumeric {
        field: String,
        row: usize,
        value: String,
    },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("output line {line}: character {ch:?} cannot be encoded as {encoding}")]
    Encoding {
        line: usize,
        ch: char,
        encoding: &'static str,
    },
    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
