//! Fixed-interval regularization of a timestamped table.
//!
//! [`regularize`] runs four stages in order:
//!
//! 1. grid alignment: rows whose timestamp is not exactly on an interval
//!    boundary are dropped, and the on-grid rows bound the expected grid;
//! 2. deduplication: the last row per timestamp (in input order) is kept;
//! 3. gap insertion: grid timestamps with no row become rows of missing cells;
//! 4. interpolation: interior gaps of the fillable columns are closed linearly.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::format::{Item, StrftimeItems};
use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::config::CleanConfig;
use crate::csv_io::{read_table, render_table, write_output};
use crate::table::is_missing;
use crate::timestamp::{round_to_interval, Interval, TimestampFormat};
use crate::{PrepError, Table};

#[derive(Clone, Debug)]
pub struct RegularizeParams {
    pub timestamp_field: String,
    pub interval: Interval,
    pub timestamp_format: TimestampFormat,
    /// chrono format used to write the timestamp column.
    pub output_format: String,
    pub fillable_fields: Vec<String>,
}

impl Default for RegularizeParams {
    fn default() -> Self {
        Self {
            timestamp_field: "Date/Time".to_string(),
            interval: Interval::default(),
            timestamp_format: TimestampFormat::default(),
            output_format: "%Y-%m-%d %H:%M:%S".to_string(),
            fillable_fields: vec!["Temp_C".into(), "Dew_Point_C".into(), "RH".into()],
        }
    }
}

/// Data-quality counts gathered while regularizing.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RegularizeReport {
    pub input_rows: usize,
    /// Rows dropped because their timestamp is not on an interval boundary.
    pub off_grid: usize,
    /// Rows taking part in a group of equal timestamps (all members counted).
    pub duplicate_records: usize,
    /// Rows discarded by deduplication.
    pub duplicates_removed: usize,
    /// Grid timestamps that had no source row.
    pub missing_timestamps: usize,
    pub grid_start: String,
    pub grid_end: String,
    pub grid_len: usize,
    pub filled_values: BTreeMap<String, usize>,
    pub ignored_fill_fields: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Regularized {
    pub table: Table,
    pub report: RegularizeReport,
}

/// Inclusive `[start, end]` sequence stepped by `interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpectedGrid {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval: Interval,
}

impl ExpectedGrid {
    pub fn len(&self) -> usize {
        let span = (self.end - self.start).num_seconds();
        (span / self.interval.as_secs()) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDateTime> {
        let start = self.start;
        let step = self.interval.as_secs();
        (0..self.len()).map(move |i| start + Duration::seconds(step * i as i64))
    }
}

struct Stamped {
    ts: NaiveDateTime,
    source: usize,
}

struct Alignment {
    on_grid: Vec<Stamped>,
    off_grid: usize,
    grid: ExpectedGrid,
}

struct Deduplicated {
    index: BTreeMap<NaiveDateTime, usize>,
    duplicate_records: usize,
    duplicates_removed: usize,
}

pub fn regularize(table: &Table, params: &RegularizeParams) -> Result<Regularized, PrepError> {
    if table.is_empty() {
        return Err(PrepError::EmptyInput);
    }
    if StrftimeItems::new(&params.output_format).any(|item| matches!(item, Item::Error)) {
        return Err(PrepError::InvalidParameter(format!(
            "invalid output timestamp format '{}'",
            params.output_format
        )));
    }
    let ts_idx = table
        .column_index(&params.timestamp_field)
        .ok_or_else(|| PrepError::MissingColumn(params.timestamp_field.clone()))?;

    let stamped = parse_timestamps(table, ts_idx, &params.timestamp_format)?;
    let alignment = align_to_grid(stamped, params.interval)?;
    let dedup = deduplicate(&alignment.on_grid);
    let grid = alignment.grid;

    // Stage 3: left-join the grid against the surviving rows.
    let width = table.width();
    let mut sources = Vec::with_capacity(grid.len());
    let mut rows = Vec::with_capacity(grid.len());
    let mut missing_timestamps = 0;
    for ts in grid.iter() {
        let source = dedup.index.get(&ts).copied();
        let mut row = match source {
            Some(idx) => table.rows[idx].clone(),
            None => {
                missing_timestamps += 1;
                vec![String::new(); width]
            }
        };
        row[ts_idx] = ts.format(&params.output_format).to_string();
        sources.push(source);
        rows.push(row);
    }

    let mut filled_values = BTreeMap::new();
    let mut ignored_fill_fields = Vec::new();
    for field in &params.fillable_fields {
        let col = match table.column_index(field) {
            Some(col) if col != ts_idx => col,
            _ => {
                ignored_fill_fields.push(field.clone());
                continue;
            }
        };
        let filled = fill_column(&mut rows, &sources, col, field)?;
        filled_values.insert(field.clone(), filled);
    }

    let report = RegularizeReport {
        input_rows: table.len(),
        off_grid: alignment.off_grid,
        duplicate_records: dedup.duplicate_records,
        duplicates_removed: dedup.duplicates_removed,
        missing_timestamps,
        grid_start: grid.start.format(&params.output_format).to_string(),
        grid_end: grid.end.format(&params.output_format).to_string(),
        grid_len: grid.len(),
        filled_values,
        ignored_fill_fields,
    };
    Ok(Regularized {
        table: Table {
            columns: table.columns.clone(),
            rows,
        },
        report,
    })
}

fn parse_timestamps(
    table: &Table,
    ts_idx: usize,
    format: &TimestampFormat,
) -> Result<Vec<Stamped>, PrepError> {
    table
        .rows
        .iter()
        .enumerate()
        .map(|(source, row)| {
            let raw = &row[ts_idx];
            let ts = format
                .parse(raw)
                .map_err(|_| PrepError::TimestampParse {
                    row: source + 1,
                    value: raw.clone(),
                    format: format.effective_format(),
                })?;
            Ok(Stamped { ts, source })
        })
        .collect()
}

fn align_to_grid(stamped: Vec<Stamped>, interval: Interval) -> Result<Alignment, PrepError> {
    let total = stamped.len();
    let on_grid: Vec<Stamped> = stamped
        .into_iter()
        .filter(|s| round_to_interval(s.ts, interval) == s.ts)
        .collect();
    let start = on_grid.iter().map(|s| s.ts).min();
    let end = on_grid.iter().map(|s| s.ts).max();
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => return Err(PrepError::EmptyGrid { interval }),
    };
    Ok(Alignment {
        off_grid: total - on_grid.len(),
        on_grid,
        grid: ExpectedGrid {
            start,
            end,
            interval,
        },
    })
}

/// Keep the last row per timestamp. Input order breaks ties, which is the
/// same outcome as a stable chronological sort followed by keep-last.
fn deduplicate(on_grid: &[Stamped]) -> Deduplicated {
    let mut index = BTreeMap::new();
    let mut counts: HashMap<NaiveDateTime, usize> = HashMap::new();
    for stamped in on_grid {
        index.insert(stamped.ts, stamped.source);
        *counts.entry(stamped.ts).or_default() += 1;
    }
    let duplicate_records = counts.values().filter(|&&n| n > 1).sum();
    Deduplicated {
        duplicates_removed: on_grid.len() - index.len(),
        duplicate_records,
        index,
    }
}

fn fill_column(
    rows: &mut [Vec<String>],
    sources: &[Option<usize>],
    col: usize,
    field: &str,
) -> Result<usize, PrepError> {
    let mut values = Vec::with_capacity(rows.len());
    for (row, source) in rows.iter().zip(sources) {
        let cell = &row[col];
        if is_missing(cell) {
            values.push(None);
            continue;
        }
        let value: f64 = cell.trim().parse().map_err(|_| PrepError::NonNumeric {
            field: field.to_string(),
            row: source.map(|s| s + 1).unwrap_or(0),
            value: cell.clone(),
        })?;
        values.push(if value.is_nan() { None } else { Some(value) });
    }

    let before: Vec<bool> = values.iter().map(Option::is_some).collect();
    let filled = interpolate_interior(&mut values);
    for (i, (row, value)) in rows.iter_mut().zip(&values).enumerate() {
        if before[i] {
            continue;
        }
        if let Some(v) = value {
            row[col] = format_value(*v);
        }
    }
    Ok(filled)
}

/// Linearly fill interior gaps in place; returns the number of values filled.
///
/// A gap at position `i` between known `(i0, v0)` and `(i1, v1)` becomes
/// `v0 + (v1 - v0) * (i - i0) / (i1 - i0)`. Values before the first or after
/// the last known value stay `None`.
pub fn interpolate_interior(values: &mut [Option<f64>]) -> usize {
    let mut filled = 0;
    let mut prev: Option<(usize, f64)> = None;
    for i in 0..values.len() {
        let Some(v1) = values[i] else {
            continue;
        };
        if let Some((i0, v0)) = prev {
            let span = (i - i0) as f64;
            for (j, slot) in values.iter_mut().enumerate().take(i).skip(i0 + 1) {
                let frac = (j - i0) as f64 / span;
                *slot = Some(v0 + (v1 - v0) * frac);
                filled += 1;
            }
        }
        prev = Some((i, v1));
    }
    filled
}

fn format_value(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Outcome of [`clean_file`].
#[derive(Clone, Debug, Serialize)]
pub struct CleanReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub rows_written: usize,
    pub encoding: String,
    #[serde(flatten)]
    pub regularize: RegularizeReport,
}

/// Read, regularize and write one time-series CSV.
///
/// Nothing is written unless every stage succeeds.
pub fn clean_file(config: &CleanConfig) -> Result<CleanReport, PrepError> {
    let output = config.output_path();
    if !config.overwrite && output.exists() {
        return Err(PrepError::OutputCollision(output));
    }
    let table = read_table(&config.input)?;
    let Regularized { table, report } = regularize(&table, &config.regularize_params())?;
    let bytes = render_table(&table, config.encoding)?;
    write_output(&output, &bytes, config.overwrite)?;
    Ok(CleanReport {
        input: config.input.clone(),
        output,
        rows_written: table.len(),
        encoding: config.encoding.label().to_string(),
        regularize: report,
    })
}
