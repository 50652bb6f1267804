//! Row-wise concatenation of same-schema CSV files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::CombineConfig;
use crate::csv_io::{read_table, render_table, write_output};
use crate::{PrepError, Table};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct CombineReport {
    pub sources: Vec<SourceSummary>,
    pub columns: Vec<String>,
    pub total_rows: usize,
    pub output: PathBuf,
}

/// Concatenate tables in order under the first table's header.
///
/// Later tables must have the same number of columns; their own header
/// labels are ignored.
pub fn concat_tables(tables: Vec<Table>) -> Result<Table, PrepError> {
    let mut tables = tables.into_iter();
    let mut combined = tables
        .next()
        .ok_or_else(|| PrepError::NoInput("source list is empty".to_string()))?;
    for (offset, table) in tables.enumerate() {
        if table.width() != combined.width() {
            return Err(PrepError::ColumnCountMismatch {
                index: offset + 1,
                expected: combined.width(),
                found: table.width(),
            });
        }
        combined.rows.extend(table.rows);
    }
    Ok(combined)
}

/// CSV files directly inside `dir`, sorted by file name.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, PrepError> {
    let io_err = |source| PrepError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv && entry.file_type().map_err(io_err)?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Combine every CSV in `config.dir` into a single new output file.
///
/// The output location is checked before anything is listed or read, and the
/// file is only created once the combined table has been rendered.
pub fn combine_directory(config: &CombineConfig) -> Result<CombineReport, PrepError> {
    let output = config.output_path();
    if output.exists() {
        return Err(PrepError::OutputCollision(output));
    }

    let sources = list_csv_files(&config.dir)?;
    if sources.is_empty() {
        return Err(PrepError::NoInput(format!(
            "no CSV files found in {}",
            config.dir.display()
        )));
    }

    let mut summaries = Vec::with_capacity(sources.len());
    let mut tables = Vec::with_capacity(sources.len());
    for path in sources {
        let table = read_table(&path)?;
        summaries.push(SourceSummary {
            path,
            rows: table.len(),
            columns: table.width(),
        });
        tables.push(table);
    }

    let combined = concat_tables(tables)?;
    let bytes = render_table(&combined, config.encoding)?;
    write_output(&output, &bytes, false)?;

    Ok(CombineReport {
        sources: summaries,
        total_rows: combined.len(),
        columns: combined.columns,
        output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn concatenates_in_order_under_first_header() {
        let a = table(&["id", "value"], &[&["1", "a"], &["2", "b"]]);
        let b = table(&["ID", "Value "], &[&["3", "c"]]);
        let c = table(&["x", "y"], &[]);
        let combined = concat_tables(vec![a, b, c]).unwrap();
        assert_eq!(combined.columns, vec!["id", "value"]);
        assert_eq!(combined.len(), 3);
        let ids: Vec<&str> = combined.column("id").unwrap().collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_source_list_fails() {
        assert!(matches!(concat_tables(Vec::new()), Err(PrepError::NoInput(_))));
    }

    #[test]
    fn width_mismatch_names_the_source() {
        let a = table(&["id", "value"], &[&["1", "a"]]);
        let b = table(&["id", "value"], &[&["2", "b"]]);
        let c = table(&["id"], &[&["3"]]);
        match concat_tables(vec![a, b, c]) {
            Err(PrepError::ColumnCountMismatch {
                index,
                expected,
                found,
            }) => assert_eq!((index, expected, found), (2, 2, 1)),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn lists_only_csv_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.csv", "a.CSV", "notes.txt", "c.csv.bak"] {
            fs::write(dir.path().join(name), "x\n1\n").unwrap();
        }
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        let names: Vec<String> = list_csv_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv"]);
    }
}
