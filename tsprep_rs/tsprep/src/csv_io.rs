use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{PrepError, Table};

/// Text encoding used when writing an output file.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputEncoding {
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "iso-8859-1")]
    Latin1,
}

impl OutputEncoding {
    pub fn label(self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "utf-8",
            OutputEncoding::Latin1 => "iso-8859-1",
        }
    }

    fn encode(self, text: String) -> Result<Vec<u8>, PrepError> {
        match self {
            OutputEncoding::Utf8 => Ok(text.into_bytes()),
            OutputEncoding::Latin1 => {
                let mut out = Vec::with_capacity(text.len());
                let mut line = 1;
                for ch in text.chars() {
                    if ch == '\n' {
                        line += 1;
                    }
                    let code = u32::from(ch);
                    if code > 0xFF {
                        return Err(PrepError::Encoding {
                            line,
                            ch,
                            encoding: self.label(),
                        });
                    }
                    out.push(code as u8);
                }
                Ok(out)
            }
        }
    }
}

impl fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputEncoding {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(OutputEncoding::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin-1" | "latin1" => Ok(OutputEncoding::Latin1),
            other => Err(PrepError::InvalidParameter(format!(
                "unsupported output encoding '{}'",
                other
            ))),
        }
    }
}

/// Read a headed CSV file into a [`Table`].
pub fn read_table(path: &Path) -> Result<Table, PrepError> {
    let file = File::open(path).map_err(|source| PrepError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_table_from(file).map_err(|source| PrepError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_table_from<R: Read>(input: R) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(input);
    let columns = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record?;
        table.rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(table)
}

/// Render a table (header first) into encoded CSV bytes.
pub fn render_table(table: &Table, encoding: OutputEncoding) -> Result<Vec<u8>, PrepError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(&table.columns)
        .map_err(|e| PrepError::Render(e.to_string()))?;
    for row in &table.rows {
        writer
            .write_record(row)
            .map_err(|e| PrepError::Render(e.to_string()))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| PrepError::Render(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| PrepError::Render(e.to_string()))?;
    encoding.encode(text)
}

/// Write rendered output in one call.
///
/// Without `overwrite` the file is created with create-new semantics, so an
/// existing file at `path` is reported as [`PrepError::OutputCollision`] and
/// left untouched.
pub fn write_output(path: &Path, bytes: &[u8], overwrite: bool) -> Result<(), PrepError> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut file = options.open(path).map_err(|source| match source.kind() {
        io::ErrorKind::AlreadyExists => PrepError::OutputCollision(path.to_path_buf()),
        _ => PrepError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|source| PrepError::Io {
            path: path.to_path_buf(),
            source,
        })
}
