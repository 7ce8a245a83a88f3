// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Result file dialects
//!
//! Three plain-text layouts are understood:
//!
//! - `timing`: one space-delimited header row, optionally behind a `#`
//!   comment marker. A token like `MLUPs|simLoop` names two columns.
//! - `tracking`: a units line followed by the space-delimited header row.
//! - `csv`: one comma-delimited header row as exported by visualization
//!   tools, where `:` separates vector components (`velocity:0`).
//!
//! Each dialect knows how many rows precede the data and which column types
//! its tables get.

use crate::field;
use crate::schema::{SqlType, TypeMap};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

/// How values within a row are separated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Runs of whitespace; leading and trailing whitespace is ignored
    Whitespace,
    /// A single byte, with CSV quoting rules
    Char(u8),
}

impl Delimiter {
    pub const COMMA: Delimiter = Delimiter::Char(b',');
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Timing,
    Tracking,
    #[serde(rename = "csv")]
    ExportedCsv,
}

impl Dialect {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Timing => "timing",
            Dialect::Tracking => "tracking",
            Dialect::ExportedCsv => "csv",
        }
    }

    #[must_use]
    pub fn delimiter(self) -> Delimiter {
        match self {
            Dialect::Timing | Dialect::Tracking => Delimiter::Whitespace,
            Dialect::ExportedCsv => Delimiter::COMMA,
        }
    }

    /// Rows in front of the first data row
    #[must_use]
    pub fn skip_rows(self) -> usize {
        self.header_row()
    }

    /// Column types for tables filled from this dialect
    #[must_use]
    pub fn type_map(self) -> TypeMap {
        match self {
            Dialect::Timing => TypeMap::timing(),
            Dialect::Tracking | Dialect::ExportedCsv => TypeMap::uniform(SqlType::Real),
        }
    }

    /// 1-based position of the row naming the columns
    fn header_row(self) -> usize {
        match self {
            Dialect::Timing | Dialect::ExportedCsv => 1,
            Dialect::Tracking => 2,
        }
    }

    /// Field identifiers of `path`, read from the header row(s) only
    pub fn read_header<P: AsRef<Path>>(self, path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        let row = self.header_row();
        let mut rows = RowReader::open(path, self.delimiter())?;
        let header = rows
            .nth_record(row)?
            .ok_or_else(|| Error::MissingHeader {
                path: path.to_path_buf(),
                row,
            })?;
        let tokens = strip_comment(header.values);

        let fields = match self {
            Dialect::Timing => field::normalize(
                tokens
                    .iter()
                    .flat_map(|t| t.trim_matches('|').split('|'))
                    .filter(|name| !name.is_empty()),
            )?,
            Dialect::Tracking => field::first_words(&tokens)?,
            Dialect::ExportedCsv => {
                field::first_words(tokens.iter().map(|t| t.replace(':', "_")))?
            }
        };
        log::debug!(
            "Read {} {} columns from {}: {:?}",
            fields.len(),
            self,
            path.display(),
            fields
        );
        Ok(fields)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Drop a leading `#` comment marker, standalone or attached to the first token
fn strip_comment(mut tokens: Vec<String>) -> Vec<String> {
    let stripped = match tokens.first().map(String::as_str) {
        Some("#") => None,
        Some(first) if first.starts_with('#') => Some(first[1..].trim_start().to_string()),
        _ => return tokens,
    };
    match stripped {
        Some(first) => tokens[0] = first,
        None => {
            _ = tokens.remove(0);
        }
    }
    tokens
}

/// One non-blank row of a result file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// 1-based line number in the file
    pub line: u64,
    pub values: Vec<String>,
}

enum Rows {
    Whitespace {
        lines: Lines<BufReader<File>>,
        line: u64,
    },
    Delimited(csv::StringRecordsIntoIter<File>),
}

/// Iterator over the non-blank rows of a delimited file
pub struct RowReader {
    path: PathBuf,
    rows: Rows,
}

impl RowReader {
    pub fn open<P: AsRef<Path>>(path: P, delimiter: Delimiter) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::io(&path, e))?;
        let rows = match delimiter {
            Delimiter::Whitespace => Rows::Whitespace {
                lines: BufReader::new(file).lines(),
                line: 0,
            },
            Delimiter::Char(byte) => Rows::Delimited(
                csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .trim(csv::Trim::All)
                    .delimiter(byte)
                    .from_reader(file)
                    .into_records(),
            ),
        };
        Ok(Self { path, rows })
    }

    /// The `n`-th (1-based) record, or `None` when the file is shorter
    pub fn nth_record(&mut self, n: usize) -> Result<Option<Record>> {
        let mut found = None;
        for _ in 0..n {
            found = self.next().transpose()?;
            if found.is_none() {
                break;
            }
        }
        Ok(found)
    }

    /// Advance past `n` records
    pub fn skip_records(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            if self.next().transpose()?.is_none() {
                break;
            }
        }
        Ok(())
    }
}

impl Iterator for RowReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = &self.path;
        match &mut self.rows {
            Rows::Whitespace { lines, line } => loop {
                let text = match lines.next()? {
                    Ok(text) => text,
                    Err(e) => return Some(Err(Error::io(path, e))),
                };
                *line += 1;
                let values: Vec<String> = text.split_whitespace().map(str::to_string).collect();
                if !values.is_empty() {
                    return Some(Ok(Record {
                        line: *line,
                        values,
                    }));
                }
            },
            Rows::Delimited(records) => loop {
                let record = match records.next()? {
                    Ok(record) => record,
                    Err(e) => return Some(Err(e.into())),
                };
                if record.iter().all(str::is_empty) {
                    continue;
                }
                return Some(Ok(Record {
                    line: record.position().map_or(0, |p| p.line()),
                    values: record.iter().map(str::to_string).collect(),
                }));
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_timing_header_expands_and_dedupes() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "timing.res",
            "# revision casename nProcs |MLUPs|simLoop| simLoop\nabc cube 24 1.5 2.5 3.5\n",
        );
        let fields = Dialect::Timing.read_header(&path).unwrap();
        assert_eq!(
            fields,
            vec!["revision", "casename", "nProcs", "MLUPs", "simLoop", "simLoop_1"]
        );
    }

    #[test]
    fn test_timing_header_with_attached_marker() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "timing.res", "#nProcs   KDUPS\n 4  1.0\n");
        let fields = Dialect::Timing.read_header(&path).unwrap();
        assert_eq!(fields, vec!["nProcs", "KDUPS"]);
    }

    #[test]
    fn test_tracking_header_uses_second_row() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "probe.res",
            "# units s kg/m^3\n#  time  density(kg/m^3)  coordX\n 0.0 1.0 0.5\n",
        );
        let fields = Dialect::Tracking.read_header(&path).unwrap();
        assert_eq!(fields, vec!["time", "density", "coordX"]);
    }

    #[test]
    fn test_csv_header_normalizes_components() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "slice.csv",
            "\"Points:0\",\"Points:1\",\"pressure\"\n0.0,1.0,101325\n",
        );
        let fields = Dialect::ExportedCsv.read_header(&path).unwrap();
        assert_eq!(fields, vec!["Points_0", "Points_1", "pressure"]);
    }

    #[test]
    fn test_missing_header_is_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "short.res", "# only units\n");
        assert!(matches!(
            Dialect::Tracking.read_header(&path),
            Err(Error::MissingHeader { row: 2, .. })
        ));
        assert!(matches!(
            Dialect::Timing.read_header(dir.path().join("absent.res")),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn test_row_reader_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "data.res", "a b\n\n   \n1  2 \n");
        let records: Vec<Record> = RowReader::open(&path, Delimiter::Whitespace)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].line, 4);
        assert_eq!(records[1].values, vec!["1", "2"]);
    }

    #[test]
    fn test_dialect_names_in_config() {
        let dialects: Vec<Dialect> = serde_yaml_ng::from_str("[timing, tracking, csv]").unwrap();
        assert_eq!(
            dialects,
            vec![Dialect::Timing, Dialect::Tracking, Dialect::ExportedCsv]
        );
        assert_eq!(Dialect::Tracking.skip_rows(), 2);
        assert_eq!(Dialect::ExportedCsv.delimiter(), Delimiter::COMMA);
    }
}
