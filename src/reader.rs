//! Delimited reader for the three input files
//!
//! All inputs are flat files with one record per line, read through the `csv`
//! crate with quoting disabled so a field is exactly the text between two
//! delimiters. Blank lines are skipped wherever they occur. A record with the
//! wrong number of columns, or whose fields do not parse, is a fatal error
//! carrying the file path and 1-based line number.

use crate::error::{PrepError, Result};
use csv::StringRecord;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How many columns a record must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Columns {
    Exactly(usize),
    AtLeast(usize),
}

impl Columns {
    fn accepts(&self, found: usize) -> bool {
        match *self {
            Columns::Exactly(n) => found == n,
            Columns::AtLeast(n) => found >= n,
        }
    }
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Columns::Exactly(n) => write!(f, "exactly {}", n),
            Columns::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// The fields of one input record
#[derive(Debug)]
pub struct LineFields<'a> {
    path: &'a Path,
    line: usize,
    record: &'a StringRecord,
}

impl<'a> LineFields<'a> {
    pub fn line(&self) -> usize {
        self.line
    }

    /// Raw text of column `column` (0-based)
    pub fn text(&self, column: usize) -> &'a str {
        &self.record[column]
    }

    /// Parse column `column` (0-based) into `T`
    pub fn parse<T>(&self, column: usize) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.record[column].trim();
        value.parse::<T>().map_err(|e| PrepError::InvalidField {
            path: self.path.to_path_buf(),
            line: self.line,
            column,
            value: value.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Reads a delimited file, enforcing a column count per record
#[derive(Debug, Clone)]
pub struct DelimitedReader {
    path: PathBuf,
    delimiter: u8,
    columns: Columns,
    skip_header: bool,
}

impl DelimitedReader {
    /// `delimiter` must be a single ASCII character; `PrepConfig::validate`
    /// rejects anything else before a reader is built.
    pub fn new(path: &Path, delimiter: char, columns: Columns) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: delimiter as u8,
            columns,
            skip_header: false,
        }
    }

    pub fn tab_separated(path: &Path, columns: Columns) -> Self {
        Self::new(path, '\t', columns)
    }

    pub fn skip_header(mut self) -> Self {
        self.skip_header = true;
        self
    }

    /// Call `visit` for every data record in file order.
    pub fn for_each<F>(&self, mut visit: F) -> Result<usize>
    where
        F: FnMut(&LineFields<'_>) -> Result<()>,
    {
        let file = File::open(&self.path).map_err(|e| PrepError::io(&self.path, e))?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.skip_header)
            .flexible(true)
            .quoting(false)
            .from_reader(file);

        let mut record = StringRecord::new();
        let mut count = 0;
        while reader
            .read_record(&mut record)
            .map_err(|e| PrepError::csv(&self.path, e))?
        {
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(count + 1);

            if !self.columns.accepts(record.len()) {
                return Err(PrepError::ColumnCount {
                    path: self.path.clone(),
                    line,
                    expected: self.columns,
                    found: record.len(),
                });
            }

            visit(&LineFields {
                path: &self.path,
                line,
                record: &record,
            })?;
            count += 1;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_reads_fields_and_skips_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ratings.csv");
        std::fs::write(&path, "userId,movieId,rating,timestamp\n1,31,2.5,1260759144\n1,1029,3.0,1260759179\n").unwrap();

        let mut rows = Vec::new();
        let count = DelimitedReader::new(&path, ',', Columns::AtLeast(4))
            .skip_header()
            .for_each(|f| {
                rows.push((f.parse::<i64>(0)?, f.parse::<i64>(1)?, f.parse::<f64>(2)?, f.line()));
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(rows[0], (1, 31, 2.5, 2));
        assert_eq!(rows[1], (1, 1029, 3.0, 3));
    }

    #[test]
    fn test_too_few_columns_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kg.txt");
        std::fs::write(&path, "1\tfilm.director\t2\n3\t4\n").unwrap();

        let err = DelimitedReader::tab_separated(&path, Columns::Exactly(3))
            .for_each(|_| Ok(()))
            .unwrap_err();

        match err {
            PrepError::ColumnCount { line, expected, found, .. } => {
                assert_eq!(line, 2);
                assert_eq!(expected, Columns::Exactly(3));
                assert_eq!(found, 2);
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_extra_column_rejected_in_exact_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kg.txt");
        std::fs::write(&path, "1\trel_a\t2\t99\n").unwrap();

        let err = DelimitedReader::tab_separated(&path, Columns::Exactly(3))
            .for_each(|_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PrepError::ColumnCount { line: 1, found: 4, .. }));

        let count = DelimitedReader::tab_separated(&path, Columns::AtLeast(3))
            .for_each(|_| Ok(()))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_blank_lines_are_skipped_with_true_line_numbers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item2entity.txt");
        std::fs::write(&path, "1\t100\n\n2\t200\n\n").unwrap();

        let mut lines = Vec::new();
        let count = DelimitedReader::tab_separated(&path, Columns::Exactly(2))
            .for_each(|f| {
                lines.push(f.line());
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(lines, vec![1, 3]);
    }

    #[test]
    fn test_quotes_are_plain_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kg.txt");
        std::fs::write(&path, "1\t\"film\t2\n").unwrap();

        let mut relation = String::new();
        DelimitedReader::tab_separated(&path, Columns::Exactly(3))
            .for_each(|f| {
                relation = f.text(1).to_string();
                Ok(())
            })
            .unwrap();
        assert_eq!(relation, "\"film");
    }

    #[test]
    fn test_bad_integer_reports_location() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item2entity.txt");
        std::fs::write(&path, "1\t100\nabc\t101\n").unwrap();

        let err = DelimitedReader::tab_separated(&path, Columns::Exactly(2))
            .for_each(|f| f.parse::<i64>(0).map(|_| ()))
            .unwrap_err();

        assert!(matches!(err, PrepError::InvalidField { line: 2, column: 0, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = DelimitedReader::tab_separated(Path::new("/nonexistent/kg.txt"), Columns::Exactly(3))
            .for_each(|_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, PrepError::Io { .. }));
    }
}
