//! Header-addressed CSV tables as found in a GTFS directory.

use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;

use crate::errors::ProducerError;

/// One GTFS file held in memory, columns addressed by header name.
#[derive(Debug, Clone)]
pub struct StaticTable {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl StaticTable {
    pub fn new(name: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    /// Reads a table from `path`. The table is named after the file stem.
    pub fn from_path(path: &Path) -> Result<Self, ProducerError> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("table")
            .to_string();
        let file = std::fs::File::open(path)
            .map_err(|e| ProducerError::malformed(&name, format!("{}: {e}", path.display())))?;
        Self::from_reader(&name, file)
    }

    pub fn from_reader<R: Read>(name: &str, reader: R) -> Result<Self, ProducerError> {
        let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| ProducerError::malformed(name, e.to_string()))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| ProducerError::malformed(name, e.to_string()))?;
            rows.push(record.iter().map(|f| f.to_string()).collect());
        }

        Ok(Self {
            name: name.to_string(),
            headers,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column.
    pub fn column(&self, header: &str) -> Result<usize, ProducerError> {
        self.optional_column(header).ok_or_else(|| {
            ProducerError::malformed(&self.name, format!("missing column {header}"))
        })
    }

    pub fn optional_column(&self, header: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == header)
    }

    /// Iterates rows with their 1-based data line number (header excluded).
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().enumerate().map(|(i, fields)| Row {
            table: &self.name,
            line: i + 1,
            fields,
        })
    }
}

/// A borrowed row of a [`StaticTable`].
pub struct Row<'a> {
    table: &'a str,
    line: usize,
    fields: &'a [String],
}

impl<'a> Row<'a> {
    /// Field at `col`, erroring when the row is short or the value is blank.
    pub fn get(&self, col: usize) -> Result<&'a str, ProducerError> {
        match self.fields.get(col).map(String::as_str) {
            Some(v) if !v.is_empty() => Ok(v),
            _ => Err(self.error(format!("empty value in column {col}"))),
        }
    }

    pub fn get_opt(&self, col: Option<usize>) -> Option<&'a str> {
        col.and_then(|c| self.fields.get(c))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn error(&self, reason: impl AsRef<str>) -> ProducerError {
        ProducerError::malformed(self.table, format!("row {}: {}", self.line, reason.as_ref()))
    }
}
