use crate::error::{PipelineError, Result};
use csv::{ReaderBuilder, StringRecord};
use log::debug;
use std::io::Read;
use std::path::Path;

/// A delimited file held entirely as text, with header lookup by name.
///
/// Nothing is parsed at load time; normalizers decide per column what a
/// field means and drop rows that fail.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub source: String,
    headers: StringRecord,
    rows: Vec<StringRecord>,
}

impl RawTable {
    pub fn new(source: impl Into<String>, headers: StringRecord, rows: Vec<StringRecord>) -> Self {
        RawTable {
            source: source.into(),
            headers,
            rows,
        }
    }

    /// Index of a column, or `None` if the header does not exist.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    /// Index of a column that a stage cannot run without.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.find_column(name)
            .ok_or_else(|| PipelineError::schema(&self.source, [name]))
    }

    /// Indices of several required columns; the error lists all that are missing.
    pub fn require_columns(&self, names: &[&str]) -> Result<Vec<usize>> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|n| self.find_column(n).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::schema(&self.source, missing));
        }
        Ok(names.iter().filter_map(|n| self.find_column(n)).collect())
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Field `idx` of `row`; short (flexible) rows yield `None`.
pub fn field(row: &StringRecord, idx: usize) -> Option<&str> {
    row.get(idx)
}

pub fn load_table(path: &Path, delimiter: u8) -> Result<RawTable> {
    let file = std::fs::File::open(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let table = read_table(file, &path.display().to_string(), delimiter).map_err(|source| {
        PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        }
    })?;
    debug!("loaded {} rows from {}", table.len(), path.display());
    Ok(table)
}

/// Read delimited text from any reader. Rows with a broken record layout
/// (bad quoting, invalid UTF-8) are skipped the way unparsable fields are.
pub fn read_table<R: Read>(
    reader: R,
    source: &str,
    delimiter: u8,
) -> csv::Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        match result {
            Ok(r) => rows.push(r),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!("{}: skipped {} malformed records", source, skipped);
    }
    Ok(RawTable::new(source, headers, rows))
}
