//! Delimited table export with atomic tmp→rename
//!
//! Records are flattened through `serde_json`: every top-level key becomes a
//! column, nested values are written as compact JSON in a single cell.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ExportError;

/// In-memory table with columns inferred from the records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from any serializable records.
    ///
    /// The column set is the union of keys over all records, in first-seen
    /// order. A record lacking a column gets an empty cell.
    pub fn from_records<T: Serialize>(records: &[T]) -> Result<Self, ExportError> {
        let mut objects: Vec<Map<String, Value>> = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            match serde_json::to_value(record)? {
                Value::Object(map) => objects.push(map),
                other => {
                    return Err(ExportError::NotARecord {
                        index,
                        kind: value_kind(&other),
                    });
                }
            }
        }

        let mut seen = FxHashSet::default();
        let mut columns = Vec::new();
        for key in objects.iter().flat_map(|obj| obj.keys()) {
            if seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }

        let rows = objects
            .iter()
            .map(|obj| {
                columns
                    .iter()
                    .map(|col| obj.get(col).map(cell).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Render one JSON value as a cell.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // Arrays and sub-objects stay machine-readable
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Writes named tables into one output directory.
#[derive(Debug, Clone)]
pub struct Exporter {
    output_dir: PathBuf,
    delimiter: u8,
}

impl Exporter {
    pub fn new(output_dir: impl Into<PathBuf>, delimiter: u8) -> Self {
        Self {
            output_dir: output_dir.into(),
            delimiter,
        }
    }

    /// File extension implied by the delimiter.
    pub fn extension(&self) -> &'static str {
        match self.delimiter {
            b',' => "csv",
            b'\t' => "tsv",
            _ => "txt",
        }
    }

    /// Final path of export `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{name}.{}", self.extension()))
    }

    /// Serialize `records` and write them as `<name>.<ext>`.
    pub fn export<T: Serialize>(&self, name: &str, records: &[T]) -> Result<Written, ExportError> {
        let table = Table::from_records(records)?;
        let path = self.write(name, &table)?;
        Ok(Written {
            name: name.to_string(),
            path,
            rows: table.len(),
        })
    }

    /// Write a table through a `.tmp` file, renamed on success.
    ///
    /// On failure the tmp file is removed and no final file appears.
    pub fn write(&self, name: &str, table: &Table) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.output_dir)?;
        let final_path = self.path_for(name);
        let tmp_path = final_path.with_extension(format!("{}.tmp", self.extension()));

        if let Err(e) = self.write_file(&tmp_path, table) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&tmp_path, &final_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        log::debug!("{}: {} rows", final_path.display(), table.len());
        Ok(final_path)
    }

    fn write_file(&self, path: &Path, table: &Table) -> Result<(), ExportError> {
        let file = BufWriter::new(File::create(path)?);
        let mut writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .from_writer(file);
        if !table.columns.is_empty() {
            writer.write_record(&table.columns)?;
        }
        for row in &table.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// A table that made it to disk.
#[derive(Debug, Clone)]
pub struct Written {
    pub name: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Result of a batch of named exports.
#[derive(Debug, Default)]
pub struct ExportOutcome {
    pub written: Vec<Written>,
    pub failed: Vec<(String, ExportError)>,
}

impl ExportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Runs a sequence of exports where each table fails on its own.
pub struct ExportSet<'a> {
    exporter: &'a Exporter,
    outcome: ExportOutcome,
}

impl<'a> ExportSet<'a> {
    pub fn new(exporter: &'a Exporter) -> Self {
        Self {
            exporter,
            outcome: ExportOutcome::default(),
        }
    }

    /// Export one table, recording rather than propagating a failure.
    pub fn add<T: Serialize>(&mut self, name: &str, records: &[T]) -> &mut Self {
        match self.exporter.export(name, records) {
            Ok(written) => {
                log::info!("Wrote {} ({} rows)", written.path.display(), written.rows);
                self.outcome.written.push(written);
            }
            Err(e) => {
                log::error!("{name}: export failed: {e}");
                self.outcome.failed.push((name.to_string(), e));
            }
        }
        self
    }

    pub fn finish(self) -> ExportOutcome {
        self.outcome
    }
}
