//! Loading datasets from files: CSV/TSV with a header row, and Parquet
//! when the `parquet` feature is on.

pub mod csv;
#[cfg(feature = "parquet")]
pub mod parquet_reader;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::builtins::to_number;
use crate::error::RunError;
use crate::library::Library;
use crate::runtime::{Dataset, Row, Value};

use self::csv::CsvReader;

/// Read a dataset, choosing the reader from the file extension.
pub fn load_dataset(path: &Path) -> Result<Dataset, RunError> {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);
    let dataset = match ext.as_deref() {
        Some("parquet") => read_parquet(path)?,
        Some("tsv") | Some("tab") => read_delimited(path, CsvReader::tab())?,
        _ => read_delimited(path, CsvReader::comma())?,
    };
    debug!(path = %path.display(), rows = dataset.len(), columns = dataset.columns().len(), "loaded dataset");
    Ok(dataset)
}

#[cfg(feature = "parquet")]
fn read_parquet(path: &Path) -> Result<Dataset, RunError> {
    parquet_reader::read_parquet(path)
}

#[cfg(not(feature = "parquet"))]
fn read_parquet(path: &Path) -> Result<Dataset, RunError> {
    Err(RunError::Format {
        path: path.display().to_string(),
        message: "parquet support not compiled in (enable the `parquet` feature)".to_string(),
    })
}

fn read_delimited(path: &Path, reader: CsvReader) -> Result<Dataset, RunError> {
    let shown = path.display().to_string();
    let file = File::open(path).map_err(|source| RunError::Io { path: shown.clone(), source })?;
    read_records(&mut BufReader::new(file), &reader)
        .map_err(|source| RunError::Io { path: shown, source })
}

/// Header row first, then one row per record. A column whose non-blank
/// cells all parse as numbers is numeric; otherwise it is text. Blank and
/// `.` cells are missing.
pub fn read_records(input: &mut dyn BufRead, reader: &CsvReader) -> std::io::Result<Dataset> {
    let Some(header) = reader.next_record(input)? else {
        return Ok(Dataset::new());
    };
    let mut records = Vec::new();
    while let Some(record) = reader.next_record(input)? {
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        records.push(record);
    }

    let numeric: Vec<bool> = (0..header.len())
        .map(|c| {
            records.iter().all(|r| {
                let cell = r.get(c).map_or("", |s| s.trim());
                cell.is_empty() || cell == "." || !to_number(cell).is_nan()
            })
        })
        .collect();

    let mut dataset = Dataset::with_columns(header.iter().map(|h| h.trim()));
    for record in &records {
        let mut row = Row::new();
        for (c, name) in header.iter().enumerate() {
            let cell = record.get(c).map_or("", String::as_str);
            let value = if numeric[c] {
                Value::from_number(to_number(cell))
            } else if cell.trim() == "." {
                Value::from_text("")
            } else {
                Value::from_text(cell)
            };
            row.set(name.trim(), value);
        }
        dataset.push(row);
    }
    Ok(dataset)
}

impl Library {
    /// Load a file into the library under `id`.
    pub fn load_file(&mut self, id: &str, path: &Path) -> Result<(), RunError> {
        let dataset = load_dataset(path)?;
        self.insert(id, dataset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(src: &str) -> Dataset {
        read_records(&mut src.as_bytes(), &CsvReader::comma()).unwrap()
    }

    #[test]
    fn columns_are_typed() {
        let ds = read("name,age,score\nann,30,.\nbob,,7.5\n");
        assert_eq!(ds.columns(), ["name", "age", "score"]);
        assert_eq!(ds.value(0, "name"), Value::from("ann"));
        assert_eq!(ds.value(0, "age"), Value::from(30.0));
        assert_eq!(ds.value(1, "age"), Value::MISSING);
        assert_eq!(ds.value(0, "score"), Value::MISSING);
        assert_eq!(ds.value(1, "score"), Value::from(7.5));
    }

    #[test]
    fn mixed_column_is_text() {
        let ds = read("code\n12\nA7\n");
        assert_eq!(ds.value(0, "code"), Value::from("12"));
        assert!(ds.value(0, "code").is_text());
    }

    #[test]
    fn empty_input_and_blank_lines() {
        assert!(read("").columns().is_empty());
        let ds = read("x\n1\n\n2\n");
        assert_eq!(ds.len(), 2);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_dataset(Path::new("/nonexistent/data.csv")).unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
    }
}
