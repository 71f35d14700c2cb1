//! Writing datasets: CSV files and a plain-text listing.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::RunError;
use crate::runtime::{Dataset, Value};

/// Header row, then one record per row. Missing values are empty cells.
pub fn write_csv(dataset: &Dataset, out: &mut dyn Write) -> io::Result<()> {
    let header: Vec<String> = dataset.columns().iter().map(|c| quote(c)).collect();
    writeln!(out, "{}", header.join(","))?;
    for row in dataset.rows() {
        let cells: Vec<String> = dataset
            .columns()
            .iter()
            .map(|c| match row.get(c) {
                Some(v) if !v.is_missing() => quote(&v.to_string()),
                _ => String::new(),
            })
            .collect();
        writeln!(out, "{}", cells.join(","))?;
    }
    Ok(())
}

pub fn save_csv(dataset: &Dataset, path: &Path) -> Result<(), RunError> {
    let io_error = |source| RunError::Io { path: path.display().to_string(), source };
    let file = File::create(path).map_err(io_error)?;
    let mut out = BufWriter::new(file);
    write_csv(dataset, &mut out).map_err(io_error)?;
    out.flush().map_err(io_error)
}

fn quote(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

/// Aligned listing with an observation number column. Numbers are right
/// aligned, text left aligned, missing numbers shown as `.`.
pub fn render_table(title: &str, dataset: &Dataset) -> String {
    let columns = dataset.columns();
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    let obs_width = dataset.len().to_string().len().max(3);

    let cells: Vec<Vec<(String, bool)>> = dataset
        .rows()
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| {
                    let v = row.get(c).cloned().unwrap_or(Value::MISSING);
                    (v.to_string(), !v.is_text())
                })
                .collect()
        })
        .collect();
    for row in &cells {
        for (w, (text, _)) in widths.iter_mut().zip(row) {
            *w = (*w).max(text.chars().count());
        }
    }

    let mut out = format!("{}: {} observations\n\n", title, dataset.len());
    out.push_str(&format!("{:>obs_width$}", "Obs"));
    for (c, &w) in columns.iter().zip(&widths) {
        out.push_str(&format!("  {:>w$}", c));
    }
    out.push('\n');
    for (i, row) in cells.iter().enumerate() {
        out.push_str(&format!("{:>obs_width$}", i + 1));
        for ((text, numeric), &w) in row.iter().zip(&widths) {
            if *numeric {
                out.push_str(&format!("  {:>w$}", text));
            } else {
                out.push_str(&format!("  {:<w$}", text));
            }
        }
        out.push('\n');
    }
    out
}
