use crate::builtins::to_number;
use crate::parser::InputField;
use crate::runtime::{Dataset, Row, Value};

/// Split one data line into fields.
///
/// Without a delimiter, fields are separated by runs of whitespace. With
/// one, every character of the delimiter string separates fields and runs
/// of separators count as one, so leading and trailing separators produce
/// no empty fields.
pub fn split(record: &str, delimiter: Option<&str>) -> Vec<String> {
    match delimiter {
        None => record.split_whitespace().map(String::from).collect(),
        Some(dlm) => record
            .split(|c: char| dlm.contains(c))
            .filter(|f| !f.is_empty())
            .map(String::from)
            .collect(),
    }
}

/// Build a dataset from an inline data block. Each non-blank line is one
/// row; fields past the end of a line are missing and extra fields are
/// ignored. `$` fields keep their text, others are read as numbers.
pub fn parse_datalines(data: &str, fields: &[InputField], delimiter: Option<&str>) -> Dataset {
    let mut dataset = Dataset::with_columns(fields.iter().map(|f| f.name.as_str()));
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        let cells = split(line, delimiter);
        let mut row = Row::new();
        for (i, field) in fields.iter().enumerate() {
            let raw = cells.get(i).map_or("", String::as_str);
            let value = if field.text {
                Value::from_text(raw)
            } else {
                Value::from_number(to_number(raw))
            };
            row.set(&field.name, value);
        }
        dataset.push(row);
    }
    dataset
}
