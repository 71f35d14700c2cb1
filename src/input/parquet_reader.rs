//! Parquet file reader. Only compiled with the `parquet` feature.
//!
//! Numeric and boolean columns become numbers; every other column is read
//! as text through arrow's display formatter. Nulls are missing.

use std::fs::File;
use std::path::Path;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::error::ArrowError;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::{ArrowReaderOptions, ParquetRecordBatchReaderBuilder};

use crate::error::RunError;
use crate::runtime::{Dataset, Row, Value};

pub fn read_parquet(path: &Path) -> Result<Dataset, RunError> {
    let shown = path.display().to_string();
    let format_error = |e: &dyn std::fmt::Display| RunError::Format {
        path: shown.clone(),
        message: format!("parquet: {}", e),
    };

    let file = File::open(path).map_err(|source| RunError::Io { path: shown.clone(), source })?;
    let options = ArrowReaderOptions::new().with_skip_arrow_metadata(true);
    let builder = ParquetRecordBatchReaderBuilder::try_new_with_options(file, options)
        .map_err(|e| format_error(&e))?;
    let columns: Vec<String> = builder.schema().fields().iter().map(|f| f.name().clone()).collect();
    let reader = builder.build().map_err(|e| format_error(&e))?;

    let mut dataset = Dataset::with_columns(columns.iter().map(String::as_str));
    for batch in reader {
        let batch = batch.map_err(|e| format_error(&e))?;
        let decoded = batch
            .columns()
            .iter()
            .map(decode_column)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format_error(&e))?;
        for row_idx in 0..batch.num_rows() {
            let mut row = Row::new();
            for (name, values) in columns.iter().zip(&decoded) {
                row.set(name, values[row_idx].clone());
            }
            dataset.push(row);
        }
    }
    Ok(dataset)
}

fn decode_column(array: &ArrayRef) -> Result<Vec<Value>, ArrowError> {
    let data_type = array.data_type();
    if data_type.is_numeric() || matches!(data_type, DataType::Boolean) {
        let widened = cast(array, &DataType::Float64)?;
        let numbers = widened
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| ArrowError::CastError(format!("cannot read {} as numbers", data_type)))?;
        return Ok((0..numbers.len())
            .map(|i| if numbers.is_null(i) { Value::MISSING } else { Value::from_number(numbers.value(i)) })
            .collect());
    }

    let options = FormatOptions::default();
    let formatter = ArrayFormatter::try_new(array.as_ref(), &options)?;
    Ok((0..array.len())
        .map(|i| {
            if array.is_null(i) {
                Value::from_text("")
            } else {
                Value::from_text(formatter.value(i).to_string())
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use arrow::array::{BooleanArray, Int32Array, StringArray};

    #[test]
    fn numeric_columns_widen() {
        let ints: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None, Some(3)]));
        assert_eq!(decode_column(&ints).unwrap(), vec![Value::from(1.0), Value::MISSING, Value::from(3.0)]);
        let flags: ArrayRef = Arc::new(BooleanArray::from(vec![true, false]));
        assert_eq!(decode_column(&flags).unwrap(), vec![Value::from(1.0), Value::from(0.0)]);
    }

    #[test]
    fn text_columns_keep_text() {
        let names: ArrayRef = Arc::new(StringArray::from(vec![Some("ann"), None]));
        assert_eq!(decode_column(&names).unwrap(), vec![Value::from("ann"), Value::from("")]);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_parquet(Path::new("/nonexistent/x.parquet")).unwrap_err();
        assert!(matches!(err, RunError::Io { .. }));
    }
}
