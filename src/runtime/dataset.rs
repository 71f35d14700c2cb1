use super::Value;

/// One record: an ordered mapping from variable name to value.
///
/// Lookups ignore ASCII case; the spelling a name was first stored with
/// is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.cells
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    }

    /// Replace the value for `name`, or append it as the last cell.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.cells.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((name.to_string(), value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.set(&name.into(), value.into());
        }
        row
    }
}

/// Ordered rows plus an append-only column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let mut ds = Dataset::new();
        for c in columns {
            ds.add_column(&c.into());
        }
        ds
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Register a column if it has not been seen yet.
    pub fn add_column(&mut self, name: &str) {
        if !self.columns.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            self.columns.push(name.to_string());
        }
    }

    /// Append a row, extending the column order with any names it introduces.
    pub fn push(&mut self, row: Row) {
        for name in row.names() {
            self.add_column(name);
        }
        self.rows.push(row);
    }

    /// Cell value; a column the row never had reads as missing.
    pub fn value(&self, row: usize, column: &str) -> Value {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or(Value::MISSING)
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
