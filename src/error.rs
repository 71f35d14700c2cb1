use thiserror::Error;

/// Source location: line and column (both 1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

impl Span {
    #[must_use]
    pub fn new(line: usize, col: usize) -> Self {
        Span { line, col }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// A parse failure at the offending token. Fatal for the whole script.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{span}: {message}")]
pub struct SyntaxError {
    pub span: Span,
    pub message: String,
}

impl SyntaxError {
    #[must_use]
    pub fn new(span: Span, message: impl Into<String>) -> Self {
        SyntaxError { span, message: message.into() }
    }
}

/// A runtime condition that aborts the current row only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowError {
    #[error("array subscript out of range: {array}[{index}] (array has {arity} elements)")]
    IndexOutOfRange { array: String, index: f64, arity: usize },
    #[error("array {0} is not declared")]
    UndeclaredArray(String),
    #[error("unknown function {0}")]
    UnknownFunction(String),
    #[error("loop exceeded {0} iterations")]
    IterationLimit(usize),
    #[error("invalid DO loop control: {0}")]
    InvalidLoopControl(&'static str),
}

/// A row error together with the statement that raised it.
#[derive(Debug, Clone, PartialEq)]
pub struct RowFault {
    pub error: RowError,
    pub span: Span,
}

/// A failure that ends the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("{span}: corrupt statement tree: {message}")]
    Structural { span: Span, message: String },
    #[error("dataset {0} does not exist")]
    UnknownDataset(String),
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {message}")]
    Format { path: String, message: String },
}
