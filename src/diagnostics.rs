//! Where notes, warnings and row errors go. The interpreter never prints.

use std::fmt;

use crate::error::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Note => "NOTE",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

pub trait Diagnostics {
    fn report(&mut self, severity: Severity, message: &str, span: Option<Span>);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Option<Span>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.span {
            Some(span) => write!(f, "{}: {}: {}", self.severity, span, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

/// Keeps every report in memory.
#[derive(Debug, Default)]
pub struct Collector {
    pub entries: Vec<Diagnostic>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages at exactly `severity`, in report order.
    pub fn messages(&self, severity: Severity) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|d| d.severity == severity)
            .map(|d| d.message.as_str())
            .collect()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }
}

impl Diagnostics for Collector {
    fn report(&mut self, severity: Severity, message: &str, span: Option<Span>) {
        self.entries.push(Diagnostic { severity, message: message.to_string(), span });
    }
}

/// Forwards reports to `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&mut self, severity: Severity, message: &str, span: Option<Span>) {
        let at = span.map(|s| s.to_string()).unwrap_or_default();
        match severity {
            Severity::Note => tracing::info!(target: "dstep::log", at = %at, "{}", message),
            Severity::Warning => tracing::warn!(target: "dstep::log", at = %at, "{}", message),
            Severity::Error => tracing::error!(target: "dstep::log", at = %at, "{}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collector_filters_by_severity() {
        let mut c = Collector::new();
        c.report(Severity::Note, "hello", None);
        c.report(Severity::Error, "bad", Some(Span::new(2, 3)));
        assert_eq!(c.messages(Severity::Note), ["hello"]);
        assert!(c.has_errors());
        assert_eq!(c.entries[1].to_string(), "ERROR: 2:3: bad");
    }
}
