pub mod math;
pub mod pattern;
pub mod string;

use std::fmt;

use rustc_hash::FxHashMap;

use crate::runtime::Value;

/// A host or built-in function: positional arguments in, one value out.
/// Bad arguments produce a missing value rather than an error.
pub type Function = Box<dyn Fn(&[Value]) -> Value>;

/// Name-keyed function table, consulted when a call is evaluated rather
/// than when it is parsed, so an unknown name only fails if its call runs.
pub struct FunctionRegistry {
    functions: FxHashMap<String, Function>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        FunctionRegistry { functions: FxHashMap::default() }
    }

    /// A registry preloaded with the built-in math, text and pattern functions.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        math::register(&mut reg);
        string::register(&mut reg);
        pattern::register(&mut reg);
        reg
    }

    /// Add or replace a function. Names are case-insensitive.
    pub fn register(&mut self, name: &str, f: impl Fn(&[Value]) -> Value + 'static) {
        self.functions.insert(name.to_ascii_lowercase(), Box::new(f));
    }

    pub fn lookup(&self, name: &str) -> Option<&Function> {
        match self.functions.get(name) {
            Some(f) => Some(f),
            None => self.functions.get(&name.to_ascii_lowercase()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}

/// Coerce text to a number. Blank text, `.` and anything that is not a
/// complete finite number are missing (NaN).
pub fn to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() || s == "." {
        return f64::NAN;
    }
    match s.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => f64::NAN,
    }
}

/// Format a number for output (integer form when exact, otherwise up to 10 decimals).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return ".".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        let s = format!("{:.10}", n);
        let s = s.trim_end_matches('0');
        let s = s.trim_end_matches('.');
        s.to_string()
    }
}

/// Numeric view of the `i`-th argument; absent arguments are missing.
pub(crate) fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

/// Text view of the `i`-th argument; absent arguments are empty.
pub(crate) fn text_arg(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_text).unwrap_or_default()
}
