//! Perl-style pattern functions backed by the `regex` crate.
//!
//! Patterns are written `/re/flags` for matching and `s/re/replacement/flags`
//! for substitution; the only flag honoured is `i`. Compiled patterns are
//! cached per registry. An invalid pattern yields a missing value.

use std::cell::RefCell;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashMap;

use super::{FunctionRegistry, num_arg, text_arg};
use crate::runtime::Value;

#[derive(Default)]
struct PatternCache {
    compiled: FxHashMap<String, Option<(Regex, Option<String>)>>,
}

impl PatternCache {
    /// Compile (or fetch) a pattern and its replacement text, if any.
    fn get(&mut self, source: &str) -> Option<&(Regex, Option<String>)> {
        self.compiled
            .entry(source.to_string())
            .or_insert_with(|| compile(source))
            .as_ref()
    }
}

fn compile(source: &str) -> Option<(Regex, Option<String>)> {
    let source = source.trim();
    let (body, substitute) = match source.strip_prefix('s') {
        Some(rest) if rest.starts_with('/') => (rest, true),
        _ => (source, false),
    };
    let Some(body) = body.strip_prefix('/') else {
        // Undelimited text is a bare expression.
        return Regex::new(source).ok().map(|re| (re, None));
    };
    let parts = split_unescaped(body);
    let (expr, replacement, flags) = match (substitute, parts.as_slice()) {
        (false, [expr, flags]) => (expr.as_str(), None, flags.as_str()),
        (true, [expr, repl, flags]) => (expr.as_str(), Some(repl.clone()), flags.as_str()),
        _ => return None,
    };
    let re = RegexBuilder::new(expr).case_insensitive(flags.contains('i')).build().ok()?;
    Some((re, replacement))
}

/// Split on `/` delimiters, keeping `\/` as a literal slash.
fn split_unescaped(s: &str) -> Vec<String> {
    let mut parts = vec![String::new()];
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'/') => {
                chars.next();
                if let Some(p) = parts.last_mut() {
                    p.push('/');
                }
            }
            '/' => parts.push(String::new()),
            _ => {
                if let Some(p) = parts.last_mut() {
                    p.push(c);
                }
            }
        }
    }
    parts
}

pub fn register(reg: &mut FunctionRegistry) {
    let cache = Rc::new(RefCell::new(PatternCache::default()));

    let c = Rc::clone(&cache);
    // Position (1-based) of the first match, 0 when there is none.
    reg.register("prxmatch", move |args| {
        let source = text_arg(args, 0);
        let text = text_arg(args, 1);
        let mut cache = c.borrow_mut();
        let Some((re, _)) = cache.get(&source) else {
            return Value::MISSING;
        };
        let pos = re.find(&text).map_or(0, |m| text[..m.start()].chars().count() + 1);
        Value::from_number(pos as f64)
    });

    let c = Rc::clone(&cache);
    // prxchange(pattern, times, text); times = -1 replaces every match.
    reg.register("prxchange", move |args| {
        let source = text_arg(args, 0);
        let times = num_arg(args, 1);
        let text = text_arg(args, 2);
        let mut cache = c.borrow_mut();
        let Some((re, Some(replacement))) = cache.get(&source) else {
            return Value::MISSING;
        };
        let limit = if times.is_nan() || times < 0.0 { 0 } else { times as usize };
        if limit == 0 && times >= 0.0 {
            return Value::from_text(text);
        }
        Value::from_text(re.replacen(&text, limit, replacement.as_str()).into_owned())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(name: &str, args: &[Value]) -> Value {
        let reg = FunctionRegistry::with_builtins();
        let f = reg.lookup(name).expect("builtin");
        f(args)
    }

    #[test]
    fn prxmatch_positions() {
        let args = [Value::from("/b+/"), Value::from("aabbb")];
        assert_eq!(call("prxmatch", &args), Value::from(3.0));
        let args = [Value::from("/Z/i"), Value::from("xyz")];
        assert_eq!(call("prxmatch", &args), Value::from(3.0));
        let args = [Value::from("/q/"), Value::from("xyz")];
        assert_eq!(call("prxmatch", &args), Value::from(0.0));
    }

    #[test]
    fn prxchange_replaces() {
        let args = [Value::from("s/(\\w+)@(\\w+)/$2 at $1/"), Value::from(-1.0), Value::from("me@host")];
        assert_eq!(call("prxchange", &args), Value::from("host at me"));
        let args = [Value::from("s/a/b/"), Value::from(1.0), Value::from("aaa")];
        assert_eq!(call("prxchange", &args), Value::from("baa"));
    }

    #[test]
    fn escaped_slash() {
        let args = [Value::from("/a\\/b/"), Value::from("xa/b")];
        assert_eq!(call("prxmatch", &args), Value::from(2.0));
    }

    #[test]
    fn invalid_pattern_is_missing() {
        let args = [Value::from("/(/"), Value::from("x")];
        assert_eq!(call("prxmatch", &args), Value::MISSING);
        let args = [Value::from("/a/"), Value::from(1.0), Value::from("a")];
        assert_eq!(call("prxchange", &args), Value::MISSING);
    }
}
