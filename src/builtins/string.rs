use super::{FunctionRegistry, num_arg, text_arg};
use crate::runtime::Value;

/// Default word delimiters for `scan`.
const SCAN_DELIMITERS: &str = " !$%&()*+,-./;<^|";

/// Register the text built-ins. Numeric arguments are used through their
/// display form.
pub fn register(reg: &mut FunctionRegistry) {
    reg.register("upcase", |args| Value::from_text(text_arg(args, 0).to_uppercase()));
    reg.register("lowcase", |args| Value::from_text(text_arg(args, 0).to_lowercase()));
    reg.register("trim", |args| Value::from_text(text_arg(args, 0).trim_end()));
    reg.register("left", |args| Value::from_text(text_arg(args, 0).trim_start()));
    reg.register("strip", |args| Value::from_text(text_arg(args, 0).trim()));

    // Trailing blanks do not count; a blank string has length 1.
    reg.register("length", |args| {
        let s = text_arg(args, 0);
        let n = s.trim_end().chars().count().max(1);
        Value::from_number(n as f64)
    });

    reg.register("substr", |args| {
        let s = text_arg(args, 0);
        let start = num_arg(args, 1);
        if start.is_nan() || start < 1.0 {
            return Value::from_text("");
        }
        let skip = start as usize - 1;
        let len = num_arg(args, 2);
        let text: String = if args.len() > 2 && !len.is_nan() {
            s.chars().skip(skip).take(len.max(0.0) as usize).collect()
        } else {
            s.chars().skip(skip).collect()
        };
        Value::from_text(text)
    });

    reg.register("index", |args| {
        let s = text_arg(args, 0);
        let target = text_arg(args, 1);
        let pos = match s.find(target.as_str()) {
            Some(byte_pos) if !target.is_empty() => s[..byte_pos].chars().count() + 1,
            _ => 0,
        };
        Value::from_number(pos as f64)
    });

    reg.register("scan", |args| {
        let s = text_arg(args, 0);
        let n = num_arg(args, 1);
        let delims = if args.len() > 2 { text_arg(args, 2) } else { SCAN_DELIMITERS.to_string() };
        let words: Vec<&str> =
            s.split(|c: char| delims.contains(c)).filter(|w| !w.is_empty()).collect();
        // Fractional counts truncate toward zero; a zero count selects nothing.
        let n = n.trunc();
        if n.is_nan() || n == 0.0 {
            return Value::from_text("");
        }
        let idx = if n > 0.0 {
            n as usize - 1
        } else {
            match words.len().checked_sub((-n) as usize) {
                Some(i) => i,
                None => return Value::from_text(""),
            }
        };
        Value::from_text(words.get(idx).copied().unwrap_or(""))
    });

    reg.register("tranwrd", |args| {
        let s = text_arg(args, 0);
        let from = text_arg(args, 1);
        let to = text_arg(args, 2);
        if from.is_empty() {
            return Value::from_text(s);
        }
        Value::from_text(s.replace(&from, &to))
    });

    reg.register("compress", |args| {
        let s = text_arg(args, 0);
        let drop = if args.len() > 1 { text_arg(args, 1) } else { " ".to_string() };
        Value::from_text(s.chars().filter(|c| !drop.contains(*c)).collect::<String>())
    });

    reg.register("cats", |args| {
        let mut out = String::new();
        for v in args.iter().filter(|v| !v.is_missing()) {
            out.push_str(v.to_text().trim());
        }
        Value::from_text(out)
    });

    reg.register("catx", |args| {
        let sep = text_arg(args, 0);
        let parts: Vec<String> = args
            .iter()
            .skip(1)
            .filter(|v| !v.is_missing())
            .map(|v| v.to_text().trim().to_string())
            .collect();
        Value::from_text(parts.join(&sep))
    });
}
