use super::{FunctionRegistry, num_arg};
use crate::runtime::Value;

/// Overflow and domain errors come back as missing.
fn unary(reg: &mut FunctionRegistry, name: &str, f: fn(f64) -> f64) {
    reg.register(name, move |args| {
        let n = f(num_arg(args, 0));
        if n.is_finite() { Value::from_number(n) } else { Value::MISSING }
    });
}

/// Non-missing numeric views of every argument.
fn present(args: &[Value]) -> impl Iterator<Item = f64> + '_ {
    args.iter().map(Value::to_number).filter(|n| !n.is_nan())
}

/// Register the math built-ins. Missing arguments give missing results,
/// except for the statistics functions, which skip missing arguments.
pub fn register(reg: &mut FunctionRegistry) {
    unary(reg, "abs", f64::abs);
    unary(reg, "ceil", f64::ceil);
    unary(reg, "floor", f64::floor);
    unary(reg, "int", f64::trunc);
    unary(reg, "exp", f64::exp);
    unary(reg, "sqrt", f64::sqrt);
    unary(reg, "log", |n| if n > 0.0 { n.ln() } else { f64::NAN });
    unary(reg, "log10", |n| if n > 0.0 { n.log10() } else { f64::NAN });

    reg.register("round", |args| {
        let n = num_arg(args, 0);
        let unit = if args.len() > 1 { num_arg(args, 1) } else { 1.0 };
        if unit == 0.0 || unit.is_nan() {
            return Value::MISSING;
        }
        Value::from_number((n / unit).round() * unit)
    });
    reg.register("mod", |args| {
        let d = num_arg(args, 1);
        if d == 0.0 {
            return Value::MISSING;
        }
        Value::from_number(num_arg(args, 0) % d)
    });

    reg.register("sum", |args| {
        let mut seen = false;
        let total = present(args).inspect(|_| seen = true).sum::<f64>();
        if seen { Value::from_number(total) } else { Value::MISSING }
    });
    reg.register("mean", |args| {
        let (sum, count) = present(args).fold((0.0, 0usize), |(s, c), n| (s + n, c + 1));
        if count == 0 {
            Value::MISSING
        } else {
            Value::from_number(sum / count as f64)
        }
    });
    reg.register("min", |args| {
        present(args).reduce(f64::min).map_or(Value::MISSING, Value::from_number)
    });
    reg.register("max", |args| {
        present(args).reduce(f64::max).map_or(Value::MISSING, Value::from_number)
    });
    reg.register("n", |args| Value::from_number(present(args).count() as f64));
    reg.register("nmiss", |args| {
        Value::from_number(args.iter().filter(|v| v.to_number().is_nan()).count() as f64)
    });
    reg.register("missing", |args| {
        Value::from_bool(args.first().is_none_or(Value::is_missing))
    });
    reg.register("coalesce", |args| {
        present(args).next().map_or(Value::MISSING, Value::from_number)
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

    fn nums(ns: &[f64]) -> Vec<Value> {
        ns.iter().map(|n| Value::from(*n)).collect()
    }

    #[test]
    fn rounding() {
        assert_eq!(call("round", &nums(&[2.5])), Value::from(3.0));
        assert_eq!(call("round", &nums(&[1234.0, 100.0])), Value::from(1200.0));
        assert_eq!(call("int", &nums(&[-2.7])), Value::from(-2.0));
        assert_eq!(call("ceil", &nums(&[1.1])), Value::from(2.0));
    }

    #[test]
    fn domain_errors_are_missing() {
        assert_eq!(call("log", &nums(&[0.0])), Value::MISSING);
        assert_eq!(call("sqrt", &nums(&[-4.0])), Value::MISSING);
        assert_eq!(call("mod", &nums(&[5.0, 0.0])), Value::MISSING);
        assert_eq!(call("abs", &[Value::from("abc")]), Value::MISSING);
        assert_eq!(call("exp", &nums(&[1000.0])), Value::MISSING);
    }

    #[test]
    fn statistics_skip_missing() {
        let args = vec![Value::from(1.0), Value::MISSING, Value::from("3")];
        assert_eq!(call("sum", &args), Value::from(4.0));
        assert_eq!(call("mean", &args), Value::from(2.0));
        assert_eq!(call("min", &args), Value::from(1.0));
        assert_eq!(call("max", &args), Value::from(3.0));
        assert_eq!(call("n", &args), Value::from(2.0));
        assert_eq!(call("nmiss", &args), Value::from(1.0));
        assert_eq!(call("sum", &[Value::MISSING]), Value::MISSING);
        assert_eq!(call("coalesce", &args[1..]), Value::from(3.0));
    }

    #[test]
    fn missing_predicate() {
        assert_eq!(call("missing", &[Value::MISSING]), Value::from(1.0));
        assert_eq!(call("missing", &[Value::from("  ")]), Value::from(1.0));
        assert_eq!(call("missing", &[Value::from(0.0)]), Value::from(0.0));
    }
}
