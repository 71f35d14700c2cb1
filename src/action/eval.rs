use std::cmp::Ordering;

use crate::builtins::FunctionRegistry;
use crate::error::RowError;
use crate::parser::{BinOp, Expr, UnaryOp};
use crate::runtime::{Environment, Value};

/// Evaluate an expression against the current row. Only reads `env`;
/// bad operands produce missing values, and the only failures are array
/// lookups and unknown functions.
pub fn evaluate(expr: &Expr, env: &Environment, functions: &FunctionRegistry) -> Result<Value, RowError> {
    Ok(match expr {
        Expr::NumberLit(n) => Value::from_number(*n),
        Expr::StringLit(s) => Value::from_text(s.as_str()),
        Expr::Var(name) => env.get(name),
        Expr::ArrayRef(name, index) => {
            let i = evaluate(index, env, functions)?.to_number();
            env.get(env.resolve_index(name, i)?)
        }
        Expr::BinOp(left, BinOp::And, right) => {
            if !evaluate(left, env, functions)?.is_truthy() {
                return Ok(Value::from_bool(false));
            }
            Value::from_bool(evaluate(right, env, functions)?.is_truthy())
        }
        Expr::BinOp(left, BinOp::Or, right) => {
            if evaluate(left, env, functions)?.is_truthy() {
                return Ok(Value::from_bool(true));
            }
            Value::from_bool(evaluate(right, env, functions)?.is_truthy())
        }
        Expr::BinOp(left, op, right) => {
            let l = evaluate(left, env, functions)?;
            let r = evaluate(right, env, functions)?;
            eval_binop(&l, *op, &r)
        }
        Expr::Unary(op, operand) => {
            let v = evaluate(operand, env, functions)?;
            match op {
                UnaryOp::Neg => arithmetic(-v.to_number()),
                UnaryOp::Plus => arithmetic(v.to_number()),
                UnaryOp::Not => Value::from_bool(!v.is_truthy()),
            }
        }
        Expr::FuncCall(name, args) => {
            let f = functions
                .lookup(name)
                .ok_or_else(|| RowError::UnknownFunction(name.clone()))?;
            let args = args
                .iter()
                .map(|a| evaluate(a, env, functions))
                .collect::<Result<Vec<_>, _>>()?;
            match f(&args) {
                Value::Number(n) => arithmetic(n),
                text => text,
            }
        }
    })
}

pub(crate) fn eval_binop(l: &Value, op: BinOp, r: &Value) -> Value {
    match op {
        BinOp::Add => arithmetic(l.to_number() + r.to_number()),
        BinOp::Sub => arithmetic(l.to_number() - r.to_number()),
        BinOp::Mul => arithmetic(l.to_number() * r.to_number()),
        BinOp::Div => {
            let d = r.to_number();
            if d == 0.0 { Value::MISSING } else { arithmetic(l.to_number() / d) }
        }
        BinOp::Pow => arithmetic(l.to_number().powf(r.to_number())),
        BinOp::Concat => Value::from_text(format!("{}{}", l, r)),
        BinOp::Eq => Value::from_bool(compare(l, r) == Ordering::Equal),
        BinOp::Ne => Value::from_bool(compare(l, r) != Ordering::Equal),
        BinOp::Lt => Value::from_bool(compare(l, r) == Ordering::Less),
        BinOp::Le => Value::from_bool(compare(l, r) != Ordering::Greater),
        BinOp::Gt => Value::from_bool(compare(l, r) == Ordering::Greater),
        BinOp::Ge => Value::from_bool(compare(l, r) != Ordering::Less),
        BinOp::And => Value::from_bool(l.is_truthy() && r.is_truthy()),
        BinOp::Or => Value::from_bool(l.is_truthy() || r.is_truthy()),
    }
}

/// Non-finite results are missing.
fn arithmetic(n: f64) -> Value {
    if n.is_finite() { Value::from_number(n) } else { Value::MISSING }
}

/// Text against text compares as text without trailing blanks. Anything
/// else compares numerically, with missing below every number.
pub(crate) fn compare(l: &Value, r: &Value) -> Ordering {
    if let (Value::Text(a), Value::Text(b)) = (l, r) {
        return a.trim_end().cmp(b.trim_end());
    }
    let (a, b) = (l.to_number(), r.to_number());
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::{Parser, StatementKind};

    /// Parse `x = <src>;` and hand back the right-hand side.
    fn expr(src: &str) -> Expr {
        let tokens = Lexer::new(&format!("x = {};", src)).tokenize();
        let mut program = Parser::new(tokens).parse().expect("parse error");
        match program.steps.remove(0).body.remove(0).kind {
            StatementKind::Assign(_, e) => e,
            other => panic!("expected assignment, got {:?}", other),
        }
    }

    fn eval_in(src: &str, env: &Environment) -> Result<Value, RowError> {
        evaluate(&expr(src), env, &FunctionRegistry::with_builtins())
    }

    fn eval(src: &str) -> Value {
        eval_in(src, &Environment::new()).expect("row error")
    }

    #[test]
    fn arithmetic_and_missing() {
        assert_eq!(eval("1 + 2 * 3"), Value::from(7.0));
        assert_eq!(eval("2 ** 3 ** 2"), Value::from(512.0));
        assert_eq!(eval("-2 ** 2"), Value::from(-4.0));
        assert_eq!(eval(". + 1"), Value::MISSING);
        assert_eq!(eval("nope * 2"), Value::MISSING);
        assert_eq!(eval("'12' + 1"), Value::from(13.0));
        assert_eq!(eval("'abc' + 1"), Value::MISSING);
    }

    #[test]
    fn division_by_zero_is_missing() {
        assert_eq!(eval("5 / 0"), Value::MISSING);
        assert_eq!(eval("0 / 0"), Value::MISSING);
    }

    #[test]
    fn missing_sorts_below_numbers() {
        assert_eq!(eval(". < -1000"), Value::from(1.0));
        assert_eq!(eval(". = ."), Value::from(1.0));
        assert_eq!(eval("nope > 0"), Value::from(0.0));
    }

    #[test]
    fn text_comparison_ignores_trailing_blanks() {
        assert_eq!(eval("'abc  ' = 'abc'"), Value::from(1.0));
        assert_eq!(eval("'abc' < 'abd'"), Value::from(1.0));
        assert_eq!(eval("'10' = 10"), Value::from(1.0));
    }

    #[test]
    fn logic_short_circuits() {
        assert_eq!(eval("0 and nosuch(1)"), Value::from(0.0));
        assert_eq!(eval("1 or nosuch(1)"), Value::from(1.0));
        assert_eq!(eval("not ."), Value::from(1.0));
        assert_eq!(eval("^ 3"), Value::from(0.0));
        assert_eq!(eval("2 ne 3 & 1"), Value::from(1.0));
    }

    #[test]
    fn concatenation_uses_display_forms() {
        assert_eq!(eval("'a' || 1.5 || ."), Value::from("a1.5."));
    }

    #[test]
    fn variables_and_iteration_counter() {
        let mut env = Environment::new();
        env.assign("Count", Value::from(4.0));
        env.begin_row(&crate::runtime::Row::new());
        env.assign("count", Value::from(4.0));
        assert_eq!(eval_in("COUNT + _N_", &env), Ok(Value::from(5.0)));
    }

    #[test]
    fn array_reads_and_errors() {
        let mut env = Environment::new();
        let members: Vec<String> = vec!["a1".into(), "a2".into()];
        env.declare_array("a", 2, &members);
        env.assign("a2", Value::from(9.0));
        assert_eq!(eval_in("a[2]", &env), Ok(Value::from(9.0)));
        assert_eq!(eval_in("a{1.9}", &env), Ok(Value::MISSING));
        assert!(matches!(eval_in("a[3]", &env), Err(RowError::IndexOutOfRange { arity: 2, .. })));
        assert!(matches!(eval_in("a[.]", &env), Err(RowError::IndexOutOfRange { .. })));
        assert_eq!(eval_in("b[1]", &env), Err(RowError::UndeclaredArray("b".into())));
    }

    #[test]
    fn unknown_function_fails_only_when_called() {
        assert_eq!(
            eval_in("nosuch(1)", &Environment::new()),
            Err(RowError::UnknownFunction("nosuch".into()))
        );
        assert_eq!(eval("sum(1, ., 2) + upcase('a') = 3"), Value::from(0.0));
        assert_eq!(eval("substr('hello', 2, 2) || 'p'"), Value::from("elp"));
    }
}
