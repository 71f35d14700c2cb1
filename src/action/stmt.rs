use crate::diagnostics::Severity;
use crate::error::{RowError, RowFault};
use crate::parser::{Block, Expr, PutItem, Statement, StatementKind};
use crate::runtime::Value;

use super::{Executor, Signal, evaluate};

impl<'a> Executor<'a> {
    pub(crate) fn exec_block(&mut self, block: &Block) -> Result<Option<Signal>, RowFault> {
        for stmt in block {
            if let Some(signal) = self.exec_stmt(stmt)? {
                return Ok(Some(signal));
            }
        }
        Ok(None)
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Statement) -> Result<Option<Signal>, RowFault> {
        let span = stmt.span;
        let at = move |error: RowError| RowFault { error, span };
        match &stmt.kind {
            StatementKind::Assign(name, expr) => {
                let value = self.eval(expr).map_err(at)?;
                self.env.assign(name, value);
            }
            StatementKind::ArrayAssign(name, index, expr) => {
                let value = self.eval(expr).map_err(at)?;
                let i = self.eval(index).map_err(at)?.to_number();
                let target = self.env.resolve_index(name, i).map_err(at)?.to_string();
                self.env.assign(&target, value);
            }
            StatementKind::If(cond, then_branch, else_branch) => {
                if self.eval(cond).map_err(at)?.is_truthy() {
                    return self.exec_stmt(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.exec_stmt(else_branch);
                }
            }
            StatementKind::Subset(cond) => {
                if !self.eval(cond).map_err(at)?.is_truthy() {
                    return Ok(Some(Signal::Delete));
                }
            }
            StatementKind::Do(body) => return self.exec_block(body),
            StatementKind::Iterate { var, from, to, by, body } => {
                let lo = self.eval(from).map_err(at)?.to_number();
                let hi = self.eval(to).map_err(at)?.to_number();
                let step = match by {
                    Some(e) => self.eval(e).map_err(at)?.to_number(),
                    None => 1.0,
                };
                if lo.is_nan() || hi.is_nan() || step.is_nan() {
                    return Err(at(RowError::InvalidLoopControl("missing bound or BY value")));
                }
                if step == 0.0 {
                    return Err(at(RowError::InvalidLoopControl("BY value is zero")));
                }
                let in_range = |v: f64| if step > 0.0 { v <= hi } else { v >= hi };

                self.env.assign(var, Value::from_number(lo));
                let mut current = lo;
                let mut count = 0;
                while in_range(current) {
                    self.tick(&mut count).map_err(at)?;
                    match self.exec_block(body)? {
                        Some(Signal::Leave) => break,
                        Some(Signal::Continue) | None => {}
                        Some(signal) => return Ok(Some(signal)),
                    }
                    let next = self.env.get(var).to_number() + step;
                    if next.is_nan() || !in_range(next) {
                        break;
                    }
                    self.env.assign(var, Value::from_number(next));
                    current = next;
                }
            }
            StatementKind::While(cond, body) => {
                let mut count = 0;
                while self.eval(cond).map_err(at)?.is_truthy() {
                    self.tick(&mut count).map_err(at)?;
                    match self.exec_block(body)? {
                        Some(Signal::Leave) => break,
                        Some(Signal::Continue) | None => {}
                        Some(signal) => return Ok(Some(signal)),
                    }
                }
            }
            StatementKind::Until(cond, body) => {
                let mut count = 0;
                loop {
                    self.tick(&mut count).map_err(at)?;
                    match self.exec_block(body)? {
                        Some(Signal::Leave) => break,
                        Some(Signal::Continue) | None => {}
                        Some(signal) => return Ok(Some(signal)),
                    }
                    if self.eval(cond).map_err(at)?.is_truthy() {
                        break;
                    }
                }
            }
            StatementKind::Array(decl) => {
                self.env.declare_array(&decl.name, decl.members.len(), &decl.members);
            }
            // Applied once before the first row.
            StatementKind::Retain(_) => {}
            StatementKind::Output => {
                let row = self.env.snapshot();
                self.pending.push(row);
            }
            StatementKind::Leave => return Ok(Some(Signal::Leave)),
            StatementKind::Continue => return Ok(Some(Signal::Continue)),
            StatementKind::Return => return Ok(Some(Signal::Return)),
            StatementKind::Delete => return Ok(Some(Signal::Delete)),
            StatementKind::Stop => return Ok(Some(Signal::Stop)),
            StatementKind::Put(items) => {
                let line = self.render_put(items);
                self.diagnostics.report(Severity::Note, &line, Some(span));
            }
        }
        Ok(None)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, RowError> {
        evaluate(expr, &self.env, self.functions)
    }

    /// Count one loop iteration against the configured ceiling.
    fn tick(&self, count: &mut usize) -> Result<(), RowError> {
        *count += 1;
        if *count > self.config.max_loop_iterations {
            return Err(RowError::IterationLimit(self.config.max_loop_iterations));
        }
        Ok(())
    }

    fn render_put(&self, items: &[PutItem]) -> String {
        let parts: Vec<String> = items
            .iter()
            .map(|item| match item {
                PutItem::Text(s) => s.clone(),
                PutItem::Var(name) => self.env.get(name).to_string(),
                PutItem::Named(name) => format!("{}={}", name, self.env.get(name)),
            })
            .collect();
        parts.join(" ")
    }
}
