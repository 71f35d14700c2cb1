mod eval;
mod stmt;

use tracing::{debug, trace};

use crate::builtins::FunctionRegistry;
use crate::config::Config;
use crate::diagnostics::{Diagnostics, Severity};
use crate::error::RunError;
use crate::field;
use crate::parser::{DataStep, Program, Statement, StatementKind, StepSource};
use crate::library::{DatasetSink, DatasetSource};
use crate::runtime::{Dataset, Environment, Row, Value};

pub use self::eval::evaluate;

/// Signal used to propagate control flow out of blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Skip to the next loop iteration.
    Continue,
    /// Exit the nearest loop.
    Leave,
    /// End the row, with implicit output.
    Return,
    /// End the row without output.
    Delete,
    /// End the row without output and end the step.
    Stop,
}

/// Runs one data step over its input rows.
pub struct Executor<'a> {
    pub(crate) step: &'a DataStep,
    pub(crate) env: Environment,
    pub(crate) functions: &'a FunctionRegistry,
    pub(crate) config: &'a Config,
    pub(crate) diagnostics: &'a mut dyn Diagnostics,
    /// Rows written by `output` for the current row, committed when it completes.
    pub(crate) pending: Vec<Row>,
    explicit_output: bool,
    columns: Vec<String>,
}

impl<'a> Executor<'a> {
    pub fn new(
        step: &'a DataStep,
        functions: &'a FunctionRegistry,
        config: &'a Config,
        diagnostics: &'a mut dyn Diagnostics,
    ) -> Self {
        Executor {
            step,
            env: Environment::new(),
            functions,
            config,
            diagnostics,
            pending: Vec::new(),
            explicit_output: contains_output(&step.body),
            columns: Vec::new(),
        }
    }

    /// Process every input row and return the output dataset.
    pub fn run(mut self, input: Dataset) -> Result<Dataset, RunError> {
        self.prepare(input.columns());
        let mut output = Dataset::with_columns(self.output_names());
        let step = self.step;
        // Without a source the body still runs once.
        let rows = if step.source.is_none() { vec![Row::new()] } else { input.into_rows() };
        debug!(rows = rows.len(), explicit_output = self.explicit_output, "running step");

        for row in &rows {
            self.env.begin_row(row);
            trace!(n = self.env.iteration(), "row start");
            let (emit, stop) = match self.exec_block(&step.body) {
                Ok(None | Some(Signal::Return)) => (!self.explicit_output, false),
                Ok(Some(Signal::Delete)) => (false, false),
                Ok(Some(Signal::Stop)) => (false, true),
                Ok(Some(signal @ (Signal::Continue | Signal::Leave))) => {
                    return Err(RunError::Structural {
                        span: step.span,
                        message: format!("{:?} escaped the step body", signal),
                    });
                }
                Err(fault) => {
                    let message = format!("{} (row {})", fault.error, self.env.iteration());
                    self.diagnostics.report(Severity::Error, &message, Some(fault.span));
                    self.pending.clear();
                    continue;
                }
            };
            if emit {
                let row = self.env.snapshot();
                self.pending.push(row);
            }
            for row in self.pending.drain(..) {
                output.push(project(row, &self.columns));
            }
            if stop {
                debug!(n = self.env.iteration(), "step stopped");
                break;
            }
        }
        Ok(output)
    }

    /// Declare variables up front in first-appearance order so output
    /// columns are stable: input columns, then names the body assigns.
    fn prepare(&mut self, input_columns: &[String]) {
        for name in input_columns {
            self.env.declare(name);
        }
        if let Some(StepSource::Inline(inline)) = &self.step.source {
            for f in &inline.fields {
                self.env.declare(&f.name);
                if f.text {
                    self.env.assign(&f.name, Value::from_text(""));
                }
            }
        }
        declare_block(&mut self.env, &self.step.body);
    }

    /// Column list after keep/drop, in environment order.
    fn output_names(&mut self) -> Vec<String> {
        let keep = &self.step.keep;
        let drop = &self.step.drop;
        self.columns = self
            .env
            .names()
            .filter(|n| keep.is_empty() || keep.iter().any(|k| k.eq_ignore_ascii_case(n)))
            .filter(|n| !drop.iter().any(|d| d.eq_ignore_ascii_case(n)))
            .map(str::to_string)
            .collect();
        self.columns.clone()
    }
}

fn project(row: Row, columns: &[String]) -> Row {
    let mut out = Row::new();
    for name in columns {
        out.set(name, row.get(name).cloned().unwrap_or_default());
    }
    out
}

/// Whether any `output` statement appears anywhere in the block.
fn contains_output(block: &[Statement]) -> bool {
    block.iter().any(|stmt| match &stmt.kind {
        StatementKind::Output => true,
        StatementKind::If(_, then_branch, else_branch) => {
            contains_output(std::slice::from_ref(then_branch.as_ref()))
                || else_branch.as_ref().is_some_and(|e| contains_output(std::slice::from_ref(e.as_ref())))
        }
        StatementKind::Do(body)
        | StatementKind::Iterate { body, .. }
        | StatementKind::While(_, body)
        | StatementKind::Until(_, body) => contains_output(body),
        _ => false,
    })
}

/// Register assigned names, loop variables, array members and retained
/// variables in document order. Retain initializers are seeded here, once.
fn declare_block(env: &mut Environment, block: &[Statement]) {
    for stmt in block {
        match &stmt.kind {
            StatementKind::Assign(name, _) => {
                env.declare(name);
            }
            StatementKind::Iterate { var, body, .. } => {
                env.declare(var);
                declare_block(env, body);
            }
            StatementKind::Array(decl) => {
                for m in &decl.members {
                    if decl.text && !env.has_var(m) {
                        env.assign(m, Value::from_text(""));
                    } else {
                        env.declare(m);
                    }
                }
            }
            StatementKind::Retain(items) => {
                for (name, init) in items {
                    env.retain(name, init.clone());
                }
            }
            StatementKind::If(_, then_branch, else_branch) => {
                declare_block(env, std::slice::from_ref(then_branch.as_ref()));
                if let Some(e) = else_branch {
                    declare_block(env, std::slice::from_ref(e.as_ref()));
                }
            }
            StatementKind::Do(body) | StatementKind::While(_, body) | StatementKind::Until(_, body) => {
                declare_block(env, body);
            }
            _ => {}
        }
    }
}

/// Rows a step reads: a `set` dataset, parsed datalines, or nothing.
fn step_input(step: &DataStep, source: &dyn DatasetSource) -> Result<Dataset, RunError> {
    match &step.source {
        Some(StepSource::Set(id)) => source.read_dataset(id),
        Some(StepSource::Inline(inline)) => {
            Ok(field::parse_datalines(&inline.data, &inline.fields, inline.delimiter.as_deref()))
        }
        None => Ok(Dataset::new()),
    }
}

/// Run a single step. Returns `None` for `data _null_`.
pub fn run_step(
    step: &DataStep,
    source: &dyn DatasetSource,
    functions: &FunctionRegistry,
    config: &Config,
    diagnostics: &mut dyn Diagnostics,
) -> Result<Option<Dataset>, RunError> {
    let input = step_input(step, source)?;
    let output = Executor::new(step, functions, config, diagnostics).run(input)?;
    Ok(step.output.as_ref().map(|_| output))
}

/// Run every step in order. Each output is registered before the next step
/// starts, so later steps can `set` it. Returns the registered ids.
pub fn run_program<L>(
    program: &Program,
    library: &mut L,
    functions: &FunctionRegistry,
    config: &Config,
    diagnostics: &mut dyn Diagnostics,
) -> Result<Vec<String>, RunError>
where
    L: DatasetSource + DatasetSink,
{
    let mut produced = Vec::new();
    for step in &program.steps {
        let name = step.output.as_deref().unwrap_or("_null_");
        debug!(step = name, line = step.span.line, "step start");
        let result = run_step(step, &*library, functions, config, diagnostics)?;
        if let (Some(id), Some(dataset)) = (&step.output, result) {
            let note = format!(
                "dataset {} has {} observations and {} variables",
                id,
                dataset.len(),
                dataset.columns().len()
            );
            diagnostics.report(Severity::Note, &note, Some(step.span));
            library.register_dataset(id, dataset);
            produced.push(id.clone());
        }
    }
    Ok(produced)
}
