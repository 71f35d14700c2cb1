use rustc_hash::FxHashSet;

use crate::error::{Span, SyntaxError};
use crate::lexer::{Token, TokenKind};
use crate::runtime::Value;

/// A complete script: data steps in source order.
#[derive(Debug, Clone)]
pub struct Program {
    pub steps: Vec<DataStep>,
}

/// Output id given to a step that has no `data` header.
pub const DEFAULT_OUTPUT: &str = "_last_";

/// Largest array dimension, and longest `x1-xN` variable range, a step may declare.
pub const MAX_ARRAY_ELEMENTS: usize = 65_536;

/// One `data ...; ... run;` step.
#[derive(Debug, Clone)]
pub struct DataStep {
    /// Output dataset id; `None` for `data _null_;`.
    pub output: Option<String>,
    pub source: Option<StepSource>,
    pub keep: Vec<String>,
    pub drop: Vec<String>,
    pub body: Block,
    pub span: Span,
}

/// Where a step's input rows come from.
#[derive(Debug, Clone)]
pub enum StepSource {
    /// `set NAME;` reads a dataset from the source collaborator.
    Set(String),
    /// `input ...;` plus a `datalines;` block.
    Inline(InlineData),
}

#[derive(Debug, Clone)]
pub struct InlineData {
    pub fields: Vec<InputField>,
    /// `infile datalines dlm=...`; `None` splits on whitespace.
    pub delimiter: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputField {
    pub name: String,
    pub text: bool,
}

/// A block is a list of statements.
pub type Block = Vec<Statement>;

#[derive(Debug, Clone)]
pub struct Statement {
    pub kind: StatementKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum StatementKind {
    Assign(String, Expr),
    ArrayAssign(String, Expr, Expr),
    If(Expr, Box<Statement>, Option<Box<Statement>>),
    /// `if expr;` keeps the row only when `expr` is true.
    Subset(Expr),
    Do(Block),
    Iterate { var: String, from: Expr, to: Expr, by: Option<Expr>, body: Block },
    While(Expr, Block),
    Until(Expr, Block),
    Array(ArrayDecl),
    Retain(Vec<(String, Option<Value>)>),
    Output,
    Leave,
    Continue,
    Return,
    Delete,
    Stop,
    Put(Vec<PutItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDecl {
    pub name: String,
    pub members: Vec<String>,
    pub text: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PutItem {
    Text(String),
    Var(String),
    /// `name=` renders as `name=value`.
    Named(String),
}

#[derive(Debug, Clone)]
pub enum Expr {
    /// Numeric literal; the missing literal `.` is NaN.
    NumberLit(f64),
    StringLit(String),
    Var(String),
    ArrayRef(String, Box<Expr>),
    BinOp(Box<Expr>, BinOp, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    FuncCall(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

/// Step-level declarations collected while the body is parsed.
#[derive(Default)]
struct StepDecls {
    set: Option<(String, Span)>,
    input: Option<(Vec<InputField>, Span)>,
    delimiter: Option<String>,
    datalines: Option<(String, Span)>,
    keep: Vec<String>,
    drop: Vec<String>,
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    loop_depth: usize,
    arrays: FxHashSet<String>,
    decls: StepDecls,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
            loop_depth: 0,
            arrays: FxHashSet::default(),
            decls: StepDecls::default(),
        }
    }

    pub fn parse(&mut self) -> Result<Program, SyntaxError> {
        let mut steps = Vec::new();
        self.skip_terminators();
        while !self.at_eof() {
            steps.push(self.parse_step()?);
            self.skip_terminators();
        }
        Ok(Program { steps })
    }

    fn parse_step(&mut self) -> Result<DataStep, SyntaxError> {
        let span = self.span();
        let output = if self.at_step_header() {
            self.advance(); // consume 'data'
            let name = self.parse_dataset_name()?;
            self.expect(&TokenKind::Semicolon)?;
            if name.eq_ignore_ascii_case("_null_") { None } else { Some(name) }
        } else {
            Some(DEFAULT_OUTPUT.to_string())
        };

        self.decls = StepDecls::default();
        self.arrays.clear();
        let mut body = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_eof() || self.at_step_header() {
                break;
            }
            if self.at_keyword("run") {
                self.advance();
                self.expect_terminator()?;
                break;
            }
            if let Some(stmt) = self.parse_statement()? {
                body.push(stmt);
            }
        }

        let decls = std::mem::take(&mut self.decls);
        let source = match (decls.set, decls.input, decls.datalines) {
            (Some(_), _, Some((_, at))) => {
                return Err(SyntaxError::new(at, "DATALINES cannot be combined with a SET statement"));
            }
            (Some(_), Some((_, at)), None) | (None, Some((_, at)), None) => {
                return Err(SyntaxError::new(at, "INPUT statement requires DATALINES"));
            }
            (None, None, Some((_, at))) => {
                return Err(SyntaxError::new(at, "DATALINES requires an INPUT statement"));
            }
            (Some((name, _)), None, None) => Some(StepSource::Set(name)),
            (None, Some((fields, _)), Some((data, _))) => Some(StepSource::Inline(InlineData {
                fields,
                delimiter: decls.delimiter,
                data,
            })),
            (None, None, None) => None,
        };

        Ok(DataStep { output, source, keep: decls.keep, drop: decls.drop, body, span })
    }

    /// Parse one statement, including its terminator. Step declarations
    /// are recorded in `self.decls` and yield `None`.
    fn parse_statement(&mut self) -> Result<Option<Statement>, SyntaxError> {
        let span = self.span();
        let kind = match self.current().clone() {
            TokenKind::Ident(name) if self.is_assignment_start() => self.parse_assignment(name)?,
            TokenKind::Ident(word) => match word.to_ascii_lowercase().as_str() {
                "if" => self.parse_if()?,
                "do" => self.parse_do()?,
                "array" => self.parse_array()?,
                "retain" => self.parse_retain()?,
                "put" => self.parse_put()?,
                "output" => self.simple(StatementKind::Output)?,
                "return" => self.simple(StatementKind::Return)?,
                "delete" => self.simple(StatementKind::Delete)?,
                "stop" => self.simple(StatementKind::Stop)?,
                "leave" | "continue" => {
                    if self.loop_depth == 0 {
                        return Err(SyntaxError::new(
                            span,
                            format!("{} statement outside of an iterative DO loop", word.to_uppercase()),
                        ));
                    }
                    let kind = if word.eq_ignore_ascii_case("leave") {
                        StatementKind::Leave
                    } else {
                        StatementKind::Continue
                    };
                    self.simple(kind)?
                }
                "set" | "input" | "infile" | "keep" | "drop" => {
                    self.parse_declaration(&word)?;
                    return Ok(None);
                }
                "end" => return Err(SyntaxError::new(span, "END without a matching DO")),
                "run" | "data" => {
                    return Err(SyntaxError::new(span, format!("{} inside a DO block", word.to_uppercase())));
                }
                _ => {
                    return Err(SyntaxError::new(span, format!("unrecognized statement '{}'", word)));
                }
            },
            TokenKind::Datalines => {
                self.parse_datalines()?;
                return Ok(None);
            }
            _ => return Err(self.unexpected("a statement")),
        };
        Ok(Some(Statement { kind, span }))
    }

    fn simple(&mut self, kind: StatementKind) -> Result<StatementKind, SyntaxError> {
        self.advance();
        self.expect_terminator()?;
        Ok(kind)
    }

    /// `name =`, `name[...] =`, or `name(...) =` for a declared array.
    fn is_assignment_start(&self) -> bool {
        match self.peek_kind(1) {
            TokenKind::Eq | TokenKind::LBracket | TokenKind::LBrace => true,
            TokenKind::LParen => match self.current() {
                TokenKind::Ident(name) => self.arrays.contains(&name.to_ascii_lowercase()),
                _ => false,
            },
            _ => false,
        }
    }

    fn parse_assignment(&mut self, name: String) -> Result<StatementKind, SyntaxError> {
        self.advance(); // consume name
        let kind = if self.check(&TokenKind::Eq) {
            self.advance();
            StatementKind::Assign(name, self.parse_expr()?)
        } else {
            let index = self.parse_subscript()?;
            self.expect(&TokenKind::Eq)?;
            StatementKind::ArrayAssign(name, index, self.parse_expr()?)
        };
        self.expect_terminator()?;
        Ok(kind)
    }

    /// `[expr]`, `{expr}` or `(expr)`.
    fn parse_subscript(&mut self) -> Result<Expr, SyntaxError> {
        let close = self.open_bracket()?;
        let index = self.parse_expr()?;
        if self.check(&TokenKind::Comma) {
            return Err(SyntaxError::new(self.span(), "multi-dimensional arrays are not supported"));
        }
        self.expect(&close)?;
        Ok(index)
    }

    fn open_bracket(&mut self) -> Result<TokenKind, SyntaxError> {
        let close = match self.current() {
            TokenKind::LBracket => TokenKind::RBracket,
            TokenKind::LBrace => TokenKind::RBrace,
            TokenKind::LParen => TokenKind::RParen,
            _ => return Err(self.unexpected("'['")),
        };
        self.advance();
        Ok(close)
    }

    fn parse_if(&mut self) -> Result<StatementKind, SyntaxError> {
        self.advance(); // consume 'if'
        let cond = self.parse_expr()?;
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(StatementKind::Subset(cond));
        }
        self.expect_keyword("then")?;
        let then_branch = self.parse_branch()?;

        self.skip_terminators();
        let else_branch = if self.at_keyword("else") {
            self.advance();
            Some(Box::new(self.parse_branch()?))
        } else {
            None
        };

        Ok(StatementKind::If(cond, Box::new(then_branch), else_branch))
    }

    /// The statement after `then`/`else`; a bare `;` is an empty branch.
    fn parse_branch(&mut self) -> Result<Statement, SyntaxError> {
        let span = self.span();
        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(Statement { kind: StatementKind::Do(Vec::new()), span });
        }
        self.depth += 1;
        let stmt = self.parse_statement();
        self.depth -= 1;
        match stmt? {
            Some(stmt) => Ok(stmt),
            None => Err(SyntaxError::new(span, "declaration statements cannot be conditional")),
        }
    }

    fn parse_do(&mut self) -> Result<StatementKind, SyntaxError> {
        self.advance(); // consume 'do'

        if self.check(&TokenKind::Semicolon) {
            self.advance();
            return Ok(StatementKind::Do(self.parse_block()?));
        }

        if self.at_keyword("while") || self.at_keyword("until") {
            let is_while = self.at_keyword("while");
            self.advance();
            let cond = self.parse_expr()?;
            self.expect_terminator()?;
            let body = self.parse_loop_body()?;
            return Ok(if is_while {
                StatementKind::While(cond, body)
            } else {
                StatementKind::Until(cond, body)
            });
        }

        let var = self.expect_ident("loop variable")?;
        self.expect(&TokenKind::Eq)?;
        let from = self.parse_expr()?;
        self.expect_keyword("to")?;
        let to = self.parse_expr()?;
        let by = if self.at_keyword("by") {
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect_terminator()?;
        let body = self.parse_loop_body()?;
        Ok(StatementKind::Iterate { var, from, to, by, body })
    }

    fn parse_loop_body(&mut self) -> Result<Block, SyntaxError> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    /// Statements up to and including the matching `end;`.
    fn parse_block(&mut self) -> Result<Block, SyntaxError> {
        self.depth += 1;
        let mut stmts = Vec::new();
        loop {
            self.skip_terminators();
            if self.at_keyword("end") && !self.is_assignment_start() {
                self.advance();
                self.expect_terminator()?;
                break;
            }
            if self.at_eof() {
                return Err(SyntaxError::new(self.span(), "missing END for DO block"));
            }
            if let Some(stmt) = self.parse_statement()? {
                stmts.push(stmt);
            }
        }
        self.depth -= 1;
        Ok(stmts)
    }

    fn parse_array(&mut self) -> Result<StatementKind, SyntaxError> {
        self.advance(); // consume 'array'
        let name_span = self.span();
        let name = self.expect_ident("array name")?;

        let close = self.open_bracket()?;
        let arity = match self.current().clone() {
            TokenKind::Star => {
                self.advance();
                None
            }
            TokenKind::Number(n) if n >= 1.0 && n.fract() == 0.0 => {
                if n > MAX_ARRAY_ELEMENTS as f64 {
                    return Err(SyntaxError::new(
                        self.span(),
                        format!("array {} exceeds the limit of {} elements", name, MAX_ARRAY_ELEMENTS),
                    ));
                }
                self.advance();
                Some(n as usize)
            }
            _ => return Err(self.unexpected("an array dimension")),
        };
        if self.check(&TokenKind::Comma) {
            return Err(SyntaxError::new(self.span(), "multi-dimensional arrays are not supported"));
        }
        self.expect(&close)?;

        let text = if self.check(&TokenKind::Dollar) {
            self.advance();
            true
        } else {
            false
        };

        let mut members = self.parse_name_list()?;
        self.expect_terminator()?;

        match arity {
            None if members.is_empty() => {
                return Err(SyntaxError::new(name_span, format!("array {} needs a variable list", name)));
            }
            Some(k) if members.is_empty() => {
                members = (1..=k).map(|i| format!("{}{}", name, i)).collect();
            }
            Some(k) if k != members.len() => {
                return Err(SyntaxError::new(
                    name_span,
                    format!("array {} has {} elements but {} variables are listed", name, k, members.len()),
                ));
            }
            _ => {}
        }

        self.arrays.insert(name.to_ascii_lowercase());
        Ok(StatementKind::Array(ArrayDecl { name, members, text }))
    }

    /// Names up to the terminator; `x1-x3` expands to `x1 x2 x3`.
    fn parse_name_list(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut names = Vec::new();
        while let TokenKind::Ident(first) = self.current().clone() {
            self.advance();
            if self.check(&TokenKind::Minus)
                && let TokenKind::Ident(last) = self.peek_kind(1).clone()
            {
                let at = self.span();
                self.advance();
                self.advance();
                names.extend(expand_range(&first, &last).ok_or_else(|| {
                    SyntaxError::new(at, format!("invalid variable range {}-{}", first, last))
                })?);
            } else {
                names.push(first);
            }
        }
        Ok(names)
    }

    /// Two passes: collect names, constants and parenthesized lists in order,
    /// then apply them with one forward cursor over uninitialized names.
    fn parse_retain(&mut self) -> Result<StatementKind, SyntaxError> {
        enum Piece {
            Name(String),
            Init(Value, Span),
            List(Vec<Value>, Span),
        }

        self.advance(); // consume 'retain'
        let mut pieces = Vec::new();
        while !self.check(&TokenKind::Semicolon) && !self.at_eof() {
            let at = self.span();
            match self.current().clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    pieces.push(Piece::Name(name));
                }
                TokenKind::LParen => {
                    self.advance();
                    let mut values = Vec::new();
                    while !self.check(&TokenKind::RParen) {
                        values.push(self.parse_constant()?);
                        if self.check(&TokenKind::Comma) {
                            self.advance();
                        }
                    }
                    self.advance();
                    pieces.push(Piece::List(values, at));
                }
                _ => pieces.push(Piece::Init(self.parse_constant()?, at)),
            }
        }
        self.expect_terminator()?;

        let mut items: Vec<(String, Option<Value>)> = Vec::new();
        let mut cursor = 0;
        for piece in pieces {
            match piece {
                Piece::Name(name) => items.push((name, None)),
                Piece::Init(value, at) => match items.last_mut() {
                    Some((_, init @ None)) => *init = Some(value),
                    _ => return Err(SyntaxError::new(at, "initial value without a variable to retain")),
                },
                Piece::List(values, at) => {
                    for value in values {
                        while cursor < items.len() && items[cursor].1.is_some() {
                            cursor += 1;
                        }
                        let Some(item) = items.get_mut(cursor) else {
                            return Err(SyntaxError::new(at, "more initial values than retained variables"));
                        };
                        item.1 = Some(value);
                        cursor += 1;
                    }
                }
            }
        }

        if items.is_empty() {
            return Err(SyntaxError::new(self.prev_span(), "RETAIN needs at least one variable"));
        }
        Ok(StatementKind::Retain(items))
    }

    /// A literal usable as an initial value: number, `-number`, text or `.`.
    fn parse_constant(&mut self) -> Result<Value, SyntaxError> {
        let value = match self.current().clone() {
            TokenKind::Number(n) => Value::from_number(n),
            TokenKind::Missing => Value::MISSING,
            TokenKind::Text(s) => Value::from_text(s),
            TokenKind::Minus => {
                self.advance();
                match self.current() {
                    TokenKind::Number(n) => Value::from_number(-n),
                    _ => return Err(self.unexpected("a number")),
                }
            }
            _ => return Err(self.unexpected("a constant")),
        };
        self.advance();
        Ok(value)
    }

    fn parse_put(&mut self) -> Result<StatementKind, SyntaxError> {
        self.advance(); // consume 'put'
        let mut items = Vec::new();
        loop {
            match self.current().clone() {
                TokenKind::Text(s) => {
                    self.advance();
                    items.push(PutItem::Text(s));
                }
                TokenKind::Ident(name) => {
                    self.advance();
                    if self.check(&TokenKind::Eq) {
                        self.advance();
                        items.push(PutItem::Named(name));
                    } else {
                        items.push(PutItem::Var(name));
                    }
                }
                _ => break,
            }
        }
        self.expect_terminator()?;
        Ok(StatementKind::Put(items))
    }

    fn parse_declaration(&mut self, word: &str) -> Result<(), SyntaxError> {
        let span = self.span();
        if self.depth > 0 {
            return Err(SyntaxError::new(
                span,
                format!("{} must appear at the top level of a data step", word.to_uppercase()),
            ));
        }
        self.advance(); // consume keyword
        match word.to_ascii_lowercase().as_str() {
            "set" => {
                if self.decls.set.is_some() {
                    return Err(SyntaxError::new(span, "only one SET statement is allowed per step"));
                }
                let name = self.parse_dataset_name()?;
                self.decls.set = Some((name, span));
            }
            "input" => {
                let mut fields = Vec::new();
                while let TokenKind::Ident(name) = self.current().clone() {
                    self.advance();
                    let text = self.check(&TokenKind::Dollar);
                    if text {
                        self.advance();
                    }
                    fields.push(InputField { name, text });
                }
                if fields.is_empty() {
                    return Err(self.unexpected("a variable name"));
                }
                self.decls.input = Some((fields, span));
            }
            "infile" => {
                if !self.check(&TokenKind::Datalines) {
                    return Err(self.unexpected("DATALINES"));
                }
                self.advance();
                while let TokenKind::Ident(option) = self.current().clone() {
                    self.advance();
                    if option.eq_ignore_ascii_case("dlm") || option.eq_ignore_ascii_case("delimiter") {
                        self.expect(&TokenKind::Eq)?;
                        match self.current().clone() {
                            TokenKind::Text(d) if !d.is_empty() => {
                                self.advance();
                                self.decls.delimiter = Some(d);
                            }
                            _ => return Err(self.unexpected("a delimiter string")),
                        }
                    } else {
                        return Err(SyntaxError::new(self.prev_span(), format!("unknown INFILE option '{}'", option)));
                    }
                }
            }
            "keep" => {
                let names = self.parse_name_list()?;
                self.decls.keep.extend(names);
            }
            _ => {
                let names = self.parse_name_list()?;
                self.decls.drop.extend(names);
            }
        }
        self.expect_terminator()
    }

    fn parse_datalines(&mut self) -> Result<(), SyntaxError> {
        let span = self.span();
        if self.depth > 0 {
            return Err(SyntaxError::new(span, "DATALINES must appear at the top level of a data step"));
        }
        self.advance(); // consume 'datalines'
        self.expect(&TokenKind::Semicolon)?;
        let TokenKind::LiteralBlock(data) = self.current().clone() else {
            return Err(self.unexpected("data lines"));
        };
        self.advance();
        self.decls.datalines = Some((data, span));
        Ok(())
    }

    /// `name` or `lib.name`.
    fn parse_dataset_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = self.expect_ident("dataset name")?;
        if self.check(&TokenKind::Missing)
            && let TokenKind::Ident(member) = self.peek_kind(1).clone()
        {
            self.advance();
            self.advance();
            name = format!("{}.{}", name, member);
        }
        Ok(name)
    }

    // --- expression parsing (precedence climbing) ---

    pub fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.check(&TokenKind::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::BinOp(Box::new(left), BinOp::Or, Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_comparison()?;
        while self.check(&TokenKind::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::BinOp(Box::new(left), BinOp::And, Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_concatenation()?;
        loop {
            let op = match self.current() {
                TokenKind::Eq => BinOp::Eq,
                TokenKind::Ne => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_concatenation()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_concatenation(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_addition()?;
        while self.check(&TokenKind::Concat) {
            self.advance();
            let right = self.parse_addition()?;
            left = Expr::BinOp(Box::new(left), BinOp::Concat, Box::new(right));
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_multiplication()?;
        loop {
            let op = match self.current() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::BinOp(Box::new(left), op, Box::new(right));
        }
        Ok(left)
    }

    /// Prefix operators share the top precedence level with `**`, which
    /// groups right to left: `-x ** 2` is `-(x ** 2)`.
    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.current() {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.parse_power(),
        };
        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.parse_primary()?;
        if self.check(&TokenKind::Power) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Expr::BinOp(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.current().clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::NumberLit(n))
            }
            TokenKind::Missing => {
                self.advance();
                Ok(Expr::NumberLit(f64::NAN))
            }
            TokenKind::Text(s) => {
                self.advance();
                Ok(Expr::StringLit(s))
            }
            TokenKind::Ident(name) => {
                self.advance();
                match self.current() {
                    TokenKind::LBracket | TokenKind::LBrace => {
                        let index = self.parse_subscript()?;
                        Ok(Expr::ArrayRef(name, Box::new(index)))
                    }
                    TokenKind::LParen if self.arrays.contains(&name.to_ascii_lowercase()) => {
                        let index = self.parse_subscript()?;
                        Ok(Expr::ArrayRef(name, Box::new(index)))
                    }
                    TokenKind::LParen => self.parse_func_call(name),
                    _ => Ok(Expr::Var(name)),
                }
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    fn parse_func_call(&mut self, name: String) -> Result<Expr, SyntaxError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            args.push(self.parse_expr()?);
            while self.check(&TokenKind::Comma) {
                self.advance();
                args.push(self.parse_expr()?);
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr::FuncCall(name, args))
    }

    // --- helpers ---

    fn current(&self) -> &TokenKind {
        self.peek_kind(0)
    }

    fn peek_kind(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map_or(&TokenKind::Eof, |t| &t.kind)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or_else(Span::default, |t| t.span)
    }

    fn prev_span(&self) -> Span {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or_else(|| self.span(), |t| t.span)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.current(), TokenKind::Eof)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current()) == std::mem::discriminant(kind)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.current(), TokenKind::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    /// `data` opens a new step unless it is being assigned to.
    fn at_step_header(&self) -> bool {
        self.at_keyword("data") && !matches!(self.peek_kind(1), TokenKind::Eq)
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<(), SyntaxError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&describe_kind(kind)))
        }
    }

    fn expect_terminator(&mut self) -> Result<(), SyntaxError> {
        self.expect(&TokenKind::Semicolon)
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), SyntaxError> {
        if self.at_keyword(kw) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&kw.to_uppercase()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.current().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn unexpected(&self, wanted: &str) -> SyntaxError {
        let found = match self.tokens.get(self.pos) {
            Some(t) => match &t.kind {
                TokenKind::Eof => "end of input".to_string(),
                TokenKind::Unknown(raw) => format!("unrecognized input '{}'", raw),
                _ => format!("'{}'", t.text),
            },
            None => "end of input".to_string(),
        };
        SyntaxError::new(self.span(), format!("expected {}, found {}", wanted, found))
    }

    fn skip_terminators(&mut self) {
        while self.check(&TokenKind::Semicolon) {
            self.advance();
        }
    }
}

fn describe_kind(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Semicolon => "';'".to_string(),
        TokenKind::Eq => "'='".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::RBrace => "'}'".to_string(),
        TokenKind::LParen => "'('".to_string(),
        other => format!("{:?}", other),
    }
}

/// Expand `x1`-`x3` into `x1 x2 x3`. Both ends need the same prefix.
fn expand_range(first: &str, last: &str) -> Option<Vec<String>> {
    fn split(s: &str) -> Option<(&str, u32)> {
        let digits = s.len() - s.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        let (prefix, num) = s.split_at(s.len() - digits);
        Some((prefix, num.parse().ok()?))
    }
    let (p1, lo) = split(first)?;
    let (p2, hi) = split(last)?;
    if !p1.eq_ignore_ascii_case(p2) || lo > hi || (hi - lo) as usize >= MAX_ARRAY_ELEMENTS {
        return None;
    }
    Some((lo..=hi).map(|i| format!("{}{}", p1, i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Result<Program, SyntaxError> {
        let tokens = Lexer::new(src).tokenize();
        Parser::new(tokens).parse()
    }

    fn body(src: &str) -> Block {
        let mut prog = parse(src).expect("parse error");
        assert_eq!(prog.steps.len(), 1);
        prog.steps.remove(0).body
    }

    fn retained(src: &str) -> Vec<(String, Option<Value>)> {
        match &body(src)[0].kind {
            StatementKind::Retain(items) => items.clone(),
            other => panic!("expected retain, got {:?}", other),
        }
    }

    #[test]
    fn comment_then_single_assignment() {
        let stmts = body("* comment ; y = 1 ;");
        assert_eq!(stmts.len(), 1);
        assert!(matches!(&stmts[0].kind, StatementKind::Assign(n, Expr::NumberLit(v)) if n == "y" && *v == 1.0));
    }

    #[test]
    fn multiplication_is_binary() {
        let stmts = body("y = y * 2;");
        assert!(matches!(
            &stmts[0].kind,
            StatementKind::Assign(_, Expr::BinOp(_, BinOp::Mul, _))
        ));
    }

    #[test]
    fn retain_list_fills_all() {
        let items = retained("retain x y z (1 2 3);");
        let values: Vec<_> = items.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        assert_eq!(
            values,
            vec![
                ("x", Some(Value::from(1.0))),
                ("y", Some(Value::from(2.0))),
                ("z", Some(Value::from(3.0))),
            ]
        );
    }

    #[test]
    fn retain_list_skips_initialized() {
        let items = retained("retain x 0 y z (1 2);");
        let values: Vec<_> = items.iter().map(|(n, v)| (n.as_str(), v.clone())).collect();
        assert_eq!(
            values,
            vec![
                ("x", Some(Value::from(0.0))),
                ("y", Some(Value::from(1.0))),
                ("z", Some(Value::from(2.0))),
            ]
        );
    }

    #[test]
    fn retain_mixed_forms() {
        let items = retained("retain total count -1 name 'n/a' last;");
        assert_eq!(items[0], ("total".to_string(), None));
        assert_eq!(items[1], ("count".to_string(), Some(Value::from(-1.0))));
        assert_eq!(items[2], ("name".to_string(), Some(Value::from("n/a"))));
        assert_eq!(items[3], ("last".to_string(), None));
    }

    #[test]
    fn retain_too_many_values() {
        let err = parse("retain a b (1 2 3);").unwrap_err();
        assert!(err.message.contains("more initial values"));
    }

    #[test]
    fn array_declaration() {
        let stmts = body("array a[3] a1 a2 a3;");
        match &stmts[0].kind {
            StatementKind::Array(decl) => {
                assert_eq!(decl.name, "a");
                assert_eq!(decl.members, ["a1", "a2", "a3"]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn array_arity_mismatch_is_error() {
        let err = parse("array a[3] a1 a2;").unwrap_err();
        assert_eq!(err.span, Span::new(1, 7));
        assert!(err.message.contains("3 elements"));
    }

    #[test]
    fn array_star_range_and_default_members() {
        let stmts = body("array s{*} q1-q4; array t(2);");
        let StatementKind::Array(s) = &stmts[0].kind else { panic!() };
        assert_eq!(s.members, ["q1", "q2", "q3", "q4"]);
        let StatementKind::Array(t) = &stmts[1].kind else { panic!() };
        assert_eq!(t.members, ["t1", "t2"]);
    }

    #[test]
    fn oversized_array_rejected() {
        let err = parse("array a[1e12];").unwrap_err();
        assert_eq!(err.span, Span::new(1, 9));
        assert!(err.message.contains("limit of 65536"));
        let err = parse("array b[*] x1-x999999999;").unwrap_err();
        assert!(err.message.contains("invalid variable range"));
        assert!(parse("array c[65536];").is_ok());
    }

    #[test]
    fn multi_dimensional_array_rejected() {
        let err = parse("array m[2,3] m1-m6;").unwrap_err();
        assert!(err.message.contains("multi-dimensional"));
    }

    #[test]
    fn paren_subscript_on_declared_array() {
        let stmts = body("array a(2) x y; a(1) = sum(a(2), 1);");
        match &stmts[1].kind {
            StatementKind::ArrayAssign(name, _, Expr::FuncCall(f, args)) => {
                assert_eq!(name, "a");
                assert_eq!(f, "sum");
                assert!(matches!(args[0], Expr::ArrayRef(_, _)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn iterative_loop() {
        let stmts = body("do i = 1 to 10 by 2; x = i; end;");
        match &stmts[0].kind {
            StatementKind::Iterate { var, by, body, .. } => {
                assert_eq!(var, "i");
                assert!(by.is_some());
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected loop, got {:?}", other),
        }
    }

    #[test]
    fn while_and_until_loops() {
        let stmts = body("do while (x < 3); x = x + 1; end; do until (x > 9); x = x * 2; end;");
        assert!(matches!(stmts[0].kind, StatementKind::While(_, _)));
        assert!(matches!(stmts[1].kind, StatementKind::Until(_, _)));
    }

    #[test]
    fn missing_end_is_error() {
        let err = parse("do i = 1 to 2; x = 1;").unwrap_err();
        assert!(err.message.contains("missing END"));
    }

    #[test]
    fn leave_outside_loop_is_error() {
        assert!(parse("leave;").is_err());
        assert!(parse("do; continue; end;").is_err());
        assert!(parse("do i = 1 to 3; if i = 2 then leave; end;").is_ok());
    }

    #[test]
    fn if_then_else_chain() {
        let stmts = body("if x > 1 then y = 1; else if x > 0 then y = 2; else y = 3;");
        let StatementKind::If(_, _, Some(else_branch)) = &stmts[0].kind else { panic!() };
        assert!(matches!(else_branch.kind, StatementKind::If(_, _, Some(_))));
    }

    #[test]
    fn if_then_do_block() {
        let stmts = body("if x then do; y = 1; z = 2; end;");
        let StatementKind::If(_, then_branch, None) = &stmts[0].kind else { panic!() };
        assert!(matches!(&then_branch.kind, StatementKind::Do(b) if b.len() == 2));
    }

    #[test]
    fn subsetting_if() {
        let stmts = body("if x > 10;");
        assert!(matches!(stmts[0].kind, StatementKind::Subset(_)));
    }

    #[test]
    fn precedence() {
        let stmts = body("y = 1 + 2 * 3 ** 2 > 10 and not z;");
        let StatementKind::Assign(_, Expr::BinOp(lhs, BinOp::And, rhs)) = &stmts[0].kind else { panic!() };
        assert!(matches!(**lhs, Expr::BinOp(_, BinOp::Gt, _)));
        assert!(matches!(**rhs, Expr::Unary(UnaryOp::Not, _)));
    }

    #[test]
    fn negation_binds_looser_than_power() {
        let stmts = body("y = -x ** 2;");
        let StatementKind::Assign(_, Expr::Unary(UnaryOp::Neg, inner)) = &stmts[0].kind else { panic!() };
        assert!(matches!(**inner, Expr::BinOp(_, BinOp::Pow, _)));
    }

    #[test]
    fn division_by_literal_zero_parses() {
        assert!(parse("y = x / 0;").is_ok());
    }

    #[test]
    fn data_steps_with_set_and_datalines() {
        let prog = parse(
            "data a; input name $ age; datalines;\nann 30\nbob 41\n;\nrun;\n\
             data b; set a; keep name; run;",
        )
        .unwrap();
        assert_eq!(prog.steps.len(), 2);
        let Some(StepSource::Inline(inline)) = &prog.steps[0].source else { panic!() };
        assert_eq!(inline.fields[0], InputField { name: "name".into(), text: true });
        assert_eq!(inline.data, "ann 30\nbob 41\n");
        assert!(matches!(&prog.steps[1].source, Some(StepSource::Set(n)) if n == "a"));
        assert_eq!(prog.steps[1].keep, ["name"]);
    }

    #[test]
    fn null_step_and_anonymous_step() {
        let prog = parse("data _null_; x = 1; run;").unwrap();
        assert_eq!(prog.steps[0].output, None);
        let prog = parse("x = 1;").unwrap();
        assert_eq!(prog.steps[0].output.as_deref(), Some(DEFAULT_OUTPUT));
    }

    #[test]
    fn datalines_requires_input() {
        let err = parse("data a; datalines;\n1\n;\nrun;").unwrap_err();
        assert!(err.message.contains("INPUT"));
    }

    #[test]
    fn set_with_datalines_rejected() {
        assert!(parse("data a; set b; input x; datalines;\n1\n;\nrun;").is_err());
    }

    #[test]
    fn infile_delimiter() {
        let prog = parse("data a; infile datalines dlm=','; input x y; datalines;\n1,2\n;\n").unwrap();
        let Some(StepSource::Inline(inline)) = &prog.steps[0].source else { panic!() };
        assert_eq!(inline.delimiter.as_deref(), Some(","));
    }

    #[test]
    fn declarations_must_be_top_level() {
        assert!(parse("if x then set a;").is_err());
        assert!(parse("do; keep x; end;").is_err());
    }

    #[test]
    fn put_items() {
        let stmts = body("put 'total' total= n;");
        let StatementKind::Put(items) = &stmts[0].kind else { panic!() };
        assert_eq!(
            items,
            &[
                PutItem::Text("total".into()),
                PutItem::Named("total".into()),
                PutItem::Var("n".into()),
            ]
        );
    }

    #[test]
    fn error_carries_position() {
        let err = parse("x = 1;\ny = (2 + ;").unwrap_err();
        assert_eq!(err.span, Span::new(2, 10));
        assert!(err.message.contains("expected an expression"));
    }

    #[test]
    fn unknown_token_rejected() {
        let err = parse("x = 1 @ 2;").unwrap_err();
        assert!(err.message.contains("unrecognized input '@'"));
    }
}
