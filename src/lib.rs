pub mod action;
pub mod builtins;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod field;
pub mod input;
pub mod lexer;
pub mod library;
pub mod output;
pub mod parser;
pub mod runtime;


use error::SyntaxError;
use parser::Program;

/// Tokenize and parse a whole script.
pub fn compile(source: &str) -> Result<Program, SyntaxError> {
    let tokens = lexer::Lexer::new(source).tokenize();
    parser::Parser::new(tokens).parse()
}
