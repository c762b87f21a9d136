//! Lexer, parser, and AST for Go-`text/template`-style template files.
//!
//! Only the grammatical parse matters to the analyzer; semantics are imposed
//! by the evaluator in [`crate::eval`].

pub mod ast;
mod lexer;
mod parser;

pub use ast::{Arg, Command, Node, Pipe, Tree};
pub use parser::parse_file;

use std::error::Error;
use std::fmt;

/// A template file failed to parse. Carries `file:line:column` context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseError {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn at(file: &str, source: &str, offset: usize, message: String) -> ParseError {
        let (line, column) = position(source, offset);
        ParseError {
            file: file.to_string(),
            line,
            column,
            message,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.file, self.line, self.column, self.message
        )
    }
}

impl Error for ParseError {}

/// Converts a byte offset into a 1-based line and column.
pub fn position(source: &str, offset: usize) -> (usize, usize) {
    if offset > source.len() {
        return (1, 1);
    }
    let prefix = &source[..offset];
    let line = prefix.matches('\n').count() + 1;
    let column = match prefix.rfind('\n') {
        Some(newline) => offset - newline,
        None => offset + 1,
    };
    (line, column)
}
