//! The template AST consumed by the evaluator.
//!
//! Every node carries the byte offset it starts at; line and column are
//! derived from the source on demand.

use std::rc::Rc;

/// One parse tree: either a file's own body or the body of a `define`.
#[derive(Clone, Debug)]
pub struct Tree {
    /// Name of the `define` this tree came from; `None` for the file tree.
    pub define_name: Option<String>,
    /// Origin file, forward-slash relative to the chart root.
    pub file: String,
    /// Shared source text of the origin file.
    pub source: Rc<String>,
    pub root: Vec<Node>,
}

impl Tree {
    /// The name this tree is registered under.
    pub fn name(&self) -> &str {
        self.define_name.as_deref().unwrap_or(&self.file)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Text {
        pos: usize,
        text: String,
    },
    Comment {
        pos: usize,
    },
    Action {
        pos: usize,
        pipe: Pipe,
    },
    If {
        pos: usize,
        pipe: Pipe,
        list: Vec<Node>,
        else_list: Vec<Node>,
    },
    Range {
        pos: usize,
        pipe: Pipe,
        list: Vec<Node>,
        else_list: Vec<Node>,
    },
    With {
        pos: usize,
        pipe: Pipe,
        list: Vec<Node>,
        else_list: Vec<Node>,
    },
    /// `{{ template "name" pipeline }}`. Also produced by `block`, which
    /// additionally registers its body as a `define`.
    Template {
        pos: usize,
        name: String,
        pipe: Option<Pipe>,
    },
}

/// A `|`-separated sequence of commands, with optional variable
/// declarations (`$v :=`, `$k, $v :=`, `$v =`).
#[derive(Clone, Debug, PartialEq)]
pub struct Pipe {
    pub pos: usize,
    /// Declared variable names, without the `$`.
    pub decls: Vec<String>,
    pub cmds: Vec<Command>,
}

/// One command: a space-separated sequence of operands. If the first
/// operand is an identifier the command is a function call.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    pub pos: usize,
    pub args: Vec<Arg>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    /// Bare `.`.
    Dot { pos: usize },
    Nil { pos: usize },
    Bool { pos: usize, value: bool },
    Number { pos: usize, text: String },
    Str { pos: usize, text: String },
    /// Bare identifier; a function name in command-head position.
    Ident { pos: usize, name: String },
    /// `.a.b.c`.
    Field { pos: usize, idents: Vec<String> },
    /// `$`, `$name`, or `$name.a.b`; `name` is empty for the bare `$`.
    Variable {
        pos: usize,
        name: String,
        fields: Vec<String>,
    },
    /// Parenthesized pipeline.
    SubPipe { pos: usize, pipe: Pipe },
    /// Field accesses chained onto a non-field operand: `(.x).a.b`.
    Chain {
        pos: usize,
        base: Box<Arg>,
        fields: Vec<String>,
    },
}

impl Arg {
    pub fn pos(&self) -> usize {
        match self {
            Arg::Dot { pos }
            | Arg::Nil { pos }
            | Arg::Bool { pos, .. }
            | Arg::Number { pos, .. }
            | Arg::Str { pos, .. }
            | Arg::Ident { pos, .. }
            | Arg::Field { pos, .. }
            | Arg::Variable { pos, .. }
            | Arg::SubPipe { pos, .. }
            | Arg::Chain { pos, .. } => *pos,
        }
    }
}
