//! Tree-walking symbolic evaluator. Collects every `.Values` access path a
//! template can read, without executing the template.

mod funcs;
mod include;
mod result;

pub use result::EvalResult;

use crate::index::TemplateIndex;
use crate::path::{Path, PathContext, Paths};
use crate::template::ast::{Arg, Command, Node, Pipe, Tree};
use crate::template::{parse_file, position, ParseError};

use std::collections::{BTreeMap, HashSet};

use log::{debug, warn};

/// Bound on nested `include` expansions. Exceeding it is a latent fault in
/// the chart, not a recoverable condition.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Parses one template file and returns every `.Values` path observed in
/// it, including inside its `define` bodies.
pub fn collect_usages(
    file: &str,
    source: &str,
    idx: Option<&TemplateIndex>,
    strict: bool,
) -> Result<Paths, ParseError> {
    let trees = parse_file(file, source)?;
    let mut out = Paths::new();
    for tree in &trees {
        let mut ctx = EvalCtx::new(tree, &mut out, idx, strict);
        ctx.eval_root();
    }
    Ok(out)
}

fn is_builtin_object(name: &str) -> bool {
    matches!(
        name,
        "Release" | "Chart" | "Files" | "Capabilities" | "Template"
    )
}

/// Evaluation context for one tree. Prefixes give `.` its meaning inside
/// `with`/`range`; parameter maps resolve dict-bound `include` arguments;
/// variables hold `$name` bindings. All of them follow a swap-and-restore
/// scope discipline.
pub(crate) struct EvalCtx<'a> {
    tree: &'a Tree,
    out: &'a mut Paths,
    prefixes: Vec<Path>,
    param_paths: BTreeMap<String, Path>,
    param_lits: BTreeMap<String, String>,
    variables: BTreeMap<String, Path>,
    idx: Option<&'a TemplateIndex>,
    in_stack: HashSet<String>,
    depth: usize,
    strict: bool,
}

impl<'a> EvalCtx<'a> {
    pub(crate) fn new(
        tree: &'a Tree,
        out: &'a mut Paths,
        idx: Option<&'a TemplateIndex>,
        strict: bool,
    ) -> EvalCtx<'a> {
        EvalCtx {
            tree,
            out,
            prefixes: Vec::new(),
            param_paths: BTreeMap::new(),
            param_lits: BTreeMap::new(),
            variables: BTreeMap::new(),
            idx,
            in_stack: HashSet::new(),
            depth: 0,
            strict,
        }
    }

    /// A "can't happen" structural condition: fatal in strict mode, logged
    /// and treated as a no-op otherwise.
    pub(crate) fn broken(&self, msg: &str) {
        if self.strict {
            panic!("{}", msg);
        }
        warn!("{}", msg);
    }

    /// Appends the given paths to the output, stamping each with the source
    /// location of `pos` in the current tree.
    pub(crate) fn emit(&mut self, pos: usize, paths: &[Path]) {
        // A zero-segment path is the bare root context, not a values read.
        if paths.iter().all(Path::is_empty) {
            return;
        }
        let (line, column) = position(&self.tree.source, pos);
        let ctx = PathContext {
            file: self.tree.file.clone(),
            template_name: self.tree.define_name.clone(),
            line,
            column,
        };
        for path in paths {
            if path.is_empty() {
                continue;
            }
            self.out.push(path.clone().with_context(ctx.clone()));
        }
    }

    pub(crate) fn eval_root(&mut self) {
        let tree = self.tree;
        self.eval_list(&tree.root);
    }

    fn eval_list(&mut self, nodes: &[Node]) -> EvalResult {
        let saved_variables = self.variables.clone();
        let mut last = EvalResult::empty();
        for node in nodes {
            last = self.eval_node(node);
        }
        self.variables = saved_variables;
        last
    }

    fn eval_node(&mut self, node: &Node) -> EvalResult {
        match node {
            Node::Text { .. } | Node::Comment { .. } => EvalResult::empty(),
            Node::Action { pipe, .. } => self.eval_action(pipe),
            Node::If {
                pipe,
                list,
                else_list,
                ..
            } => self.eval_if(pipe, list, else_list),
            Node::Range {
                pipe,
                list,
                else_list,
                ..
            } => self.eval_range(pipe, list, else_list),
            Node::With {
                pipe,
                list,
                else_list,
                ..
            } => self.eval_with(pipe, list, else_list),
            Node::Template { pipe, .. } => self.eval_template_action(pipe.as_ref()),
        }
    }

    /// `{{ ... }}`: top-level values are consumed by the renderer, so the
    /// pipe's paths are emitted — unless the result is a structural dict
    /// intermediate.
    fn eval_action(&mut self, pipe: &Pipe) -> EvalResult {
        let result = self.eval_pipe(pipe);
        if !pipe.decls.is_empty() {
            self.bind_declarations(&pipe.decls, &result);
        }
        if !result.has_dict() {
            self.emit(pipe.pos, &result.paths);
        }
        result
    }

    /// Binds an action-level declaration (`{{ $x := ... }}`) for the rest of
    /// the enclosing list scope. Dict intermediates cannot be represented as
    /// a single path and are skipped.
    fn bind_declarations(&mut self, decls: &[String], result: &EvalResult) {
        if result.has_dict() {
            debug!("not binding {:?}: dict-valued declaration", decls);
            return;
        }
        if let (Some(name), Some(path)) = (decls.last(), result.paths.first()) {
            self.variables.insert(name.clone(), path.clone());
        }
    }

    /// Both branches are potential readers, so both are walked; the
    /// condition's paths are emitted.
    fn eval_if(&mut self, pipe: &Pipe, list: &[Node], else_list: &[Node]) -> EvalResult {
        let cond = self.eval_pipe(pipe);
        self.emit(pipe.pos, &cond.paths);

        let saved_variables = self.variables.clone();
        if !pipe.decls.is_empty() {
            self.bind_declarations(&pipe.decls, &cond);
        }
        self.eval_list(list);
        self.variables = saved_variables;

        self.eval_list(else_list);
        EvalResult::empty()
    }

    /// The range expression becomes the context prefix, widened with a
    /// wildcard because the body sees an element, not the collection. The
    /// expression itself is not emitted; paths appear only when the body
    /// actually reads through `.` or a bound variable. The else branch runs
    /// in the outer scope.
    fn eval_range(&mut self, pipe: &Pipe, list: &[Node], else_list: &[Node]) -> EvalResult {
        let expr = self.eval_pipe(pipe);
        let range_prefixes: Vec<Path> = expr.paths.iter().map(Path::with_wildcard).collect();

        let saved_prefixes = std::mem::replace(&mut self.prefixes, range_prefixes.clone());
        let saved_variables = self.variables.clone();
        self.bind_block_variable(&pipe.decls, range_prefixes.first());
        self.eval_list(list);
        self.variables = saved_variables;
        self.prefixes = saved_prefixes;

        self.eval_list(else_list);
        EvalResult::empty()
    }

    /// Like range, without the wildcard: the body's `.` is the expression
    /// value itself.
    fn eval_with(&mut self, pipe: &Pipe, list: &[Node], else_list: &[Node]) -> EvalResult {
        let expr = self.eval_pipe(pipe);

        let saved_prefixes = std::mem::replace(&mut self.prefixes, expr.paths.clone());
        let saved_variables = self.variables.clone();
        self.bind_block_variable(&pipe.decls, expr.paths.first());
        self.eval_list(list);
        self.variables = saved_variables;
        self.prefixes = saved_prefixes;

        self.eval_list(else_list);
        EvalResult::empty()
    }

    /// In `range $v := ...` the value variable binds to the element path;
    /// in `range $k, $v := ...` the key variable is a string, not a path,
    /// and is intentionally untracked.
    fn bind_block_variable(&mut self, decls: &[String], path: Option<&Path>) {
        let name = match decls.len() {
            0 => return,
            1 => &decls[0],
            _ => &decls[1],
        };
        if let Some(path) = path {
            self.variables.insert(name.clone(), path.clone());
        }
    }

    /// `{{ template "name" arg }}` evaluates its argument but never
    /// descends into the referenced body; `include` is the analyzer-aware
    /// variant.
    fn eval_template_action(&mut self, pipe: Option<&Pipe>) -> EvalResult {
        if let Some(pipe) = pipe {
            let result = self.eval_pipe(pipe);
            if !result.has_dict() {
                self.emit(pipe.pos, &result.paths);
            }
        }
        EvalResult::empty()
    }

    /// Pipes normalize right-to-left: the last command becomes a function
    /// call whose final argument is a synthetic pipe wrapping everything
    /// before it.
    pub(crate) fn eval_pipe(&mut self, pipe: &Pipe) -> EvalResult {
        if pipe.cmds.is_empty() {
            return EvalResult::empty();
        }
        if pipe.cmds.len() == 1 {
            return self.eval_command(&pipe.cmds[0]);
        }

        let last = &pipe.cmds[pipe.cmds.len() - 1];
        let head = match last.args.first() {
            Some(Arg::Ident { name, .. }) => Some(name.clone()),
            _ => None,
        };
        match head {
            Some(name) => {
                let preceding = Pipe {
                    pos: pipe.pos,
                    decls: Vec::new(),
                    cmds: pipe.cmds[..pipe.cmds.len() - 1].to_vec(),
                };
                let mut args: Vec<Arg> = last.args[1..].to_vec();
                args.push(Arg::SubPipe {
                    pos: pipe.pos,
                    pipe: preceding,
                });
                funcs::dispatch(
                    self,
                    funcs::Call {
                        name,
                        args,
                        pos: last.pos,
                        piped: true,
                    },
                )
            }
            None => {
                let mut last_result = EvalResult::empty();
                for cmd in &pipe.cmds {
                    last_result = self.eval_command(cmd);
                }
                self.emit(pipe.pos, &last_result.paths);
                last_result
            }
        }
    }

    fn eval_command(&mut self, cmd: &Command) -> EvalResult {
        let head = match cmd.args.first() {
            Some(arg) => arg,
            None => return EvalResult::empty(),
        };
        if let Arg::Ident { name, .. } = head {
            return funcs::dispatch(
                self,
                funcs::Call {
                    name: name.clone(),
                    args: cmd.args[1..].to_vec(),
                    pos: cmd.pos,
                    piped: false,
                },
            );
        }
        if cmd.args.len() == 1 {
            return self.eval_arg(head);
        }
        // Method calls like `.Files.Get "name"`; nothing trackable.
        warn!("command with {} non-function arguments", cmd.args.len());
        EvalResult::empty()
    }

    pub(crate) fn eval_arg(&mut self, arg: &Arg) -> EvalResult {
        match arg {
            Arg::Nil { .. } | Arg::Bool { .. } | Arg::Ident { .. } => EvalResult::empty(),
            Arg::Number { text, .. } => EvalResult::from_lit(text.clone()),
            Arg::Str { text, .. } => EvalResult::from_lit(text.clone()),
            Arg::Dot { .. } => {
                if self.prefixes.is_empty() {
                    EvalResult::from_paths(vec![Path::new()])
                } else {
                    EvalResult::from_paths(self.prefixes.clone())
                }
            }
            Arg::Field { idents, .. } => self.eval_field(idents),
            Arg::Variable { name, fields, .. } => self.eval_variable(name, fields),
            Arg::SubPipe { pipe, .. } => self.eval_pipe(pipe),
            Arg::Chain { base, fields, .. } => self.eval_chain(base, fields),
        }
    }

    fn eval_field(&mut self, idents: &[String]) -> EvalResult {
        let first = match idents.first() {
            Some(first) => first.as_str(),
            None => return EvalResult::empty(),
        };
        let rest = &idents[1..];

        if let Some(base) = self.param_paths.get(first) {
            if rest.first().map_or(false, |f| is_builtin_object(f)) {
                return EvalResult::empty();
            }
            let mut path = base.clone();
            for field in rest {
                path = path.with_key(field);
            }
            return EvalResult::from_paths(vec![path]);
        }

        if let Some(lit) = self.param_lits.get(first) {
            if !rest.is_empty() {
                warn!("field access on literal parameter {}", first);
                return EvalResult::empty();
            }
            return EvalResult::from_lit(lit.clone());
        }

        if first == "Values" {
            if rest.is_empty() {
                return EvalResult::empty();
            }
            return EvalResult::from_paths(vec![Path::from_keys(rest)]);
        }

        if is_builtin_object(first) {
            return EvalResult::empty();
        }

        // Relative field access only means something inside with/range.
        if self.prefixes.is_empty() {
            return EvalResult::empty();
        }
        let suffix = Path::from_keys(idents);
        let paths = self
            .prefixes
            .iter()
            .map(|prefix| prefix.join(&suffix))
            .collect();
        EvalResult::from_paths(paths)
    }

    fn eval_variable(&mut self, name: &str, fields: &[String]) -> EvalResult {
        if name.is_empty() {
            return self.eval_root_variable(fields);
        }
        match self.variables.get(name).cloned() {
            Some(base) => {
                if base.is_empty() {
                    // Bound to the root context; behaves like `$`.
                    return self.eval_root_variable(fields);
                }
                let mut path = base;
                for field in fields {
                    path = path.with_key(field);
                }
                EvalResult::from_paths(vec![path])
            }
            None => {
                debug!("unbound variable ${}", name);
                EvalResult::empty()
            }
        }
    }

    /// `$` is the root context regardless of the active prefixes.
    fn eval_root_variable(&mut self, fields: &[String]) -> EvalResult {
        match fields.first().map(String::as_str) {
            None => EvalResult::from_paths(vec![Path::new()]),
            Some("Values") => {
                if fields.len() < 2 {
                    return EvalResult::empty();
                }
                EvalResult::from_paths(vec![Path::from_keys(&fields[1..])])
            }
            Some(_) => EvalResult::empty(),
        }
    }

    /// `(.expr).a.b` appends the trailing fields to every path of the base.
    fn eval_chain(&mut self, base: &Arg, fields: &[String]) -> EvalResult {
        let base_result = self.eval_arg(base);
        let mut paths = Vec::with_capacity(base_result.paths.len());
        for base_path in &base_result.paths {
            let mut path = base_path.clone();
            for field in fields {
                path = path.with_key(field);
            }
            paths.push(path);
        }
        EvalResult {
            paths,
            args: base_result.args,
            ..EvalResult::default()
        }
    }
}
