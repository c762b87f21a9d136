//! `include` and `tpl`: the analyzer-aware template expansion.

use super::funcs::Call;
use super::{EvalCtx, EvalResult, MAX_INCLUDE_DEPTH};
use crate::index::TemplateIndex;
use crate::path::Path;
use crate::template::ast::Arg;

use std::collections::BTreeMap;

use log::debug;

enum Binding {
    /// `include "x" $`: the body starts from the chart root.
    Root,
    /// `include "x" (dict ...)`: field accesses resolve through the dict.
    Dict(BTreeMap<String, Path>, BTreeMap<String, String>),
    /// `include "x" .Values.sub`: the body's `.` is the given value.
    Prefixes(Vec<Path>),
    /// No usable context argument; scope is left as-is.
    Unchanged,
}

/// Resolves the template by its literal name and walks its body under the
/// chosen context binding. Emits no value itself; paths are emitted while
/// the body is walked.
pub(crate) fn include_fn<'a>(ctx: &mut EvalCtx<'a>, call: &Call) -> EvalResult {
    if call.args.is_empty() {
        ctx.broken("include: requires a template name argument");
        return EvalResult::empty();
    }
    let name_result = ctx.eval_arg(&call.args[0]);
    ctx.emit(call.pos, &name_result.paths);

    let binding = match call.args.get(1) {
        None => Binding::Unchanged,
        Some(Arg::Variable { name, fields, .. }) if name.is_empty() && fields.is_empty() => {
            Binding::Root
        }
        Some(arg) => {
            let result = ctx.eval_arg(arg);
            if result.has_dict() {
                Binding::Dict(
                    result.dict.unwrap_or_default(),
                    result.dict_lits.unwrap_or_default(),
                )
            } else {
                ctx.emit(call.pos, &result.paths);
                let prefixes: Vec<Path> = result
                    .paths
                    .into_iter()
                    .filter(|p| !p.is_empty())
                    .collect();
                if prefixes.is_empty() {
                    // A bare `.` outside any block is the root context
                    // without parameters; relative fields stay unresolved.
                    Binding::Unchanged
                } else {
                    Binding::Prefixes(prefixes)
                }
            }
        }
    };

    let name = match name_result.args.first() {
        Some(name) => name.clone(),
        None => {
            ctx.broken("include: template name must be a string literal");
            return EvalResult::empty();
        }
    };
    let idx: &'a TemplateIndex = match ctx.idx {
        Some(idx) => idx,
        None => {
            ctx.broken("include: template index not available");
            return EvalResult::empty();
        }
    };
    let def = match idx.get(&name) {
        Some(def) => def,
        None => {
            ctx.broken(&format!("include: template {:?} not found", name));
            return EvalResult::empty();
        }
    };

    if ctx.in_stack.contains(&name) {
        panic!("include: circular dependency on template {:?}", name);
    }
    ctx.depth += 1;
    if ctx.depth > MAX_INCLUDE_DEPTH {
        panic!("include: maximum include depth exceeded");
    }
    ctx.in_stack.insert(name.clone());
    debug!("include: expanding template {} from {}", name, def.file);

    let saved_tree = std::mem::replace(&mut ctx.tree, &def.tree);
    let (saved_prefixes, saved_params, saved_lits) = match binding {
        Binding::Root => (
            std::mem::take(&mut ctx.prefixes),
            std::mem::take(&mut ctx.param_paths),
            std::mem::take(&mut ctx.param_lits),
        ),
        Binding::Dict(paths, lits) => (
            std::mem::take(&mut ctx.prefixes),
            std::mem::replace(&mut ctx.param_paths, paths),
            std::mem::replace(&mut ctx.param_lits, lits),
        ),
        Binding::Prefixes(prefixes) => (
            std::mem::replace(&mut ctx.prefixes, prefixes),
            std::mem::take(&mut ctx.param_paths),
            std::mem::take(&mut ctx.param_lits),
        ),
        Binding::Unchanged => (
            ctx.prefixes.clone(),
            ctx.param_paths.clone(),
            ctx.param_lits.clone(),
        ),
    };

    ctx.eval_list(&def.tree.root);

    ctx.prefixes = saved_prefixes;
    ctx.param_paths = saved_params;
    ctx.param_lits = saved_lits;
    ctx.tree = saved_tree;
    ctx.in_stack.remove(&name);
    ctx.depth -= 1;

    EvalResult::empty()
}

/// Partial by design: the first argument's expression is tracked, but the
/// produced string is never parsed as a sub-template.
pub(crate) fn tpl_fn(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.is_empty() {
        ctx.broken("tpl: missing template argument");
        return EvalResult::empty();
    }
    let result = ctx.eval_arg(&call.args[0]);
    EvalResult::from_paths(result.paths)
}
