//! Per-function transfer semantics. Every known template function is
//! classified into one of a small set of flavors; the handler decides what
//! the function does to the paths and literals flowing through it.

use super::include::{include_fn, tpl_fn};
use super::{EvalCtx, EvalResult};
use crate::path::Path;
use crate::template::ast::Arg;

use std::collections::BTreeMap;

use log::debug;

/// An invocation of a template function during analysis. When a function is
/// reached through a pipe, the piped value is the last argument.
pub(crate) struct Call {
    pub name: String,
    pub args: Vec<Arg>,
    pub pos: usize,
    pub piped: bool,
}

#[derive(Clone, Copy, Debug)]
enum Flavor {
    /// Value transform: forwards its value argument's paths and literals.
    Passthrough,
    /// Serializes an entire subtree to text; every descendant is read.
    Serialize,
    /// Reducer: every argument is read here, nothing flows on.
    EmitAll,
    /// Two-operand comparison or test; both sides are read here.
    BinaryEval,
    /// Returns a pruned/updated copy of its base argument.
    Pick,
    /// Collection constructor: the union of the arguments flows on.
    Concat,
    /// Any argument might be the result; the union flows on.
    Union,
    Index,
    Get,
    Dict,
    Include,
    Tpl,
    /// Value generators and text parsers; they produce nothing trackable.
    Noop,
    /// Known to exist, deliberately not modeled.
    NotImplemented,
}

pub(crate) fn dispatch(ctx: &mut EvalCtx, call: Call) -> EvalResult {
    match flavor(&call.name) {
        Some(Flavor::Passthrough) => passthrough(ctx, &call, false),
        Some(Flavor::Serialize) => passthrough(ctx, &call, true),
        Some(Flavor::EmitAll) | Some(Flavor::Noop) => emit_all(ctx, &call),
        Some(Flavor::BinaryEval) => binary_eval(ctx, &call),
        Some(Flavor::Pick) => pick(ctx, &call),
        Some(Flavor::Concat) | Some(Flavor::Union) => union_args(ctx, &call),
        Some(Flavor::Index) => index_fn(ctx, &call),
        Some(Flavor::Get) => get_fn(ctx, &call),
        Some(Flavor::Dict) => dict_fn(ctx, &call),
        Some(Flavor::Include) => include_fn(ctx, &call),
        Some(Flavor::Tpl) => tpl_fn(ctx, &call),
        Some(Flavor::NotImplemented) => {
            ctx.broken(&format!("template function not implemented: {}", call.name));
            EvalResult::empty()
        }
        None => {
            ctx.broken(&format!("unknown template function: {}", call.name));
            EvalResult::empty()
        }
    }
}

fn flavor(name: &str) -> Option<Flavor> {
    use Flavor::*;
    let flavor = match name {
        // String and value transforms. The value is the last argument
        // (piped or trailing), so the handler forwards the union of the
        // argument paths and the last argument's literals.
        "quote" | "squote" | "upper" | "lower" | "title" | "untitle" | "trim" | "trimAll"
        | "trimall" | "nospace" | "initials" | "swapcase" | "camelcase" | "kebabcase"
        | "snakecase" | "shuffle" | "wrap" | "wrapWith" | "abbrev" | "abbrevboth" | "trunc"
        | "repeat" | "substr" | "indent" | "nindent" | "replace" | "required" | "toString"
        | "toStrings" | "int" | "int64" | "float64" | "atoi" | "toDecimal" | "b64enc"
        | "b64dec" | "b32enc" | "b32dec" | "sha1sum" | "sha256sum" | "sha512sum"
        | "adler32sum" | "base" | "dir" | "clean" | "ext" | "isAbs" | "osBase" | "osClean"
        | "osDir" | "osExt" | "osIsAbs" | "urlquery" | "html" | "js" | "join" | "deepCopy"
        | "mustDeepCopy" | "compact" | "mustCompact" | "uniq" | "mustUniq" | "sortAlpha"
        | "reverse" | "mustReverse" | "rest" | "mustRest" | "initial" | "mustInitial"
        | "first" | "mustFirst" | "last" | "mustLast" => Passthrough,

        "toYaml" | "mustToYaml" | "toYamlPretty" | "toJson" | "mustToJson" | "toPrettyJson"
        | "mustToPrettyJson" | "toRawJson" | "mustToRawJson" | "toToml" | "mustToToml" => {
            Serialize
        }

        // Boolean, arithmetic, formatting, and merge-like reducers.
        "and" | "or" | "not" | "print" | "printf" | "println" | "len" | "empty" | "all"
        | "any" | "fail" | "plural" | "cat" | "split" | "splitList" | "splitn"
        | "regexSplit" | "mustRegexSplit" | "regexFindAll" | "mustRegexFindAll"
        | "regexReplaceAll" | "mustRegexReplaceAll" | "regexReplaceAllLiteral"
        | "mustRegexReplaceAllLiteral" | "add" | "add1" | "sub" | "mul" | "div" | "mod"
        | "addf" | "add1f" | "subf" | "mulf" | "divf" | "max" | "min" | "maxf" | "minf"
        | "biggest" | "ceil" | "floor" | "round" | "seq" | "until" | "untilStep"
        | "randInt" | "merge" | "mustMerge" | "mergeOverwrite" | "mustMergeOverwrite"
        | "concat" | "dig" | "kindOf" | "typeOf" | "date" | "dateInZone" | "date_in_zone"
        | "dateModify" | "date_modify" | "mustDateModify" | "must_date_modify" | "duration"
        | "durationRound" | "ago" | "unixEpoch" | "toDate" | "mustToDate" | "htmlDate"
        | "htmlDateInZone" => EmitAll,

        "eq" | "ne" | "lt" | "le" | "gt" | "ge" | "has" | "mustHas" | "hasKey"
        | "hasPrefix" | "hasSuffix" | "contains" | "kindIs" | "typeIs" | "typeIsLike"
        | "trimPrefix" | "trimSuffix" | "regexMatch" | "mustRegexMatch" | "regexFind"
        | "mustRegexFind" | "deepEqual" | "semverCompare" => BinaryEval,

        "omit" | "pick" | "set" | "unset" | "slice" | "mustSlice" => Pick,

        "list" | "tuple" | "append" | "mustAppend" | "prepend" | "mustPrepend" | "without"
        | "mustWithout" | "chunk" | "mustChunk" | "keys" | "values" | "pluck" => Concat,

        "default" | "coalesce" | "ternary" => Union,

        "index" => Index,
        "get" => Get,
        "dict" => Dict,
        "include" => Include,
        "tpl" => Tpl,

        // Text parsers and generators: nothing trackable comes out. Their
        // arguments are still walked, because paths can flow in.
        "fromYaml" | "fromYamlArray" | "fromJson" | "fromJsonArray" | "mustFromJson"
        | "fromToml" | "now" | "uuidv4" | "randAlpha" | "randAlphaNum" | "randAscii"
        | "randNumeric" | "randBytes" | "genPrivateKey" | "genCA" | "genCAWithKey"
        | "genSelfSignedCert" | "genSelfSignedCertWithKey" | "genSignedCert"
        | "genSignedCertWithKey" | "buildCustomCert" | "derivePassword" | "encryptAES"
        | "decryptAES" | "bcrypt" | "htpasswd" | "semver" | "env" | "expandenv"
        | "urlParse" | "urlJoin" => Noop,

        "lookup" | "getHostByName" | "call" => NotImplemented,

        _ => return None,
    };
    Some(flavor)
}

/// Evaluates every argument; forwards the union of their paths (widened
/// with a terminal wildcard for serializers) and the literals of the value
/// argument, which sits last.
fn passthrough(ctx: &mut EvalCtx, call: &Call, widen: bool) -> EvalResult {
    let mut paths = Vec::new();
    let mut lits = Vec::new();
    for (i, arg) in call.args.iter().enumerate() {
        let result = ctx.eval_arg(arg);
        if widen {
            paths.extend(result.paths.iter().map(Path::with_wildcard));
        } else {
            paths.extend(result.paths.iter().cloned());
        }
        if i == call.args.len() - 1 {
            lits = result.args;
        }
    }
    EvalResult {
        paths,
        args: lits,
        ..EvalResult::default()
    }
}

/// Evaluates every argument and emits its paths; the call's own value is
/// untrackable, so nothing flows on.
fn emit_all(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    for arg in &call.args {
        let result = ctx.eval_arg(arg);
        ctx.emit(call.pos, &result.paths);
    }
    EvalResult::empty()
}

fn binary_eval(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.len() != 2 {
        ctx.broken(&format!(
            "{}: expected 2 arguments, got {}",
            call.name,
            call.args.len()
        ));
    }
    emit_all(ctx, call)
}

/// `omit`/`pick`-style: every argument is evaluated, only the base flows on.
fn pick(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.is_empty() {
        return EvalResult::empty();
    }
    let base_idx = if call.piped { call.args.len() - 1 } else { 0 };
    let mut base_paths = Vec::new();
    for (i, arg) in call.args.iter().enumerate() {
        let result = ctx.eval_arg(arg);
        if i == base_idx {
            base_paths = result.paths;
        } else {
            // Key arguments computed from values are still reads.
            ctx.emit(call.pos, &result.paths);
        }
    }
    EvalResult::from_paths(base_paths)
}

/// The union of every argument flows on; nothing is emitted here.
fn union_args(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    let mut paths = Vec::new();
    let mut lits = Vec::new();
    for arg in &call.args {
        let result = ctx.eval_arg(arg);
        paths.extend(result.paths);
        lits.extend(result.args);
    }
    EvalResult {
        paths,
        args: lits,
        ..EvalResult::default()
    }
}

/// `index base k1 k2 ...`: dict-aware when the base carries dict structure
/// and a single literal key is known; otherwise each literal key appends an
/// `Any` segment to every base path.
fn index_fn(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.is_empty() {
        ctx.broken("index: missing base argument");
        return EvalResult::empty();
    }
    let results: Vec<EvalResult> = call.args.iter().map(|arg| ctx.eval_arg(arg)).collect();
    let base_idx = if call.piped && results[0].paths.is_empty() && !results[0].has_dict() {
        call.args.len() - 1
    } else {
        0
    };
    let base = &results[base_idx];
    let keys: Vec<&EvalResult> = results
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != base_idx)
        .map(|(_, r)| r)
        .collect();

    if keys.len() == 1 && keys[0].args.len() == 1 {
        let key = &keys[0].args[0];
        if let Some(lits) = &base.dict_lits {
            if let Some(lit) = lits.get(key) {
                return EvalResult::from_lit(lit.clone());
            }
        }
        if let Some(dict) = &base.dict {
            if let Some(path) = dict.get(key) {
                return EvalResult::from_paths(vec![path.clone()]);
            }
        }
    }

    if keys.iter().any(|key| key.args.len() != 1) {
        ctx.broken("index: key must be a single literal");
        // A dynamic key cannot be appended, but it and the base are still
        // reads; keep the union instead of dropping them.
        let mut paths = base.paths.clone();
        for key in &keys {
            paths.extend(key.paths.iter().cloned());
        }
        return EvalResult::from_paths(paths);
    }

    let mut paths = base.paths.clone();
    for key in &keys {
        paths = paths.iter().map(|p| p.with_any(&key.args[0])).collect();
    }
    EvalResult::from_paths(paths)
}

/// `get base key`: the two-argument form of `index`.
fn get_fn(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.len() != 2 {
        ctx.broken(&format!("get: expected 2 arguments, got {}", call.args.len()));
        return emit_all(ctx, call);
    }
    let (base_idx, key_idx) = if call.piped { (1, 0) } else { (0, 1) };
    let base = ctx.eval_arg(&call.args[base_idx]);
    let key = ctx.eval_arg(&call.args[key_idx]);
    if key.args.len() != 1 {
        ctx.broken("get: key must be a single literal");
        let mut paths = base.paths;
        paths.extend(key.paths);
        return EvalResult::from_paths(paths);
    }
    let k = &key.args[0];
    if let Some(lits) = &base.dict_lits {
        if let Some(lit) = lits.get(k) {
            return EvalResult::from_lit(lit.clone());
        }
    }
    if let Some(dict) = &base.dict {
        if let Some(path) = dict.get(k) {
            return EvalResult::from_paths(vec![path.clone()]);
        }
    }
    EvalResult::from_paths(base.paths.iter().map(|p| p.with_any(k)).collect())
}

/// `dict k1 v1 k2 v2 ...`: the union of the value paths flows on, and the
/// literal-keyed structure is kept for `index`/`get`/`include` resolution.
fn dict_fn(ctx: &mut EvalCtx, call: &Call) -> EvalResult {
    if call.args.len() % 2 != 0 {
        ctx.broken("dict: expected key/value pairs");
    }
    let mut paths = Vec::new();
    let mut dict = BTreeMap::new();
    let mut dict_lits = BTreeMap::new();
    for pair in call.args.chunks(2) {
        let key = ctx.eval_arg(&pair[0]);
        paths.extend(key.paths.iter().cloned());
        let value = match pair.get(1) {
            Some(arg) => ctx.eval_arg(arg),
            None => break,
        };
        paths.extend(value.paths.iter().cloned());
        if key.args.len() == 1 {
            let k = key.args[0].clone();
            if let Some(path) = value.paths.first() {
                dict.insert(k.clone(), path.clone());
            }
            if let Some(lit) = value.args.first() {
                dict_lits.insert(k, lit.clone());
            }
        } else {
            debug!("dict: non-literal key, structure not tracked for this pair");
        }
    }
    EvalResult {
        paths,
        args: Vec::new(),
        dict: Some(dict),
        dict_lits: Some(dict_lits),
    }
}
