use crate::path::Path;

use std::collections::BTreeMap;

/// The abstract value of evaluating one AST node.
#[derive(Clone, Debug, Default)]
pub struct EvalResult {
    /// `.Values`-rooted paths discovered in the subexpression; the
    /// conservative union over everything it might read.
    pub paths: Vec<Path>,
    /// Literal strings produced by the subexpression, for folding into
    /// key-appending functions like `index` and `get`.
    pub args: Vec<String>,
    /// Structure of a `dict "k1" .Values.a ...` call: literal key to bound
    /// path. Only populated by `dict`.
    pub dict: Option<BTreeMap<String, Path>>,
    /// Literal folding across `dict`: literal key to literal value.
    pub dict_lits: Option<BTreeMap<String, String>>,
}

impl EvalResult {
    pub fn empty() -> EvalResult {
        EvalResult::default()
    }

    pub fn from_paths(paths: Vec<Path>) -> EvalResult {
        EvalResult {
            paths,
            ..EvalResult::default()
        }
    }

    pub fn from_lit(lit: String) -> EvalResult {
        EvalResult {
            args: vec![lit],
            ..EvalResult::default()
        }
    }

    /// True when the value is a structural dict intermediate rather than a
    /// renderable value.
    pub fn has_dict(&self) -> bool {
        self.dict.is_some() || self.dict_lits.is_some()
    }
}
