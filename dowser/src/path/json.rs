//! Conversions into the shared report types.

use super::{Path, PathContext, Paths};

use helm_dowser_serde::{ContextJson, PathJson};

impl PathContext {
    pub fn to_json(&self) -> ContextJson {
        ContextJson {
            file: self.file.clone(),
            template: self.template_name.clone(),
            line: self.line,
            column: self.column,
        }
    }
}

impl Path {
    pub fn to_json(&self) -> PathJson {
        PathJson {
            id: self.id(),
            kinds: self.kinds_string(),
            contexts: self.contexts.iter().map(PathContext::to_json).collect(),
        }
    }
}

impl Paths {
    /// Sorted, deduplicated JSON representation. Non-mutating.
    pub fn to_json(&self) -> Vec<PathJson> {
        self.clone()
            .sort_dedup()
            .iter()
            .map(Path::to_json)
            .collect()
    }
}
