use std::fmt;

/// Source location where a path was observed: a file, an optional
/// `define`d-template name, and a 1-based line and column.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathContext {
    pub file: String,
    pub template_name: Option<String>,
    pub line: usize,
    pub column: usize,
}

impl PathContext {
    pub fn new(file: impl Into<String>, line: usize, column: usize) -> PathContext {
        PathContext {
            file: file.into(),
            template_name: None,
            line,
            column,
        }
    }

    pub fn in_template(
        file: impl Into<String>,
        template_name: impl Into<String>,
        line: usize,
        column: usize,
    ) -> PathContext {
        PathContext {
            file: file.into(),
            template_name: Some(template_name.into()),
            line,
            column,
        }
    }
}

impl fmt::Display for PathContext {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.template_name {
            Some(name) => write!(f, "{}:{}:{} ({})", self.file, self.line, self.column, name),
            None => write!(f, "{}:{}:{}", self.file, self.line, self.column),
        }
    }
}

/// Removes duplicate contexts, preserving first-occurrence order.
pub(crate) fn dedup_contexts(contexts: &mut Vec<PathContext>) {
    let mut seen: Vec<PathContext> = Vec::with_capacity(contexts.len());
    contexts.retain(|ctx| {
        if seen.contains(ctx) {
            false
        } else {
            seen.push(ctx.clone());
            true
        }
    });
}
