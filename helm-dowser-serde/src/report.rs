use serde::{Deserialize, Serialize};

/// Source location attached to a reported path.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ContextJson {
    pub file: String,
    /// Name of the `define`d template the location sits in, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub line: usize,
    pub column: usize,
}

/// Compact, stable representation of one values path.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct PathJson {
    /// Dot-notation id, e.g. `.image.tag`.
    pub id: String,
    /// Slash-prefixed segment kind symbols, e.g. `/K/K/I/K`.
    pub kinds: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<ContextJson>,
}

/// Analysis report for a single chart.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ChartReport {
    pub chart: String,
    /// Present only when referenced paths were requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referenced: Option<Vec<PathJson>>,
    pub unused: Vec<PathJson>,
    pub undefined: Vec<PathJson>,
}
