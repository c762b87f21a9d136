//! The per-chart analysis result and its report conversion.

use crate::path::{merge_join_loose, Paths};

use helm_dowser_serde::ChartReport;

/// The three disjoint outcome sets for one chart, each path carrying the
/// source locations it was observed at.
#[derive(Clone, Debug, Default)]
pub struct AnalysisResult {
    pub chart_name: String,
    /// Defined and used.
    pub referenced: Paths,
    /// Defined but never referenced.
    pub unused: Paths,
    /// Referenced but never defined.
    pub undefined: Paths,
}

impl AnalysisResult {
    /// A result has findings iff something is unused or undefined.
    pub fn has_findings(&self) -> bool {
        !self.unused.is_empty() || !self.undefined.is_empty()
    }

    /// Drops unused/undefined entries matching any of the ignore patterns,
    /// using the same loose join as the reconciler. `referenced` is never
    /// filtered.
    pub fn filter_ignored(self, patterns: &Paths) -> AnalysisResult {
        if patterns.is_empty() {
            return self;
        }
        let (_, _, unused) = merge_join_loose(patterns.clone(), self.unused);
        let (_, _, undefined) = merge_join_loose(patterns.clone(), self.undefined);
        AnalysisResult {
            chart_name: self.chart_name,
            referenced: self.referenced,
            unused,
            undefined,
        }
    }

    pub fn to_report(&self, include_referenced: bool) -> ChartReport {
        ChartReport {
            chart: self.chart_name.clone(),
            referenced: if include_referenced {
                Some(self.referenced.to_json())
            } else {
                None
            },
            unused: self.unused.to_json(),
            undefined: self.undefined.to_json(),
        }
    }
}

#[cfg(test)]
mod result_tests {
    use super::*;
    use crate::path::{parse_path, Path};

    fn np() -> Path {
        Path::new()
    }

    fn ids(paths: &Paths) -> Vec<String> {
        paths.iter().map(Path::id).collect()
    }

    fn patterns(specs: &[&str]) -> Paths {
        specs.iter().map(|s| parse_path(s).unwrap()).collect()
    }

    #[test]
    fn ignore_filters_unused_and_undefined() {
        let result = AnalysisResult {
            chart_name: "c".to_string(),
            referenced: Paths::from(vec![np().with_key("kept")]),
            unused: Paths::from(vec![
                np().with_key("a").with_key("b"),
                np().with_key("a").with_key("c").with_key("d"),
                np().with_key("e"),
            ]),
            undefined: Paths::from(vec![np().with_key("a").with_key("x")]),
        };
        let filtered = result.filter_ignored(&patterns(&[".a.*"]));
        assert_eq!(ids(&filtered.unused), vec![".e"]);
        assert!(filtered.undefined.is_empty());
        assert_eq!(ids(&filtered.referenced), vec![".kept"]);
    }

    #[test]
    fn exact_any_and_wildcard_patterns_all_match() {
        let result = AnalysisResult {
            chart_name: "c".to_string(),
            referenced: Paths::new(),
            unused: Paths::from(vec![
                np().with_key("image").with_key("tag"),
                np().with_key("config").with_key("nested").with_key("value"),
                np().with_key("replicas"),
                np().with_key("items").with_idx("0"),
                np().with_key("items").with_key("0"),
            ]),
            undefined: Paths::new(),
        };
        let filtered =
            result.filter_ignored(&patterns(&[".image.tag", ".config.*", ".items.0"]));
        assert_eq!(ids(&filtered.unused), vec![".replicas"]);
    }

    #[test]
    fn no_patterns_is_a_no_op() {
        let result = AnalysisResult {
            chart_name: "c".to_string(),
            referenced: Paths::new(),
            unused: Paths::from(vec![np().with_key("u")]),
            undefined: Paths::new(),
        };
        let filtered = result.clone().filter_ignored(&Paths::new());
        assert_eq!(ids(&filtered.unused), ids(&result.unused));
    }

    #[test]
    fn findings_flag() {
        let mut result = AnalysisResult::default();
        assert!(!result.has_findings());
        result.unused.push(np().with_key("x"));
        assert!(result.has_findings());
    }

    #[test]
    fn report_includes_referenced_only_on_request() {
        let result = AnalysisResult {
            chart_name: "c".to_string(),
            referenced: Paths::from(vec![np().with_key("r")]),
            unused: Paths::new(),
            undefined: Paths::new(),
        };
        assert!(result.to_report(false).referenced.is_none());
        let report = result.to_report(true);
        assert_eq!(report.referenced.unwrap()[0].id, ".r");
        assert_eq!(report.chart, "c");
    }
}
