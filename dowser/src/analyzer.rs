//! Chart-level orchestration: build the template index, walk every
//! template, flatten the values files, and reconcile the two path sets.

use crate::chart::{Chart, ChartFile};
use crate::eval::collect_usages;
use crate::index::TemplateIndex;
use crate::path::{merge_join_loose, FlattenError, Paths};
use crate::path::flatten_definitions;
use crate::result::AnalysisResult;
use crate::template::ParseError;

use std::error::Error;
use std::fmt;

use log::debug;

/// Failure to analyze a chart. Per-file parse errors abort the chart's
/// analysis; everything recoverable is accumulated into the result instead.
#[derive(Debug)]
pub enum AnalyzeError {
    Template(ParseError),
    Values(FlattenError),
    NonUtf8Template { file: String },
}

impl fmt::Display for AnalyzeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalyzeError::Template(e) => write!(f, "template parse error: {}", e),
            AnalyzeError::Values(e) => write!(f, "values parse error: {}", e),
            AnalyzeError::NonUtf8Template { file } => {
                write!(f, "template {} is not valid UTF-8", file)
            }
        }
    }
}

impl Error for AnalyzeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AnalyzeError::Template(e) => Some(e),
            AnalyzeError::Values(e) => Some(e),
            AnalyzeError::NonUtf8Template { .. } => None,
        }
    }
}

impl From<ParseError> for AnalyzeError {
    fn from(e: ParseError) -> AnalyzeError {
        AnalyzeError::Template(e)
    }
}

impl From<FlattenError> for AnalyzeError {
    fn from(e: FlattenError) -> AnalyzeError {
        AnalyzeError::Values(e)
    }
}

/// The analyzer handle. Owns the strict flag: strict mode turns "can't
/// happen" soft-warnings into hard failures and is meant for tests; the CLI
/// runs non-strict.
#[derive(Clone, Copy, Debug, Default)]
pub struct Analyzer {
    strict: bool,
}

impl Analyzer {
    /// A non-strict analyzer, as used in production.
    pub fn new() -> Analyzer {
        Analyzer::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Analyzer {
        self.strict = strict;
        self
    }

    /// Analyzes one chart end-to-end: referenced, unused, and undefined
    /// paths. `extra_values` are additional values files flattened into the
    /// definitions.
    pub fn analyze(
        &self,
        chart: &Chart,
        extra_values: &[ChartFile],
    ) -> Result<AnalysisResult, AnalyzeError> {
        let used = self.collect_used(chart)?;
        let defined = self.collect_defined(chart, extra_values)?;
        debug!(
            "chart {}: {} defined paths, {} used paths",
            chart.name,
            defined.len(),
            used.len()
        );

        let (referenced, unused, undefined) = merge_join_loose(defined, used);
        Ok(AnalysisResult {
            chart_name: chart.name.clone(),
            referenced,
            unused,
            undefined,
        })
    }

    /// Every `.Values` path observed across the chart's own template files.
    /// Dependency charts contribute their `define`s to the index, not their
    /// own usages.
    fn collect_used(&self, chart: &Chart) -> Result<Paths, AnalyzeError> {
        let idx = TemplateIndex::build(chart, self.strict)?;
        let mut used = Paths::new();
        for template in &chart.templates {
            let source = std::str::from_utf8(&template.data).map_err(|_| {
                AnalyzeError::NonUtf8Template {
                    file: template.name.clone(),
                }
            })?;
            let paths = collect_usages(&template.name, source, Some(&idx), self.strict)?;
            debug!("analyzed {}: {} paths", template.name, paths.len());
            used.extend(paths);
        }
        Ok(used)
    }

    fn collect_defined(
        &self,
        chart: &Chart,
        extra_values: &[ChartFile],
    ) -> Result<Paths, AnalyzeError> {
        let mut defined = Paths::new();
        if let Some(values) = chart.values_file() {
            defined.extend(flatten_definitions(&values.data, &values.name)?);
        }
        for file in extra_values {
            defined.extend(flatten_definitions(&file.data, &file.name)?);
        }
        Ok(defined)
    }
}
