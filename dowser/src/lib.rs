//! dowser
//! ======
//!
//! This crate provides the analyzer core used by `helm-dowser`: the kinded
//! path algebra, the YAML definition flattener, the Go-template parser and
//! the symbolic evaluator that collects `.Values` access paths, and the
//! loose merge-join that reconciles defined against referenced paths.
//!
//! It is decoupled from chart loading and terminal output; callers hand it
//! an in-memory [`Chart`] and receive an [`AnalysisResult`].

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod chart;
pub mod eval;
pub mod index;
pub mod path;
pub mod result;
pub mod template;

pub use analyzer::{AnalyzeError, Analyzer};
pub use chart::{Chart, ChartFile};
pub use result::AnalysisResult;
