//! helm-dowser-serde
//! =================
//!
//! Serde types for the reports produced by `helm-dowser`, decoupled from the
//! analyzer core so that consumers of the JSON output can depend on the
//! type definitions alone.

#![forbid(unsafe_code)]

mod report;

pub use report::{ChartReport, ContextJson, PathJson};
