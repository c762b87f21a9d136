//! Wires the pieces together: patterns, values files, chart roots,
//! analysis, filtering, and reporting.
//!
//! Exit codes: 0 no findings, 1 analysis error or findings present, 2
//! usage error.

use crate::args::DowserCli;
use crate::loader;
use crate::output;

use dowser::path::{parse_path, Paths};
use dowser::{AnalysisResult, Analyzer, ChartFile};

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use log::debug;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FINDINGS: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

pub fn run(args: &DowserCli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> i32 {
    let mut patterns = Paths::new();
    for raw in &args.ignore {
        match parse_path(raw) {
            Ok(path) => patterns.push(path),
            Err(e) => {
                let _ = writeln!(stderr, "invalid ignore path {:?}: {}", raw, e);
                return EXIT_USAGE;
            }
        }
    }

    let mut extra_values = Vec::new();
    for path in &args.values_files {
        match fs::read(path) {
            Ok(data) => {
                extra_values.push(ChartFile::new(path.to_string_lossy().into_owned(), data))
            }
            Err(e) => {
                let _ = writeln!(stderr, "cannot read values file {}: {}", path.display(), e);
                return EXIT_USAGE;
            }
        }
    }

    let mut had_error = false;

    // Chart roots are deduplicated before analysis.
    let mut roots: Vec<PathBuf> = Vec::new();
    for chart_arg in &args.charts {
        match loader::resolve_root(chart_arg) {
            Ok(root) => {
                let root = root.canonicalize().unwrap_or(root);
                if !roots.contains(&root) {
                    roots.push(root);
                }
            }
            Err(e) => {
                let _ = writeln!(stderr, "{}", e);
                had_error = true;
            }
        }
    }
    debug!("analyzing {} chart root(s)", roots.len());

    let analyzer = Analyzer::new();
    let mut results: Vec<AnalysisResult> = Vec::new();
    for root in &roots {
        let chart = match loader::load(root) {
            Ok(chart) => chart,
            Err(e) => {
                let _ = writeln!(stderr, "failed to load chart {}: {}", root.display(), e);
                had_error = true;
                continue;
            }
        };
        match analyzer.analyze(&chart, &extra_values) {
            Ok(result) => results.push(result.filter_ignored(&patterns)),
            Err(e) => {
                let _ = writeln!(stderr, "failed to analyze chart {}: {}", root.display(), e);
                had_error = true;
            }
        }
    }

    let written = if args.json {
        output::write_json(stdout, &results, args.referenced)
    } else {
        output::write_text(stdout, &results)
    };
    if let Err(e) = written {
        let _ = writeln!(stderr, "failed to write report: {}", e);
        had_error = true;
    }

    if had_error || results.iter().any(AnalysisResult::has_findings) {
        EXIT_FINDINGS
    } else {
        EXIT_OK
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::Parser;

    use std::fs;
    use std::path::Path;

    use tempfile::tempdir;

    fn write_chart(root: &Path, values: &str, template: &str) {
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("Chart.yaml"), "name: demo\nversion: 0.1.0\n").unwrap();
        fs::write(root.join("values.yaml"), values).unwrap();
        fs::write(root.join("templates/cm.yaml"), template).unwrap();
    }

    fn run_with(argv: Vec<String>) -> (i32, String, String) {
        colored::control::set_override(false);
        let args = DowserCli::try_parse_from(argv).unwrap();
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(&args, &mut stdout, &mut stderr);
        (
            code,
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    #[test]
    fn clean_chart_exits_zero() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\n", "v: {{ .Values.a }}\n");
        let (code, stdout, _) = run_with(vec![
            "helm-dowser".to_string(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_OK);
        assert!(stdout.contains("0 Unused  0 Undefined"));
    }

    #[test]
    fn findings_exit_one() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\nunused: 2\n", "v: {{ .Values.a }}\n");
        let (code, stdout, _) = run_with(vec![
            "helm-dowser".to_string(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_FINDINGS);
        assert!(stdout.contains(".unused"));
    }

    #[test]
    fn ignored_findings_exit_zero() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\nunused: 2\n", "v: {{ .Values.a }}\n");
        let (code, _, _) = run_with(vec![
            "helm-dowser".to_string(),
            "--ignore".to_string(),
            ".unused".to_string(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn malformed_ignore_pattern_is_a_usage_error() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\n", "v: {{ .Values.a }}\n");
        let (code, _, stderr) = run_with(vec![
            "helm-dowser".to_string(),
            "-i".to_string(),
            "/slash/notation".to_string(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_USAGE);
        assert!(stderr.contains("dot notation"));
    }

    #[test]
    fn unreadable_values_file_is_a_usage_error() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\n", "v: {{ .Values.a }}\n");
        let (code, _, stderr) = run_with(vec![
            "helm-dowser".to_string(),
            "-f".to_string(),
            dir.path().join("missing.yaml").to_string_lossy().into_owned(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_USAGE);
        assert!(stderr.contains("cannot read values file"));
    }

    #[test]
    fn extra_values_files_define_keys() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\n", "v: {{ .Values.a }}{{ .Values.b }}\n");
        fs::write(dir.path().join("override.yaml"), "b: 2\n").unwrap();
        let (code, _, _) = run_with(vec![
            "helm-dowser".to_string(),
            "-f".to_string(),
            dir.path().join("override.yaml").to_string_lossy().into_owned(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_OK);
    }

    #[test]
    fn broken_chart_exits_one_but_others_still_analyze() {
        let good = tempdir().unwrap();
        write_chart(good.path(), "a: 1\n", "v: {{ .Values.a }}\n");
        let bad = tempdir().unwrap();
        // A directory without Chart.yaml fails to load.
        let (code, stdout, stderr) = run_with(vec![
            "helm-dowser".to_string(),
            bad.path().to_string_lossy().into_owned(),
            good.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_FINDINGS);
        assert!(stderr.contains("no Chart.yaml"));
        assert!(stdout.contains("0 Unused  0 Undefined"));
    }

    #[test]
    fn duplicate_roots_are_analyzed_once() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\n", "v: {{ .Values.a }}\n");
        let root = dir.path().to_string_lossy().into_owned();
        let file_inside = dir.path().join("values.yaml").to_string_lossy().into_owned();
        let (_, stdout, _) = run_with(vec!["helm-dowser".to_string(), root, file_inside]);
        assert!(stdout.contains("across 1 chart(s)"));
    }

    #[test]
    fn json_output_is_valid() {
        let dir = tempdir().unwrap();
        write_chart(dir.path(), "a: 1\nextra: 2\n", "v: {{ .Values.a }}\n");
        let (code, stdout, _) = run_with(vec![
            "helm-dowser".to_string(),
            "--json".to_string(),
            "--referenced".to_string(),
            dir.path().to_string_lossy().into_owned(),
        ]);
        assert_eq!(code, EXIT_FINDINGS);
        let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(value[0]["chart"], "demo");
        assert_eq!(value[0]["unused"][0]["id"], ".extra");
        assert_eq!(value[0]["referenced"][0]["id"], ".a");
    }
}
