//! Report writers: the colored text report and the JSON report.

use dowser::path::Paths;
use dowser::AnalysisResult;

use std::io::{self, Write};

use colored::Colorize;
use console::Term;
use helm_dowser_serde::ChartReport;

fn terminal_width() -> usize {
    let term = Term::stdout();
    if term.is_term() {
        let (_, cols) = term.size();
        if cols > 0 {
            return cols as usize;
        }
    }
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&w| w > 0)
        .unwrap_or(80)
}

/// A centered, padded header like `===== text =====`.
fn header(text: &str, fill: char) -> String {
    let label = format!(" {} ", text);
    let width = terminal_width();
    if width < label.len() + 2 {
        return format!("{}{}{}", fill, label, fill);
    }
    let padding = width - label.len();
    let left = padding / 2;
    let right = padding - left;
    format!(
        "{}{}{}",
        fill.to_string().repeat(left),
        label,
        fill.to_string().repeat(right)
    )
}

/// Writes the per-chart sections followed by the summary.
pub fn write_text(w: &mut dyn Write, results: &[AnalysisResult]) -> io::Result<()> {
    for result in results {
        write_chart(w, result)?;
    }
    write_summary(w, results)
}

fn write_chart(w: &mut dyn Write, result: &AnalysisResult) -> io::Result<()> {
    writeln!(w, "{}", header(&result.chart_name, '=').bold())?;
    writeln!(w)?;
    if !result.unused.is_empty() {
        writeln!(w, "{}", header("Unused", '-').bold())?;
        write_paths(w, &result.unused)?;
    }
    if !result.undefined.is_empty() {
        writeln!(w, "{}", header("Undefined", '-').bold())?;
        write_paths(w, &result.undefined)?;
    }
    writeln!(w)
}

/// One row per path, aligned on the path column; extra source locations go
/// on continuation rows.
fn write_paths(w: &mut dyn Write, paths: &Paths) -> io::Result<()> {
    let width = paths.iter().map(|p| p.id().len()).max().unwrap_or(0);
    for path in paths {
        let id = path.id();
        match path.contexts.first() {
            None => writeln!(w, "{}", id.red())?,
            Some(first) => {
                writeln!(
                    w,
                    "{}{}  {}",
                    id.red(),
                    " ".repeat(width - id.len()),
                    first.to_string().dimmed()
                )?;
                for ctx in &path.contexts[1..] {
                    writeln!(w, "{}  {}", " ".repeat(width), ctx.to_string().dimmed())?;
                }
            }
        }
    }
    Ok(())
}

fn write_summary(w: &mut dyn Write, results: &[AnalysisResult]) -> io::Result<()> {
    writeln!(w, "{}", header("Summary", '=').bold())?;
    writeln!(w)?;
    let name_width = results
        .iter()
        .map(|r| r.chart_name.len())
        .chain(std::iter::once("Total".len()))
        .max()
        .unwrap_or(0);
    let mut total_unused = 0;
    let mut total_undefined = 0;
    for result in results {
        total_unused += result.unused.len();
        total_undefined += result.undefined.len();
        writeln!(
            w,
            "{:<name_w$}  {} Unused  {} Undefined",
            result.chart_name,
            result.unused.len(),
            result.undefined.len(),
            name_w = name_width
        )?;
    }
    writeln!(
        w,
        "{:<name_w$}  {} Unused  {} Undefined  across {} chart(s)",
        "Total",
        total_unused,
        total_undefined,
        results.len(),
        name_w = name_width
    )
}

/// One report object per chart, sorted and deduplicated.
pub fn write_json(
    w: &mut dyn Write,
    results: &[AnalysisResult],
    include_referenced: bool,
) -> io::Result<()> {
    let reports: Vec<ChartReport> = results
        .iter()
        .map(|r| r.to_report(include_referenced))
        .collect();
    serde_json::to_writer_pretty(&mut *w, &reports)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(w)
}
