//! Parser for user-supplied dot-notation path patterns.

use super::{Kind, Path};

use std::error::Error;
use std::fmt;

/// Reasons a pattern fails to parse. All variants are user-facing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PatternError {
    Empty,
    TrailingDot,
    EmptySegment(usize),
    SlashNotation(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PatternError::Empty => write!(f, "empty pattern"),
            PatternError::TrailingDot => write!(f, "pattern must not have trailing dot"),
            PatternError::EmptySegment(i) => write!(f, "empty segment at position {}", i),
            PatternError::SlashNotation(pattern) => write!(
                f,
                "use dot notation (e.g. .image.tag), not slash notation ({})",
                pattern
            ),
        }
    }
}

impl Error for PatternError {}

/// Parses a dot-notation pattern into a [`Path`].
///
/// Syntax:
///   - Optional leading dot (matches the `id()` output for easy copy-paste).
///   - Segments separated by unescaped dots; `~.` escapes a literal dot and
///     `~~` a literal tilde inside a segment.
///   - `*` segments become wildcards, non-negative integer segments become
///     `Any` (so `.items.0` matches both a list index and a map key), and
///     everything else is a key.
pub fn parse_path(pattern: &str) -> Result<Path, PatternError> {
    if pattern.is_empty() {
        return Err(PatternError::Empty);
    }
    if pattern.starts_with('/') {
        return Err(PatternError::SlashNotation(pattern.to_string()));
    }

    let stripped = pattern.strip_prefix('.').unwrap_or(pattern);
    if stripped.is_empty() {
        return Err(PatternError::Empty);
    }

    let segments = split_on_dots(stripped);
    let mut path = Path::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            if i == segments.len() - 1 {
                return Err(PatternError::TrailingDot);
            }
            return Err(PatternError::EmptySegment(i));
        }
        if segment == "*" {
            path.push_raw(segment.clone(), Kind::Wildcard);
        } else if is_integer(segment) {
            path.push_raw(segment.clone(), Kind::Any);
        } else {
            // Escape sequences were kept intact by the split, so the segment
            // is already in stored form.
            path.push_raw(segment.clone(), Kind::Key);
        }
    }
    Ok(path)
}

/// Splits on unescaped dots. A `~` consumes the following character, so `~.`
/// stays inside the current segment and `~~.` splits at the dot.
fn split_on_dots(s: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '~' {
            current.push(c);
            if let Some(next) = chars.next() {
                current.push(next);
            }
        } else if c == '.' {
            segments.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    segments.push(current);
    segments
}

/// True if `s` is a non-negative decimal integer.
fn is_integer(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) && s.parse::<u64>().is_ok()
}
