//! Kinded access paths into a values tree, and ordered collections of them.

mod context;
mod flatten;
mod join;
mod json;
mod parse;
mod paths;

pub use context::PathContext;
pub use flatten::{flatten_definitions, FlattenError};
pub use join::{equal_loose, merge_join_loose};
pub use parse::{parse_path, PatternError};
pub use paths::Paths;

use std::cmp::Ordering;
use std::fmt;

/// Role of one path segment.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Kind {
    /// Map key; the token is the literal key name.
    Key,
    /// Array index; the token is the decimal integer literal.
    Index,
    /// Statically-unknown key position; matches both `Key` and `Index`
    /// during reconciliation.
    Any,
    /// Matches any segment. A terminal wildcard additionally matches any
    /// number of trailing segments.
    Wildcard,
}

impl Kind {
    /// Single-character symbol used by [`Path::kinds_string`].
    pub fn symbol(self) -> char {
        match self {
            Kind::Key => 'K',
            Kind::Index => 'I',
            Kind::Any => 'A',
            Kind::Wildcard => 'W',
        }
    }
}

/// An ordered sequence of kinded segments identifying a location in a
/// hierarchical configuration tree.
///
/// Tokens are stored in escaped form (`~~` for a literal tilde, `~.` for a
/// literal dot), applied on insertion. The `with_*` constructors return a
/// fresh path and leave the receiver untouched.
///
/// Equality and ordering compare tokens and kinds only; [`PathContext`]s are
/// diagnostic metadata and do not participate.
#[derive(Clone, Debug, Default)]
pub struct Path {
    tokens: Vec<String>,
    kinds: Vec<Kind>,
    pub contexts: Vec<PathContext>,
}

fn escape(token: &str) -> String {
    token.replace('~', "~~").replace('.', "~.")
}

impl Path {
    /// The empty path, printed as `.`.
    pub fn new() -> Path {
        Path::default()
    }

    /// Builds a path of `Key` segments from the given tokens.
    pub fn from_keys<I, S>(keys: I) -> Path
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut p = Path::new();
        for key in keys {
            p.push(escape(key.as_ref()), Kind::Key);
        }
        p
    }

    fn push(&mut self, token: String, kind: Kind) {
        self.tokens.push(token);
        self.kinds.push(kind);
    }

    /// Returns a new path with a map-key segment appended.
    pub fn with_key(&self, key: &str) -> Path {
        let mut p = self.clone();
        p.push(escape(key), Kind::Key);
        p
    }

    /// Returns a new path with an array-index segment appended.
    pub fn with_idx(&self, idx: &str) -> Path {
        let mut p = self.clone();
        p.push(escape(idx), Kind::Index);
        p
    }

    /// Returns a new path with an unknown-kind segment appended.
    pub fn with_any(&self, token: &str) -> Path {
        let mut p = self.clone();
        p.push(escape(token), Kind::Any);
        p
    }

    /// Returns a new path with a wildcard segment appended.
    pub fn with_wildcard(&self) -> Path {
        let mut p = self.clone();
        p.push("*".to_string(), Kind::Wildcard);
        p
    }

    /// Appends an already-escaped segment. Used by the pattern parser, which
    /// keeps escape sequences intact while splitting.
    pub(crate) fn push_raw(&mut self, token: String, kind: Kind) {
        self.push(token, kind);
    }

    /// Returns a new path that is `self` followed by every segment of
    /// `suffix`. Contexts of both sides are carried over in order.
    pub fn join(&self, suffix: &Path) -> Path {
        let mut p = self.clone();
        p.tokens.extend(suffix.tokens.iter().cloned());
        p.kinds.extend(suffix.kinds.iter().cloned());
        p.contexts.extend(suffix.contexts.iter().cloned());
        p
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub(crate) fn token(&self, i: usize) -> &str {
        &self.tokens[i]
    }

    pub(crate) fn kind(&self, i: usize) -> Kind {
        self.kinds[i]
    }

    pub(crate) fn ends_with_wildcard(&self) -> bool {
        self.kinds.last() == Some(&Kind::Wildcard)
    }

    /// Stable dot-notation representation, e.g. `.config.items.0.name`.
    /// The empty path is `.`.
    ///
    /// Does not distinguish segment kinds; comparing those requires
    /// [`Path::kinds_string`].
    pub fn id(&self) -> String {
        let mut out = String::with_capacity(self.tokens.iter().map(|t| t.len() + 1).sum::<usize>() + 1);
        out.push('.');
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(token);
        }
        out
    }

    /// Slash-prefixed segment kind symbols, e.g. `/K/K/I/K`. Empty for the
    /// empty path.
    pub fn kinds_string(&self) -> String {
        let mut out = String::with_capacity(self.kinds.len() * 2);
        for kind in &self.kinds {
            out.push('/');
            out.push(kind.symbol());
        }
        out
    }

    /// Total order: lexicographic over tokens, then over kinds.
    pub fn compare(&self, other: &Path) -> Ordering {
        self.tokens
            .cmp(&other.tokens)
            .then_with(|| self.kinds.cmp(&other.kinds))
    }

    /// Returns the path with one more context attached.
    pub fn with_context(mut self, ctx: PathContext) -> Path {
        self.contexts.push(ctx);
        self
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Path) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Path {}

impl PartialOrd for Path {
    fn partial_cmp(&self, other: &Path) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for Path {
    fn cmp(&self, other: &Path) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.id())
    }
}
