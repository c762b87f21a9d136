use super::context::dedup_contexts;
use super::Path;

use std::cmp::Ordering;
use std::iter::FromIterator;

/// An ordered collection of paths. Insertion order is kept until
/// [`Paths::sort_dedup`] imposes the total order from [`Path::compare`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Paths {
    items: Vec<Path>,
}

impl Paths {
    pub fn new() -> Paths {
        Paths::default()
    }

    pub fn push(&mut self, path: Path) {
        self.items.push(path);
    }

    pub fn extend(&mut self, other: Paths) {
        self.items.extend(other.items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Path> {
        self.items.iter()
    }

    pub fn get(&self, i: usize) -> Option<&Path> {
        self.items.get(i)
    }

    /// Sorts by [`Path::compare`], merges exact duplicates (concatenating
    /// their contexts), lets a terminal-wildcard path absorb its one-shorter
    /// sibling (appending the sibling's contexts), and finally deduplicates
    /// the contexts on each surviving path.
    pub fn sort_dedup(self) -> Paths {
        let mut items = self.items;
        items.sort_by(Path::compare);

        let mut merged: Vec<Path> = Vec::with_capacity(items.len());
        for path in items {
            match merged.last_mut() {
                Some(last) if last.compare(&path) == Ordering::Equal => {
                    last.contexts.extend(path.contexts);
                }
                _ => merged.push(path),
            }
        }

        // Terminal-wildcard subsumption: /a/* absorbs /a.
        let mut absorbed: Vec<(usize, usize)> = Vec::new();
        for i in 0..merged.len() {
            for j in 0..merged.len() {
                if i != j && subsumes(&merged[j], &merged[i]) {
                    absorbed.push((i, j));
                    break;
                }
            }
        }
        for &(from, to) in &absorbed {
            let contexts = merged[from].contexts.clone();
            merged[to].contexts.extend(contexts);
        }
        let dropped: Vec<usize> = absorbed.iter().map(|&(from, _)| from).collect();
        let mut out: Vec<Path> = merged
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !dropped.contains(i))
            .map(|(_, p)| p)
            .collect();

        for path in &mut out {
            dedup_contexts(&mut path.contexts);
        }
        Paths { items: out }
    }
}

/// True if `a` subsumes `b`: `a` carries a terminal wildcard and `b` is
/// exactly `a` without it.
fn subsumes(a: &Path, b: &Path) -> bool {
    if a.is_empty() || !a.ends_with_wildcard() {
        return false;
    }
    if b.len() != a.len() - 1 {
        return false;
    }
    (0..b.len()).all(|i| a.token(i) == b.token(i) && a.kind(i) == b.kind(i))
}

impl From<Vec<Path>> for Paths {
    fn from(items: Vec<Path>) -> Paths {
        Paths { items }
    }
}

impl FromIterator<Path> for Paths {
    fn from_iter<I: IntoIterator<Item = Path>>(iter: I) -> Paths {
        Paths {
            items: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Paths {
    type Item = Path;
    type IntoIter = std::vec::IntoIter<Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Paths {
    type Item = &'a Path;
    type IntoIter = std::slice::Iter<'a, Path>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
