//! Loose path equality and the merge-join used by the reconciler and the
//! ignore filter.

use super::{Kind, Path, Paths};

fn has_terminal_wildcard(p: &Path) -> bool {
    !p.is_empty() && p.kind(p.len() - 1) == Kind::Wildcard
}

/// Number of positions to compare between two paths, or `None` when the
/// lengths are incompatible.
///
/// A terminal wildcard stands for any number of trailing segments, so the
/// wildcard side only constrains its prefix; without one, effective lengths
/// must match exactly.
fn compare_len_loose(a: &Path, b: &Path) -> Option<usize> {
    let a_terminal = has_terminal_wildcard(a);
    let b_terminal = has_terminal_wildcard(b);
    let a_effective = if a_terminal { a.len() - 1 } else { a.len() };
    let b_effective = if b_terminal { b.len() - 1 } else { b.len() };

    if a_terminal && b_terminal {
        Some(a_effective.min(b_effective))
    } else if a_terminal {
        if b_effective < a_effective {
            None
        } else {
            Some(a_effective)
        }
    } else if b_terminal {
        if a_effective < b_effective {
            None
        } else {
            Some(b_effective)
        }
    } else if a_effective != b_effective {
        None
    } else {
        Some(a_effective)
    }
}

fn kinds_match_loose(ka: Kind, kb: Kind) -> bool {
    ka == kb || ka == Kind::Any || kb == Kind::Any
}

/// Loose equality: exact tokens with `Any` matching either concrete kind,
/// interior wildcards matching exactly one segment, and a terminal wildcard
/// matching any suffix.
pub fn equal_loose(a: &Path, b: &Path) -> bool {
    let compare_len = match compare_len_loose(a, b) {
        Some(n) => n,
        None => return false,
    };
    for i in 0..compare_len {
        if a.kind(i) == Kind::Wildcard || b.kind(i) == Kind::Wildcard {
            continue;
        }
        if a.token(i) != b.token(i) {
            return false;
        }
        if !kinds_match_loose(a.kind(i), b.kind(i)) {
            return false;
        }
    }
    true
}

/// Outer join of two path sets under loose equality.
///
/// Matching is many-to-many: one `a`-path can consume several `b`-paths (an
/// `Any` segment matches both an `Index` and a `Key` sibling) and vice
/// versa. Matched `a`-paths land in the intersection with their `b`-matches'
/// contexts merged in; unmatched paths land in the respective "only" set.
///
/// O(n*m), which is fine for per-chart path counts.
pub fn merge_join_loose(a: Paths, b: Paths) -> (Paths, Paths, Paths) {
    let a = a.sort_dedup();
    let b = b.sort_dedup();

    let b_paths: Vec<Path> = b.into_iter().collect();
    let mut b_matched = vec![false; b_paths.len()];

    let mut intersection = Paths::new();
    let mut only_a = Paths::new();
    for mut pa in a {
        let mut matched = false;
        for (j, pb) in b_paths.iter().enumerate() {
            if equal_loose(&pa, pb) {
                b_matched[j] = true;
                matched = true;
                pa.contexts.extend(pb.contexts.iter().cloned());
            }
        }
        if matched {
            intersection.push(pa);
        } else {
            only_a.push(pa);
        }
    }

    let mut only_b = Paths::new();
    for (j, pb) in b_paths.into_iter().enumerate() {
        if !b_matched[j] {
            only_b.push(pb);
        }
    }

    (intersection, only_a, only_b)
}

#[cfg(test)]
mod join_tests {
    use super::*;
    use rstest::*;

    fn np() -> Path {
        Path::new()
    }

    fn ids(paths: &Paths) -> Vec<String> {
        paths.iter().map(Path::id).collect()
    }

    #[rstest(
        a,
        b,
        expected,
        case(np().with_key("a"), np().with_key("a"), true),
        case(np().with_key("a"), np().with_key("b"), false),
        case(np().with_key("a"), np().with_key("a").with_key("b"), false),
        // Any matches both concrete kinds.
        case(np().with_key("items").with_any("0"), np().with_key("items").with_idx("0"), true),
        case(np().with_key("items").with_any("0"), np().with_key("items").with_key("0"), true),
        case(np().with_key("items").with_idx("0"), np().with_key("items").with_key("0"), false),
        // Terminal wildcard matches direct children and deep descendants.
        case(np().with_key("a").with_wildcard(), np().with_key("a").with_key("b"), true),
        case(np().with_key("config").with_wildcard(), np().with_key("config").with_key("nested").with_key("value"), true),
        case(np().with_key("a").with_wildcard(), np().with_key("b").with_key("c"), false),
        // ... but not a shorter path.
        case(np().with_key("a").with_key("b").with_wildcard(), np().with_key("a"), false),
        // Interior wildcard matches exactly one segment.
        case(np().with_key("a").with_wildcard().with_key("c"), np().with_key("a").with_key("b").with_key("c"), true),
        case(np().with_key("a").with_wildcard().with_key("c"), np().with_key("a").with_key("b").with_key("d").with_key("c"), false),
        // Interior and terminal wildcards combined.
        case(np().with_key("a").with_wildcard().with_key("c").with_wildcard(), np().with_key("a").with_key("b").with_key("c").with_key("d"), true),
        case(np().with_key("a").with_wildcard().with_key("c").with_wildcard(), np().with_key("a").with_key("b").with_key("c").with_key("d").with_key("e"), true),
        case(np().with_key("a").with_wildcard().with_wildcard().with_key("d"), np().with_key("a").with_key("b").with_key("c").with_key("d"), true),
        case(np().with_key("a").with_wildcard().with_wildcard().with_key("d"), np().with_key("a").with_key("b").with_key("d"), false),
        // Root-level wildcards.
        case(np().with_wildcard(), np().with_key("a").with_key("b"), true),
        case(np().with_wildcard().with_key("b"), np().with_key("a").with_key("b"), true),
        // Both sides wildcard-terminated.
        case(np().with_key("a").with_wildcard(), np().with_key("a").with_key("b").with_wildcard(), true)
    )]
    fn equal_loose_cases(a: Path, b: Path, expected: bool) {
        assert_eq!(equal_loose(&a, &b), expected);
        assert_eq!(equal_loose(&b, &a), expected, "loose equality must be symmetric");
    }

    #[test]
    fn equal_loose_is_reflexive() {
        for p in &[
            np(),
            np().with_key("a"),
            np().with_key("a").with_any("0"),
            np().with_key("a").with_wildcard(),
        ] {
            assert!(equal_loose(p, p));
        }
    }

    #[test]
    fn join_splits_into_three_sets() {
        let a = Paths::from(vec![np().with_key("a"), np().with_key("b")]);
        let b = Paths::from(vec![np().with_key("a"), np().with_key("c")]);
        let (inter, only_a, only_b) = merge_join_loose(a, b);
        assert_eq!(ids(&inter), vec![".a"]);
        assert_eq!(ids(&only_a), vec![".b"]);
        assert_eq!(ids(&only_b), vec![".c"]);
    }

    #[test]
    fn join_is_many_to_many() {
        // One Any-kinded usage consumes both the index and the key sibling.
        let a = Paths::from(vec![
            np().with_key("items").with_idx("0"),
            np().with_key("items").with_key("0"),
        ]);
        let b = Paths::from(vec![np().with_key("items").with_any("0")]);
        let (inter, only_a, only_b) = merge_join_loose(a, b);
        assert_eq!(inter.len(), 2);
        assert!(only_a.is_empty());
        assert!(only_b.is_empty());
    }

    #[test]
    fn join_merges_matching_contexts_into_the_intersection() {
        use crate::path::PathContext;
        let a = Paths::from(vec![
            np().with_key("a").with_context(PathContext::new("values.yaml", 1, 1))
        ]);
        let b = Paths::from(vec![
            np().with_key("a").with_context(PathContext::new("templates/cm.yaml", 3, 4))
        ]);
        let (inter, _, _) = merge_join_loose(a, b);
        assert_eq!(
            inter.get(0).unwrap().contexts,
            vec![
                PathContext::new("values.yaml", 1, 1),
                PathContext::new("templates/cm.yaml", 3, 4),
            ]
        );
    }

    #[test]
    fn join_partitions_each_input() {
        let a = Paths::from(vec![np().with_key("a").with_wildcard(), np().with_key("x")]);
        let b = Paths::from(vec![
            np().with_key("a").with_key("b"),
            np().with_key("a").with_key("c").with_key("d"),
            np().with_key("y"),
        ]);
        let (inter, only_a, only_b) = merge_join_loose(a.clone(), b.clone());

        let mut from_a = inter.clone();
        from_a.extend(only_a);
        assert_eq!(from_a.sort_dedup(), a.sort_dedup());

        // Both matched b-paths were consumed by the wildcard; y remains.
        assert_eq!(ids(&inter), vec![".a.*"]);
        assert_eq!(ids(&only_b), vec![".y"]);
    }
}
