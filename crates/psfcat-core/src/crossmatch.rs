use rayon::prelude::*;

use crate::catalog::Positioned;
use crate::consts::PARALLEL_MATCH_THRESHOLD;

/// One-to-one pairing of a row in catalog A with a row in catalog B.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchPair {
    pub a: usize,
    pub b: usize,
}

/// How a single A row resolved against catalog B.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Exactly one B row within tolerance.
    Unique(usize),
    /// More than one B row within tolerance; never resolved arbitrarily.
    Ambiguous(usize),
    Unmatched,
}

/// Resolve every A row against B. A B row is a candidate when it differs
/// from the A row by strictly less than `tolerance` on both axes.
///
/// Results are in A order and do not depend on the order of B.
pub fn resolve_each<A, B>(a: &[A], b: &[B], tolerance: f64) -> Vec<Resolution>
where
    A: Positioned + Sync,
    B: Positioned + Sync,
{
    let resolve = |row: &A| resolve_one(row.position(), b, tolerance);
    if a.len() >= PARALLEL_MATCH_THRESHOLD {
        a.par_iter().map(resolve).collect()
    } else {
        a.iter().map(resolve).collect()
    }
}

/// Pair A rows with their unique B partner. Ambiguous and unmatched A rows
/// are dropped.
pub fn cross_match<A, B>(a: &[A], b: &[B], tolerance: f64) -> Vec<MatchPair>
where
    A: Positioned + Sync,
    B: Positioned + Sync,
{
    resolve_each(a, b, tolerance)
        .into_iter()
        .enumerate()
        .filter_map(|(ia, res)| match res {
            Resolution::Unique(ib) => Some(MatchPair { a: ia, b: ib }),
            _ => None,
        })
        .collect()
}

fn resolve_one<B: Positioned>((x, y): (f64, f64), b: &[B], tolerance: f64) -> Resolution {
    let mut found = None;
    let mut count = 0usize;
    for (i, row) in b.iter().enumerate() {
        let (bx, by) = row.position();
        if (bx - x).abs() < tolerance && (by - y).abs() < tolerance {
            count += 1;
            found.get_or_insert(i);
        }
    }
    match (count, found) {
        (1, Some(i)) => Resolution::Unique(i),
        (0, _) => Resolution::Unmatched,
        (n, _) => Resolution::Ambiguous(n),
    }
}
