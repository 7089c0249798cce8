use crate::{
    encseq::EncodedSequence,
    types::{is_special, Comparison, FromUsize, Int, Readmode},
};
use rayon::prelude::*;
use std::{cmp::Ordering, fmt, panic::Location};

// --------------------------------------------------
/// Compare the suffixes at `pos1` and `pos2`, assuming their first
/// `offset` symbols are already known to match.
///
/// A `max_depth` of 0 compares up to the end of the sequence. Specials
/// sort after every regular symbol; two specials compare equal when
/// `specials_equal` is set (or at depth 0 with `specials_equal_at_depth0`),
/// otherwise they are ordered by position.
#[allow(clippy::too_many_arguments)]
#[inline(always)]
pub fn compare_suffixes_from<S: EncodedSequence + ?Sized>(
    encseq: &S,
    readmode: Readmode,
    pos1: usize,
    pos2: usize,
    offset: usize,
    max_depth: usize,
    specials_equal: bool,
    specials_equal_at_depth0: bool,
) -> Comparison {
    let mut depth = offset;
    loop {
        if max_depth > 0 && depth >= max_depth {
            return Comparison {
                cmp: Ordering::Equal,
                lcp: max_depth,
            };
        }
        let c1 = encseq.char_or_end(pos1 + depth, readmode);
        let c2 = encseq.char_or_end(pos2 + depth, readmode);
        let cmp = match (is_special(c1), is_special(c2)) {
            (true, true) => {
                if specials_equal || (depth == 0 && specials_equal_at_depth0) {
                    Ordering::Equal
                } else {
                    pos1.cmp(&pos2)
                }
            }
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                if c1 == c2 {
                    depth += 1;
                    continue;
                }
                c1.cmp(&c2)
            }
        };
        return Comparison { cmp, lcp: depth };
    }
}

// --------------------------------------------------
pub fn compare_suffixes<S: EncodedSequence + ?Sized>(
    encseq: &S,
    readmode: Readmode,
    pos1: usize,
    pos2: usize,
    max_depth: usize,
    specials_equal: bool,
    specials_equal_at_depth0: bool,
) -> Comparison {
    compare_suffixes_from(
        encseq,
        readmode,
        pos1,
        pos2,
        0,
        max_depth,
        specials_equal,
        specials_equal_at_depth0,
    )
}

// --------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderViolation {
    Unordered {
        rank: usize,
        pos1: usize,
        pos2: usize,
        comparison: Comparison,
    },
    PrefixMismatch {
        rank: usize,
        pos1: usize,
        pos2: usize,
        lcp: usize,
        expected: usize,
    },
    MissingTerminal {
        last: usize,
        total_length: usize,
    },
}

impl fmt::Display for OrderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderViolation::Unordered {
                rank,
                pos1,
                pos2,
                comparison,
            } => write!(
                f,
                "ranks {}/{rank}: suffix {pos1} {} suffix {pos2} (lcp {})",
                rank - 1,
                match comparison.cmp {
                    Ordering::Greater => ">",
                    Ordering::Equal => "==",
                    Ordering::Less => "<",
                },
                comparison.lcp
            ),
            OrderViolation::PrefixMismatch {
                rank,
                pos1,
                pos2,
                lcp,
                expected,
            } => write!(
                f,
                "ranks {}/{rank}: suffixes {pos1} and {pos2} share {lcp} \
                symbols, expected {expected}",
                rank - 1
            ),
            OrderViolation::MissingTerminal { last, total_length } => write!(
                f,
                "last suffix is {last}, expected the terminal suffix {total_length}"
            ),
        }
    }
}

// --------------------------------------------------
fn unordered_pair<S, T>(
    encseq: &S,
    readmode: Readmode,
    rank: usize,
    pair: &[T],
    max_depth: usize,
    specials_equal: bool,
    specials_equal_at_depth0: bool,
) -> Option<OrderViolation>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    let (pos1, pos2) = (pair[0].to_usize(), pair[1].to_usize());
    let comparison = compare_suffixes(
        encseq,
        readmode,
        pos1,
        pos2,
        max_depth,
        specials_equal,
        specials_equal_at_depth0,
    );
    (comparison.cmp == Ordering::Greater).then_some(OrderViolation::Unordered {
        rank,
        pos1,
        pos2,
        comparison,
    })
}

// --------------------------------------------------
/// First adjacent pair out of order. When `suffixes` holds every suffix,
/// the last one must also be the terminal suffix.
pub fn find_order_violation<S, T>(
    encseq: &S,
    readmode: Readmode,
    suffixes: &[T],
    max_depth: usize,
    specials_equal: bool,
    specials_equal_at_depth0: bool,
) -> Option<OrderViolation>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    suffixes
        .windows(2)
        .enumerate()
        .find_map(|(i, pair)| {
            unordered_pair(
                encseq,
                readmode,
                i + 1,
                pair,
                max_depth,
                specials_equal,
                specials_equal_at_depth0,
            )
        })
        .or_else(|| missing_terminal(encseq, suffixes))
}

// --------------------------------------------------
/// Every violation in `suffixes`, in rank order
pub fn order_violations<S, T>(
    encseq: &S,
    readmode: Readmode,
    suffixes: &[T],
    max_depth: usize,
) -> Vec<OrderViolation>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    let mut violations: Vec<_> = suffixes
        .par_windows(2)
        .enumerate()
        .filter_map(|(i, pair)| {
            unordered_pair(encseq, readmode, i + 1, pair, max_depth, false, false)
        })
        .collect();
    violations.extend(missing_terminal(encseq, suffixes));
    violations
}

// --------------------------------------------------
fn missing_terminal<S, T>(encseq: &S, suffixes: &[T]) -> Option<OrderViolation>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    let total_length = encseq.total_length();
    match suffixes.last() {
        Some(last)
            if suffixes.len() == total_length + 1 && last.to_usize() != total_length =>
        {
            Some(OrderViolation::MissingTerminal {
                last: last.to_usize(),
                total_length,
            })
        }
        _ => None,
    }
}

// --------------------------------------------------
/// Adjacent suffixes that do not share exactly `prefix_length` symbols
pub fn find_prefix_mismatch<S, T>(
    encseq: &S,
    readmode: Readmode,
    suffixes: &[T],
    prefix_length: usize,
) -> Option<OrderViolation>
where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    suffixes.windows(2).enumerate().find_map(|(i, pair)| {
        let (pos1, pos2) = (pair[0].to_usize(), pair[1].to_usize());
        let comparison =
            compare_suffixes(encseq, readmode, pos1, pos2, prefix_length, false, false);
        (comparison.cmp != Ordering::Equal || comparison.lcp != prefix_length).then_some(
            OrderViolation::PrefixMismatch {
                rank: i + 1,
                pos1,
                pos2,
                lcp: comparison.lcp,
                expected: prefix_length,
            },
        )
    })
}

// --------------------------------------------------
/// Panic, naming the caller's location, if `suffixes` is not sorted.
///
/// This is a test/debug oracle; production construction never calls it
/// unless the strategy asks for sorted-order checks.
#[track_caller]
pub fn check_sorted_suffixes<S, T>(
    encseq: &S,
    readmode: Readmode,
    suffixes: &[T],
    max_depth: usize,
    specials_equal: bool,
    specials_equal_at_depth0: bool,
) where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    assert!(
        !specials_equal || specials_equal_at_depth0,
        "specials equal at depth > 0 implies specials equal at depth 0"
    );
    if let Some(violation) = find_order_violation(
        encseq,
        readmode,
        suffixes,
        max_depth,
        specials_equal,
        specials_equal_at_depth0,
    ) {
        let caller = Location::caller();
        panic!(
            "ERROR: file \"{}\", line {}: check_sorted_suffixes({}): {violation}",
            caller.file(),
            caller.line(),
            readmode
        );
    }
}

// --------------------------------------------------
#[track_caller]
pub fn check_prefixes_identical<S, T>(
    encseq: &S,
    readmode: Readmode,
    suffixes: &[T],
    prefix_length: usize,
) where
    S: EncodedSequence + ?Sized,
    T: Int + FromUsize<T> + Sized + Send + Sync + serde::ser::Serialize,
{
    if let Some(violation) =
        find_prefix_mismatch(encseq, readmode, suffixes, prefix_length)
    {
        let caller = Location::caller();
        panic!(
            "ERROR: file \"{}\", line {}: check_prefixes_identical: {violation}",
            caller.file(),
            caller.line()
        );
    }
}
