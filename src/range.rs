//! Live ranges: half-open `[from, to)` spans of instruction ids, and the
//! sorted, non-overlapping lists of them that make up an interval's
//! liveness.

use crate::ids::OpId;
use smallvec::SmallVec;
use std::fmt;

/// A half-open span `[from, to)` over instruction ids, during which some
/// interval is live.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Range {
    pub from: OpId,
    pub to: OpId,
}

impl Range {
    pub fn new(from: OpId, to: OpId) -> Self {
        debug_assert!(from < to, "empty or inverted range [{:?}, {:?})", from, to);
        Range { from, to }
    }

    pub fn contains(&self, pos: OpId) -> bool {
        self.from <= pos && pos < self.to
    }

    pub fn intersects(&self, other: &Range) -> bool {
        self.from < other.to && other.from < self.to
    }

    /// The first instruction id at which `self` and `other` overlap, if any.
    pub fn first_intersection(&self, other: &Range) -> Option<OpId> {
        if self.intersects(other) {
            Some(if self.from > other.from { self.from } else { other.from })
        } else {
            None
        }
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "[{:?}, {:?})", self.from, self.to)
    }
}

/// Most intervals span only a handful of disjoint ranges, so keep the first
/// few inline.
pub type RangeList = SmallVec<[Range; 2]>;

/// Extends `ranges` (kept sorted ascending by `from`, disjoint, built up
/// while scanning the trace backwards so pushes tend to land at the front)
/// by either merging `r` into the first (i.e. earliest-built-so-far, which
/// after the final reverse is actually the *last* logical range) entry or
/// inserting it as a new one. Call sites push ranges in descending-`from`
/// order during lifetime analysis and `finish_ranges` reverses once at the
/// end, so this only ever needs to look at the front.
pub fn push_range_descending(ranges: &mut RangeList, r: Range) {
    if let Some(front) = ranges.first_mut() {
        if r.to == front.from {
            // Contiguous with the range we're currently building; merge.
            front.from = r.from;
            return;
        }
        debug_assert!(r.to <= front.from, "ranges pushed out of descending order");
    }
    ranges.insert(0, r);
}

/// Finalizes a `RangeList` built via `push_range_descending`: currently the
/// ranges already sit in ascending order (insertion always happens at the
/// front), so this merely asserts the invariants expected of a finished
/// interval's range list.
pub fn finish_ranges(ranges: &RangeList) {
    for w in ranges.windows(2) {
        debug_assert!(w[0].to < w[1].from, "finished range list has adjacent/overlapping ranges");
    }
}

pub fn ranges_from(ranges: &RangeList) -> OpId {
    ranges.first().expect("interval has no ranges").from
}

pub fn ranges_to(ranges: &RangeList) -> OpId {
    ranges.last().expect("interval has no ranges").to
}

pub fn ranges_cover(ranges: &RangeList, pos: OpId) -> bool {
    ranges.iter().any(|r| r.contains(pos))
}

/// Two-pointer merge over two sorted, disjoint range lists, returning the
/// earliest point at which they overlap.
pub fn first_intersection(a: &RangeList, b: &RangeList) -> Option<OpId> {
    let mut i = 0;
    let mut j = 0;
    while i < a.len() && j < b.len() {
        if let Some(pos) = a[i].first_intersection(&b[j]) {
            return Some(pos);
        }
        if a[i].from < b[j].from {
            i += 1;
        } else {
            j += 1;
        }
    }
    None
}

/// The earliest intersection of `a` with `b` that is not before `from`.
pub fn next_intersection_from(a: &RangeList, b: &RangeList, from: OpId) -> Option<OpId> {
    let mut best: Option<OpId> = None;
    for ra in a {
        if ra.to <= from {
            continue;
        }
        for rb in b {
            if rb.to <= from {
                continue;
            }
            if let Some(pos) = ra.first_intersection(rb) {
                if pos >= from && best.map_or(true, |b| pos < b) {
                    best = Some(pos);
                }
            }
        }
    }
    best
}
