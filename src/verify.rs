//! Verifier (C9): post-allocation invariant checks, run only under
//! `Options::detailed_asserts` since they are O(n^2) over intervals in the
//! naive form used here.

use crate::error::RegAllocError;
use crate::interval::{IntervalStore, Location};

/// Checks every invariant from the data model against a finished
/// allocation. Returns the first violation found, if any.
pub fn verify(store: &IntervalStore) -> Result<(), RegAllocError> {
    check_scaffold_sorted(store)?;
    check_locations_assigned(store)?;
    check_no_register_overlap(store)?;
    check_no_fixed_overlap(store)?;
    check_safepoints(store)?;
    Ok(())
}

/// The root list plus every split child created during allocation, merged
/// by `from()` (§4.4's "merge a freshly-sorted tail with the existing
/// prefix" step), must come out non-decreasing — a cheap structural check
/// that the walk never created an out-of-order split.
fn check_scaffold_sorted(store: &IntervalStore) -> Result<(), RegAllocError> {
    let roots = crate::scaffold::sorted_by_from(store);
    let merged = crate::scaffold::merge_split_children(store, &roots);
    for w in merged.windows(2) {
        if store.interval(w[0]).from() > store.interval(w[1]).from() {
            return Err(RegAllocError::VerificationFailed {
                reason: format!(
                    "scaffold order violated: {:?} (from {:?}) before {:?} (from {:?})",
                    w[0],
                    store.interval(w[0]).from(),
                    w[1],
                    store.interval(w[1]).from()
                ),
            });
        }
    }
    Ok(())
}

fn check_locations_assigned(store: &IntervalStore) -> Result<(), RegAllocError> {
    for iv in store.all_intervals() {
        if iv.ranges.is_empty() {
            return Err(RegAllocError::VerificationFailed {
                reason: format!("{:?} has no live ranges", iv.id),
            });
        }
        if iv.location == Location::Unassigned {
            return Err(RegAllocError::VerificationFailed {
                reason: format!("{:?} was never assigned a location", iv.id),
            });
        }
    }
    Ok(())
}

/// No two intervals sharing a physical register may have intersecting
/// range lists.
fn check_no_register_overlap(store: &IntervalStore) -> Result<(), RegAllocError> {
    let registered: Vec<_> = store.all_intervals().filter(|iv| iv.location.is_register()).collect();

    for i in 0..registered.len() {
        for j in (i + 1)..registered.len() {
            let a = registered[i];
            let b = registered[j];
            if a.location != b.location {
                continue;
            }
            if a.next_intersection(b).is_some() {
                return Err(RegAllocError::VerificationFailed {
                    reason: format!("{:?} and {:?} share {:?} while live", a.id, b.id, a.location),
                });
            }
        }
    }
    Ok(())
}

fn check_no_fixed_overlap(store: &IntervalStore) -> Result<(), RegAllocError> {
    for fixed in store.fixed_intervals() {
        for iv in store.all_intervals() {
            let reg = match iv.location.as_register() {
                Some(r) => r,
                None => continue,
            };
            if reg != fixed.reg {
                continue;
            }
            if iv.next_intersection_with_fixed(fixed, iv.from()).is_some() {
                return Err(RegAllocError::VerificationFailed {
                    reason: format!("{:?} intersects fixed interval for {:?}", iv.id, fixed.reg),
                });
            }
        }
    }
    Ok(())
}

/// At every safepoint an interval recorded, if it still holds a register at
/// that point, the safepoint instruction must name it directly — otherwise
/// a GC occurring there would not see the live reference as a root.
fn check_safepoints(store: &IntervalStore) -> Result<(), RegAllocError> {
    for iv in store.all_intervals() {
        if iv.reg_class != crate::reg::RegClass::Ref {
            continue;
        }
        if !iv.location.is_register() {
            continue;
        }
        for &(op_id, directly_named) in iv.safepoints.iter() {
            if !directly_named {
                return Err(RegAllocError::VerificationFailed {
                    reason: format!(
                        "{:?} holds a live reference in a register at safepoint {:?} without being named",
                        iv.id, op_id
                    ),
                });
            }
        }
    }
    Ok(())
}
