//! Sort & walk scaffolding (C3): keeps root intervals ordered by `from()`
//! and maintains the three linked lists (`unhandled`, `active`, `inactive`)
//! the main allocation walk steps through.

use crate::ids::IntervalId;
use crate::interval::IntervalStore;
use smallvec::SmallVec;

/// Produces `sortedByFrom`: the interval ids created by lifetime analysis
/// (already very nearly in `from()` order, since intervals are created in
/// definition order), cleaned up in one insertion-sort pass.
pub fn sorted_by_from(store: &IntervalStore) -> Vec<IntervalId> {
    let mut ids: Vec<IntervalId> =
        (0..store.first_derived_interval_index()).map(|i| IntervalId::new(i as u32)).collect();
    insertion_sort_by_from(store, &mut ids);
    ids
}

fn insertion_sort_by_from(store: &IntervalStore, ids: &mut [IntervalId]) {
    for i in 1..ids.len() {
        let mut j = i;
        while j > 0 && store.interval(ids[j - 1]).from() > store.interval(ids[j]).from() {
            ids.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// After the main walk has appended split children, merges the freshly
/// sorted tail (everything from `first_derived_interval_index()` on) back
/// into the existing sorted prefix in linear time.
pub fn merge_split_children(store: &IntervalStore, prefix: &[IntervalId]) -> Vec<IntervalId> {
    let mut tail: Vec<IntervalId> = (store.first_derived_interval_index()..store.intervals_size())
        .map(|i| IntervalId::new(i as u32))
        .collect();
    insertion_sort_by_from(store, &mut tail);

    let mut merged = Vec::with_capacity(prefix.len() + tail.len());
    let (mut i, mut j) = (0, 0);
    while i < prefix.len() && j < tail.len() {
        if store.interval(prefix[i]).from() <= store.interval(tail[j]).from() {
            merged.push(prefix[i]);
            i += 1;
        } else {
            merged.push(tail[j]);
            j += 1;
        }
    }
    merged.extend_from_slice(&prefix[i..]);
    merged.extend_from_slice(&tail[j..]);
    merged
}

/// The three lists the linear-scan walk (C4) steps through. `unhandled` is
/// consumed front-to-back in ascending `from()` order; `active` and
/// `inactive` are small (bounded by register count) so linear scans over
/// them are cheap and avoid needing a second index structure.
pub struct WalkLists {
    pub unhandled: std::collections::VecDeque<IntervalId>,
    pub active: SmallVec<[IntervalId; 16]>,
    pub inactive: SmallVec<[IntervalId; 16]>,
    pub handled: Vec<IntervalId>,
}

impl WalkLists {
    pub fn new(sorted: Vec<IntervalId>) -> Self {
        WalkLists {
            unhandled: sorted.into(),
            active: SmallVec::new(),
            inactive: SmallVec::new(),
            handled: Vec::new(),
        }
    }

    pub fn push_unhandled_sorted(&mut self, store: &IntervalStore, id: IntervalId) {
        let from = store.interval(id).from();
        let pos = self
            .unhandled
            .iter()
            .position(|&u| store.interval(u).from() > from)
            .unwrap_or(self.unhandled.len());
        self.unhandled.insert(pos, id);
    }

    pub fn remove_active(&mut self, id: IntervalId) {
        if let Some(pos) = self.active.iter().position(|&a| a == id) {
            self.active.swap_remove(pos);
        }
    }

    pub fn remove_inactive(&mut self, id: IntervalId) {
        if let Some(pos) = self.inactive.iter().position(|&a| a == id) {
            self.inactive.swap_remove(pos);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::VarIndex;
    use crate::range::Range;
    use crate::reg::RegClass;

    fn mk(store: &mut IntervalStore, var: u32, from: u32, to: u32) -> IntervalId {
        let id = store.get_or_create_interval(VarIndex::new(var), RegClass::I64);
        crate::interval::push_descending(
            &mut store.interval_mut(id).ranges,
            Range::new(crate::ids::OpId::new(from), crate::ids::OpId::new(to)),
        );
        id
    }

    #[test]
    fn sorted_by_from_handles_near_sorted_input() {
        let mut store = IntervalStore::new(0);
        // Created out of from()-order on purpose.
        mk(&mut store, 0, 4, 6);
        mk(&mut store, 1, 0, 2);
        mk(&mut store, 2, 2, 4);
        store.finish_roots();

        let sorted = sorted_by_from(&store);
        let froms: Vec<_> = sorted.iter().map(|&id| store.interval(id).from().get()).collect();
        assert_eq!(froms, vec![0, 2, 4]);
    }
}
