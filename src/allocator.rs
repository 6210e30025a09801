//! The linear-scan allocation walk (C4): Wimmer & Mössenböck's "Optimized
//! Interval Splitting in a Linear Scan Register Allocator", applied over
//! the interval store built by lifetime analysis.

use crate::error::RegAllocError;
use crate::function::{FrameBuilder, RegAllocConfig};
use crate::ids::{IntervalId, OpId};
use crate::interval::{IntervalStore, Location, SpillState};
use crate::reg::{RealReg, RealRegUniverse, RegClass};
use crate::scaffold::{self, WalkLists};
use crate::stats::Stats;
use crate::use_pos::UseKind;
use smallvec::SmallVec;

/// Runs the main walk to completion, assigning every `TraceInterval` a
/// `Location` (register or stack slot) or marking it rematerializable.
pub fn allocate<C: RegAllocConfig, B: FrameBuilder>(
    store: &mut IntervalStore,
    universe: &RealRegUniverse,
    cfg: &C,
    frame: &mut B,
    never_spill_constants: bool,
    stats: &mut Stats,
) -> Result<(), RegAllocError> {
    let sorted = scaffold::sorted_by_from(store);
    let mut lists = WalkLists::new(sorted);

    while let Some(current) = lists.unhandled.pop_front() {
        let from = store.interval(current).from();
        advance(store, &mut lists, from);

        stats.num_try_allocate_reg += 1;
        if try_allocate_free_reg(store, universe, current, &mut lists).is_none() {
            allocate_blocked_reg(
                store,
                universe,
                cfg,
                frame,
                current,
                never_spill_constants,
                &mut lists,
                stats,
            )?;
        }

        lists.active.push(current);
    }

    Ok(())
}

/// Moves `active`/`inactive` members across to `handled`/`inactive`/
/// `active` as the walk position advances to `pos`.
fn advance(store: &IntervalStore, lists: &mut WalkLists, pos: OpId) {
    let expired_active: SmallVec<[IntervalId; 4]> =
        lists.active.iter().copied().filter(|&a| store.interval(a).to() <= pos).collect();
    let to_inactive: SmallVec<[IntervalId; 4]> = lists
        .active
        .iter()
        .copied()
        .filter(|&a| store.interval(a).to() > pos && !store.interval(a).covers(pos))
        .collect();
    for a in expired_active {
        lists.remove_active(a);
        lists.handled.push(a);
    }
    for a in to_inactive {
        lists.remove_active(a);
        lists.inactive.push(a);
    }

    let expired_inactive: SmallVec<[IntervalId; 4]> =
        lists.inactive.iter().copied().filter(|&a| store.interval(a).to() <= pos).collect();
    let to_active: SmallVec<[IntervalId; 4]> = lists
        .inactive
        .iter()
        .copied()
        .filter(|&a| store.interval(a).to() > pos && store.interval(a).covers(pos))
        .collect();
    for a in expired_inactive {
        lists.remove_inactive(a);
        lists.handled.push(a);
    }
    for a in to_active {
        lists.remove_inactive(a);
        lists.active.push(a);
    }
}

fn class_range(universe: &RealRegUniverse, rc: RegClass) -> Option<(usize, usize)> {
    universe.class_info(rc).map(|info| (info.first, info.last))
}

fn reg_index(universe: &RealRegUniverse, reg: RealReg, first: usize, last: usize) -> Option<usize> {
    let idx = reg.get_index();
    if idx >= first && idx <= last {
        Some(idx - first)
    } else {
        None
    }
}

/// Step 2: attempt to assign `current` a register without spilling
/// anything else. On success, `current` (and, if split, its unassigned
/// tail queued back into `unhandled`) ends up with a `Location::Register`.
/// Returns `None` when every candidate register is immediately blocked.
fn try_allocate_free_reg(
    store: &mut IntervalStore,
    universe: &RealRegUniverse,
    current: IntervalId,
    lists: &mut WalkLists,
) -> Option<()> {
    let rc = store.interval(current).reg_class;
    let (first, last) = class_range(universe, rc)?;
    let n = last - first + 1;
    let mut free_until = vec![OpId::max_value(); n];

    let cur_from = store.interval(current).from();

    for idx in 0..n {
        let reg = universe.regs[first + idx].0;
        if let Some(fixed) = store.fixed_interval_for(reg) {
            let cur = store.interval(current);
            if fixed.covers(cur_from) {
                free_until[idx] = OpId::min_value();
            } else if let Some(pos) = fixed.next_intersection_from(cur, cur_from) {
                free_until[idx] = pos;
            }
        }
    }

    for iv in store.all_intervals() {
        if iv.id == current || iv.reg_class != rc {
            continue;
        }
        let reg = match iv.location.as_register() {
            Some(r) => r,
            None => continue,
        };
        let idx = match reg_index(universe, reg, first, last) {
            Some(i) => i,
            None => continue,
        };
        if iv.covers(cur_from) {
            free_until[idx] = OpId::min_value();
        } else {
            let cur = store.interval(current);
            if let Some(pos) = iv.next_intersection_from(cur, cur_from) {
                if pos < free_until[idx] {
                    free_until[idx] = pos;
                }
            }
        }
    }

    let best_idx = pick_best(store, universe, current, &free_until, first)?;
    if free_until[best_idx] == OpId::min_value() {
        return None;
    }

    let reg = universe.regs[first + best_idx].0;
    let cur_to = store.interval(current).to();

    if free_until[best_idx] >= cur_to {
        store.interval_mut(current).location = Location::Register(reg);
    } else {
        let split_pos = free_until[best_idx];
        store.interval_mut(current).location = Location::Register(reg);
        let tail = store.split_at(current, split_pos);
        store.interval_mut(tail).location = Location::Unassigned;
        lists.push_unhandled_sorted(store, tail);
    }

    Some(())
}

/// Picks `argmax freeUntilPos[r]`, tie-broken by (i) `current`'s hint,
/// (ii) lowest register number (callee-save preference falls directly out
/// of `freeUntilPos` here: a register blocked by a caller-save clobber's
/// fixed interval already scores lower than an unblocked callee-save one).
fn pick_best(
    store: &IntervalStore,
    universe: &RealRegUniverse,
    current: IntervalId,
    free_until: &[OpId],
    first: usize,
) -> Option<usize> {
    let max = *free_until.iter().max()?;
    if max == OpId::min_value() {
        return Some(0);
    }

    let hinted_idx = store.interval(current).hint.and_then(|hint_id| {
        let hinted = store.interval(hint_id);
        hinted
            .location
            .as_register()
            .and_then(|r| reg_index(universe, r, first, first + free_until.len() - 1))
    });

    if let Some(idx) = hinted_idx {
        if free_until[idx] == max {
            return Some(idx);
        }
    }

    free_until.iter().enumerate().filter(|&(_, &v)| v == max).map(|(i, _)| i).min()
}

/// Step 3: no free register is available for `current` without evicting
/// something. Either spill `current` itself, or evict the interval
/// currently using the best candidate register and give it to `current`.
fn allocate_blocked_reg<C: RegAllocConfig, B: FrameBuilder>(
    store: &mut IntervalStore,
    universe: &RealRegUniverse,
    _cfg: &C,
    frame: &mut B,
    current: IntervalId,
    never_spill_constants: bool,
    lists: &mut WalkLists,
    stats: &mut Stats,
) -> Result<(), RegAllocError> {
    let rc = store.interval(current).reg_class;
    let (first, last) = match class_range(universe, rc) {
        Some(v) => v,
        None => {
            return Err(RegAllocError::OutOfRegisters {
                interval: current,
                at: store.interval(current).from(),
            })
        }
    };
    let n = last - first + 1;
    let cur_from = store.interval(current).from();

    let mut next_use = vec![OpId::max_value(); n];
    let mut holder: Vec<Option<IntervalId>> = vec![None; n];

    for &a in lists.active.iter() {
        let iv = store.interval(a);
        if iv.reg_class != rc {
            continue;
        }
        if let Some(reg) = iv.location.as_register() {
            if let Some(idx) = reg_index(universe, reg, first, last) {
                let nu = iv
                    .next_use_at_least(UseKind::MustHaveRegister, cur_from)
                    .unwrap_or(OpId::max_value());
                next_use[idx] = nu;
                holder[idx] = Some(a);
            }
        }
    }

    // §4.5 step 3: inactive holders that still intersect `current`'s future
    // range tighten the same nextUsePos without becoming eviction
    // candidates — they aren't occupying the register right now, but
    // reactivating into it would collide with `current`.
    for &a in lists.inactive.iter() {
        let iv = store.interval(a);
        if iv.reg_class != rc {
            continue;
        }
        if let Some(reg) = iv.location.as_register() {
            if let Some(idx) = reg_index(universe, reg, first, last) {
                let cur = store.interval(current);
                if iv.next_intersection(cur).is_some() {
                    let nu = iv
                        .next_use_at_least(UseKind::MustHaveRegister, cur_from)
                        .unwrap_or(OpId::max_value());
                    if nu < next_use[idx] {
                        next_use[idx] = nu;
                    }
                }
            }
        }
    }

    for idx in 0..n {
        let reg = universe.regs[first + idx].0;
        if let Some(fixed) = store.fixed_interval_for(reg) {
            let cur = store.interval(current);
            if fixed.covers(cur_from) {
                next_use[idx] = OpId::min_value();
            }
        }
    }

    let best_idx = (0..n).max_by_key(|&i| next_use[i]).unwrap_or(0);
    let first_must_use = store.interval(current).first_use_at_least(UseKind::MustHaveRegister);

    let current_must_spill = match first_must_use {
        Some(use_pos) => next_use[best_idx] < use_pos,
        None => true,
    };

    if current_must_spill {
        stats.num_spills += 1;
        spill_or_rematerialize(store, frame, current, never_spill_constants);
        if let Some(use_pos) = first_must_use {
            if use_pos > cur_from {
                let tail = store.split_at(current, use_pos);
                lists.push_unhandled_sorted(store, tail);
            }
        }
        return Ok(());
    }

    // Evict whoever holds `best_idx`, splitting it at `current`'s start.
    // When the victim's own range already starts exactly at `cur_from` (its
    // family never had anything live before this point, e.g. it was itself
    // just re-queued at this position) there is nothing to keep on the
    // original interval, so hand the whole thing over instead of splitting.
    if let Some(victim) = holder[best_idx] {
        lists.remove_active(victim);
        let victim_from = store.interval(victim).from();
        let tail = if cur_from > victim_from {
            let t = store.split_at(victim, cur_from);
            stats.num_reg_splits += 1;
            t
        } else {
            victim
        };
        spill_or_rematerialize(store, frame, tail, never_spill_constants);
        if let Some(use_pos) = store.interval(tail).first_use_at_least(UseKind::MustHaveRegister) {
            let tail_from = store.interval(tail).from();
            let requeue = if use_pos > tail_from && store.interval(tail).covers(use_pos) {
                store.split_at(tail, use_pos)
            } else {
                tail
            };
            lists.push_unhandled_sorted(store, requeue);
        }
    }

    let reg = universe.regs[first + best_idx].0;
    store.interval_mut(current).location = Location::Register(reg);

    // Block collisions with fixed intervals of the register we just took.
    let fixed_collision = {
        let cur = store.interval(current);
        store.fixed_interval_for(reg).and_then(|f| f.next_intersection_from(cur, cur.from().next()))
    };

    // ...and with inactive variable intervals already holding that register
    // that will reactivate (overlap `current`) before `current` itself ends.
    let inactive_collision = lists
        .inactive
        .iter()
        .filter(|&&a| {
            let iv = store.interval(a);
            iv.reg_class == rc && iv.location.as_register() == Some(reg)
        })
        .filter_map(|&a| {
            let cur = store.interval(current);
            store.interval(a).next_intersection_from(cur, cur.from().next())
        })
        .min();

    let collision = match (fixed_collision, inactive_collision) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    if let Some(pos) = collision {
        if pos < store.interval(current).to() {
            let tail = store.split_at(current, pos);
            stats.num_reg_splits += 1;
            lists.push_unhandled_sorted(store, tail);
        }
    }

    Ok(())
}

fn spill_or_rematerialize<B: FrameBuilder>(
    store: &mut IntervalStore,
    frame: &mut B,
    id: IntervalId,
    never_spill_constants: bool,
) {
    let can_materialize = store.interval(id).can_materialize();
    if can_materialize && !never_spill_constants {
        store.interval_mut(id).location = Location::Illegal;
        return;
    }
    let slot = store.assign_spill_slot(id, frame);
    store.interval_mut(id).location = Location::StackSlot(slot);

    // Every variable here is defined exactly once (the trace is in
    // single-assignment form), so the spill-state machine never needs to
    // track multiple competing definitions: the first time any member of a
    // family is demoted to memory, the whole family's story is already
    // "one store, right at the definition" -- tracked on the root so every
    // split child shares it (mirrors how the spill slot itself is shared via
    // `assign_spill_slot`), and read back by `spill_elim` via `root_of`.
    let root = store.root_of(id);
    store.interval_mut(root).spill_state = SpillState::StoreAtDefinition;
}
