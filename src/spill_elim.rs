//! Spill-move eliminator (C7): after data-flow resolution, removes moves
//! that turned out to be no-ops once both sides were assigned a location,
//! and rewrites a `storeAtDefinition` move into a direct store to the
//! interval's canonical spill slot. Controlled by `Options::eliminate_spill_moves`.

use crate::function::Function;
use crate::ids::OpId;
use crate::interval::{IntervalStore, Location, SpillState, SplitMode};
use crate::stats::Stats;

/// Scans every instruction in the trace once; for each that is a move
/// (either one `dataflow::resolve` inserted or one already present in the
/// source LIR, e.g. the coalescing candidate from scenario S5), deletes it
/// if source and destination resolve to the same location, or rewrites it
/// into a canonical spill store if its destination interval has reached
/// `SpillState::StoreAtDefinition`.
///
/// Unlike `assign`/`dataflow`, a missing split child here just means this
/// particular move isn't eliminated — skip it rather than bailing out, per
/// the design note to keep this pass conservative when uncertain (§9).
pub fn eliminate<F: Function>(func: &mut F, store: &IntervalStore, stats: &mut Stats) {
    for id in all_ids(func) {
        let (dst_reg, src_reg) = match func.is_move(id) {
            Some(pair) => pair,
            None => continue,
        };

        if !dst_reg.is_virtual() || !src_reg.is_virtual() {
            continue;
        }

        let dst_var = crate::ids::VarIndex::new(dst_reg.get_index() as u32);
        let src_var = crate::ids::VarIndex::new(src_reg.get_index() as u32);

        let dst_child = store.split_child_at(dst_var, id, SplitMode::Output);
        let src_child = store.split_child_at(src_var, id, SplitMode::Input);

        let (dst_child, src_child) = match (dst_child, src_child) {
            (Ok(d), Ok(s)) => (d, s),
            _ => continue,
        };

        let dst_iv = store.interval(dst_child);
        let src_iv = store.interval(src_child);

        if dst_iv.location == src_iv.location {
            func.make_nop(id);
            stats.num_moves_eliminated += 1;
            continue;
        }

        // Spill state lives on the family's root (set once, the first time any
        // split child is demoted to memory — see `allocator::spill_or_rematerialize`),
        // not on whichever child happens to sit at this particular move.
        let dst_root = store.root_of(dst_child);
        if store.interval(dst_root).spill_state == SpillState::StoreAtDefinition {
            if let Location::StackSlot(_) = dst_iv.location {
                let rc = dst_iv.reg_class;
                let src_loc = src_iv.location;
                func.make_nop(id);
                func.insert_spill_store(id, src_loc, rc);
                stats.num_moves_eliminated += 1;
            }
        }
    }
}

fn all_ids<F: Function>(func: &F) -> Vec<OpId> {
    (0..func.num_insns()).map(OpId::from_inst_index).collect()
}
