//! Data-flow resolver (C6): inserts moves on intra-trace block edges so
//! that a successor block always finds its live-in operands where it
//! expects them, regardless of how the predecessor's tail was allocated.

use crate::error::RegAllocError;
use crate::function::{Function, FrameBuilder};
use crate::interval::{IntervalStore, SplitMode};
use crate::move_resolver::{self, PendingMove, Scratch};
use crate::reg::RealRegUniverse;
use crate::stats::Stats;

/// Walks every intra-trace edge `block -> succ` (successors reachable
/// within this trace; cross-trace edges are resolved by an external pass
/// and never touched here) and splices resolving moves into `block`'s
/// tail, just before its terminator.
///
/// A live-in variable with no split child covering one side of the edge is
/// an *AllocatorBailout* (§7): it means lifetime analysis and this pass
/// disagree about what's live, which this pass cannot safely paper over by
/// just not inserting a move.
pub fn resolve<F: Function, B: FrameBuilder>(
    func: &mut F,
    store: &IntervalStore,
    universe: &RealRegUniverse,
    frame: &mut B,
    stats: &mut Stats,
) -> Result<(), RegAllocError> {
    let blocks: Vec<_> = func.blocks().to_vec();

    for block in blocks {
        let succs: Vec<_> = func.block_succs(block).to_vec();
        let block_range = func.block_insns(block);
        let last_id = block_range.last();

        for succ in succs {
            let succ_range = func.block_insns(succ);
            let first_id = succ_range.first();

            let mut pending: Vec<PendingMove> = Vec::new();
            for var in live_in_vars(store, first_id) {
                let src = store.split_child_at(var, last_id, SplitMode::Output)?;
                let dst = store.split_child_at(var, first_id, SplitMode::Input)?;
                let src_iv = store.interval(src);
                let dst_iv = store.interval(dst);
                if src_iv.location != dst_iv.location {
                    pending.push(PendingMove {
                        dst: dst_iv.location,
                        src: src_iv.location,
                        rc: dst_iv.reg_class,
                    });
                }
            }

            if pending.is_empty() {
                continue;
            }

            // A cycle can only involve moves of one register class (a move never
            // crosses classes), but the live-in set here mixes every class live
            // across the edge, so each class gets its own scratch and its own
            // independent resolve pass.
            let mut by_class: crate::ids::Map<crate::reg::RegClass, Vec<PendingMove>> =
                crate::ids::Map::default();
            for m in pending {
                by_class.entry(m.rc).or_default().push(m);
            }
            for (rc, moves) in by_class {
                let scratch = pick_scratch(universe, rc, frame);
                let ordered = move_resolver::resolve(&moves, scratch);
                for m in ordered.iter() {
                    stats.num_moves_inserted += 1;
                    func.insert_move_after(last_id, m.dst, m.src, m.rc);
                }
            }
        }
    }
    Ok(())
}

fn pick_scratch<B: FrameBuilder>(
    universe: &RealRegUniverse,
    rc: crate::reg::RegClass,
    frame: &mut B,
) -> Scratch {
    match universe.class_info(rc).and_then(|info| info.suggested_scratch) {
        Some(idx) => Scratch::Register(universe.regs[idx].0),
        None => Scratch::StackSlot(frame.allocate_spill_slot(rc)),
    }
}

/// Variables live into `first_id`'s block: every root interval whose split
/// family has a child covering `first_id`.
fn live_in_vars(store: &IntervalStore, first_id: crate::ids::OpId) -> Vec<crate::ids::VarIndex> {
    store
        .all_intervals()
        .filter(|iv| iv.is_root())
        .filter(|iv| {
            iv.covers(first_id)
                || iv.split_children.iter().any(|&c| store.interval(c).covers(first_id))
        })
        .map(|iv| iv.operand)
        .collect()
}
