//! Location assigner (C8): the final pass over every instruction, replacing
//! each variable operand occurrence with its split child's finished
//! location (or a rematerialization immediate).

use crate::error::RegAllocError;
use crate::function::Function;
use crate::ids::{OpId, VarIndex};
use crate::interval::{IntervalStore, SplitMode};
use crate::reg::Reg;

/// Rewrites every operand in every instruction of the trace in place.
/// Temps and alives are resolved with the output and input rules
/// respectively, at the same `opId` as the instruction that declared them.
///
/// A missing split child here is an *AllocatorBailout* (§7), not something
/// to paper over: skipping it would leave an operand pointing at a virtual
/// register forever, silently producing a wrong program.
pub fn assign<F: Function>(func: &mut F, store: &IntervalStore) -> Result<(), RegAllocError> {
    for idx in 0..func.num_insns() {
        let id = OpId::from_inst_index(idx);
        let uses = func.reg_uses(id);

        for reg in uses.outputs.iter() {
            rewrite(func, store, id, *reg, SplitMode::Output)?;
        }
        for reg in uses.temps.iter() {
            rewrite(func, store, id, *reg, SplitMode::Output)?;
        }
        for reg in uses.alives.iter() {
            rewrite(func, store, id, *reg, SplitMode::Input)?;
        }
        for reg in uses.inputs.iter() {
            rewrite(func, store, id, *reg, SplitMode::Input)?;
        }
    }
    Ok(())
}

fn rewrite<F: Function>(
    func: &mut F,
    store: &IntervalStore,
    id: OpId,
    reg: Reg,
    mode: SplitMode,
) -> Result<(), RegAllocError> {
    if !reg.is_virtual() {
        return Ok(());
    }
    let var = VarIndex::new(reg.get_index() as u32);
    let child = store.split_child_at(var, id, mode)?;
    let loc = store.interval(child).location;
    func.rewrite_operand(id, reg, loc);
    Ok(())
}
