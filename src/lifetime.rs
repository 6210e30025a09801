//! Lifetime analysis (C2): a single backward pass over the trace that
//! builds every variable's live ranges and use positions, and every
//! allocatable register's fixed-interval ranges.

use crate::function::{Function, RegAllocConfig};
use crate::ids::{Map, OpId, VarIndex};
use crate::interval::{push_descending, IntervalStore};
use crate::range::{self, Range};
use crate::reg::{RealReg, Reg, RegClass, NUM_REG_CLASSES};
use crate::stats::Stats;
use crate::use_pos::{self, UseKind, UsePosition};

/// Tracks, per variable, the instruction id at which its "open" range (the
/// one currently being extended backwards) should end once we hit its
/// definition — the classic "open until defined" bookkeeping.
struct OpenRange {
    to: OpId,
}

/// Runs lifetime analysis over the whole trace, populating `store` with one
/// root `TraceInterval` per variable operand encountered and one
/// `FixedInterval` per real register touched (directly or via a
/// caller-saved clobber).
pub fn analyze<F: Function, C: RegAllocConfig>(
    func: &F,
    cfg: &C,
    store: &mut IntervalStore,
    stats: &mut Stats,
) {
    let mut open: Map<u32, OpenRange> = Map::default();
    // varIndex -> the move-coalescing hint recorded at this variable's
    // definition (the source of a `move dst <- src`).
    let mut hints: Map<u32, Reg> = Map::default();

    let last_id = last_instruction_id(func);
    let mut id = last_id;
    loop {
        visit_instruction(func, cfg, store, &mut open, &mut hints, id, stats);

        if id == OpId::min_value() {
            break;
        }
        id = id.prev();
    }

    // Any range still open at id 0 belongs to an entry-block live-in
    // (a trace parameter): close it at the very first instruction.
    for (&var, open_range) in open.iter() {
        let interval_id = store
            .interval_for(VarIndex::new(var))
            .expect("var touched while open but no interval exists");
        push_descending(
            &mut store.interval_mut(interval_id).ranges,
            Range::new(OpId::min_value(), open_range.to),
        );
    }

    for interval in store.all_intervals_mut() {
        range::finish_ranges(&interval.ranges);
        use_pos::finish_use_positions(&mut interval.use_positions);
    }
    store.finish_roots();
    apply_hints(store, &hints);
}

fn apply_hints(store: &mut IntervalStore, hints: &Map<u32, Reg>) {
    for (&var, src_reg) in hints.iter() {
        if !src_reg.is_virtual() {
            continue;
        }
        let dst_id = match store.interval_for(VarIndex::new(var)) {
            Some(id) => id,
            None => continue,
        };
        let src_var = VarIndex::new(src_reg.get_index() as u32);
        if let Some(src_id) = store.interval_for(src_var) {
            store.interval_mut(dst_id).hint = Some(src_id);
        }
    }
}

fn last_instruction_id<F: Function>(func: &F) -> OpId {
    OpId::from_inst_index(func.num_insns() - 1)
}

fn visit_instruction<F: Function, C: RegAllocConfig>(
    func: &F,
    cfg: &C,
    store: &mut IntervalStore,
    open: &mut Map<u32, OpenRange>,
    hints: &mut Map<u32, Reg>,
    id: OpId,
    stats: &mut Stats,
) {
    stats.num_lifetime_insns_visited += 1;

    // Step 1: a caller-saved-clobbering instruction (typically a call) blocks
    // every caller-saved register for the single gap following it, forcing
    // anything live across the call out of those registers.
    if func.destroys_caller_saved_regs(id) {
        for rc in 0..NUM_REG_CLASSES {
            let rc = RegClass::from_u32(rc as u32);
            for &reg in cfg.allocatable_registers_for_class(rc) {
                if cfg.is_caller_save(reg) {
                    add_fixed_range(store, reg, id, id.next());
                }
            }
        }
    }

    let uses = func.reg_uses(id);

    // Step 2: outputs close the currently-open range at `id` and record a
    // must-have-register use there.
    for reg in &uses.outputs {
        close_and_record_use(store, open, *reg, id, UseKind::MustHaveRegister);
        if reg.is_real() {
            let real = reg.as_real_reg().unwrap();
            debug_assert!(
                cfg.is_allocatable(real),
                "{:?} names a non-allocatable real register",
                reg
            );
            add_fixed_range(store, real, id, id.next());
        }
    }

    // Step 3: temps live only across this single instruction.
    for reg in &uses.temps {
        if reg.is_virtual() {
            let var = VarIndex::new(reg.get_index() as u32);
            let interval_id = store.get_or_create_interval(var, reg.get_class());
            push_descending(&mut store.interval_mut(interval_id).ranges, Range::new(id, id.next()));
            store
                .interval_mut(interval_id)
                .use_positions
                .push(UsePosition { op_id: id, kind: UseKind::MustHaveRegister });
        } else {
            let real = reg.as_real_reg().unwrap();
            debug_assert!(
                cfg.is_allocatable(real),
                "{:?} names a non-allocatable real register",
                reg
            );
            add_fixed_range(store, real, id, id.next());
        }
    }

    // Step 4: "alive" operands must survive past the output side of this
    // instruction, i.e. through the gap after it.
    for reg in &uses.alives {
        extend_open(open, *reg, id.next());
    }

    // Step 5: inputs open (or extend) a range ending at `id` itself and
    // record a use at `id`. Ending exactly at `id` (rather than past the
    // gap, the way alives and temps do) matters when this same instruction
    // also has an output: `Range`s are half-open, so an input range
    // `[.., id)` and an output range `[id, ..)` touch without intersecting,
    // letting the output's register be the input's the moment the input
    // dies. `IntervalStore::split_child_at` resolves the input's own use at
    // `id` against this boundary (invariant 3: "input uses the child ending
    // at or after p").
    for reg in &uses.inputs {
        extend_open(open, *reg, id);
        if reg.is_virtual() {
            let var = VarIndex::new(reg.get_index() as u32);
            let interval_id = store.get_or_create_interval(var, reg.get_class());
            store
                .interval_mut(interval_id)
                .use_positions
                .push(UsePosition { op_id: id, kind: UseKind::MustHaveRegister });
        }
    }

    // Move-coalescing hint (§10.7): a `move dst <- src` records, on `dst`'s
    // variable, a hint pointing at `src`'s register so the allocator's
    // tie-break can prefer `src`'s eventual register.
    if let Some((dst, src)) = func.is_move(id) {
        if dst.is_virtual() {
            hints.insert(dst.get_index() as u32, src);
        }
    }

    // Rematerializable constants: if this instruction defines a variable
    // whose value can be recomputed cheaply, record that on its interval.
    if let Some(mv) = func.materialize_value(id) {
        for reg in &uses.outputs {
            if reg.is_virtual() {
                let var = VarIndex::new(reg.get_index() as u32);
                if let Some(interval_id) = store.interval_for(var) {
                    store.interval_mut(interval_id).materialization_value = Some(mv);
                }
            }
        }
    }

    if func.has_safepoint(id) {
        record_safepoint(func, store, id);
    }
}

/// Extends an "open" (not-yet-closed) range for `reg` so it reaches at
/// least `to`; creates the bookkeeping entry on first sight (this is how a
/// use with no later definition in the scanned suffix keeps its range
/// alive back to the start of the trace).
fn extend_open(open: &mut Map<u32, OpenRange>, reg: Reg, to: OpId) {
    if !reg.is_virtual() {
        return;
    }
    let var = reg.get_index() as u32;
    open
        .entry(var)
        .and_modify(|o| {
            if to > o.to {
                o.to = to;
            }
        })
        .or_insert(OpenRange { to });
}

/// Closes the open range for `reg` at `at` (a definition): pushes
/// `[at, openTo)` onto the interval's range list and removes the
/// bookkeeping entry, or — if there was no open range, i.e. the value is
/// defined but never used downstream — pushes the minimal `[at, at+2)`.
fn close_and_record_use(
    store: &mut IntervalStore,
    open: &mut Map<u32, OpenRange>,
    reg: Reg,
    at: OpId,
    kind: UseKind,
) {
    if !reg.is_virtual() {
        return;
    }
    let var = reg.get_index() as u32;
    let interval_id = store.get_or_create_interval(VarIndex::new(var), reg.get_class());

    let to = match open.remove(&var) {
        Some(o) => o.to,
        None => at.next(),
    };
    let to = if to <= at { at.next() } else { to };
    push_descending(&mut store.interval_mut(interval_id).ranges, Range::new(at, to));
    store.interval_mut(interval_id).use_positions.push(UsePosition { op_id: at, kind });
}

fn add_fixed_range(store: &mut IntervalStore, reg: RealReg, from: OpId, to: OpId) {
    let fixed = store.get_or_create_fixed_interval(reg);
    push_descending(&mut fixed.ranges, Range::new(from, to));
}

/// Records, on every virtual interval holding a `Ref`-class value live at
/// `id`, whether this safepoint instruction itself names that value (used
/// later by the verifier's rule 5 and the location assigner's stackmap
/// construction).
fn record_safepoint<F: Function>(func: &F, store: &mut IntervalStore, id: OpId) {
    let uses = func.reg_uses(id);
    let named: crate::ids::Set<u32> = uses
        .inputs
        .iter()
        .chain(uses.alives.iter())
        .chain(uses.outputs.iter())
        .filter(|r| r.is_virtual())
        .map(|r| r.get_index() as u32)
        .collect();

    for interval in store.all_intervals_mut() {
        if interval.reg_class != RegClass::Ref {
            continue;
        }
        if interval.covers(id) {
            let directly_named = named.contains(&(interval.operand.index() as u32));
            interval.safepoints.push((id, directly_named));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{BlockRange, RegUses};
    use crate::ids::BlockId;
    use crate::interval::{Location, MaterializeValue};
    use crate::reg::RealReg;

    /// Minimal `Function` fixture: a flat list of register-use rows, one per
    /// instruction, all in a single block. Used to unit-test lifetime
    /// analysis in isolation without the rest of the pipeline.
    struct Fixture {
        blocks: Vec<BlockId>,
        rows: Vec<RegUses>,
        moves: Map<u32, (Reg, Reg)>,
    }

    impl Function for Fixture {
        type Inst = ();

        fn blocks(&self) -> &[BlockId] {
            &self.blocks
        }
        fn entry_block(&self) -> BlockId {
            self.blocks[0]
        }
        fn block_insns(&self, _block: BlockId) -> BlockRange {
            BlockRange::new(OpId::min_value(), OpId::from_inst_index(self.rows.len() - 1))
        }
        fn block_succs(&self, _block: BlockId) -> &[BlockId] {
            &[]
        }
        fn num_insns(&self) -> usize {
            self.rows.len()
        }
        fn num_vars(&self) -> usize {
            self.rows.iter().flat_map(|r| r.outputs.iter()).filter(|r| r.is_virtual()).count()
        }
        fn reg_uses(&self, id: OpId) -> RegUses {
            self.rows[id.inst_index()].clone()
        }
        fn is_move(&self, id: OpId) -> Option<(Reg, Reg)> {
            self.moves.get(&(id.inst_index() as u32)).copied()
        }
        fn destroys_caller_saved_regs(&self, _id: OpId) -> bool {
            false
        }
        fn has_safepoint(&self, _id: OpId) -> bool {
            false
        }
        fn materialize_value(&self, _id: OpId) -> Option<MaterializeValue> {
            None
        }
        fn rewrite_operand(&mut self, _id: OpId, _old: Reg, _loc: Location) {}
        fn insert_move_after(
            &mut self,
            _after: OpId,
            _dst: Location,
            _src: Location,
            _rc: RegClass,
        ) {
        }
        fn insert_spill_store(&mut self, _at: OpId, _src: Location, _rc: RegClass) {}
        fn is_ret(&self, id: OpId) -> bool {
            id.inst_index() == self.rows.len() - 1
        }
        fn make_nop(&mut self, _id: OpId) {}
    }

    struct NoConfig;
    impl RegAllocConfig for NoConfig {
        fn is_allocatable(&self, _reg: RealReg) -> bool {
            true
        }
        fn is_caller_save(&self, _reg: RealReg) -> bool {
            false
        }
        fn allocatable_registers_for_class(&self, _rc: RegClass) -> &[RealReg] {
            &[]
        }
    }

    fn v(i: u32, rc: RegClass) -> Reg {
        crate::reg::VirtualReg::new(rc, i).to_reg()
    }

    #[test]
    fn straight_line_no_pressure() {
        // 0: v1 := const 1; 2: v2 := const 2; 4: v3 := v1 + v2; 6: return v3
        let v1 = v(0, RegClass::I64);
        let v2 = v(1, RegClass::I64);
        let v3 = v(2, RegClass::I64);

        let rows = vec![
            RegUses { outputs: vec![v1], ..Default::default() },
            RegUses { outputs: vec![v2], ..Default::default() },
            RegUses { inputs: vec![v1, v2], outputs: vec![v3], ..Default::default() },
            RegUses { inputs: vec![v3], ..Default::default() },
        ];
        let func = Fixture { blocks: vec![BlockId::new(0)], rows, moves: Map::default() };
        let mut store = IntervalStore::new(2);
        let mut stats = Stats::default();
        analyze(&func, &NoConfig, &mut store, &mut stats);

        let i1 = store.interval_for(VarIndex::new(0)).unwrap();
        let i2 = store.interval_for(VarIndex::new(1)).unwrap();
        let i3 = store.interval_for(VarIndex::new(2)).unwrap();

        assert_eq!(store.interval(i1).from(), OpId::new(0));
        assert_eq!(store.interval(i2).from(), OpId::new(2));
        assert_eq!(store.interval(i3).from(), OpId::new(4));
        // v1/v2 die exactly where v3 is defined (4), not past it: their last
        // use is an input to the same instruction that outputs v3.
        assert_eq!(store.interval(i1).to(), OpId::new(4));
        assert_eq!(store.interval(i2).to(), OpId::new(4));
        assert_eq!(store.interval(i3).to(), OpId::new(6));
    }

    #[test]
    fn move_hint_recorded() {
        // 0: v1 := const; 2: v2 := move v1; 4: use v2
        let v1 = v(0, RegClass::I64);
        let v2 = v(1, RegClass::I64);
        let rows = vec![
            RegUses { outputs: vec![v1], ..Default::default() },
            RegUses { inputs: vec![v1], outputs: vec![v2], ..Default::default() },
            RegUses { inputs: vec![v2], ..Default::default() },
        ];
        let mut moves = Map::default();
        moves.insert(1, (v2, v1));
        let func = Fixture { blocks: vec![BlockId::new(0)], rows, moves };
        let mut store = IntervalStore::new(2);
        let mut stats = Stats::default();
        analyze(&func, &NoConfig, &mut store, &mut stats);

        let i2 = store.interval_for(VarIndex::new(1)).unwrap();
        assert!(store.interval(i2).hint.is_some());
    }
}
