//! The embedding JIT's view into its own LIR: a `Function` implementation is
//! the only thing the allocator knows about instruction encoding. Mirrors
//! the teacher's own `interface::Function`/visitor-based design so the
//! allocator core stays free of any concrete ISA.

use crate::ids::{BlockId, OpId};
use crate::interval::{Location, MaterializeValue};
use crate::reg::{RealReg, Reg, RegClass};

/// A block's instruction range, `[first, last]` inclusive, both even ids.
#[derive(Clone, Copy, Debug)]
pub struct BlockRange {
    first: OpId,
    last: OpId,
}

impl BlockRange {
    pub fn new(first: OpId, last: OpId) -> Self {
        debug_assert!(first <= last);
        BlockRange { first, last }
    }
    pub fn first(&self) -> OpId {
        self.first
    }
    pub fn last(&self) -> OpId {
        self.last
    }
    pub fn len(&self) -> usize {
        self.last.inst_index() - self.first.inst_index() + 1
    }
}

/// Callback handed to the per-instruction operand visitors below; the
/// allocator passes a closure, the `Function` implementation calls it once
/// per matching operand occurrence.
pub trait RegVisitor: FnMut(Reg) {}
impl<T: FnMut(Reg)> RegVisitor for T {}

/// The allocator's view of one LIR instruction's register usage. A
/// `Function` produces one of these per instruction via `reg_uses`; the
/// allocator never looks at the instruction's encoding directly.
#[derive(Clone, Default)]
pub struct RegUses {
    pub inputs: Vec<Reg>,
    pub outputs: Vec<Reg>,
    pub temps: Vec<Reg>,
    pub alives: Vec<Reg>,
}

impl RegUses {
    pub fn new() -> Self {
        RegUses::default()
    }
}

/// The embedding JIT's LIR, as seen by the allocator. Every method is a
/// query or a rewrite hook; the allocator never inspects `Self::Inst`
/// directly except through these.
pub trait Function {
    /// Opaque instruction type; the allocator only ever touches it through
    /// `reg_uses`, `is_move`, and the rewrite hooks below.
    type Inst;

    fn blocks(&self) -> &[BlockId];
    fn entry_block(&self) -> BlockId;
    fn block_insns(&self, block: BlockId) -> BlockRange;
    /// Successor blocks reachable *within this trace*; cross-trace edges are
    /// out of scope (see the data-flow resolver's non-goal).
    fn block_succs(&self, block: BlockId) -> &[BlockId];

    fn num_insns(&self) -> usize;
    fn num_vars(&self) -> usize;

    /// The register uses of the instruction at `id`, split by visitor mode.
    fn reg_uses(&self, id: OpId) -> RegUses;

    /// `Some((dst, src))` if the instruction at `id` is a plain
    /// register-to-register move the allocator is allowed to coalesce away.
    fn is_move(&self, id: OpId) -> Option<(Reg, Reg)>;

    /// Whether the instruction clobbers every caller-saved register (a call,
    /// typically).
    fn destroys_caller_saved_regs(&self, id: OpId) -> bool;

    /// Whether the instruction carries a GC/debug state map (a safepoint).
    fn has_safepoint(&self, id: OpId) -> bool;

    /// If the variable's defining instruction produces a value cheap enough
    /// to recompute, the constant to recompute instead of spilling.
    fn materialize_value(&self, var_def_insn: OpId) -> Option<MaterializeValue>;

    /// Rewrites the operand `old` occurring in mode-appropriate position of
    /// the instruction at `id` to its final location (C8).
    fn rewrite_operand(&mut self, id: OpId, old: Reg, loc: Location);

    /// Inserts a move `dst <- src` into the gap immediately after `after`
    /// (C5/C6), as a new instruction of this function's own encoding.
    fn insert_move_after(&mut self, after: OpId, dst: Location, src: Location, rc: RegClass);

    /// Inserts a store of `src` to its canonical spill slot at the
    /// dominator-spill marker position (C7's `storeAtDefinition`).
    fn insert_spill_store(&mut self, at: OpId, src: Location, rc: RegClass);

    /// `true` if the instruction at `id` is a return/trace-exit (no
    /// successors to resolve data flow into).
    fn is_ret(&self, id: OpId) -> bool;

    /// Turns the instruction at `id` into a no-op (C7's spill-move
    /// elimination deletes moves this way rather than shifting every later
    /// id, which would invalidate the interval store's `OpId` keys).
    fn make_nop(&mut self, id: OpId);
}

/// Describes which real registers the embedder reserves from allocation
/// (`RegAllocConfig`, §10.4): the allocatable set, the caller-save/
/// callee-save split, and whether every allocatable register happens to be
/// caller-saved (lets the allocator skip the call-clobber special case).
pub trait RegAllocConfig {
    fn is_allocatable(&self, reg: RealReg) -> bool;
    fn is_caller_save(&self, reg: RealReg) -> bool;
    fn allocatable_registers_for_class(&self, rc: RegClass) -> &[RealReg];
    fn all_allocatable_caller_saved(&self) -> bool {
        false
    }
}

/// The frame-layout collaborator (§6 Input Contract): hands out fresh stack
/// slots on demand. Finalizing the frame layout itself is out of scope.
pub trait FrameBuilder {
    fn allocate_spill_slot(&mut self, rc: RegClass) -> crate::reg::SpillSlot;
}
