//! Numbering & instruction index (C0): validates the even-ID invariant the
//! rest of the allocator relies on, and builds the dense id -> block table
//! used to answer "which block contains this instruction" queries.

use crate::function::Function;
use crate::ids::{BlockId, OpId};

/// Dense `OpId -> BlockId` lookup, built once per trace.
pub struct InstToBlockMap {
    table: Vec<BlockId>,
}

impl InstToBlockMap {
    pub fn build<F: Function>(func: &F) -> Self {
        let mut table = vec![BlockId::new(0); func.num_insns()];
        for &block in func.blocks() {
            let range = func.block_insns(block);
            for idx in range.first().inst_index()..=range.last().inst_index() {
                table[idx] = block;
            }
        }
        InstToBlockMap { table }
    }

    pub fn block_for(&self, id: OpId) -> BlockId {
        self.table[id.inst_index()]
    }

    /// A block boundary occurs exactly where `blockForId(p) != blockForId(p-1)`,
    /// per data-model invariant 6.
    pub fn is_block_start(&self, id: OpId) -> bool {
        id == OpId::min_value() || self.block_for(id) != self.block_for(id.prev())
    }
}

/// Checks the even-ID invariant (ids strictly increase in trace order,
/// consecutive instructions differ by 2, all ids even) and that every
/// block's instruction range is non-empty and contiguous with its
/// neighbors. A violation here is an *AllocatorBug* in the embedder's
/// numbering, not a recoverable condition.
pub fn validate<F: Function>(func: &F) {
    debug_assert!(func.num_insns() > 0, "trace has no instructions");

    let mut expected = OpId::min_value();
    for &block in func.blocks() {
        let range = func.block_insns(block);
        debug_assert!(range.first() <= range.last(), "block {:?} has an empty range", block);
        debug_assert_eq!(
            range.first(),
            expected,
            "block {:?} does not start where the previous one ended",
            block
        );
        expected = OpId::from_inst_index(range.last().inst_index() + 1);
    }
    debug_assert_eq!(
        expected.inst_index(),
        func.num_insns(),
        "block ranges do not cover every instruction"
    );

    // Cross-check the dense id->block table built the same way the rest of
    // the allocator consumes it (data-model invariant 6 / `isBlockBegin`):
    // every block's own first id must be a block start, and nothing inside
    // it should be.
    let map = InstToBlockMap::build(func);
    for &block in func.blocks() {
        let range = func.block_insns(block);
        debug_assert!(
            map.is_block_start(range.first()),
            "{:?}'s first id is not a block start",
            block
        );
        let mut id = range.first();
        while id < range.last() {
            id = id.next();
            debug_assert!(
                !map.is_block_start(id),
                "{:?} has an unexpected block start mid-range at {:?}",
                block,
                id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{BlockRange, RegUses};

    struct Fixture {
        blocks: Vec<BlockId>,
        ranges: Vec<BlockRange>,
    }

    impl Function for Fixture {
        type Inst = ();
        fn blocks(&self) -> &[BlockId] {
            &self.blocks
        }
        fn entry_block(&self) -> BlockId {
            self.blocks[0]
        }
        fn block_insns(&self, block: BlockId) -> BlockRange {
            self.ranges[block.index()]
        }
        fn block_succs(&self, _block: BlockId) -> &[BlockId] {
            &[]
        }
        fn num_insns(&self) -> usize {
            self.ranges.last().map(|r| r.last().inst_index() + 1).unwrap_or(0)
        }
        fn num_vars(&self) -> usize {
            0
        }
        fn reg_uses(&self, _id: OpId) -> RegUses {
            RegUses::new()
        }
        fn is_move(&self, _id: OpId) -> Option<(crate::reg::Reg, crate::reg::Reg)> {
            None
        }
        fn destroys_caller_saved_regs(&self, _id: OpId) -> bool {
            false
        }
        fn has_safepoint(&self, _id: OpId) -> bool {
            false
        }
        fn materialize_value(&self, _id: OpId) -> Option<crate::interval::MaterializeValue> {
            None
        }
        fn rewrite_operand(
            &mut self,
            _id: OpId,
            _old: crate::reg::Reg,
            _loc: crate::interval::Location,
        ) {
        }
        fn insert_move_after(
            &mut self,
            _after: OpId,
            _dst: crate::interval::Location,
            _src: crate::interval::Location,
            _rc: crate::reg::RegClass,
        ) {
        }
        fn insert_spill_store(
            &mut self,
            _at: OpId,
            _src: crate::interval::Location,
            _rc: crate::reg::RegClass,
        ) {
        }
        fn is_ret(&self, id: OpId) -> bool {
            id.inst_index() == self.num_insns() - 1
        }
        fn make_nop(&mut self, _id: OpId) {}
    }

    #[test]
    fn block_boundaries_detected() {
        let fixture = Fixture {
            blocks: vec![BlockId::new(0), BlockId::new(1)],
            ranges: vec![
                BlockRange::new(OpId::new(0), OpId::new(2)),
                BlockRange::new(OpId::new(4), OpId::new(6)),
            ],
        };
        let map = InstToBlockMap::build(&fixture);
        assert!(map.is_block_start(OpId::new(0)));
        assert!(!map.is_block_start(OpId::new(2)));
        assert!(map.is_block_start(OpId::new(4)));
    }
}
