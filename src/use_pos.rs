//! Use positions: where, and how urgently, an interval needs to be in a
//! register.

use crate::ids::OpId;
use smallvec::SmallVec;

/// How badly a use position needs its operand in a register.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum UseKind {
    /// No requirement at all (reserved for future use; the lifetime analysis
    /// in this crate never emits one, but the allocator's `nextUsePos` query
    /// treats it as the bottom of the order).
    NoUse,
    /// A register is preferred but the value may be left in memory.
    ShouldHaveRegister,
    /// The operand must be in a register at this exact instruction.
    MustHaveRegister,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct UsePosition {
    pub op_id: OpId,
    pub kind: UseKind,
}

pub type UsePositionList = SmallVec<[UsePosition; 4]>;

/// Sorts a use-position list (built up in arbitrary order during lifetime
/// analysis) into ascending `op_id` order, required by the binary searches
/// below.
pub fn finish_use_positions(uses: &mut UsePositionList) {
    uses.sort_unstable_by_key(|u| u.op_id);
}

/// The earliest use of kind `>= kind` at or after `after`, per the query
/// described in the data model ("next use of kind >= k after opId").
pub fn next_use_at_least(uses: &UsePositionList, kind: UseKind, after: OpId) -> Option<OpId> {
    let start = uses.partition_point(|u| u.op_id < after);
    uses[start..].iter().find(|u| u.kind >= kind).map(|u| u.op_id)
}

/// The first (lowest `op_id`) use of kind `>= kind`, regardless of position.
pub fn first_use_at_least(uses: &UsePositionList, kind: UseKind) -> Option<OpId> {
    next_use_at_least(uses, kind, OpId::min_value())
}
