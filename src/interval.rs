//! The interval store (component C1): an arena of `TraceInterval`s (one per
//! virtual operand, plus split children) and `FixedInterval`s (one per
//! allocatable physical register), along with the split-family navigation
//! (`split_child_at`) the rest of the allocator relies on.

use crate::ids::{IntervalId, OpId, VarIndex};
use crate::range::{self, Range, RangeList};
use crate::reg::{RealReg, RegClass};
use crate::use_pos::{self, UseKind, UsePositionList};
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// Where an interval's value currently lives.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Unassigned,
    Register(RealReg),
    StackSlot(crate::reg::SpillSlot),
    /// The value is not stored anywhere; every use rematerializes it (see
    /// `TraceInterval::materialization_value`).
    Illegal,
}

impl fmt::Debug for Location {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Location::Unassigned => write!(fmt, "unassigned"),
            Location::Register(r) => write!(fmt, "{:?}", r),
            Location::StackSlot(s) => write!(fmt, "{:?}", s),
            Location::Illegal => write!(fmt, "illegal"),
        }
    }
}

impl Location {
    pub fn is_register(&self) -> bool {
        matches!(self, Location::Register(_))
    }
    pub fn as_register(&self) -> Option<RealReg> {
        match self {
            Location::Register(r) => Some(*r),
            _ => None,
        }
    }
}

/// The spill-state machine referenced by the spec (§4.7/§9): tracks how far
/// along the "insert exactly one store, at the right place" optimization an
/// interval's split family has gotten, so the spill-move eliminator can
/// collapse the canonical store down to the interval's definition point
/// instead of leaving a store at every reload site. Kept conservative per
/// the design note in SPEC_FULL.md §9: only `StoreAtDefinition` is acted on
/// by the eliminator; the other states exist for bookkeeping fidelity.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpillState {
    NoDefinitionFound,
    OneDefinitionFound,
    OneMoveInserted,
    StoreAtDefinition,
    StartInMemory,
    NoOptimization,
}

/// A constant value cheap enough to recompute instead of spilling.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MaterializeValue {
    I64(i64),
}

/// Live ranges of a single virtual value, or of a split child thereof.
pub struct TraceInterval {
    pub id: IntervalId,
    pub operand: VarIndex,
    pub reg_class: RegClass,
    pub ranges: RangeList,
    pub use_positions: UsePositionList,
    pub location: Location,
    pub spill_slot: Option<crate::reg::SpillSlot>,
    pub spill_state: SpillState,
    pub split_parent: IntervalId,
    pub split_children: SmallVec<[IntervalId; 2]>,
    pub materialization_value: Option<MaterializeValue>,
    /// Register hint from move coalescing (§10.7 of SPEC_FULL.md): when this
    /// interval is the destination of a `move dst <- src`, points at `src`'s
    /// root interval so the allocator's tie-break can prefer its register.
    pub hint: Option<IntervalId>,
    /// Instruction points at which this interval, while live and registered,
    /// crosses a safepoint; `bool` is "directly named by that instruction's
    /// own operands" (see verifier rule 5).
    pub safepoints: SmallVec<[(OpId, bool); 2]>,
}

impl fmt::Debug for TraceInterval {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{:?}({:?}) {:?} {:?} {:?}",
            self.id, self.operand, self.reg_class, self.location, self.ranges
        )
    }
}

impl TraceInterval {
    pub fn is_root(&self) -> bool {
        self.split_parent == self.id
    }

    pub fn from(&self) -> OpId {
        range::ranges_from(&self.ranges)
    }

    pub fn to(&self) -> OpId {
        range::ranges_to(&self.ranges)
    }

    pub fn covers(&self, pos: OpId) -> bool {
        range::ranges_cover(&self.ranges, pos)
    }

    pub fn next_intersection(&self, other: &TraceInterval) -> Option<OpId> {
        range::first_intersection(&self.ranges, &other.ranges)
    }

    pub fn next_intersection_from(&self, other: &TraceInterval, from: OpId) -> Option<OpId> {
        range::next_intersection_from(&self.ranges, &other.ranges, from)
    }

    pub fn next_intersection_with_fixed(&self, fixed: &FixedInterval, from: OpId) -> Option<OpId> {
        range::next_intersection_from(&self.ranges, &fixed.ranges, from)
    }

    pub fn next_use_at_least(&self, kind: UseKind, after: OpId) -> Option<OpId> {
        use_pos::next_use_at_least(&self.use_positions, kind, after)
    }

    pub fn first_use_at_least(&self, kind: UseKind) -> Option<OpId> {
        use_pos::first_use_at_least(&self.use_positions, kind)
    }

    pub fn can_materialize(&self) -> bool {
        self.materialization_value.is_some()
    }

    pub fn is_unhandled_ref_type(&self) -> bool {
        self.reg_class == RegClass::Ref
    }
}

/// Live ranges of a physical register, tracked only to block allocation
/// during the intervals it covers; never split, never given use positions.
pub struct FixedInterval {
    pub reg: RealReg,
    pub ranges: RangeList,
}

impl fmt::Debug for FixedInterval {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "fixed({:?}) {:?}", self.reg, self.ranges)
    }
}

impl FixedInterval {
    pub fn covers(&self, pos: OpId) -> bool {
        range::ranges_cover(&self.ranges, pos)
    }

    pub fn next_intersection_from(&self, other: &TraceInterval, from: OpId) -> Option<OpId> {
        range::next_intersection_from(&self.ranges, &other.ranges, from)
    }
}

/// Which operand "mode" a use-point lookup is resolving, per data-model
/// invariant 3: output picks the child starting at `p`; the others pick
/// the child covering `p`, or — since an input's range ends exactly at its
/// own last use (see `lifetime::visit_instruction` step 5) rather than
/// past it — the child whose range ends exactly at `p` when nothing
/// covers it outright.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SplitMode {
    Output,
    Input,
    Temp,
    Alive,
}

/// Resolution failures that are not bugs in the allocator itself — the
/// caller should treat them as "retry with a fallback allocator" per
/// SPEC_FULL.md §7.
#[derive(Clone, Debug)]
pub enum Bailout {
    NoSplitChildAt { var: VarIndex, op_id: OpId },
    NoFreeRegister { interval: IntervalId },
}

/// Owns all `TraceInterval`/`FixedInterval` entities for one trace
/// allocation. `variables[0..first_derived_index)` are the root intervals
/// (one per virtual operand encountered by lifetime analysis, in
/// definition order); everything from `first_derived_index` on is a split
/// child created during the main allocation walk.
pub struct IntervalStore {
    variables: Vec<TraceInterval>,
    var_to_interval: Vec<Option<IntervalId>>,
    fixed: Vec<Option<FixedInterval>>,
    first_derived_index: usize,
}

impl IntervalStore {
    pub fn new(num_real_regs: usize) -> Self {
        IntervalStore {
            variables: Vec::new(),
            var_to_interval: Vec::new(),
            fixed: (0..num_real_regs).map(|_| None).collect(),
            first_derived_index: 0,
        }
    }

    /// Called once lifetime analysis (C2) has created every root interval and
    /// before the allocation walk (C4) starts creating split children.
    pub fn finish_roots(&mut self) {
        self.first_derived_index = self.variables.len();
    }

    pub fn first_derived_interval_index(&self) -> usize {
        self.first_derived_index
    }

    pub fn intervals_size(&self) -> usize {
        self.variables.len()
    }

    pub fn max_op_id(&self) -> OpId {
        self.variables.iter().map(|i| i.to()).max().unwrap_or(OpId::min_value())
    }

    pub fn interval(&self, id: IntervalId) -> &TraceInterval {
        &self.variables[id.index()]
    }

    pub fn interval_mut(&mut self, id: IntervalId) -> &mut TraceInterval {
        &mut self.variables[id.index()]
    }

    pub fn interval_for(&self, var: VarIndex) -> Option<IntervalId> {
        self.var_to_interval.get(var.index()).copied().flatten()
    }

    pub fn get_or_create_interval(&mut self, var: VarIndex, rc: RegClass) -> IntervalId {
        if let Some(id) = self.interval_for(var) {
            return id;
        }
        if self.var_to_interval.len() <= var.index() {
            self.var_to_interval.resize(var.index() + 1, None);
        }
        let id = IntervalId::new(self.variables.len() as u32);
        self.variables.push(TraceInterval {
            id,
            operand: var,
            reg_class: rc,
            ranges: smallvec![],
            use_positions: smallvec![],
            location: Location::Unassigned,
            spill_slot: None,
            spill_state: SpillState::NoDefinitionFound,
            split_parent: id,
            split_children: smallvec![],
            materialization_value: None,
            hint: None,
            safepoints: smallvec![],
        });
        self.var_to_interval[var.index()] = Some(id);
        id
    }

    pub fn fixed_interval_for(&self, reg: RealReg) -> Option<&FixedInterval> {
        self.fixed[reg.get_index()].as_ref()
    }

    pub fn get_or_create_fixed_interval(&mut self, reg: RealReg) -> &mut FixedInterval {
        let slot = &mut self.fixed[reg.get_index()];
        if slot.is_none() {
            *slot = Some(FixedInterval { reg, ranges: smallvec![] });
        }
        slot.as_mut().unwrap()
    }

    pub fn fixed_intervals(&self) -> impl Iterator<Item = &FixedInterval> {
        self.fixed.iter().filter_map(|f| f.as_ref())
    }

    /// Creates a new split child of `parent_id`'s family, appended at the end
    /// of the arena (so it is always created with a strictly larger
    /// `IntervalId` than anything split before it — callers always split
    /// forward in `from()` order, which keeps `split_children` sorted without
    /// needing to re-sort).
    pub fn create_derived_interval(&mut self, parent_id: IntervalId) -> IntervalId {
        let root = self.root_of(parent_id);
        let (operand, reg_class) = {
            let p = self.interval(root);
            (p.operand, p.reg_class)
        };
        let id = IntervalId::new(self.variables.len() as u32);
        self.variables.push(TraceInterval {
            id,
            operand,
            reg_class,
            ranges: smallvec![],
            use_positions: smallvec![],
            location: Location::Unassigned,
            spill_slot: None,
            spill_state: SpillState::NoOptimization,
            split_parent: root,
            split_children: smallvec![],
            materialization_value: None,
            hint: None,
            safepoints: smallvec![],
        });
        self.interval_mut(root).split_children.push(id);
        id
    }

    pub fn root_of(&self, id: IntervalId) -> IntervalId {
        self.interval(id).split_parent
    }

    /// All members of `id`'s split family, in ascending `from()` order (the
    /// root, then its children in creation order — see the ordering
    /// guarantee on `create_derived_interval`).
    fn family(&self, id: IntervalId) -> SmallVec<[IntervalId; 4]> {
        let root = self.root_of(id);
        let mut fam: SmallVec<[IntervalId; 4]> = smallvec![root];
        fam.extend(self.interval(root).split_children.iter().copied());
        fam
    }

    /// Finds the split child of `var`'s family that should be read/written
    /// for an operand occurrence at `op_id` in mode `mode`, per data-model
    /// invariant 3: an output picks the child that starts exactly at `op_id`
    /// (a definition always begins a fresh sub-range there, split or not).
    ///
    /// Every other mode prefers a child that starts exactly at `op_id` too
    /// (a split placed right at this use hands the value to the fresh child,
    /// per `split_at`'s `op_id < pos` vs. `>= pos` use-list partition), then
    /// falls back to the child whose range covers `op_id` outright, and
    /// finally to the child whose range *ends* exactly at `op_id` — an
    /// input's own last use ends its range there rather than past it (see
    /// `lifetime::visit_instruction` step 5), so the usual half-open
    /// `covers` check alone would miss it.
    pub fn split_child_at(
        &self,
        var: VarIndex,
        op_id: OpId,
        mode: SplitMode,
    ) -> Result<IntervalId, Bailout> {
        let root = self.interval_for(var).ok_or(Bailout::NoSplitChildAt { var, op_id })?;
        let family = self.family(root);

        let found = match mode {
            SplitMode::Output => family
                .iter()
                .find(|&&id| self.interval(id).from() == op_id)
                .copied(),
            SplitMode::Input | SplitMode::Temp | SplitMode::Alive => family
                .iter()
                .find(|&&id| self.interval(id).from() == op_id)
                .or_else(|| family.iter().find(|&&id| self.interval(id).covers(op_id)))
                .or_else(|| family.iter().find(|&&id| self.interval(id).to() == op_id))
                .copied(),
        };

        found.ok_or(Bailout::NoSplitChildAt { var, op_id })
    }

    /// Splits `id` at `pos`: everything before `pos` stays on `id`, everything
    /// from `pos` onward moves to a freshly created split child, which is
    /// returned. `pos` must fall strictly inside `id`'s span
    /// (`id.from() < pos < id.to()`); the allocator only ever calls this at a
    /// `freeUntilPos`/`nextIntersection` result, which is always interior by
    /// construction.
    pub fn split_at(&mut self, id: IntervalId, pos: OpId) -> IntervalId {
        debug_assert!(
            self.interval(id).from() < pos && pos < self.interval(id).to(),
            "split position not interior"
        );

        let child_id = self.create_derived_interval(id);

        let (old_ranges, old_uses, hint) = {
            let iv = self.interval(id);
            (iv.ranges.clone(), iv.use_positions.clone(), iv.hint)
        };

        let mut before: RangeList = smallvec![];
        let mut after: RangeList = smallvec![];
        for r in old_ranges.iter() {
            if r.to <= pos {
                before.push(*r);
            } else if r.from >= pos {
                after.push(*r);
            } else {
                before.push(Range::new(r.from, pos));
                after.push(Range::new(pos, r.to));
            }
        }

        let mut uses_before: UsePositionList = smallvec![];
        let mut uses_after: UsePositionList = smallvec![];
        for u in old_uses.iter() {
            if u.op_id < pos {
                uses_before.push(*u);
            } else {
                uses_after.push(*u);
            }
        }

        self.interval_mut(id).ranges = before;
        self.interval_mut(id).use_positions = uses_before;

        let child = self.interval_mut(child_id);
        child.ranges = after;
        child.use_positions = uses_after;
        child.hint = hint;

        child_id
    }

    /// Assigns `id`'s spill slot at the moment it is first demoted to memory
    /// (§4.4's spill-slot policy): reuse the split family's slot if one
    /// already exists, otherwise allocate a fresh one via the frame builder
    /// and remember it on the root so later splits of the same family reuse
    /// it too.
    pub fn assign_spill_slot<B: crate::function::FrameBuilder>(
        &mut self,
        id: IntervalId,
        frame: &mut B,
    ) -> crate::reg::SpillSlot {
        let root = self.root_of(id);
        if let Some(slot) = self.interval(root).spill_slot {
            self.interval_mut(id).spill_slot = Some(slot);
            return slot;
        }
        let rc = self.interval(root).reg_class;
        let slot = frame.allocate_spill_slot(rc);
        self.interval_mut(root).spill_slot = Some(slot);
        self.interval_mut(id).spill_slot = Some(slot);
        slot
    }

    pub fn all_intervals(&self) -> impl Iterator<Item = &TraceInterval> {
        self.variables.iter()
    }

    pub fn all_intervals_mut(&mut self) -> impl Iterator<Item = &mut TraceInterval> {
        self.variables.iter_mut()
    }
}

/// Helper used by the lifetime analysis (C2) to push ranges built during a
/// single backward scan in descending order, then normalize once.
pub fn push_descending(ranges: &mut RangeList, r: Range) {
    range::push_range_descending(ranges, r);
}
