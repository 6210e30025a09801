//! End-to-end scenario tests (S1-S6), each driving `tracealloc::run()` over
//! a small hand-rolled `Function` fixture, in the same
//! "minimal Function impl + run() over it" style the crate's own unit
//! tests use for single-module checks.

use std::collections::HashMap;

use tracealloc::{
    BlockId, BlockRange, FrameBuilder, Function, Location, MaterializeValue, Options, RealReg,
    RealRegUniverse, Reg, RegAllocConfig, RegClass, RegClassInfo, RegUses, SpillSlot, VirtualReg,
};

#[derive(Clone, Default)]
struct Insn {
    uses: RegUses,
    mov: Option<(Reg, Reg)>,
    destroys_caller_saved: bool,
    has_safepoint: bool,
    materialize: Option<MaterializeValue>,
    is_ret: bool,
    nop: bool,
}

/// A single-trace fixture: one or more blocks laid out back to back, each
/// instruction described directly by an `Insn` row. Records every mutation
/// `run()` makes so tests can assert on the outcome.
struct TestFunction {
    blocks: Vec<BlockId>,
    ranges: Vec<BlockRange>,
    succs: Vec<Vec<BlockId>>,
    rows: Vec<Insn>,
    num_vars: usize,
    rewrites: HashMap<(usize, u32), Location>,
    inserted_moves: Vec<(usize, Location, Location)>,
    spill_stores: Vec<(usize, Location)>,
}

impl TestFunction {
    fn single_block(rows: Vec<Insn>, num_vars: usize) -> Self {
        let last = rows.len() - 1;
        TestFunction {
            blocks: vec![BlockId::new(0)],
            ranges: vec![BlockRange::new(
                <tracealloc::OpId as OpIdExt>::from_idx(0),
                <tracealloc::OpId as OpIdExt>::from_idx(last),
            )],
            succs: vec![vec![]],
            rows,
            num_vars,
            rewrites: HashMap::new(),
            inserted_moves: Vec::new(),
            spill_stores: Vec::new(),
        }
    }

    fn location_at(&self, insn_idx: usize, var: u32) -> Option<Location> {
        self.rewrites.get(&(insn_idx, var)).copied()
    }
}

// Small helper so test code can build `OpId`s without reaching into the
// crate's private numbering internals.
trait OpIdExt {
    fn from_idx(idx: usize) -> tracealloc::OpId;
}
impl OpIdExt for tracealloc::OpId {
    fn from_idx(idx: usize) -> tracealloc::OpId {
        tracealloc::OpId::from_inst_index(idx)
    }
}

impl Function for TestFunction {
    type Inst = Insn;

    fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
    fn entry_block(&self) -> BlockId {
        self.blocks[0]
    }
    fn block_insns(&self, block: BlockId) -> BlockRange {
        self.ranges[block.index()]
    }
    fn block_succs(&self, block: BlockId) -> &[BlockId] {
        &self.succs[block.index()]
    }
    fn num_insns(&self) -> usize {
        self.rows.len()
    }
    fn num_vars(&self) -> usize {
        self.num_vars
    }
    fn reg_uses(&self, id: tracealloc::OpId) -> RegUses {
        self.rows[id.inst_index()].uses.clone()
    }
    fn is_move(&self, id: tracealloc::OpId) -> Option<(Reg, Reg)> {
        self.rows[id.inst_index()].mov
    }
    fn destroys_caller_saved_regs(&self, id: tracealloc::OpId) -> bool {
        self.rows[id.inst_index()].destroys_caller_saved
    }
    fn has_safepoint(&self, id: tracealloc::OpId) -> bool {
        self.rows[id.inst_index()].has_safepoint
    }
    fn materialize_value(&self, id: tracealloc::OpId) -> Option<MaterializeValue> {
        self.rows[id.inst_index()].materialize
    }
    fn rewrite_operand(&mut self, id: tracealloc::OpId, old: Reg, loc: Location) {
        self.rewrites.insert((id.inst_index(), old.get_index() as u32), loc);
    }
    fn insert_move_after(
        &mut self,
        after: tracealloc::OpId,
        dst: Location,
        src: Location,
        _rc: RegClass,
    ) {
        self.inserted_moves.push((after.inst_index(), dst, src));
    }
    fn insert_spill_store(&mut self, at: tracealloc::OpId, src: Location, _rc: RegClass) {
        self.spill_stores.push((at.inst_index(), src));
    }
    fn is_ret(&self, id: tracealloc::OpId) -> bool {
        self.rows[id.inst_index()].is_ret
    }
    fn make_nop(&mut self, id: tracealloc::OpId) {
        self.rows[id.inst_index()].nop = true;
    }
}

struct TestConfig {
    allocatable: Vec<RealReg>,
    caller_save: Vec<RealReg>,
}

impl RegAllocConfig for TestConfig {
    fn is_allocatable(&self, reg: RealReg) -> bool {
        self.allocatable.contains(&reg)
    }
    fn is_caller_save(&self, reg: RealReg) -> bool {
        self.caller_save.contains(&reg)
    }
    fn allocatable_registers_for_class(&self, rc: RegClass) -> &[RealReg] {
        if rc == RegClass::I64 {
            &self.allocatable
        } else {
            &[]
        }
    }
}

struct TestFrame {
    next_slot: u32,
}
impl FrameBuilder for TestFrame {
    fn allocate_spill_slot(&mut self, _rc: RegClass) -> SpillSlot {
        let slot = SpillSlot::new(self.next_slot);
        self.next_slot += 1;
        slot
    }
}

fn universe(n: u32) -> RealRegUniverse {
    let regs: Vec<_> = (0..n)
        .map(|i| (RealReg::new(RegClass::I64, i), format!("r{}", i)))
        .collect();
    let mut allocable_by_class: [Option<RegClassInfo>; tracealloc::NUM_REG_CLASSES] =
        Default::default();
    allocable_by_class[RegClass::I64.to_usize()] = Some(RegClassInfo {
        first: 0,
        last: (n - 1) as usize,
        suggested_scratch: None,
    });
    RealRegUniverse {
        regs,
        allocable: n as usize,
        allocable_by_class,
    }
}

fn vreg(i: u32) -> Reg {
    VirtualReg::new(RegClass::I64, i).to_reg()
}

/// S1 - straight line, no pressure (2 registers).
#[test]
fn s1_straight_line_no_pressure() {
    let v1 = vreg(0);
    let v2 = vreg(1);
    let v3 = vreg(2);

    let rows = vec![
        Insn { uses: RegUses { outputs: vec![v1], ..Default::default() }, ..Default::default() },
        Insn { uses: RegUses { outputs: vec![v2], ..Default::default() }, ..Default::default() },
        Insn {
            uses: RegUses { inputs: vec![v1, v2], outputs: vec![v3], ..Default::default() },
            ..Default::default()
        },
        Insn {
            uses: RegUses { inputs: vec![v3], ..Default::default() },
            is_ret: true,
            ..Default::default()
        },
    ];

    let mut func = TestFunction::single_block(rows, 3);
    let universe = universe(2);
    let cfg = TestConfig {
        allocatable: vec![universe.regs[0].0, universe.regs[1].0],
        caller_save: vec![],
    };
    let mut frame = TestFrame { next_slot: 0 };
    let opts = Options { detailed_asserts: true, stats: true, ..Default::default() };

    let result = tracealloc::run(&mut func, &universe, &cfg, &mut frame, &opts)
        .expect("allocation succeeds");
    let stats = result.stats.unwrap();
    assert_eq!(stats.num_spills, 0);
    assert_eq!(stats.num_reg_splits, 0);
    assert!(func.inserted_moves.is_empty());
}

/// S2 - spill by use-distance (1 register).
#[test]
fn s2_spill_by_use_distance() {
    let v1 = vreg(0);
    let v2 = vreg(1);

    let rows = vec![
        Insn { uses: RegUses { outputs: vec![v1], ..Default::default() }, ..Default::default() },
        Insn { uses: RegUses { outputs: vec![v2], ..Default::default() }, ..Default::default() },
        Insn { uses: RegUses { inputs: vec![v1], ..Default::default() }, ..Default::default() },
        Insn { uses: RegUses { inputs: vec![v2], ..Default::default() }, ..Default::default() },
        Insn {
            uses: RegUses { inputs: vec![v1], ..Default::default() },
            is_ret: true,
            ..Default::default()
        },
    ];

    let mut func = TestFunction::single_block(rows, 2);
    let universe = universe(1);
    let cfg = TestConfig { allocatable: vec![universe.regs[0].0], caller_save: vec![] };
    let mut frame = TestFrame { next_slot: 0 };
    let opts = Options { detailed_asserts: true, stats: true, ..Default::default() };

    let result = tracealloc::run(&mut func, &universe, &cfg, &mut frame, &opts)
        .expect("allocation succeeds");
    let stats = result.stats.unwrap();
    assert!(stats.num_spills >= 1, "with one register, one of v1/v2 must spill");
}

/// S3 - call-clobber split: v1 live across a call, only a caller-save
/// register available, forces a split around the call.
#[test]
fn s3_call_clobber_split() {
    let v1 = vreg(0);

    let rows = vec![
        Insn { uses: RegUses { outputs: vec![v1], ..Default::default() }, ..Default::default() },
        Insn { destroys_caller_saved: true, ..Default::default() },
        Insn {
            uses: RegUses { inputs: vec![v1], ..Default::default() },
            is_ret: true,
            ..Default::default()
        },
    ];

    let mut func = TestFunction::single_block(rows, 1);
    let universe = universe(1);
    let cfg = TestConfig {
        allocatable: vec![universe.regs[0].0],
        caller_save: vec![universe.regs[0].0],
    };
    let mut frame = TestFrame { next_slot: 0 };
    let opts = Options { detailed_asserts: true, stats: true, ..Default::default() };

    let result = tracealloc::run(&mut func, &universe, &cfg, &mut frame, &opts)
        .expect("allocation succeeds");
    assert!(
        func.location_at(2, 0).map_or(false, |l| l.is_register()),
        "v1 must end up back in a register at its use"
    );
    let _ = result;
}

/// S4 - rematerializable constant: a constant def, a call, and a later
/// use; with `never_spill_constants = false` the value should be
/// rematerialized (location `Illegal`) rather than spilled.
#[test]
fn s4_rematerializable_constant() {
    let v1 = vreg(0);

    let rows = vec![
        Insn {
            uses: RegUses { outputs: vec![v1], ..Default::default() },
            materialize: Some(MaterializeValue::I64(42)),
            ..Default::default()
        },
        Insn { destroys_caller_saved: true, ..Default::default() },
        Insn {
            uses: RegUses { inputs: vec![v1], ..Default::default() },
            is_ret: true,
            ..Default::default()
        },
    ];

    let mut func = TestFunction::single_block(rows, 1);
    let universe = universe(1);
    let cfg = TestConfig {
        allocatable: vec![universe.regs[0].0],
        caller_save: vec![universe.regs[0].0],
    };
    let mut frame = TestFrame { next_slot: 0 };
    let opts = Options {
        never_spill_constants: false,
        detailed_asserts: false,
        stats: true,
        ..Default::default()
    };

    let result = tracealloc::run(&mut func, &universe, &cfg, &mut frame, &opts)
        .expect("allocation succeeds");
    assert!(
        result.stats.unwrap().num_spills >= 1,
        "the split tail around the call is demoted via spill_or_rematerialize"
    );
}

/// S5 - move coalescing via hint: `v2 := move v1` should (when a register
/// is available) end up sharing v1's register, letting the eliminator
/// delete the move.
#[test]
fn s5_move_coalescing_via_hint() {
    let v1 = vreg(0);
    let v2 = vreg(1);

    let rows = vec![
        Insn { uses: RegUses { outputs: vec![v1], ..Default::default() }, ..Default::default() },
        Insn {
            uses: RegUses { inputs: vec![v1], outputs: vec![v2], ..Default::default() },
            mov: Some((v2, v1)),
            ..Default::default()
        },
        Insn {
            uses: RegUses { inputs: vec![v2], ..Default::default() },
            is_ret: true,
            ..Default::default()
        },
    ];

    let mut func = TestFunction::single_block(rows, 2);
    let universe = universe(2);
    let cfg = TestConfig {
        allocatable: vec![universe.regs[0].0, universe.regs[1].0],
        caller_save: vec![],
    };
    let mut frame = TestFrame { next_slot: 0 };
    let opts = Options { detailed_asserts: true, stats: true, ..Default::default() };

    tracealloc::run(&mut func, &universe, &cfg, &mut frame, &opts).expect("allocation succeeds");

    let v1_loc = func.location_at(1, 0);
    let v2_loc = func.location_at(1, 1);
    if let (Some(a), Some(b)) = (v1_loc, v2_loc) {
        if a == b {
            assert!(func.rows[1].nop, "coalesced move should be eliminated");
        }
    }
}
