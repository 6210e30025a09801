//! Definitions of register classes, registers and stack slots.
//!
//! Mirrors the packed-register scheme used by the register allocators this
//! crate descends from: a `Reg` is a single `u32` that is either a virtual
//! register (an index into the function's variable space) or a real
//! register (an index into a `RealRegUniverse`), disambiguated by the top
//! bit. This keeps registers `Copy`, cheap to compare, and cheap to hash.

use std::fmt;

/// Architecture-independent register classes. `Ref` is a GC-reference-typed
/// value; it behaves like any other class for allocation purposes but is
/// singled out by the verifier (see invariant 5 in the data model) because a
/// live reference sitting in a register across a safepoint must be
/// accounted for by that instruction's own state map.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum RegClass {
    I32,
    I64,
    F32,
    F64,
    V128,
    Ref,
}

pub const NUM_REG_CLASSES: usize = 6;

impl RegClass {
    pub fn to_u32(self) -> u32 {
        match self {
            RegClass::I32 => 0,
            RegClass::I64 => 1,
            RegClass::F32 => 2,
            RegClass::F64 => 3,
            RegClass::V128 => 4,
            RegClass::Ref => 5,
        }
    }

    pub fn to_usize(self) -> usize {
        self.to_u32() as usize
    }

    pub fn from_u32(rc: u32) -> RegClass {
        match rc {
            0 => RegClass::I32,
            1 => RegClass::I64,
            2 => RegClass::F32,
            3 => RegClass::F64,
            4 => RegClass::V128,
            5 => RegClass::Ref,
            _ => panic!("RegClass::from_u32: out of range: {}", rc),
        }
    }

    pub fn short_name(self) -> &'static str {
        match self {
            RegClass::I32 => "I",
            RegClass::I64 => "J",
            RegClass::F32 => "F",
            RegClass::F64 => "D",
            RegClass::V128 => "V",
            RegClass::Ref => "R",
        }
    }
}

// Reg represents both real and virtual registers, packed into a single u32:
//
//   Virtual: 1  rc:3  index:28
//   Real:    0  rc:3  index:28
//
// This gives a compact, `Copy`, hashable representation and lets a bare
// `Reg` carry everything `TraceInterval`/`FixedInterval` need to know about
// what they represent without an extra side table.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reg {
    bits: u32,
}

const VIRTUAL_BIT: u32 = 1 << 31;
const RC_SHIFT: u32 = 28;
const RC_MASK: u32 = 0x7;
const INDEX_MASK: u32 = (1 << 28) - 1;

impl Reg {
    pub fn is_virtual(self) -> bool {
        (self.bits & VIRTUAL_BIT) != 0
    }

    pub fn is_real(self) -> bool {
        !self.is_virtual()
    }

    pub fn new_real(rc: RegClass, index: u32) -> Self {
        if index > INDEX_MASK {
            panic!("Reg::new_real: index too large");
        }
        Reg { bits: (rc.to_u32() << RC_SHIFT) | index }
    }

    pub fn new_virtual(rc: RegClass, index: u32) -> Self {
        if index > INDEX_MASK {
            panic!("Reg::new_virtual: index too large");
        }
        Reg { bits: VIRTUAL_BIT | (rc.to_u32() << RC_SHIFT) | index }
    }

    pub fn get_class(self) -> RegClass {
        RegClass::from_u32((self.bits >> RC_SHIFT) & RC_MASK)
    }

    pub fn get_index(self) -> usize {
        (self.bits & INDEX_MASK) as usize
    }

    pub fn as_real_reg(self) -> Option<RealReg> {
        if self.is_real() {
            Some(RealReg { reg: self })
        } else {
            None
        }
    }

    pub fn as_virtual_reg(self) -> Option<VirtualReg> {
        if self.is_virtual() {
            Some(VirtualReg { reg: self })
        } else {
            None
        }
    }
}

impl fmt::Debug for Reg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(
            fmt,
            "{}{}{}",
            if self.is_virtual() { "v" } else { "r" },
            self.get_index(),
            self.get_class().short_name()
        )
    }
}

/// A real (physical) register. Wraps `Reg` to statically rule out passing a
/// virtual register where a real one is required.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RealReg {
    reg: Reg,
}

impl RealReg {
    pub fn new(rc: RegClass, index: u32) -> Self {
        RealReg { reg: Reg::new_real(rc, index) }
    }
    pub fn get_class(self) -> RegClass {
        self.reg.get_class()
    }
    pub fn get_index(self) -> usize {
        self.reg.get_index()
    }
    pub fn to_reg(self) -> Reg {
        self.reg
    }
}

impl fmt::Debug for RealReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{:?}", self.reg)
    }
}

/// A virtual register (the allocator's unknown). `get_index()` is the dense
/// `varIndex` used to key `IntervalStore::variables`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualReg {
    reg: Reg,
}

impl VirtualReg {
    pub fn new(rc: RegClass, index: u32) -> Self {
        VirtualReg { reg: Reg::new_virtual(rc, index) }
    }
    pub fn get_class(self) -> RegClass {
        self.reg.get_class()
    }
    pub fn get_index(self) -> usize {
        self.reg.get_index()
    }
    pub fn to_reg(self) -> Reg {
        self.reg
    }
}

impl fmt::Debug for VirtualReg {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{:?}", self.reg)
    }
}

/// A stack spill slot, in units of the target's natural slot size.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpillSlot(u32);

impl SpillSlot {
    pub fn new(n: u32) -> Self {
        SpillSlot(n)
    }
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for SpillSlot {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "S{}", self.0)
    }
}

/// Describes, for one register class, the contiguous slice of
/// `RealRegUniverse::regs` that is allocatable, plus the scratch register
/// the allocator may use when breaking move cycles (see
/// `move_resolver::resolve`).
#[derive(Clone, Copy, Debug)]
pub struct RegClassInfo {
    pub first: usize,
    pub last: usize,
    pub suggested_scratch: Option<usize>,
}

/// A read-only description of the real registers available on the target.
/// Supplied by the embedding JIT's target description (see SPEC_FULL.md
/// §6's "target description" input). `regs[i].0.get_index() == i` for all
/// `i`, and the allocatable registers must form the initial, contiguous
/// section of `regs`.
pub struct RealRegUniverse {
    pub regs: Vec<(RealReg, String)>,
    pub allocable: usize,
    pub allocable_by_class: [Option<RegClassInfo>; NUM_REG_CLASSES],
}

impl RealRegUniverse {
    /// Checks the invariants documented on the fields above and panics if any
    /// is violated. This is a configuration-time sanity check, not part of
    /// the per-trace hot path, so a panic (rather than a `Result`) is
    /// appropriate: a malformed universe is a setup bug in the embedder.
    pub fn check_is_sane(&self) {
        let regs_len = self.regs.len();
        assert!(self.allocable <= regs_len, "allocable exceeds regs.len()");

        for (i, (reg, _name)) in self.regs.iter().enumerate() {
            assert!(reg.to_reg().is_real(), "RealRegUniverse contains a virtual reg");
            assert_eq!(reg.get_index(), i, "RealRegUniverse reg at wrong index");
        }

        let mut regs_visited = 0;
        for rc in 0..NUM_REG_CLASSES {
            match self.allocable_by_class[rc] {
                None => {}
                Some(info) => {
                    assert!(info.first <= info.last);
                    assert!(info.last < self.allocable);
                    for i in info.first..=info.last {
                        let (reg, _) = &self.regs[i];
                        assert_eq!(
                            reg.get_class(),
                            RegClass::from_u32(rc as u32),
                            "allocable_by_class grouping is not contiguous"
                        );
                        regs_visited += 1;
                    }
                }
            }
        }
        assert_eq!(
            regs_visited,
            self.allocable,
            "allocable_by_class doesn't cover all allocable regs"
        );
    }

    pub fn class_info(&self, rc: RegClass) -> Option<&RegClassInfo> {
        self.allocable_by_class[rc.to_usize()].as_ref()
    }
}
