//! Typed index types used throughout the crate.
//!
//! Using newtypes instead of raw `u32`/`usize` keeps the various index
//! spaces (instructions, blocks, intervals, variables) from being mixed up
//! by accident; `rustc-hash` maps below key off these types directly.

use std::fmt;

macro_rules! define_id {
    ($name:ident, $prefix:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl $name {
            #[inline(always)]
            pub fn new(n: u32) -> Self {
                Self(n)
            }
            #[inline(always)]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
                write!(fmt, "{}{}", $prefix, self.0)
            }
        }

        impl From<u32> for $name {
            fn from(n: u32) -> Self {
                Self(n)
            }
        }
    };
}

define_id!(BlockId, "b");
define_id!(VarIndex, "v");
define_id!(IntervalId, "int");

/// An instruction identifier in the trace, per the even-ID convention: IDs
/// strictly increase along the trace, consecutive instructions differ by 2,
/// and all instruction IDs are even. The odd slot between two instructions
/// (`id | 1`) is the "gap" where resolution moves may be inserted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpId(u32);

impl OpId {
    pub fn new(n: u32) -> Self {
        debug_assert!(n % 2 == 0, "instruction ids must be even, got {}", n);
        Self(n)
    }

    /// The dense instruction index (0, 1, 2, ...) this id corresponds to.
    #[inline(always)]
    pub fn inst_index(self) -> usize {
        (self.0 / 2) as usize
    }

    pub fn from_inst_index(index: usize) -> Self {
        Self((index as u32) * 2)
    }

    #[inline(always)]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The gap position immediately after this instruction, where a resolving
    /// move may be inserted.
    pub fn gap_after(self) -> u32 {
        self.0 + 1
    }

    pub fn next(self) -> OpId {
        OpId(self.0 + 2)
    }

    pub fn prev(self) -> OpId {
        debug_assert!(self.0 >= 2);
        OpId(self.0 - 2)
    }

    pub fn min_value() -> Self {
        OpId(0)
    }

    pub fn max_value() -> Self {
        OpId(u32::max_value() & !1)
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "@{}", self.0)
    }
}

pub type Map<K, V> = rustc_hash::FxHashMap<K, V>;
pub type Set<T> = rustc_hash::FxHashSet<T>;
