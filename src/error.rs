//! Public error type (§7, §10.5). Recoverable allocation failures are
//! reported to the caller as `RegAllocError`; internal invariant
//! violations are `debug_assert!`/`panic!` at the point of detection, not a
//! `Result` path, mirroring how the teacher draws this exact line.

use crate::ids::{IntervalId, OpId, VarIndex};
use std::fmt;

/// Why allocation bailed out of this trace. The caller's response is
/// always the same: discard the trace's partial mutations and fall back to
/// a non-trace allocator for this compilation. None of these indicate a
/// defect in the allocator itself.
#[derive(Clone, Debug)]
pub enum RegAllocError {
    /// `splitChildAt` found no split child covering the requested operand
    /// occurrence.
    NoSplitChildAt { var: VarIndex, op_id: OpId },
    /// The main walk could not find any register, spill candidate, or split
    /// point to satisfy a must-have-register use.
    OutOfRegisters { interval: IntervalId, at: OpId },
    /// The verifier (C9) found an invariant violation in a finished
    /// allocation, run only under `Options::detailed_asserts`.
    VerificationFailed { reason: String },
}

impl fmt::Display for RegAllocError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RegAllocError::NoSplitChildAt { var, op_id } => {
                write!(fmt, "no split child of {:?} covers {:?}", var, op_id)
            }
            RegAllocError::OutOfRegisters { interval, at } => {
                write!(
                    fmt,
                    "no register, spill, or split point available for {:?} at {:?}",
                    interval, at
                )
            }
            RegAllocError::VerificationFailed { reason } => {
                write!(fmt, "verification failed: {}", reason)
            }
        }
    }
}

impl std::error::Error for RegAllocError {}

impl From<crate::interval::Bailout> for RegAllocError {
    fn from(b: crate::interval::Bailout) -> Self {
        match b {
            crate::interval::Bailout::NoSplitChildAt { var, op_id } => {
                RegAllocError::NoSplitChildAt { var, op_id }
            }
            crate::interval::Bailout::NoFreeRegister { interval } => {
                RegAllocError::OutOfRegisters { interval, at: OpId::min_value() }
            }
        }
    }
}
