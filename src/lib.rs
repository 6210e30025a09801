//! A trace-based linear-scan register allocator for a low-level JIT LIR.
//!
//! The allocator consumes a single trace — a linearly ordered sequence of
//! basic blocks produced by an upstream trace-builder — and assigns every
//! virtual operand a physical register, a stack slot, or a
//! rematerialization marker, mutating the trace's instructions in place.
//! Building traces, computing SSA/dominance, frame-layout finalization,
//! machine-code emission, and cross-trace resolution are all handled by
//! collaborators outside this crate.

mod allocator;
mod assign;
mod config;
mod dataflow;
mod error;
mod function;
mod ids;
mod interval;
mod lifetime;
mod move_resolver;
mod numbering;
mod range;
mod reg;
mod scaffold;
mod spill_elim;
mod stats;
mod use_pos;
mod verify;

pub use config::Options;
pub use error::RegAllocError;
pub use function::{BlockRange, FrameBuilder, Function, RegAllocConfig, RegUses};
pub use ids::{BlockId, OpId, VarIndex};
pub use interval::{Location, MaterializeValue};
pub use reg::{
    RealReg, RealRegUniverse, Reg, RegClass, RegClassInfo, SpillSlot, VirtualReg, NUM_REG_CLASSES,
};
pub use stats::Stats;

use interval::IntervalStore;
use log::info;

/// The outcome of a successful `run()`: the trace was mutated in place, and
/// `stats` carries whatever counters `Options::stats` asked for.
pub struct RegAllocResult {
    pub stats: Option<Stats>,
}

/// Runs the allocator over `func`'s single trace, mutating its
/// instructions in place. On success, every variable operand occurrence
/// has been rewritten to its assigned register, stack slot, or
/// rematerialization immediate, and resolving moves have been spliced onto
/// intra-trace block edges.
///
/// Fails with `RegAllocError` when the trace cannot be allocated (no
/// register available, a malformed `splitChildAt` query, or — only under
/// `opts.detailed_asserts` — a verifier violation); the caller is expected
/// to abandon this trace's mutations and fall back to a non-trace
/// allocator, since none of these indicate a bug in the allocator itself.
pub fn run<F, C, B>(
    func: &mut F,
    universe: &RealRegUniverse,
    cfg: &C,
    frame: &mut B,
    opts: &Options,
) -> Result<RegAllocResult, RegAllocError>
where
    F: Function,
    C: RegAllocConfig,
    B: FrameBuilder,
{
    universe.check_is_sane();
    numbering::validate(func);

    let mut stats = Stats::new();

    info!("lifetime analysis: {} instructions", func.num_insns());
    let mut store = IntervalStore::new(universe.regs.len());
    lifetime::analyze(func, cfg, &mut store, &mut stats);

    info!("linear scan: {} root intervals", store.first_derived_interval_index());
    allocator::allocate(&mut store, universe, cfg, frame, opts.never_spill_constants, &mut stats)?;

    info!("data-flow resolution");
    dataflow::resolve(func, &store, universe, frame, &mut stats)?;

    if opts.eliminate_spill_moves {
        info!("spill-move elimination");
        spill_elim::eliminate(func, &store, &mut stats);
    }

    info!("location assignment");
    assign::assign(func, &store)?;

    if opts.detailed_asserts {
        verify::verify(&store)?;
    }

    Ok(RegAllocResult { stats: if opts.stats { Some(stats) } else { None } })
}
