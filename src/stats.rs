//! Allocation statistics (§10.2): plain data threaded through the walk by
//! the caller, not global mutable state, mirroring the teacher's own
//! `Statistics` counters.

/// Counters populated across a single `run()`, exposed to the embedder via
/// `RegAllocResult::stats` when `Options::stats` is set.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    pub num_lifetime_insns_visited: u64,
    pub num_try_allocate_reg: u64,
    pub num_reg_splits: u64,
    pub num_spills: u64,
    pub num_rematerializations: u64,
    pub num_moves_inserted: u64,
    pub num_moves_eliminated: u64,
    pub global_stack_slots: u32,
    pub allocated_stack_slots: u32,
}

impl Stats {
    pub fn new() -> Self {
        Stats::default()
    }
}
