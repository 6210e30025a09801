//! Allocator configuration (§6, §10.4): the four flags the input contract
//! names, structured into one `Options` value passed to `run()`.

/// Flags controlling optional allocator behavior. Parallels the teacher's
/// `LinearScanOptions`.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Never spill a rematerializable constant; always recompute it instead.
    pub never_spill_constants: bool,
    /// Run the verifier (C9) after allocation finishes.
    pub detailed_asserts: bool,
    /// Run the spill-move eliminator (C7) after data-flow resolution.
    pub eliminate_spill_moves: bool,
    /// Reuse the same stack slot for a variable across traces of the same
    /// compilation, keyed by `varIndex`.
    pub cache_stack_slots: bool,
    /// Populate a `Stats` counter block and return it alongside the result.
    pub stats: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            never_spill_constants: false,
            detailed_asserts: false,
            eliminate_spill_moves: true,
            cache_stack_slots: true,
            stats: false,
        }
    }
}
