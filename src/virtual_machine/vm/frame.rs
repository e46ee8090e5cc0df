use crate::virtual_machine::operation::Function;
use std::sync::Arc;

/// An open block, loop or if region inside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Scope {
    /// Index into the function's control-block table.
    pub(super) block: u32,
    /// Value-stack height when the region was entered.
    pub(super) height: usize,
}

/// Activation record for one function call.
#[derive(Clone, Debug)]
pub(super) struct Frame {
    pub(super) function: Arc<Function>,
    /// Parameters followed by declared locals.
    pub(super) locals: Vec<u64>,
    /// Index of the next operation; the resume point while a callee runs.
    pub(super) ip: usize,
    /// Enclosing regions, innermost last. Label depth `N` is `scopes[len - 1 - N]`.
    pub(super) scopes: Vec<Scope>,
    /// Value-stack height below which this frame may not pop.
    pub(super) base: usize,
}

impl Frame {
    /// Creates a frame whose first locals are `args`; the rest start zeroed.
    pub(super) fn new(function: Arc<Function>, mut args: Vec<u64>, base: usize) -> Self {
        args.resize(function.frame_size(), 0);
        Self {
            function,
            locals: args,
            ip: 0,
            scopes: Vec::new(),
            base,
        }
    }
}
