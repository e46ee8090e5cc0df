//! Gas schedule, metering and per-category profiling.
//!
//! Every operation carries a fixed step cost from this schedule, attached when
//! the function body is parsed. The interpreter charges it after the operation's
//! effect has been applied.

use crate::virtual_machine::errors::VMError;

/// Bookkeeping operations (`nop`, `else`, `end`).
pub const ZERO: u64 = 0;
/// Constants, locals, stack shuffling and region entry.
pub const BASE: u64 = 1;
/// Cheap integer and float arithmetic, comparisons, bit casts.
pub const VERY_LOW: u64 = 2;
/// Multiplication, conversions, loads/stores, branches.
pub const LOW: u64 = 3;
/// Division, square root, table branches, bulk memory.
pub const MID: u64 = 5;
/// Function calls (direct, indirect and by hash).
pub const CALL: u64 = 20;
/// Environment queries against the contract and block context.
pub const ENVIRONMENT: u64 = 10;
/// Reading a persistent storage slot.
pub const STORAGE_READ: u64 = 50;
/// Writing a persistent storage slot.
pub const STORAGE_WRITE: u64 = 200;
/// Growing linear memory.
pub const GROW: u64 = 100;

/// Default cap on the gas a single invocation may consume.
pub const DEFAULT_GAS_LIMIT: u64 = 10_000_000;

/// Number of gas categories tracked by [`GasProfile`].
const GAS_CATEGORY_COUNT: usize = 7;

/// Categories of gas consumption for profiling and debugging.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum GasCategory {
    /// Structured control flow and branches.
    Control = 0,
    /// Locals and parametric stack operations.
    Variable = 1,
    /// Numeric arithmetic, comparison and conversion.
    Numeric = 2,
    /// Linear memory access and growth.
    Memory = 3,
    /// Persistent storage reads and writes.
    Storage = 4,
    /// Function call overhead.
    Call = 5,
    /// Contract and block environment queries.
    Environment = 6,
}

impl GasCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            GasCategory::Control => "Control",
            GasCategory::Variable => "Variable",
            GasCategory::Numeric => "Numeric",
            GasCategory::Memory => "Memory",
            GasCategory::Storage => "Storage",
            GasCategory::Call => "Call",
            GasCategory::Environment => "Environment",
        }
    }

    /// All categories in discriminant order.
    const ALL: [GasCategory; GAS_CATEGORY_COUNT] = [
        GasCategory::Control,
        GasCategory::Variable,
        GasCategory::Numeric,
        GasCategory::Memory,
        GasCategory::Storage,
        GasCategory::Call,
        GasCategory::Environment,
    ];
}

/// Gas consumption profile for debugging and optimization.
///
/// Backed by a flat array indexed by [`GasCategory`] discriminant so the hot
/// path is a single saturating add.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GasProfile {
    counts: [u64; GAS_CATEGORY_COUNT],
}

impl GasProfile {
    /// Creates a new empty gas profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds gas to the specified category.
    #[inline(always)]
    pub fn add(&mut self, category: GasCategory, amount: u64) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(amount);
    }

    /// Returns the gas attributed to one category.
    pub fn get(&self, category: GasCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Returns the total gas across all categories.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Returns an iterator over all categories and their gas costs.
    pub fn iter(&self) -> impl Iterator<Item = (GasCategory, u64)> {
        GasCategory::ALL.into_iter().zip(self.counts)
    }
}

/// Remaining-budget counter for one invocation.
#[derive(Clone, Debug)]
pub struct GasMeter {
    limit: u64,
    remaining: u64,
    profile: GasProfile,
}

impl GasMeter {
    /// Creates a meter holding `limit` gas.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            remaining: limit,
            profile: GasProfile::new(),
        }
    }

    /// Deducts `cost` from the remaining budget.
    ///
    /// Fails with [`VMError::OutOfGas`] when the budget cannot cover the cost; the
    /// meter is then exhausted and every later charge fails as well.
    #[inline(always)]
    pub fn charge(&mut self, cost: u64, category: GasCategory) -> Result<(), VMError> {
        if cost > self.remaining {
            let remaining = self.remaining;
            self.profile.add(category, remaining);
            self.remaining = 0;
            return Err(VMError::OutOfGas {
                needed: cost,
                remaining,
            });
        }
        self.remaining -= cost;
        self.profile.add(category, cost);
        Ok(())
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Gas consumed so far.
    pub fn used(&self) -> u64 {
        self.limit - self.remaining
    }

    pub fn profile(&self) -> &GasProfile {
        &self.profile
    }
}
