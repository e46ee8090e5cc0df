//! Metered, stack-based bytecode virtual machine for smart contract execution.
//!
//! Contract code is a WebAssembly-like binary module. Functions are decoded once
//! into a flat operation stream plus a side-table of structured control regions,
//! addressed by content hash, and executed against an explicit value stack,
//! linear memory and persistent slot storage under a gas budget.
//!
//! # Architecture
//!
//! - **Values**: every stack slot and local is a 64-bit word; floats are stored
//!   as their bit pattern
//! - **Control flow**: `block`/`loop`/`if` regions are resolved at decode time into
//!   [`operation::ControlBlock`] entries; branches jump by operation index
//! - **Calls**: targets are resolved by [`types::hash::FunctionId`](crate::types::hash::FunctionId)
//!   through a [`resolver::CodeResolver`]; the interpreter loop never recurses
//! - **Gas metering**: every operation carries a fixed cost charged after its
//!   effect, with per-category profiling
//!
//! # Modules
//!
//! - [`contract`]: Contract, block context and call payload encoding
//! - [`errors`]: Decode and execution error type
//! - [`isa`]: Opcode table, immediates and gas schedule
//! - [`leb128`]: Variable-length integer codec
//! - [`module`]: Binary module decoder
//! - [`operation`]: Decoded operations, control blocks and typed values
//! - [`parser`]: Function body decoder
//! - [`resolver`]: Code resolution by content hash
//! - [`storage`]: Persistent slot storage and change diffs
//! - [`vm`]: Interpreter core, linear memory and gas metering

pub mod contract;
pub mod errors;
pub mod isa;
#[cfg(test)]
mod isa_static_check;
pub mod leb128;
pub mod module;
pub mod operation;
pub mod parser;
pub mod resolver;
pub mod storage;
pub mod vm;
