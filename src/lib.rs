//! Contract VM library.
//!
//! Provides a metered, stack-based interpreter for WebAssembly-style smart-contract
//! bytecode, together with the binary decoder, code resolution and storage diffing
//! it needs to run inside a blockchain node.

pub mod types;
pub mod utils;
pub mod virtual_machine;
