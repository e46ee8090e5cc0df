//! Core type definitions shared by the VM and its host.
//!
//! - `Hash`: fixed-size 32-byte SHA3-256 hashes identifying accounts
//! - `FunctionId`: 16-byte content hash identifying a function body

pub mod hash;
