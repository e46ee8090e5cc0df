//! 32-byte SHA3-256 hash type and the 16-byte function content identifier.

use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Length of a [`FunctionId`] in bytes.
pub const FUNCTION_ID_LEN: usize = 16;

/// Fixed-size 32-byte hash used for account and contract addresses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Creates a zero-valued hash (all bytes are 0x00).
    pub const fn zero() -> Hash {
        Hash([0u8; HASH_LEN])
    }

    /// Returns the hash as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Builds a hash from a slice, returning `None` unless it is exactly [`HASH_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Hash> {
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash(arr))
    }

    /// Creates a new SHA3-256 hash builder for incremental hashing.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

/// Incremental SHA3-256 hash builder.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashBuilder {
    /// Creates a new hash builder with empty state.
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    /// Feeds data into the hash computation.
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Feeds data and returns the builder, for chained construction.
    pub fn chain(mut self, data: &[u8]) -> Self {
        self.update(data);
        self
    }

    /// Consumes the builder and returns the final hash.
    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

/// Content identifier of a function.
///
/// The first [`FUNCTION_ID_LEN`] bytes of the SHA3-256 digest of the encoded
/// function (signature, locals and body). Call payloads address functions by
/// this identifier and code resolvers index their cache with it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct FunctionId(pub [u8; FUNCTION_ID_LEN]);

impl FunctionId {
    /// Computes the identifier of an encoded function.
    pub fn of(code: &[u8]) -> FunctionId {
        let digest = Hash::sha3().chain(code).finalize();
        let mut id = [0u8; FUNCTION_ID_LEN];
        id.copy_from_slice(&digest.0[..FUNCTION_ID_LEN]);
        FunctionId(id)
    }

    /// Builds an identifier from a slice, returning `None` unless it is exactly
    /// [`FUNCTION_ID_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<FunctionId> {
        let arr: [u8; FUNCTION_ID_LEN] = bytes.try_into().ok()?;
        Some(FunctionId(arr))
    }

    /// Returns the identifier as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}
