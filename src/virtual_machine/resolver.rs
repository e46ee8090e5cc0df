//! Code resolution by function content hash.
//!
//! The machine never owns code: every `call` goes through a [`CodeResolver`]
//! that turns a [`FunctionId`] into a decoded [`Function`]. Two implementations
//! are provided:
//! - [`CodeRegistry`]: in-memory map, populated directly or from a decoded module
//! - [`CachingResolver`]: parses bodies fetched from a [`CodeSource`] once and
//!   memoizes the result in a concurrent map

use crate::types::hash::FunctionId;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::leb128;
use crate::virtual_machine::module::{FunctionBody, Module, Signature};
use crate::virtual_machine::operation::Function;
use crate::virtual_machine::parser::{OpcodePolicy, parse_function};
use crate::debug;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves a function hash into decoded, executable code.
pub trait CodeResolver {
    /// Fails with [`VMError::UnresolvedCode`] when no code is known for `id`.
    fn resolve(&self, id: &FunctionId) -> Result<Arc<Function>, VMError>;
}

/// Backend returning raw, undecoded function bodies (a node's code store, a
/// remote peer, a file).
pub trait CodeSource {
    fn fetch(&self, id: &FunctionId) -> Option<(Signature, FunctionBody)>;
}

/// Computes the content hash of a function: signature, locals and body bytes.
pub fn function_id(signature: &Signature, body: &FunctionBody) -> FunctionId {
    let mut bytes = Vec::with_capacity(body.code.len() + 16);
    bytes.push(0x60);
    leb128::write_u32(signature.params.len() as u32, &mut bytes);
    bytes.extend(signature.params.iter().map(|k| k.to_byte()));
    leb128::write_u32(signature.results.len() as u32, &mut bytes);
    bytes.extend(signature.results.iter().map(|k| k.to_byte()));
    leb128::write_u32(body.locals.len() as u32, &mut bytes);
    bytes.extend(body.locals.iter().map(|k| k.to_byte()));
    bytes.extend_from_slice(&body.code);
    FunctionId::of(&bytes)
}

/// In-memory code store.
#[derive(Default)]
pub struct CodeRegistry {
    functions: HashMap<FunctionId, Arc<Function>>,
}

impl CodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FunctionId, function: Arc<Function>) {
        self.functions.insert(id, function);
    }

    /// Parses and registers one function, returning its content hash.
    pub fn register(
        &mut self,
        signature: Signature,
        body: &FunctionBody,
        policy: OpcodePolicy,
    ) -> Result<FunctionId, VMError> {
        let id = function_id(&signature, body);
        let function = parse_function(signature, body, policy)?;
        self.insert(id, Arc::new(function));
        Ok(id)
    }

    /// Registers every function of a module.
    ///
    /// The returned hashes are in function index order, so they can serve
    /// directly as a contract's declared function list.
    pub fn register_module(
        &mut self,
        module: &Module,
        policy: OpcodePolicy,
    ) -> Result<Vec<FunctionId>, VMError> {
        let mut ids = Vec::with_capacity(module.code.len());
        for (index, body) in module.code.iter().enumerate() {
            let signature = module
                .signature(index as u32)
                .cloned()
                .ok_or_else(|| VMError::DecodeError {
                    offset: 0,
                    reason: format!("function {index} references an undefined type"),
                })?;
            ids.push(self.register(signature, body, policy)?);
        }
        debug!("registered {} functions", ids.len());
        Ok(ids)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl CodeResolver for CodeRegistry {
    fn resolve(&self, id: &FunctionId) -> Result<Arc<Function>, VMError> {
        self.functions
            .get(id)
            .cloned()
            .ok_or(VMError::UnresolvedCode { id: *id })
    }
}

/// Memoizing resolver over a raw-body [`CodeSource`].
///
/// Each body is parsed at most once per successful fetch; the cache can be
/// shared between machines running on different threads.
pub struct CachingResolver<S> {
    source: S,
    policy: OpcodePolicy,
    cache: DashMap<FunctionId, Arc<Function>>,
}

impl<S: CodeSource> CachingResolver<S> {
    pub fn new(source: S, policy: OpcodePolicy) -> Self {
        Self {
            source,
            policy,
            cache: DashMap::new(),
        }
    }

    /// Number of parsed functions held in the cache.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl<S: CodeSource> CodeResolver for CachingResolver<S> {
    fn resolve(&self, id: &FunctionId) -> Result<Arc<Function>, VMError> {
        if let Some(hit) = self.cache.get(id) {
            return Ok(hit.clone());
        }
        let (signature, body) = self
            .source
            .fetch(id)
            .ok_or(VMError::UnresolvedCode { id: *id })?;
        let function = Arc::new(parse_function(signature, &body, self.policy)?);
        self.cache.insert(*id, function.clone());
        Ok(function)
    }
}
