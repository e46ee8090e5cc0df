//! Interpreter core.
//!
//! A [`Machine`] owns the value stack, linear memory, persistent storage, the
//! call-frame stack and the gas meter. [`Machine::run`] is a single flat loop:
//! each step evaluates one [`Operation`] of the current frame and returns an
//! explicit [`Flow`] telling the loop whether to advance, jump, push a callee
//! frame or pop the current one. Nested regions never recurse; they are tracked
//! by the frame's scope list, so a `call` from any nesting depth simply saves
//! the caller's resume point and switches frames.
//!
//! Every value is a 64-bit word. `i32` values are zero-extended and floats are
//! stored as their bit pattern.

pub mod gas;
pub mod memory;

mod env;
mod frame;
mod numeric;
#[cfg(test)]
mod tests;

use crate::types::hash::FunctionId;
use crate::virtual_machine::contract::{CallPayload, Contract, ExecContext};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::module::{ConstExpr, DataMode, Module, Signature};
use crate::virtual_machine::operation::{BlockKind, ControlBlock, Function, Instr, Operation, Slot, Value};
use crate::virtual_machine::resolver::{CodeResolver, function_id};
use crate::virtual_machine::storage::Storage;
use crate::{debug, trace};
use frame::{Frame, Scope};
use gas::{GasMeter, GasProfile};
use memory::LinearMemory;
use numeric::{canonical_f32, canonical_f64};

pub use numeric::{CANONICAL_NAN_F32, CANONICAL_NAN_F64};
use std::sync::Arc;

/// Default maximum number of simultaneously active frames.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;
/// Default maximum value-stack height, in words.
pub const DEFAULT_MAX_STACK_HEIGHT: usize = 65_536;
/// Default maximum linear memory size, in pages.
pub const DEFAULT_MAX_MEMORY_PAGES: u32 = 256;
/// Largest function table a module may declare.
pub const MAX_TABLE_SIZE: u32 = 65_536;

/// Resource limits of a machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    pub max_call_depth: usize,
    pub max_stack_height: usize,
    pub max_memory_pages: u32,
    /// Cap on the gas a contract may request for one invocation.
    pub gas_limit: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_stack_height: DEFAULT_MAX_STACK_HEIGHT,
            max_memory_pages: DEFAULT_MAX_MEMORY_PAGES,
            gas_limit: gas::DEFAULT_GAS_LIMIT,
        }
    }
}

impl MachineConfig {
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_max_stack_height(mut self, height: usize) -> Self {
        self.max_stack_height = height;
        self
    }

    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    pub fn with_gas_limit(mut self, gas: u64) -> Self {
        self.gas_limit = gas;
        self
    }
}

/// Collaborators of one invocation.
#[derive(Clone, Copy)]
pub struct Env<'a> {
    pub resolver: &'a dyn CodeResolver,
    pub contract: &'a Contract,
    pub context: &'a ExecContext,
}

/// Outcome of a successful invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    /// Values left by the function, typed by its declared results.
    pub results: Vec<Value>,
    pub gas_used: u64,
    pub profile: GasProfile,
}

/// What the run loop does after a step.
#[derive(Debug)]
enum Flow {
    /// Advance to the next operation.
    Next,
    /// Continue at the given operation index of the current frame.
    Jump(usize),
    /// Suspend the current frame and enter the callee.
    Call(Arc<Function>),
    /// Pop the current frame.
    Return,
}

/// The execution context of contract code.
pub struct Machine {
    config: MachineConfig,
    stack: Vec<u64>,
    /// Stack base of the current frame.
    base: usize,
    frames: Vec<Frame>,
    memory: LinearMemory,
    storage: Storage,
    /// `call_indirect` targets, by content hash.
    table: Vec<Option<FunctionId>>,
    /// Module types, used to check `call_indirect` signatures.
    types: Vec<Signature>,
    gas: GasMeter,
}

impl Machine {
    /// Creates a machine without memory, table or storage defaults.
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            stack: Vec::new(),
            base: 0,
            frames: Vec::new(),
            memory: LinearMemory::new(0, config.max_memory_pages),
            storage: Storage::new(),
            table: Vec::new(),
            types: Vec::new(),
            gas: GasMeter::new(0),
        }
    }

    /// Creates a machine for a decoded module.
    ///
    /// Allocates the module's initial memory and copies active data segments
    /// into it, fills the function table from element segments, and makes
    /// every global's initial value the default of the storage slot with the
    /// same index.
    pub fn instantiate(module: &Module, config: MachineConfig) -> Result<Machine, VMError> {
        let mut machine = Machine::new(config);

        if let Some(limits) = module.memory {
            let max = limits
                .max
                .map_or(config.max_memory_pages, |max| max.min(config.max_memory_pages));
            if limits.min > max {
                return Err(VMError::Instantiation {
                    reason: format!("memory needs {} pages, limit is {max}", limits.min),
                });
            }
            machine.memory = LinearMemory::new(limits.min, max);
        }

        for segment in &module.data {
            if let DataMode::Active { memory, offset } = &segment.mode {
                if *memory != 0 {
                    return Err(VMError::Instantiation {
                        reason: format!("data segment targets memory {memory}"),
                    });
                }
                let at = const_offset(module, offset)?;
                machine.memory.write(at, &segment.bytes)?;
            }
        }

        if let Some(table) = module.tables.first() {
            if table.limits.min > MAX_TABLE_SIZE {
                return Err(VMError::Instantiation {
                    reason: format!("table of {} elements exceeds limit", table.limits.min),
                });
            }
            machine.table = vec![None; table.limits.min as usize];
        }

        if !module.elements.is_empty() {
            let ids = module
                .code
                .iter()
                .enumerate()
                .map(|(index, body)| {
                    module
                        .signature(index as u32)
                        .map(|signature| function_id(signature, body))
                })
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| VMError::Instantiation {
                    reason: "function references an undefined type".to_string(),
                })?;

            for segment in &module.elements {
                let start = const_offset(module, &segment.offset)? as usize;
                for (k, &function) in segment.functions.iter().enumerate() {
                    let id = ids.get(function as usize).ok_or_else(|| VMError::Instantiation {
                        reason: format!("element references undefined function {function}"),
                    })?;
                    let slot = machine.table.get_mut(start + k).ok_or_else(|| {
                        VMError::Instantiation {
                            reason: format!("element segment overflows table at {}", start + k),
                        }
                    })?;
                    *slot = Some(*id);
                }
            }
        }

        for (index, global) in module.globals.iter().enumerate() {
            if let Some(word) = const_word(module, &global.init) {
                machine.storage.set_default(index as u32, word);
            }
        }

        machine.types = module.types.clone();
        debug!(
            "instantiated module: {} memory pages, {} table slots, {} storage defaults",
            machine.memory.pages(),
            machine.table.len(),
            module.globals.len()
        );
        Ok(machine)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    pub fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }

    /// Current value stack, bottom first.
    pub fn stack(&self) -> &[u64] {
        &self.stack
    }

    /// Gas left in the current (or last) invocation.
    pub fn gas_remaining(&self) -> u64 {
        self.gas.remaining()
    }

    /// Invokes a function declared by `env.contract`.
    pub fn invoke(&mut self, env: &Env<'_>, payload: &CallPayload) -> Result<Execution, VMError> {
        if !env.contract.declares(&payload.id) {
            return Err(VMError::UnknownFunction {
                function: payload.id.to_string(),
            });
        }
        let function = env.resolver.resolve(&payload.id)?;
        self.execute(env, function, &payload.params)
    }

    /// Decodes a byte-encoded [`CallPayload`] and invokes it.
    pub fn invoke_encoded(&mut self, env: &Env<'_>, payload: &[u8]) -> Result<Execution, VMError> {
        let payload = CallPayload::decode(payload)?;
        self.invoke(env, &payload)
    }

    /// Runs `function` to completion with `args` as its parameters.
    ///
    /// The value stack and call stack are reset first; memory and storage carry
    /// over from earlier executions. On error, nothing is rolled back.
    pub fn execute(
        &mut self,
        env: &Env<'_>,
        function: Arc<Function>,
        args: &[Value],
    ) -> Result<Execution, VMError> {
        let params = &function.signature.params;
        if params.len() != args.len() {
            return Err(VMError::ParamArityMismatch {
                expected: params.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, kind)) in args.iter().zip(params).enumerate() {
            if arg.kind() != *kind {
                return Err(VMError::ParamTypeMismatch {
                    index,
                    expected: kind.name(),
                    actual: arg.kind().name(),
                });
            }
        }

        self.stack.clear();
        self.frames.clear();
        self.base = 0;
        self.gas = GasMeter::new(env.contract.gas.min(self.config.gas_limit));
        debug!(
            "executing function with {} params, gas limit {}",
            args.len(),
            self.gas.limit()
        );

        let words = args.iter().map(Value::to_word).collect();
        self.frames.push(Frame::new(function.clone(), words, 0));
        if let Err(err) = self.run(env) {
            debug!("execution failed after {} gas: {err}", self.gas.used());
            return Err(err);
        }

        let kinds = &function.signature.results;
        let first = self
            .stack
            .len()
            .checked_sub(kinds.len())
            .ok_or(VMError::StackUnderflow)?;
        let results = self
            .stack
            .split_off(first)
            .into_iter()
            .zip(kinds)
            .map(|(word, kind)| Value::from_word(*kind, word))
            .collect();

        debug!("execution finished, gas used {}", self.gas.used());
        Ok(Execution {
            results,
            gas_used: self.gas.used(),
            profile: self.gas.profile().clone(),
        })
    }

    /// Steps the frame stack until the outermost frame returns.
    fn run(&mut self, env: &Env<'_>) -> Result<(), VMError> {
        while let Some(frame) = self.frames.last() {
            let function = Arc::clone(&frame.function);
            let mut ip = frame.ip;

            loop {
                let Some(op) = function.operations.get(ip) else {
                    self.leave()?;
                    break;
                };
                let flow = self.step(env, &function, op, ip)?;
                self.gas.charge(op.gas, op.category)?;

                match flow {
                    Flow::Next => ip += 1,
                    Flow::Jump(target) => ip = target,
                    Flow::Call(callee) => {
                        if let Some(frame) = self.frames.last_mut() {
                            frame.ip = ip + 1;
                        }
                        self.enter(callee)?;
                        break;
                    }
                    Flow::Return => {
                        self.leave()?;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the effect of one operation.
    fn step(
        &mut self,
        env: &Env<'_>,
        function: &Function,
        op: &Operation,
        ip: usize,
    ) -> Result<Flow, VMError> {
        match &op.instr {
            Instr::Unreachable => return Err(VMError::Unreachable),
            Instr::Nop => {}
            Instr::Block { block } | Instr::Loop { block } => self.open_scope(*block)?,
            Instr::If { block } => return self.exec_if(function, *block, ip),
            Instr::Else { block } => {
                // End of the then-arm: skip the else-arm.
                let entry = self.innermost(function, *block, ip)?;
                return Ok(Flow::Jump(entry.end_at));
            }
            Instr::End { block: Some(block) } => self.close_scope(function, *block, ip)?,
            Instr::End { block: None } | Instr::Return => return Ok(Flow::Return),
            Instr::Br { depth } => return self.branch(function, *depth).map(Flow::Jump),
            Instr::BrIf { depth } => {
                if self.pop_i32()? != 0 {
                    return self.branch(function, *depth).map(Flow::Jump);
                }
            }
            Instr::BrTable { targets, default } => {
                let index = self.pop_u32()? as usize;
                let depth = targets.get(index).copied().unwrap_or(*default);
                return self.branch(function, depth).map(Flow::Jump);
            }
            Instr::Call { function: index } => {
                let id = env.contract.function(*index)?;
                return env.resolver.resolve(&id).map(Flow::Call);
            }
            Instr::CallIndirect { type_index, .. } => {
                return self.call_indirect(env, *type_index).map(Flow::Call);
            }
            Instr::Drop => {
                self.pop()?;
            }
            Instr::Select => {
                let condition = self.pop_i32()?;
                let second = self.pop()?;
                let first = self.pop()?;
                self.push(if condition != 0 { first } else { second })?;
            }
            Instr::LocalGet(index) => {
                let word = *self.local_mut(*index)?;
                self.push(word)?;
            }
            Instr::LocalSet(index) => {
                let word = self.pop()?;
                *self.local_mut(*index)? = word;
            }
            Instr::LocalTee(index) => {
                let word = self.pop()?;
                *self.local_mut(*index)? = word;
                self.push(word)?;
            }
            Instr::GlobalGet(slot) => {
                let slot = self.slot(*slot)?;
                let word = self.storage.read(slot);
                self.push(word)?;
            }
            Instr::GlobalSet(slot) => {
                let word = self.pop()?;
                let slot = self.slot(*slot)?;
                self.storage.write(slot, word);
            }
            Instr::Load(opcode, memarg) => self.exec_load(*opcode, memarg)?,
            Instr::Store(opcode, memarg) => self.exec_store(*opcode, memarg)?,
            Instr::MemorySize => self.push_i32(self.memory.pages() as i32)?,
            Instr::MemoryGrow => self.exec_memory_grow()?,
            Instr::I32Const(v) => self.push_i32(*v)?,
            Instr::I64Const(v) => self.push_i64(*v)?,
            Instr::F32Const(bits) => self.push(*bits as u64)?,
            Instr::F64Const(bits) => self.push(*bits)?,
            Instr::Numeric(opcode) => self.exec_numeric(*opcode)?,
            Instr::Misc(op) => self.exec_misc(*op)?,
            Instr::Env(opcode) => return self.exec_env(*opcode, env),
        }
        Ok(Flow::Next)
    }

    // ==================== Frames ====================

    fn frame_mut(&mut self) -> Result<&mut Frame, VMError> {
        self.frames.last_mut().ok_or(VMError::StackUnderflow)
    }

    /// Pops the callee's parameters and makes it the current frame.
    fn enter(&mut self, callee: Arc<Function>) -> Result<(), VMError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(VMError::CallDepthExceeded {
                max: self.config.max_call_depth,
            });
        }
        let count = callee.signature.params.len();
        if self.stack.len() < self.base + count {
            return Err(VMError::StackUnderflow);
        }
        let args = self.stack.split_off(self.stack.len() - count);
        let base = self.stack.len();
        trace!(
            "enter frame {} ({} params, {} locals, stack base {base})",
            self.frames.len(),
            count,
            callee.locals.len()
        );
        self.frames.push(Frame::new(callee, args, base));
        self.base = base;
        Ok(())
    }

    /// Pops the current frame, leaving exactly its declared results on the stack.
    fn leave(&mut self) -> Result<(), VMError> {
        let frame = self.frames.pop().ok_or(VMError::StackUnderflow)?;
        let arity = frame.function.signature.results.len();
        let height = self.stack.len();
        if height < frame.base + arity {
            return Err(VMError::StackUnderflow);
        }
        self.stack.drain(frame.base..height - arity);
        self.base = self.frames.last().map_or(0, |f| f.base);
        trace!(
            "leave frame {} ({arity} results, {} discarded)",
            self.frames.len(),
            height - arity - frame.base
        );
        Ok(())
    }

    fn local_mut(&mut self, index: u32) -> Result<&mut u64, VMError> {
        let frame = self.frame_mut()?;
        let count = frame.locals.len();
        frame
            .locals
            .get_mut(index as usize)
            .ok_or(VMError::LocalOutOfRange { index, count })
    }

    fn slot(&mut self, slot: Slot) -> Result<u32, VMError> {
        match slot {
            Slot::Immediate(index) => Ok(index),
            Slot::FromStack => self.pop_u32(),
        }
    }

    fn call_indirect(&mut self, env: &Env<'_>, type_index: u32) -> Result<Arc<Function>, VMError> {
        let element = self.pop_u32()?;
        let id = self
            .table
            .get(element as usize)
            .copied()
            .flatten()
            .ok_or(VMError::UndefinedTableElement { element })?;
        let callee = env.resolver.resolve(&id)?;
        match self.types.get(type_index as usize) {
            Some(expected) if *expected == callee.signature => Ok(callee),
            _ => Err(VMError::IndirectCallMismatch { element }),
        }
    }

    // ==================== Control flow ====================

    fn open_scope(&mut self, block: u32) -> Result<(), VMError> {
        let height = self.stack.len();
        self.frame_mut()?.scopes.push(Scope { block, height });
        Ok(())
    }

    /// Closes the innermost region, checking it did not shrink the value stack.
    ///
    /// Only the region's result words are kept above its entry height.
    fn close_scope(&mut self, function: &Function, block: u32, ip: usize) -> Result<(), VMError> {
        let exit = self.stack.len();
        let frame = self.frame_mut()?;
        let open = frame.scopes.len();
        let scope = match frame.scopes.pop() {
            Some(scope) if scope.block == block => scope,
            _ => return Err(VMError::InvalidBranch { depth: 0, open }),
        };
        if exit < scope.height {
            return Err(VMError::StackConsistencyFault {
                ip,
                entry: scope.height,
                exit,
            });
        }
        let arity = function.blocks.get(block as usize).map_or(0, ControlBlock::arity);
        self.unwind(scope.height, arity);
        Ok(())
    }

    /// Drops the words between `height` and the top `keep` words.
    fn unwind(&mut self, height: usize, keep: usize) {
        let top = self.stack.len();
        if top > height + keep {
            self.stack.drain(height..top - keep);
        }
    }

    /// Returns the control block of the innermost open region, which must be `block`.
    fn innermost(&mut self, function: &Function, block: u32, ip: usize) -> Result<ControlBlock, VMError> {
        let frame = self.frame_mut()?;
        match (frame.scopes.last(), function.blocks.get(block as usize)) {
            (Some(scope), Some(entry)) if scope.block == block && entry.kind == BlockKind::If => {
                Ok(*entry)
            }
            _ => Err(VMError::MalformedIf {
                ip,
                reason: "else outside of its if region",
            }),
        }
    }

    fn exec_if(&mut self, function: &Function, block: u32, ip: usize) -> Result<Flow, VMError> {
        let entry = *function.blocks.get(block as usize).ok_or(VMError::MalformedIf {
            ip,
            reason: "missing control block",
        })?;
        if entry.kind != BlockKind::If || entry.start_at != ip {
            return Err(VMError::MalformedIf {
                ip,
                reason: "control block does not describe this if",
            });
        }
        if entry.end_at <= ip
            || entry
                .else_at
                .is_some_and(|else_at| else_at <= ip || else_at >= entry.end_at)
        {
            return Err(VMError::MalformedIf {
                ip,
                reason: "else or end outside of the region",
            });
        }

        let condition = self.pop_i32()?;
        self.open_scope(block)?;
        Ok(match (condition != 0, entry.else_at) {
            (true, _) => Flow::Next,
            (false, Some(else_at)) => Flow::Jump(else_at + 1),
            (false, None) => Flow::Jump(entry.end_at),
        })
    }

    /// Resolves label `depth` and returns the operation index to continue at.
    ///
    /// Regions nested inside the target are closed. A loop target stays open
    /// (continue); a block or if target is closed by the `end` the branch lands on.
    /// The value stack is cut back to the target's entry height plus the
    /// values its label carries.
    fn branch(&mut self, function: &Function, depth: u32) -> Result<usize, VMError> {
        let frame = self.frame_mut()?;
        let open = frame.scopes.len();
        let invalid = VMError::InvalidBranch { depth, open };
        let index = open.checked_sub(depth as usize + 1).ok_or(invalid.clone())?;
        let scope = frame.scopes[index];
        let target = *function.blocks.get(scope.block as usize).ok_or(invalid)?;
        frame.scopes.truncate(index + 1);
        self.unwind(scope.height, target.label_arity());
        Ok(target.branch_target())
    }

    // ==================== Value stack ====================

    #[inline]
    fn push(&mut self, word: u64) -> Result<(), VMError> {
        if self.stack.len() >= self.config.max_stack_height {
            return Err(VMError::StackOverflow {
                max: self.config.max_stack_height,
            });
        }
        self.stack.push(word);
        Ok(())
    }

    #[inline]
    fn pop(&mut self) -> Result<u64, VMError> {
        if self.stack.len() <= self.base {
            return Err(VMError::StackUnderflow);
        }
        self.stack.pop().ok_or(VMError::StackUnderflow)
    }

    fn pop_i32(&mut self) -> Result<i32, VMError> {
        Ok(self.pop()? as u32 as i32)
    }

    fn pop_u32(&mut self) -> Result<u32, VMError> {
        Ok(self.pop()? as u32)
    }

    fn pop_i64(&mut self) -> Result<i64, VMError> {
        Ok(self.pop()? as i64)
    }

    fn pop_f32(&mut self) -> Result<f32, VMError> {
        Ok(f32::from_bits(self.pop()? as u32))
    }

    fn pop_f64(&mut self) -> Result<f64, VMError> {
        Ok(f64::from_bits(self.pop()?))
    }

    fn push_i32(&mut self, v: i32) -> Result<(), VMError> {
        self.push(v as u32 as u64)
    }

    fn push_i64(&mut self, v: i64) -> Result<(), VMError> {
        self.push(v as u64)
    }

    fn push_f32(&mut self, v: f32) -> Result<(), VMError> {
        self.push(canonical_f32(v).to_bits() as u64)
    }

    fn push_f64(&mut self, v: f64) -> Result<(), VMError> {
        self.push(canonical_f64(v).to_bits())
    }

    fn push_bool(&mut self, v: bool) -> Result<(), VMError> {
        self.push(v as u64)
    }
}

/// Evaluates a constant expression to a stack word. `global.get` reads the
/// referenced global's own constant initializer.
fn const_word(module: &Module, expr: &ConstExpr) -> Option<u64> {
    match expr {
        ConstExpr::GlobalGet(index) => module
            .globals
            .get(*index as usize)
            .and_then(|global| global.init.as_word()),
        other => other.as_word(),
    }
}

/// Evaluates an `i32` segment offset.
fn const_offset(module: &Module, expr: &ConstExpr) -> Result<u64, VMError> {
    const_word(module, expr)
        .map(|word| word as u32 as u64)
        .ok_or_else(|| VMError::Instantiation {
            reason: format!("unsupported offset expression {expr:?}"),
        })
}
