//! Decoded operation stream and control-block side-table.
//!
//! An [`Operation`] is a pure description of one instruction: its immediates and
//! the gas it costs. Operations never hold the machine; the interpreter evaluates
//! them against its own state. Structured control flow is described by the
//! [`ControlBlock`] table produced alongside the operations by the parser.

use crate::virtual_machine::isa::{MiscOp, Opcode};
use crate::virtual_machine::module::{Signature, ValueKind};
use crate::virtual_machine::vm::gas::GasCategory;
use std::fmt;

/// Kind of a structured control region.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Block,
    Loop,
    If,
}

impl BlockKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Block => "block",
            BlockKind::Loop => "loop",
            BlockKind::If => "if",
        }
    }
}

/// One nested block, loop or if region.
///
/// All positions are indices into the function's operation list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlBlock {
    pub kind: BlockKind,
    /// Raw block signature byte (`0x40` for an empty signature).
    pub signature: u8,
    /// Index of the opening `block`/`loop`/`if` operation. The region's first inner
    /// operation is at `start_at + 1`.
    pub start_at: usize,
    /// Index of the matching `else`, if the region is an `if` with an else arm.
    pub else_at: Option<usize>,
    /// Index of the matching `end`.
    pub end_at: usize,
}

impl ControlBlock {
    /// Operation index a branch to this region resumes at: the first inner
    /// operation for a loop, the closing `end` otherwise.
    pub fn branch_target(&self) -> usize {
        match self.kind {
            BlockKind::Loop => self.start_at + 1,
            BlockKind::Block | BlockKind::If => self.end_at,
        }
    }

    /// Number of values the region leaves on the stack: one for a value-kind
    /// signature, none for `0x40`.
    pub fn arity(&self) -> usize {
        usize::from(ValueKind::from_byte(self.signature).is_some())
    }

    /// Number of values a branch to this region carries. A loop label
    /// takes no values.
    pub fn label_arity(&self) -> usize {
        match self.kind {
            BlockKind::Loop => 0,
            BlockKind::Block | BlockKind::If => self.arity(),
        }
    }
}

/// Storage slot addressed by `global.get`/`global.set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Immediate(u32),
    /// Slot index is popped from the value stack (encoded as immediate `-1`).
    FromStack,
}

/// Memory access immediates. Alignment is decoded but never enforced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemArg {
    pub align: u32,
    pub offset: u32,
}

/// Instruction with its decoded immediates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instr {
    Unreachable,
    Nop,
    /// Opens the region described by control block `block`.
    Block { block: u32 },
    Loop { block: u32 },
    If { block: u32 },
    /// Else arm of the `if` region `block`.
    Else { block: u32 },
    /// Closes region `block`, or the function body when `None`.
    End { block: Option<u32> },
    Br { depth: u32 },
    BrIf { depth: u32 },
    BrTable { targets: Box<[u32]>, default: u32 },
    Return,
    Call { function: u32 },
    CallIndirect { type_index: u32, table: u32 },
    Drop,
    Select,
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(Slot),
    GlobalSet(Slot),
    Load(Opcode, MemArg),
    Store(Opcode, MemArg),
    MemorySize,
    MemoryGrow,
    I32Const(i32),
    I64Const(i64),
    /// Bit pattern of the constant.
    F32Const(u32),
    /// Bit pattern of the constant.
    F64Const(u64),
    /// Stack-only numeric instruction (arithmetic, comparison, conversion).
    Numeric(Opcode),
    Misc(MiscOp),
    /// Contract environment query.
    Env(Opcode),
}

/// One decoded operation: instruction plus its fixed gas cost.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    pub instr: Instr,
    pub gas: u64,
    pub category: GasCategory,
}

impl Operation {
    pub fn new(instr: Instr, gas: u64, category: GasCategory) -> Self {
        Self {
            instr,
            gas,
            category,
        }
    }

    /// Creates an operation costed from the opcode table.
    pub fn from_opcode(opcode: Opcode, instr: Instr) -> Self {
        Self::new(instr, opcode.gas(), opcode.category())
    }
}

/// Typed value crossing the invocation boundary.
///
/// Inside the machine every value is a 64-bit word: `i32` values are stored
/// zero-extended and floats as their bit pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
        }
    }

    /// Returns the stack word representation of this value.
    pub fn to_word(&self) -> u64 {
        match *self {
            Value::I32(v) => v as u32 as u64,
            Value::I64(v) => v as u64,
            Value::F32(v) => v.to_bits() as u64,
            Value::F64(v) => v.to_bits(),
        }
    }

    /// Reinterprets a stack word as a value of the given kind.
    pub fn from_word(kind: ValueKind, word: u64) -> Value {
        match kind {
            ValueKind::I32 => Value::I32(word as u32 as i32),
            ValueKind::I64 => Value::I64(word as i64),
            ValueKind::F32 => Value::F32(f32::from_bits(word as u32)),
            ValueKind::F64 => Value::F64(f64::from_bits(word)),
        }
    }

    /// Parses `kind:literal`, e.g. `i32:5` or `f64:-1.5`.
    pub fn parse(text: &str) -> Option<Value> {
        let (kind, literal) = text.split_once(':')?;
        match kind {
            "i32" => literal.parse().ok().map(Value::I32),
            "i64" => literal.parse().ok().map(Value::I64),
            "f32" => literal.parse().ok().map(Value::F32),
            "f64" => literal.parse().ok().map(Value::F64),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{v}"),
            Value::F64(v) => write!(f, "f64:{v}"),
        }
    }
}

/// A fully decoded function: what the code resolver hands to the machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function {
    pub signature: Signature,
    /// Declared locals, excluding parameters.
    pub locals: Vec<ValueKind>,
    pub operations: Vec<Operation>,
    pub blocks: Vec<ControlBlock>,
}

impl Function {
    /// Number of local slots a frame needs (parameters first).
    pub fn frame_size(&self) -> usize {
        self.signature.params.len() + self.locals.len()
    }
}
