use crate::types::hash::FunctionId;
use thiserror::Error;

/// Errors that can occur while decoding or executing contract bytecode.
///
/// Every variant is fatal to the current call: execution unwinds to the
/// invocation boundary and the caller is responsible for discarding any
/// state it staged for the call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VMError {
    /// Remaining gas is insufficient for the operation just executed.
    #[error("out of gas: needed {needed}, remaining {remaining}")]
    OutOfGas { needed: u64, remaining: u64 },
    /// A block, loop or if region exited with a lower value-stack height than it entered with.
    #[error("stack consistency fault at op {ip}: entered with height {entry}, exited with {exit}")]
    StackConsistencyFault { ip: usize, entry: usize, exit: usize },
    /// Branch label out of range, or targeting something other than a block, loop or if.
    #[error("invalid branch to depth {depth} with {open} open regions")]
    InvalidBranch { depth: u32, open: usize },
    /// An `if` control-block entry (or its `else`) is inconsistent with the operation stream.
    #[error("malformed if at op {ip}: {reason}")]
    MalformedIf { ip: usize, reason: &'static str },
    /// Call stack exceeded the configured maximum depth.
    #[error("call depth exceeded (max {max})")]
    CallDepthExceeded { max: usize },
    /// Integer division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Malformed binary input.
    #[error("decoding error at byte {offset}: {reason}")]
    DecodeError { offset: usize, reason: String },
    /// Unknown opcode while parsing with the strict opcode policy.
    #[error("invalid instruction 0x{opcode:02x} at byte {offset}")]
    InvalidInstruction { opcode: u8, offset: usize },
    /// Caller-supplied parameter count does not match the callee signature.
    #[error("parameter arity mismatch: expected {expected}, got {actual}")]
    ParamArityMismatch { expected: usize, actual: usize },
    /// Caller-supplied parameter kind does not match the callee signature.
    #[error("parameter {index} type mismatch: expected {expected}, got {actual}")]
    ParamTypeMismatch {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },
    /// The code resolver could not produce bytecode for a function hash.
    #[error("unresolved code for function {id}")]
    UnresolvedCode { id: FunctionId },
    /// The contract does not declare a function with this index or hash.
    #[error("unknown function: {function}")]
    UnknownFunction { function: String },
    /// `unreachable` instruction executed.
    #[error("unreachable executed")]
    Unreachable,
    /// Linear memory access outside the allocated pages.
    #[error("memory access out of bounds: address {address} + {len} exceeds {size}")]
    MemoryOutOfBounds { address: u64, len: u64, size: usize },
    /// Float to integer truncation of NaN or of a value outside the target range.
    #[error("invalid conversion in {instruction}")]
    InvalidConversion { instruction: &'static str },
    /// Pop from an empty value stack, or below the current frame's base.
    #[error("value stack underflow")]
    StackUnderflow,
    /// Push beyond the configured maximum value-stack height.
    #[error("value stack overflow (max {max})")]
    StackOverflow { max: usize },
    /// Local index beyond the frame's locals.
    #[error("local {index} out of range ({count} locals)")]
    LocalOutOfRange { index: u32, count: usize },
    /// `call_indirect` target signature differs from the expected type.
    #[error("indirect call signature mismatch for table element {element}")]
    IndirectCallMismatch { element: u32 },
    /// `call_indirect` through an empty or out-of-range table slot.
    #[error("undefined table element {element}")]
    UndefinedTableElement { element: u32 },
    /// A decoded module cannot be instantiated under the machine's limits.
    #[error("instantiation failed: {reason}")]
    Instantiation { reason: String },
}
