//! Instruction decoding.
//!
//! [`parse`] walks a function body once, left to right, and produces the flat
//! operation list together with the [`ControlBlock`] table. Opening a region
//! pushes its table index on an open-regions stack; `else` attaches to the
//! innermost open `if`; `end` closes the innermost open region (strict LIFO
//! bracket matching) and, once no region is open, marks the end of the body.
//!
//! Branch labels are kept as relative depths and resolved by the interpreter.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{Immediate, MiscOp, Opcode};
use crate::virtual_machine::leb128;
use crate::virtual_machine::module::{FunctionBody, Signature, ValueKind};
use crate::virtual_machine::operation::{
    BlockKind, ControlBlock, Function, Instr, MemArg, Operation, Slot,
};
use crate::warn;

/// Block signature byte for regions that produce no value.
pub const EMPTY_BLOCK_TYPE: u8 = 0x40;

/// How the parser treats opcode bytes missing from the instruction table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OpcodePolicy {
    /// Skip the byte with a warning and keep decoding.
    ///
    /// An unknown `0xFC` sub-opcode skips the prefix byte together with its
    /// LEB128 sub-opcode, so decoding resumes at the next instruction instead
    /// of inside the one that was not understood.
    #[default]
    SkipUnknown,
    /// Fail with [`VMError::InvalidInstruction`].
    Reject,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn u8(&mut self) -> Result<u8, VMError> {
        let byte = *self.bytes.get(self.pos).ok_or(VMError::DecodeError {
            offset: self.pos,
            reason: "unexpected end of function body".to_string(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn u32(&mut self) -> Result<u32, VMError> {
        let (v, n) = leb128::read_u32(self.bytes, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn i32(&mut self) -> Result<i32, VMError> {
        let (v, n) = leb128::read_i32(self.bytes, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn i64(&mut self) -> Result<i64, VMError> {
        let (v, n) = leb128::read_i64(self.bytes, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn f32_bits(&mut self) -> Result<u32, VMError> {
        let (v, n) = leb128::read_f32_bits(self.bytes, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    fn f64_bits(&mut self) -> Result<u64, VMError> {
        let (v, n) = leb128::read_f64_bits(self.bytes, self.pos)?;
        self.pos += n;
        Ok(v)
    }

    /// Reads a count prefix, rejecting counts the remaining input cannot hold.
    fn count(&mut self) -> Result<usize, VMError> {
        let at = self.pos;
        let count = self.u32()? as usize;
        if count > self.bytes.len() - self.pos {
            return Err(decode_error(at, format!("count {count} exceeds function body")));
        }
        Ok(count)
    }
}

fn decode_error(offset: usize, reason: impl Into<String>) -> VMError {
    VMError::DecodeError {
        offset,
        reason: reason.into(),
    }
}

/// Decodes a function body with the default [`OpcodePolicy`].
pub fn parse(bytes: &[u8]) -> Result<(Vec<Operation>, Vec<ControlBlock>), VMError> {
    parse_with(bytes, OpcodePolicy::default())
}

/// Decodes a function body into its operation list and control-block table.
///
/// The body must end with the function-level `end`. Fails with
/// [`VMError::DecodeError`] on truncated immediates, an `else` whose innermost
/// open region is not an `if`, regions left open at the end of the body, or
/// bytes following the function-level `end`.
pub fn parse_with(
    bytes: &[u8],
    policy: OpcodePolicy,
) -> Result<(Vec<Operation>, Vec<ControlBlock>), VMError> {
    let mut cursor = Cursor { bytes, pos: 0 };
    let mut operations: Vec<Operation> = Vec::with_capacity(bytes.len() / 2);
    let mut blocks: Vec<ControlBlock> = Vec::new();
    let mut open: Vec<u32> = Vec::new();
    let mut finished = false;

    while cursor.pos < bytes.len() {
        let offset = cursor.pos;
        if finished {
            return Err(decode_error(offset, "bytes after function end"));
        }

        let byte = cursor.u8()?;
        let opcode = match Opcode::try_from(byte) {
            Ok(opcode) => opcode,
            Err(_) => match policy {
                OpcodePolicy::SkipUnknown => {
                    warn!("skipping unknown opcode 0x{byte:02x} at byte {offset}");
                    continue;
                }
                OpcodePolicy::Reject => {
                    return Err(VMError::InvalidInstruction {
                        opcode: byte,
                        offset,
                    });
                }
            },
        };

        let instr = match opcode.immediate() {
            Immediate::None => match opcode {
                Opcode::Unreachable => Instr::Unreachable,
                Opcode::Nop => Instr::Nop,
                Opcode::Return => Instr::Return,
                Opcode::Drop => Instr::Drop,
                Opcode::Select => Instr::Select,
                Opcode::Else => {
                    let block = *open
                        .last()
                        .ok_or_else(|| decode_error(offset, "else outside of an if"))?;
                    let entry = &mut blocks[block as usize];
                    if entry.kind != BlockKind::If {
                        return Err(decode_error(offset, "else does not close an if"));
                    }
                    if entry.else_at.is_some() {
                        return Err(decode_error(offset, "if already has an else"));
                    }
                    entry.else_at = Some(operations.len());
                    Instr::Else { block }
                }
                Opcode::End => match open.pop() {
                    Some(block) => {
                        blocks[block as usize].end_at = operations.len();
                        Instr::End { block: Some(block) }
                    }
                    None => {
                        finished = true;
                        Instr::End { block: None }
                    }
                },
                Opcode::EnvAddress
                | Opcode::EnvBalance
                | Opcode::EnvCaller
                | Opcode::EnvTimestamp
                | Opcode::EnvInputSize
                | Opcode::EnvValue
                | Opcode::EnvInputCopy
                | Opcode::EnvCallHash => Instr::Env(opcode),
                _ => Instr::Numeric(opcode),
            },
            Immediate::BlockType => {
                let signature = cursor.u8()?;
                if signature != EMPTY_BLOCK_TYPE && ValueKind::from_byte(signature).is_none() {
                    return Err(decode_error(
                        offset + 1,
                        format!("unsupported block type 0x{signature:02x}"),
                    ));
                }
                let kind = match opcode {
                    Opcode::Loop => BlockKind::Loop,
                    Opcode::If => BlockKind::If,
                    _ => BlockKind::Block,
                };
                let block = blocks.len() as u32;
                blocks.push(ControlBlock {
                    kind,
                    signature,
                    start_at: operations.len(),
                    else_at: None,
                    end_at: 0,
                });
                open.push(block);
                match kind {
                    BlockKind::Block => Instr::Block { block },
                    BlockKind::Loop => Instr::Loop { block },
                    BlockKind::If => Instr::If { block },
                }
            }
            Immediate::Label => {
                let depth = cursor.u32()?;
                match opcode {
                    Opcode::BrIf => Instr::BrIf { depth },
                    _ => Instr::Br { depth },
                }
            }
            Immediate::LabelTable => {
                let count = cursor.count()?;
                let mut targets = Vec::with_capacity(count);
                for _ in 0..count {
                    targets.push(cursor.u32()?);
                }
                let default = cursor.u32()?;
                Instr::BrTable {
                    targets: targets.into_boxed_slice(),
                    default,
                }
            }
            Immediate::Index => {
                let index = cursor.u32()?;
                match opcode {
                    Opcode::Call => Instr::Call { function: index },
                    Opcode::LocalSet => Instr::LocalSet(index),
                    Opcode::LocalTee => Instr::LocalTee(index),
                    _ => Instr::LocalGet(index),
                }
            }
            Immediate::TypeTable => {
                let type_index = cursor.u32()?;
                let table = cursor.u32()?;
                Instr::CallIndirect { type_index, table }
            }
            Immediate::ValueTypes => {
                let count = cursor.count()?;
                for _ in 0..count {
                    let at = cursor.pos;
                    let kind = cursor.u8()?;
                    if ValueKind::from_byte(kind).is_none() {
                        return Err(decode_error(at, format!("bad value kind 0x{kind:02x}")));
                    }
                }
                Instr::Select
            }
            Immediate::Slot => {
                let at = cursor.pos;
                let slot = match cursor.i32()? {
                    -1 => Slot::FromStack,
                    index if index >= 0 => Slot::Immediate(index as u32),
                    index => return Err(decode_error(at, format!("bad storage slot {index}"))),
                };
                match opcode {
                    Opcode::GlobalSet => Instr::GlobalSet(slot),
                    _ => Instr::GlobalGet(slot),
                }
            }
            Immediate::MemArg => {
                let align = cursor.u32()?;
                let offset = cursor.u32()?;
                let memarg = MemArg { align, offset };
                if (opcode as u8) < Opcode::I32Store as u8 {
                    Instr::Load(opcode, memarg)
                } else {
                    Instr::Store(opcode, memarg)
                }
            }
            Immediate::MemoryIndex => {
                let at = cursor.pos;
                if cursor.u8()? != 0 {
                    return Err(decode_error(at, "memory index must be zero"));
                }
                match opcode {
                    Opcode::MemoryGrow => Instr::MemoryGrow,
                    _ => Instr::MemorySize,
                }
            }
            Immediate::I32 => Instr::I32Const(cursor.i32()?),
            Immediate::I64 => Instr::I64Const(cursor.i64()?),
            Immediate::F32 => Instr::F32Const(cursor.f32_bits()?),
            Immediate::F64 => Instr::F64Const(cursor.f64_bits()?),
            Immediate::Prefixed => {
                let sub = cursor.u32()?;
                let Some(misc) = MiscOp::from_u32(sub) else {
                    match policy {
                        OpcodePolicy::SkipUnknown => {
                            warn!("skipping unknown 0xfc sub-opcode {sub} at byte {offset}");
                            continue;
                        }
                        OpcodePolicy::Reject => {
                            return Err(VMError::InvalidInstruction {
                                opcode: byte,
                                offset,
                            });
                        }
                    }
                };
                for _ in 0..misc.reserved_bytes() {
                    let at = cursor.pos;
                    if cursor.u8()? != 0 {
                        return Err(decode_error(at, "memory index must be zero"));
                    }
                }
                operations.push(Operation::new(
                    Instr::Misc(misc),
                    misc.gas(),
                    misc.category(),
                ));
                continue;
            }
        };

        operations.push(Operation::from_opcode(opcode, instr));
    }

    if let Some(&block) = open.last() {
        let kind = blocks[block as usize].kind.as_str();
        return Err(decode_error(bytes.len(), format!("unterminated {kind}")));
    }
    if !finished {
        return Err(decode_error(bytes.len(), "function body missing end"));
    }

    Ok((operations, blocks))
}

/// Parses a code-section body into a [`Function`] with the given signature.
pub fn parse_function(
    signature: Signature,
    body: &FunctionBody,
    policy: OpcodePolicy,
) -> Result<Function, VMError> {
    let (operations, blocks) = parse_with(&body.code, policy)?;
    Ok(Function {
        signature,
        locals: body.locals.clone(),
        operations,
        blocks,
    })
}
