//! Instruction set definitions.
//!
//! The [`for_each_opcode!`](crate::for_each_opcode) macro holds the canonical
//! single-byte opcode table and invokes a callback macro with it, so the opcode
//! enum, the immediate shapes the parser dispatches on, and the gas schedule are
//! generated from one list.
//!
//! Each entry reads `Variant = opcode, "mnemonic" => Immediate, GAS, Category`:
//! - `Immediate` names the shape of the operands following the opcode byte
//! - `GAS` names a step cost from [`gas`](super::vm::gas)
//! - `Category` is the [`GasCategory`] the cost is profiled under
//!
//! Opcodes follow the WebAssembly MVP binary encoding. `0xE0..=0xE7` are
//! contract-environment extensions and `0xFC` prefixes the [`MiscOp`] table.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::vm::gas::{self, GasCategory};

/// Invokes a callback macro with the complete opcode definition list.
#[macro_export]
macro_rules! for_each_opcode {
    ($callback:ident) => {
        $callback! {
            // =========================
            // Control
            // =========================
            /// Traps unconditionally.
            Unreachable = 0x00, "unreachable" => None, BASE, Control,
            /// Does nothing.
            Nop = 0x01, "nop" => None, ZERO, Control,
            /// Opens a block region; branches to it break out.
            Block = 0x02, "block" => BlockType, BASE, Control,
            /// Opens a loop region; branches to it continue.
            Loop = 0x03, "loop" => BlockType, BASE, Control,
            /// Pops a condition and opens an if region.
            If = 0x04, "if" => BlockType, BASE, Control,
            /// Separates the then and else arms of an if.
            Else = 0x05, "else" => None, ZERO, Control,
            /// Closes the innermost open region, or the function body.
            End = 0x0B, "end" => None, ZERO, Control,
            /// Branches to the region at the given label depth.
            Br = 0x0C, "br" => Label, LOW, Control,
            /// Pops a condition and branches if it is non-zero.
            BrIf = 0x0D, "br_if" => Label, LOW, Control,
            /// Pops an index and branches to the selected label.
            BrTable = 0x0E, "br_table" => LabelTable, MID, Control,
            /// Returns from the current function.
            Return = 0x0F, "return" => None, LOW, Control,
            /// Calls a contract function by index.
            Call = 0x10, "call" => Index, CALL, Call,
            /// Calls a function through the table.
            CallIndirect = 0x11, "call_indirect" => TypeTable, CALL, Call,
            // =========================
            // Parametric
            // =========================
            /// Discards the top of the value stack.
            Drop = 0x1A, "drop" => None, BASE, Variable,
            /// Pops a condition and selects one of two values.
            Select = 0x1B, "select" => None, BASE, Variable,
            /// Typed select.
            SelectTyped = 0x1C, "select_t" => ValueTypes, BASE, Variable,
            // =========================
            // Locals and storage slots
            // =========================
            /// Pushes a local.
            LocalGet = 0x20, "local.get" => Index, BASE, Variable,
            /// Pops into a local.
            LocalSet = 0x21, "local.set" => Index, BASE, Variable,
            /// Copies the top of the stack into a local.
            LocalTee = 0x22, "local.tee" => Index, BASE, Variable,
            /// Pushes a persistent storage slot.
            GlobalGet = 0x23, "global.get" => Slot, STORAGE_READ, Storage,
            /// Pops into a persistent storage slot.
            GlobalSet = 0x24, "global.set" => Slot, STORAGE_WRITE, Storage,
            // =========================
            // Memory
            // =========================
            I32Load = 0x28, "i32.load" => MemArg, LOW, Memory,
            I64Load = 0x29, "i64.load" => MemArg, LOW, Memory,
            F32Load = 0x2A, "f32.load" => MemArg, LOW, Memory,
            F64Load = 0x2B, "f64.load" => MemArg, LOW, Memory,
            I32Load8S = 0x2C, "i32.load8_s" => MemArg, LOW, Memory,
            I32Load8U = 0x2D, "i32.load8_u" => MemArg, LOW, Memory,
            I32Load16S = 0x2E, "i32.load16_s" => MemArg, LOW, Memory,
            I32Load16U = 0x2F, "i32.load16_u" => MemArg, LOW, Memory,
            I64Load8S = 0x30, "i64.load8_s" => MemArg, LOW, Memory,
            I64Load8U = 0x31, "i64.load8_u" => MemArg, LOW, Memory,
            I64Load16S = 0x32, "i64.load16_s" => MemArg, LOW, Memory,
            I64Load16U = 0x33, "i64.load16_u" => MemArg, LOW, Memory,
            I64Load32S = 0x34, "i64.load32_s" => MemArg, LOW, Memory,
            I64Load32U = 0x35, "i64.load32_u" => MemArg, LOW, Memory,
            I32Store = 0x36, "i32.store" => MemArg, LOW, Memory,
            I64Store = 0x37, "i64.store" => MemArg, LOW, Memory,
            F32Store = 0x38, "f32.store" => MemArg, LOW, Memory,
            F64Store = 0x39, "f64.store" => MemArg, LOW, Memory,
            I32Store8 = 0x3A, "i32.store8" => MemArg, LOW, Memory,
            I32Store16 = 0x3B, "i32.store16" => MemArg, LOW, Memory,
            I64Store8 = 0x3C, "i64.store8" => MemArg, LOW, Memory,
            I64Store16 = 0x3D, "i64.store16" => MemArg, LOW, Memory,
            I64Store32 = 0x3E, "i64.store32" => MemArg, LOW, Memory,
            /// Pushes the memory size in pages.
            MemorySize = 0x3F, "memory.size" => MemoryIndex, BASE, Memory,
            /// Grows memory by a number of pages.
            MemoryGrow = 0x40, "memory.grow" => MemoryIndex, GROW, Memory,
            // =========================
            // Constants
            // =========================
            I32Const = 0x41, "i32.const" => I32, BASE, Numeric,
            I64Const = 0x42, "i64.const" => I64, BASE, Numeric,
            F32Const = 0x43, "f32.const" => F32, BASE, Numeric,
            F64Const = 0x44, "f64.const" => F64, BASE, Numeric,
            // =========================
            // Comparison
            // =========================
            I32Eqz = 0x45, "i32.eqz" => None, VERY_LOW, Numeric,
            I32Eq = 0x46, "i32.eq" => None, VERY_LOW, Numeric,
            I32Ne = 0x47, "i32.ne" => None, VERY_LOW, Numeric,
            I32LtS = 0x48, "i32.lt_s" => None, VERY_LOW, Numeric,
            I32LtU = 0x49, "i32.lt_u" => None, VERY_LOW, Numeric,
            I32GtS = 0x4A, "i32.gt_s" => None, VERY_LOW, Numeric,
            I32GtU = 0x4B, "i32.gt_u" => None, VERY_LOW, Numeric,
            I32LeS = 0x4C, "i32.le_s" => None, VERY_LOW, Numeric,
            I32LeU = 0x4D, "i32.le_u" => None, VERY_LOW, Numeric,
            I32GeS = 0x4E, "i32.ge_s" => None, VERY_LOW, Numeric,
            I32GeU = 0x4F, "i32.ge_u" => None, VERY_LOW, Numeric,
            I64Eqz = 0x50, "i64.eqz" => None, VERY_LOW, Numeric,
            I64Eq = 0x51, "i64.eq" => None, VERY_LOW, Numeric,
            I64Ne = 0x52, "i64.ne" => None, VERY_LOW, Numeric,
            I64LtS = 0x53, "i64.lt_s" => None, VERY_LOW, Numeric,
            I64LtU = 0x54, "i64.lt_u" => None, VERY_LOW, Numeric,
            I64GtS = 0x55, "i64.gt_s" => None, VERY_LOW, Numeric,
            I64GtU = 0x56, "i64.gt_u" => None, VERY_LOW, Numeric,
            I64LeS = 0x57, "i64.le_s" => None, VERY_LOW, Numeric,
            I64LeU = 0x58, "i64.le_u" => None, VERY_LOW, Numeric,
            I64GeS = 0x59, "i64.ge_s" => None, VERY_LOW, Numeric,
            I64GeU = 0x5A, "i64.ge_u" => None, VERY_LOW, Numeric,
            F32Eq = 0x5B, "f32.eq" => None, VERY_LOW, Numeric,
            F32Ne = 0x5C, "f32.ne" => None, VERY_LOW, Numeric,
            F32Lt = 0x5D, "f32.lt" => None, VERY_LOW, Numeric,
            F32Gt = 0x5E, "f32.gt" => None, VERY_LOW, Numeric,
            F32Le = 0x5F, "f32.le" => None, VERY_LOW, Numeric,
            F32Ge = 0x60, "f32.ge" => None, VERY_LOW, Numeric,
            F64Eq = 0x61, "f64.eq" => None, VERY_LOW, Numeric,
            F64Ne = 0x62, "f64.ne" => None, VERY_LOW, Numeric,
            F64Lt = 0x63, "f64.lt" => None, VERY_LOW, Numeric,
            F64Gt = 0x64, "f64.gt" => None, VERY_LOW, Numeric,
            F64Le = 0x65, "f64.le" => None, VERY_LOW, Numeric,
            F64Ge = 0x66, "f64.ge" => None, VERY_LOW, Numeric,
            // =========================
            // Integer arithmetic
            // =========================
            I32Clz = 0x67, "i32.clz" => None, VERY_LOW, Numeric,
            I32Ctz = 0x68, "i32.ctz" => None, VERY_LOW, Numeric,
            I32Popcnt = 0x69, "i32.popcnt" => None, VERY_LOW, Numeric,
            I32Add = 0x6A, "i32.add" => None, VERY_LOW, Numeric,
            I32Sub = 0x6B, "i32.sub" => None, VERY_LOW, Numeric,
            I32Mul = 0x6C, "i32.mul" => None, LOW, Numeric,
            I32DivS = 0x6D, "i32.div_s" => None, MID, Numeric,
            I32DivU = 0x6E, "i32.div_u" => None, MID, Numeric,
            I32RemS = 0x6F, "i32.rem_s" => None, MID, Numeric,
            I32RemU = 0x70, "i32.rem_u" => None, MID, Numeric,
            I32And = 0x71, "i32.and" => None, VERY_LOW, Numeric,
            I32Or = 0x72, "i32.or" => None, VERY_LOW, Numeric,
            I32Xor = 0x73, "i32.xor" => None, VERY_LOW, Numeric,
            I32Shl = 0x74, "i32.shl" => None, VERY_LOW, Numeric,
            I32ShrS = 0x75, "i32.shr_s" => None, VERY_LOW, Numeric,
            I32ShrU = 0x76, "i32.shr_u" => None, VERY_LOW, Numeric,
            I32Rotl = 0x77, "i32.rotl" => None, VERY_LOW, Numeric,
            I32Rotr = 0x78, "i32.rotr" => None, VERY_LOW, Numeric,
            I64Clz = 0x79, "i64.clz" => None, VERY_LOW, Numeric,
            I64Ctz = 0x7A, "i64.ctz" => None, VERY_LOW, Numeric,
            I64Popcnt = 0x7B, "i64.popcnt" => None, VERY_LOW, Numeric,
            I64Add = 0x7C, "i64.add" => None, VERY_LOW, Numeric,
            I64Sub = 0x7D, "i64.sub" => None, VERY_LOW, Numeric,
            I64Mul = 0x7E, "i64.mul" => None, LOW, Numeric,
            I64DivS = 0x7F, "i64.div_s" => None, MID, Numeric,
            I64DivU = 0x80, "i64.div_u" => None, MID, Numeric,
            I64RemS = 0x81, "i64.rem_s" => None, MID, Numeric,
            I64RemU = 0x82, "i64.rem_u" => None, MID, Numeric,
            I64And = 0x83, "i64.and" => None, VERY_LOW, Numeric,
            I64Or = 0x84, "i64.or" => None, VERY_LOW, Numeric,
            I64Xor = 0x85, "i64.xor" => None, VERY_LOW, Numeric,
            I64Shl = 0x86, "i64.shl" => None, VERY_LOW, Numeric,
            I64ShrS = 0x87, "i64.shr_s" => None, VERY_LOW, Numeric,
            I64ShrU = 0x88, "i64.shr_u" => None, VERY_LOW, Numeric,
            I64Rotl = 0x89, "i64.rotl" => None, VERY_LOW, Numeric,
            I64Rotr = 0x8A, "i64.rotr" => None, VERY_LOW, Numeric,
            // =========================
            // Float arithmetic
            // =========================
            F32Abs = 0x8B, "f32.abs" => None, VERY_LOW, Numeric,
            F32Neg = 0x8C, "f32.neg" => None, VERY_LOW, Numeric,
            F32Ceil = 0x8D, "f32.ceil" => None, LOW, Numeric,
            F32Floor = 0x8E, "f32.floor" => None, LOW, Numeric,
            F32Trunc = 0x8F, "f32.trunc" => None, LOW, Numeric,
            F32Nearest = 0x90, "f32.nearest" => None, LOW, Numeric,
            F32Sqrt = 0x91, "f32.sqrt" => None, MID, Numeric,
            F32Add = 0x92, "f32.add" => None, LOW, Numeric,
            F32Sub = 0x93, "f32.sub" => None, LOW, Numeric,
            F32Mul = 0x94, "f32.mul" => None, LOW, Numeric,
            F32Div = 0x95, "f32.div" => None, MID, Numeric,
            F32Min = 0x96, "f32.min" => None, LOW, Numeric,
            F32Max = 0x97, "f32.max" => None, LOW, Numeric,
            F32Copysign = 0x98, "f32.copysign" => None, VERY_LOW, Numeric,
            F64Abs = 0x99, "f64.abs" => None, VERY_LOW, Numeric,
            F64Neg = 0x9A, "f64.neg" => None, VERY_LOW, Numeric,
            F64Ceil = 0x9B, "f64.ceil" => None, LOW, Numeric,
            F64Floor = 0x9C, "f64.floor" => None, LOW, Numeric,
            F64Trunc = 0x9D, "f64.trunc" => None, LOW, Numeric,
            F64Nearest = 0x9E, "f64.nearest" => None, LOW, Numeric,
            F64Sqrt = 0x9F, "f64.sqrt" => None, MID, Numeric,
            F64Add = 0xA0, "f64.add" => None, LOW, Numeric,
            F64Sub = 0xA1, "f64.sub" => None, LOW, Numeric,
            F64Mul = 0xA2, "f64.mul" => None, LOW, Numeric,
            F64Div = 0xA3, "f64.div" => None, MID, Numeric,
            F64Min = 0xA4, "f64.min" => None, LOW, Numeric,
            F64Max = 0xA5, "f64.max" => None, LOW, Numeric,
            F64Copysign = 0xA6, "f64.copysign" => None, VERY_LOW, Numeric,
            // =========================
            // Conversions
            // =========================
            I32WrapI64 = 0xA7, "i32.wrap_i64" => None, VERY_LOW, Numeric,
            I32TruncF32S = 0xA8, "i32.trunc_f32_s" => None, LOW, Numeric,
            I32TruncF32U = 0xA9, "i32.trunc_f32_u" => None, LOW, Numeric,
            I32TruncF64S = 0xAA, "i32.trunc_f64_s" => None, LOW, Numeric,
            I32TruncF64U = 0xAB, "i32.trunc_f64_u" => None, LOW, Numeric,
            I64ExtendI32S = 0xAC, "i64.extend_i32_s" => None, VERY_LOW, Numeric,
            I64ExtendI32U = 0xAD, "i64.extend_i32_u" => None, VERY_LOW, Numeric,
            I64TruncF32S = 0xAE, "i64.trunc_f32_s" => None, LOW, Numeric,
            I64TruncF32U = 0xAF, "i64.trunc_f32_u" => None, LOW, Numeric,
            I64TruncF64S = 0xB0, "i64.trunc_f64_s" => None, LOW, Numeric,
            I64TruncF64U = 0xB1, "i64.trunc_f64_u" => None, LOW, Numeric,
            F32ConvertI32S = 0xB2, "f32.convert_i32_s" => None, LOW, Numeric,
            F32ConvertI32U = 0xB3, "f32.convert_i32_u" => None, LOW, Numeric,
            F32ConvertI64S = 0xB4, "f32.convert_i64_s" => None, LOW, Numeric,
            F32ConvertI64U = 0xB5, "f32.convert_i64_u" => None, LOW, Numeric,
            F32DemoteF64 = 0xB6, "f32.demote_f64" => None, LOW, Numeric,
            F64ConvertI32S = 0xB7, "f64.convert_i32_s" => None, LOW, Numeric,
            F64ConvertI32U = 0xB8, "f64.convert_i32_u" => None, LOW, Numeric,
            F64ConvertI64S = 0xB9, "f64.convert_i64_s" => None, LOW, Numeric,
            F64ConvertI64U = 0xBA, "f64.convert_i64_u" => None, LOW, Numeric,
            F64PromoteF32 = 0xBB, "f64.promote_f32" => None, LOW, Numeric,
            I32ReinterpretF32 = 0xBC, "i32.reinterpret_f32" => None, VERY_LOW, Numeric,
            I64ReinterpretF64 = 0xBD, "i64.reinterpret_f64" => None, VERY_LOW, Numeric,
            F32ReinterpretI32 = 0xBE, "f32.reinterpret_i32" => None, VERY_LOW, Numeric,
            F64ReinterpretI64 = 0xBF, "f64.reinterpret_i64" => None, VERY_LOW, Numeric,
            I32Extend8S = 0xC0, "i32.extend8_s" => None, VERY_LOW, Numeric,
            I32Extend16S = 0xC1, "i32.extend16_s" => None, VERY_LOW, Numeric,
            I64Extend8S = 0xC2, "i64.extend8_s" => None, VERY_LOW, Numeric,
            I64Extend16S = 0xC3, "i64.extend16_s" => None, VERY_LOW, Numeric,
            I64Extend32S = 0xC4, "i64.extend32_s" => None, VERY_LOW, Numeric,
            // =========================
            // Environment
            // =========================
            /// Writes the contract address to memory at the popped pointer.
            EnvAddress = 0xE0, "env.address" => None, ENVIRONMENT, Environment,
            /// Pushes the contract balance.
            EnvBalance = 0xE1, "env.balance" => None, ENVIRONMENT, Environment,
            /// Writes the caller address to memory at the popped pointer.
            EnvCaller = 0xE2, "env.caller" => None, ENVIRONMENT, Environment,
            /// Pushes the block timestamp.
            EnvTimestamp = 0xE3, "env.timestamp" => None, ENVIRONMENT, Environment,
            /// Pushes the call input length.
            EnvInputSize = 0xE4, "env.input_size" => None, ENVIRONMENT, Environment,
            /// Pushes the value transferred with the call.
            EnvValue = 0xE5, "env.value" => None, ENVIRONMENT, Environment,
            /// Copies call input bytes into memory.
            EnvInputCopy = 0xE6, "env.input_copy" => None, ENVIRONMENT, Environment,
            /// Calls a sibling function by its content hash.
            EnvCallHash = 0xE7, "env.call_hash" => None, CALL, Call,
            // =========================
            // Prefixed
            // =========================
            /// Prefix for saturating truncations and bulk memory.
            Misc = 0xFC, "misc" => Prefixed, ZERO, Numeric,
        }
    };
}

/// Shape of the immediate operands that follow an opcode byte.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Immediate {
    /// No immediate.
    None,
    /// One block signature byte.
    BlockType,
    /// LEB128 label depth.
    Label,
    /// LEB128 count, that many label depths, then a default depth.
    LabelTable,
    /// LEB128 function or local index.
    Index,
    /// LEB128 type index followed by a LEB128 table index.
    TypeTable,
    /// LEB128 count followed by that many value-kind bytes.
    ValueTypes,
    /// Signed LEB128 storage slot, `-1` meaning "popped from the stack".
    Slot,
    /// LEB128 alignment followed by LEB128 offset.
    MemArg,
    /// One reserved memory index byte.
    MemoryIndex,
    /// Signed LEB128 32-bit constant.
    I32,
    /// Signed LEB128 64-bit constant.
    I64,
    /// 4-byte little-endian float constant.
    F32,
    /// 8-byte little-endian float constant.
    F64,
    /// LEB128 sub-opcode from the [`MiscOp`] table.
    Prefixed,
}

macro_rules! define_opcodes {
    (
        $(
            $(#[$doc:meta])*
            $name:ident = $opcode:literal, $mnemonic:literal => $imm:ident, $gas:ident, $category:ident
        ),* $(,)?
    ) => {
        /// Single-byte opcodes understood by the instruction decoder.
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                $(#[$doc])*
                $name = $opcode,
            )*
        }

        impl TryFrom<u8> for Opcode {
            type Error = VMError;

            fn try_from(value: u8) -> Result<Self, Self::Error> {
                match value {
                    $( $opcode => Ok(Opcode::$name), )*
                    _ => Err(VMError::InvalidInstruction {
                        opcode: value,
                        offset: 0,
                    }),
                }
            }
        }

        impl Opcode {
            /// Returns the text-format mnemonic for this opcode.
            pub const fn mnemonic(&self) -> &'static str {
                match self {
                    $( Opcode::$name => $mnemonic, )*
                }
            }

            /// Returns the shape of the immediates that follow this opcode.
            pub const fn immediate(&self) -> Immediate {
                match self {
                    $( Opcode::$name => Immediate::$imm, )*
                }
            }

            /// Returns the fixed gas cost charged after this opcode executes.
            pub const fn gas(&self) -> u64 {
                match self {
                    $( Opcode::$name => gas::$gas, )*
                }
            }

            /// Returns the profiling category the gas cost is attributed to.
            pub const fn category(&self) -> GasCategory {
                match self {
                    $( Opcode::$name => GasCategory::$category, )*
                }
            }
        }
    };
}

for_each_opcode!(define_opcodes);

/// Sub-opcodes behind the `0xFC` prefix.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum MiscOp {
    I32TruncSatF32S = 0,
    I32TruncSatF32U = 1,
    I32TruncSatF64S = 2,
    I32TruncSatF64U = 3,
    I64TruncSatF32S = 4,
    I64TruncSatF32U = 5,
    I64TruncSatF64S = 6,
    I64TruncSatF64U = 7,
    /// Followed by two reserved memory index bytes.
    MemoryCopy = 10,
    /// Followed by one reserved memory index byte.
    MemoryFill = 11,
}

impl MiscOp {
    /// Maps a decoded sub-opcode to a [`MiscOp`], if it is one this VM implements.
    pub const fn from_u32(value: u32) -> Option<MiscOp> {
        Some(match value {
            0 => MiscOp::I32TruncSatF32S,
            1 => MiscOp::I32TruncSatF32U,
            2 => MiscOp::I32TruncSatF64S,
            3 => MiscOp::I32TruncSatF64U,
            4 => MiscOp::I64TruncSatF32S,
            5 => MiscOp::I64TruncSatF32U,
            6 => MiscOp::I64TruncSatF64S,
            7 => MiscOp::I64TruncSatF64U,
            10 => MiscOp::MemoryCopy,
            11 => MiscOp::MemoryFill,
            _ => return None,
        })
    }

    pub const fn mnemonic(&self) -> &'static str {
        match self {
            MiscOp::I32TruncSatF32S => "i32.trunc_sat_f32_s",
            MiscOp::I32TruncSatF32U => "i32.trunc_sat_f32_u",
            MiscOp::I32TruncSatF64S => "i32.trunc_sat_f64_s",
            MiscOp::I32TruncSatF64U => "i32.trunc_sat_f64_u",
            MiscOp::I64TruncSatF32S => "i64.trunc_sat_f32_s",
            MiscOp::I64TruncSatF32U => "i64.trunc_sat_f32_u",
            MiscOp::I64TruncSatF64S => "i64.trunc_sat_f64_s",
            MiscOp::I64TruncSatF64U => "i64.trunc_sat_f64_u",
            MiscOp::MemoryCopy => "memory.copy",
            MiscOp::MemoryFill => "memory.fill",
        }
    }

    /// Number of reserved memory index bytes following the sub-opcode.
    pub const fn reserved_bytes(&self) -> usize {
        match self {
            MiscOp::MemoryCopy => 2,
            MiscOp::MemoryFill => 1,
            _ => 0,
        }
    }

    pub const fn gas(&self) -> u64 {
        match self {
            MiscOp::MemoryCopy | MiscOp::MemoryFill => gas::MID,
            _ => gas::LOW,
        }
    }

    pub const fn category(&self) -> GasCategory {
        match self {
            MiscOp::MemoryCopy | MiscOp::MemoryFill => GasCategory::Memory,
            _ => GasCategory::Numeric,
        }
    }
}
