//! Numeric instruction semantics.
//!
//! Integer arithmetic wraps. Integer division and remainder by zero fault with
//! [`VMError::DivisionByZero`]; the one overflowing signed division
//! (`MIN / -1`) wraps like the rest of the arithmetic. Float results that are
//! NaN are replaced by a single canonical bit pattern so execution is
//! deterministic across hosts.

use super::Machine;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::{MiscOp, Opcode};

/// Canonical quiet NaN for `f32` results.
pub const CANONICAL_NAN_F32: u32 = 0x7fc0_0000;
/// Canonical quiet NaN for `f64` results.
pub const CANONICAL_NAN_F64: u64 = 0x7ff8_0000_0000_0000;

#[inline]
pub(super) fn canonical_f32(v: f32) -> f32 {
    if v.is_nan() {
        f32::from_bits(CANONICAL_NAN_F32)
    } else {
        v
    }
}

#[inline]
pub(super) fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::from_bits(CANONICAL_NAN_F64)
    } else {
        v
    }
}

macro_rules! unary {
    ($m:ident, $pop:ident, $push:ident, |$a:ident| $e:expr) => {{
        let $a = $m.$pop()?;
        $m.$push($e)
    }};
}

macro_rules! binary {
    ($m:ident, $pop:ident, $push:ident, |$a:ident, $b:ident| $e:expr) => {{
        let $b = $m.$pop()?;
        let $a = $m.$pop()?;
        $m.$push($e)
    }};
}

macro_rules! checked_div {
    ($m:ident, $pop:ident, $push:ident, $t:ty, $op:ident) => {{
        let b = $m.$pop()? as $t;
        let a = $m.$pop()? as $t;
        if b == 0 {
            return Err(VMError::DivisionByZero);
        }
        $m.$push(a.$op(b) as _)
    }};
}

/// `min` with NaN propagation and `-0 < +0`.
fn fmin<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        F::NAN
    } else if a == b {
        F::from_raw(a.raw() | b.raw())
    } else if a < b {
        a
    } else {
        b
    }
}

/// `max` with NaN propagation and `+0 > -0`.
fn fmax<F: Float>(a: F, b: F) -> F {
    if a.is_nan() || b.is_nan() {
        F::NAN
    } else if a == b {
        F::from_raw(a.raw() & b.raw())
    } else if a > b {
        a
    } else {
        b
    }
}

trait Float: Copy + PartialOrd {
    const NAN: Self;
    fn is_nan(self) -> bool;
    fn raw(self) -> u64;
    fn from_raw(bits: u64) -> Self;
}

impl Float for f32 {
    const NAN: f32 = f32::NAN;
    fn is_nan(self) -> bool {
        f32::is_nan(self)
    }
    fn raw(self) -> u64 {
        self.to_bits() as u64
    }
    fn from_raw(bits: u64) -> f32 {
        f32::from_bits(bits as u32)
    }
}

impl Float for f64 {
    const NAN: f64 = f64::NAN;
    fn is_nan(self) -> bool {
        f64::is_nan(self)
    }
    fn raw(self) -> u64 {
        self.to_bits()
    }
    fn from_raw(bits: u64) -> f64 {
        f64::from_bits(bits)
    }
}

/// Truncates toward zero, failing on NaN or when the result falls outside
/// `[min, max)`.
fn truncate(v: f64, min: f64, max: f64, instruction: &'static str) -> Result<f64, VMError> {
    if v.is_nan() {
        return Err(VMError::InvalidConversion { instruction });
    }
    let t = v.trunc();
    if t < min || t >= max {
        return Err(VMError::InvalidConversion { instruction });
    }
    Ok(t)
}

const I32_RANGE: (f64, f64) = (-2_147_483_648.0, 2_147_483_648.0);
const U32_RANGE: (f64, f64) = (0.0, 4_294_967_296.0);
const I64_RANGE: (f64, f64) = (-9_223_372_036_854_775_808.0, 9_223_372_036_854_775_808.0);
const U64_RANGE: (f64, f64) = (0.0, 18_446_744_073_709_551_616.0);

impl Machine {
    pub(super) fn exec_numeric(&mut self, opcode: Opcode) -> Result<(), VMError> {
        let name = opcode.mnemonic();
        match opcode {
            // i32 comparison
            Opcode::I32Eqz => unary!(self, pop_i32, push_bool, |a| a == 0),
            Opcode::I32Eq => binary!(self, pop_i32, push_bool, |a, b| a == b),
            Opcode::I32Ne => binary!(self, pop_i32, push_bool, |a, b| a != b),
            Opcode::I32LtS => binary!(self, pop_i32, push_bool, |a, b| a < b),
            Opcode::I32LtU => binary!(self, pop_u32, push_bool, |a, b| a < b),
            Opcode::I32GtS => binary!(self, pop_i32, push_bool, |a, b| a > b),
            Opcode::I32GtU => binary!(self, pop_u32, push_bool, |a, b| a > b),
            Opcode::I32LeS => binary!(self, pop_i32, push_bool, |a, b| a <= b),
            Opcode::I32LeU => binary!(self, pop_u32, push_bool, |a, b| a <= b),
            Opcode::I32GeS => binary!(self, pop_i32, push_bool, |a, b| a >= b),
            Opcode::I32GeU => binary!(self, pop_u32, push_bool, |a, b| a >= b),

            // i64 comparison
            Opcode::I64Eqz => unary!(self, pop_i64, push_bool, |a| a == 0),
            Opcode::I64Eq => binary!(self, pop_i64, push_bool, |a, b| a == b),
            Opcode::I64Ne => binary!(self, pop_i64, push_bool, |a, b| a != b),
            Opcode::I64LtS => binary!(self, pop_i64, push_bool, |a, b| a < b),
            Opcode::I64LtU => binary!(self, pop, push_bool, |a, b| a < b),
            Opcode::I64GtS => binary!(self, pop_i64, push_bool, |a, b| a > b),
            Opcode::I64GtU => binary!(self, pop, push_bool, |a, b| a > b),
            Opcode::I64LeS => binary!(self, pop_i64, push_bool, |a, b| a <= b),
            Opcode::I64LeU => binary!(self, pop, push_bool, |a, b| a <= b),
            Opcode::I64GeS => binary!(self, pop_i64, push_bool, |a, b| a >= b),
            Opcode::I64GeU => binary!(self, pop, push_bool, |a, b| a >= b),

            // float comparison
            Opcode::F32Eq => binary!(self, pop_f32, push_bool, |a, b| a == b),
            Opcode::F32Ne => binary!(self, pop_f32, push_bool, |a, b| a != b),
            Opcode::F32Lt => binary!(self, pop_f32, push_bool, |a, b| a < b),
            Opcode::F32Gt => binary!(self, pop_f32, push_bool, |a, b| a > b),
            Opcode::F32Le => binary!(self, pop_f32, push_bool, |a, b| a <= b),
            Opcode::F32Ge => binary!(self, pop_f32, push_bool, |a, b| a >= b),
            Opcode::F64Eq => binary!(self, pop_f64, push_bool, |a, b| a == b),
            Opcode::F64Ne => binary!(self, pop_f64, push_bool, |a, b| a != b),
            Opcode::F64Lt => binary!(self, pop_f64, push_bool, |a, b| a < b),
            Opcode::F64Gt => binary!(self, pop_f64, push_bool, |a, b| a > b),
            Opcode::F64Le => binary!(self, pop_f64, push_bool, |a, b| a <= b),
            Opcode::F64Ge => binary!(self, pop_f64, push_bool, |a, b| a >= b),

            // i32 arithmetic
            Opcode::I32Clz => unary!(self, pop_i32, push_i32, |a| a.leading_zeros() as i32),
            Opcode::I32Ctz => unary!(self, pop_i32, push_i32, |a| a.trailing_zeros() as i32),
            Opcode::I32Popcnt => unary!(self, pop_i32, push_i32, |a| a.count_ones() as i32),
            Opcode::I32Add => binary!(self, pop_i32, push_i32, |a, b| a.wrapping_add(b)),
            Opcode::I32Sub => binary!(self, pop_i32, push_i32, |a, b| a.wrapping_sub(b)),
            Opcode::I32Mul => binary!(self, pop_i32, push_i32, |a, b| a.wrapping_mul(b)),
            Opcode::I32DivS => checked_div!(self, pop_i32, push_i32, i32, wrapping_div),
            Opcode::I32DivU => checked_div!(self, pop_u32, push_i32, u32, wrapping_div),
            Opcode::I32RemS => checked_div!(self, pop_i32, push_i32, i32, wrapping_rem),
            Opcode::I32RemU => checked_div!(self, pop_u32, push_i32, u32, wrapping_rem),
            Opcode::I32And => binary!(self, pop_i32, push_i32, |a, b| a & b),
            Opcode::I32Or => binary!(self, pop_i32, push_i32, |a, b| a | b),
            Opcode::I32Xor => binary!(self, pop_i32, push_i32, |a, b| a ^ b),
            Opcode::I32Shl => binary!(self, pop_i32, push_i32, |a, b| a.wrapping_shl(b as u32)),
            Opcode::I32ShrS => binary!(self, pop_i32, push_i32, |a, b| a.wrapping_shr(b as u32)),
            Opcode::I32ShrU => {
                binary!(self, pop_u32, push_i32, |a, b| a.wrapping_shr(b) as i32)
            }
            Opcode::I32Rotl => binary!(self, pop_u32, push_i32, |a, b| a.rotate_left(b % 32) as i32),
            Opcode::I32Rotr => binary!(self, pop_u32, push_i32, |a, b| a.rotate_right(b % 32) as i32),

            // i64 arithmetic
            Opcode::I64Clz => unary!(self, pop_i64, push_i64, |a| a.leading_zeros() as i64),
            Opcode::I64Ctz => unary!(self, pop_i64, push_i64, |a| a.trailing_zeros() as i64),
            Opcode::I64Popcnt => unary!(self, pop_i64, push_i64, |a| a.count_ones() as i64),
            Opcode::I64Add => binary!(self, pop_i64, push_i64, |a, b| a.wrapping_add(b)),
            Opcode::I64Sub => binary!(self, pop_i64, push_i64, |a, b| a.wrapping_sub(b)),
            Opcode::I64Mul => binary!(self, pop_i64, push_i64, |a, b| a.wrapping_mul(b)),
            Opcode::I64DivS => checked_div!(self, pop_i64, push_i64, i64, wrapping_div),
            Opcode::I64DivU => checked_div!(self, pop, push_i64, u64, wrapping_div),
            Opcode::I64RemS => checked_div!(self, pop_i64, push_i64, i64, wrapping_rem),
            Opcode::I64RemU => checked_div!(self, pop, push_i64, u64, wrapping_rem),
            Opcode::I64And => binary!(self, pop_i64, push_i64, |a, b| a & b),
            Opcode::I64Or => binary!(self, pop_i64, push_i64, |a, b| a | b),
            Opcode::I64Xor => binary!(self, pop_i64, push_i64, |a, b| a ^ b),
            Opcode::I64Shl => binary!(self, pop_i64, push_i64, |a, b| a.wrapping_shl(b as u32)),
            Opcode::I64ShrS => binary!(self, pop_i64, push_i64, |a, b| a.wrapping_shr(b as u32)),
            Opcode::I64ShrU => binary!(self, pop, push_i64, |a, b| a.wrapping_shr(b as u32) as i64),
            Opcode::I64Rotl => {
                binary!(self, pop, push_i64, |a, b| a.rotate_left((b % 64) as u32) as i64)
            }
            Opcode::I64Rotr => {
                binary!(self, pop, push_i64, |a, b| a.rotate_right((b % 64) as u32) as i64)
            }

            // f32 arithmetic
            Opcode::F32Abs => unary!(self, pop_f32, push_f32, |a| a.abs()),
            Opcode::F32Neg => unary!(self, pop_f32, push_f32, |a| -a),
            Opcode::F32Ceil => unary!(self, pop_f32, push_f32, |a| a.ceil()),
            Opcode::F32Floor => unary!(self, pop_f32, push_f32, |a| a.floor()),
            Opcode::F32Trunc => unary!(self, pop_f32, push_f32, |a| a.trunc()),
            Opcode::F32Nearest => unary!(self, pop_f32, push_f32, |a| a.round_ties_even()),
            Opcode::F32Sqrt => unary!(self, pop_f32, push_f32, |a| a.sqrt()),
            Opcode::F32Add => binary!(self, pop_f32, push_f32, |a, b| a + b),
            Opcode::F32Sub => binary!(self, pop_f32, push_f32, |a, b| a - b),
            Opcode::F32Mul => binary!(self, pop_f32, push_f32, |a, b| a * b),
            Opcode::F32Div => binary!(self, pop_f32, push_f32, |a, b| a / b),
            Opcode::F32Min => binary!(self, pop_f32, push_f32, |a, b| fmin(a, b)),
            Opcode::F32Max => binary!(self, pop_f32, push_f32, |a, b| fmax(a, b)),
            Opcode::F32Copysign => binary!(self, pop_f32, push_f32, |a, b| a.copysign(b)),

            // f64 arithmetic
            Opcode::F64Abs => unary!(self, pop_f64, push_f64, |a| a.abs()),
            Opcode::F64Neg => unary!(self, pop_f64, push_f64, |a| -a),
            Opcode::F64Ceil => unary!(self, pop_f64, push_f64, |a| a.ceil()),
            Opcode::F64Floor => unary!(self, pop_f64, push_f64, |a| a.floor()),
            Opcode::F64Trunc => unary!(self, pop_f64, push_f64, |a| a.trunc()),
            Opcode::F64Nearest => unary!(self, pop_f64, push_f64, |a| a.round_ties_even()),
            Opcode::F64Sqrt => unary!(self, pop_f64, push_f64, |a| a.sqrt()),
            Opcode::F64Add => binary!(self, pop_f64, push_f64, |a, b| a + b),
            Opcode::F64Sub => binary!(self, pop_f64, push_f64, |a, b| a - b),
            Opcode::F64Mul => binary!(self, pop_f64, push_f64, |a, b| a * b),
            Opcode::F64Div => binary!(self, pop_f64, push_f64, |a, b| a / b),
            Opcode::F64Min => binary!(self, pop_f64, push_f64, |a, b| fmin(a, b)),
            Opcode::F64Max => binary!(self, pop_f64, push_f64, |a, b| fmax(a, b)),
            Opcode::F64Copysign => binary!(self, pop_f64, push_f64, |a, b| a.copysign(b)),

            // conversions
            Opcode::I32WrapI64 => unary!(self, pop_i64, push_i32, |a| a as i32),
            Opcode::I32TruncF32S => {
                let v = self.pop_f32()? as f64;
                let t = truncate(v, I32_RANGE.0, I32_RANGE.1, name)?;
                self.push_i32(t as i32)
            }
            Opcode::I32TruncF32U => {
                let v = self.pop_f32()? as f64;
                let t = truncate(v, U32_RANGE.0, U32_RANGE.1, name)?;
                self.push_i32(t as u32 as i32)
            }
            Opcode::I32TruncF64S => {
                let v = self.pop_f64()?;
                let t = truncate(v, I32_RANGE.0, I32_RANGE.1, name)?;
                self.push_i32(t as i32)
            }
            Opcode::I32TruncF64U => {
                let v = self.pop_f64()?;
                let t = truncate(v, U32_RANGE.0, U32_RANGE.1, name)?;
                self.push_i32(t as u32 as i32)
            }
            Opcode::I64ExtendI32S => unary!(self, pop_i32, push_i64, |a| a as i64),
            Opcode::I64ExtendI32U => unary!(self, pop_u32, push_i64, |a| a as i64),
            Opcode::I64TruncF32S => {
                let v = self.pop_f32()? as f64;
                let t = truncate(v, I64_RANGE.0, I64_RANGE.1, name)?;
                self.push_i64(t as i64)
            }
            Opcode::I64TruncF32U => {
                let v = self.pop_f32()? as f64;
                let t = truncate(v, U64_RANGE.0, U64_RANGE.1, name)?;
                self.push(t as u64)
            }
            Opcode::I64TruncF64S => {
                let v = self.pop_f64()?;
                let t = truncate(v, I64_RANGE.0, I64_RANGE.1, name)?;
                self.push_i64(t as i64)
            }
            Opcode::I64TruncF64U => {
                let v = self.pop_f64()?;
                let t = truncate(v, U64_RANGE.0, U64_RANGE.1, name)?;
                self.push(t as u64)
            }
            Opcode::F32ConvertI32S => unary!(self, pop_i32, push_f32, |a| a as f32),
            Opcode::F32ConvertI32U => unary!(self, pop_u32, push_f32, |a| a as f32),
            Opcode::F32ConvertI64S => unary!(self, pop_i64, push_f32, |a| a as f32),
            Opcode::F32ConvertI64U => unary!(self, pop, push_f32, |a| a as f32),
            Opcode::F32DemoteF64 => unary!(self, pop_f64, push_f32, |a| a as f32),
            Opcode::F64ConvertI32S => unary!(self, pop_i32, push_f64, |a| a as f64),
            Opcode::F64ConvertI32U => unary!(self, pop_u32, push_f64, |a| a as f64),
            Opcode::F64ConvertI64S => unary!(self, pop_i64, push_f64, |a| a as f64),
            Opcode::F64ConvertI64U => unary!(self, pop, push_f64, |a| a as f64),
            Opcode::F64PromoteF32 => unary!(self, pop_f32, push_f64, |a| a as f64),
            // Words already hold bit patterns; reinterpretation only re-types them.
            Opcode::I32ReinterpretF32
            | Opcode::I64ReinterpretF64
            | Opcode::F32ReinterpretI32
            | Opcode::F64ReinterpretI64 => unary!(self, pop, push, |a| a),
            Opcode::I32Extend8S => unary!(self, pop_i32, push_i32, |a| a as i8 as i32),
            Opcode::I32Extend16S => unary!(self, pop_i32, push_i32, |a| a as i16 as i32),
            Opcode::I64Extend8S => unary!(self, pop_i64, push_i64, |a| a as i8 as i64),
            Opcode::I64Extend16S => unary!(self, pop_i64, push_i64, |a| a as i16 as i64),
            Opcode::I64Extend32S => unary!(self, pop_i64, push_i64, |a| a as i32 as i64),

            _ => Err(VMError::InvalidInstruction {
                opcode: opcode as u8,
                offset: 0,
            }),
        }
    }

    /// Executes a `0xFC`-prefixed instruction.
    pub(super) fn exec_misc(&mut self, op: MiscOp) -> Result<(), VMError> {
        // `as` casts from float to int saturate and map NaN to zero.
        match op {
            MiscOp::I32TruncSatF32S => unary!(self, pop_f32, push_i32, |a| a as i32),
            MiscOp::I32TruncSatF32U => unary!(self, pop_f32, push_i32, |a| a as u32 as i32),
            MiscOp::I32TruncSatF64S => unary!(self, pop_f64, push_i32, |a| a as i32),
            MiscOp::I32TruncSatF64U => unary!(self, pop_f64, push_i32, |a| a as u32 as i32),
            MiscOp::I64TruncSatF32S => unary!(self, pop_f32, push_i64, |a| a as i64),
            MiscOp::I64TruncSatF32U => unary!(self, pop_f32, push, |a| a as u64),
            MiscOp::I64TruncSatF64S => unary!(self, pop_f64, push_i64, |a| a as i64),
            MiscOp::I64TruncSatF64U => unary!(self, pop_f64, push, |a| a as u64),
            MiscOp::MemoryCopy => self.exec_memory_copy(),
            MiscOp::MemoryFill => self.exec_memory_fill(),
        }
    }
}
