//! LEB128 variable-length integers and fixed-width float immediates.
//!
//! Every reader takes the whole input plus a start position and returns the
//! decoded value with the number of bytes consumed, so callers can advance
//! their own cursor. Readers enforce the maximum encoded length of the target
//! width and reject unused high bits that disagree with the value.

use crate::virtual_machine::errors::VMError;

fn truncated(pos: usize) -> VMError {
    VMError::DecodeError {
        offset: pos,
        reason: "truncated LEB128 integer".to_string(),
    }
}

fn too_long(pos: usize, bits: u32) -> VMError {
    VMError::DecodeError {
        offset: pos,
        reason: format!("LEB128 integer too large for {bits} bits"),
    }
}

fn read_unsigned(bytes: &[u8], pos: usize, bits: u32) -> Result<(u64, usize), VMError> {
    let max_len = bits.div_ceil(7) as usize;
    let mut result = 0u64;
    let mut shift = 0u32;
    let mut n = 0usize;
    loop {
        let byte = *bytes.get(pos + n).ok_or_else(|| truncated(pos))?;
        n += 1;
        let low = (byte & 0x7f) as u64;
        if n == max_len {
            let used = bits - shift;
            if byte & 0x80 != 0 || low >> used != 0 {
                return Err(too_long(pos, bits));
            }
        }
        result |= low << shift;
        if byte & 0x80 == 0 {
            return Ok((result, n));
        }
        shift += 7;
    }
}

fn read_signed(bytes: &[u8], pos: usize, bits: u32) -> Result<(i64, usize), VMError> {
    let max_len = bits.div_ceil(7) as usize;
    let mut result = 0i64;
    let mut shift = 0u32;
    let mut n = 0usize;
    loop {
        let byte = *bytes.get(pos + n).ok_or_else(|| truncated(pos))?;
        n += 1;
        let low = (byte & 0x7f) as i64;
        if n == max_len {
            let used = bits - shift;
            let sign = (low >> (used - 1)) & 1;
            let expected = if sign == 1 { 0x7f >> used } else { 0 };
            if byte & 0x80 != 0 || low >> used != expected {
                return Err(too_long(pos, bits));
            }
        }
        result |= low << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            if shift < 64 && byte & 0x40 != 0 {
                result |= -1i64 << shift;
            }
            return Ok((result, n));
        }
    }
}

/// Reads an unsigned 32-bit LEB128 integer.
pub fn read_u32(bytes: &[u8], pos: usize) -> Result<(u32, usize), VMError> {
    read_unsigned(bytes, pos, 32).map(|(v, n)| (v as u32, n))
}

/// Reads an unsigned 64-bit LEB128 integer.
pub fn read_u64(bytes: &[u8], pos: usize) -> Result<(u64, usize), VMError> {
    read_unsigned(bytes, pos, 64)
}

/// Reads a signed 32-bit LEB128 integer.
pub fn read_i32(bytes: &[u8], pos: usize) -> Result<(i32, usize), VMError> {
    read_signed(bytes, pos, 32).map(|(v, n)| (v as i32, n))
}

/// Reads a signed 64-bit LEB128 integer.
pub fn read_i64(bytes: &[u8], pos: usize) -> Result<(i64, usize), VMError> {
    read_signed(bytes, pos, 64)
}

/// Reads the little-endian bit pattern of an `f32` immediate (4 bytes).
pub fn read_f32_bits(bytes: &[u8], pos: usize) -> Result<(u32, usize), VMError> {
    let raw = bytes.get(pos..pos + 4).ok_or(VMError::DecodeError {
        offset: pos,
        reason: "truncated f32 immediate".to_string(),
    })?;
    let mut arr = [0u8; 4];
    arr.copy_from_slice(raw);
    Ok((u32::from_le_bytes(arr), 4))
}

/// Reads the little-endian bit pattern of an `f64` immediate (8 bytes).
pub fn read_f64_bits(bytes: &[u8], pos: usize) -> Result<(u64, usize), VMError> {
    let raw = bytes.get(pos..pos + 8).ok_or(VMError::DecodeError {
        offset: pos,
        reason: "truncated f64 immediate".to_string(),
    })?;
    let mut arr = [0u8; 8];
    arr.copy_from_slice(raw);
    Ok((u64::from_le_bytes(arr), 8))
}

/// Appends the unsigned LEB128 encoding of `value`.
pub fn write_u64(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends the unsigned LEB128 encoding of `value`.
pub fn write_u32(value: u32, out: &mut Vec<u8>) {
    write_u64(value as u64, out);
}

/// Appends the signed LEB128 encoding of `value`.
pub fn write_i64(mut value: i64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        let done = (value == 0 && byte & 0x40 == 0) || (value == -1 && byte & 0x40 != 0);
        if done {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Appends the signed LEB128 encoding of `value`.
pub fn write_i32(value: i32, out: &mut Vec<u8>) {
    write_i64(value as i64, out);
}
