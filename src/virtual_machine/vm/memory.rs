//! Linear memory and the load/store instruction family.

use super::Machine;
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;
use crate::virtual_machine::operation::MemArg;

/// Size of one memory page in bytes.
pub const PAGE_SIZE: usize = 65_536;

/// Flat, page-granular, growable byte buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    max_pages: u32,
}

impl LinearMemory {
    /// Allocates `pages` zeroed pages; the memory can later grow up to `max_pages`.
    pub fn new(pages: u32, max_pages: u32) -> Self {
        Self {
            bytes: vec![0; pages as usize * PAGE_SIZE],
            max_pages,
        }
    }

    pub fn pages(&self) -> u32 {
        (self.bytes.len() / PAGE_SIZE) as u32
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Grows by `delta` pages, returning the previous page count, or `None` if
    /// the result would exceed the page limit.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let old = self.pages();
        let new = old.checked_add(delta).filter(|&p| p <= self.max_pages)?;
        self.bytes.resize(new as usize * PAGE_SIZE, 0);
        Some(old)
    }

    /// Validates `[address, address + len)` and returns it as a byte range start.
    fn check(&self, address: u64, len: u64) -> Result<usize, VMError> {
        match address.checked_add(len) {
            Some(end) if end <= self.bytes.len() as u64 => Ok(address as usize),
            _ => Err(VMError::MemoryOutOfBounds {
                address,
                len,
                size: self.bytes.len(),
            }),
        }
    }

    pub fn slice(&self, address: u64, len: u64) -> Result<&[u8], VMError> {
        let start = self.check(address, len)?;
        Ok(&self.bytes[start..start + len as usize])
    }

    pub fn read<const N: usize>(&self, address: u64) -> Result<[u8; N], VMError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(address, N as u64)?);
        Ok(out)
    }

    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), VMError> {
        let start = self.check(address, data.len() as u64)?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn fill(&mut self, address: u64, len: u64, value: u8) -> Result<(), VMError> {
        let start = self.check(address, len)?;
        self.bytes[start..start + len as usize].fill(value);
        Ok(())
    }

    /// Copies `len` bytes from `src` to `dst`; the ranges may overlap.
    pub fn copy_within(&mut self, src: u64, dst: u64, len: u64) -> Result<(), VMError> {
        let from = self.check(src, len)?;
        let to = self.check(dst, len)?;
        self.bytes.copy_within(from..from + len as usize, to);
        Ok(())
    }
}

impl Machine {
    /// Pops a 32-bit address operand and adds the static offset.
    fn effective_address(&mut self, memarg: &MemArg) -> Result<u64, VMError> {
        let index = self.pop_u32()? as u64;
        Ok(index + memarg.offset as u64)
    }

    pub(super) fn exec_load(&mut self, opcode: Opcode, memarg: &MemArg) -> Result<(), VMError> {
        let address = self.effective_address(memarg)?;
        let m = &self.memory;
        let word = match opcode {
            Opcode::I32Load | Opcode::F32Load => u32::from_le_bytes(m.read(address)?) as u64,
            Opcode::I64Load | Opcode::F64Load => u64::from_le_bytes(m.read(address)?),
            Opcode::I32Load8S => i8::from_le_bytes(m.read(address)?) as i32 as u32 as u64,
            Opcode::I32Load8U => u8::from_le_bytes(m.read(address)?) as u64,
            Opcode::I32Load16S => i16::from_le_bytes(m.read(address)?) as i32 as u32 as u64,
            Opcode::I32Load16U => u16::from_le_bytes(m.read(address)?) as u64,
            Opcode::I64Load8S => i8::from_le_bytes(m.read(address)?) as i64 as u64,
            Opcode::I64Load8U => u8::from_le_bytes(m.read(address)?) as u64,
            Opcode::I64Load16S => i16::from_le_bytes(m.read(address)?) as i64 as u64,
            Opcode::I64Load16U => u16::from_le_bytes(m.read(address)?) as u64,
            Opcode::I64Load32S => i32::from_le_bytes(m.read(address)?) as i64 as u64,
            Opcode::I64Load32U => u32::from_le_bytes(m.read(address)?) as u64,
            _ => {
                return Err(VMError::InvalidInstruction {
                    opcode: opcode as u8,
                    offset: 0,
                });
            }
        };
        self.push(word)
    }

    pub(super) fn exec_store(&mut self, opcode: Opcode, memarg: &MemArg) -> Result<(), VMError> {
        let value = self.pop()?;
        let address = self.effective_address(memarg)?;
        let bytes = value.to_le_bytes();
        let width = match opcode {
            Opcode::I32Store8 | Opcode::I64Store8 => 1,
            Opcode::I32Store16 | Opcode::I64Store16 => 2,
            Opcode::I32Store | Opcode::F32Store | Opcode::I64Store32 => 4,
            Opcode::I64Store | Opcode::F64Store => 8,
            _ => {
                return Err(VMError::InvalidInstruction {
                    opcode: opcode as u8,
                    offset: 0,
                });
            }
        };
        self.memory.write(address, &bytes[..width])
    }

    pub(super) fn exec_memory_grow(&mut self) -> Result<(), VMError> {
        let delta = self.pop_u32()?;
        let result = match self.memory.grow(delta) {
            Some(old) => old as i32,
            None => -1,
        };
        self.push_i32(result)
    }

    /// `memory.copy`: pops length, source and destination.
    pub(super) fn exec_memory_copy(&mut self) -> Result<(), VMError> {
        let len = self.pop_u32()? as u64;
        let src = self.pop_u32()? as u64;
        let dst = self.pop_u32()? as u64;
        self.memory.copy_within(src, dst, len)
    }

    /// `memory.fill`: pops length, byte value and destination.
    pub(super) fn exec_memory_fill(&mut self) -> Result<(), VMError> {
        let len = self.pop_u32()? as u64;
        let value = self.pop_u32()? as u8;
        let dst = self.pop_u32()? as u64;
        self.memory.fill(dst, len, value)
    }
}
