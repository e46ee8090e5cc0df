//! Contract environment instructions (`0xE0..=0xE7`).

use super::{Env, Flow, Machine};
use crate::types::hash::{FUNCTION_ID_LEN, FunctionId};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::isa::Opcode;

impl Machine {
    pub(super) fn exec_env(&mut self, opcode: Opcode, env: &Env<'_>) -> Result<Flow, VMError> {
        let contract = env.contract;
        match opcode {
            Opcode::EnvAddress => {
                let ptr = self.pop_u32()? as u64;
                self.memory.write(ptr, contract.address.as_slice())?;
            }
            Opcode::EnvBalance => self.push_i64(contract.balance as i64)?,
            Opcode::EnvCaller => {
                let ptr = self.pop_u32()? as u64;
                self.memory.write(ptr, contract.caller.as_slice())?;
            }
            Opcode::EnvTimestamp => self.push_i64(env.context.timestamp as i64)?,
            Opcode::EnvInputSize => self.push_i32(contract.input.len() as i32)?,
            Opcode::EnvValue => self.push_i64(contract.value as i64)?,
            Opcode::EnvInputCopy => {
                let len = self.pop_u32()? as usize;
                let offset = self.pop_u32()? as usize;
                let dst = self.pop_u32()? as u64;
                let src = offset
                    .checked_add(len)
                    .and_then(|end| contract.input.get(offset..end))
                    .ok_or(VMError::MemoryOutOfBounds {
                        address: offset as u64,
                        len: len as u64,
                        size: contract.input.len(),
                    })?;
                self.memory.write(dst, src)?;
            }
            Opcode::EnvCallHash => {
                let ptr = self.pop_u32()? as u64;
                let id = FunctionId(self.memory.read::<FUNCTION_ID_LEN>(ptr)?);
                if !contract.declares(&id) {
                    return Err(VMError::UnknownFunction {
                        function: id.to_string(),
                    });
                }
                return env.resolver.resolve(&id).map(Flow::Call);
            }
            _ => {
                return Err(VMError::InvalidInstruction {
                    opcode: opcode as u8,
                    offset: 0,
                });
            }
        }
        Ok(Flow::Next)
    }
}
