//! Invocation context: the contract being called, the block it runs in, and the
//! byte-encoded call payload.

use crate::types::hash::{FUNCTION_ID_LEN, FunctionId, Hash};
use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::leb128;
use crate::virtual_machine::module::ValueKind;
use crate::virtual_machine::operation::Value;

/// Externally addressable code plus its value-transfer context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    /// Account address of the contract.
    pub address: Hash,
    /// Account that initiated the call.
    pub caller: Hash,
    /// Value transferred with the call.
    pub value: u64,
    /// Balance of the contract account.
    pub balance: u64,
    /// Raw call input readable through the environment instructions.
    pub input: Vec<u8>,
    /// Gas the caller makes available to the call.
    pub gas: u64,
    /// Functions this contract may call, by content hash. `call N` targets entry `N`.
    pub functions: Vec<FunctionId>,
}

impl Contract {
    pub fn new(address: Hash, caller: Hash, functions: Vec<FunctionId>) -> Self {
        Self {
            address,
            caller,
            value: 0,
            balance: 0,
            input: Vec::new(),
            gas: 0,
            functions,
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = gas;
        self
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }

    pub fn with_balance(mut self, balance: u64) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_input(mut self, input: Vec<u8>) -> Self {
        self.input = input;
        self
    }

    /// Returns true if the contract declares the function `id`.
    pub fn declares(&self, id: &FunctionId) -> bool {
        self.functions.contains(id)
    }

    /// Resolves a `call` index to the declared function hash.
    pub fn function(&self, index: u32) -> Result<FunctionId, VMError> {
        self.functions
            .get(index as usize)
            .copied()
            .ok_or_else(|| VMError::UnknownFunction {
                function: format!("#{index}"),
            })
    }
}

/// Block-level context the call executes in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExecContext {
    /// Block timestamp in seconds.
    pub timestamp: u64,
}

/// Decoded invocation payload.
///
/// Wire shape: `[16-byte function id]` then, per parameter, one value-kind tag
/// byte followed by a signed LEB128 integer (`i32`, `i64`) or the little-endian
/// bit pattern of a float (`f32`: 4 bytes, `f64`: 8 bytes).
#[derive(Clone, Debug, PartialEq)]
pub struct CallPayload {
    pub id: FunctionId,
    pub params: Vec<Value>,
}

impl CallPayload {
    pub fn new(id: FunctionId, params: Vec<Value>) -> Self {
        Self { id, params }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FUNCTION_ID_LEN + self.params.len() * 9);
        out.extend_from_slice(self.id.as_slice());
        for param in &self.params {
            out.push(param.kind().to_byte());
            match *param {
                Value::I32(v) => leb128::write_i32(v, &mut out),
                Value::I64(v) => leb128::write_i64(v, &mut out),
                Value::F32(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
                Value::F64(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            }
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<CallPayload, VMError> {
        let id = bytes
            .get(..FUNCTION_ID_LEN)
            .and_then(FunctionId::from_slice)
            .ok_or(VMError::DecodeError {
                offset: 0,
                reason: "call payload shorter than a function id".to_string(),
            })?;

        let mut params = Vec::new();
        let mut pos = FUNCTION_ID_LEN;
        while pos < bytes.len() {
            let tag = bytes[pos];
            let kind = ValueKind::from_byte(tag).ok_or(VMError::DecodeError {
                offset: pos,
                reason: format!("bad parameter tag 0x{tag:02x}"),
            })?;
            pos += 1;
            let (value, used) = match kind {
                ValueKind::I32 => {
                    let (v, n) = leb128::read_i32(bytes, pos)?;
                    (Value::I32(v), n)
                }
                ValueKind::I64 => {
                    let (v, n) = leb128::read_i64(bytes, pos)?;
                    (Value::I64(v), n)
                }
                ValueKind::F32 => {
                    let (bits, n) = leb128::read_f32_bits(bytes, pos)?;
                    (Value::F32(f32::from_bits(bits)), n)
                }
                ValueKind::F64 => {
                    let (bits, n) = leb128::read_f64_bits(bytes, pos)?;
                    (Value::F64(f64::from_bits(bits)), n)
                }
            };
            params.push(value);
            pos += used;
        }

        Ok(CallPayload { id, params })
    }
}
