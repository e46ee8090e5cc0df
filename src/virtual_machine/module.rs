//! Binary module decoding.
//!
//! [`decode`] turns a module container (magic + version, then a sequence of
//! tagged, length-prefixed sections) into a [`Module`]. Function bodies are only
//! decoded structurally here: their locals are expanded and their instruction
//! bytes are kept raw for the [`parser`](super::parser).
//!
//! # Section format
//!
//! ```text
//! section := id:u8  size:leb128(u32)  payload:[u8; size]
//! ```
//!
//! The payload of every section must be consumed exactly; a mismatch between
//! the declared size and the bytes the section's elements occupy is an error.

use crate::virtual_machine::errors::VMError;
use crate::virtual_machine::leb128;

/// Module magic (`\0asm`) followed by binary format version 1.
pub const MAGIC_AND_VERSION: [u8; 8] = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];

/// Upper bound on the locals a single function may declare.
pub const MAX_FUNCTION_LOCALS: usize = 50_000;

/// Numeric value kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    I32,
    I64,
    F32,
    F64,
}

impl ValueKind {
    /// Decodes a value-kind byte.
    pub const fn from_byte(byte: u8) -> Option<ValueKind> {
        match byte {
            0x7f => Some(ValueKind::I32),
            0x7e => Some(ValueKind::I64),
            0x7d => Some(ValueKind::F32),
            0x7c => Some(ValueKind::F64),
            _ => None,
        }
    }

    /// Returns the binary encoding of this kind.
    pub const fn to_byte(self) -> u8 {
        match self {
            ValueKind::I32 => 0x7f,
            ValueKind::I64 => 0x7e,
            ValueKind::F32 => 0x7d,
            ValueKind::F64 => 0x7c,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
        }
    }
}

/// Function type: parameter kinds and result kinds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<ValueKind>,
    pub results: Vec<ValueKind>,
}

impl Signature {
    pub fn new(params: Vec<ValueKind>, results: Vec<ValueKind>) -> Self {
        Self { params, results }
    }
}

/// Size bounds of a memory (in pages) or table (in elements).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableType {
    /// Reference type byte (`0x70` funcref, `0x6f` externref).
    pub element: u8,
    pub limits: Limits,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalType {
    pub kind: ValueKind,
    pub mutable: bool,
}

/// Constant initializer expression (a single instruction followed by `end`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstExpr {
    I32(i32),
    I64(i64),
    /// Bit pattern of an `f32` constant.
    F32(u32),
    /// Bit pattern of an `f64` constant.
    F64(u64),
    GlobalGet(u32),
    RefNull(u8),
    RefFunc(u32),
}

impl ConstExpr {
    /// Returns the expression's value as a stack word, if it is a numeric constant.
    pub fn as_word(&self) -> Option<u64> {
        match *self {
            ConstExpr::I32(v) => Some(v as u32 as u64),
            ConstExpr::I64(v) => Some(v as u64),
            ConstExpr::F32(bits) => Some(bits as u64),
            ConstExpr::F64(bits) => Some(bits),
            ConstExpr::GlobalGet(_) | ConstExpr::RefNull(_) | ConstExpr::RefFunc(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    pub ty: GlobalType,
    pub init: ConstExpr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExternalKind {
    Function,
    Table,
    Memory,
    Global,
}

impl ExternalKind {
    fn from_byte(byte: u8) -> Option<ExternalKind> {
        match byte {
            0x00 => Some(ExternalKind::Function),
            0x01 => Some(ExternalKind::Table),
            0x02 => Some(ExternalKind::Memory),
            0x03 => Some(ExternalKind::Global),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Export {
    pub name: String,
    pub kind: ExternalKind,
    pub index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportDesc {
    Function(u32),
    Table(TableType),
    Memory(Limits),
    Global(GlobalType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

/// Active element segment initializing table 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElementSegment {
    pub offset: ConstExpr,
    pub functions: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataMode {
    /// Copied into memory at instantiation.
    Active { memory: u32, offset: ConstExpr },
    /// Kept aside; never copied implicitly.
    Passive,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSegment {
    pub mode: DataMode,
    pub bytes: Vec<u8>,
}

/// One code section entry: expanded locals plus the raw, unparsed body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionBody {
    /// Declared locals, one entry per local (run-length groups expanded).
    pub locals: Vec<ValueKind>,
    /// Instruction bytes, including the trailing `end` opcode.
    pub code: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomSection {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Decoded binary container. Immutable once decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Module {
    pub types: Vec<Signature>,
    pub imports: Vec<Import>,
    /// Type index of each function defined by the code section.
    pub functions: Vec<u32>,
    pub tables: Vec<TableType>,
    pub memory: Option<Limits>,
    pub globals: Vec<Global>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub code: Vec<FunctionBody>,
    pub data: Vec<DataSegment>,
    pub data_count: Option<u32>,
    pub customs: Vec<CustomSection>,
}

impl Module {
    /// Decodes a module from its binary representation. See [`decode`].
    pub fn decode(bytes: &[u8]) -> Result<Module, VMError> {
        decode(bytes)
    }

    /// Returns the signature of the function at `index`.
    pub fn signature(&self, index: u32) -> Option<&Signature> {
        let type_index = *self.functions.get(index as usize)?;
        self.types.get(type_index as usize)
    }

    /// Looks up an export by name and kind.
    pub fn export(&self, name: &str, kind: ExternalKind) -> Option<u32> {
        self.exports
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .map(|e| e.index)
    }
}

mod section {
    pub const CUSTOM: u8 = 0;
    pub const TYPE: u8 = 1;
    pub const IMPORT: u8 = 2;
    pub const FUNCTION: u8 = 3;
    pub const TABLE: u8 = 4;
    pub const MEMORY: u8 = 5;
    pub const GLOBAL: u8 = 6;
    pub const EXPORT: u8 = 7;
    pub const START: u8 = 8;
    pub const ELEMENT: u8 = 9;
    pub const CODE: u8 = 10;
    pub const DATA: u8 = 11;
    pub const DATA_COUNT: u8 = 12;
}

/// Byte cursor over a module (or one of its sections).
///
/// Offsets reported in errors are absolute positions in the module.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            base: 0,
        }
    }

    fn offset(&self) -> usize {
        self.base + self.pos
    }

    fn err(&self, reason: impl Into<String>) -> VMError {
        VMError::DecodeError {
            offset: self.offset(),
            reason: reason.into(),
        }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn u8(&mut self) -> Result<u8, VMError> {
        let byte = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| self.err("unexpected end of input"))?;
        self.pos += 1;
        Ok(byte)
    }

    fn u32(&mut self) -> Result<u32, VMError> {
        let (v, n) = leb128::read_u32(self.bytes, self.pos).map_err(|e| self.rebase(e))?;
        self.pos += n;
        Ok(v)
    }

    fn i32(&mut self) -> Result<i32, VMError> {
        let (v, n) = leb128::read_i32(self.bytes, self.pos).map_err(|e| self.rebase(e))?;
        self.pos += n;
        Ok(v)
    }

    fn i64(&mut self) -> Result<i64, VMError> {
        let (v, n) = leb128::read_i64(self.bytes, self.pos).map_err(|e| self.rebase(e))?;
        self.pos += n;
        Ok(v)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], VMError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| self.err(format!("expected {len} more bytes")))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    /// Splits off the next `len` bytes as an independent reader.
    fn sub(&mut self, len: usize) -> Result<Reader<'a>, VMError> {
        let base = self.offset();
        let bytes = self.bytes(len)?;
        Ok(Reader { bytes, pos: 0, base })
    }

    fn rebase(&self, err: VMError) -> VMError {
        match err {
            VMError::DecodeError { offset, reason } => VMError::DecodeError {
                offset: self.base + offset,
                reason,
            },
            other => other,
        }
    }

    fn name(&mut self) -> Result<String, VMError> {
        let len = self.u32()? as usize;
        let raw = self.bytes(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| self.err("name is not valid UTF-8"))
    }

    fn value_kind(&mut self) -> Result<ValueKind, VMError> {
        let byte = self.u8()?;
        ValueKind::from_byte(byte).ok_or_else(|| self.err(format!("bad value kind 0x{byte:02x}")))
    }

    /// Reads a count-prefixed vector, decoding each element with `f`.
    fn vec<T>(
        &mut self,
        mut f: impl FnMut(&mut Reader<'a>) -> Result<T, VMError>,
    ) -> Result<Vec<T>, VMError> {
        let count = self.u32()? as usize;
        // Every element occupies at least one byte, which bounds the allocation.
        let remaining = self.bytes.len() - self.pos;
        if count > remaining {
            return Err(self.err(format!("vector of {count} elements exceeds input")));
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(f(self)?);
        }
        Ok(out)
    }

    fn limits(&mut self) -> Result<Limits, VMError> {
        match self.u8()? {
            0x00 => Ok(Limits {
                min: self.u32()?,
                max: None,
            }),
            0x01 => {
                let min = self.u32()?;
                let max = self.u32()?;
                if max < min {
                    return Err(self.err("limits maximum below minimum"));
                }
                Ok(Limits {
                    min,
                    max: Some(max),
                })
            }
            flag => Err(self.err(format!("bad limits flag 0x{flag:02x}"))),
        }
    }

    fn table_type(&mut self) -> Result<TableType, VMError> {
        let element = self.u8()?;
        if element != 0x70 && element != 0x6f {
            return Err(self.err(format!("bad reference type 0x{element:02x}")));
        }
        Ok(TableType {
            element,
            limits: self.limits()?,
        })
    }

    fn global_type(&mut self) -> Result<GlobalType, VMError> {
        let kind = self.value_kind()?;
        let mutable = match self.u8()? {
            0x00 => false,
            0x01 => true,
            flag => return Err(self.err(format!("bad mutability flag 0x{flag:02x}"))),
        };
        Ok(GlobalType { kind, mutable })
    }

    fn const_expr(&mut self) -> Result<ConstExpr, VMError> {
        let expr = match self.u8()? {
            0x41 => ConstExpr::I32(self.i32()?),
            0x42 => ConstExpr::I64(self.i64()?),
            0x43 => {
                let raw = self.bytes(4)?;
                ConstExpr::F32(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
            0x44 => {
                let raw = self.bytes(8)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(raw);
                ConstExpr::F64(u64::from_le_bytes(arr))
            }
            0x23 => ConstExpr::GlobalGet(self.u32()?),
            0xd0 => ConstExpr::RefNull(self.u8()?),
            0xd2 => ConstExpr::RefFunc(self.u32()?),
            op => return Err(self.err(format!("unsupported constant expression opcode 0x{op:02x}"))),
        };
        match self.u8()? {
            0x0b => Ok(expr),
            _ => Err(self.err("constant expression not terminated by end")),
        }
    }
}

/// Decodes a binary module.
///
/// Fails with [`VMError::DecodeError`] on a bad magic/version header, on a section
/// whose declared size disagrees with its contents, on a duplicated section
/// (including more than one memory section), on an unknown section id, or when
/// the function and code sections have different lengths.
pub fn decode(bytes: &[u8]) -> Result<Module, VMError> {
    if bytes.len() < MAGIC_AND_VERSION.len() || bytes[..8] != MAGIC_AND_VERSION {
        return Err(VMError::DecodeError {
            offset: 0,
            reason: "bad magic or version".to_string(),
        });
    }

    let mut reader = Reader::new(bytes);
    reader.pos = MAGIC_AND_VERSION.len();
    let mut module = Module::default();
    let mut seen = [false; 13];

    while !reader.is_empty() {
        let id = reader.u8()?;
        let size = reader.u32()? as usize;
        let mut payload = reader.sub(size)?;

        if id != section::CUSTOM {
            match seen.get_mut(id as usize) {
                None => return Err(payload.err(format!("unknown section id {id}"))),
                Some(true) if id == section::MEMORY => {
                    return Err(payload.err("more than one memory section"));
                }
                Some(true) => return Err(payload.err(format!("duplicate section id {id}"))),
                Some(flag) => *flag = true,
            }
        }

        decode_section(id, &mut payload, &mut module)?;

        if !payload.is_empty() {
            return Err(payload.err(format!(
                "section {id} declared {size} bytes but its contents end after {}",
                payload.pos
            )));
        }
    }

    if module.functions.len() != module.code.len() {
        return Err(VMError::DecodeError {
            offset: bytes.len(),
            reason: format!(
                "function section declares {} functions but code section has {} bodies",
                module.functions.len(),
                module.code.len()
            ),
        });
    }
    if let Some(count) = module.data_count
        && count as usize != module.data.len()
    {
        return Err(VMError::DecodeError {
            offset: bytes.len(),
            reason: format!(
                "data count {count} does not match {} data segments",
                module.data.len()
            ),
        });
    }

    Ok(module)
}

fn decode_section(id: u8, r: &mut Reader<'_>, module: &mut Module) -> Result<(), VMError> {
    match id {
        section::CUSTOM => {
            let name = r.name()?;
            let rest = r.bytes.len() - r.pos;
            let bytes = r.bytes(rest)?.to_vec();
            module.customs.push(CustomSection { name, bytes });
        }
        section::TYPE => {
            module.types = r.vec(|r| {
                let form = r.u8()?;
                if form != 0x60 {
                    return Err(r.err(format!("bad function type form 0x{form:02x}")));
                }
                let params = r.vec(Reader::value_kind)?;
                let results = r.vec(Reader::value_kind)?;
                Ok(Signature { params, results })
            })?;
        }
        section::IMPORT => {
            module.imports = r.vec(|r| {
                let module = r.name()?;
                let name = r.name()?;
                let desc = match r.u8()? {
                    0x00 => ImportDesc::Function(r.u32()?),
                    0x01 => ImportDesc::Table(r.table_type()?),
                    0x02 => ImportDesc::Memory(r.limits()?),
                    0x03 => ImportDesc::Global(r.global_type()?),
                    kind => return Err(r.err(format!("bad import kind 0x{kind:02x}"))),
                };
                Ok(Import { module, name, desc })
            })?;
        }
        section::FUNCTION => {
            module.functions = r.vec(Reader::u32)?;
        }
        section::TABLE => {
            module.tables = r.vec(Reader::table_type)?;
        }
        section::MEMORY => {
            let memories = r.vec(Reader::limits)?;
            if memories.len() > 1 {
                return Err(r.err("more than one memory"));
            }
            module.memory = memories.into_iter().next();
        }
        section::GLOBAL => {
            module.globals = r.vec(|r| {
                let ty = r.global_type()?;
                let init = r.const_expr()?;
                Ok(Global { ty, init })
            })?;
        }
        section::EXPORT => {
            module.exports = r.vec(|r| {
                let name = r.name()?;
                let byte = r.u8()?;
                let kind = ExternalKind::from_byte(byte)
                    .ok_or_else(|| r.err(format!("bad export kind 0x{byte:02x}")))?;
                let index = r.u32()?;
                Ok(Export { name, kind, index })
            })?;
        }
        section::START => {
            module.start = Some(r.u32()?);
        }
        section::ELEMENT => {
            module.elements = r.vec(|r| match r.u32()? {
                0 => {
                    let offset = r.const_expr()?;
                    let functions = r.vec(Reader::u32)?;
                    Ok(ElementSegment { offset, functions })
                }
                flags => Err(r.err(format!("unsupported element segment kind {flags}"))),
            })?;
        }
        section::CODE => {
            module.code = r.vec(decode_body)?;
        }
        section::DATA => {
            module.data = r.vec(|r| {
                let mode = match r.u32()? {
                    0 => DataMode::Active {
                        memory: 0,
                        offset: r.const_expr()?,
                    },
                    1 => DataMode::Passive,
                    2 => DataMode::Active {
                        memory: r.u32()?,
                        offset: r.const_expr()?,
                    },
                    flags => return Err(r.err(format!("bad data segment kind {flags}"))),
                };
                let len = r.u32()? as usize;
                let bytes = r.bytes(len)?.to_vec();
                Ok(DataSegment { mode, bytes })
            })?;
        }
        section::DATA_COUNT => {
            module.data_count = Some(r.u32()?);
        }
        _ => return Err(r.err(format!("unknown section id {id}"))),
    }
    Ok(())
}

/// Decodes one code entry: `size`, local groups, then the raw body bytes.
fn decode_body(r: &mut Reader<'_>) -> Result<FunctionBody, VMError> {
    let size = r.u32()? as usize;
    let mut entry = r.sub(size)?;

    let groups = entry.vec(|r| {
        let count = r.u32()? as usize;
        let kind = r.value_kind()?;
        Ok((count, kind))
    })?;
    let total = groups
        .iter()
        .try_fold(0usize, |acc, (count, _)| acc.checked_add(*count))
        .filter(|&total| total <= MAX_FUNCTION_LOCALS)
        .ok_or_else(|| entry.err("too many locals"))?;
    let mut locals = Vec::with_capacity(total);
    for (count, kind) in groups {
        locals.extend(std::iter::repeat_n(kind, count));
    }

    let rest = entry.bytes.len() - entry.pos;
    let code = entry.bytes(rest)?.to_vec();
    if code.last() != Some(&0x0b) {
        return Err(entry.err("function body does not end with end"));
    }
    Ok(FunctionBody { locals, code })
}
