//! Core bytecode structures plus a compact binary roundtrip implementation.

use core::slice;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{helpers::validate_chunk, ByteReader, ByteWriter, CoreError, CoreResult, Value, crc32_ieee};

const MAGIC: &[u8; 4] = b"LMNC";

/// Binary chunk format version.
pub const CHUNK_VERSION: u16 = 1;

/// Number of constants addressable by a one-byte operand.
pub const MAX_CONSTANTS: usize = u8::MAX as usize + 1;

/// The instruction vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[repr(u8)]
pub enum OpCode {
    /// Terminate execution; pops the result.
    Return = 0,
    /// Push a pooled value; one operand byte (pool index).
    Constant = 1,
    /// Pop `b`, pop `a`, push `a + b`.
    Add = 2,
    /// Pop `b`, pop `a`, push `a - b`.
    Subtract = 3,
    /// Pop `b`, pop `a`, push `a * b`.
    Multiply = 4,
    /// Pop `b`, pop `a`, push `a / b`.
    Divide = 5,
    /// Pop `a`, push `-a`.
    Negate = 6,
}

impl OpCode {
    /// Number of operand bytes following the opcode.
    pub const fn operand_len(self) -> usize {
        match self {
            Self::Constant => 1,
            _ => 0,
        }
    }

    /// Name used by the disassembler.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Return => "OP_RETURN",
            Self::Constant => "OP_CONSTANT",
            Self::Add => "OP_ADD",
            Self::Subtract => "OP_SUBTRACT",
            Self::Multiply => "OP_MULTIPLY",
            Self::Divide => "OP_DIVIDE",
            Self::Negate => "OP_NEGATE",
        }
    }
}

impl From<OpCode> for u8 {
    fn from(op: OpCode) -> Self { op as Self }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0 => Self::Return,
            1 => Self::Constant,
            2 => Self::Add,
            3 => Self::Subtract,
            4 => Self::Multiply,
            5 => Self::Divide,
            6 => Self::Negate,
            other => return Err(other),
        })
    }
}

/// Constant pool with stable indices (0-based).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct ConstPool {
    values: Vec<Value>,
}

impl ConstPool {
    /// Create an empty pool.
    pub fn new() -> Self { Self { values: Vec::new() } }

    /// Number of stored constants.
    pub fn len(&self) -> usize { self.values.len() }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool { self.values.is_empty() }

    /// Iterate as `(index, Value)`.
    pub fn iter(&self) -> ConstIter<'_> { ConstIter { inner: self.values.iter().enumerate() } }

    /// Pushes a value and returns its index.
    pub fn add(&mut self, value: Value) -> usize {
        self.values.push(value);
        self.values.len() - 1
    }

    /// Index of a bit-identical value already in the pool.
    pub fn find(&self, value: Value) -> Option<usize> {
        self.values.iter().position(|v| v.same_bits(value))
    }

    /// Lookup a constant by index.
    pub fn get(&self, idx: usize) -> Option<Value> { self.values.get(idx).copied() }
}

/// Iterator returned by [`ConstPool::iter`].
pub struct ConstIter<'a> {
    inner: core::iter::Enumerate<slice::Iter<'a, Value>>,
}

impl Iterator for ConstIter<'_> {
    type Item = (usize, Value);

    fn next(&mut self) -> Option<Self::Item> { self.inner.next().map(|(idx, value)| (idx, *value)) }
}

impl<'a> IntoIterator for &'a ConstPool {
    type Item = (usize, Value);
    type IntoIter = ConstIter<'a>;

    fn into_iter(self) -> Self::IntoIter { self.iter() }
}

/// Line table: one source line per code byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize), serde(transparent))]
pub struct LineTable {
    lines: Vec<u32>,
}

impl LineTable {
    /// Create an empty line table.
    pub fn new() -> Self { Self { lines: Vec::new() } }
    /// Append the line of the next code byte.
    pub fn push(&mut self, line: u32) { self.lines.push(line); }
    /// Number of stored line entries.
    pub fn len(&self) -> usize { self.lines.len() }
    /// Whether no line was recorded yet.
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    /// Source line of the byte at `offset`.
    pub fn line_for(&self, offset: usize) -> Option<u32> { self.lines.get(offset).copied() }
    /// Raw per-byte lines.
    pub fn as_slice(&self) -> &[u32] { &self.lines }
}

/// Bytecode chunk: code bytes, their source lines, and the constant pool.
///
/// `code.len() == lines.len()` holds after every public mutation.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Chunk {
    code: Vec<u8>,
    lines: LineTable,
    consts: ConstPool,
}

impl Chunk {
    /// Create an empty chunk.
    pub fn new() -> Self { Self::default() }

    /// Append one instruction or operand byte with its source line.
    pub fn write(&mut self, byte: u8, line: u32) {
        self.code.push(byte);
        self.lines.push(line);
    }

    /// Append an opcode byte.
    pub fn write_op(&mut self, op: OpCode, line: u32) { self.write(op.into(), line); }

    /// Append a constant and return its index.
    ///
    /// No bound is enforced here; callers emitting a one-byte operand must
    /// check the index against [`MAX_CONSTANTS`].
    pub fn add_constant(&mut self, value: Value) -> usize { self.consts.add(value) }

    /// Emitted bytes.
    pub fn code(&self) -> &[u8] { &self.code }

    /// Per-byte line table.
    pub fn lines(&self) -> &LineTable { &self.lines }

    /// Constant pool.
    pub fn constants(&self) -> &ConstPool { &self.consts }

    /// Number of code bytes.
    pub fn len(&self) -> usize { self.code.len() }

    /// Whether nothing was emitted.
    pub fn is_empty(&self) -> bool { self.code.is_empty() }

    /// Encode the chunk to a compact binary payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = ByteWriter::new();
        w.write_bytes(MAGIC);
        w.write_u16_le(CHUNK_VERSION);

        w.write_u32_le(len_u32(self.consts.len()));
        for (_, value) in &self.consts {
            w.write_f64_le(value.as_f64());
        }

        w.write_u32_le(len_u32(self.code.len()));
        w.write_bytes(&self.code);
        for line in self.lines.as_slice() {
            w.write_u32_le(*line);
        }

        let crc = crc32_ieee(w.as_slice());
        w.write_u32_le(crc);
        w.into_vec()
    }

    /// Decode a chunk from [`Chunk::to_bytes`] output, then validate it.
    pub fn from_bytes(data: &[u8]) -> CoreResult<Self> {
        if data.len() < MAGIC.len() + 2 + 4 {
            return Err(CoreError::corrupted("too short"));
        }

        let (payload, crc_bytes) = data.split_at(data.len() - 4);
        let found = ByteReader::new(crc_bytes).read_u32_le()?;
        let expected = crc32_ieee(payload);
        if expected != found {
            return Err(CoreError::HashMismatch { expected, found });
        }

        let mut r = ByteReader::new(payload);
        if r.read_bytes(MAGIC.len())? != MAGIC {
            return Err(CoreError::InvalidMagic);
        }
        let version = r.read_u16_le()?;
        if version != CHUNK_VERSION {
            return Err(CoreError::UnsupportedVersion(version));
        }

        let mut chunk = Self::new();
        let const_count = r.read_u32_le()?;
        for _ in 0..const_count {
            chunk.consts.add(Value::number(r.read_f64_le()?));
        }

        let code_len = r.read_u32_le()? as usize;
        chunk.code = r.read_bytes(code_len)?.to_vec();
        for _ in 0..code_len {
            chunk.lines.push(r.read_u32_le()?);
        }

        if r.remaining() != 0 {
            return Err(CoreError::corrupted("trailing bytes"));
        }

        if let Err(err) = validate_chunk(&chunk) {
            log::warn!("decoded chunk failed validation: {err}");
            return Err(err);
        }
        Ok(chunk)
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn len_u32(len: usize) -> u32 { len as u32 }
