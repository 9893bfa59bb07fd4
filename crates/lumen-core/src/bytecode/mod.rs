//! Bytecode primitives: opcodes, the chunk container, and the tooling around it
//! (validation, textual asm/disasm, the reference evaluator).

/// Chunk representation plus binary roundtrip helpers.
pub mod chunk;
/// Structural validation.
pub mod helpers;
/// Textual disassembly.
pub mod disasm;
/// Minimal textual assembler.
pub mod asm;
/// Reference execution engine.
pub mod runtime;

pub use chunk::{Chunk, ConstPool, LineTable, OpCode, CHUNK_VERSION, MAX_CONSTANTS};
