//! Textual disassembly helpers used by the compiler's debug output and the CLI.

use core::fmt::Write;

use crate::bytecode::chunk::{Chunk, OpCode};

/// Produce a multi-line, human readable disassembly of the whole chunk.
pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {name} ==");

    let mut offset = 0;
    while offset < chunk.len() {
        offset = disassemble_instruction(chunk, offset, &mut out);
    }
    out
}

/// Render the instruction starting at `offset` and return the offset of the
/// next one.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let _ = write!(out, "{offset:04} ");

    let lines = chunk.lines();
    let line = lines.line_for(offset).unwrap_or_default();
    if offset > 0 && lines.line_for(offset - 1) == Some(line) {
        out.push_str("   | ");
    } else {
        let _ = write!(out, "{line:4} ");
    }

    let Some(&byte) = chunk.code().get(offset) else {
        out.push_str("<end of code>\n");
        return offset + 1;
    };
    match OpCode::try_from(byte) {
        Ok(OpCode::Constant) => constant_instruction(chunk, offset, out),
        Ok(op) => {
            let _ = writeln!(out, "{}", op.mnemonic());
            offset + 1
        }
        Err(byte) => {
            let _ = writeln!(out, "Unknown opcode {byte}");
            offset + 1
        }
    }
}

fn constant_instruction(chunk: &Chunk, offset: usize, out: &mut String) -> usize {
    let name = OpCode::Constant.mnemonic();
    let Some(&ix) = chunk.code().get(offset + 1) else {
        let _ = writeln!(out, "{name:<16} <missing operand>");
        return offset + 2;
    };
    match chunk.constants().get(usize::from(ix)) {
        Some(value) => {
            let _ = writeln!(out, "{name:<16} {ix:4} '{value}'");
        }
        None => {
            let _ = writeln!(out, "{name:<16} {ix:4} <invalid constant>");
        }
    }
    offset + 2
}
