//! Small assembly helper for hand-built chunks (engine fixtures, `lumen asm`).
//!
//! The supported syntax mirrors the opcode set, one instruction per line:
//!
//! ```text
//! ; 1 + 2 * 3
//! CONSTANT 1
//! CONSTANT 2
//! CONSTANT 3
//! MULTIPLY
//! ADD
//! RETURN
//! ```
//!
//! - `CONSTANT <number>` adds the literal to the pool and emits a load.
//! - `LOAD <idx>` emits a load of an explicit pool index (no range check here,
//!   [`validate_chunk`](crate::helpers::validate_chunk) catches bad indices).
//! - Every emitted byte is tagged with the 1-based line of the text.
//! - Lines beginning with `;` are ignored as comments.

use crate::{
    bytecode::chunk::{Chunk, OpCode, MAX_CONSTANTS},
    CoreError, CoreResult, Value,
};

/// Assemble a source snippet into a [`Chunk`].
pub fn assemble(source: &str) -> CoreResult<Chunk> {
    let mut chunk = Chunk::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_no = u32::try_from(idx + 1).map_err(|_| CoreError::corrupted("source too long"))?;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }

        let (mnemonic, operand) = match line.split_once(char::is_whitespace) {
            Some((m, rest)) => (m, Some(rest.trim())),
            None => (line, None),
        };

        match (mnemonic.to_ascii_uppercase().as_str(), operand) {
            ("CONSTANT", Some(literal)) => {
                let n = literal
                    .parse::<f64>()
                    .map_err(|_| CoreError::asm(line_no, format!("invalid number `{literal}`")))?;
                if chunk.constants().len() >= MAX_CONSTANTS {
                    return Err(CoreError::asm(line_no, "too many constants in one chunk"));
                }
                let ix = chunk.add_constant(Value::number(n));
                chunk.write_op(OpCode::Constant, line_no);
                chunk.write(operand_byte(ix, line_no)?, line_no);
            }
            ("LOAD", Some(index)) => {
                let ix = index
                    .parse::<u8>()
                    .map_err(|_| CoreError::asm(line_no, format!("LOAD expects an index: `{index}`")))?;
                chunk.write_op(OpCode::Constant, line_no);
                chunk.write(ix, line_no);
            }
            (name @ ("CONSTANT" | "LOAD"), None) => {
                return Err(CoreError::asm(line_no, format!("`{name}` expects an operand")));
            }
            (name, None) => {
                let op = match name {
                    "RETURN" => OpCode::Return,
                    "ADD" => OpCode::Add,
                    "SUBTRACT" => OpCode::Subtract,
                    "MULTIPLY" => OpCode::Multiply,
                    "DIVIDE" => OpCode::Divide,
                    "NEGATE" => OpCode::Negate,
                    other => {
                        return Err(CoreError::asm(line_no, format!("unsupported instruction `{other}`")));
                    }
                };
                chunk.write_op(op, line_no);
            }
            (name, Some(_)) => {
                return Err(CoreError::asm(line_no, format!("unexpected operand for `{name}`")));
            }
        }
    }

    Ok(chunk)
}

fn operand_byte(ix: usize, line_no: u32) -> CoreResult<u8> {
    u8::try_from(ix).map_err(|_| CoreError::asm(line_no, "constant index does not fit one byte"))
}
