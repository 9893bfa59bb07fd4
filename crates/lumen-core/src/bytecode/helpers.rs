//! Helper validations reused by the loader and the evaluator.

use crate::{
    bytecode::chunk::{Chunk, OpCode},
    CoreError, CoreResult,
};

/// Structural validation of a chunk.
///
/// Checks that the line table matches the code, that every byte decodes to a
/// known opcode, that operands are present and that constant indices are in
/// range. Chunks straight out of a successful compilation always pass.
pub fn validate_chunk(chunk: &Chunk) -> CoreResult<()> {
    let code = chunk.code();
    if code.len() != chunk.lines().len() {
        return Err(CoreError::corrupted(format!(
            "line/code length mismatch ({} lines for {} bytes)",
            chunk.lines().len(),
            code.len()
        )));
    }

    let const_count = chunk.constants().len();
    let mut offset = 0;
    while offset < code.len() {
        let op = OpCode::try_from(code[offset])
            .map_err(|byte| CoreError::corrupted(format!("unknown opcode {byte} at {offset}")))?;
        let end = offset + 1 + op.operand_len();
        if end > code.len() {
            return Err(CoreError::corrupted(format!(
                "{} at {offset} is missing its operand",
                op.mnemonic()
            )));
        }
        if op == OpCode::Constant {
            let ix = usize::from(code[offset + 1]);
            if ix >= const_count {
                return Err(CoreError::corrupted(format!(
                    "op {offset} references const {ix} but pool size is {const_count}"
                )));
            }
        }
        offset = end;
    }

    Ok(())
}
