//! Reference execution engine for compiled chunks.

/// Stack evaluator used by the CLI (`lumen run`) and by the compiler tests.
pub mod eval {
    use core::fmt::Write;

    use thiserror::Error;

    use crate::{
        bytecode::{
            chunk::{Chunk, OpCode},
            disasm::disassemble_instruction,
        },
        Value,
    };

    /// Default bound of the value stack.
    pub const STACK_MAX: usize = 256;

    /// Failures raised while executing a chunk.
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    pub enum RuntimeError {
        /// An instruction needed more operands than the stack held.
        #[error("stack underflow at offset {offset}")]
        StackUnderflow {
            /// Offset of the failing instruction.
            offset: usize,
        },
        /// A push would exceed [`EvalOptions::stack_max`].
        #[error("stack overflow at offset {offset} (limit {limit})")]
        StackOverflow {
            /// Offset of the failing instruction.
            offset: usize,
            /// Configured stack bound.
            limit: usize,
        },
        /// The byte at `offset` is not an opcode.
        #[error("unknown opcode {byte} at offset {offset}")]
        UnknownOpcode {
            /// Raw byte.
            byte: u8,
            /// Position in the code.
            offset: usize,
        },
        /// A `CONSTANT` was the last byte of the code.
        #[error("missing operand for instruction at offset {offset}")]
        MissingOperand {
            /// Offset of the truncated instruction.
            offset: usize,
        },
        /// A `CONSTANT` operand points outside the pool.
        #[error("constant {index} out of range at offset {offset}")]
        BadConstant {
            /// Requested pool index.
            index: usize,
            /// Offset of the instruction.
            offset: usize,
        },
        /// Execution reached the end of the code without a `RETURN`.
        #[error("execution ran past the end of the code")]
        FellOffEnd,
    }

    /// Convenience alias for evaluator results.
    pub type RuntimeResult<T> = Result<T, RuntimeError>;

    /// Knobs of the evaluator.
    #[derive(Debug, Clone)]
    pub struct EvalOptions {
        /// Log every instruction and the stack at `trace` level.
        pub trace: bool,
        /// Maximum number of values on the stack.
        pub stack_max: usize,
    }

    impl Default for EvalOptions {
        fn default() -> Self { Self { trace: false, stack_max: STACK_MAX } }
    }

    /// Result of evaluating a chunk.
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct EvalOutput {
        /// Value popped by `RETURN`, if the stack was not empty.
        pub value: Option<Value>,
    }

    struct Machine<'c> {
        chunk: &'c Chunk,
        stack: Vec<Value>,
        limit: usize,
    }

    impl Machine<'_> {
        fn push(&mut self, value: Value, offset: usize) -> RuntimeResult<()> {
            if self.stack.len() >= self.limit {
                return Err(RuntimeError::StackOverflow { offset, limit: self.limit });
            }
            self.stack.push(value);
            Ok(())
        }

        fn pop(&mut self, offset: usize) -> RuntimeResult<Value> {
            self.stack.pop().ok_or(RuntimeError::StackUnderflow { offset })
        }

        fn binary(&mut self, offset: usize, f: impl FnOnce(Value, Value) -> Value) -> RuntimeResult<()> {
            let b = self.pop(offset)?;
            let a = self.pop(offset)?;
            self.push(f(a, b), offset)
        }

        fn trace(&self, offset: usize) {
            let mut line = String::from("          ");
            for value in &self.stack {
                let _ = write!(line, "[ {value} ]");
            }
            log::trace!("{line}");
            let mut listing = String::new();
            disassemble_instruction(self.chunk, offset, &mut listing);
            log::trace!("{}", listing.trim_end());
        }
    }

    /// Execute `chunk` until its first `RETURN`.
    pub fn eval_chunk(chunk: &Chunk, opts: &EvalOptions) -> RuntimeResult<EvalOutput> {
        let mut vm = Machine { chunk, stack: Vec::with_capacity(opts.stack_max.min(STACK_MAX)), limit: opts.stack_max };
        let code = chunk.code();
        let mut ip = 0;

        while let Some(&byte) = code.get(ip) {
            let offset = ip;
            if opts.trace {
                vm.trace(offset);
            }
            let op = OpCode::try_from(byte).map_err(|byte| RuntimeError::UnknownOpcode { byte, offset })?;
            ip += 1 + op.operand_len();

            match op {
                OpCode::Constant => {
                    let index = code
                        .get(offset + 1)
                        .map(|&ix| usize::from(ix))
                        .ok_or(RuntimeError::MissingOperand { offset })?;
                    let value = chunk.constants().get(index).ok_or(RuntimeError::BadConstant { index, offset })?;
                    vm.push(value, offset)?;
                }
                OpCode::Add => vm.binary(offset, |a, b| a + b)?,
                OpCode::Subtract => vm.binary(offset, |a, b| a - b)?,
                OpCode::Multiply => vm.binary(offset, |a, b| a * b)?,
                OpCode::Divide => vm.binary(offset, |a, b| a / b)?,
                OpCode::Negate => {
                    let a = vm.pop(offset)?;
                    vm.push(-a, offset)?;
                }
                OpCode::Return => {
                    let value = vm.stack.pop();
                    if let Some(v) = value {
                        log::debug!("returned {v}");
                    }
                    return Ok(EvalOutput { value });
                }
            }
        }

        Err(RuntimeError::FellOffEnd)
    }

}
