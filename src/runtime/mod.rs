//! Bytecode runtime
//!
//! This module provides the execution engine and the state it drives: the
//! operand stack, call and try stacks, slot memory for globals and
//! frame-relative locals, the bump-allocated heap and the builtin registry.

pub mod builtins;
pub mod config;
pub mod control;
pub mod executor;
pub mod frame;
pub mod heap;
pub mod limits;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod test_utils;

pub use builtins::{BuiltinContext, BuiltinRegistry};
pub use config::{ConfigError, VmConfig};
pub use control::{TryBlock, TryStack};
pub use executor::Vm;
pub use frame::{CallFrame, CallStack};
pub use heap::Heap;
pub use memory::Memory;
pub use stack::Stack;

use crate::bytecode::Opcode;
use crate::debugger::ExecutionStep;

/// Outcome of a call to [`Vm::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Execution reached HALT or ran off the end of the program.
    /// Carries every value printed since the run started.
    Halted { output: Vec<i32> },
    /// The debugger suspended execution before the instruction at `step.pc`
    Paused(ExecutionStep),
}

impl RunOutcome {
    pub fn is_paused(&self) -> bool {
        matches!(self, RunOutcome::Paused(_))
    }

    /// The pause record, if execution was suspended
    pub fn paused(&self) -> Option<&ExecutionStep> {
        match self {
            RunOutcome::Paused(step) => Some(step),
            RunOutcome::Halted { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow: limit is {0} values")]
    StackOverflow(usize),
    #[error("Call stack overflow: limit is {0} frames")]
    CallStackOverflow(usize),
    #[error("Invalid memory address: {0}")]
    InvalidMemoryAddress(i64),
    #[error("Invalid heap address: {address} (access of {size} bytes)")]
    InvalidHeapAddress { address: i64, size: usize },
    #[error("Heap overflow: requested {requested} bytes, {available} available")]
    HeapOverflow { requested: usize, available: usize },
    #[error("Invalid allocation size: {0}")]
    InvalidAllocationSize(i32),
    #[error("Index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i32, length: i32 },
    #[error("Unknown opcode: {0}")]
    UnknownOpcode(i32),
    #[error("Missing operand for {0}")]
    MissingOperand(Opcode),
    #[error("Invalid jump target: {0}")]
    InvalidJumpTarget(i32),
    #[error("Return with empty call stack")]
    EmptyCallStack,
    #[error("No active frame for local access")]
    NoActiveFrame,
    #[error("No active try block")]
    EmptyTryStack,
    #[error("No input available")]
    NoInputAvailable,
    #[error("Unknown builtin: {0}")]
    UnknownBuiltin(i32),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Uncaught exception: {value}")]
    UncaughtException { value: i32, stack_trace: Vec<usize> },
    #[error("Instruction budget exhausted")]
    InstructionBudgetExhausted,
}

impl RuntimeError {
    /// Stable numeric code, delivered as the exception value when the error
    /// is raised inside a try-protected region
    pub fn code(&self) -> i32 {
        match self {
            RuntimeError::StackUnderflow => -1,
            RuntimeError::StackOverflow(_) => -2,
            RuntimeError::CallStackOverflow(_) => -3,
            RuntimeError::InvalidMemoryAddress(_) => -4,
            RuntimeError::InvalidHeapAddress { .. } => -5,
            RuntimeError::HeapOverflow { .. } => -6,
            RuntimeError::InvalidAllocationSize(_) => -7,
            RuntimeError::IndexOutOfBounds { .. } => -8,
            RuntimeError::UnknownOpcode(_) => -9,
            RuntimeError::MissingOperand(_) => -10,
            RuntimeError::InvalidJumpTarget(_) => -11,
            RuntimeError::EmptyCallStack => -12,
            RuntimeError::NoActiveFrame => -13,
            RuntimeError::EmptyTryStack => -14,
            RuntimeError::NoInputAvailable => -15,
            RuntimeError::UnknownBuiltin(_) => -16,
            RuntimeError::DivisionByZero => -17,
            RuntimeError::UncaughtException { .. } => -18,
            RuntimeError::InstructionBudgetExhausted => -19,
        }
    }

    /// Whether a try block may intercept this error.
    ///
    /// Malformed bytecode, escaped exceptions and budget exhaustion always
    /// reach the caller.
    pub fn is_catchable(&self) -> bool {
        !matches!(
            self,
            RuntimeError::UnknownOpcode(_)
                | RuntimeError::MissingOperand(_)
                | RuntimeError::InvalidJumpTarget(_)
                | RuntimeError::UncaughtException { .. }
                | RuntimeError::InstructionBudgetExhausted
        )
    }
}

/// A fatal runtime error annotated with where it happened
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error} at pc {pc} ({opcode})")]
pub struct ExecutionError {
    pub pc: usize,
    /// Mnemonic of the failing instruction, `"?"` when undecodable
    pub opcode: &'static str,
    #[source]
    pub error: RuntimeError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            RuntimeError::StackUnderflow,
            RuntimeError::StackOverflow(1),
            RuntimeError::CallStackOverflow(1),
            RuntimeError::InvalidMemoryAddress(0),
            RuntimeError::InvalidHeapAddress { address: 0, size: 1 },
            RuntimeError::HeapOverflow {
                requested: 1,
                available: 0,
            },
            RuntimeError::InvalidAllocationSize(-1),
            RuntimeError::IndexOutOfBounds { index: 0, length: 0 },
            RuntimeError::UnknownOpcode(99),
            RuntimeError::MissingOperand(Opcode::Push),
            RuntimeError::InvalidJumpTarget(-1),
            RuntimeError::EmptyCallStack,
            RuntimeError::NoActiveFrame,
            RuntimeError::EmptyTryStack,
            RuntimeError::NoInputAvailable,
            RuntimeError::UnknownBuiltin(9),
            RuntimeError::DivisionByZero,
            RuntimeError::UncaughtException {
                value: 1,
                stack_trace: vec![],
            },
            RuntimeError::InstructionBudgetExhausted,
        ];
        let mut codes: Vec<i32> = errors.iter().map(RuntimeError::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|c| *c < 0));
    }

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError {
            pc: 4,
            opcode: "RET",
            error: RuntimeError::EmptyCallStack,
        };
        assert_eq!(err.to_string(), "Return with empty call stack at pc 4 (RET)");
    }
}
