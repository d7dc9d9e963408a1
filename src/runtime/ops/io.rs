//! Host-facing operations: output, input and builtins

use super::*;
use crate::runtime::builtins::{BuiltinContext, BuiltinRegistry};
use std::collections::VecDeque;

pub fn print(stack: &mut Stack, output: &mut Vec<i32>) -> Result<(), RuntimeError> {
    output.push(stack.pop()?);
    Ok(())
}

/// READ: move the front of the input queue onto the stack
pub fn read(stack: &mut Stack, input: &mut VecDeque<i32>) -> Result<(), RuntimeError> {
    let value = input.pop_front().ok_or(RuntimeError::NoInputAvailable)?;
    stack.push(value)
}

/// CALL_BUILTIN: pop the builtin id and run it against the stack
pub fn call_builtin(
    stack: &mut Stack,
    heap: &mut Heap,
    output: &mut Vec<i32>,
    builtins: &BuiltinRegistry,
) -> Result<(), RuntimeError> {
    let id = stack.pop()?;
    let mut ctx = BuiltinContext { stack, heap, output };
    builtins.call(id, &mut ctx)
}
