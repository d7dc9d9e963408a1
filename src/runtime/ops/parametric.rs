//! Stack shuffling operations

use super::*;

pub fn dup(stack: &mut Stack) -> Result<(), RuntimeError> {
    let value = stack.peek().ok_or(RuntimeError::StackUnderflow)?;
    stack.push(value)
}

pub fn drop(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.pop()?;
    Ok(())
}

pub fn swap(stack: &mut Stack) -> Result<(), RuntimeError> {
    let (a, b) = stack.pop_pair()?;
    stack.push(b)?;
    stack.push(a)
}
