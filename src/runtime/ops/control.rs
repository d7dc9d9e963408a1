//! Jumps, calls and returns
//!
//! Targets are absolute instruction indices. A target equal to the program
//! length is accepted and halts on the next fetch, so a label placed after
//! the final instruction is a valid destination.

use super::*;

/// Validate a jump, call or handler target against the program length
pub fn target(operand: i32, code_len: usize) -> Result<usize, RuntimeError> {
    match usize::try_from(operand) {
        Ok(addr) if addr <= code_len => Ok(addr),
        _ => Err(RuntimeError::InvalidJumpTarget(operand)),
    }
}

pub fn jmp(operand: i32, code_len: usize) -> Result<Flow, RuntimeError> {
    Ok(Flow::Jump(target(operand, code_len)?))
}

/// Pop the tested value and jump if it is zero
pub fn jmp_if_zero(stack: &mut Stack, operand: i32, code_len: usize) -> Result<Flow, RuntimeError> {
    let addr = target(operand, code_len)?;
    let value = stack.pop()?;
    Ok(if value == 0 { Flow::Jump(addr) } else { Flow::Next })
}

/// Pop the tested value and jump if it is negative
pub fn jmp_if_neg(stack: &mut Stack, operand: i32, code_len: usize) -> Result<Flow, RuntimeError> {
    let addr = target(operand, code_len)?;
    let value = stack.pop()?;
    Ok(if value < 0 { Flow::Jump(addr) } else { Flow::Next })
}

/// CALL addr
///
/// Pushes a frame returning to the instruction after the CALL and recording
/// the current operand depth. The frame base is derived from the call depth
/// before the push.
pub fn call(
    stack: &Stack,
    frames: &mut CallStack,
    pc: usize,
    operand: i32,
    code_len: usize,
) -> Result<Flow, RuntimeError> {
    let addr = target(operand, code_len)?;
    frames.push(pc + 2, stack.depth())?;
    Ok(Flow::Jump(addr))
}

/// RET
///
/// Pops the top frame and returns to its return address. The operand stack
/// is left as is; handlers registered by the returning frame are dropped.
pub fn ret(frames: &mut CallStack, tries: &mut TryStack) -> Result<Flow, RuntimeError> {
    let frame = frames.pop()?;
    tries.discard_above(frames.depth());
    Ok(Flow::Jump(frame.return_address))
}
