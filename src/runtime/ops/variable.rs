//! Global and frame-relative slot access

use super::*;

pub fn load(stack: &mut Stack, memory: &Memory, addr: i32) -> Result<(), RuntimeError> {
    stack.push(memory.load_global(addr)?)
}

pub fn store(stack: &mut Stack, memory: &mut Memory, addr: i32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    memory.store_global(addr, value)
}

/// LOAD_LOCAL off: read `locals[top.frame_base + off]`
pub fn load_local(stack: &mut Stack, memory: &Memory, frames: &CallStack, offset: i32) -> Result<(), RuntimeError> {
    let frame = frames.top()?;
    stack.push(memory.load_local(frame.frame_base, offset)?)
}

/// STORE_LOCAL off: pop into `locals[top.frame_base + off]`
pub fn store_local(
    stack: &mut Stack,
    memory: &mut Memory,
    frames: &CallStack,
    offset: i32,
) -> Result<(), RuntimeError> {
    let frame = frames.top()?;
    let value = stack.pop()?;
    memory.store_local(frame.frame_base, offset, value)
}
