//! Try stack for structured exception handling
//!
//! A try block is the exception-protocol analogue of a control label: it
//! remembers a continuation (the catch handler) and the heights to restore
//! when control is transferred there.
//!
//! ```text
//! ENTER_TRY h   push { catch_handler: h, stack_pointer, call_depth }
//! LEAVE_TRY     pop (normal exit)
//! THROW         pop innermost, restore heights, push value, jump to h
//! ```

use super::RuntimeError;
use serde::Serialize;

/// An active exception handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TryBlock {
    /// Instruction index of the catch handler
    pub catch_handler: usize,
    /// Operand stack depth at ENTER_TRY
    pub stack_pointer: usize,
    /// Call stack depth at ENTER_TRY; frames above it are discarded on catch
    pub call_depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TryStack {
    blocks: Vec<TryBlock>,
}

impl TryStack {
    pub fn new() -> Self {
        TryStack { blocks: Vec::new() }
    }

    pub fn push(&mut self, block: TryBlock) {
        self.blocks.push(block);
    }

    /// Pop on normal exit from a protected region
    pub fn pop(&mut self) -> Result<TryBlock, RuntimeError> {
        self.blocks.pop().ok_or(RuntimeError::EmptyTryStack)
    }

    /// Take the innermost handler for a throw, if any
    pub fn take_handler(&mut self) -> Option<TryBlock> {
        self.blocks.pop()
    }

    /// Drop handlers registered by frames deeper than `call_depth`
    pub fn discard_above(&mut self, call_depth: usize) -> usize {
        let before = self.blocks.len();
        self.blocks.retain(|b| b.call_depth <= call_depth);
        before - self.blocks.len()
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[TryBlock] {
        &self.blocks
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(handler: usize, call_depth: usize) -> TryBlock {
        TryBlock {
            catch_handler: handler,
            stack_pointer: 0,
            call_depth,
        }
    }

    #[test]
    fn test_innermost_first() {
        let mut tries = TryStack::new();
        tries.push(block(10, 0));
        tries.push(block(20, 0));
        assert_eq!(tries.take_handler().map(|b| b.catch_handler), Some(20));
        assert_eq!(tries.take_handler().map(|b| b.catch_handler), Some(10));
        assert_eq!(tries.take_handler(), None);
        assert_eq!(tries.pop(), Err(RuntimeError::EmptyTryStack));
    }

    #[test]
    fn test_discard_above() {
        let mut tries = TryStack::new();
        tries.push(block(10, 0));
        tries.push(block(20, 1));
        tries.push(block(30, 2));
        assert_eq!(tries.discard_above(1), 1);
        assert_eq!(tries.depth(), 2);
    }
}
