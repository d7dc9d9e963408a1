//! Instruction implementations
//!
//! Handlers are free functions over the pieces of VM state they touch,
//! grouped by category. Handlers that can redirect control return a
//! [`Flow`]; the rest return `()` and fall through to the next instruction.

pub mod control;
pub mod exception;
pub mod io;
pub mod memory;
pub mod numeric;
pub mod parametric;
pub mod variable;

// Re-export commonly used types for operation implementations
pub(crate) use crate::runtime::control::{TryBlock, TryStack};
pub(crate) use crate::runtime::frame::CallStack;
pub(crate) use crate::runtime::heap::Heap;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::RuntimeError;

/// Where execution continues after a handler completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fall through to the instruction after this one
    Next,
    /// Continue at an absolute instruction index
    Jump(usize),
    /// Stop the engine
    Halt,
}
