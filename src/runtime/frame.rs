//! Call frames
//!
//! Each frame records where to return, how deep the operand stack was at the
//! call, and the base of its window in the local-slot arena. The base is
//! `depth * slots_per_frame`, so concurrently active activations never share
//! locals.

use super::RuntimeError;
use serde::Serialize;

/// Call frame for one active invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallFrame {
    /// Instruction index following the CALL's operand
    pub return_address: usize,
    /// Operand stack depth when the call was made
    pub stack_pointer: usize,
    /// First local slot owned by this frame
    pub frame_base: usize,
}

#[derive(Debug, Clone)]
pub struct CallStack {
    frames: Vec<CallFrame>,
    slots_per_frame: usize,
    max_depth: usize,
}

impl CallStack {
    pub fn new(slots_per_frame: usize, max_depth: usize) -> Self {
        CallStack {
            frames: Vec::new(),
            slots_per_frame,
            max_depth,
        }
    }

    /// Push a frame whose base is derived from the current depth
    pub fn push(&mut self, return_address: usize, stack_pointer: usize) -> Result<CallFrame, RuntimeError> {
        if self.frames.len() >= self.max_depth {
            return Err(RuntimeError::CallStackOverflow(self.max_depth));
        }
        let frame = CallFrame {
            return_address,
            stack_pointer,
            frame_base: self.frames.len() * self.slots_per_frame,
        };
        self.frames.push(frame);
        Ok(frame)
    }

    pub fn pop(&mut self) -> Result<CallFrame, RuntimeError> {
        self.frames.pop().ok_or(RuntimeError::EmptyCallStack)
    }

    /// The frame local accesses resolve against
    pub fn top(&self) -> Result<&CallFrame, RuntimeError> {
        self.frames.last().ok_or(RuntimeError::NoActiveFrame)
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn slots_per_frame(&self) -> usize {
        self.slots_per_frame
    }

    /// Frames from outermost to innermost
    pub fn frames(&self) -> &[CallFrame] {
        &self.frames
    }

    /// Discard frames above `depth`, returning them innermost first
    pub fn unwind_to(&mut self, depth: usize) -> Vec<CallFrame> {
        let mut popped = Vec::new();
        while self.frames.len() > depth {
            if let Some(frame) = self.frames.pop() {
                popped.push(frame);
            }
        }
        popped
    }

    /// `pc` followed by the return-address chain, innermost first
    pub fn stack_trace(&self, pc: usize) -> Vec<usize> {
        std::iter::once(pc)
            .chain(self.frames.iter().rev().map(|f| f.return_address))
            .collect()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}
