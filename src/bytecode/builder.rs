//! Fluent bytecode emitter with forward label resolution.
//!
//! Produces the same flat `[i32]` a linker would hand to the engine, so tests
//! and embedders can build programs without hand-counting offsets.
//!
//! ```
//! use bytevm::bytecode::{Opcode, ProgramBuilder};
//!
//! let mut b = ProgramBuilder::new();
//! let done = b.label();
//! b.push(0).jump(Opcode::JmpIfZero, done).push(99).op(Opcode::Print);
//! b.bind(done);
//! b.op(Opcode::Halt);
//! assert_eq!(b.finish().unwrap(), vec![1, 0, 7, 7, 1, 99, 5, 0]);
//! ```

use super::Opcode;
use std::fmt;

/// A position in the program that may not have been bound yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

/// Errors raised when finishing a program
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A label was referenced but never bound
    UnboundLabel(usize),
    /// The program grew past what an `i32` target can address
    TooLarge(usize),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UnboundLabel(id) => write!(f, "label {id} referenced but never bound"),
            BuildError::TooLarge(len) => write!(f, "program of {len} slots exceeds the addressable range"),
        }
    }
}

impl std::error::Error for BuildError {}

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<i32>,
    labels: Vec<Option<usize>>,
    /// (operand slot, label) pairs patched in `finish`
    fixups: Vec<(usize, Label)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current emission offset
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Allocate an unbound label
    pub fn label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current offset
    pub fn bind(&mut self, label: Label) -> &mut Self {
        self.labels[label.0] = Some(self.code.len());
        self
    }

    /// Allocate a label bound to the current offset
    pub fn here(&mut self) -> Label {
        let label = self.label();
        self.bind(label);
        label
    }

    /// Emit an operand-less opcode
    pub fn op(&mut self, opcode: Opcode) -> &mut Self {
        debug_assert_eq!(opcode.operand_count(), 0, "{opcode} takes an operand");
        self.code.push(opcode.into());
        self
    }

    /// Emit an opcode with a literal operand
    pub fn op_with(&mut self, opcode: Opcode, operand: i32) -> &mut Self {
        debug_assert_eq!(opcode.operand_count(), 1, "{opcode} takes no operand");
        self.code.push(opcode.into());
        self.code.push(operand);
        self
    }

    /// Emit an opcode whose operand is the address of `label`
    pub fn jump(&mut self, opcode: Opcode, label: Label) -> &mut Self {
        debug_assert!(opcode.has_target_operand(), "{opcode} has no target operand");
        self.code.push(opcode.into());
        self.fixups.push((self.code.len(), label));
        self.code.push(0);
        self
    }

    pub fn push(&mut self, value: i32) -> &mut Self {
        self.op_with(Opcode::Push, value)
    }

    pub fn call(&mut self, label: Label) -> &mut Self {
        self.jump(Opcode::Call, label)
    }

    pub fn enter_try(&mut self, handler: Label) -> &mut Self {
        self.jump(Opcode::EnterTry, handler)
    }

    /// Append a raw slot (for deliberately malformed programs)
    pub fn raw(&mut self, value: i32) -> &mut Self {
        self.code.push(value);
        self
    }

    /// Resolve all label references and return the bytecode
    pub fn finish(mut self) -> Result<Vec<i32>, BuildError> {
        if i32::try_from(self.code.len()).is_err() {
            return Err(BuildError::TooLarge(self.code.len()));
        }
        for (slot, label) in std::mem::take(&mut self.fixups) {
            let target = self.labels[label.0].ok_or(BuildError::UnboundLabel(label.0))?;
            self.code[slot] = target as i32;
        }
        Ok(self.code)
    }
}
