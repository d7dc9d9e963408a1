//! Bytecode representation and decoding
//!
//! A program is a flat `[i32]`: every opcode is followed by a fixed number of
//! operands (0 or 1). Jump, call and handler targets are absolute indices into
//! the same array.

pub mod asm;
pub mod builder;

pub use asm::{assemble, AsmError};
pub use builder::{BuildError, Label, ProgramBuilder};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Every instruction the engine understands.
///
/// The discriminant is the encoded value in the bytecode array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    Halt = 0,
    Push = 1,
    Add = 2,
    Sub = 3,
    Mul = 4,
    Print = 5,
    Jmp = 6,
    JmpIfZero = 7,
    JmpIfNeg = 8,
    Load = 9,
    Store = 10,
    Read = 11,
    Call = 12,
    Ret = 13,
    LoadLocal = 14,
    StoreLocal = 15,
    EnterTry = 16,
    LeaveTry = 17,
    Throw = 18,
    Malloc = 19,
    Load8 = 20,
    Load32 = 21,
    Store8 = 22,
    Store32 = 23,
    Load8Ind = 24,
    Load32Ind = 25,
    Store8Ind = 26,
    CallBuiltin = 27,
    Store32Ind = 28,
    Div = 29,
    Mod = 30,
    Dup = 31,
    Drop = 32,
    Swap = 33,
}

/// All opcodes in discriminant order, used for the decode table.
pub const ALL_OPCODES: [Opcode; 34] = [
    Opcode::Halt,
    Opcode::Push,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Print,
    Opcode::Jmp,
    Opcode::JmpIfZero,
    Opcode::JmpIfNeg,
    Opcode::Load,
    Opcode::Store,
    Opcode::Read,
    Opcode::Call,
    Opcode::Ret,
    Opcode::LoadLocal,
    Opcode::StoreLocal,
    Opcode::EnterTry,
    Opcode::LeaveTry,
    Opcode::Throw,
    Opcode::Malloc,
    Opcode::Load8,
    Opcode::Load32,
    Opcode::Store8,
    Opcode::Store32,
    Opcode::Load8Ind,
    Opcode::Load32Ind,
    Opcode::Store8Ind,
    Opcode::CallBuiltin,
    Opcode::Store32Ind,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Dup,
    Opcode::Drop,
    Opcode::Swap,
];

/// Mnemonic lookup for the assembler
static MNEMONICS: Lazy<HashMap<&'static str, Opcode>> =
    Lazy::new(|| ALL_OPCODES.iter().map(|op| (op.name(), *op)).collect());

impl Opcode {
    /// Canonical upper-case mnemonic
    pub fn name(self) -> &'static str {
        match self {
            Opcode::Halt => "HALT",
            Opcode::Push => "PUSH",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Print => "PRINT",
            Opcode::Jmp => "JMP",
            Opcode::JmpIfZero => "JMP_IF_ZERO",
            Opcode::JmpIfNeg => "JMP_IF_NEG",
            Opcode::Load => "LOAD",
            Opcode::Store => "STORE",
            Opcode::Read => "READ",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::LoadLocal => "LOAD_LOCAL",
            Opcode::StoreLocal => "STORE_LOCAL",
            Opcode::EnterTry => "ENTER_TRY",
            Opcode::LeaveTry => "LEAVE_TRY",
            Opcode::Throw => "THROW",
            Opcode::Malloc => "MALLOC",
            Opcode::Load8 => "LOAD8",
            Opcode::Load32 => "LOAD32",
            Opcode::Store8 => "STORE8",
            Opcode::Store32 => "STORE32",
            Opcode::Load8Ind => "LOAD8_IND",
            Opcode::Load32Ind => "LOAD32_IND",
            Opcode::Store8Ind => "STORE8_IND",
            Opcode::CallBuiltin => "CALL_BUILTIN",
            Opcode::Store32Ind => "STORE32_IND",
            Opcode::Div => "DIV",
            Opcode::Mod => "MOD",
            Opcode::Dup => "DUP",
            Opcode::Drop => "DROP",
            Opcode::Swap => "SWAP",
        }
    }

    /// Number of operand slots following the opcode
    pub fn operand_count(self) -> usize {
        match self {
            Opcode::Push
            | Opcode::Jmp
            | Opcode::JmpIfZero
            | Opcode::JmpIfNeg
            | Opcode::Load
            | Opcode::Store
            | Opcode::Call
            | Opcode::LoadLocal
            | Opcode::StoreLocal
            | Opcode::EnterTry
            | Opcode::Load8
            | Opcode::Load32
            | Opcode::Store8
            | Opcode::Store32 => 1,
            _ => 0,
        }
    }

    /// Whether the operand is an absolute instruction index
    pub fn has_target_operand(self) -> bool {
        matches!(
            self,
            Opcode::Jmp | Opcode::JmpIfZero | Opcode::JmpIfNeg | Opcode::Call | Opcode::EnterTry
        )
    }

    /// Total encoded width (opcode plus operands)
    pub fn width(self) -> usize {
        1 + self.operand_count()
    }

    /// Look up an opcode by mnemonic, case-insensitively
    pub fn from_mnemonic(name: &str) -> Option<Opcode> {
        MNEMONICS.get(name.to_ascii_uppercase().as_str()).copied()
    }
}

impl TryFrom<i32> for Opcode {
    type Error = i32;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        usize::try_from(value)
            .ok()
            .and_then(|idx| ALL_OPCODES.get(idx).copied())
            .ok_or(value)
    }
}

impl From<Opcode> for i32 {
    fn from(op: Opcode) -> Self {
        op as i32
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<i32>,
    /// Index of the opcode slot
    pub offset: usize,
}

impl Instruction {
    /// Index of the instruction that follows this one
    pub fn next_offset(&self) -> usize {
        self.offset + self.opcode.width()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}

/// Bytecode decoding failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unknown opcode {value} at {offset}")]
    UnknownOpcode { value: i32, offset: usize },
    #[error("Missing operand for {opcode} at {offset}")]
    MissingOperand { opcode: Opcode, offset: usize },
    #[error("Offset {0} is outside the program")]
    OutOfBounds(usize),
}

/// Decode the instruction starting at `offset`
pub fn decode(code: &[i32], offset: usize) -> Result<Instruction, DecodeError> {
    let raw = *code.get(offset).ok_or(DecodeError::OutOfBounds(offset))?;
    let opcode = Opcode::try_from(raw).map_err(|value| DecodeError::UnknownOpcode { value, offset })?;
    let operand = match opcode.operand_count() {
        0 => None,
        _ => Some(
            *code
                .get(offset + 1)
                .ok_or(DecodeError::MissingOperand { opcode, offset })?,
        ),
    };
    Ok(Instruction { opcode, operand, offset })
}

/// Iterator over the instructions of a program, in layout order
pub struct InstructionIterator<'a> {
    code: &'a [i32],
    offset: usize,
    failed: bool,
}

impl<'a> InstructionIterator<'a> {
    pub fn new(code: &'a [i32]) -> Self {
        InstructionIterator {
            code,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for InstructionIterator<'a> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.code.len() {
            return None;
        }
        match decode(self.code, self.offset) {
            Ok(inst) => {
                self.offset = inst.next_offset();
                Some(Ok(inst))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Render a program as an address-annotated listing.
///
/// Undecodable slots are shown as raw `.word` values and the listing stops
/// there, since operand boundaries are unknown past that point.
pub fn disassemble(code: &[i32]) -> String {
    let mut out = String::new();
    let mut offset = 0;
    for result in InstructionIterator::new(code) {
        match result {
            Ok(inst) => {
                out.push_str(&format!("{:>5}: {}\n", inst.offset, inst));
                offset = inst.next_offset();
            }
            Err(_) => break,
        }
    }
    for (idx, value) in code.iter().enumerate().skip(offset) {
        out.push_str(&format!("{idx:>5}: .word {value}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discriminants_match_table() {
        for (idx, op) in ALL_OPCODES.iter().enumerate() {
            assert_eq!(*op as usize, idx, "{op} out of order");
            assert_eq!(Opcode::try_from(idx as i32), Ok(*op));
        }
    }

    #[test]
    fn test_unknown_opcode() {
        assert_eq!(Opcode::try_from(34), Err(34));
        assert_eq!(Opcode::try_from(-1), Err(-1));
    }

    #[test]
    fn test_mnemonics() {
        assert_eq!(Opcode::from_mnemonic("jmp_if_zero"), Some(Opcode::JmpIfZero));
        assert_eq!(Opcode::from_mnemonic("PUSH"), Some(Opcode::Push));
        assert_eq!(Opcode::from_mnemonic("NOPE"), None);
    }

    #[test]
    fn test_decode() {
        let code = [1, 10, 1, 3, 3, 5];
        let inst = decode(&code, 0).unwrap();
        assert_eq!(inst.opcode, Opcode::Push);
        assert_eq!(inst.operand, Some(10));
        assert_eq!(inst.next_offset(), 2);

        let inst = decode(&code, 4).unwrap();
        assert_eq!(inst.opcode, Opcode::Sub);
        assert_eq!(inst.operand, None);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            decode(&[99], 0),
            Err(DecodeError::UnknownOpcode { value: 99, offset: 0 })
        );
        assert_eq!(
            decode(&[1], 0),
            Err(DecodeError::MissingOperand {
                opcode: Opcode::Push,
                offset: 0
            })
        );
        assert_eq!(decode(&[], 0), Err(DecodeError::OutOfBounds(0)));
    }

    #[test]
    fn test_disassemble() {
        let listing = disassemble(&[1, 10, 1, 3, 3, 5, 0]);
        assert_eq!(
            listing,
            "    0: PUSH 10\n    2: PUSH 3\n    4: SUB\n    5: PRINT\n    6: HALT\n"
        );
    }

    #[test]
    fn test_disassemble_stops_at_garbage() {
        let listing = disassemble(&[5, 77, 1]);
        assert_eq!(listing, "    0: PRINT\n    1: .word 77\n    2: .word 1\n");
    }
}
