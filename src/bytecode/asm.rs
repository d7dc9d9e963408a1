//! Line-oriented assembler for bytecode programs.
//!
//! One instruction per line, mnemonics are case-insensitive, `;` starts a
//! comment and `name:` binds a label to the next instruction. Any operand may
//! be an integer literal (decimal or `0x` hex, optionally negative) or a label.
//!
//! ```text
//!         PUSH 5
//!         CALL fact       ; result left on the stack
//!         PRINT
//!         HALT
//! fact:   STORE_LOCAL 0
//!         ...
//! ```

use super::Opcode;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:(?P<label>[A-Za-z_][A-Za-z0-9_]*)\s*:)?\s*(?:(?P<mnemonic>[A-Za-z_][A-Za-z0-9_]*)(?:\s+(?P<operand>\S+))?)?\s*$")
        .expect("line pattern is valid")
});

/// Assembly failures, each tagged with the 1-based source line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AsmError {
    #[error("line {line}: syntax error")]
    Syntax { line: usize },
    #[error("line {line}: unknown mnemonic `{name}`")]
    UnknownMnemonic { line: usize, name: String },
    #[error("line {line}: {opcode} requires an operand")]
    MissingOperand { line: usize, opcode: Opcode },
    #[error("line {line}: {opcode} takes no operand")]
    UnexpectedOperand { line: usize, opcode: Opcode },
    #[error("line {line}: invalid operand `{text}`")]
    InvalidOperand { line: usize, text: String },
    #[error("line {line}: label `{name}` defined twice")]
    DuplicateLabel { line: usize, name: String },
    #[error("line {line}: undefined label `{name}`")]
    UndefinedLabel { line: usize, name: String },
}

enum Operand<'a> {
    Literal(i32),
    Label(&'a str),
}

struct Statement<'a> {
    line: usize,
    opcode: Opcode,
    operand: Option<Operand<'a>>,
}

fn parse_operand(text: &str, line: usize) -> Result<Operand<'_>, AsmError> {
    let invalid = || AsmError::InvalidOperand {
        line,
        text: text.to_string(),
    };
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let first = digits.chars().next().ok_or_else(invalid)?;
    if !first.is_ascii_digit() {
        if negative || !(first.is_ascii_alphabetic() || first == '_') {
            return Err(invalid());
        }
        return Ok(Operand::Label(text));
    }
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| invalid())?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).map(Operand::Literal).map_err(|_| invalid())
}

/// Assemble source text into bytecode
pub fn assemble(source: &str) -> Result<Vec<i32>, AsmError> {
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut statements = Vec::new();
    let mut offset = 0;

    // Pass 1: layout and label addresses
    for (idx, raw_line) in source.lines().enumerate() {
        let line = idx + 1;
        let text = raw_line.split(';').next().unwrap_or("");
        let caps = LINE.captures(text).ok_or(AsmError::Syntax { line })?;

        if let Some(label) = caps.name("label") {
            let name = label.as_str();
            if labels.insert(name, offset).is_some() {
                return Err(AsmError::DuplicateLabel {
                    line,
                    name: name.to_string(),
                });
            }
        }

        let Some(mnemonic) = caps.name("mnemonic") else {
            continue;
        };
        let opcode = Opcode::from_mnemonic(mnemonic.as_str()).ok_or_else(|| AsmError::UnknownMnemonic {
            line,
            name: mnemonic.as_str().to_string(),
        })?;
        let operand = match (opcode.operand_count(), caps.name("operand")) {
            (0, None) => None,
            (0, Some(_)) => return Err(AsmError::UnexpectedOperand { line, opcode }),
            (_, None) => return Err(AsmError::MissingOperand { line, opcode }),
            (_, Some(text)) => Some(parse_operand(text.as_str(), line)?),
        };
        offset += opcode.width();
        statements.push(Statement { line, opcode, operand });
    }

    // Pass 2: emit with resolved labels
    let mut code = Vec::with_capacity(offset);
    for stmt in statements {
        code.push(i32::from(stmt.opcode));
        match stmt.operand {
            None => {}
            Some(Operand::Literal(value)) => code.push(value),
            Some(Operand::Label(name)) => {
                let target = labels.get(name).ok_or_else(|| AsmError::UndefinedLabel {
                    line: stmt.line,
                    name: name.to_string(),
                })?;
                code.push(*target as i32);
            }
        }
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line() {
        let code = assemble("PUSH 10\nPUSH 3\nSUB\nPRINT\nHALT").unwrap();
        assert_eq!(code, vec![1, 10, 1, 3, 3, 5, 0]);
    }

    #[test]
    fn test_labels_and_comments() {
        let src = "
            ; count down from 2
            start:  PUSH 2
            loop:   DUP
                    JMP_IF_ZERO end   ; exit when zero
                    PUSH 1
                    SUB
                    JMP loop
            end:    HALT
        ";
        let code = assemble(src).unwrap();
        assert_eq!(code, vec![1, 2, 31, 7, 10, 1, 1, 3, 6, 2, 0]);
    }

    #[test]
    fn test_literals() {
        let code = assemble("push -7\npush 0x1F").unwrap();
        assert_eq!(code, vec![1, -7, 1, 31]);
    }

    #[test]
    fn test_label_on_own_line() {
        let code = assemble("JMP target\ntarget:\nHALT").unwrap();
        assert_eq!(code, vec![6, 2, 0]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            assemble("PUSH"),
            Err(AsmError::MissingOperand {
                line: 1,
                opcode: Opcode::Push
            })
        );
        assert_eq!(
            assemble("HALT\nADD 3"),
            Err(AsmError::UnexpectedOperand {
                line: 2,
                opcode: Opcode::Add
            })
        );
        assert_eq!(
            assemble("FROB"),
            Err(AsmError::UnknownMnemonic {
                line: 1,
                name: "FROB".to_string()
            })
        );
        assert_eq!(
            assemble("JMP nowhere"),
            Err(AsmError::UndefinedLabel {
                line: 1,
                name: "nowhere".to_string()
            })
        );
        assert_eq!(
            assemble("a: HALT\na: HALT"),
            Err(AsmError::DuplicateLabel {
                line: 2,
                name: "a".to_string()
            })
        );
        assert!(matches!(assemble("PUSH 1 2"), Err(AsmError::Syntax { line: 1 })));
        assert!(matches!(
            assemble("PUSH 99999999999"),
            Err(AsmError::InvalidOperand { line: 1, .. })
        ));
    }
}
