//! Common test utilities shared between integration tests

#![allow(dead_code)]

use bytevm::bytecode::assemble;
use bytevm::Vm;
use std::fs;
use std::path::PathBuf;

/// Assemble `tests/programs/<name>`
pub fn program(name: &str) -> Vec<i32> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/programs").join(name);
    let source = fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assemble(&source).unwrap_or_else(|e| panic!("Failed to assemble {}: {}", name, e))
}

/// A default VM loaded with the named program and its inputs queued
pub fn vm_for(name: &str, inputs: &[i32]) -> Vm {
    let mut vm = Vm::default();
    vm.load(program(name));
    for value in inputs {
        vm.provide_input(*value);
    }
    vm
}

/// Address of the first instruction with the given mnemonic at or after `from`
pub fn find_opcode(code: &[i32], from: usize, opcode: bytevm::Opcode) -> usize {
    bytevm::bytecode::InstructionIterator::new(code)
        .filter_map(Result::ok)
        .find(|inst| inst.offset >= from && inst.opcode == opcode)
        .map(|inst| inst.offset)
        .unwrap_or_else(|| panic!("No {} at or after {}", opcode, from))
}
