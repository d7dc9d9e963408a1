//! A resumable bytecode virtual machine with a built-in debugger.
//!
//! bytevm executes flat `i32` bytecode on an operand-stack engine with
//! recursive calls, frame-relative locals, structured exceptions and a
//! bump-allocated heap. Execution can be suspended before any instruction and
//! resumed later with all state intact, which the debugger layer uses for
//! breakpoints and stepping.
//!
//! # Modules
//!
//! - [`bytecode`] -- Opcode table, decoder, disassembler, assembler and program builder.
//! - [`runtime`] -- The [`Vm`] engine and the state it owns: stacks, slot memory, heap, builtins.
//! - [`debugger`] -- Breakpoints, watches, step modes and execution-step records.
//!
//! # Example
//!
//! Assemble a recursive factorial, run it, and inspect a pause:
//!
//! ```
//! use bytevm::bytecode::assemble;
//! use bytevm::runtime::{RunOutcome, Vm};
//!
//! let code = assemble("
//!         PUSH 5
//!         CALL fact
//!         PRINT
//!         HALT
//! fact:   STORE_LOCAL 0
//!         LOAD_LOCAL 0
//!         JMP_IF_ZERO base
//!         LOAD_LOCAL 0
//!         LOAD_LOCAL 0
//!         PUSH 1
//!         SUB
//!         CALL fact
//!         MUL
//!         RET
//! base:   PUSH 1
//!         RET
//! ").unwrap();
//!
//! let mut vm = Vm::default();
//! vm.load(code);
//! assert_eq!(vm.run(false).unwrap(), RunOutcome::Halted { output: vec![120] });
//!
//! // Pause at the entry of `fact` and step out of the outermost call
//! vm.set_breakpoint(6);
//! let paused = vm.run(false).unwrap();
//! assert_eq!(paused.paused().unwrap().call_depth, 1);
//! vm.remove_breakpoint(6);
//! let outcome = vm.step_out().unwrap();
//! assert_eq!(outcome.paused().unwrap().pc, 4);
//! assert_eq!(vm.operand_stack(), &[120]);
//! ```

pub mod bytecode;
pub mod debugger;
pub mod runtime;

pub use bytecode::{Opcode, ProgramBuilder};
pub use debugger::{ExecutionStep, StepReason, WatchKind};
pub use runtime::{ExecutionError, RunOutcome, RuntimeError, Vm, VmConfig};
