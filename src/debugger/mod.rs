//! Debugger controller
//!
//! The engine consults the controller before every instruction. A pause is
//! requested when an enabled breakpoint matches the pc, or when the active
//! step mode's condition holds:
//!
//! | mode        | pauses once at least one instruction ran and ... |
//! |-------------|--------------------------------------------------|
//! | `StepInto`  | always                                           |
//! | `StepOver`  | call depth <= depth when stepping began          |
//! | `StepOut`   | call depth <  depth when stepping began          |
//!
//! Pausing resets the mode to `Run`, so a plain resume continues until the
//! next breakpoint. The instruction a pause stopped on is never re-paused by
//! its own breakpoint when execution resumes.

pub mod breakpoints;
pub mod watch;

pub use breakpoints::{Breakpoint, BreakpointTable};
pub use watch::{Watch, WatchKind, WatchList, WatchValue};

use crate::bytecode::Opcode;
use crate::runtime::{CallStack, Memory};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StepMode {
    Run,
    StepInto,
    StepOver { target_depth: usize },
    StepOut { from_depth: usize },
}

/// Why an execution-step record was taken
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepReason {
    Breakpoint { address: usize },
    Step,
    /// An uncaught THROW under `pause_on_exception`
    Exception { value: i32, stack_trace: Vec<usize> },
    /// Per-instruction trace entry
    Instruction,
}

/// Snapshot of the engine at an instruction boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionStep {
    /// Next instruction to execute
    pub pc: usize,
    /// Opcode at `pc`, `None` past the end or on undecodable slots
    pub opcode: Option<Opcode>,
    /// Operand stack, bottom to top
    pub stack: Vec<i32>,
    pub call_depth: usize,
    pub reason: StepReason,
}

#[derive(Debug, Clone)]
pub struct Debugger {
    breakpoints: BreakpointTable,
    watches: WatchList,
    mode: StepMode,
    pause_on_exception: bool,
    paused: bool,
    trace: VecDeque<ExecutionStep>,
    max_trace_len: usize,
    /// Instructions dispatched since the current run/resume began
    executed_since_resume: u64,
    /// Where the last pause stopped; its breakpoint is skipped on resume
    resume_pc: Option<usize>,
}

impl Debugger {
    pub fn new(max_trace_len: usize) -> Self {
        Debugger {
            breakpoints: BreakpointTable::new(),
            watches: WatchList::new(),
            mode: StepMode::Run,
            pause_on_exception: false,
            paused: false,
            trace: VecDeque::new(),
            max_trace_len,
            executed_since_resume: 0,
            resume_pc: None,
        }
    }

    pub fn breakpoints(&self) -> &BreakpointTable {
        &self.breakpoints
    }

    pub fn breakpoints_mut(&mut self) -> &mut BreakpointTable {
        &mut self.breakpoints
    }

    pub fn watches(&self) -> &WatchList {
        &self.watches
    }

    pub fn watches_mut(&mut self) -> &mut WatchList {
        &mut self.watches
    }

    pub fn mode(&self) -> StepMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: StepMode) {
        self.mode = mode;
    }

    pub fn pause_on_exception(&self) -> bool {
        self.pause_on_exception
    }

    pub fn set_pause_on_exception(&mut self, enabled: bool) {
        self.pause_on_exception = enabled;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Mark the start of a run. A fresh run forgets the previous trace and
    /// pause position.
    pub fn begin_run(&mut self, fresh: bool) {
        self.executed_since_resume = 0;
        self.paused = false;
        if fresh {
            self.resume_pc = None;
            self.trace.clear();
        }
    }

    /// Decide whether to pause before the instruction at `pc`
    pub fn check(&self, pc: usize, call_depth: usize) -> Option<StepReason> {
        let resuming_here = self.executed_since_resume == 0 && self.resume_pc == Some(pc);
        if !resuming_here && self.breakpoints.is_active(pc) {
            return Some(StepReason::Breakpoint { address: pc });
        }
        if self.executed_since_resume == 0 {
            return None;
        }
        let step_done = match self.mode {
            StepMode::Run => false,
            StepMode::StepInto => true,
            StepMode::StepOver { target_depth } => call_depth <= target_depth,
            StepMode::StepOut { from_depth } => call_depth < from_depth,
        };
        step_done.then_some(StepReason::Step)
    }

    pub fn instruction_executed(&mut self) {
        self.executed_since_resume += 1;
    }

    /// Enter the paused state and log the pause record
    pub fn record_pause(&mut self, step: ExecutionStep) {
        if let StepReason::Breakpoint { address } = step.reason {
            self.breakpoints.record_hit(address);
        }
        self.paused = true;
        self.mode = StepMode::Run;
        self.resume_pc = Some(step.pc);
        self.record(step);
    }

    /// Append to the bounded execution trace
    pub fn record(&mut self, step: ExecutionStep) {
        if self.max_trace_len == 0 {
            return;
        }
        while self.trace.len() >= self.max_trace_len {
            self.trace.pop_front();
        }
        self.trace.push_back(step);
    }

    pub fn trace(&self) -> Vec<ExecutionStep> {
        self.trace.iter().cloned().collect()
    }

    /// The most recent pause record, if the debugger is paused
    pub fn last_pause(&self) -> Option<&ExecutionStep> {
        if !self.paused {
            return None;
        }
        self.trace.iter().rev().find(|s| s.reason != StepReason::Instruction)
    }

    pub fn evaluate_watches(&self, memory: &Memory, frames: &CallStack) -> Vec<WatchValue> {
        self.watches.evaluate(memory, frames)
    }

    /// Forget execution state; breakpoints, watches and settings survive
    pub fn reset(&mut self) {
        self.mode = StepMode::Run;
        self.paused = false;
        self.trace.clear();
        self.executed_since_resume = 0;
        self.resume_pc = None;
    }
}
