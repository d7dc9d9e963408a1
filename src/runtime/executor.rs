//! Bytecode execution engine
//!
//! [`Vm`] owns every piece of execution state and drives the
//! fetch-decode-execute loop. A run ends in one of three ways:
//!
//! - `Ok(RunOutcome::Halted)` on HALT or when `pc` leaves the program
//! - `Ok(RunOutcome::Paused)` when the debugger suspends before an instruction
//! - `Err(ExecutionError)` on a fatal runtime error
//!
//! A pause is an early return with all state intact; `run(true)` continues
//! from the saved `pc`. After a fatal error every resume returns the same
//! error until the VM is reset.

use super::{
    builtins::{BuiltinContext, BuiltinRegistry},
    config::{ConfigError, VmConfig},
    control::TryStack,
    frame::{CallFrame, CallStack},
    heap::Heap,
    memory::Memory,
    ops::{self, Flow},
    stack::Stack,
    ExecutionError, RunOutcome, RuntimeError,
};
use crate::bytecode::{decode, DecodeError, Instruction, Opcode};
use crate::debugger::{
    Breakpoint, Debugger, ExecutionStep, StepMode, StepReason, Watch, WatchKind, WatchValue,
};
use std::collections::VecDeque;
use tracing::{debug, trace, warn};

/// An uncaught exception held while execution is paused on it
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingException {
    value: i32,
    stack_trace: Vec<usize>,
    pc: usize,
}

/// What the loop does after one instruction
enum Control {
    Continue,
    Halt,
    ExceptionPause(PendingException),
}

#[derive(Debug)]
pub struct Vm {
    config: VmConfig,
    code: Vec<i32>,
    pc: usize,
    halted: bool,
    stack: Stack,
    frames: CallStack,
    tries: TryStack,
    memory: Memory,
    heap: Heap,
    input: VecDeque<i32>,
    output: Vec<i32>,
    builtins: BuiltinRegistry,
    debugger: Debugger,
    /// Instructions dispatched since the last fresh run
    executed: u64,
    pending_exception: Option<PendingException>,
    /// The error that ended the last run; resuming reports it again
    faulted: Option<ExecutionError>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::with_valid_config(VmConfig::default())
    }
}

impl Vm {
    /// Create a VM with the given limits and the default builtins
    ///
    /// # Errors
    /// - If the configuration fails [`VmConfig::validate`]
    pub fn new(config: VmConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: VmConfig) -> Self {
        Vm {
            stack: Stack::new(config.max_stack_depth),
            frames: CallStack::new(config.slots_per_frame, config.max_call_depth),
            tries: TryStack::new(),
            memory: Memory::new(config.global_slots, config.slots_per_frame, config.max_call_depth),
            heap: Heap::new(config.heap_size),
            debugger: Debugger::new(config.max_trace_len),
            code: Vec::new(),
            pc: 0,
            halted: false,
            input: VecDeque::new(),
            output: Vec::new(),
            builtins: BuiltinRegistry::with_defaults(),
            executed: 0,
            pending_exception: None,
            faulted: None,
            config,
        }
    }

    /// Replace the program and reset execution state
    pub fn load(&mut self, bytecode: Vec<i32>) {
        self.code = bytecode;
        self.reset();
    }

    /// Reset all execution state; breakpoints, watches, builtins and queued
    /// input survive
    pub fn reset(&mut self) {
        self.pc = 0;
        self.halted = false;
        self.stack.clear();
        self.frames.clear();
        self.tries.clear();
        self.memory.clear();
        self.heap.reset();
        self.output.clear();
        self.executed = 0;
        self.pending_exception = None;
        self.faulted = None;
        self.debugger.reset();
    }

    /// Execute until halt, pause or fatal error.
    ///
    /// With `resume == false` execution state is reset first and the run
    /// starts at pc 0; otherwise it continues from the saved state.
    pub fn run(&mut self, resume: bool) -> Result<RunOutcome, ExecutionError> {
        if !resume {
            self.reset();
        }
        self.debugger.begin_run(!resume);
        debug!(pc = self.pc, resume, "run");

        if let Some(pending) = self.pending_exception.take() {
            return Err(self.finalize_uncaught(pending));
        }
        if let Some(error) = &self.faulted {
            return Err(error.clone());
        }

        loop {
            if self.halted || self.pc >= self.code.len() {
                self.halted = true;
                debug!(pc = self.pc, executed = self.executed, "halted");
                return Ok(RunOutcome::Halted {
                    output: self.output.clone(),
                });
            }

            if let Some(reason) = self.debugger.check(self.pc, self.frames.depth()) {
                let step = self.snapshot(reason);
                debug!(pc = step.pc, reason = ?step.reason, "paused");
                self.debugger.record_pause(step.clone());
                return Ok(RunOutcome::Paused(step));
            }

            if let Some(budget) = self.config.instruction_budget {
                if self.executed >= budget {
                    return Err(self.fatal(self.opcode_name_at(self.pc), RuntimeError::InstructionBudgetExhausted));
                }
            }

            let inst = match decode(&self.code, self.pc) {
                Ok(inst) => inst,
                Err(e) => {
                    let (name, error) = match e {
                        DecodeError::UnknownOpcode { value, .. } => ("?", RuntimeError::UnknownOpcode(value)),
                        DecodeError::MissingOperand { opcode, .. } => (opcode.name(), RuntimeError::MissingOperand(opcode)),
                        DecodeError::OutOfBounds(_) => ("?", RuntimeError::InvalidJumpTarget(self.pc as i32)),
                    };
                    return Err(self.fatal(name, error));
                }
            };

            if self.config.trace_instructions {
                let step = self.snapshot(StepReason::Instruction);
                self.debugger.record(step);
            }
            trace!(pc = self.pc, inst = %inst, depth = self.stack.depth(), "dispatch");

            self.executed += 1;
            self.debugger.instruction_executed();

            match self.step(inst) {
                Ok(Control::Continue) => {}
                Ok(Control::Halt) => {
                    self.halted = true;
                }
                Ok(Control::ExceptionPause(pending)) => {
                    let step = ExecutionStep {
                        pc: pending.pc,
                        opcode: Some(Opcode::Throw),
                        stack: self.stack.as_slice().to_vec(),
                        call_depth: self.frames.depth(),
                        reason: StepReason::Exception {
                            value: pending.value,
                            stack_trace: pending.stack_trace.clone(),
                        },
                    };
                    debug!(pc = pending.pc, value = pending.value, "paused on exception");
                    self.pending_exception = Some(pending);
                    self.debugger.record_pause(step.clone());
                    return Ok(RunOutcome::Paused(step));
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Dispatch one instruction, delivering catchable errors to the innermost
    /// try block
    fn step(&mut self, inst: Instruction) -> Result<Control, ExecutionError> {
        let error = match self.dispatch(inst) {
            Ok(Flow::Next) => {
                self.pc = inst.next_offset();
                return Ok(Control::Continue);
            }
            Ok(Flow::Jump(target)) => {
                self.pc = target;
                return Ok(Control::Continue);
            }
            Ok(Flow::Halt) => {
                self.pc = inst.next_offset();
                return Ok(Control::Halt);
            }
            Err(error) => error,
        };

        if let RuntimeError::UncaughtException { value, stack_trace } = error {
            return self.uncaught(inst, value, stack_trace);
        }

        if error.is_catchable() && !self.tries.is_empty() {
            debug!(pc = inst.offset, %error, "delivering runtime error as exception");
            match ops::exception::catch(&mut self.stack, &mut self.frames, &mut self.tries, error.code()) {
                Ok(Some(handler)) => {
                    self.pc = handler;
                    return Ok(Control::Continue);
                }
                Ok(None) => {}
                Err(e) => return Err(self.fatal(inst.opcode.name(), e)),
            }
        }
        Err(self.fatal(inst.opcode.name(), error))
    }

    fn uncaught(&mut self, inst: Instruction, value: i32, stack_trace: Vec<usize>) -> Result<Control, ExecutionError> {
        let pending = PendingException {
            value,
            stack_trace,
            pc: inst.offset,
        };
        if self.debugger.pause_on_exception() {
            return Ok(Control::ExceptionPause(pending));
        }
        Err(self.finalize_uncaught(pending))
    }

    /// Unwind every frame and turn an uncaught exception into a fatal error
    fn finalize_uncaught(&mut self, pending: PendingException) -> ExecutionError {
        ops::exception::unwind_all(&mut self.stack, &mut self.frames);
        self.tries.clear();
        self.pc = pending.pc;
        self.fatal(
            Opcode::Throw.name(),
            RuntimeError::UncaughtException {
                value: pending.value,
                stack_trace: pending.stack_trace,
            },
        )
    }

    fn fatal(&mut self, opcode: &'static str, error: RuntimeError) -> ExecutionError {
        self.halted = true;
        warn!(pc = self.pc, opcode, %error, "execution failed");
        let error = ExecutionError {
            pc: self.pc,
            opcode,
            error,
        };
        self.faulted = Some(error.clone());
        error
    }

    fn dispatch(&mut self, inst: Instruction) -> Result<Flow, RuntimeError> {
        let code_len = self.code.len();
        let operand = || inst.operand.ok_or(RuntimeError::MissingOperand(inst.opcode));
        let stack = &mut self.stack;

        match inst.opcode {
            Opcode::Halt => return Ok(Flow::Halt),
            Opcode::Push => stack.push(operand()?)?,
            Opcode::Add => ops::numeric::add(stack)?,
            Opcode::Sub => ops::numeric::sub(stack)?,
            Opcode::Mul => ops::numeric::mul(stack)?,
            Opcode::Div => ops::numeric::div(stack)?,
            Opcode::Mod => ops::numeric::rem(stack)?,
            Opcode::Dup => ops::parametric::dup(stack)?,
            Opcode::Drop => ops::parametric::drop(stack)?,
            Opcode::Swap => ops::parametric::swap(stack)?,
            Opcode::Print => ops::io::print(stack, &mut self.output)?,
            Opcode::Read => ops::io::read(stack, &mut self.input)?,
            Opcode::CallBuiltin => ops::io::call_builtin(stack, &mut self.heap, &mut self.output, &self.builtins)?,
            Opcode::Jmp => return ops::control::jmp(operand()?, code_len),
            Opcode::JmpIfZero => return ops::control::jmp_if_zero(stack, operand()?, code_len),
            Opcode::JmpIfNeg => return ops::control::jmp_if_neg(stack, operand()?, code_len),
            Opcode::Call => return ops::control::call(stack, &mut self.frames, inst.offset, operand()?, code_len),
            Opcode::Ret => return ops::control::ret(&mut self.frames, &mut self.tries),
            Opcode::Load => ops::variable::load(stack, &self.memory, operand()?)?,
            Opcode::Store => ops::variable::store(stack, &mut self.memory, operand()?)?,
            Opcode::LoadLocal => ops::variable::load_local(stack, &self.memory, &self.frames, operand()?)?,
            Opcode::StoreLocal => ops::variable::store_local(stack, &mut self.memory, &self.frames, operand()?)?,
            Opcode::EnterTry => ops::exception::enter_try(stack, &self.frames, &mut self.tries, operand()?, code_len)?,
            Opcode::LeaveTry => ops::exception::leave_try(&mut self.tries)?,
            Opcode::Throw => return ops::exception::throw(stack, &mut self.frames, &mut self.tries, inst.offset),
            Opcode::Malloc => ops::memory::malloc(stack, &mut self.heap)?,
            Opcode::Load8 => ops::memory::load8(stack, &self.heap, operand()?)?,
            Opcode::Load32 => ops::memory::load32(stack, &self.heap, operand()?)?,
            Opcode::Store8 => ops::memory::store8(stack, &mut self.heap, operand()?)?,
            Opcode::Store32 => ops::memory::store32(stack, &mut self.heap, operand()?)?,
            Opcode::Load8Ind => ops::memory::load8_ind(stack, &self.heap)?,
            Opcode::Load32Ind => ops::memory::load32_ind(stack, &self.heap)?,
            Opcode::Store8Ind => ops::memory::store8_ind(stack, &mut self.heap)?,
            Opcode::Store32Ind => ops::memory::store32_ind(stack, &mut self.heap)?,
        }
        Ok(Flow::Next)
    }

    fn opcode_at(&self, pc: usize) -> Option<Opcode> {
        self.code.get(pc).and_then(|raw| Opcode::try_from(*raw).ok())
    }

    fn opcode_name_at(&self, pc: usize) -> &'static str {
        self.opcode_at(pc).map_or("?", Opcode::name)
    }

    fn snapshot(&self, reason: StepReason) -> ExecutionStep {
        ExecutionStep {
            pc: self.pc,
            opcode: self.opcode_at(self.pc),
            stack: self.stack.as_slice().to_vec(),
            call_depth: self.frames.depth(),
            reason,
        }
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Execute one instruction and pause before the next
    pub fn step_into(&mut self) -> Result<RunOutcome, ExecutionError> {
        self.debugger.set_mode(StepMode::StepInto);
        self.run(true)
    }

    /// Execute one instruction, running any call it makes to completion
    pub fn step_over(&mut self) -> Result<RunOutcome, ExecutionError> {
        let target_depth = self.frames.depth();
        self.debugger.set_mode(StepMode::StepOver { target_depth });
        self.run(true)
    }

    /// Run until the current frame returns
    pub fn step_out(&mut self) -> Result<RunOutcome, ExecutionError> {
        let from_depth = self.frames.depth();
        self.debugger.set_mode(StepMode::StepOut { from_depth });
        self.run(true)
    }

    /// Resume until the next breakpoint or the end of the program
    pub fn continue_execution(&mut self) -> Result<RunOutcome, ExecutionError> {
        self.debugger.set_mode(StepMode::Run);
        self.run(true)
    }

    // ------------------------------------------------------------------
    // Breakpoints and watches
    // ------------------------------------------------------------------

    /// Returns `false` if a breakpoint already existed at `address`
    pub fn set_breakpoint(&mut self, address: usize) -> bool {
        self.debugger.breakpoints_mut().set(address)
    }

    pub fn remove_breakpoint(&mut self, address: usize) -> bool {
        self.debugger.breakpoints_mut().remove(address)
    }

    pub fn enable_breakpoint(&mut self, address: usize) -> bool {
        self.debugger.breakpoints_mut().set_enabled(address, true)
    }

    pub fn disable_breakpoint(&mut self, address: usize) -> bool {
        self.debugger.breakpoints_mut().set_enabled(address, false)
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.debugger.breakpoints().list()
    }

    pub fn clear_breakpoints(&mut self) {
        self.debugger.breakpoints_mut().clear();
    }

    pub fn add_watch(&mut self, name: impl Into<String>, kind: WatchKind, address: i32) {
        self.debugger.watches_mut().add(name, kind, address);
    }

    pub fn remove_watch(&mut self, name: &str) -> bool {
        self.debugger.watches_mut().remove(name)
    }

    pub fn watches(&self) -> &[Watch] {
        self.debugger.watches().list()
    }

    pub fn clear_watches(&mut self) {
        self.debugger.watches_mut().clear();
    }

    pub fn evaluate_watches(&self) -> Vec<WatchValue> {
        self.debugger.evaluate_watches(&self.memory, &self.frames)
    }

    pub fn set_pause_on_exception(&mut self, enabled: bool) {
        self.debugger.set_pause_on_exception(enabled);
    }

    pub fn execution_trace(&self) -> Vec<ExecutionStep> {
        self.debugger.trace()
    }

    /// Current pc followed by the return-address chain. While paused on an
    /// exception, the trace captured at the throw site.
    pub fn stack_trace(&self) -> Vec<usize> {
        match &self.pending_exception {
            Some(pending) => pending.stack_trace.clone(),
            None => self.frames.stack_trace(self.pc),
        }
    }

    // ------------------------------------------------------------------
    // Host interfaces and accessors
    // ------------------------------------------------------------------

    /// Queue a value for READ
    pub fn provide_input(&mut self, value: i32) {
        self.input.push_back(value);
    }

    pub fn register_builtin<F>(&mut self, id: i32, name: impl Into<String>, func: F)
    where
        F: Fn(&mut BuiltinContext<'_>) -> Result<(), RuntimeError> + 'static,
    {
        self.builtins.register(id, name, func);
    }

    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    pub fn code(&self) -> &[i32] {
        &self.code
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_paused(&self) -> bool {
        self.debugger.is_paused()
    }

    pub fn output(&self) -> &[i32] {
        &self.output
    }

    pub fn operand_stack(&self) -> &[i32] {
        self.stack.as_slice()
    }

    pub fn call_depth(&self) -> usize {
        self.frames.depth()
    }

    pub fn frames(&self) -> &[CallFrame] {
        self.frames.frames()
    }

    pub fn try_depth(&self) -> usize {
        self.tries.depth()
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn instructions_executed(&self) -> u64 {
        self.executed
    }

    pub fn debugger(&self) -> &Debugger {
        &self.debugger
    }
}
