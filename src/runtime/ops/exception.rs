//! Structured exception handling
//!
//! A throw resolves against the innermost try block. Catching restores the
//! call and operand stack heights recorded at ENTER_TRY, so a throw from a
//! nested call unwinds every frame pushed inside the protected region.

use super::*;
use tracing::debug;

pub fn enter_try(
    stack: &Stack,
    frames: &CallStack,
    tries: &mut TryStack,
    operand: i32,
    code_len: usize,
) -> Result<(), RuntimeError> {
    let catch_handler = super::control::target(operand, code_len)?;
    tries.push(TryBlock {
        catch_handler,
        stack_pointer: stack.depth(),
        call_depth: frames.depth(),
    });
    Ok(())
}

pub fn leave_try(tries: &mut TryStack) -> Result<(), RuntimeError> {
    tries.pop()?;
    Ok(())
}

/// Transfer `value` to the innermost handler.
///
/// Returns the handler address, or `None` if no try block is active. State
/// is untouched when there is no handler or the handler's restored stack has
/// no room for `value`.
pub fn catch(
    stack: &mut Stack,
    frames: &mut CallStack,
    tries: &mut TryStack,
    value: i32,
) -> Result<Option<usize>, RuntimeError> {
    match tries.blocks().last() {
        None => return Ok(None),
        Some(block) if block.stack_pointer >= stack.limit() => {
            return Err(RuntimeError::StackOverflow(stack.limit()));
        }
        Some(_) => {}
    }
    let Some(block) = tries.take_handler() else {
        return Ok(None);
    };
    let discarded = frames.unwind_to(block.call_depth);
    stack.truncate(block.stack_pointer);
    stack.push(value)?;
    debug!(
        value,
        handler = block.catch_handler,
        frames_discarded = discarded.len(),
        "exception caught"
    );
    Ok(Some(block.catch_handler))
}

/// THROW: pop the exception value and deliver it.
///
/// Without a handler this fails with `UncaughtException`, carrying the stack
/// trace at the throw site. Frames are not unwound here; see [`unwind_all`].
pub fn throw(stack: &mut Stack, frames: &mut CallStack, tries: &mut TryStack, pc: usize) -> Result<Flow, RuntimeError> {
    let value = stack.pop()?;
    match catch(stack, frames, tries, value)? {
        Some(handler) => Ok(Flow::Jump(handler)),
        None => Err(RuntimeError::UncaughtException {
            value,
            stack_trace: frames.stack_trace(pc),
        }),
    }
}

/// Unwind every frame, truncating the operand stack to each frame's entry
/// depth in turn
pub fn unwind_all(stack: &mut Stack, frames: &mut CallStack) {
    for frame in frames.unwind_to(0) {
        stack.truncate(frame.stack_pointer);
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::Opcode;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::VmConfig;

    #[test]
    fn throw_caught_in_same_frame() {
        ExecutorTest::asm(
            "
                PUSH 1
                ENTER_TRY handler
                PUSH 2
                PUSH 3
                PUSH 42
                THROW
                PUSH 100
            handler:
                PRINT
            ",
        )
        .expect_output(vec![42])
        .expect_stack(vec![1]);
    }

    #[test]
    fn leave_try_restores_normal_flow() {
        ExecutorTest::asm(
            "
                ENTER_TRY handler
                PUSH 5
                LEAVE_TRY
                PRINT
                HALT
            handler:
                PUSH -1
                PRINT
            ",
        )
        .expect_output(vec![5]);
    }

    #[test]
    fn leave_try_without_block() {
        ExecutorTest::new()
            .inst(Opcode::LeaveTry)
            .expect_error("No active try block");
    }

    #[test]
    fn throw_across_frames() {
        ExecutorTest::asm(
            "
                ENTER_TRY handler
                CALL f
                HALT
            handler:
                PRINT
                HALT
            f:  PUSH 9
                CALL g
                RET
            g:  PUSH 7
                THROW
            ",
        )
        .expect_output(vec![7])
        .expect_call_depth(0)
        .expect_stack(vec![]);
    }

    #[test]
    fn nested_try_innermost_first() {
        ExecutorTest::asm(
            "
                ENTER_TRY outer
                ENTER_TRY inner
                PUSH 1
                THROW
            inner:
                PRINT
                PUSH 2
                THROW
            outer:
                PRINT
            ",
        )
        .expect_output(vec![1, 2]);
    }

    #[test]
    fn uncaught_exception() {
        ExecutorTest::new()
            .push(13)
            .inst(Opcode::Throw)
            .expect_error("Uncaught exception: 13 at pc 2 (THROW)");
    }

    #[test]
    fn uncaught_unwinds_frames() {
        let vm = ExecutorTest::asm(
            "
                PUSH 1
                CALL f
                HALT
            f:  PUSH 2
                PUSH 3
                THROW
            ",
        )
        .expect_error("Uncaught exception: 3");
        assert_eq!(vm.call_depth(), 0);
        assert_eq!(vm.operand_stack(), &[1]);
    }

    #[test]
    fn runtime_error_delivered_to_handler() {
        ExecutorTest::asm(
            "
                ENTER_TRY handler
                PUSH 1
                PUSH 0
                DIV
                HALT
            handler:
                PRINT
            ",
        )
        .expect_output(vec![-17]);
    }

    #[test]
    fn malformed_bytecode_not_catchable() {
        ExecutorTest::asm(
            "
                ENTER_TRY handler
                JMP 1000
            handler:
                PRINT
            ",
        )
        .expect_error("Invalid jump target: 1000");
    }

    #[test]
    fn handler_without_room_leaves_state_intact() {
        // The try block records a full stack, so the overflow has nowhere to go
        let vm = ExecutorTest::asm(
            "
                PUSH 1
                PUSH 2
                ENTER_TRY handler
                PUSH 3
                HALT
            handler:
                PRINT
            ",
        )
        .config(VmConfig::default().with_max_stack_depth(2))
        .expect_error("overflow");
        assert_eq!(vm.try_depth(), 1);
        assert_eq!(vm.operand_stack(), &[1, 2]);
        assert!(vm.output().is_empty());
    }

    #[test]
    fn overflow_caught_when_handler_has_room() {
        ExecutorTest::asm(
            "
                PUSH 1
                ENTER_TRY handler
                PUSH 2
                PUSH 3
                HALT
            handler:
                PRINT
            ",
        )
        .config(VmConfig::default().with_max_stack_depth(2))
        .expect_output(vec![-2])
        .expect_stack(vec![1]);
    }
}
