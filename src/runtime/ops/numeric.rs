//! Integer arithmetic
//!
//! All operations pop the right operand first and wrap on overflow.

use super::*;

/// The shared shape of every binary operation: pop `b`, pop `a`, push `f(a, b)`
fn binary<F>(stack: &mut Stack, f: F) -> Result<(), RuntimeError>
where
    F: FnOnce(i32, i32) -> Result<i32, RuntimeError>,
{
    let (a, b) = stack.pop_pair()?;
    stack.push(f(a, b)?)
}

pub fn add(stack: &mut Stack) -> Result<(), RuntimeError> {
    binary(stack, |a, b| Ok(a.wrapping_add(b)))
}

pub fn sub(stack: &mut Stack) -> Result<(), RuntimeError> {
    binary(stack, |a, b| Ok(a.wrapping_sub(b)))
}

pub fn mul(stack: &mut Stack) -> Result<(), RuntimeError> {
    binary(stack, |a, b| Ok(a.wrapping_mul(b)))
}

/// Truncating division; `i32::MIN / -1` wraps to `i32::MIN`
pub fn div(stack: &mut Stack) -> Result<(), RuntimeError> {
    binary(stack, |a, b| {
        if b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        Ok(a.wrapping_div(b))
    })
}

/// Remainder with the sign of the dividend
pub fn rem(stack: &mut Stack) -> Result<(), RuntimeError> {
    binary(stack, |a, b| {
        if b == 0 {
            return Err(RuntimeError::DivisionByZero);
        }
        Ok(a.wrapping_rem(b))
    })
}

#[cfg(test)]
mod tests {
    use crate::bytecode::Opcode;
    use crate::runtime::test_utils::test::ExecutorTest;
    use rstest::rstest;

    #[rstest]
    #[case(Opcode::Add, 10, 3, 13)]
    #[case(Opcode::Sub, 10, 3, 7)]
    #[case(Opcode::Sub, 3, 10, -7)]
    #[case(Opcode::Mul, -4, 6, -24)]
    #[case(Opcode::Div, 17, 5, 3)]
    #[case(Opcode::Div, -17, 5, -3)]
    #[case(Opcode::Mod, 17, 5, 2)]
    #[case(Opcode::Mod, -17, 5, -2)]
    fn binary_operand_order(#[case] op: Opcode, #[case] a: i32, #[case] b: i32, #[case] expected: i32) {
        ExecutorTest::new()
            .push(a)
            .push(b)
            .inst(op)
            .expect_stack(vec![expected]);
    }

    #[rstest]
    #[case(Opcode::Add, i32::MAX, 1, i32::MIN)]
    #[case(Opcode::Sub, i32::MIN, 1, i32::MAX)]
    #[case(Opcode::Mul, i32::MAX, 2, -2)]
    #[case(Opcode::Div, i32::MIN, -1, i32::MIN)]
    #[case(Opcode::Mod, i32::MIN, -1, 0)]
    fn arithmetic_wraps(#[case] op: Opcode, #[case] a: i32, #[case] b: i32, #[case] expected: i32) {
        ExecutorTest::new()
            .push(a)
            .push(b)
            .inst(op)
            .expect_stack(vec![expected]);
    }

    #[rstest]
    #[case(Opcode::Div)]
    #[case(Opcode::Mod)]
    fn by_zero(#[case] op: Opcode) {
        ExecutorTest::new()
            .push(1)
            .push(0)
            .inst(op)
            .expect_error("Division by zero");
    }

    #[test]
    fn print_difference() {
        ExecutorTest::new()
            .push(10)
            .push(3)
            .inst(Opcode::Sub)
            .inst(Opcode::Print)
            .expect_output(vec![7]);
    }

    #[test]
    fn add_single_operand_underflows() {
        ExecutorTest::new()
            .push(1)
            .inst(Opcode::Add)
            .expect_error("Stack underflow");
    }
}
