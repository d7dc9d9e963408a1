//! Heap allocation and raw heap access
//!
//! Immediate forms take the address from the operand. Indirect forms pop it;
//! indirect stores pop the value first, then the address.

use super::*;

/// MALLOC: pop a byte count, push the base of a zeroed block
pub fn malloc(stack: &mut Stack, heap: &mut Heap) -> Result<(), RuntimeError> {
    let size = stack.pop()?;
    let size = usize::try_from(size).map_err(|_| RuntimeError::InvalidAllocationSize(size))?;
    let base = heap.allocate(size)?;
    // Heap capacity is bounded well below i32::MAX by config validation
    stack.push(base as i32)
}

pub fn load8(stack: &mut Stack, heap: &Heap, addr: i32) -> Result<(), RuntimeError> {
    stack.push(heap.load8(addr)?)
}

pub fn load32(stack: &mut Stack, heap: &Heap, addr: i32) -> Result<(), RuntimeError> {
    stack.push(heap.load32(addr)?)
}

pub fn store8(stack: &mut Stack, heap: &mut Heap, addr: i32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    heap.store8(addr, value)
}

pub fn store32(stack: &mut Stack, heap: &mut Heap, addr: i32) -> Result<(), RuntimeError> {
    let value = stack.pop()?;
    heap.store32(addr, value)
}

pub fn load8_ind(stack: &mut Stack, heap: &Heap) -> Result<(), RuntimeError> {
    let addr = stack.pop()?;
    load8(stack, heap, addr)
}

pub fn load32_ind(stack: &mut Stack, heap: &Heap) -> Result<(), RuntimeError> {
    let addr = stack.pop()?;
    load32(stack, heap, addr)
}

pub fn store8_ind(stack: &mut Stack, heap: &mut Heap) -> Result<(), RuntimeError> {
    let (addr, value) = stack.pop_pair()?;
    heap.store8(addr, value)
}

pub fn store32_ind(stack: &mut Stack, heap: &mut Heap) -> Result<(), RuntimeError> {
    let (addr, value) = stack.pop_pair()?;
    heap.store32(addr, value)
}

#[cfg(test)]
mod tests {
    use crate::bytecode::Opcode;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::VmConfig;
    use rstest::rstest;

    #[test]
    fn malloc_returns_consecutive_bases() {
        ExecutorTest::new()
            .push(10)
            .inst(Opcode::Malloc)
            .push(6)
            .inst(Opcode::Malloc)
            .push(0)
            .inst(Opcode::Malloc)
            .expect_stack(vec![0, 10, 16]);
    }

    #[test]
    fn malloc_overflow() {
        ExecutorTest::new()
            .config(VmConfig::default().with_heap_size(16))
            .push(17)
            .inst(Opcode::Malloc)
            .expect_error("Heap overflow: requested 17 bytes, 16 available");
    }

    #[test]
    fn malloc_negative_size() {
        ExecutorTest::new()
            .push(-4)
            .inst(Opcode::Malloc)
            .expect_error("Invalid allocation size: -4");
    }

    #[test]
    fn store_then_load_immediate() {
        ExecutorTest::new()
            .push(0x12345678)
            .inst_with(Opcode::Store32, 8)
            .inst_with(Opcode::Load32, 8)
            .inst_with(Opcode::Load8, 8)
            .inst_with(Opcode::Load8, 11)
            .expect_stack(vec![0x12345678, 0x78, 0x12]);
    }

    #[test]
    fn store8_truncates_load8_zero_extends() {
        ExecutorTest::new()
            .push(-1)
            .inst_with(Opcode::Store8, 0)
            .inst_with(Opcode::Load8, 0)
            .expect_stack(vec![255]);
    }

    #[test]
    fn indirect_access() {
        // address 4, value 77
        ExecutorTest::new()
            .push(4)
            .push(77)
            .inst(Opcode::Store32Ind)
            .push(12)
            .push(0x1AB)
            .inst(Opcode::Store8Ind)
            .push(4)
            .inst(Opcode::Load32Ind)
            .push(12)
            .inst(Opcode::Load8Ind)
            .expect_stack(vec![77, 0xAB]);
    }

    #[rstest]
    #[case(Opcode::Load8, -1)]
    #[case(Opcode::Load32, 65533)]
    #[case(Opcode::Store32, 65536)]
    fn out_of_range(#[case] op: Opcode, #[case] addr: i32) {
        ExecutorTest::new()
            .push(1)
            .inst_with(op, addr)
            .expect_error("Invalid heap address");
    }
}
