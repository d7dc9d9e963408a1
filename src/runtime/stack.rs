//! Operand stack

use super::RuntimeError;

/// Bounded LIFO of operand values
#[derive(Debug, Clone)]
pub struct Stack {
    values: Vec<i32>,
    limit: usize,
}

impl Stack {
    /// Create an empty stack holding at most `limit` values
    pub fn new(limit: usize) -> Self {
        Stack {
            values: Vec::new(),
            limit,
        }
    }

    /// Push a value onto the stack
    pub fn push(&mut self, value: i32) -> Result<(), RuntimeError> {
        if self.values.len() >= self.limit {
            return Err(RuntimeError::StackOverflow(self.limit));
        }
        self.values.push(value);
        Ok(())
    }

    /// Pop a value from the stack
    pub fn pop(&mut self) -> Result<i32, RuntimeError> {
        self.values.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop the right then the left operand of a binary operation
    pub fn pop_pair(&mut self) -> Result<(i32, i32), RuntimeError> {
        let right = self.pop()?;
        let left = self.pop()?;
        Ok((left, right))
    }

    /// Peek at the top value without popping
    pub fn peek(&self) -> Option<i32> {
        self.values.last().copied()
    }

    /// Get the current stack depth
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Check if the stack is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Discard everything above `depth`; no-op if already shallower
    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }

    /// Clear the stack
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Values from bottom to top
    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new(8);

        stack.push(42).unwrap();
        stack.push(100).unwrap();

        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap(), 100);
        assert_eq!(stack.pop().unwrap(), 42);
        assert_eq!(stack.pop(), Err(RuntimeError::StackUnderflow));
    }

    #[test]
    fn test_overflow() {
        let mut stack = Stack::new(2);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        assert_eq!(stack.push(3), Err(RuntimeError::StackOverflow(2)));
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_pop_pair_order() {
        let mut stack = Stack::new(8);
        stack.push(10).unwrap();
        stack.push(3).unwrap();
        assert_eq!(stack.pop_pair().unwrap(), (10, 3));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_peek() {
        let mut stack = Stack::new(8);
        assert!(stack.peek().is_none());

        stack.push(42).unwrap();
        assert_eq!(stack.peek(), Some(42));
        assert_eq!(stack.depth(), 1); // Peek doesn't remove
    }

    #[test]
    fn test_truncate() {
        let mut stack = Stack::new(8);
        for v in 1..=5 {
            stack.push(v).unwrap();
        }
        stack.truncate(2);
        assert_eq!(stack.as_slice(), &[1, 2]);
        stack.truncate(10);
        assert_eq!(stack.depth(), 2);
    }
}
