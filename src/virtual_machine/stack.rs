//! Fixed-capacity LIFO container.
//!
//! [`BoundedStack`] backs both the operand stack and the frame stack. The
//! capacity is fixed at construction and checked on every push; the backing
//! vector never grows past it.

use stackvm_derive::Error;

/// Failure of a single stack operation. The stack is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StackError {
    /// Push attempted on a full stack.
    #[error("stack is full (capacity {capacity})")]
    Overflow { capacity: usize },
    /// Pop or peek attempted on an empty stack.
    #[error("stack is empty")]
    Underflow,
}

/// Generic LIFO stack with a hard capacity ceiling.
#[derive(Clone, Debug)]
pub struct BoundedStack<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> BoundedStack<T> {
    /// Creates an empty stack holding at most `capacity` items.
    ///
    /// Storage is reserved lazily, up to a small upfront chunk, so large
    /// capacities do not cost memory until they are used.
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Appends `item` as the new top.
    pub fn push(&mut self, item: T) -> Result<(), StackError> {
        if self.items.len() >= self.capacity {
            return Err(StackError::Overflow {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Removes and returns the top item.
    pub fn pop(&mut self) -> Result<T, StackError> {
        self.items.pop().ok_or(StackError::Underflow)
    }

    /// Returns the top item without removing it.
    pub fn peek(&self) -> Result<&T, StackError> {
        self.items.last().ok_or(StackError::Underflow)
    }

    /// Returns the top item mutably without removing it.
    pub fn peek_mut(&mut self) -> Result<&mut T, StackError> {
        self.items.last_mut().ok_or(StackError::Underflow)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates from bottom to top.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Returns the contents bottom to top.
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifo_order() {
        let mut stack = BoundedStack::new(8);
        for v in [3, -1, 7, 0, 42] {
            stack.push(v).unwrap();
        }
        let mut popped = Vec::new();
        while let Ok(v) = stack.pop() {
            popped.push(v);
        }
        assert_eq!(popped, vec![42, 0, 7, -1, 3]);
        assert!(stack.is_empty());
    }

    #[test]
    fn push_on_full_leaves_stack_unchanged() {
        let mut stack = BoundedStack::new(3);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.push(3).unwrap();
        assert!(stack.is_full());

        assert_eq!(stack.push(4), Err(StackError::Overflow { capacity: 3 }));
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.as_slice(), &[1, 2, 3]);
        assert_eq!(*stack.peek().unwrap(), 3);
    }

    #[test]
    fn pop_and_peek_on_empty() {
        let mut stack: BoundedStack<i64> = BoundedStack::new(4);
        assert_eq!(stack.pop(), Err(StackError::Underflow));
        assert_eq!(stack.peek(), Err(StackError::Underflow));
        assert!(stack.peek_mut().is_err());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn peek_does_not_remove() {
        let mut stack = BoundedStack::new(2);
        stack.push(9).unwrap();
        assert_eq!(*stack.peek().unwrap(), 9);
        assert_eq!(*stack.peek().unwrap(), 9);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn peek_mut_writes_through() {
        let mut stack = BoundedStack::new(2);
        stack.push(String::from("a")).unwrap();
        stack.peek_mut().unwrap().push('b');
        assert_eq!(stack.pop().unwrap(), "ab");
    }

    #[test]
    fn zero_capacity_rejects_everything() {
        let mut stack = BoundedStack::new(0);
        assert!(stack.is_empty());
        assert!(stack.is_full());
        assert_eq!(stack.push(1), Err(StackError::Overflow { capacity: 0 }));
    }

    #[test]
    fn refill_after_drain() {
        let mut stack = BoundedStack::new(2);
        stack.push(1).unwrap();
        stack.push(2).unwrap();
        stack.pop().unwrap();
        stack.push(5).unwrap();
        assert!(stack.push(6).is_err());
        assert_eq!(stack.iter().copied().collect::<Vec<_>>(), vec![1, 5]);
        assert_eq!(stack.capacity(), 2);
    }
}
