use std::collections::HashMap;

/// Activation record: where to resume and the frame's local variables.
///
/// Variables are sparse; any id that was never stored reads as 0.
#[derive(Clone, Debug, Default)]
pub struct CallFrame {
    /// Instruction pointer to resume at when this frame is left.
    return_address: usize,
    /// Local variables keyed by the id encoded in `LOAD`/`STORE`.
    variables: HashMap<i64, i64>,
}

impl CallFrame {
    pub fn new(return_address: usize) -> Self {
        Self {
            return_address,
            variables: HashMap::new(),
        }
    }

    pub fn return_address(&self) -> usize {
        self.return_address
    }

    /// Returns the value stored for `id`, or 0.
    pub fn load(&self, id: i64) -> i64 {
        self.variables.get(&id).copied().unwrap_or(0)
    }

    /// Creates or overwrites the variable `id`.
    pub fn store(&mut self, id: i64, value: i64) {
        self.variables.insert(id, value);
    }

    /// Number of variables written so far.
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_id_reads_zero() {
        let frame = CallFrame::new(0);
        assert_eq!(frame.load(0), 0);
        assert_eq!(frame.load(12345), 0);
        assert_eq!(frame.load(-7), 0);
        assert_eq!(frame.variable_count(), 0);
    }

    #[test]
    fn store_then_load() {
        let mut frame = CallFrame::new(0);
        for (id, v) in [(0, 100), (1, -200), (4096, i64::MAX), (-3, i64::MIN)] {
            frame.store(id, v);
            assert_eq!(frame.load(id), v);
        }
        assert_eq!(frame.variable_count(), 4);
    }

    #[test]
    fn store_overwrites() {
        let mut frame = CallFrame::new(0);
        frame.store(3, 1);
        frame.store(3, 2);
        assert_eq!(frame.load(3), 2);
        assert_eq!(frame.variable_count(), 1);
    }

    #[test]
    fn return_address_fixed() {
        let mut frame = CallFrame::new(17);
        frame.store(0, 99);
        assert_eq!(frame.return_address(), 17);
    }
}
