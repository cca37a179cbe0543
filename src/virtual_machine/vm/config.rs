/// Default operand stack capacity.
pub const OPERAND_STACK_CAPACITY: usize = 4096;

/// Default frame stack capacity.
pub const FRAME_STACK_CAPACITY: usize = 256;

/// Construction-time limits for a [`VM`](super::VM).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VmConfig {
    /// Maximum number of values on the operand stack.
    pub operand_stack_capacity: usize,
    /// Maximum number of call frames.
    pub frame_stack_capacity: usize,
    /// Instruction budget for one run. `None` runs until `HALT` or a fault.
    pub max_steps: Option<u64>,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            operand_stack_capacity: OPERAND_STACK_CAPACITY,
            frame_stack_capacity: FRAME_STACK_CAPACITY,
            max_steps: None,
        }
    }
}

impl VmConfig {
    pub fn with_operand_stack_capacity(mut self, capacity: usize) -> Self {
        self.operand_stack_capacity = capacity;
        self
    }

    pub fn with_frame_stack_capacity(mut self, capacity: usize) -> Self {
        self.frame_stack_capacity = capacity;
        self
    }

    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VmConfig::default();
        assert_eq!(config.operand_stack_capacity, 4096);
        assert_eq!(config.frame_stack_capacity, 256);
        assert_eq!(config.max_steps, None);
    }

    #[test]
    fn builders_override_single_field() {
        let config = VmConfig::default()
            .with_operand_stack_capacity(8)
            .with_max_steps(100);
        assert_eq!(config.operand_stack_capacity, 8);
        assert_eq!(config.frame_stack_capacity, FRAME_STACK_CAPACITY);
        assert_eq!(config.max_steps, Some(100));
    }
}
