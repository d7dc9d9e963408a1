//! VM configuration
//!
//! A [`VmConfig`] fixes the resource limits of one VM instance. It can be
//! built in code or loaded from JSON; omitted fields take the defaults in
//! [`super::limits`].
//!
//! ```
//! use bytevm::runtime::VmConfig;
//!
//! let config = VmConfig::from_json_str(r#"{ "heap_size": 1024, "instruction_budget": 500 }"#).unwrap();
//! assert_eq!(config.heap_size, 1024);
//! assert_eq!(config.slots_per_frame, 16);
//! ```

use super::limits::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VmConfig {
    /// Operand stack capacity
    pub max_stack_depth: usize,
    /// Call frame capacity
    pub max_call_depth: usize,
    /// Local slots per frame; frame `n` owns locals `n * slots_per_frame ..`
    pub slots_per_frame: usize,
    /// Global slot count
    pub global_slots: usize,
    /// Heap capacity in bytes
    pub heap_size: usize,
    /// Stop with `InstructionBudgetExhausted` after this many instructions
    pub instruction_budget: Option<u64>,
    /// Record an execution-step record for every dispatched instruction
    pub trace_instructions: bool,
    /// Execution-step records kept before the oldest are dropped
    pub max_trace_len: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            slots_per_frame: DEFAULT_SLOTS_PER_FRAME,
            global_slots: DEFAULT_GLOBAL_SLOTS,
            heap_size: DEFAULT_HEAP_SIZE,
            instruction_budget: None,
            trace_instructions: false,
            max_trace_len: DEFAULT_MAX_TRACE_LEN,
        }
    }
}

impl VmConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: VmConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check that every limit is usable
    ///
    /// # Errors
    /// - Any stack, frame or memory size is zero
    /// - The heap exceeds [`MAX_HEAP_SIZE`]
    /// - The global slots exceed [`MAX_GLOBAL_SLOTS`]
    /// - The local arena exceeds [`MAX_LOCAL_SLOTS`]
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("max_stack_depth", self.max_stack_depth),
            ("max_call_depth", self.max_call_depth),
            ("slots_per_frame", self.slots_per_frame),
            ("global_slots", self.global_slots),
        ];
        for (name, value) in nonzero {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.heap_size > MAX_HEAP_SIZE {
            return Err(ConfigError::Invalid(format!(
                "heap_size {} exceeds maximum {MAX_HEAP_SIZE}",
                self.heap_size
            )));
        }
        if self.global_slots > MAX_GLOBAL_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "global_slots {} exceeds maximum {MAX_GLOBAL_SLOTS}",
                self.global_slots
            )));
        }
        match self.max_call_depth.checked_mul(self.slots_per_frame) {
            Some(locals) if locals <= MAX_LOCAL_SLOTS => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "max_call_depth * slots_per_frame exceeds maximum {MAX_LOCAL_SLOTS}"
                )))
            }
        }
        Ok(())
    }

    pub fn with_heap_size(mut self, bytes: usize) -> Self {
        self.heap_size = bytes;
        self
    }

    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn with_instruction_budget(mut self, budget: Option<u64>) -> Self {
        self.instruction_budget = budget;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_instructions = enabled;
        self
    }
}
