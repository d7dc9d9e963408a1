//! Default resource limits for a VM instance.
//!
//! Every limit can be overridden through [`super::VmConfig`]; these are the
//! values used when a field is left out.

// =============================================================================
// Stacks
// =============================================================================

/// Maximum operand stack depth
pub const DEFAULT_MAX_STACK_DEPTH: usize = 1024;

/// Maximum number of simultaneously active call frames
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

// =============================================================================
// Memory
// =============================================================================

/// Local slots reserved for each call frame
pub const DEFAULT_SLOTS_PER_FRAME: usize = 16;

/// Number of global slots addressable by LOAD/STORE
pub const DEFAULT_GLOBAL_SLOTS: usize = 256;

/// Heap capacity in bytes (64KB)
pub const DEFAULT_HEAP_SIZE: usize = 65536;

/// Upper bound accepted for the heap capacity (16MB)
pub const MAX_HEAP_SIZE: usize = 16 * 1024 * 1024;

/// Upper bound accepted for the global slot count
pub const MAX_GLOBAL_SLOTS: usize = 1 << 20;

/// Upper bound accepted for `max_call_depth * slots_per_frame`
pub const MAX_LOCAL_SLOTS: usize = 1 << 22;

// =============================================================================
// Heap object layout
// =============================================================================

/// Size of the little-endian length prefix on arrays and strings
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of one array element
pub const ARRAY_ELEMENT_SIZE: usize = 4;

// =============================================================================
// Debugging
// =============================================================================

/// Execution-step records retained before the oldest are dropped
pub const DEFAULT_MAX_TRACE_LEN: usize = 10_000;
