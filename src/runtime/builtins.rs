//! Builtin registry for CALL_BUILTIN
//!
//! A builtin is a native handler addressed by a numeric id. It follows the
//! stack calling convention: arguments are popped from the operand stack
//! (last argument on top) and results are pushed back.

use super::{Heap, RuntimeError, Stack};
use std::collections::HashMap;
use std::fmt;

/// The slice of VM state a builtin may touch
pub struct BuiltinContext<'a> {
    pub stack: &'a mut Stack,
    pub heap: &'a mut Heap,
    pub output: &'a mut Vec<i32>,
}

/// Type alias for builtin implementations
pub type BuiltinFn = Box<dyn Fn(&mut BuiltinContext<'_>) -> Result<(), RuntimeError>>;

/// Ids of the builtins installed by [`BuiltinRegistry::with_defaults`]
pub mod ids {
    /// `(len) -> addr`
    pub const ARRAY_NEW: i32 = 0;
    /// `(addr, index) -> value`
    pub const ARRAY_GET: i32 = 1;
    /// `(addr, index, value) -> ()`
    pub const ARRAY_SET: i32 = 2;
    /// `(addr) -> len`
    pub const ARRAY_LEN: i32 = 3;
    /// `(addr) -> len`
    pub const STRING_LEN: i32 = 4;
    /// `(addr) -> ()`, appends each character code to the output
    pub const PRINT_STRING: i32 = 5;
}

struct Builtin {
    name: String,
    func: BuiltinFn,
}

#[derive(Default)]
pub struct BuiltinRegistry {
    builtins: HashMap<i32, Builtin>,
}

impl fmt::Debug for BuiltinRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<(i32, &str)> = self.builtins.iter().map(|(id, b)| (*id, b.name.as_str())).collect();
        names.sort_unstable();
        f.debug_struct("BuiltinRegistry").field("builtins", &names).finish()
    }
}

impl BuiltinRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the bounds-checked array and string builtins
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ids::ARRAY_NEW, "array_new", |ctx| {
            let len = ctx.stack.pop()?;
            let addr = ctx.heap.alloc_array(len)?;
            ctx.stack.push(addr)
        });
        registry.register(ids::ARRAY_GET, "array_get", |ctx| {
            let index = ctx.stack.pop()?;
            let addr = ctx.stack.pop()?;
            let value = ctx.heap.array_get(addr, index)?;
            ctx.stack.push(value)
        });
        registry.register(ids::ARRAY_SET, "array_set", |ctx| {
            let value = ctx.stack.pop()?;
            let index = ctx.stack.pop()?;
            let addr = ctx.stack.pop()?;
            ctx.heap.array_set(addr, index, value)
        });
        registry.register(ids::ARRAY_LEN, "array_len", |ctx| {
            let addr = ctx.stack.pop()?;
            let len = ctx.heap.object_len(addr)?;
            ctx.stack.push(len)
        });
        registry.register(ids::STRING_LEN, "string_len", |ctx| {
            let addr = ctx.stack.pop()?;
            let len = ctx.heap.object_len(addr)?;
            ctx.stack.push(len)
        });
        registry.register(ids::PRINT_STRING, "print_string", |ctx| {
            let addr = ctx.stack.pop()?;
            let text = ctx.heap.read_string(addr)?;
            ctx.output.extend(text.chars().map(|c| c as i32));
            Ok(())
        });
        registry
    }

    /// Register (or replace) the builtin with `id`
    pub fn register<F>(&mut self, id: i32, name: impl Into<String>, func: F)
    where
        F: Fn(&mut BuiltinContext<'_>) -> Result<(), RuntimeError> + 'static,
    {
        self.builtins.insert(
            id,
            Builtin {
                name: name.into(),
                func: Box::new(func),
            },
        );
    }

    pub fn contains(&self, id: i32) -> bool {
        self.builtins.contains_key(&id)
    }

    pub fn name(&self, id: i32) -> Option<&str> {
        self.builtins.get(&id).map(|b| b.name.as_str())
    }

    /// Run the builtin with `id`
    ///
    /// # Errors
    /// Returns `UnknownBuiltin` if nothing is registered under `id`
    pub fn call(&self, id: i32, ctx: &mut BuiltinContext<'_>) -> Result<(), RuntimeError> {
        let builtin = self.builtins.get(&id).ok_or(RuntimeError::UnknownBuiltin(id))?;
        (builtin.func)(ctx)
    }
}
