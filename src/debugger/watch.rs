//! Watch expressions over slot memory
//!
//! Watches are read-only and pull-based: nothing is recorded while running;
//! each evaluation re-reads the target slot. Local watches resolve against
//! whichever frame is topmost at evaluation time.

use crate::runtime::{CallStack, Memory};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchKind {
    /// Offset into the topmost frame's local window
    Local,
    /// Global slot address
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Watch {
    pub name: String,
    pub kind: WatchKind,
    pub address: i32,
}

/// A watch with its value at evaluation time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchValue {
    pub name: String,
    pub kind: WatchKind,
    pub address: i32,
    /// `None` when the slot cannot be resolved (no frame, bad address)
    pub value: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct WatchList {
    watches: Vec<Watch>,
}

impl WatchList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a watch, replacing any existing watch with the same name
    pub fn add(&mut self, name: impl Into<String>, kind: WatchKind, address: i32) {
        let watch = Watch {
            name: name.into(),
            kind,
            address,
        };
        match self.watches.iter_mut().find(|w| w.name == watch.name) {
            Some(existing) => *existing = watch,
            None => self.watches.push(watch),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.watches.len();
        self.watches.retain(|w| w.name != name);
        before != self.watches.len()
    }

    pub fn list(&self) -> &[Watch] {
        &self.watches
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    pub fn evaluate(&self, memory: &Memory, frames: &CallStack) -> Vec<WatchValue> {
        self.watches
            .iter()
            .map(|w| {
                let value = match w.kind {
                    WatchKind::Global => memory.load_global(w.address).ok(),
                    WatchKind::Local => frames
                        .top()
                        .ok()
                        .and_then(|frame| memory.load_local(frame.frame_base, w.address).ok()),
                };
                WatchValue {
                    name: w.name.clone(),
                    kind: w.kind,
                    address: w.address,
                    value,
                }
            })
            .collect()
    }
}
