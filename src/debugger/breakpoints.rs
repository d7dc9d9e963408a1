//! Breakpoint table keyed by instruction address

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    pub address: usize,
    pub enabled: bool,
    /// Number of times this breakpoint has paused execution
    pub hits: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BreakpointTable {
    entries: BTreeMap<usize, Breakpoint>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an enabled breakpoint at `address`.
    ///
    /// Returns `false` if one already existed there; it is re-enabled rather
    /// than duplicated.
    pub fn set(&mut self, address: usize) -> bool {
        match self.entries.get_mut(&address) {
            Some(bp) => {
                bp.enabled = true;
                false
            }
            None => {
                self.entries.insert(
                    address,
                    Breakpoint {
                        address,
                        enabled: true,
                        hits: 0,
                    },
                );
                true
            }
        }
    }

    pub fn remove(&mut self, address: usize) -> bool {
        self.entries.remove(&address).is_some()
    }

    /// Enable or disable; `false` if no breakpoint exists at `address`
    pub fn set_enabled(&mut self, address: usize, enabled: bool) -> bool {
        match self.entries.get_mut(&address) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self, address: usize) -> bool {
        self.entries.get(&address).is_some_and(|bp| bp.enabled)
    }

    pub(crate) fn record_hit(&mut self, address: usize) {
        if let Some(bp) = self.entries.get_mut(&address) {
            bp.hits += 1;
        }
    }

    pub fn get(&self, address: usize) -> Option<&Breakpoint> {
        self.entries.get(&address)
    }

    /// All breakpoints in address order
    pub fn list(&self) -> Vec<Breakpoint> {
        self.entries.values().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_is_idempotent() {
        let mut table = BreakpointTable::new();
        assert!(table.set(4));
        assert!(!table.set(4));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_disable_only_affects_one_address() {
        let mut table = BreakpointTable::new();
        table.set(2);
        table.set(6);
        assert!(table.set_enabled(2, false));
        assert!(!table.is_active(2));
        assert!(table.is_active(6));
        assert!(!table.set_enabled(9, true));

        // Setting again re-enables
        table.set(2);
        assert!(table.is_active(2));
    }

    #[test]
    fn test_remove_and_list() {
        let mut table = BreakpointTable::new();
        table.set(8);
        table.set(3);
        assert_eq!(table.list().iter().map(|b| b.address).collect::<Vec<_>>(), vec![3, 8]);
        assert!(table.remove(8));
        assert!(!table.remove(8));
        table.clear();
        assert!(table.is_empty());
    }
}
