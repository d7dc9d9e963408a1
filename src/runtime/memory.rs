//! Slot memory for globals and frame-relative locals
//!
//! Two fixed arenas of `i32` slots:
//! - globals, addressed directly by LOAD/STORE
//! - locals, addressed as `frame_base + offset` by LOAD_LOCAL/STORE_LOCAL
//!
//! All access is bounds-checked; a local offset must also stay inside its
//! frame's window so one activation can never reach another's slots.

use super::RuntimeError;

#[derive(Debug, Clone)]
pub struct Memory {
    globals: Vec<i32>,
    locals: Vec<i32>,
    slots_per_frame: usize,
}

impl Memory {
    /// Create zeroed memory with room for `max_frames` frame windows
    pub fn new(global_slots: usize, slots_per_frame: usize, max_frames: usize) -> Self {
        Memory {
            globals: vec![0; global_slots],
            locals: vec![0; slots_per_frame * max_frames],
            slots_per_frame,
        }
    }

    #[inline]
    fn global_index(&self, addr: i32) -> Result<usize, RuntimeError> {
        usize::try_from(addr)
            .ok()
            .filter(|idx| *idx < self.globals.len())
            .ok_or(RuntimeError::InvalidMemoryAddress(addr as i64))
    }

    #[inline]
    fn local_index(&self, frame_base: usize, offset: i32) -> Result<usize, RuntimeError> {
        let offset = usize::try_from(offset)
            .ok()
            .filter(|off| *off < self.slots_per_frame)
            .ok_or(RuntimeError::InvalidMemoryAddress(frame_base as i64 + offset as i64))?;
        let idx = frame_base + offset;
        if idx >= self.locals.len() {
            return Err(RuntimeError::InvalidMemoryAddress(idx as i64));
        }
        Ok(idx)
    }

    pub fn load_global(&self, addr: i32) -> Result<i32, RuntimeError> {
        Ok(self.globals[self.global_index(addr)?])
    }

    pub fn store_global(&mut self, addr: i32, value: i32) -> Result<(), RuntimeError> {
        let idx = self.global_index(addr)?;
        self.globals[idx] = value;
        Ok(())
    }

    pub fn load_local(&self, frame_base: usize, offset: i32) -> Result<i32, RuntimeError> {
        Ok(self.locals[self.local_index(frame_base, offset)?])
    }

    pub fn store_local(&mut self, frame_base: usize, offset: i32, value: i32) -> Result<(), RuntimeError> {
        let idx = self.local_index(frame_base, offset)?;
        self.locals[idx] = value;
        Ok(())
    }

    pub fn globals(&self) -> &[i32] {
        &self.globals
    }

    /// The local window starting at `frame_base`
    pub fn frame_locals(&self, frame_base: usize) -> &[i32] {
        let end = (frame_base + self.slots_per_frame).min(self.locals.len());
        self.locals.get(frame_base..end).unwrap_or(&[])
    }

    /// Zero every slot
    pub fn clear(&mut self) {
        self.globals.iter_mut().for_each(|v| *v = 0);
        self.locals.iter_mut().for_each(|v| *v = 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_globals() {
        let mut mem = Memory::new(4, 4, 2);
        mem.store_global(3, -9).unwrap();
        assert_eq!(mem.load_global(3).unwrap(), -9);
        assert_eq!(mem.load_global(4), Err(RuntimeError::InvalidMemoryAddress(4)));
        assert_eq!(mem.store_global(-1, 0), Err(RuntimeError::InvalidMemoryAddress(-1)));
    }

    #[test]
    fn test_frame_windows_are_disjoint() {
        let mut mem = Memory::new(1, 4, 3);
        mem.store_local(0, 0, 11).unwrap();
        mem.store_local(4, 0, 22).unwrap();
        assert_eq!(mem.load_local(0, 0).unwrap(), 11);
        assert_eq!(mem.load_local(4, 0).unwrap(), 22);
        assert_eq!(mem.frame_locals(4), &[22, 0, 0, 0]);
    }

    #[test]
    fn test_local_offset_cannot_leave_window() {
        let mem = Memory::new(1, 4, 3);
        assert!(mem.load_local(0, 4).is_err());
        assert!(mem.load_local(4, -1).is_err());
        assert!(mem.load_local(12, 0).is_err());
    }

    #[test]
    fn test_clear() {
        let mut mem = Memory::new(2, 2, 1);
        mem.store_global(1, 5).unwrap();
        mem.store_local(0, 1, 6).unwrap();
        mem.clear();
        assert_eq!(mem.globals(), &[0, 0]);
        assert_eq!(mem.frame_locals(0), &[0, 0]);
    }
}
