//! Bump-allocated heap
//!
//! A fixed-capacity byte region with a monotonic cursor. Memory is never
//! freed or reused; [`Heap::reset`] is the only way to reclaim it.
//!
//! Object layout (all integers little-endian):
//!
//! ```text
//! array:  | len: i32 | elem0: i32 | elem1: i32 | ...
//! string: | len: i32 | b0 | b1 | ... | 0x00 |
//! ```
//!
//! Raw loads and stores are bounds-checked against the capacity; typed
//! array accessors additionally check the index against the length prefix.

use super::limits::{ARRAY_ELEMENT_SIZE, LENGTH_PREFIX_SIZE};
use super::RuntimeError;
use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone)]
pub struct Heap {
    data: Vec<u8>,
    next: usize,
}

impl Heap {
    /// Create a zero-filled heap of `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Heap {
            data: vec![0u8; capacity],
            next: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Address the next allocation will receive
    pub fn cursor(&self) -> usize {
        self.next
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.next
    }

    /// Reserve `size` zeroed bytes and return their base address.
    ///
    /// On failure the cursor is left untouched.
    pub fn allocate(&mut self, size: usize) -> Result<usize, RuntimeError> {
        let end = self
            .next
            .checked_add(size)
            .filter(|end| *end <= self.data.len())
            .ok_or(RuntimeError::HeapOverflow {
                requested: size,
                available: self.remaining(),
            })?;
        let base = self.next;
        self.data[base..end].fill(0);
        self.next = end;
        Ok(base)
    }

    /// Validate an access of `size` bytes at `addr`
    #[inline]
    fn check_bounds(&self, addr: i32, size: usize) -> Result<usize, RuntimeError> {
        usize::try_from(addr)
            .ok()
            .filter(|start| start.checked_add(size).is_some_and(|end| end <= self.data.len()))
            .ok_or_else(|| RuntimeError::InvalidHeapAddress {
                address: addr as i64,
                size,
            })
    }

    /// Read a byte, zero-extended
    pub fn load8(&self, addr: i32) -> Result<i32, RuntimeError> {
        let start = self.check_bounds(addr, 1)?;
        Ok(self.data[start] as i32)
    }

    /// Read a little-endian i32
    pub fn load32(&self, addr: i32) -> Result<i32, RuntimeError> {
        let start = self.check_bounds(addr, 4)?;
        Ok(LittleEndian::read_i32(&self.data[start..start + 4]))
    }

    /// Write the low byte of `value`
    pub fn store8(&mut self, addr: i32, value: i32) -> Result<(), RuntimeError> {
        let start = self.check_bounds(addr, 1)?;
        self.data[start] = value as u8;
        Ok(())
    }

    /// Write a little-endian i32
    pub fn store32(&mut self, addr: i32, value: i32) -> Result<(), RuntimeError> {
        let start = self.check_bounds(addr, 4)?;
        LittleEndian::write_i32(&mut self.data[start..start + 4], value);
        Ok(())
    }

    /// Read a slice of bytes
    pub fn bytes(&self, addr: i32, len: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(addr, len)?;
        Ok(&self.data[start..start + len])
    }

    // ------------------------------------------------------------------
    // Typed objects
    // ------------------------------------------------------------------

    /// Allocate an array of `len` zeroed elements
    pub fn alloc_array(&mut self, len: i32) -> Result<i32, RuntimeError> {
        let count = usize::try_from(len).map_err(|_| RuntimeError::InvalidAllocationSize(len))?;
        let size = count
            .checked_mul(ARRAY_ELEMENT_SIZE)
            .and_then(|s| s.checked_add(LENGTH_PREFIX_SIZE))
            .ok_or(RuntimeError::InvalidAllocationSize(len))?;
        let base = self.allocate(size)? as i32;
        self.store32(base, len)?;
        Ok(base)
    }

    /// Length prefix of the object at `addr`
    pub fn object_len(&self, addr: i32) -> Result<i32, RuntimeError> {
        self.load32(addr)
    }

    fn element_addr(&self, addr: i32, index: i32) -> Result<i32, RuntimeError> {
        let length = self.object_len(addr)?;
        if index < 0 || index >= length {
            return Err(RuntimeError::IndexOutOfBounds { index, length });
        }
        let offset = LENGTH_PREFIX_SIZE as i64 + index as i64 * ARRAY_ELEMENT_SIZE as i64;
        i32::try_from(addr as i64 + offset).map_err(|_| RuntimeError::InvalidHeapAddress {
            address: addr as i64 + offset,
            size: ARRAY_ELEMENT_SIZE,
        })
    }

    pub fn array_get(&self, addr: i32, index: i32) -> Result<i32, RuntimeError> {
        self.load32(self.element_addr(addr, index)?)
    }

    pub fn array_set(&mut self, addr: i32, index: i32, value: i32) -> Result<(), RuntimeError> {
        let elem = self.element_addr(addr, index)?;
        self.store32(elem, value)
    }

    /// Allocate a NUL-terminated string with a length prefix
    pub fn alloc_string(&mut self, text: &str) -> Result<i32, RuntimeError> {
        let bytes = text.as_bytes();
        let len = i32::try_from(bytes.len()).map_err(|_| RuntimeError::InvalidAllocationSize(i32::MAX))?;
        let base = self.allocate(LENGTH_PREFIX_SIZE + bytes.len() + 1)?;
        let start = base + LENGTH_PREFIX_SIZE;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.store32(base as i32, len)?;
        Ok(base as i32)
    }

    /// Decode the string at `addr` (bytes are mapped one-to-one to chars)
    pub fn read_string(&self, addr: i32) -> Result<String, RuntimeError> {
        let len = self.object_len(addr)?;
        let len = usize::try_from(len).map_err(|_| RuntimeError::InvalidHeapAddress {
            address: addr as i64,
            size: LENGTH_PREFIX_SIZE,
        })?;
        let body = addr
            .checked_add(LENGTH_PREFIX_SIZE as i32)
            .ok_or(RuntimeError::InvalidHeapAddress {
                address: addr as i64,
                size: len,
            })?;
        Ok(self.bytes(body, len)?.iter().map(|b| *b as char).collect())
    }

    /// Hex rendering of `len` bytes at `addr`, 16 bytes per line
    pub fn hex_dump(&self, addr: i32, len: usize) -> Result<String, RuntimeError> {
        let bytes = self.bytes(addr, len)?;
        let mut out = String::new();
        for (i, chunk) in bytes.chunks(16).enumerate() {
            out.push_str(&format!("{:08x}: {}\n", addr as usize + i * 16, hex::encode(chunk)));
        }
        Ok(out)
    }

    /// Zero the region and rewind the cursor
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.next = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_do_not_overlap() {
        let mut heap = Heap::new(64);
        let a = heap.allocate(10).unwrap();
        let b = heap.allocate(6).unwrap();
        let c = heap.allocate(0).unwrap();
        assert_eq!((a, b, c), (0, 10, 16));
        assert_eq!(heap.cursor(), 16);
    }

    #[test]
    fn test_overflow_leaves_cursor() {
        let mut heap = Heap::new(16);
        heap.allocate(12).unwrap();
        assert_eq!(
            heap.allocate(5),
            Err(RuntimeError::HeapOverflow {
                requested: 5,
                available: 4
            })
        );
        assert_eq!(heap.cursor(), 12);
        assert_eq!(heap.allocate(4).unwrap(), 12);
        assert_eq!(heap.remaining(), 0);
    }

    #[test]
    fn test_allocation_is_zero_filled() {
        let mut heap = Heap::new(8);
        heap.store32(0, -1).unwrap();
        let base = heap.allocate(4).unwrap() as i32;
        assert_eq!(heap.load32(base).unwrap(), 0);
    }

    #[test]
    fn test_little_endian() {
        let mut heap = Heap::new(8);
        heap.store32(0, 0x12345678).unwrap();
        assert_eq!(heap.bytes(0, 4).unwrap(), &[0x78, 0x56, 0x34, 0x12]);
        assert_eq!(heap.load8(0).unwrap(), 0x78);
    }

    #[test]
    fn test_byte_access() {
        let mut heap = Heap::new(4);
        heap.store8(1, 0x1FF).unwrap();
        assert_eq!(heap.load8(1).unwrap(), 0xFF);
    }

    #[test]
    fn test_bounds_checking() {
        let mut heap = Heap::new(8);
        assert!(heap.load32(4).is_ok());
        assert_eq!(
            heap.load32(5),
            Err(RuntimeError::InvalidHeapAddress { address: 5, size: 4 })
        );
        assert!(heap.store8(8, 1).is_err());
        assert_eq!(
            heap.load8(-1),
            Err(RuntimeError::InvalidHeapAddress { address: -1, size: 1 })
        );
        assert!(heap.load32(i32::MAX).is_err());
    }

    #[test]
    fn test_arrays() {
        let mut heap = Heap::new(64);
        let arr = heap.alloc_array(3).unwrap();
        assert_eq!(heap.object_len(arr).unwrap(), 3);
        heap.array_set(arr, 2, 77).unwrap();
        assert_eq!(heap.array_get(arr, 2).unwrap(), 77);
        assert_eq!(heap.array_get(arr, 0).unwrap(), 0);
        assert_eq!(
            heap.array_get(arr, 3),
            Err(RuntimeError::IndexOutOfBounds { index: 3, length: 3 })
        );
        assert_eq!(heap.cursor(), 16);
        assert!(heap.alloc_array(-1).is_err());
    }

    #[test]
    fn test_strings() {
        let mut heap = Heap::new(64);
        let s = heap.alloc_string("hi!").unwrap();
        assert_eq!(heap.object_len(s).unwrap(), 3);
        assert_eq!(heap.read_string(s).unwrap(), "hi!");
        // Trailing NUL after the characters
        assert_eq!(heap.load8(s + 7).unwrap(), 0);
        assert_eq!(heap.cursor(), 8);
    }

    #[test]
    fn test_hex_dump() {
        let mut heap = Heap::new(32);
        heap.store32(0, 0x04030201).unwrap();
        assert_eq!(heap.hex_dump(0, 4).unwrap(), "00000000: 01020304\n");
    }

    #[test]
    fn test_reset() {
        let mut heap = Heap::new(16);
        heap.allocate(8).unwrap();
        heap.store8(0, 9).unwrap();
        heap.reset();
        assert_eq!(heap.cursor(), 0);
        assert_eq!(heap.load8(0).unwrap(), 0);
    }
}
