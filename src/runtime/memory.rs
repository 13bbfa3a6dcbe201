//! Linear memory
//!
//! A zero-filled byte array sized in 64KiB pages. Memory does not grow. Every
//! access is bounds-checked and an out-of-range access traps with
//! [`RuntimeError::MemoryOutOfBounds`].

use super::RuntimeError;
use crate::parser::module::Limits;
use byteorder::{ByteOrder, LittleEndian};
use std::cell::RefCell;
use std::rc::Rc;

/// Page size in bytes (64KiB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages addressable with 32-bit addresses
pub const MAX_PAGES: u32 = 65536;

pub type SharedMemory = Rc<RefCell<Memory>>;

#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    data: Vec<u8>,
    limits: Limits,
}

impl Memory {
    /// Allocates `limits.min` zeroed pages.
    ///
    /// # Errors
    /// - `min` exceeds `max`
    /// - `min` exceeds the 32-bit address space
    pub fn new(limits: Limits) -> Result<Self, RuntimeError> {
        if limits.min > MAX_PAGES {
            return Err(RuntimeError::MemoryError(format!(
                "Initial memory size {} pages exceeds maximum {MAX_PAGES} pages",
                limits.min
            )));
        }
        if let Some(max) = limits.max {
            if limits.min > max {
                return Err(RuntimeError::MemoryError(format!(
                    "Initial size {} pages exceeds specified maximum {max} pages",
                    limits.min
                )));
            }
        }
        Ok(Memory {
            data: vec![0u8; limits.min as usize * PAGE_SIZE],
            limits,
        })
    }

    pub fn shared(limits: Limits) -> Result<SharedMemory, RuntimeError> {
        Ok(Rc::new(RefCell::new(Memory::new(limits)?)))
    }

    /// Size in pages
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_bounds(&self, address: u64, size: usize) -> Result<usize, RuntimeError> {
        let end = address.checked_add(size as u64);
        match end {
            Some(end) if end <= self.data.len() as u64 => Ok(address as usize),
            _ => Err(RuntimeError::MemoryOutOfBounds { address, size }),
        }
    }

    pub fn read_i32(&self, address: u64) -> Result<i32, RuntimeError> {
        let start = self.check_bounds(address, 4)?;
        Ok(LittleEndian::read_i32(&self.data[start..start + 4]))
    }

    pub fn write_i32(&mut self, address: u64, value: i32) -> Result<(), RuntimeError> {
        let start = self.check_bounds(address, 4)?;
        LittleEndian::write_i32(&mut self.data[start..start + 4], value);
        Ok(())
    }

    pub fn read_bytes(&self, address: u64, size: usize) -> Result<&[u8], RuntimeError> {
        let start = self.check_bounds(address, size)?;
        Ok(&self.data[start..start + size])
    }

    /// Copies `bytes` in at `address`, used for data segments.
    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) -> Result<(), RuntimeError> {
        let start = self.check_bounds(address, bytes.len())?;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_page() -> Memory {
        Memory::new(Limits { min: 1, max: None }).unwrap()
    }

    #[test]
    fn test_new_zeroed() {
        let memory = one_page();
        assert_eq!(memory.size(), 1);
        assert_eq!(memory.len(), PAGE_SIZE);
        assert_eq!(memory.read_i32(0).unwrap(), 0);
    }

    #[test]
    fn test_new_invalid_limits() {
        assert!(Memory::new(Limits { min: 2, max: Some(1) }).is_err());
        assert!(Memory::new(Limits {
            min: MAX_PAGES + 1,
            max: None
        })
        .is_err());
    }

    #[test]
    fn test_little_endian() {
        let mut memory = one_page();
        memory.write_i32(8, 0x0403_0201).unwrap();
        assert_eq!(memory.read_bytes(8, 4).unwrap(), &[1, 2, 3, 4]);
        assert_eq!(memory.read_i32(8).unwrap(), 0x0403_0201);
    }

    #[test]
    fn test_unaligned_access() {
        let mut memory = one_page();
        memory.write_i32(3, -2).unwrap();
        assert_eq!(memory.read_i32(3).unwrap(), -2);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut memory = one_page();
        let last = (PAGE_SIZE - 4) as u64;
        assert!(memory.write_i32(last, 1).is_ok());
        assert_eq!(
            memory.read_i32(last + 1),
            Err(RuntimeError::MemoryOutOfBounds {
                address: last + 1,
                size: 4
            })
        );
        assert!(memory.write_bytes(PAGE_SIZE as u64, &[1]).is_err());
        assert!(memory.write_bytes(PAGE_SIZE as u64, &[]).is_ok());
    }

    #[test]
    fn test_zero_pages() {
        let memory = Memory::new(Limits { min: 0, max: None }).unwrap();
        assert!(memory.is_empty());
        assert!(memory.read_i32(0).is_err());
    }
}
