//! Memory instructions
//!
//! The effective address is the popped i32 base, read as unsigned, plus the
//! static offset from the memarg. This follows the binary format's operand
//! order rather than addressing by the static offset alone, so a module
//! written for the format loads and stores where it expects. The alignment
//! hint is ignored.

use super::*;

fn effective_address(base: i32, memarg: &MemArg) -> u64 {
    base as u32 as u64 + memarg.offset as u64
}

/// i32.load memarg
/// 1. Pop the base address
/// 2. Read 4 little-endian bytes at base + offset
/// 3. Push the value
pub fn i32_load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let base = stack.pop_i32()?;
    let value = memory.read_i32(effective_address(base, memarg))?;
    stack.push_i32(value)
}

/// i32.store memarg
/// 1. Pop the value, then the base address
/// 2. Write 4 little-endian bytes at base + offset
pub fn i32_store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let value = stack.pop_i32()?;
    let base = stack.pop_i32()?;
    memory.write_i32(effective_address(base, memarg), value)
}

/// Copies a data segment's bytes to `offset`.
pub fn copy_to_memory(memory: &mut Memory, offset: i32, data: &[u8]) -> Result<(), RuntimeError> {
    memory.write_bytes(offset as u32 as u64, data)
}
