//! Control flow helpers
//!
//! Operand handling for the branching instructions. Where control goes is
//! decided by the executor; these functions only consume the operands.

use super::*;

/// Pops the i32 condition of `if` or `br_if`.
pub fn pop_condition(stack: &mut Stack) -> Result<bool, RuntimeError> {
    Ok(stack.pop_i32()? != 0)
}

/// br_table l* ld
/// 1. Pop the i32 index i
/// 2. Select `labels[i]`, or `default` when i is out of range (negative
///    indices are out of range)
pub fn br_table_label(stack: &mut Stack, labels: &[u32], default: u32) -> Result<u32, RuntimeError> {
    let index = stack.pop_i32()? as u32;
    Ok(labels.get(index as usize).copied().unwrap_or(default))
}
