//! i32 numeric instructions
//!
//! Binary operations pop the right operand first. Comparisons push 1 for true
//! and 0 for false.

use super::*;

fn bool_to_i32(b: bool) -> i32 {
    if b {
        1
    } else {
        0
    }
}

// ============================================================================
// Constants
// ============================================================================

/// i32.const c
pub fn i32_const(stack: &mut Stack, value: i32) -> Result<(), RuntimeError> {
    stack.push_i32(value)
}

// ============================================================================
// Arithmetic
// ============================================================================

/// i32.add
/// 1. Pop c2, then c1
/// 2. Push c1 + c2 modulo 2^32
pub fn i32_add(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(c1.wrapping_add(c2))
}

/// i32.rem_s
/// 1. Pop c2, then c1
/// 2. If c2 is 0, trap
/// 3. Push the signed remainder, with the sign of c1
///
/// `i32::MIN rem_s -1` is 0; the overflow of the matching division does not
/// apply to the remainder.
pub fn i32_rem_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    if c2 == 0 {
        return Err(RuntimeError::DivisionByZero);
    }
    stack.push_i32(c1.wrapping_rem(c2))
}

// ============================================================================
// Tests and comparisons
// ============================================================================

/// i32.eqz
pub fn i32_eqz(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    stack.push_i32(bool_to_i32(c == 0))
}

/// i32.lt_s
pub fn i32_lt_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(bool_to_i32(c1 < c2))
}

/// i32.ge_s
pub fn i32_ge_s(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()?;
    let c1 = stack.pop_i32()?;
    stack.push_i32(bool_to_i32(c1 >= c2))
}

/// i32.ge_u: operands are reinterpreted as unsigned.
pub fn i32_ge_u(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c2 = stack.pop_i32()? as u32;
    let c1 = stack.pop_i32()? as u32;
    stack.push_i32(bool_to_i32(c1 >= c2))
}
