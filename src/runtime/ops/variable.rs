//! Local and global variable instructions

use super::*;
use crate::runtime::frame::Frame;
use crate::runtime::global::SharedGlobal;

/// local.get x
pub fn local_get(stack: &mut Stack, frame: &Frame, local_idx: u32) -> Result<(), RuntimeError> {
    stack.push(frame.get(local_idx)?)
}

/// local.set x
/// 1. Pop a value of the local's type
/// 2. Replace `locals[x]` with it
pub fn local_set(stack: &mut Stack, frame: &mut Frame, local_idx: u32) -> Result<(), RuntimeError> {
    let value_type = frame.get(local_idx)?.typ();
    let value = stack.pop_typed(value_type)?;
    frame.set(local_idx, value)
}

/// local.tee x: like `local.set`, leaving the value on the stack.
pub fn local_tee(stack: &mut Stack, frame: &mut Frame, local_idx: u32) -> Result<(), RuntimeError> {
    let value_type = frame.get(local_idx)?.typ();
    let value = stack.pop_typed(value_type)?;
    frame.set(local_idx, value)?;
    stack.push(value)
}

/// global.get x
pub fn global_get(stack: &mut Stack, global: &SharedGlobal) -> Result<(), RuntimeError> {
    let value = global.borrow().value();
    stack.push(value)
}

/// global.set x
/// 1. Fail if the global is immutable
/// 2. Pop a value of the global's type and store it
pub fn global_set(stack: &mut Stack, global: &SharedGlobal, global_idx: u32) -> Result<(), RuntimeError> {
    let global_type = global.borrow().global_type();
    if !global_type.mutable {
        return Err(RuntimeError::ImmutableGlobalWrite(global_idx));
    }
    let value = stack.pop_typed(global_type.value_type)?;
    global.borrow_mut().set(global_idx, value)
}
