//! Call frame
//!
//! Holds the locals of one active call: parameters first, then the declared
//! locals zeroed.

use super::{RuntimeError, Value};
use crate::parser::module::Locals;

/// Largest number of locals, parameters included, a frame may hold.
pub const MAX_LOCALS: u64 = 50_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub locals: Vec<Value>,
}

impl Frame {
    pub fn new(args: Vec<Value>, declared: &[Locals]) -> Result<Self, RuntimeError> {
        let total = args.len() as u64 + declared.iter().map(|group| u64::from(group.count)).sum::<u64>();
        if total > MAX_LOCALS {
            return Err(RuntimeError::UnsupportedFeature(format!(
                "{total} locals exceeds maximum {MAX_LOCALS}"
            )));
        }
        let mut locals = args;
        locals.reserve(total as usize - locals.len());
        for group in declared {
            locals.extend(std::iter::repeat(Value::default_for(group.value_type)).take(group.count as usize));
        }
        Ok(Frame { locals })
    }

    pub fn get(&self, index: u32) -> Result<Value, RuntimeError> {
        self.locals.get(index as usize).copied().ok_or(RuntimeError::InvalidIndex {
            kind: "local",
            index,
        })
    }

    /// Overwrites a local; the new value must keep the local's type.
    pub fn set(&mut self, index: u32, value: Value) -> Result<(), RuntimeError> {
        let slot = self.locals.get_mut(index as usize).ok_or(RuntimeError::InvalidIndex {
            kind: "local",
            index,
        })?;
        if slot.typ() != value.typ() {
            return Err(RuntimeError::TypeMismatch {
                expected: slot.typ().to_string(),
                actual: value.typ().to_string(),
            });
        }
        *slot = value;
        Ok(())
    }
}
