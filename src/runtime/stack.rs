//! Operand stack
//!
//! The operand stack is a byte buffer driven through the same [`ByteCursor`]
//! codec as module bytes, with the direction reversed: `write_bytes` stores
//! its input back to front at the top, and `read_bytes(n)` takes the top `n`
//! bytes and restores their original order. The most recently written value
//! is therefore the first one read, and LEB128 values decode unchanged.

use super::{RuntimeError, Value};
use crate::parser::buffer::ByteCursor;
use crate::parser::encoding::write_vs32;
use crate::parser::module::ValueType;

#[derive(Debug, Default, Clone)]
pub struct Stack {
    bytes: Vec<u8>,
    capacity: Option<usize>,
}

impl Stack {
    pub fn new() -> Self {
        Stack::default()
    }

    /// A stack that refuses to grow beyond `capacity` bytes.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Stack {
            bytes: Vec::new(),
            capacity,
        }
    }

    pub fn push_i32(&mut self, value: i32) -> Result<(), RuntimeError> {
        let mut bytes = Vec::with_capacity(5);
        write_vs32(&mut bytes, value);
        if let Some(capacity) = self.capacity {
            if self.bytes.len() + bytes.len() > capacity {
                return Err(RuntimeError::StackOverflow);
            }
        }
        self.write_bytes(&bytes);
        Ok(())
    }

    /// Pops an i32; a truncated or empty stack is `StackUnderflow`.
    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        self.read_s32().map_err(|_| RuntimeError::StackUnderflow)
    }

    pub fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        match value {
            Value::I32(v) => self.push_i32(v),
            other => Err(unsupported(other.typ())),
        }
    }

    pub fn pop_typed(&mut self, value_type: ValueType) -> Result<Value, RuntimeError> {
        match value_type {
            ValueType::I32 => self.pop_i32().map(Value::I32),
            other => Err(unsupported(other)),
        }
    }

    pub fn len_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

fn unsupported(value_type: ValueType) -> RuntimeError {
    RuntimeError::UnsupportedFeature(format!("{value_type} on the operand stack"))
}

impl ByteCursor for Stack {
    fn read_bytes(&mut self, size: usize) -> Vec<u8> {
        if size > self.bytes.len() {
            return Vec::new();
        }
        let mut bytes = self.bytes.split_off(self.bytes.len() - size);
        bytes.reverse();
        bytes
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend(bytes.iter().rev());
    }

    fn remaining(&self) -> usize {
        self.bytes.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.bytes.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_i32() {
        let mut stack = Stack::new();
        stack.push_i32(1).unwrap();
        stack.push_i32(-300).unwrap();
        stack.push_i32(i32::MAX).unwrap();

        assert_eq!(stack.pop_i32().unwrap(), i32::MAX);
        assert_eq!(stack.pop_i32().unwrap(), -300);
        assert_eq!(stack.pop_i32().unwrap(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_underflow() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop_i32(), Err(RuntimeError::StackUnderflow));
        assert_eq!(stack.read_byte(), None);
        assert!(stack.read_bytes(1).is_empty());
    }

    #[test]
    fn test_read_bytes_restores_order() {
        let mut stack = Stack::new();
        stack.write_bytes(&[1, 2, 3]);
        stack.write_bytes(&[4, 5]);
        assert_eq!(stack.read_bytes(2), vec![4, 5]);
        assert!(stack.read_bytes(4).is_empty());
        assert_eq!(stack.read_bytes(3), vec![1, 2, 3]);
    }

    #[test]
    fn test_leb_values_are_lifo() {
        let mut stack = Stack::new();
        stack.write_u32(624485);
        stack.write_byte(7);
        assert_eq!(stack.read_byte(), Some(7));
        assert_eq!(stack.read_u32().unwrap(), 624485);
    }

    #[test]
    fn test_non_i32_unsupported() {
        let mut stack = Stack::new();
        assert!(matches!(stack.push(Value::I64(1)), Err(RuntimeError::UnsupportedFeature(_))));
        assert!(matches!(
            stack.pop_typed(ValueType::F32),
            Err(RuntimeError::UnsupportedFeature(_))
        ));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_capacity() {
        let mut stack = Stack::with_capacity(Some(2));
        stack.push_i32(1).unwrap();
        stack.push_i32(2).unwrap();
        assert_eq!(stack.push_i32(3), Err(RuntimeError::StackOverflow));
        assert_eq!(stack.len_bytes(), 2);
        assert_eq!(stack.pop_i32().unwrap(), 2);
    }
}
