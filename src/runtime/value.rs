//! Runtime values

use crate::parser::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Runtime representation of values.
///
/// All four number types can be represented, but only `I32` can live on the
/// operand stack; the others surface as `UnsupportedFeature` when pushed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    /// Zero of the given type, used for declared locals.
    pub fn default_for(value_type: ValueType) -> Value {
        match value_type {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
        }
    }

    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_for() {
        assert_eq!(Value::default_for(ValueType::I32), Value::I32(0));
        assert_eq!(Value::default_for(ValueType::F64).typ(), ValueType::F64);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::I32(-3).to_string(), "i32:-3");
        assert_eq!(Value::I64(7).to_string(), "i64:7");
        assert!(Value::F32(1.5).to_string().starts_with("f32:0x1.8p"));
    }
}
