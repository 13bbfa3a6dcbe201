//! Global variables

use super::{RuntimeError, Value};
use crate::parser::module::GlobalType;
use std::cell::RefCell;
use std::rc::Rc;

pub type SharedGlobal = Rc<RefCell<GlobalInstance>>;

/// A global's value and declared type.
///
/// Globals declared by a module start uninitialized and receive their value
/// exactly once, from their init expression. Globals supplied by the host are
/// created initialized.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalInstance {
    global_type: GlobalType,
    value: Value,
    initialized: bool,
}

impl GlobalInstance {
    /// An initialized global, as supplied by the host.
    pub fn new(global_type: GlobalType, value: Value) -> Result<Self, RuntimeError> {
        check_type(&global_type, &value)?;
        Ok(GlobalInstance {
            global_type,
            value,
            initialized: true,
        })
    }

    pub fn shared(global_type: GlobalType, value: Value) -> Result<SharedGlobal, RuntimeError> {
        Ok(Rc::new(RefCell::new(GlobalInstance::new(global_type, value)?)))
    }

    /// A declared global awaiting its init expression.
    pub fn uninitialized(global_type: GlobalType) -> Self {
        GlobalInstance {
            global_type,
            value: Value::default_for(global_type.value_type),
            initialized: false,
        }
    }

    pub fn global_type(&self) -> GlobalType {
        self.global_type
    }

    pub fn value(&self) -> Value {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Stores the init value; `index` only labels the error.
    pub fn initialize(&mut self, index: u32, value: Value) -> Result<(), RuntimeError> {
        if self.initialized {
            return Err(RuntimeError::DoubleInitGlobal(index));
        }
        check_type(&self.global_type, &value)?;
        self.value = value;
        self.initialized = true;
        Ok(())
    }

    /// `global.set`: only mutable globals accept writes.
    pub fn set(&mut self, index: u32, value: Value) -> Result<(), RuntimeError> {
        if !self.global_type.mutable {
            return Err(RuntimeError::ImmutableGlobalWrite(index));
        }
        check_type(&self.global_type, &value)?;
        self.value = value;
        Ok(())
    }
}

fn check_type(global_type: &GlobalType, value: &Value) -> Result<(), RuntimeError> {
    if value.typ() != global_type.value_type {
        return Err(RuntimeError::TypeMismatch {
            expected: global_type.value_type.to_string(),
            actual: value.typ().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::ValueType;

    const I32_VAR: GlobalType = GlobalType {
        value_type: ValueType::I32,
        mutable: true,
    };
    const I32_CONST: GlobalType = GlobalType {
        value_type: ValueType::I32,
        mutable: false,
    };

    #[test]
    fn test_initialize_once() {
        let mut global = GlobalInstance::uninitialized(I32_CONST);
        assert!(!global.is_initialized());
        global.initialize(0, Value::I32(5)).unwrap();
        assert_eq!(global.value(), Value::I32(5));
        assert_eq!(global.initialize(0, Value::I32(6)), Err(RuntimeError::DoubleInitGlobal(0)));
        assert_eq!(global.value(), Value::I32(5));
    }

    #[test]
    fn test_host_global_is_initialized() {
        let mut global = GlobalInstance::new(I32_VAR, Value::I32(1)).unwrap();
        assert_eq!(global.initialize(3, Value::I32(2)), Err(RuntimeError::DoubleInitGlobal(3)));
    }

    #[test]
    fn test_set() {
        let mut global = GlobalInstance::new(I32_VAR, Value::I32(1)).unwrap();
        global.set(0, Value::I32(9)).unwrap();
        assert_eq!(global.value(), Value::I32(9));
        assert!(matches!(
            global.set(0, Value::I64(9)),
            Err(RuntimeError::TypeMismatch { .. })
        ));

        let mut immutable = GlobalInstance::new(I32_CONST, Value::I32(1)).unwrap();
        assert_eq!(immutable.set(4, Value::I32(2)), Err(RuntimeError::ImmutableGlobalWrite(4)));
    }
}
