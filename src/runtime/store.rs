//! Runtime store
//!
//! The store owns everything one instance touches while running: the function
//! index space, tables, memories, globals, the operand stack and the frames of
//! active calls. It also enforces the limits from [`Config`].

use super::config::Config;
use super::executor::CompiledBody;
use super::frame::Frame;
use super::global::SharedGlobal;
use super::memory::SharedMemory;
use super::stack::Stack;
use super::table::SharedTable;
use super::{RuntimeError, Value};
use crate::parser::module::{FunctionType, Locals};
use std::fmt;
use std::rc::Rc;

/// A host callable. Receives the call's parameters in order and returns the
/// single result, if any.
pub type HostFunc = Rc<dyn Fn(&[Value]) -> Result<Option<Value>, RuntimeError>>;

/// An entry in the function index space.
pub enum FunctionInstance {
    /// A function defined by the module, compiled for the tree interpreter.
    Wasm {
        func_type: FunctionType,
        locals: Vec<Locals>,
        body: Rc<CompiledBody>,
    },
    /// A host function bound through an import.
    Host { func_type: FunctionType, func: HostFunc },
}

impl FunctionInstance {
    pub fn host<F>(func_type: FunctionType, func: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Option<Value>, RuntimeError> + 'static,
    {
        FunctionInstance::Host {
            func_type,
            func: Rc::new(func),
        }
    }

    /// Declared signature.
    pub fn func_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Wasm { func_type, .. } | FunctionInstance::Host { func_type, .. } => func_type,
        }
    }
}

impl fmt::Debug for FunctionInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FunctionInstance::Wasm { func_type, body, .. } => {
                write!(f, "Wasm({func_type}, {} nodes)", body.len())
            }
            FunctionInstance::Host { func_type, .. } => write!(f, "Host({func_type})"),
        }
    }
}

#[derive(Debug)]
pub struct Store {
    pub types: Vec<FunctionType>,
    pub functions: Vec<Rc<FunctionInstance>>,
    pub tables: Vec<SharedTable>,
    pub memories: Vec<SharedMemory>,
    pub globals: Vec<SharedGlobal>,
    pub stack: Stack,
    pub frames: Vec<Frame>,
    config: Config,
    steps_remaining: Option<u64>,
}

impl Store {
    pub fn new(config: Config) -> Self {
        Store {
            types: Vec::new(),
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            stack: Stack::with_capacity(config.max_stack_bytes),
            frames: Vec::new(),
            steps_remaining: config.instruction_budget,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn func_type(&self, type_idx: u32) -> Result<&FunctionType, RuntimeError> {
        self.types.get(type_idx as usize).ok_or(RuntimeError::InvalidIndex {
            kind: "type",
            index: type_idx,
        })
    }

    pub fn function(&self, func_idx: u32) -> Result<Rc<FunctionInstance>, RuntimeError> {
        self.functions
            .get(func_idx as usize)
            .cloned()
            .ok_or(RuntimeError::InvalidIndex {
                kind: "function",
                index: func_idx,
            })
    }

    pub fn table(&self, table_idx: u32) -> Result<SharedTable, RuntimeError> {
        self.tables.get(table_idx as usize).cloned().ok_or(RuntimeError::InvalidIndex {
            kind: "table",
            index: table_idx,
        })
    }

    pub fn memory(&self, memory_idx: u32) -> Result<SharedMemory, RuntimeError> {
        self.memories
            .get(memory_idx as usize)
            .cloned()
            .ok_or(RuntimeError::InvalidIndex {
                kind: "memory",
                index: memory_idx,
            })
    }

    pub fn global(&self, global_idx: u32) -> Result<SharedGlobal, RuntimeError> {
        self.globals
            .get(global_idx as usize)
            .cloned()
            .ok_or(RuntimeError::InvalidIndex {
                kind: "global",
                index: global_idx,
            })
    }

    /// Locals of the innermost active call.
    pub fn frame(&self) -> Result<&Frame, RuntimeError> {
        self.frames.last().ok_or(RuntimeError::InvalidIndex {
            kind: "frame",
            index: 0,
        })
    }

    pub fn frame_mut(&mut self) -> Result<&mut Frame, RuntimeError> {
        self.frames.last_mut().ok_or(RuntimeError::InvalidIndex {
            kind: "frame",
            index: 0,
        })
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallStackOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// Charges one instruction against the budget, if there is one.
    pub fn consume_step(&mut self) -> Result<(), RuntimeError> {
        if let Some(remaining) = self.steps_remaining.as_mut() {
            if *remaining == 0 {
                return Err(RuntimeError::InstructionBudgetExhausted);
            }
            *remaining -= 1;
        }
        Ok(())
    }

    pub fn steps_remaining(&self) -> Option<u64> {
        self.steps_remaining
    }

    pub fn set_instruction_budget(&mut self, budget: Option<u64>) {
        self.steps_remaining = budget;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget() {
        let mut store = Store::new(Config::default().with_instruction_budget(2));
        store.consume_step().unwrap();
        store.consume_step().unwrap();
        assert_eq!(store.consume_step(), Err(RuntimeError::InstructionBudgetExhausted));
        store.set_instruction_budget(None);
        assert!(store.consume_step().is_ok());
    }

    #[test]
    fn test_call_depth() {
        let mut store = Store::new(Config::default().with_max_call_depth(1));
        store.push_frame(Frame::default()).unwrap();
        assert_eq!(store.push_frame(Frame::default()), Err(RuntimeError::CallStackOverflow));
        assert!(store.pop_frame().is_some());
        assert!(store.frame().is_err());
    }

    #[test]
    fn test_index_errors() {
        let store = Store::new(Config::default());
        assert!(matches!(
            store.function(3),
            Err(RuntimeError::InvalidIndex {
                kind: "function",
                index: 3
            })
        ));
        assert!(store.memory(0).is_err());
        assert!(store.table(0).is_err());
        assert!(store.global(0).is_err());
        assert!(store.func_type(0).is_err());
    }

    #[test]
    fn test_host_constructor() {
        let func = FunctionInstance::host(FunctionType::default(), |_| Ok(Some(Value::I32(1))));
        match func {
            FunctionInstance::Host { func, .. } => assert_eq!(func(&[]).unwrap(), Some(Value::I32(1))),
            _ => panic!("expected host function"),
        }
    }
}
