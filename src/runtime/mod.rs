//! WebAssembly runtime implementation
//!
//! This module provides the execution engine for decoded modules: the operand
//! stack, linear memory, tables, globals, the function index space and the
//! instruction tree interpreter.

pub mod config;
pub mod executor;
pub mod frame;
pub mod global;
pub mod imports;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod table;
pub mod test_utils;
pub mod value;

pub use config::Config;
pub use global::{GlobalInstance, SharedGlobal};
pub use imports::{Extern, ImportObject};
pub use instance::{Exports, Instance};
pub use memory::{Memory, SharedMemory};
pub use stack::Stack;
pub use store::{FunctionInstance, HostFunc, Store};
pub use table::{SharedTable, Table};
pub use value::Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("Invalid {kind} index: {index}")]
    InvalidIndex { kind: &'static str, index: u32 },
    #[error("Branch label {0} does not resolve to an enclosing block")]
    BranchResolution(u32),
    #[error("Write to immutable global: {0}")]
    ImmutableGlobalWrite(u32),
    #[error("Global initialized twice: {0}")]
    DoubleInitGlobal(u32),
    #[error("Unbound table element: {0}")]
    UnboundTableElement(u32),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("Out of bounds memory access at {address} (size {size})")]
    MemoryOutOfBounds { address: u64, size: usize },
    #[error("Memory error: {0}")]
    MemoryError(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Unreachable executed")]
    Unreachable,
    #[error("Unknown import: {module}.{name}")]
    UnknownImport { module: String, name: String },
    #[error("Import {module}.{name} is not a {expected}")]
    ImportKindMismatch {
        module: String,
        name: String,
        expected: &'static str,
    },
    #[error("Unknown export: {0}")]
    UnknownExport(String),
    #[error("Call stack overflow")]
    CallStackOverflow,
    #[error("Instruction budget exhausted")]
    InstructionBudgetExhausted,
    #[error("Host error: {0}")]
    Host(String),
}
