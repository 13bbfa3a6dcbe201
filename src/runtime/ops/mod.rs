//! Instruction implementations
//!
//! Each instruction that only touches the operand stack, the current frame,
//! a global or a memory is a free function here. Structured control flow and
//! calls live in the executor since they move the instruction cursor.

pub mod control;
pub mod memory;
pub mod numeric;
pub mod variable;

pub(crate) use crate::parser::instruction::MemArg;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::Stack;
pub(crate) use crate::runtime::RuntimeError;
