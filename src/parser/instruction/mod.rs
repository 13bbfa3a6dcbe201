//! Instruction trees.
//!
//! Function bodies and constant expressions decode into an [`Expression`]: a
//! sequence of [`Instruction`]s where `block`, `loop` and `if` own their nested
//! sequences. The `end`/`else` terminators are implied by the tree shape and
//! are not stored.

pub mod decode;
pub mod encode;

use super::module::ValueType;
use std::fmt;

/// Memory argument for memory access instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemArg {
    /// Alignment hint (as power of 2), not enforced
    pub align: u32,
    pub offset: u32,
}

/// Block type for structured control instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Empty,
    Value(ValueType),
}

/// A sequence of instructions terminated by `end` on the wire.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    pub instructions: Vec<Instruction>,
}

impl Expression {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl From<Vec<Instruction>> for Expression {
    fn from(instructions: Vec<Instruction>) -> Self {
        Expression { instructions }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // Control
    Unreachable,
    Nop,
    Block {
        block_type: BlockType,
        body: Expression,
    },
    Loop {
        block_type: BlockType,
        body: Expression,
    },
    If {
        block_type: BlockType,
        then_branch: Expression,
        /// `Some` whenever an `else` opcode was present, even with an empty arm.
        else_branch: Option<Expression>,
    },
    Br {
        label_idx: u32,
    },
    BrIf {
        label_idx: u32,
    },
    BrTable {
        labels: Vec<u32>,
        default: u32,
    },
    Return,
    Call {
        func_idx: u32,
    },
    CallIndirect {
        type_idx: u32,
        table_idx: u32,
    },

    // Variable
    LocalGet {
        local_idx: u32,
    },
    LocalSet {
        local_idx: u32,
    },
    LocalTee {
        local_idx: u32,
    },
    GlobalGet {
        global_idx: u32,
    },
    GlobalSet {
        global_idx: u32,
    },

    // Memory
    I32Load {
        memarg: MemArg,
    },
    I32Store {
        memarg: MemArg,
    },

    // Numeric
    I32Const {
        value: i32,
    },
    I32Eqz,
    I32LtS,
    I32GeS,
    I32GeU,
    I32Add,
    I32RemS,
}

impl Instruction {
    /// Text-format mnemonic, e.g. `i32.add`.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Unreachable => "unreachable",
            Instruction::Nop => "nop",
            Instruction::Block { .. } => "block",
            Instruction::Loop { .. } => "loop",
            Instruction::If { .. } => "if",
            Instruction::Br { .. } => "br",
            Instruction::BrIf { .. } => "br_if",
            Instruction::BrTable { .. } => "br_table",
            Instruction::Return => "return",
            Instruction::Call { .. } => "call",
            Instruction::CallIndirect { .. } => "call_indirect",
            Instruction::LocalGet { .. } => "local.get",
            Instruction::LocalSet { .. } => "local.set",
            Instruction::LocalTee { .. } => "local.tee",
            Instruction::GlobalGet { .. } => "global.get",
            Instruction::GlobalSet { .. } => "global.set",
            Instruction::I32Load { .. } => "i32.load",
            Instruction::I32Store { .. } => "i32.store",
            Instruction::I32Const { .. } => "i32.const",
            Instruction::I32Eqz => "i32.eqz",
            Instruction::I32LtS => "i32.lt_s",
            Instruction::I32GeS => "i32.ge_s",
            Instruction::I32GeU => "i32.ge_u",
            Instruction::I32Add => "i32.add",
            Instruction::I32RemS => "i32.rem_s",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockType::Empty => Ok(()),
            BlockType::Value(t) => write!(f, " (result {t})"),
        }
    }
}

/// Renders the instruction head only; nested bodies are not printed.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())?;
        match self {
            Instruction::Block { block_type, .. }
            | Instruction::Loop { block_type, .. }
            | Instruction::If { block_type, .. } => write!(f, "{block_type}"),
            Instruction::Br { label_idx } | Instruction::BrIf { label_idx } => write!(f, " {label_idx}"),
            Instruction::BrTable { labels, default } => {
                for label in labels {
                    write!(f, " {label}")?;
                }
                write!(f, " {default}")
            }
            Instruction::Call { func_idx } => write!(f, " {func_idx}"),
            Instruction::CallIndirect { type_idx, table_idx } => {
                write!(f, " {table_idx} (type {type_idx})")
            }
            Instruction::LocalGet { local_idx }
            | Instruction::LocalSet { local_idx }
            | Instruction::LocalTee { local_idx } => write!(f, " {local_idx}"),
            Instruction::GlobalGet { global_idx } | Instruction::GlobalSet { global_idx } => {
                write!(f, " {global_idx}")
            }
            Instruction::I32Load { memarg } | Instruction::I32Store { memarg } => {
                if memarg.offset != 0 {
                    write!(f, " offset={}", memarg.offset)?;
                }
                write!(f, " align={}", 1u64 << memarg.align.min(63))
            }
            Instruction::I32Const { value } => write!(f, " {value}"),
            _ => Ok(()),
        }
    }
}
