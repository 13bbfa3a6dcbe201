//! Instruction encoding to binary format

use super::{BlockType, Expression, Instruction, MemArg};
use crate::parser::buffer::ByteCursor;
use crate::parser::encoding::*;

impl Instruction {
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::Unreachable => OP_UNREACHABLE,
            Instruction::Nop => OP_NOP,
            Instruction::Block { .. } => OP_BLOCK,
            Instruction::Loop { .. } => OP_LOOP,
            Instruction::If { .. } => OP_IF,
            Instruction::Br { .. } => OP_BR,
            Instruction::BrIf { .. } => OP_BR_IF,
            Instruction::BrTable { .. } => OP_BR_TABLE,
            Instruction::Return => OP_RETURN,
            Instruction::Call { .. } => OP_CALL,
            Instruction::CallIndirect { .. } => OP_CALL_INDIRECT,
            Instruction::LocalGet { .. } => OP_LOCAL_GET,
            Instruction::LocalSet { .. } => OP_LOCAL_SET,
            Instruction::LocalTee { .. } => OP_LOCAL_TEE,
            Instruction::GlobalGet { .. } => OP_GLOBAL_GET,
            Instruction::GlobalSet { .. } => OP_GLOBAL_SET,
            Instruction::I32Load { .. } => OP_I32_LOAD,
            Instruction::I32Store { .. } => OP_I32_STORE,
            Instruction::I32Const { .. } => OP_I32_CONST,
            Instruction::I32Eqz => OP_I32_EQZ,
            Instruction::I32LtS => OP_I32_LT_S,
            Instruction::I32GeS => OP_I32_GE_S,
            Instruction::I32GeU => OP_I32_GE_U,
            Instruction::I32Add => OP_I32_ADD,
            Instruction::I32RemS => OP_I32_REM_S,
        }
    }

    /// Writes the opcode, its immediates and any nested sequences.
    pub fn encode<C: ByteCursor>(&self, cursor: &mut C) {
        cursor.write_byte(self.opcode());
        match self {
            Instruction::Block { block_type, body } | Instruction::Loop { block_type, body } => {
                block_type.encode(cursor);
                body.encode(cursor);
            }
            Instruction::If {
                block_type,
                then_branch,
                else_branch,
            } => {
                block_type.encode(cursor);
                then_branch.encode_instructions(cursor);
                if let Some(else_branch) = else_branch {
                    cursor.write_byte(OP_ELSE);
                    else_branch.encode_instructions(cursor);
                }
                cursor.write_byte(OP_END);
            }
            Instruction::Br { label_idx } | Instruction::BrIf { label_idx } => cursor.write_u32(*label_idx),
            Instruction::BrTable { labels, default } => {
                cursor.write_vec(labels, |c, label| c.write_u32(*label));
                cursor.write_u32(*default);
            }
            Instruction::Call { func_idx } => cursor.write_u32(*func_idx),
            Instruction::CallIndirect { type_idx, table_idx } => {
                cursor.write_u32(*type_idx);
                cursor.write_u32(*table_idx);
            }
            Instruction::LocalGet { local_idx }
            | Instruction::LocalSet { local_idx }
            | Instruction::LocalTee { local_idx } => cursor.write_u32(*local_idx),
            Instruction::GlobalGet { global_idx } | Instruction::GlobalSet { global_idx } => {
                cursor.write_u32(*global_idx)
            }
            Instruction::I32Load { memarg } | Instruction::I32Store { memarg } => memarg.encode(cursor),
            Instruction::I32Const { value } => cursor.write_s32(*value),
            Instruction::Unreachable
            | Instruction::Nop
            | Instruction::Return
            | Instruction::I32Eqz
            | Instruction::I32LtS
            | Instruction::I32GeS
            | Instruction::I32GeU
            | Instruction::I32Add
            | Instruction::I32RemS => {}
        }
    }
}

impl Expression {
    /// Writes the instructions followed by `end`.
    pub fn encode<C: ByteCursor>(&self, cursor: &mut C) {
        self.encode_instructions(cursor);
        cursor.write_byte(OP_END);
    }

    fn encode_instructions<C: ByteCursor>(&self, cursor: &mut C) {
        for instruction in &self.instructions {
            instruction.encode(cursor);
        }
    }
}

impl BlockType {
    pub fn encode<C: ByteCursor>(&self, cursor: &mut C) {
        match self {
            BlockType::Empty => cursor.write_byte(BLOCK_TYPE_EMPTY),
            BlockType::Value(value_type) => cursor.write_byte(value_type.to_byte()),
        }
    }
}

impl MemArg {
    pub fn encode<C: ByteCursor>(&self, cursor: &mut C) {
        cursor.write_u32(self.align);
        cursor.write_u32(self.offset);
    }
}
