//! Instruction decoding from binary format

use super::{BlockType, Expression, Instruction, MemArg};
use crate::parser::buffer::ByteCursor;
use crate::parser::encoding::*;
use crate::parser::error::DecodeError;
use crate::parser::module::ValueType;

impl MemArg {
    pub fn decode<C: ByteCursor>(cursor: &mut C) -> Result<Self, DecodeError> {
        let align = cursor.read_u32()?;
        let offset = cursor.read_u32()?;
        Ok(MemArg { align, offset })
    }
}

impl BlockType {
    pub fn decode<C: ByteCursor>(cursor: &mut C) -> Result<Self, DecodeError> {
        let byte = cursor.read_u8()?;
        if byte == BLOCK_TYPE_EMPTY {
            return Ok(BlockType::Empty);
        }
        ValueType::from_byte(byte)
            .map(BlockType::Value)
            .map_err(|_| DecodeError::InvalidBlockType(byte))
    }
}

/// Opcode that closed a decoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    End,
    Else,
}

impl Expression {
    /// Decodes instructions up to and including the closing `end`.
    pub fn decode<C: ByteCursor>(cursor: &mut C) -> Result<Self, DecodeError> {
        decode_body(cursor, 0)
    }
}

fn decode_body<C: ByteCursor>(cursor: &mut C, depth: usize) -> Result<Expression, DecodeError> {
    match decode_nested(cursor, depth)? {
        (expr, Terminator::End) => Ok(expr),
        (_, Terminator::Else) => Err(DecodeError::UnexpectedElse),
    }
}

/// Decodes instructions until `end` or `else`, consuming the terminator.
///
/// Running out of bytes before a terminator is an error; an expression is
/// never implicitly closed by the end of its section.
pub fn decode_sequence<C: ByteCursor>(cursor: &mut C) -> Result<(Expression, Terminator), DecodeError> {
    decode_nested(cursor, 0)
}

/// `depth` counts the structured instructions enclosing this sequence.
fn decode_nested<C: ByteCursor>(cursor: &mut C, depth: usize) -> Result<(Expression, Terminator), DecodeError> {
    let mut instructions = Vec::new();
    loop {
        let opcode = cursor.read_u8()?;
        match opcode {
            OP_END => return Ok((Expression::new(instructions), Terminator::End)),
            OP_ELSE => return Ok((Expression::new(instructions), Terminator::Else)),
            _ => instructions.push(Instruction::decode_at(opcode, cursor, depth)?),
        }
    }
}

impl Instruction {
    /// Decodes the immediates of `opcode`, recursing into nested sequences
    /// for structured instructions.
    pub fn decode<C: ByteCursor>(opcode: u8, cursor: &mut C) -> Result<Self, DecodeError> {
        Self::decode_at(opcode, cursor, 0)
    }

    fn decode_at<C: ByteCursor>(opcode: u8, cursor: &mut C, depth: usize) -> Result<Self, DecodeError> {
        if matches!(opcode, OP_BLOCK | OP_LOOP | OP_IF) && depth >= MAX_NESTING_DEPTH {
            return Err(DecodeError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        let inner = depth + 1;
        let instruction = match opcode {
            OP_UNREACHABLE => Instruction::Unreachable,
            OP_NOP => Instruction::Nop,
            OP_BLOCK => Instruction::Block {
                block_type: BlockType::decode(cursor)?,
                body: decode_body(cursor, inner)?,
            },
            OP_LOOP => Instruction::Loop {
                block_type: BlockType::decode(cursor)?,
                body: decode_body(cursor, inner)?,
            },
            OP_IF => {
                let block_type = BlockType::decode(cursor)?;
                let (then_branch, terminator) = decode_nested(cursor, inner)?;
                let else_branch = match terminator {
                    Terminator::End => None,
                    Terminator::Else => Some(decode_body(cursor, inner)?),
                };
                Instruction::If {
                    block_type,
                    then_branch,
                    else_branch,
                }
            }
            OP_BR => Instruction::Br {
                label_idx: cursor.read_u32()?,
            },
            OP_BR_IF => Instruction::BrIf {
                label_idx: cursor.read_u32()?,
            },
            OP_BR_TABLE => {
                let labels = cursor.read_vec(|c| c.read_u32())?;
                let default = cursor.read_u32()?;
                Instruction::BrTable { labels, default }
            }
            OP_RETURN => Instruction::Return,
            OP_CALL => Instruction::Call {
                func_idx: cursor.read_u32()?,
            },
            OP_CALL_INDIRECT => {
                let type_idx = cursor.read_u32()?;
                let table_idx = cursor.read_u32()?;
                Instruction::CallIndirect { type_idx, table_idx }
            }
            OP_LOCAL_GET => Instruction::LocalGet {
                local_idx: cursor.read_u32()?,
            },
            OP_LOCAL_SET => Instruction::LocalSet {
                local_idx: cursor.read_u32()?,
            },
            OP_LOCAL_TEE => Instruction::LocalTee {
                local_idx: cursor.read_u32()?,
            },
            OP_GLOBAL_GET => Instruction::GlobalGet {
                global_idx: cursor.read_u32()?,
            },
            OP_GLOBAL_SET => Instruction::GlobalSet {
                global_idx: cursor.read_u32()?,
            },
            OP_I32_LOAD => Instruction::I32Load {
                memarg: MemArg::decode(cursor)?,
            },
            OP_I32_STORE => Instruction::I32Store {
                memarg: MemArg::decode(cursor)?,
            },
            OP_I32_CONST => Instruction::I32Const {
                value: cursor.read_s32()?,
            },
            OP_I32_EQZ => Instruction::I32Eqz,
            OP_I32_LT_S => Instruction::I32LtS,
            OP_I32_GE_S => Instruction::I32GeS,
            OP_I32_GE_U => Instruction::I32GeU,
            OP_I32_ADD => Instruction::I32Add,
            OP_I32_REM_S => Instruction::I32RemS,
            _ => return Err(DecodeError::InvalidOpcode(opcode)),
        };
        Ok(instruction)
    }
}
