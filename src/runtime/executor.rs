//! Instruction tree interpreter
//!
//! A function body is compiled once into a flat arena of [`Node`]s. Every node
//! records its parent (the enclosing `block`, `loop` or `if`) and its
//! fall-through successor, which is the next sibling or, at the end of a
//! nested sequence, the successor of the parent. Execution is a trampoline:
//! each step returns the id of the node to run next, and `None` ends the call.
//!
//! Branches walk the parent chain. Label 0 is the innermost enclosing
//! structured instruction; branching to a `block` or `if` continues after it,
//! branching to a `loop` restarts its body. The operand stack height is not
//! unwound on branches.

use super::frame::Frame;
use super::ops;
use super::store::{FunctionInstance, Store};
use super::{RuntimeError, Value};
use crate::parser::instruction::{Expression, Instruction, MemArg};
use crate::parser::module::{FunctionType, ValueType};

pub type NodeId = usize;

/// Executable form of an [`Instruction`]. Nested sequences are replaced by
/// the id of their first node (`None` when empty).
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Unreachable,
    Nop,
    Block { first: Option<NodeId> },
    Loop { first: Option<NodeId> },
    If { then_first: Option<NodeId>, else_first: Option<NodeId> },
    Br(u32),
    BrIf(u32),
    BrTable { labels: Vec<u32>, default: u32 },
    Return,
    Call(u32),
    CallIndirect { type_idx: u32, table_idx: u32 },
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),
    I32Load(MemArg),
    I32Store(MemArg),
    I32Const(i32),
    I32Eqz,
    I32LtS,
    I32GeS,
    I32GeU,
    I32Add,
    I32RemS,
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Unreachable => "unreachable",
            Op::Nop => "nop",
            Op::Block { .. } => "block",
            Op::Loop { .. } => "loop",
            Op::If { .. } => "if",
            Op::Br(_) => "br",
            Op::BrIf(_) => "br_if",
            Op::BrTable { .. } => "br_table",
            Op::Return => "return",
            Op::Call(_) => "call",
            Op::CallIndirect { .. } => "call_indirect",
            Op::LocalGet(_) => "local.get",
            Op::LocalSet(_) => "local.set",
            Op::LocalTee(_) => "local.tee",
            Op::GlobalGet(_) => "global.get",
            Op::GlobalSet(_) => "global.set",
            Op::I32Load(_) => "i32.load",
            Op::I32Store(_) => "i32.store",
            Op::I32Const(_) => "i32.const",
            Op::I32Eqz => "i32.eqz",
            Op::I32LtS => "i32.lt_s",
            Op::I32GeS => "i32.ge_s",
            Op::I32GeU => "i32.ge_u",
            Op::I32Add => "i32.add",
            Op::I32RemS => "i32.rem_s",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    pub parent: Option<NodeId>,
    pub next: Option<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledBody {
    nodes: Vec<Node>,
    entry: Option<NodeId>,
}

/// Where the id of a compiled sequence's first node is recorded.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Entry,
    Body(NodeId),
    Else(NodeId),
}

/// A nested sequence waiting to be laid out.
struct Pending<'a> {
    expr: &'a Expression,
    parent: Option<NodeId>,
    after: Option<NodeId>,
    slot: Slot,
}

impl CompiledBody {
    /// Compiles `expr` without recursing on its nesting: sequences are laid
    /// out from a worklist, depth first, and linked to their owner afterwards.
    pub fn compile(expr: &Expression) -> Self {
        let mut body = CompiledBody::default();
        let mut pending = vec![Pending {
            expr,
            parent: None,
            after: None,
            slot: Slot::Entry,
        }];
        while let Some(seq) = pending.pop() {
            let first = body.compile_sequence(&seq, &mut pending);
            body.link(seq.slot, first);
        }
        body
    }

    pub fn entry(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Lays out one sequence and queues its nested sequences. `seq.after` is
    /// where control goes once the sequence falls off its end.
    fn compile_sequence<'a>(&mut self, seq: &Pending<'a>, pending: &mut Vec<Pending<'a>>) -> Option<NodeId> {
        let expr: &'a Expression = seq.expr;
        let start = self.nodes.len();
        let count = expr.instructions.len();
        let mut nested = Vec::new();

        for (i, instruction) in expr.instructions.iter().enumerate() {
            let id = start + i;
            let next = if i + 1 < count { Some(id + 1) } else { seq.after };
            let mut queue = |expr: &'a Expression, slot: Slot| {
                nested.push(Pending {
                    expr,
                    parent: Some(id),
                    after: next,
                    slot,
                })
            };
            let op = match instruction {
                Instruction::Unreachable => Op::Unreachable,
                Instruction::Nop => Op::Nop,
                Instruction::Block { body, .. } => {
                    queue(body, Slot::Body(id));
                    Op::Block { first: None }
                }
                Instruction::Loop { body, .. } => {
                    queue(body, Slot::Body(id));
                    Op::Loop { first: None }
                }
                Instruction::If {
                    then_branch,
                    else_branch,
                    ..
                } => {
                    queue(then_branch, Slot::Body(id));
                    if let Some(else_branch) = else_branch {
                        queue(else_branch, Slot::Else(id));
                    }
                    Op::If {
                        then_first: None,
                        else_first: None,
                    }
                }
                Instruction::Br { label_idx } => Op::Br(*label_idx),
                Instruction::BrIf { label_idx } => Op::BrIf(*label_idx),
                Instruction::BrTable { labels, default } => Op::BrTable {
                    labels: labels.clone(),
                    default: *default,
                },
                Instruction::Return => Op::Return,
                Instruction::Call { func_idx } => Op::Call(*func_idx),
                Instruction::CallIndirect { type_idx, table_idx } => Op::CallIndirect {
                    type_idx: *type_idx,
                    table_idx: *table_idx,
                },
                Instruction::LocalGet { local_idx } => Op::LocalGet(*local_idx),
                Instruction::LocalSet { local_idx } => Op::LocalSet(*local_idx),
                Instruction::LocalTee { local_idx } => Op::LocalTee(*local_idx),
                Instruction::GlobalGet { global_idx } => Op::GlobalGet(*global_idx),
                Instruction::GlobalSet { global_idx } => Op::GlobalSet(*global_idx),
                Instruction::I32Load { memarg } => Op::I32Load(*memarg),
                Instruction::I32Store { memarg } => Op::I32Store(*memarg),
                Instruction::I32Const { value } => Op::I32Const(*value),
                Instruction::I32Eqz => Op::I32Eqz,
                Instruction::I32LtS => Op::I32LtS,
                Instruction::I32GeS => Op::I32GeS,
                Instruction::I32GeU => Op::I32GeU,
                Instruction::I32Add => Op::I32Add,
                Instruction::I32RemS => Op::I32RemS,
            };
            self.nodes.push(Node {
                op,
                parent: seq.parent,
                next,
            });
        }

        // reversed so the first nested sequence is popped first
        pending.extend(nested.into_iter().rev());

        if count > 0 {
            Some(start)
        } else {
            None
        }
    }

    fn link(&mut self, slot: Slot, first: Option<NodeId>) {
        match slot {
            Slot::Entry => self.entry = first,
            Slot::Body(id) => match &mut self.nodes[id].op {
                Op::Block { first: target } | Op::Loop { first: target } => *target = first,
                Op::If { then_first, .. } => *then_first = first,
                _ => {}
            },
            Slot::Else(id) => {
                if let Op::If { else_first, .. } = &mut self.nodes[id].op {
                    *else_first = first;
                }
            }
        }
    }

    /// Where `br label` taken at `from` resumes.
    pub fn branch_target(&self, from: NodeId, label: u32) -> Result<Option<NodeId>, RuntimeError> {
        let mut depth = label;
        let mut ancestor = self.nodes[from].parent;
        while let Some(id) = ancestor {
            let node = &self.nodes[id];
            if depth == 0 {
                return Ok(match node.op {
                    Op::Loop { first } => first,
                    _ => node.next,
                });
            }
            depth -= 1;
            ancestor = node.parent;
        }
        Err(RuntimeError::BranchResolution(label))
    }
}

// ============================================================================
// Calls
// ============================================================================

/// Invokes `func` with the signature `call_type`.
///
/// `call_type` is the function's own type for direct calls and exports, and
/// the call-site type for `call_indirect`. Parameters not covered by `args`
/// are taken from the operand stack; extra `args` are ignored. A declared
/// result is popped from the operand stack (wasm) or taken from the host
/// function's return value. Signatures with more than one result are refused
/// before anything is popped.
pub fn invoke(
    store: &mut Store,
    func: &FunctionInstance,
    call_type: &FunctionType,
    args: &[Value],
) -> Result<Option<Value>, RuntimeError> {
    if call_type.return_types.len() > 1 {
        log::warn!("{call_type}: multiple results are not supported");
        return Err(RuntimeError::UnsupportedFeature(format!("multi-value result {call_type}")));
    }
    let args = resolve_args(store, &call_type.parameters, args)?;

    match func {
        FunctionInstance::Wasm { locals, body, .. } => {
            log::trace!("call {call_type} depth {}", store.frames.len());
            store.push_frame(Frame::new(args, locals)?)?;
            let outcome = execute(store, body);
            store.pop_frame();
            outcome?;
            match call_type.result() {
                Some(result_type) => store.stack.pop_typed(result_type).map(Some),
                None => Ok(None),
            }
        }
        FunctionInstance::Host { func, .. } => {
            log::trace!("call host {call_type}");
            let frame = Frame::new(args, &[])?;
            let result = func(&frame.locals)?;
            match (call_type.result(), result) {
                (None, _) => Ok(None),
                (Some(expected), Some(value)) if value.typ() == expected => Ok(Some(value)),
                (Some(expected), other) => Err(RuntimeError::TypeMismatch {
                    expected: expected.to_string(),
                    actual: other.map_or("no value".to_string(), |v| v.typ().to_string()),
                }),
            }
        }
    }
}

/// Builds the parameter list: explicit arguments first, then the shortfall
/// popped off the operand stack so that older stack values fill earlier
/// parameters.
fn resolve_args(store: &mut Store, params: &[ValueType], explicit: &[Value]) -> Result<Vec<Value>, RuntimeError> {
    let given = explicit.len().min(params.len());
    let mut args: Vec<Value> = explicit[..given].to_vec();

    let mut pulled = Vec::with_capacity(params.len() - given);
    for value_type in params[given..].iter().rev() {
        pulled.push(store.stack.pop_typed(*value_type)?);
    }
    args.extend(pulled.into_iter().rev());

    for (value, expected) in args.iter().zip(params) {
        if value.typ() != *expected {
            return Err(RuntimeError::TypeMismatch {
                expected: expected.to_string(),
                actual: value.typ().to_string(),
            });
        }
    }
    Ok(args)
}

fn call(store: &mut Store, func: &FunctionInstance, call_type: &FunctionType) -> Result<(), RuntimeError> {
    if let Some(value) = invoke(store, func, call_type, &[])? {
        store.stack.push(value)?;
    }
    Ok(())
}

// ============================================================================
// Execution
// ============================================================================

/// Runs `body` against the innermost frame of `store` until it returns or
/// falls off its end.
pub fn execute(store: &mut Store, body: &CompiledBody) -> Result<(), RuntimeError> {
    let mut cursor = body.entry;
    while let Some(id) = cursor {
        store.consume_step()?;
        cursor = step(store, body, id)?;
    }
    Ok(())
}

/// Evaluates a constant expression such as a global initializer or a segment
/// offset, returning its single result.
pub fn evaluate(store: &mut Store, expr: &Expression, result_type: ValueType) -> Result<Value, RuntimeError> {
    let body = CompiledBody::compile(expr);
    store.push_frame(Frame::default())?;
    let outcome = execute(store, &body);
    store.pop_frame();
    outcome?;
    store.stack.pop_typed(result_type)
}

fn current_frame(frames: &mut [Frame]) -> Result<&mut Frame, RuntimeError> {
    frames
        .last_mut()
        .ok_or(RuntimeError::InvalidIndex { kind: "frame", index: 0 })
}

fn step(store: &mut Store, body: &CompiledBody, id: NodeId) -> Result<Option<NodeId>, RuntimeError> {
    let node = &body.nodes[id];
    let next = node.next;
    log::trace!("invoke {}", node.op.name());

    match &node.op {
        Op::Unreachable => return Err(RuntimeError::Unreachable),
        Op::Nop => {}
        Op::Block { first } | Op::Loop { first } => return Ok(first.or(next)),
        Op::If { then_first, else_first } => {
            let taken = if ops::control::pop_condition(&mut store.stack)? {
                then_first
            } else {
                else_first
            };
            return Ok(taken.or(next));
        }
        Op::Br(label) => return body.branch_target(id, *label),
        Op::BrIf(label) => {
            if ops::control::pop_condition(&mut store.stack)? {
                return body.branch_target(id, *label);
            }
        }
        Op::BrTable { labels, default } => {
            let label = ops::control::br_table_label(&mut store.stack, labels, *default)?;
            return body.branch_target(id, label);
        }
        Op::Return => return Ok(None),
        Op::Call(func_idx) => {
            let func = store.function(*func_idx)?;
            let func_type = func.func_type().clone();
            call(store, &func, &func_type)?;
        }
        Op::CallIndirect { type_idx, table_idx } => {
            let call_type = store.func_type(*type_idx)?.clone();
            let table = store.table(*table_idx)?;
            let elem_idx = store.stack.pop_i32()? as u32;
            let func = table.borrow().get(elem_idx)?;
            call(store, &func, &call_type)?;
        }
        Op::LocalGet(idx) => {
            let frame = current_frame(&mut store.frames)?;
            ops::variable::local_get(&mut store.stack, frame, *idx)?;
        }
        Op::LocalSet(idx) => {
            let frame = current_frame(&mut store.frames)?;
            ops::variable::local_set(&mut store.stack, frame, *idx)?;
        }
        Op::LocalTee(idx) => {
            let frame = current_frame(&mut store.frames)?;
            ops::variable::local_tee(&mut store.stack, frame, *idx)?;
        }
        Op::GlobalGet(idx) => {
            let global = store.global(*idx)?;
            ops::variable::global_get(&mut store.stack, &global)?;
        }
        Op::GlobalSet(idx) => {
            let global = store.global(*idx)?;
            ops::variable::global_set(&mut store.stack, &global, *idx)?;
        }
        Op::I32Load(memarg) => {
            let memory = store.memory(0)?;
            let memory = memory.borrow();
            ops::memory::i32_load(&mut store.stack, &memory, memarg)?;
        }
        Op::I32Store(memarg) => {
            let memory = store.memory(0)?;
            let mut memory = memory.borrow_mut();
            ops::memory::i32_store(&mut store.stack, &mut memory, memarg)?;
        }
        Op::I32Const(value) => ops::numeric::i32_const(&mut store.stack, *value)?,
        Op::I32Eqz => ops::numeric::i32_eqz(&mut store.stack)?,
        Op::I32LtS => ops::numeric::i32_lt_s(&mut store.stack)?,
        Op::I32GeS => ops::numeric::i32_ge_s(&mut store.stack)?,
        Op::I32GeU => ops::numeric::i32_ge_u(&mut store.stack)?,
        Op::I32Add => ops::numeric::i32_add(&mut store.stack)?,
        Op::I32RemS => ops::numeric::i32_rem_s(&mut store.stack)?,
    }
    Ok(next)
}
