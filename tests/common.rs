//! Common test utilities shared between integration tests
//!
//! [`WasmBuilder`] assembles module bytes by hand, one section at a time, so
//! that decoder and runtime tests do not depend on the encoder.

#![allow(dead_code)]

use wasmtree::parser::encoding::{write_vs32, write_vu32};

pub const I32: u8 = 0x7f;
pub const I64: u8 = 0x7e;
pub const FUNCREF: u8 = 0x70;

pub fn leb_u32(value: u32) -> Vec<u8> {
    let mut out = Vec::new();
    write_vu32(&mut out, value);
    out
}

pub fn leb_s32(value: i32) -> Vec<u8> {
    let mut out = Vec::new();
    write_vs32(&mut out, value);
    out
}

pub fn name(s: &str) -> Vec<u8> {
    let mut out = leb_u32(s.len() as u32);
    out.extend_from_slice(s.as_bytes());
    out
}

/// `count` followed by the concatenated entries.
pub fn vector(entries: Vec<Vec<u8>>) -> Vec<u8> {
    let mut out = leb_u32(entries.len() as u32);
    for entry in entries {
        out.extend(entry);
    }
    out
}

// ===========================================================================
// Instruction bytes
// ===========================================================================

pub fn i32_const(value: i32) -> Vec<u8> {
    let mut out = vec![0x41];
    out.extend(leb_s32(value));
    out
}

pub fn op_idx(opcode: u8, idx: u32) -> Vec<u8> {
    let mut out = vec![opcode];
    out.extend(leb_u32(idx));
    out
}

pub fn local_get(idx: u32) -> Vec<u8> {
    op_idx(0x20, idx)
}

pub fn local_tee(idx: u32) -> Vec<u8> {
    op_idx(0x22, idx)
}

pub fn global_get(idx: u32) -> Vec<u8> {
    op_idx(0x23, idx)
}

pub fn global_set(idx: u32) -> Vec<u8> {
    op_idx(0x24, idx)
}

pub fn call(idx: u32) -> Vec<u8> {
    op_idx(0x10, idx)
}

pub fn call_indirect(type_idx: u32, table_idx: u32) -> Vec<u8> {
    let mut out = op_idx(0x11, type_idx);
    out.extend(leb_u32(table_idx));
    out
}

pub fn br_if(label: u32) -> Vec<u8> {
    op_idx(0x0d, label)
}

pub fn i32_load(offset: u32) -> Vec<u8> {
    let mut out = vec![0x28, 0x02];
    out.extend(leb_u32(offset));
    out
}

pub fn i32_store(offset: u32) -> Vec<u8> {
    let mut out = vec![0x36, 0x02];
    out.extend(leb_u32(offset));
    out
}

pub const I32_EQZ: u8 = 0x45;
pub const I32_LT_S: u8 = 0x48;
pub const I32_GE_S: u8 = 0x4e;
pub const I32_GE_U: u8 = 0x4f;
pub const I32_ADD: u8 = 0x6a;
pub const I32_REM_S: u8 = 0x6f;
pub const BLOCK: u8 = 0x02;
pub const LOOP: u8 = 0x03;
pub const IF: u8 = 0x04;
pub const ELSE: u8 = 0x05;
pub const END: u8 = 0x0b;
pub const EMPTY: u8 = 0x40;
pub const RETURN: u8 = 0x0f;
pub const UNREACHABLE: u8 = 0x00;

/// Concatenates instruction fragments into a body.
pub fn body(parts: &[&[u8]]) -> Vec<u8> {
    parts.concat()
}

/// A constant expression terminated by `end`.
pub fn const_expr(value: i32) -> Vec<u8> {
    let mut out = i32_const(value);
    out.push(END);
    out
}

// ===========================================================================
// Module builder
// ===========================================================================

#[derive(Default)]
pub struct WasmBuilder {
    sections: Vec<(u8, Vec<u8>)>,
}

impl WasmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a raw section.
    pub fn section(mut self, id: u8, contents: Vec<u8>) -> Self {
        self.sections.push((id, contents));
        self
    }

    pub fn custom(self, section_name: &str, payload: &[u8]) -> Self {
        let mut contents = name(section_name);
        contents.extend_from_slice(payload);
        self.section(0, contents)
    }

    /// Function types as (params, results) value type bytes.
    pub fn types(self, types: &[(&[u8], &[u8])]) -> Self {
        let entries = types
            .iter()
            .map(|(params, results)| {
                let mut entry = vec![0x60];
                entry.extend(leb_u32(params.len() as u32));
                entry.extend_from_slice(params);
                entry.extend(leb_u32(results.len() as u32));
                entry.extend_from_slice(results);
                entry
            })
            .collect();
        self.section(1, vector(entries))
    }

    /// Imports as (module, name, descriptor bytes starting with the kind tag).
    pub fn imports(self, imports: &[(&str, &str, &[u8])]) -> Self {
        let entries = imports
            .iter()
            .map(|(module, field, desc)| {
                let mut entry = name(module);
                entry.extend(name(field));
                entry.extend_from_slice(desc);
                entry
            })
            .collect();
        self.section(2, vector(entries))
    }

    pub fn import_func(self, module: &str, field: &str, type_idx: u32) -> Self {
        let mut desc = vec![0x00];
        desc.extend(leb_u32(type_idx));
        self.imports(&[(module, field, &desc)])
    }

    pub fn functions(self, type_indices: &[u32]) -> Self {
        let entries = type_indices.iter().map(|t| leb_u32(*t)).collect();
        self.section(3, vector(entries))
    }

    pub fn table(self, min: u32) -> Self {
        let mut entry = vec![FUNCREF, 0x00];
        entry.extend(leb_u32(min));
        self.section(4, vector(vec![entry]))
    }

    pub fn memory(self, min: u32, max: Option<u32>) -> Self {
        let mut entry = Vec::new();
        match max {
            Some(max) => {
                entry.push(0x01);
                entry.extend(leb_u32(min));
                entry.extend(leb_u32(max));
            }
            None => {
                entry.push(0x00);
                entry.extend(leb_u32(min));
            }
        }
        self.section(5, vector(vec![entry]))
    }

    /// Globals as (value type, mutable, init value).
    pub fn globals(self, globals: &[(u8, bool, i32)]) -> Self {
        let entries = globals
            .iter()
            .map(|(value_type, mutable, init)| {
                let mut entry = vec![*value_type, u8::from(*mutable)];
                entry.extend(const_expr(*init));
                entry
            })
            .collect();
        self.section(6, vector(entries))
    }

    /// Exports as (name, kind, index).
    pub fn exports(self, exports: &[(&str, u8, u32)]) -> Self {
        let entries = exports
            .iter()
            .map(|(field, kind, idx)| {
                let mut entry = name(field);
                entry.push(*kind);
                entry.extend(leb_u32(*idx));
                entry
            })
            .collect();
        self.section(7, vector(entries))
    }

    pub fn export_func(self, field: &str, func_idx: u32) -> Self {
        self.exports(&[(field, 0x00, func_idx)])
    }

    pub fn start(self, func_idx: u32) -> Self {
        self.section(8, leb_u32(func_idx))
    }

    /// A form 0 element segment binding `funcs` from `offset` in table 0.
    pub fn elements(self, offset: i32, funcs: &[u32]) -> Self {
        let mut entry = vec![0x00];
        entry.extend(const_expr(offset));
        entry.extend(vector(funcs.iter().map(|f| leb_u32(*f)).collect()));
        self.section(9, vector(vec![entry]))
    }

    /// Function bodies as (locals as (count, type), instruction bytes without
    /// the final `end`).
    pub fn code(self, bodies: &[(&[(u32, u8)], Vec<u8>)]) -> Self {
        let entries = bodies
            .iter()
            .map(|(locals, instructions)| {
                let mut func = vector(
                    locals
                        .iter()
                        .map(|(count, value_type)| {
                            let mut group = leb_u32(*count);
                            group.push(*value_type);
                            group
                        })
                        .collect(),
                );
                func.extend_from_slice(instructions);
                func.push(END);
                let mut entry = leb_u32(func.len() as u32);
                entry.extend(func);
                entry
            })
            .collect();
        self.section(10, vector(entries))
    }

    /// A form 0 data segment copying `bytes` to `offset` in memory 0.
    pub fn data(self, offset: i32, bytes: &[u8]) -> Self {
        let mut entry = vec![0x00];
        entry.extend(const_expr(offset));
        entry.extend(leb_u32(bytes.len() as u32));
        entry.extend_from_slice(bytes);
        self.section(11, vector(vec![entry]))
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = b"\0asm".to_vec();
        out.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        for (id, contents) in self.sections {
            out.push(id);
            out.extend(leb_u32(contents.len() as u32));
            out.extend(contents);
        }
        out
    }
}
