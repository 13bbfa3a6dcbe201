//! Encodes a [`Module`] back to the WebAssembly binary format.
//!
//! This is the inverse of [`crate::parser::parse`]. Sections are written in
//! the order they are stored on the module, each as:
//!
//! ```text
//! section_id: u8 | byte_length: vu32 | contents: byte*
//! ```
//!
//! The body of every section is first serialized into its own [`Buffer`] so
//! that its length is known before it is appended. Custom sections are not
//! encodable and fail with [`EncodeError::Unsupported`].
//!
//! # Example
//!
//! ```
//! use wasmtree::parser::Module;
//!
//! let bytes = b"\0asm\x01\0\0\0\x08\x01\x00".to_vec();
//! let module = Module::decode(&bytes).unwrap();
//! assert_eq!(wasmtree::encoder::encode(&module).unwrap(), bytes);
//! ```
use std::fmt;

use crate::parser::buffer::{Buffer, ByteCursor};
use crate::parser::encoding::{
    DATA_ACTIVE, DATA_ACTIVE_EXPLICIT, DATA_PASSIVE, DESC_FUNC, DESC_GLOBAL, DESC_MEMORY, DESC_TABLE, ELEMKIND_FUNCREF,
    LIMITS_MIN, LIMITS_MIN_MAX, MUT_CONST, MUT_VAR, TYPE_FUNC,
};
use crate::parser::module::{
    Code, Data, DataMode, Element, ElementItems, ElementMode, Export, ExportDesc, FunctionType, Global, GlobalType,
    Import, ImportDesc, Limits, Module, Section, TableType,
};

// ===========================================================================
// Error type
// ===========================================================================

/// Errors that can occur during binary encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The section or entity has no binary writer.
    Unsupported(String),
    /// Element segment has flags outside the valid range (0-7), or flags that
    /// disagree with its mode.
    InvalidElementFlags(u32),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::Unsupported(what) => write!(f, "encoding not supported: {what}"),
            EncodeError::InvalidElementFlags(flags) => {
                write!(f, "invalid element segment flags: {flags}")
            }
        }
    }
}

impl std::error::Error for EncodeError {}

// ===========================================================================
// Public API
// ===========================================================================

/// Encodes a module to a fresh byte vector.
pub fn encode(module: &Module) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Buffer::default();
    encode_module(&mut buf, module)?;
    Ok(buf.into_bytes())
}

/// Encodes a module at the cursor of `buf`. On error `buf` is left as it was.
pub fn encode_into(buf: &mut Buffer, module: &Module) -> Result<(), EncodeError> {
    let mut scratch = Buffer::default();
    encode_module(&mut scratch, module)?;
    buf.write_bytes(scratch.as_bytes());
    Ok(())
}

fn encode_module(buf: &mut Buffer, module: &Module) -> Result<(), EncodeError> {
    buf.write_bytes(&module.magic);
    buf.write_bytes(&module.version);

    for section in &module.sections {
        let mut contents = Buffer::default();
        match section {
            Section::Custom(custom) => {
                return Err(EncodeError::Unsupported(format!("custom section '{}'", custom.name)));
            }
            Section::Type(s) => contents.write_vec(&s.types, encode_function_type),
            Section::Import(s) => contents.write_vec(&s.imports, encode_import),
            Section::Function(s) => contents.write_vec(&s.type_indices, |b, idx| b.write_u32(*idx)),
            Section::Table(s) => contents.write_vec(&s.tables, encode_table_type),
            Section::Memory(s) => contents.write_vec(&s.memories, encode_limits),
            Section::Global(s) => contents.write_vec(&s.globals, encode_global),
            Section::Export(s) => contents.write_vec(&s.exports, encode_export),
            Section::Start(s) => contents.write_u32(s.function_index),
            Section::Element(s) => {
                for element in &s.elements {
                    check_element_flags(element)?;
                }
                contents.write_vec(&s.elements, encode_element);
            }
            Section::Code(s) => contents.write_vec(&s.codes, encode_code),
            Section::Data(s) => contents.write_vec(&s.data, encode_data),
            Section::DataCount(s) => contents.write_u32(s.count),
        }
        emit_section(buf, section.id(), &contents);
    }

    Ok(())
}

fn emit_section(buf: &mut Buffer, id: u8, contents: &Buffer) {
    buf.write_byte(id);
    buf.write_byte_vec(contents.as_bytes());
}

// ===========================================================================
// Entity encoders
// ===========================================================================

/// ```text
/// functype ::= 0x60 vec(valtype) vec(valtype)
/// ```
fn encode_function_type(buf: &mut Buffer, ft: &FunctionType) {
    buf.write_byte(TYPE_FUNC);
    buf.write_vec(&ft.parameters, |b, t| b.write_byte(t.to_byte()));
    buf.write_vec(&ft.return_types, |b, t| b.write_byte(t.to_byte()));
}

/// ```text
/// import     ::= module:name name:name importdesc
/// importdesc ::= 0x00 typeidx | 0x01 tabletype | 0x02 memtype | 0x03 globaltype
/// ```
fn encode_import(buf: &mut Buffer, import: &Import) {
    buf.write_name(&import.module);
    buf.write_name(&import.name);
    match &import.desc {
        ImportDesc::Function(type_idx) => {
            buf.write_byte(DESC_FUNC);
            buf.write_u32(*type_idx);
        }
        ImportDesc::Table(table_type) => {
            buf.write_byte(DESC_TABLE);
            encode_table_type(buf, table_type);
        }
        ImportDesc::Memory(limits) => {
            buf.write_byte(DESC_MEMORY);
            encode_limits(buf, limits);
        }
        ImportDesc::Global(global_type) => {
            buf.write_byte(DESC_GLOBAL);
            encode_global_type(buf, global_type);
        }
    }
}

fn encode_limits(buf: &mut Buffer, limits: &Limits) {
    match limits.max {
        None => {
            buf.write_byte(LIMITS_MIN);
            buf.write_u32(limits.min);
        }
        Some(max) => {
            buf.write_byte(LIMITS_MIN_MAX);
            buf.write_u32(limits.min);
            buf.write_u32(max);
        }
    }
}

fn encode_table_type(buf: &mut Buffer, table_type: &TableType) {
    buf.write_byte(table_type.ref_type.to_byte());
    encode_limits(buf, &table_type.limits);
}

fn encode_global_type(buf: &mut Buffer, global_type: &GlobalType) {
    buf.write_byte(global_type.value_type.to_byte());
    buf.write_byte(if global_type.mutable { MUT_VAR } else { MUT_CONST });
}

fn encode_global(buf: &mut Buffer, global: &Global) {
    encode_global_type(buf, &global.global_type);
    global.init.encode(buf);
}

fn encode_export(buf: &mut Buffer, export: &Export) {
    buf.write_name(&export.name);
    let (tag, index) = match export.desc {
        ExportDesc::Function(idx) => (DESC_FUNC, idx),
        ExportDesc::Table(idx) => (DESC_TABLE, idx),
        ExportDesc::Memory(idx) => (DESC_MEMORY, idx),
        ExportDesc::Global(idx) => (DESC_GLOBAL, idx),
    };
    buf.write_byte(tag);
    buf.write_u32(index);
}

/// The stored flags must agree with the segment's mode and item kind,
/// otherwise the written form could not be read back as the same segment.
fn check_element_flags(element: &Element) -> Result<(), EncodeError> {
    let flags = element.flags;
    let uses_exprs = flags & 0b100 != 0;
    let mode_ok = match &element.mode {
        ElementMode::Active { table_index, .. } => flags & 0b001 == 0 && (flags & 0b010 != 0 || *table_index == 0),
        ElementMode::Passive => flags & 0b011 == 0b001,
        ElementMode::Declarative => flags & 0b011 == 0b011,
    };
    let items_ok = matches!(
        (&element.items, uses_exprs),
        (ElementItems::Functions(_), false) | (ElementItems::Expressions(_), true)
    );
    if flags > 7 || !mode_ok || !items_ok {
        return Err(EncodeError::InvalidElementFlags(flags));
    }
    Ok(())
}

/// ```text
/// elem ::= flags:u32 [tableidx] [offset:expr] [elemkind | reftype] (vec(funcidx) | vec(expr))
/// ```
fn encode_element(buf: &mut Buffer, element: &Element) {
    let flags = element.flags;
    buf.write_u32(flags);

    if let ElementMode::Active { table_index, offset } = &element.mode {
        if flags & 0b010 != 0 {
            buf.write_u32(*table_index);
        }
        offset.encode(buf);
    }

    if flags & 0b011 != 0 {
        match element.items {
            ElementItems::Functions(_) => buf.write_byte(ELEMKIND_FUNCREF),
            ElementItems::Expressions(_) => buf.write_byte(element.ref_type.to_byte()),
        }
    }

    match &element.items {
        ElementItems::Functions(indices) => buf.write_vec(indices, |b, idx| b.write_u32(*idx)),
        ElementItems::Expressions(exprs) => buf.write_vec(exprs, |b, expr| expr.encode(b)),
    }
}

/// ```text
/// code ::= size:u32 vec(locals) expr
/// ```
fn encode_code(buf: &mut Buffer, code: &Code) {
    let mut body = Buffer::default();
    body.write_vec(&code.locals, |b, locals| {
        b.write_u32(locals.count);
        b.write_byte(locals.value_type.to_byte());
    });
    code.body.encode(&mut body);
    buf.write_byte_vec(body.as_bytes());
}

fn encode_data(buf: &mut Buffer, data: &Data) {
    match &data.mode {
        DataMode::Active { offset } => {
            buf.write_u32(DATA_ACTIVE);
            offset.encode(buf);
        }
        DataMode::Passive => buf.write_u32(DATA_PASSIVE),
        DataMode::ActiveExplicit { memory_index, offset } => {
            buf.write_u32(DATA_ACTIVE_EXPLICIT);
            buf.write_u32(*memory_index);
            offset.encode(buf);
        }
    }
    buf.write_byte_vec(&data.init);
}
