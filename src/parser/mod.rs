//! Binary module decoding.
//!
//! [`parse`] reads the preamble and then a positional list of sections. Each
//! section is sliced into its own [`Buffer`] from its declared size, so a
//! section decoder can never read past its own body.

pub mod buffer;
pub mod encoding;
pub mod error;
pub mod instruction;
pub mod module;

pub use buffer::{Buffer, ByteCursor};
pub use error::DecodeError;
pub use module::Module;

use encoding::*;
use instruction::Expression;
use module::*;

/// Decodes a module from the cursor position to the end of `buf`.
pub fn parse(buf: &mut Buffer) -> Result<Module, DecodeError> {
    let mut module = Module::new();
    read_header(buf, &mut module.magic, &mut module.version)?;
    log::debug!(
        "module magic = {} version = {}",
        hex::encode(module.magic),
        hex::encode(module.version)
    );

    while !buf.eof() {
        let id = buf.read_u8()?;
        let size = buf.read_u32()?;
        if buf.remaining() < size as usize {
            return Err(DecodeError::SectionTooShort {
                id,
                expected: size,
                actual: buf.remaining(),
            });
        }
        log::debug!("section #{id} len = {size}");

        let mut body = buf.sub_buffer(size as usize);
        let section = read_section(id, &mut body)?;
        if !body.eof() {
            return Err(DecodeError::TrailingBytes {
                id,
                remaining: body.remaining(),
            });
        }
        module.push(section);
    }

    Ok(module)
}

fn read_header(buf: &mut Buffer, magic: &mut [u8; 4], version: &mut [u8; 4]) -> Result<(), DecodeError> {
    let bytes = buf.read_exact(4)?;
    if bytes[..] != MAGIC[..] {
        return Err(DecodeError::InvalidMagic(hex::encode(&bytes)));
    }
    magic.copy_from_slice(&bytes);
    version.copy_from_slice(&buf.read_exact(4)?);
    Ok(())
}

fn read_section(id: u8, body: &mut Buffer) -> Result<Section, DecodeError> {
    let section = match id {
        SECTION_CUSTOM => Section::Custom(read_section_custom(body)?),
        SECTION_TYPE => Section::Type(TypeSection {
            types: body.read_vec(read_function_type)?,
        }),
        SECTION_IMPORT => Section::Import(ImportSection {
            imports: body.read_vec(read_import)?,
        }),
        SECTION_FUNCTION => Section::Function(FunctionSection {
            type_indices: body.read_vec(|b| b.read_u32())?,
        }),
        SECTION_TABLE => Section::Table(TableSection {
            tables: body.read_vec(read_table_type)?,
        }),
        SECTION_MEMORY => Section::Memory(MemorySection {
            memories: body.read_vec(read_limits)?,
        }),
        SECTION_GLOBAL => Section::Global(GlobalSection {
            globals: body.read_vec(read_global)?,
        }),
        SECTION_EXPORT => Section::Export(ExportSection {
            exports: body.read_vec(read_export)?,
        }),
        SECTION_START => Section::Start(StartSection {
            function_index: body.read_u32()?,
        }),
        SECTION_ELEMENT => Section::Element(ElementSection {
            elements: body.read_vec(read_element)?,
        }),
        SECTION_CODE => Section::Code(CodeSection {
            codes: body.read_vec(read_code)?,
        }),
        SECTION_DATA => Section::Data(DataSection {
            data: body.read_vec(read_data)?,
        }),
        SECTION_DATA_COUNT => Section::DataCount(DataCountSection {
            count: body.read_u32()?,
        }),
        _ => return Err(DecodeError::InvalidSectionId(id)),
    };
    Ok(section)
}

// ---------------------------------------------------------------------------
// Section bodies
// ---------------------------------------------------------------------------

fn read_section_custom(body: &mut Buffer) -> Result<CustomSection, DecodeError> {
    let name = body.read_name()?;
    let bytes = body.read_bytes(body.remaining());
    Ok(CustomSection { name, bytes })
}

fn read_function_type(buf: &mut Buffer) -> Result<FunctionType, DecodeError> {
    let tag = buf.read_u8()?;
    if tag != TYPE_FUNC {
        return Err(DecodeError::InvalidFuncTypeTag(tag));
    }
    let parameters = buf.read_vec(read_value_type)?;
    let return_types = buf.read_vec(read_value_type)?;
    Ok(FunctionType {
        parameters,
        return_types,
    })
}

fn read_value_type(buf: &mut Buffer) -> Result<ValueType, DecodeError> {
    ValueType::from_byte(buf.read_u8()?)
}

fn read_import(buf: &mut Buffer) -> Result<Import, DecodeError> {
    let module = buf.read_name()?;
    let name = buf.read_name()?;
    let desc = match buf.read_u8()? {
        DESC_FUNC => ImportDesc::Function(buf.read_u32()?),
        DESC_TABLE => ImportDesc::Table(read_table_type(buf)?),
        DESC_MEMORY => ImportDesc::Memory(read_limits(buf)?),
        DESC_GLOBAL => ImportDesc::Global(read_global_type(buf)?),
        tag => return Err(DecodeError::InvalidImportKind(tag)),
    };
    Ok(Import { module, name, desc })
}

fn read_limits(buf: &mut Buffer) -> Result<Limits, DecodeError> {
    match buf.read_u8()? {
        LIMITS_MIN => Ok(Limits {
            min: buf.read_u32()?,
            max: None,
        }),
        LIMITS_MIN_MAX => {
            let min = buf.read_u32()?;
            let max = buf.read_u32()?;
            Ok(Limits { min, max: Some(max) })
        }
        tag => Err(DecodeError::InvalidLimits(tag)),
    }
}

fn read_table_type(buf: &mut Buffer) -> Result<TableType, DecodeError> {
    let ref_type = RefType::from_byte(buf.read_u8()?)?;
    let limits = read_limits(buf)?;
    Ok(TableType { ref_type, limits })
}

fn read_global_type(buf: &mut Buffer) -> Result<GlobalType, DecodeError> {
    let value_type = read_value_type(buf)?;
    let mutable = match buf.read_u8()? {
        MUT_CONST => false,
        MUT_VAR => true,
        byte => return Err(DecodeError::InvalidMutability(byte)),
    };
    Ok(GlobalType { value_type, mutable })
}

fn read_global(buf: &mut Buffer) -> Result<Global, DecodeError> {
    let global_type = read_global_type(buf)?;
    let init = Expression::decode(buf)?;
    Ok(Global { global_type, init })
}

fn read_export(buf: &mut Buffer) -> Result<Export, DecodeError> {
    let name = buf.read_name()?;
    let tag = buf.read_u8()?;
    let index = buf.read_u32()?;
    let desc = match tag {
        DESC_FUNC => ExportDesc::Function(index),
        DESC_TABLE => ExportDesc::Table(index),
        DESC_MEMORY => ExportDesc::Memory(index),
        DESC_GLOBAL => ExportDesc::Global(index),
        _ => return Err(DecodeError::InvalidExportKind(tag)),
    };
    Ok(Export { name, desc })
}

/// Element segments in all eight flag forms.
///
/// ```text
/// 0: expr vec(funcidx)                      4: expr vec(expr)
/// 1: elemkind vec(funcidx)                  5: reftype vec(expr)
/// 2: tableidx expr elemkind vec(funcidx)    6: tableidx expr reftype vec(expr)
/// 3: elemkind vec(funcidx)                  7: reftype vec(expr)
/// ```
fn read_element(buf: &mut Buffer) -> Result<Element, DecodeError> {
    let flags = buf.read_u32()?;
    if flags > ELEM_DECLARATIVE_EXPRS {
        return Err(DecodeError::InvalidElementFlags(flags));
    }
    let uses_exprs = flags & 0b100 != 0;

    let mode = if flags & 0b001 == 0 {
        let table_index = if flags & 0b010 != 0 { buf.read_u32()? } else { 0 };
        let offset = Expression::decode(buf)?;
        ElementMode::Active { table_index, offset }
    } else if flags & 0b010 != 0 {
        ElementMode::Declarative
    } else {
        ElementMode::Passive
    };

    // forms 0 and 4 leave the kind implicit
    let has_kind = flags & 0b011 != 0;
    let ref_type = match (has_kind, uses_exprs) {
        (false, _) => RefType::FuncRef,
        (true, false) => match buf.read_u8()? {
            ELEMKIND_FUNCREF => RefType::FuncRef,
            kind => return Err(DecodeError::InvalidElementKind(kind)),
        },
        (true, true) => RefType::from_byte(buf.read_u8()?)?,
    };

    let items = if uses_exprs {
        ElementItems::Expressions(buf.read_vec(|b| Expression::decode(b))?)
    } else {
        ElementItems::Functions(buf.read_vec(|b| b.read_u32())?)
    };

    Ok(Element {
        flags,
        mode,
        ref_type,
        items,
    })
}

fn read_code(buf: &mut Buffer) -> Result<Code, DecodeError> {
    let size = buf.read_u32()? as usize;
    if buf.remaining() < size {
        return Err(DecodeError::UnexpectedEof);
    }
    let mut body = buf.sub_buffer(size);
    let locals = body.read_vec(|b| {
        let count = b.read_u32()?;
        let value_type = read_value_type(b)?;
        Ok(Locals { count, value_type })
    })?;
    let expr = Expression::decode(&mut body)?;
    if !body.eof() {
        return Err(DecodeError::TrailingBytes {
            id: SECTION_CODE,
            remaining: body.remaining(),
        });
    }
    Ok(Code { locals, body: expr })
}

fn read_data(buf: &mut Buffer) -> Result<Data, DecodeError> {
    let mode = match buf.read_u32()? {
        DATA_ACTIVE => DataMode::Active {
            offset: Expression::decode(buf)?,
        },
        DATA_PASSIVE => DataMode::Passive,
        DATA_ACTIVE_EXPLICIT => {
            let memory_index = buf.read_u32()?;
            let offset = Expression::decode(buf)?;
            DataMode::ActiveExplicit { memory_index, offset }
        }
        flags => return Err(DecodeError::InvalidDataFlags(flags)),
    };
    let init = buf.read_byte_vec()?;
    Ok(Data { mode, init })
}
