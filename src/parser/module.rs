//! Decoded module representation.
//!
//! A [`Module`] keeps its sections in wire order exactly as they were read so
//! that encoding reproduces the input. Lookups such as
//! [`Module::type_section`] return the first section of a kind.

use super::buffer::Buffer;
use super::encoding::*;
use super::error::DecodeError;
use super::instruction::Expression;
use crate::encoder::{self, EncodeError};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub magic: [u8; 4],
    pub version: [u8; 4],
    pub sections: Vec<Section>,
}

impl Default for Module {
    fn default() -> Self {
        Module {
            magic: MAGIC,
            version: VERSION,
            sections: Vec::new(),
        }
    }
}

impl Module {
    pub fn new() -> Self {
        Module::default()
    }

    /// Decodes a complete module from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
        super::parse(&mut Buffer::from(bytes))
    }

    /// Decodes a module from the cursor position to the end of `buf`.
    pub fn load(buf: &mut Buffer) -> Result<Module, DecodeError> {
        super::parse(buf)
    }

    /// Serializes the module into `buf`.
    pub fn store(&self, buf: &mut Buffer) -> Result<(), EncodeError> {
        encoder::encode_into(buf, self)
    }

    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        encoder::encode(self)
    }

    pub fn push(&mut self, section: Section) {
        self.sections.push(section);
    }

    pub fn type_section(&self) -> Option<&TypeSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Type(s) => Some(s),
            _ => None,
        })
    }

    pub fn import_section(&self) -> Option<&ImportSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Import(s) => Some(s),
            _ => None,
        })
    }

    pub fn function_section(&self) -> Option<&FunctionSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Function(s) => Some(s),
            _ => None,
        })
    }

    pub fn table_section(&self) -> Option<&TableSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Table(s) => Some(s),
            _ => None,
        })
    }

    pub fn memory_section(&self) -> Option<&MemorySection> {
        self.sections.iter().find_map(|s| match s {
            Section::Memory(s) => Some(s),
            _ => None,
        })
    }

    pub fn global_section(&self) -> Option<&GlobalSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Global(s) => Some(s),
            _ => None,
        })
    }

    pub fn export_section(&self) -> Option<&ExportSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Export(s) => Some(s),
            _ => None,
        })
    }

    pub fn start_section(&self) -> Option<&StartSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Start(s) => Some(s),
            _ => None,
        })
    }

    pub fn element_section(&self) -> Option<&ElementSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Element(s) => Some(s),
            _ => None,
        })
    }

    pub fn code_section(&self) -> Option<&CodeSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Code(s) => Some(s),
            _ => None,
        })
    }

    pub fn data_section(&self) -> Option<&DataSection> {
        self.sections.iter().find_map(|s| match s {
            Section::Data(s) => Some(s),
            _ => None,
        })
    }

    pub fn data_count_section(&self) -> Option<&DataCountSection> {
        self.sections.iter().find_map(|s| match s {
            Section::DataCount(s) => Some(s),
            _ => None,
        })
    }

    /// All custom sections, in order.
    pub fn custom_sections(&self) -> impl Iterator<Item = &CustomSection> {
        self.sections.iter().filter_map(|s| match s {
            Section::Custom(s) => Some(s),
            _ => None,
        })
    }

    pub fn imported_function_count(&self) -> usize {
        self.import_section()
            .map(|s| {
                s.imports
                    .iter()
                    .filter(|i| matches!(i.desc, ImportDesc::Function(_)))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Signature of the function at `func_idx` in the combined index space
    /// (imported functions first, then defined functions).
    pub fn function_type(&self, func_idx: u32) -> Option<&FunctionType> {
        let types = &self.type_section()?.types;
        let imported = self
            .import_section()
            .map(|s| {
                s.imports
                    .iter()
                    .filter_map(|i| match i.desc {
                        ImportDesc::Function(type_idx) => Some(type_idx),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let idx = func_idx as usize;
        let type_idx = match imported.get(idx) {
            Some(type_idx) => *type_idx,
            None => *self.function_section()?.type_indices.get(idx - imported.len())?,
        };
        types.get(type_idx as usize)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "module magic = {} version = {}",
            hex::encode(self.magic),
            hex::encode(self.version)
        )?;
        for section in &self.sections {
            writeln!(f, "  {section}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Custom(CustomSection),
    Type(TypeSection),
    Import(ImportSection),
    Function(FunctionSection),
    Table(TableSection),
    Memory(MemorySection),
    Global(GlobalSection),
    Export(ExportSection),
    Start(StartSection),
    Element(ElementSection),
    Code(CodeSection),
    Data(DataSection),
    DataCount(DataCountSection),
}

impl Section {
    pub fn id(&self) -> u8 {
        match self {
            Section::Custom(_) => SECTION_CUSTOM,
            Section::Type(_) => SECTION_TYPE,
            Section::Import(_) => SECTION_IMPORT,
            Section::Function(_) => SECTION_FUNCTION,
            Section::Table(_) => SECTION_TABLE,
            Section::Memory(_) => SECTION_MEMORY,
            Section::Global(_) => SECTION_GLOBAL,
            Section::Export(_) => SECTION_EXPORT,
            Section::Start(_) => SECTION_START,
            Section::Element(_) => SECTION_ELEMENT,
            Section::Code(_) => SECTION_CODE,
            Section::Data(_) => SECTION_DATA,
            Section::DataCount(_) => SECTION_DATA_COUNT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Section::Custom(_) => "custom",
            Section::Type(_) => "type",
            Section::Import(_) => "import",
            Section::Function(_) => "function",
            Section::Table(_) => "table",
            Section::Memory(_) => "memory",
            Section::Global(_) => "global",
            Section::Export(_) => "export",
            Section::Start(_) => "start",
            Section::Element(_) => "element",
            Section::Code(_) => "code",
            Section::Data(_) => "data",
            Section::DataCount(_) => "data count",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{} {}", self.id(), self.name())?;
        match self {
            Section::Custom(s) => write!(f, " '{}' {}", s.name, s),
            Section::Type(s) => write!(f, " count = {}", s.types.len()),
            Section::Import(s) => write!(f, " count = {}", s.imports.len()),
            Section::Function(s) => write!(f, " count = {}", s.type_indices.len()),
            Section::Table(s) => write!(f, " count = {}", s.tables.len()),
            Section::Memory(s) => write!(f, " count = {}", s.memories.len()),
            Section::Global(s) => write!(f, " count = {}", s.globals.len()),
            Section::Export(s) => write!(f, " count = {}", s.exports.len()),
            Section::Start(s) => write!(f, " func = {}", s.function_index),
            Section::Element(s) => write!(f, " count = {}", s.elements.len()),
            Section::Code(s) => write!(f, " count = {}", s.codes.len()),
            Section::Data(s) => write!(f, " count = {}", s.data.len()),
            Section::DataCount(s) => write!(f, " count = {}", s.count),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TypeSection {
    pub types: Vec<FunctionType>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportSection {
    pub imports: Vec<Import>,
}

/// Type index of each defined function, parallel to [`CodeSection::codes`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionSection {
    pub type_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableSection {
    pub tables: Vec<TableType>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MemorySection {
    pub memories: Vec<Limits>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlobalSection {
    pub globals: Vec<Global>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportSection {
    pub exports: Vec<Export>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StartSection {
    pub function_index: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementSection {
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeSection {
    pub codes: Vec<Code>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataSection {
    pub data: Vec<Data>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataCountSection {
    pub count: u32,
}

/// A named blob. Decoded for inspection only; it cannot be re-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomSection {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl fmt::Display for CustomSection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const PREVIEW: usize = 16;
        let shown = &self.bytes[..self.bytes.len().min(PREVIEW)];
        write!(f, "{} bytes [{}", self.bytes.len(), hex::encode(shown))?;
        if self.bytes.len() > PREVIEW {
            write!(f, "...")?;
        }
        write!(f, "]")
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            VALTYPE_I32 => Ok(ValueType::I32),
            VALTYPE_I64 => Ok(ValueType::I64),
            VALTYPE_F32 => Ok(ValueType::F32),
            VALTYPE_F64 => Ok(ValueType::F64),
            _ => Err(DecodeError::InvalidValueType(byte)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ValueType::I32 => VALTYPE_I32,
            ValueType::I64 => VALTYPE_I64,
            ValueType::F32 => VALTYPE_F32,
            ValueType::F64 => VALTYPE_F64,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        })
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum RefType {
    FuncRef,
    ExternRef,
}

impl RefType {
    pub fn from_byte(byte: u8) -> Result<Self, DecodeError> {
        match byte {
            REFTYPE_FUNCREF => Ok(RefType::FuncRef),
            REFTYPE_EXTERNREF => Ok(RefType::ExternRef),
            _ => Err(DecodeError::InvalidRefType(byte)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            RefType::FuncRef => REFTYPE_FUNCREF,
            RefType::ExternRef => REFTYPE_EXTERNREF,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            RefType::FuncRef => "funcref",
            RefType::ExternRef => "externref",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub return_types: Vec<ValueType>,
}

impl FunctionType {
    pub fn new(parameters: Vec<ValueType>, return_types: Vec<ValueType>) -> Self {
        FunctionType {
            parameters,
            return_types,
        }
    }

    /// The result the engine produces; only the first declared result is used.
    pub fn result(&self) -> Option<ValueType> {
        self.return_types.first().copied()
    }
}

fn join_types(types: &[ValueType]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<String>>()
        .join(", ")
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let results = match self.return_types.len() {
            0 => "nil".to_string(),
            1 => join_types(&self.return_types),
            _ => format!("({})", join_types(&self.return_types)),
        };
        write!(f, "({}) -> {}", join_types(&self.parameters), results)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub min: u32,
    pub max: Option<u32>,
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "min = {}, max = {}", self.min, max),
            None => write!(f, "min = {}", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableType {
    pub ref_type: RefType,
    pub limits: Limits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.mutable {
            write!(f, "(mut {})", self.value_type)
        } else {
            write!(f, "{}", self.value_type)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Function(u32),
    Table(TableType),
    Memory(Limits),
    Global(GlobalType),
}

impl ImportDesc {
    pub fn kind(&self) -> &'static str {
        match self {
            ImportDesc::Function(_) => "function",
            ImportDesc::Table(_) => "table",
            ImportDesc::Memory(_) => "memory",
            ImportDesc::Global(_) => "global",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.desc {
            ImportDesc::Function(type_idx) => write!(f, "func sig={} <- {}.{}", type_idx, self.module, self.name),
            ImportDesc::Table(t) => write!(f, "table {} {} <- {}.{}", t.ref_type, t.limits, self.module, self.name),
            ImportDesc::Memory(l) => write!(f, "memory {} <- {}.{}", l, self.module, self.name),
            ImportDesc::Global(g) => write!(f, "global {} <- {}.{}", g, self.module, self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportDesc {
    Function(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub global_type: GlobalType,
    pub init: Expression,
}

/// A run of `count` locals sharing one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locals {
    pub count: u32,
    pub value_type: ValueType,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Code {
    pub locals: Vec<Locals>,
    pub body: Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementMode {
    Passive,
    Active { table_index: u32, offset: Expression },
    Declarative,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementItems {
    Functions(Vec<u32>),
    Expressions(Vec<Expression>),
}

/// An element segment. `flags` is kept so that the exact wire form (0-7) is
/// reproduced on encode.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub flags: u32,
    pub mode: ElementMode,
    pub ref_type: RefType,
    pub items: ElementItems,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    Active { offset: Expression },
    Passive,
    ActiveExplicit { memory_index: u32, offset: Expression },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub mode: DataMode,
    pub init: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_type_display() {
        let ft = FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![ValueType::I32]);
        assert_eq!(ft.to_string(), "(i32, i32) -> i32");
        assert_eq!(FunctionType::default().to_string(), "() -> nil");
        let multi = FunctionType::new(vec![], vec![ValueType::I32, ValueType::I64]);
        assert_eq!(multi.to_string(), "() -> (i32, i64)");
        assert_eq!(multi.result(), Some(ValueType::I32));
    }

    #[test]
    fn test_value_type_bytes() {
        for t in [ValueType::I32, ValueType::I64, ValueType::F32, ValueType::F64] {
            assert_eq!(ValueType::from_byte(t.to_byte()), Ok(t));
        }
        assert_eq!(ValueType::from_byte(0x7b), Err(DecodeError::InvalidValueType(0x7b)));
    }

    #[test]
    fn test_first_section_lookup() {
        let mut module = Module::new();
        module.push(Section::Start(StartSection { function_index: 3 }));
        module.push(Section::Start(StartSection { function_index: 9 }));
        assert_eq!(module.start_section().map(|s| s.function_index), Some(3));
        assert!(module.type_section().is_none());
    }

    #[test]
    fn test_function_type_lookup_spans_imports() {
        let mut module = Module::new();
        module.push(Section::Type(TypeSection {
            types: vec![
                FunctionType::new(vec![ValueType::I32], vec![]),
                FunctionType::new(vec![], vec![ValueType::I32]),
            ],
        }));
        module.push(Section::Import(ImportSection {
            imports: vec![
                Import {
                    module: "env".to_string(),
                    name: "mem".to_string(),
                    desc: ImportDesc::Memory(Limits { min: 1, max: None }),
                },
                Import {
                    module: "env".to_string(),
                    name: "print".to_string(),
                    desc: ImportDesc::Function(0),
                },
            ],
        }));
        module.push(Section::Function(FunctionSection { type_indices: vec![1] }));

        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(module.function_type(0).map(|t| t.parameters.len()), Some(1));
        assert_eq!(module.function_type(1).map(|t| t.return_types.len()), Some(1));
        assert!(module.function_type(2).is_none());
    }
}
