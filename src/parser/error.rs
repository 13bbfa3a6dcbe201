//! Errors raised while decoding the binary format.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Integer representation too long or out of range")]
    IntegerOverflow,
    #[error("Invalid magic number: {0}")]
    InvalidMagic(String),
    #[error("Invalid section id: {0}")]
    InvalidSectionId(u8),
    #[error("Section {id} is shorter than its declared size {expected} (got {actual})")]
    SectionTooShort { id: u8, expected: u32, actual: usize },
    #[error("Invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("Structured instructions nested deeper than {0}")]
    NestingTooDeep(usize),
    #[error("Unexpected else outside of an if")]
    UnexpectedElse,
    #[error("Invalid function type tag: 0x{0:02x}")]
    InvalidFuncTypeTag(u8),
    #[error("Invalid value type: 0x{0:02x}")]
    InvalidValueType(u8),
    #[error("Invalid reference type: 0x{0:02x}")]
    InvalidRefType(u8),
    #[error("Invalid block type: 0x{0:02x}")]
    InvalidBlockType(u8),
    #[error("Invalid import kind: 0x{0:02x}")]
    InvalidImportKind(u8),
    #[error("Invalid export kind: 0x{0:02x}")]
    InvalidExportKind(u8),
    #[error("Invalid limits tag: 0x{0:02x}")]
    InvalidLimits(u8),
    #[error("Invalid mutability: 0x{0:02x}")]
    InvalidMutability(u8),
    #[error("Invalid element segment flags: {0}")]
    InvalidElementFlags(u32),
    #[error("Invalid element kind: 0x{0:02x}")]
    InvalidElementKind(u8),
    #[error("Invalid data segment flags: {0}")]
    InvalidDataFlags(u32),
    #[error("Invalid UTF-8 in name")]
    InvalidUtf8,
    #[error("Trailing bytes after section {id}: {remaining}")]
    TrailingBytes { id: u8, remaining: usize },
}
