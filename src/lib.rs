//! A WebAssembly binary decoder, encoder and tree-walking interpreter.
//!
//! wasmtree covers the integer core of WebAssembly: decoding `.wasm` bytes
//! into a typed module tree, encoding that tree back to bytes, and running
//! exported functions against host imports.
//!
//! # Modules
//!
//! - [`parser`] -- Binary format decoder. Reads `.wasm` bytes into a [`parser::module::Module`].
//! - [`encoder`] -- Binary encoder. Serialises a `Module` back to `.wasm` bytes.
//! - [`runtime`] -- Instantiation, the operand stack, memory, tables, globals and the interpreter.
//!
//! # Example
//!
//! Decode a module exporting `add`, instantiate it, and call the export:
//!
//! ```
//! use wasmtree::runtime::{ImportObject, Value};
//!
//! let bytes = [
//!     0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // preamble
//!     0x01, 0x07, 0x01, 0x60, 0x02, 0x7f, 0x7f, 0x01, 0x7f, // type 0: (i32, i32) -> i32
//!     0x03, 0x02, 0x01, 0x00, // func 0: type 0
//!     0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export "add"
//!     0x0a, 0x09, 0x01, 0x07, 0x00, 0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b, // local.get 0 local.get 1 i32.add
//! ];
//!
//! let mut instance = wasmtree::instantiate(&bytes, &ImportObject::new()).unwrap();
//! let result = instance.invoke("add", &[Value::I32(2), Value::I32(3)]).unwrap();
//! assert_eq!(result, Some(Value::I32(5)));
//! ```

pub mod encoder;
pub mod parser;
pub mod runtime;

use runtime::{Config, ImportObject, Instance};

/// Any failure along the decode, encode or execution path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] parser::DecodeError),
    #[error(transparent)]
    Encode(#[from] encoder::EncodeError),
    #[error(transparent)]
    Runtime(#[from] runtime::RuntimeError),
}

/// Decodes `bytes` and instantiates the module with a default [`Config`].
pub fn instantiate(bytes: &[u8], imports: &ImportObject) -> Result<Instance, Error> {
    let module = parser::Module::decode(bytes)?;
    Ok(Instance::new(&module, imports, Config::default())?)
}
