//! Import resolution for WebAssembly modules
//!
//! An [`ImportObject`] maps a module name and a field name to a host-provided
//! [`Extern`]. Host functions are untyped here; the importing module's
//! declaration supplies their signature when bound.

use super::global::SharedGlobal;
use super::memory::SharedMemory;
use super::store::HostFunc;
use super::table::SharedTable;
use super::{RuntimeError, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A host value that can satisfy an import.
#[derive(Clone)]
pub enum Extern {
    Function(HostFunc),
    Table(SharedTable),
    Memory(SharedMemory),
    Global(SharedGlobal),
}

impl Extern {
    pub fn kind(&self) -> &'static str {
        match self {
            Extern::Function(_) => "function",
            Extern::Table(_) => "table",
            Extern::Memory(_) => "memory",
            Extern::Global(_) => "global",
        }
    }
}

impl fmt::Debug for Extern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Extern::{}", self.kind())
    }
}

/// Container for imported values that a module can reference
#[derive(Debug, Clone, Default)]
pub struct ImportObject {
    modules: HashMap<String, HashMap<String, Extern>>,
}

impl ImportObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, module: impl Into<String>, name: impl Into<String>, value: Extern) {
        self.modules.entry(module.into()).or_default().insert(name.into(), value);
    }

    /// Add a host function import
    pub fn add_function<F>(&mut self, module: impl Into<String>, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Option<Value>, RuntimeError> + 'static,
    {
        self.add(module, name, Extern::Function(Rc::new(func)));
    }

    pub fn add_table(&mut self, module: impl Into<String>, name: impl Into<String>, table: SharedTable) {
        self.add(module, name, Extern::Table(table));
    }

    pub fn add_memory(&mut self, module: impl Into<String>, name: impl Into<String>, memory: SharedMemory) {
        self.add(module, name, Extern::Memory(memory));
    }

    pub fn add_global(&mut self, module: impl Into<String>, name: impl Into<String>, global: SharedGlobal) {
        self.add(module, name, Extern::Global(global));
    }

    pub fn get(&self, module: &str, name: &str) -> Option<&Extern> {
        self.modules.get(module)?.get(name)
    }

    /// Looks up an import, failing with `UnknownImport` if it is absent.
    pub fn resolve(&self, module: &str, name: &str) -> Result<&Extern, RuntimeError> {
        self.get(module, name).ok_or_else(|| RuntimeError::UnknownImport {
            module: module.to_string(),
            name: name.to_string(),
        })
    }
}
