//! Function tables
//!
//! A table is a fixed vector of optional function references used by
//! `call_indirect`. Slots hold weak references: the owning store keeps the
//! functions alive, and a slot whose function has been dropped reads back as
//! unbound.

use super::store::FunctionInstance;
use super::RuntimeError;
use crate::parser::module::{Limits, RefType, TableType};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

pub type SharedTable = Rc<RefCell<Table>>;

/// Largest number of slots a table may start with.
pub const MAX_TABLE_SIZE: u32 = 10_000_000;

pub struct Table {
    ref_type: RefType,
    elements: Vec<Option<Weak<FunctionInstance>>>,
    limits: Limits,
}

impl Table {
    /// A table of `limits.min` unbound slots.
    ///
    /// # Errors
    /// - `min` exceeds [`MAX_TABLE_SIZE`]
    pub fn new(table_type: TableType) -> Result<Self, RuntimeError> {
        let min = table_type.limits.min;
        if min > MAX_TABLE_SIZE {
            return Err(RuntimeError::UnsupportedFeature(format!(
                "table of {min} elements exceeds maximum {MAX_TABLE_SIZE}"
            )));
        }
        Ok(Table {
            ref_type: table_type.ref_type,
            elements: vec![None; min as usize],
            limits: table_type.limits,
        })
    }

    pub fn shared(table_type: TableType) -> Result<SharedTable, RuntimeError> {
        Ok(Rc::new(RefCell::new(Table::new(table_type)?)))
    }

    pub fn ref_type(&self) -> RefType {
        self.ref_type
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    /// The function bound at `index`.
    ///
    /// Out-of-range, empty and dangling slots are all `UnboundTableElement`.
    pub fn get(&self, index: u32) -> Result<Rc<FunctionInstance>, RuntimeError> {
        self.elements
            .get(index as usize)
            .and_then(|slot| slot.as_ref())
            .and_then(Weak::upgrade)
            .ok_or(RuntimeError::UnboundTableElement(index))
    }

    pub fn set(&mut self, index: u32, func: &Rc<FunctionInstance>) -> Result<(), RuntimeError> {
        let slot = self.elements.get_mut(index as usize).ok_or(RuntimeError::InvalidIndex {
            kind: "table element",
            index,
        })?;
        *slot = Some(Rc::downgrade(func));
        Ok(())
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self.elements.iter().filter(|e| e.is_some()).count();
        f.debug_struct("Table")
            .field("ref_type", &self.ref_type)
            .field("size", &self.elements.len())
            .field("bound", &bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::FunctionType;

    fn host_function() -> Rc<FunctionInstance> {
        Rc::new(FunctionInstance::host(FunctionType::default(), |_| Ok(None)))
    }

    fn table_type(min: u32) -> TableType {
        TableType {
            ref_type: RefType::FuncRef,
            limits: Limits { min, max: None },
        }
    }

    fn table(min: u32) -> Table {
        Table::new(table_type(min)).unwrap()
    }

    #[test]
    fn test_size_limit() {
        assert_eq!(table(MAX_TABLE_SIZE).size(), MAX_TABLE_SIZE);
        assert!(matches!(
            Table::new(table_type(u32::MAX)),
            Err(RuntimeError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_new_is_unbound() {
        let table = table(2);
        assert_eq!(table.size(), 2);
        assert!(matches!(table.get(0), Err(RuntimeError::UnboundTableElement(0))));
        assert!(matches!(table.get(5), Err(RuntimeError::UnboundTableElement(5))));
    }

    #[test]
    fn test_set_get() {
        let mut table = table(2);
        let func = host_function();
        table.set(1, &func).unwrap();
        assert!(Rc::ptr_eq(&table.get(1).unwrap(), &func));
        assert!(matches!(
            table.set(2, &func),
            Err(RuntimeError::InvalidIndex { index: 2, .. })
        ));
    }

    #[test]
    fn test_dangling_slot() {
        let mut table = table(1);
        let func = host_function();
        table.set(0, &func).unwrap();
        drop(func);
        assert!(matches!(table.get(0), Err(RuntimeError::UnboundTableElement(0))));
    }
}
