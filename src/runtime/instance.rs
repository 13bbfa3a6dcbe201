//! WebAssembly module instance
//!
//! Instantiation binds a decoded [`Module`] to host imports and builds a
//! [`Store`]. The steps run in a fixed order: types, imports, defined
//! functions, tables and memories, globals, exports, the start function,
//! element segments, then data segments.

use super::config::Config;
use super::executor::{self, CompiledBody};
use super::global::GlobalInstance;
use super::imports::{Extern, ImportObject};
use super::memory::Memory;
use super::ops;
use super::store::{FunctionInstance, Store};
use super::table::Table;
use super::{RuntimeError, Value};
use crate::parser::instruction::Expression;
use crate::parser::module::{DataMode, ElementItems, ElementMode, ExportDesc, ImportDesc, Module, ValueType};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Exported functions by name. Fixed once instantiation completes.
#[derive(Debug, Default)]
pub struct Exports {
    functions: HashMap<String, Rc<FunctionInstance>>,
}

impl Exports {
    pub fn get(&self, name: &str) -> Option<&Rc<FunctionInstance>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// A WebAssembly module instance
#[derive(Debug)]
pub struct Instance {
    store: Store,
    exports: Exports,
}

impl Instance {
    /// Instantiates `module` against `imports`.
    pub fn new(module: &Module, imports: &ImportObject, config: Config) -> Result<Self, RuntimeError> {
        let mut store = Store::new(config);

        if let Some(section) = module.type_section() {
            store.types = section.types.clone();
        }

        bind_imports(&mut store, module, imports)?;
        log::debug!(
            "imports resolved: {} functions, {} tables, {} memories, {} globals",
            store.functions.len(),
            store.tables.len(),
            store.memories.len(),
            store.globals.len()
        );

        define_functions(&mut store, module)?;

        if let Some(section) = module.table_section() {
            for table_type in &section.tables {
                store.tables.push(Table::shared(*table_type)?);
            }
        }
        if let Some(section) = module.memory_section() {
            for limits in &section.memories {
                store.memories.push(Memory::shared(*limits)?);
            }
        }

        initialize_globals(&mut store, module)?;

        let mut exported = HashMap::new();
        if let Some(section) = module.export_section() {
            for export in &section.exports {
                match export.desc {
                    ExportDesc::Function(func_idx) => {
                        exported.insert(export.name.clone(), store.function(func_idx)?);
                    }
                    other => log::debug!("ignoring export {}: {:?}", export.name, other),
                }
            }
        }

        if let Some(start) = module.start_section() {
            log::debug!("invoking start function {}", start.function_index);
            let func = store.function(start.function_index)?;
            let func_type = func.func_type().clone();
            executor::invoke(&mut store, &func, &func_type, &[])?;
        }

        apply_elements(&mut store, module)?;
        apply_data(&mut store, module)?;

        Ok(Instance {
            store,
            exports: Exports { functions: exported },
        })
    }

    /// Calls an exported function. Parameters not covered by `args` are
    /// taken from the operand stack.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> Result<Option<Value>, RuntimeError> {
        let func = self
            .exports
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownExport(name.to_string()))?;
        let func_type = func.func_type().clone();
        log::debug!("invoke {name}{func_type}");
        executor::invoke(&mut self.store, &func, &func_type, args)
    }

    pub fn exports(&self) -> &Exports {
        &self.exports
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn set_instruction_budget(&mut self, budget: Option<u64>) {
        self.store.set_instruction_budget(budget);
    }
}

fn bind_imports(store: &mut Store, module: &Module, imports: &ImportObject) -> Result<(), RuntimeError> {
    let Some(section) = module.import_section() else {
        return Ok(());
    };

    for import in &section.imports {
        let value = imports.resolve(&import.module, &import.name)?;
        match (&import.desc, value) {
            (ImportDesc::Function(type_idx), Extern::Function(func)) => {
                let func_type = store.func_type(*type_idx)?.clone();
                store.functions.push(Rc::new(FunctionInstance::Host {
                    func_type,
                    func: func.clone(),
                }));
            }
            (ImportDesc::Table(_), Extern::Table(table)) => store.tables.push(table.clone()),
            (ImportDesc::Memory(_), Extern::Memory(memory)) => store.memories.push(memory.clone()),
            (ImportDesc::Global(_), Extern::Global(global)) => store.globals.push(global.clone()),
            (desc, _) => {
                return Err(RuntimeError::ImportKindMismatch {
                    module: import.module.clone(),
                    name: import.name.clone(),
                    expected: desc.kind(),
                })
            }
        }
    }
    Ok(())
}

fn define_functions(store: &mut Store, module: &Module) -> Result<(), RuntimeError> {
    let type_indices = module.function_section().map(|s| s.type_indices.as_slice()).unwrap_or_default();
    let codes = module.code_section().map(|s| s.codes.as_slice()).unwrap_or_default();
    if type_indices.len() != codes.len() {
        return Err(RuntimeError::InvalidIndex {
            kind: "code",
            index: type_indices.len().min(codes.len()) as u32,
        });
    }

    for (type_idx, code) in type_indices.iter().zip(codes) {
        let func_type = store.func_type(*type_idx)?.clone();
        store.functions.push(Rc::new(FunctionInstance::Wasm {
            func_type,
            locals: code.locals.clone(),
            body: Rc::new(CompiledBody::compile(&code.body)),
        }));
    }
    log::debug!("{} functions defined", codes.len());
    Ok(())
}

fn initialize_globals(store: &mut Store, module: &Module) -> Result<(), RuntimeError> {
    let Some(section) = module.global_section() else {
        return Ok(());
    };

    for global in &section.globals {
        let index = store.globals.len() as u32;
        let instance = Rc::new(RefCell::new(GlobalInstance::uninitialized(global.global_type)));
        store.globals.push(instance.clone());
        let value = executor::evaluate(store, &global.init, global.global_type.value_type)?;
        instance.borrow_mut().initialize(index, value)?;
    }
    log::debug!("{} globals initialized", section.globals.len());
    Ok(())
}

fn evaluate_offset(store: &mut Store, expr: &Expression) -> Result<i32, RuntimeError> {
    let value = executor::evaluate(store, expr, ValueType::I32)?;
    value.as_i32().ok_or(RuntimeError::TypeMismatch {
        expected: ValueType::I32.to_string(),
        actual: value.typ().to_string(),
    })
}

fn apply_elements(store: &mut Store, module: &Module) -> Result<(), RuntimeError> {
    let Some(section) = module.element_section() else {
        return Ok(());
    };

    for (segment_idx, element) in section.elements.iter().enumerate() {
        let ElementMode::Active { table_index, offset } = &element.mode else {
            log::debug!("skipping non-active element segment {segment_idx}");
            continue;
        };
        let ElementItems::Functions(func_indices) = &element.items else {
            return Err(RuntimeError::UnsupportedFeature(format!(
                "element segment {segment_idx} with expression items"
            )));
        };

        let offset = evaluate_offset(store, offset)? as u32;
        let table = store.table(*table_index)?;
        for (i, func_idx) in func_indices.iter().enumerate() {
            let func = store.function(*func_idx)?;
            table.borrow_mut().set(offset.wrapping_add(i as u32), &func)?;
        }
        log::debug!(
            "element segment {segment_idx}: {} functions at table {table_index}[{offset}]",
            func_indices.len()
        );
    }
    Ok(())
}

fn apply_data(store: &mut Store, module: &Module) -> Result<(), RuntimeError> {
    let Some(section) = module.data_section() else {
        return Ok(());
    };

    for (segment_idx, data) in section.data.iter().enumerate() {
        let (memory_index, offset) = match &data.mode {
            DataMode::Active { offset } => (0, offset),
            DataMode::ActiveExplicit { memory_index, offset } => (*memory_index, offset),
            DataMode::Passive => {
                log::debug!("skipping passive data segment {segment_idx}");
                continue;
            }
        };
        let offset = evaluate_offset(store, offset)?;
        let memory = store.memory(memory_index)?;
        ops::memory::copy_to_memory(&mut memory.borrow_mut(), offset, &data.init)?;
        log::debug!(
            "data segment {segment_idx}: {} bytes at memory {memory_index}[{offset}]",
            data.init.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::instruction::Instruction;
    use crate::parser::module::{
        Code, CodeSection, Data, DataSection, Element, ElementSection, Export, ExportSection, FunctionSection,
        FunctionType, Global, GlobalSection, GlobalType, Import, ImportSection, Limits, MemorySection, RefType,
        Section, StartSection, TableSection, TableType, TypeSection,
    };

    fn konst(value: i32) -> Expression {
        Expression::new(vec![Instruction::I32Const { value }])
    }

    fn module_with(types: Vec<FunctionType>, bodies: Vec<(u32, Vec<Instruction>)>) -> Module {
        let mut module = Module::new();
        module.push(Section::Type(TypeSection { types }));
        module.push(Section::Function(FunctionSection {
            type_indices: bodies.iter().map(|(t, _)| *t).collect(),
        }));
        module.push(Section::Code(CodeSection {
            codes: bodies
                .into_iter()
                .map(|(_, body)| Code {
                    locals: vec![],
                    body: Expression::new(body),
                })
                .collect(),
        }));
        module
    }

    fn export_func(name: &str, func_idx: u32) -> Section {
        Section::Export(ExportSection {
            exports: vec![Export {
                name: name.to_string(),
                desc: ExportDesc::Function(func_idx),
            }],
        })
    }

    #[test]
    fn test_export_invoke() {
        let mut module = module_with(
            vec![FunctionType::new(vec![], vec![ValueType::I32])],
            vec![(0, vec![Instruction::I32Const { value: 7 }])],
        );
        module.push(export_func("seven", 0));
        let mut instance = Instance::new(&module, &ImportObject::new(), Config::default()).unwrap();

        assert!(instance.exports().contains("seven"));
        assert_eq!(instance.exports().len(), 1);
        assert_eq!(instance.invoke("seven", &[]).unwrap(), Some(Value::I32(7)));
        assert_eq!(
            instance.invoke("eight", &[]),
            Err(RuntimeError::UnknownExport("eight".to_string()))
        );
    }

    #[test]
    fn test_missing_import() {
        let mut module = module_with(vec![FunctionType::default()], vec![]);
        module.push(Section::Import(ImportSection {
            imports: vec![Import {
                module: "env".to_string(),
                name: "f".to_string(),
                desc: ImportDesc::Function(0),
            }],
        }));
        let err = Instance::new(&module, &ImportObject::new(), Config::default()).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownImport { .. }));
    }

    #[test]
    fn test_import_kind_mismatch() {
        let mut module = module_with(vec![FunctionType::default()], vec![]);
        module.push(Section::Import(ImportSection {
            imports: vec![Import {
                module: "env".to_string(),
                name: "memory".to_string(),
                desc: ImportDesc::Memory(Limits { min: 1, max: None }),
            }],
        }));
        let mut imports = ImportObject::new();
        imports.add_function("env", "memory", |_| Ok(None));
        let err = Instance::new(&module, &imports, Config::default()).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::ImportKindMismatch {
                module: "env".to_string(),
                name: "memory".to_string(),
                expected: "memory",
            }
        );
    }

    #[test]
    fn test_function_code_mismatch() {
        let mut module = Module::new();
        module.push(Section::Type(TypeSection {
            types: vec![FunctionType::default()],
        }));
        module.push(Section::Function(FunctionSection { type_indices: vec![0] }));
        assert!(matches!(
            Instance::new(&module, &ImportObject::new(), Config::default()),
            Err(RuntimeError::InvalidIndex { kind: "code", .. })
        ));
    }

    #[test]
    fn test_globals_read_earlier_globals() {
        let mut module = module_with(
            vec![FunctionType::new(vec![], vec![ValueType::I32])],
            vec![(0, vec![Instruction::GlobalGet { global_idx: 1 }])],
        );
        let i32_const = GlobalType {
            value_type: ValueType::I32,
            mutable: false,
        };
        module.push(Section::Global(GlobalSection {
            globals: vec![
                Global {
                    global_type: i32_const,
                    init: konst(5),
                },
                Global {
                    global_type: i32_const,
                    init: Expression::new(vec![
                        Instruction::GlobalGet { global_idx: 0 },
                        Instruction::I32Const { value: 1 },
                        Instruction::I32Add,
                    ]),
                },
            ],
        }));
        module.push(export_func("g", 0));
        let mut instance = Instance::new(&module, &ImportObject::new(), Config::default()).unwrap();
        assert_eq!(instance.invoke("g", &[]).unwrap(), Some(Value::I32(6)));
    }

    #[test]
    fn test_start_runs_before_segments() {
        let mut module = module_with(
            vec![FunctionType::default()],
            vec![(0, vec![Instruction::I32Const { value: 0 }, Instruction::I32Load { memarg: Default::default() }])],
        );
        module.push(Section::Memory(MemorySection {
            memories: vec![Limits { min: 1, max: None }],
        }));
        module.push(Section::Start(StartSection { function_index: 0 }));
        module.push(Section::Data(DataSection {
            data: vec![Data {
                mode: DataMode::Active { offset: konst(0) },
                init: vec![9, 0, 0, 0],
            }],
        }));
        let instance = Instance::new(&module, &ImportObject::new(), Config::default()).unwrap();

        // the start function saw zeroed memory
        let mut store = instance.store;
        assert_eq!(store.stack.pop_i32().unwrap(), 0);
        assert_eq!(store.memory(0).unwrap().borrow().read_i32(0).unwrap(), 9);
    }

    #[test]
    fn test_elements_bind_table() {
        let mut module = module_with(
            vec![FunctionType::new(vec![], vec![ValueType::I32])],
            vec![
                (0, vec![Instruction::I32Const { value: 10 }]),
                (0, vec![Instruction::I32Const { value: 20 }]),
            ],
        );
        module.push(Section::Table(TableSection {
            tables: vec![TableType {
                ref_type: RefType::FuncRef,
                limits: Limits { min: 4, max: None },
            }],
        }));
        module.push(Section::Element(ElementSection {
            elements: vec![Element {
                flags: 0,
                mode: ElementMode::Active {
                    table_index: 0,
                    offset: konst(2),
                },
                ref_type: RefType::FuncRef,
                items: ElementItems::Functions(vec![1, 0]),
            }],
        }));
        let instance = Instance::new(&module, &ImportObject::new(), Config::default()).unwrap();
        let table = instance.store().table(0).unwrap();
        let table = table.borrow();
        assert!(table.get(0).is_err());
        assert!(Rc::ptr_eq(&table.get(2).unwrap(), &instance.store().function(1).unwrap()));
        assert!(Rc::ptr_eq(&table.get(3).unwrap(), &instance.store().function(0).unwrap()));
    }

    #[test]
    fn test_expression_elements_unsupported() {
        let mut module = module_with(vec![FunctionType::default()], vec![]);
        module.push(Section::Table(TableSection {
            tables: vec![TableType {
                ref_type: RefType::FuncRef,
                limits: Limits { min: 1, max: None },
            }],
        }));
        module.push(Section::Element(ElementSection {
            elements: vec![Element {
                flags: 4,
                mode: ElementMode::Active {
                    table_index: 0,
                    offset: konst(0),
                },
                ref_type: RefType::FuncRef,
                items: ElementItems::Expressions(vec![]),
            }],
        }));
        assert!(matches!(
            Instance::new(&module, &ImportObject::new(), Config::default()),
            Err(RuntimeError::UnsupportedFeature(_))
        ));
    }

    #[test]
    fn test_host_import_receives_args() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut imports = ImportObject::new();
        imports.add_function("env", "log", move |args| {
            sink.borrow_mut().extend_from_slice(args);
            Ok(None)
        });

        let mut module = module_with(
            vec![FunctionType::new(vec![ValueType::I32, ValueType::I32], vec![]), FunctionType::default()],
            vec![(
                1,
                vec![
                    Instruction::I32Const { value: 1 },
                    Instruction::I32Const { value: 2 },
                    Instruction::Call { func_idx: 0 },
                ],
            )],
        );
        module.push(Section::Import(ImportSection {
            imports: vec![Import {
                module: "env".to_string(),
                name: "log".to_string(),
                desc: ImportDesc::Function(0),
            }],
        }));
        module.push(Section::Start(StartSection { function_index: 1 }));
        Instance::new(&module, &imports, Config::default()).unwrap();
        assert_eq!(*seen.borrow(), vec![Value::I32(1), Value::I32(2)]);
    }
}
