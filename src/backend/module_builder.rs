//! WASM module accumulation.
//!
//! Owns the wasm_encoder sections and hands out indices as entries are
//! registered, so function indices account for imports and a declared
//! function's position in the function section always matches its body's
//! position in the code section (the binary format keeps them as
//! parallel arrays). `finish` emits the sections in the order the format
//! requires, skipping the ones that stayed empty.
//!
//! Type entries are not deduplicated: the image declares one type per
//! import and per function, and the emitted module mirrors that
//! one-to-one.

use crate::errors::CompileError;
use wasm_encoder::{
    CodeSection, ConstExpr, DataSection, EntityType, ExportKind, ExportSection, Function,
    FunctionSection, ImportSection, MemorySection, MemoryType, Module, TypeSection, ValType,
};

pub struct WasmModuleBuilder {
    type_section: TypeSection,
    import_section: ImportSection,
    function_section: FunctionSection,
    memory_section: MemorySection,
    export_section: ExportSection,
    code_section: CodeSection,
    data_section: DataSection,

    type_count: u32,
    import_function_count: u32,
    function_count: u32,
    memory_count: u32,
    data_count: u32,
    has_exports: bool,
}

impl WasmModuleBuilder {
    pub fn new() -> Self {
        WasmModuleBuilder {
            type_section: TypeSection::new(),
            import_section: ImportSection::new(),
            function_section: FunctionSection::new(),
            memory_section: MemorySection::new(),
            export_section: ExportSection::new(),
            code_section: CodeSection::new(),
            data_section: DataSection::new(),

            type_count: 0,
            import_function_count: 0,
            function_count: 0,
            memory_count: 0,
            data_count: 0,
            has_exports: false,
        }
    }

    /// Register a fresh function type and return its index.
    pub fn add_function_type(&mut self, params: Vec<ValType>, results: Vec<ValType>) -> u32 {
        let type_index = self.type_count;
        self.type_section.ty().function(params, results);
        self.type_count += 1;
        type_index
    }

    /// Register an imported function. Imported functions are indexed
    /// before module-defined ones; the returned index is the compact
    /// import slot call instructions use.
    pub fn add_import_function(&mut self, module: &str, name: &str, type_idx: u32) -> u32 {
        let import_index = self.import_function_count;
        self.import_section
            .import(module, name, EntityType::Function(type_idx));
        self.import_function_count += 1;
        import_index
    }

    /// Register a declared function and its body; returns the function
    /// index, accounting for imports.
    pub fn add_function(&mut self, type_idx: u32, body: &Function) -> u32 {
        let function_index = self.import_function_count + self.function_count;
        self.function_section.function(type_idx);
        self.code_section.function(body);
        self.function_count += 1;
        function_index
    }

    pub fn add_memory(&mut self, min_pages: u64, max_pages: Option<u64>) -> u32 {
        let memory_index = self.memory_count;
        self.memory_section.memory(MemoryType {
            minimum: min_pages,
            maximum: max_pages,
            memory64: false,
            shared: false,
            page_size_log2: None,
        });
        self.memory_count += 1;
        memory_index
    }

    /// Append an active data segment on memory 0 at an absolute offset.
    pub fn add_active_data(&mut self, offset: u32, bytes: Vec<u8>) {
        self.data_section
            .active(0, &ConstExpr::i32_const(offset as i32), bytes);
        self.data_count += 1;
    }

    pub fn add_function_export(&mut self, name: &str, function_index: u32) {
        self.export_section
            .export(name, ExportKind::Func, function_index);
        self.has_exports = true;
    }

    pub fn add_memory_export(&mut self, name: &str, memory_index: u32) {
        self.export_section
            .export(name, ExportKind::Memory, memory_index);
        self.has_exports = true;
    }

    pub fn type_count(&self) -> u32 {
        self.type_count
    }

    /// Cheap structural check before serialization; the real validation
    /// runs wasmparser over the finished bytes.
    fn validate(&self) -> Result<(), CompileError> {
        if (self.function_count > 0 || self.import_function_count > 0) && self.type_count == 0 {
            return Err(CompileError::wasm_validation(
                "module declares functions but its type section is empty",
            ));
        }
        Ok(())
    }

    /// Serialize, emitting sections in the binary format's order.
    pub fn finish(self) -> Result<Vec<u8>, CompileError> {
        self.validate()?;

        let mut module = Module::new();

        if self.type_count > 0 {
            module.section(&self.type_section);
        }
        if self.import_function_count > 0 {
            module.section(&self.import_section);
        }
        if self.function_count > 0 {
            module.section(&self.function_section);
        }
        if self.memory_count > 0 {
            module.section(&self.memory_section);
        }
        if self.has_exports {
            module.section(&self.export_section);
        }
        if self.function_count > 0 {
            module.section(&self.code_section);
        }
        if self.data_count > 0 {
            module.section(&self.data_section);
        }

        Ok(module.finish())
    }
}

impl Default for WasmModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
