//! The module assembler: drives the whole lowering pass.
//!
//! Owns every piece of mutable state for one compilation: the memory
//! cursor, the import map and the accumulating module. Nothing here is
//! shared; compiling two images concurrently means two assemblers.
//!
//! Ordering is load-bearing. Imports are registered before any function
//! body is lowered because call instructions resolve through the import
//! map. Function data lumps are appended in visiting order because each
//! base offset is the cursor value left by the previous function, which
//! is also why this loop must stay sequential.
//!
//! Memory layout: address 0 holds one reserved word, each function's
//! constant data follows at its base offset, and after all functions a
//! trailer segment writes the final cursor back to address 0
//! (big-endian) so a runtime allocator knows the first free address.

use crate::backend::lower::lower_function_body;
use crate::backend::module_builder::WasmModuleBuilder;
use crate::backend::signatures::signature_of;
use crate::backend::validator::validate_module_bytes;
use crate::codegen_log;
use crate::errors::CompileError;
use crate::image::segregate::segregate;
use crate::image::{DirId, DirKind, Directory, ProgramImage};
use rustc_hash::FxHashMap;
use wasm_encoder::Function;

/// Address 0 holds one word for the runtime allocator; constant data
/// starts right after it.
const RESERVED_HEADER_BYTES: u32 = 4;

/// Initial size of the module's linear memory, in 64KiB pages.
const MEMORY_PAGES: u64 = 1;

/// Export name of the module's linear memory.
const MEMORY_EXPORT_NAME: &str = "mem";

/// Lower a program image into a validated WebAssembly module.
///
/// This is the backend's only entry point. It either returns the
/// complete module bytes or the first error it hit; there is no partial
/// output.
pub fn compile_image(image: &ProgramImage) -> Result<Vec<u8>, CompileError> {
    ModuleAssembler::new(image).assemble()
}

struct ModuleAssembler<'a> {
    image: &'a ProgramImage,
    builder: WasmModuleBuilder,
    /// Next free linear-memory address. Monotonic; never reused.
    memory_cursor: u32,
    /// Image directory index of an IFUNC to its compact import slot.
    import_map: FxHashMap<DirId, u32>,
}

impl<'a> ModuleAssembler<'a> {
    fn new(image: &'a ProgramImage) -> Self {
        ModuleAssembler {
            image,
            builder: WasmModuleBuilder::new(),
            memory_cursor: RESERVED_HEADER_BYTES,
            import_map: FxHashMap::default(),
        }
    }

    fn assemble(mut self) -> Result<Vec<u8>, CompileError> {
        let segregated = segregate(self.image)?;
        codegen_log!(format!(
            "[WASM] Assembling '{}': {} functions, {} imports",
            self.image.name,
            segregated.functions.len(),
            segregated.imports.len()
        ));

        let memory_index = self.builder.add_memory(MEMORY_PAGES, None);
        self.builder
            .add_memory_export(MEMORY_EXPORT_NAME, memory_index);

        // All imports first: function bodies resolve calls through the
        // import map.
        for id in &segregated.imports {
            self.register_import(self.image.directory(*id))?;
        }

        for id in &segregated.functions {
            self.lower_function(self.image.directory(*id))?;
        }

        // Trailer: record the first free address at offset 0 for the
        // runtime allocator.
        self.builder
            .add_active_data(0, self.memory_cursor.to_be_bytes().to_vec());

        let wasm_bytes = self.builder.finish()?;
        validate_module_bytes(&wasm_bytes, "lowered module")?;
        Ok(wasm_bytes)
    }

    /// Register one imported function: fresh type entry, fresh import
    /// slot, and the image-index → slot mapping used by Call lowering.
    fn register_import(&mut self, import: &Directory) -> Result<(), CompileError> {
        let (module, member) = split_import_identifier(&import.identifier)?;
        let (params, returns) = signature_of(self.image, import)?;

        let type_index = self.builder.add_function_type(params, returns);
        let slot = self.builder.add_import_function(module, member, type_index);
        self.import_map.insert(import.id, slot);

        codegen_log!(format!("[WASM] Import slot {slot}: {module}::{member}"));
        Ok(())
    }

    fn lower_function(&mut self, func: &Directory) -> Result<(), CompileError> {
        let code = lump_bytes(self.image, func, DirKind::Code)?;
        let data = lump_bytes(self.image, func, DirKind::Data)?;

        // This function's slice of linear memory starts at the cursor;
        // the next function's starts right after this data lump.
        let memory_base = self.memory_cursor;
        self.builder.add_active_data(memory_base, data.to_vec());
        self.memory_cursor += data.len() as u32;

        let (params, returns) = signature_of(self.image, func)?;
        let lowered = lower_function_body(self.image, code, memory_base, &self.import_map)?;

        let mut body = Function::new(lowered.locals);
        for instruction in &lowered.instructions {
            body.instruction(instruction);
        }

        let type_index = self.builder.add_function_type(params, returns);
        let function_index = self.builder.add_function(type_index, &body);

        let global = self
            .image
            .child_of_kind(func, DirKind::Global)
            .ok_or_else(|| {
                CompileError::malformed(format!(
                    "function '{}' has no GLOBAL child naming its export",
                    func.identifier
                ))
            })?;
        self.builder
            .add_function_export(&global.identifier, function_index);

        codegen_log!(format!(
            "[WASM] Function {} '{}': base offset {}, {} data bytes",
            function_index,
            global.identifier,
            memory_base,
            data.len()
        ));
        Ok(())
    }
}

/// Fetch a function's CODE or DATA lump content.
fn lump_bytes<'i>(
    image: &'i ProgramImage,
    func: &Directory,
    kind: DirKind,
) -> Result<&'i [u8], CompileError> {
    let lump = image.child_of_kind(func, kind).ok_or_else(|| {
        CompileError::malformed(format!(
            "function '{}' has no {} lump",
            func.identifier,
            kind.as_tag()
        ))
    })?;
    lump.content.as_deref().ok_or_else(|| {
        CompileError::malformed(format!(
            "{} lump of function '{}' has no content",
            kind.as_tag(),
            func.identifier
        ))
    })
}

/// Split an import identifier `"<module>.<member>(<params…>)"` at the
/// first `.` and the first `(`.
fn split_import_identifier(identifier: &str) -> Result<(&str, &str), CompileError> {
    let dot = identifier.find('.');
    let paren = identifier.find('(');
    match (dot, paren) {
        (Some(dot), Some(paren)) if dot < paren => {
            Ok((&identifier[..dot], &identifier[dot + 1..paren]))
        }
        _ => Err(CompileError::malformed(format!(
            "import identifier '{identifier}' is not of the form '<module>.<member>(…)'"
        ))),
    }
}
