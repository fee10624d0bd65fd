//! # WASM lowering backend
//!
//! Translates a segregated program image into a WebAssembly module:
//!
//! - `opcodes`: the source instruction set and a cursor over CODE lumps.
//! - `signatures`: declared type names / type tags to WASM value slots.
//! - `type_stack`: the per-function compile-time type declaration stack.
//! - `lower`: one function body's bytecode to locals + instructions.
//! - `module_builder`: wasm_encoder section accumulation and ordering.
//! - `assembler`: the orchestrating pass; owns the memory cursor and
//!   the import map. Entry point for the whole backend.
//! - `validator`: wasmparser validation of the finished bytes.

pub mod assembler;
pub mod lower;
pub mod module_builder;
pub mod opcodes;
pub mod signatures;
pub mod type_stack;
pub mod validator;
