//! # Vesper WASM backend
//!
//! Lowers a compiled Vesper program image (the directory-tree container
//! produced by the frontend and evaluator) into an executable WebAssembly
//! module, encoded with the wasm_encoder library.
//!
//! The pass is a single synchronous walk over the image:
//!
//! ```text
//! Program Image → Segregation → Import registration → Function lowering → WASM bytes
//!        ↓              ↓               ↓                     ↓              ↓
//!    Directories    FUNC/TYPE/      Type + import         Signatures     Validated
//!    (arena)        IMPORT lists    slots                 Locals         module
//!                                                         Instructions
//! ```
//!
//! Imports are always registered before any function body is lowered,
//! because call instructions resolve through the import map. Function
//! data lumps are appended to linear memory in visiting order behind a
//! monotonic cursor, so lowering is deliberately order-sensitive and
//! single-threaded.
//!
//! Entry point: [`compile_image`]. Any failure aborts the whole pass and
//! produces no module.

pub mod backend;
pub mod dev_logging;
pub mod errors;
pub mod image;

pub use backend::assembler::compile_image;
pub use errors::{CompileError, ErrorKind};
pub use image::{DirId, DirKind, Directory, ImageBuilder, ProgramImage};
