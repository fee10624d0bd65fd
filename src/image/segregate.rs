//! Image segregation: one walk over the program image that partitions it
//! into the three sequences the assembler consumes.
//!
//! Function and type directories may be nested arbitrarily deep under
//! organizational directories (namespaces), so they are collected by a
//! full depth-first descent from the PROJECT root. Imports are different:
//! the frontend declares them once, directly under the container root,
//! so every top-level IMPORT directory's immediate children are flattened
//! into the import sequence without any descent.

use crate::errors::CompileError;
use crate::image::{DirId, DirKind, ProgramImage};

/// The three ordered slices of the image the assembler works from.
#[derive(Debug)]
pub struct SegregatedImage {
    pub functions: Vec<DirId>,
    pub types: Vec<DirId>,
    pub imports: Vec<DirId>,
}

/// Partition the image into function, type and import directories.
///
/// An image with zero functions or zero imports is valid and yields
/// empty sequences. A missing PROJECT directory is not: the frontend
/// always emits one, even for an empty program.
pub fn segregate(image: &ProgramImage) -> Result<SegregatedImage, CompileError> {
    let root = image.root();

    let project = image.child_of_kind(root, DirKind::Project).ok_or_else(|| {
        CompileError::malformed(format!(
            "program image '{}' has no PROJECT directory under its root",
            image.name
        ))
    })?;

    let mut functions = Vec::new();
    let mut types = Vec::new();

    // Preorder walk; children pushed in reverse so they pop in
    // declaration order.
    let mut worklist: Vec<DirId> = project.children.iter().rev().copied().collect();
    while let Some(id) = worklist.pop() {
        let dir = image.directory(id);

        match dir.kind {
            DirKind::Func => functions.push(id),
            DirKind::Type => types.push(id),
            _ => {}
        }

        worklist.extend(dir.children.iter().rev().copied());
    }

    let mut imports = Vec::new();
    for group in image.children_of_kind(root, DirKind::Import) {
        imports.extend(group.children.iter().copied());
    }

    Ok(SegregatedImage {
        functions,
        types,
        imports,
    })
}
