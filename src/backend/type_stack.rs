//! The compile-time type declaration stack.
//!
//! `LdType` and `LdPType` push local-variable type declarations while a
//! function body is decoded; the matching `EnterFrame` drains them to
//! build the frame's locals list. The stack is byte-addressable: struct
//! type ids occupy four bytes, primitive tags one, so pops must mirror
//! pushes exactly or the recovered declarations are garbage.
//!
//! One stack exists per function lowering and is passed explicitly
//! through the decode loop. It must be fully drained by the end of the
//! body; leftovers mean the frontend emitted declarations that no
//! `EnterFrame` consumed.

use crate::backend::opcodes::TypeTag;
use crate::errors::CompileError;

#[derive(Debug, Default)]
pub struct TypeDeclStack {
    bytes: Vec<u8>,
}

impl TypeDeclStack {
    pub fn new() -> TypeDeclStack {
        TypeDeclStack { bytes: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn push_struct_id(&mut self, id: u32) {
        self.bytes.extend_from_slice(&id.to_le_bytes());
    }

    pub fn push_primitive(&mut self, tag: TypeTag) {
        self.bytes.push(tag as u8);
    }

    pub fn pop_struct_id(&mut self) -> Result<u32, CompileError> {
        if self.bytes.len() < 4 {
            return Err(CompileError::malformed(
                "type declaration stack underflow while popping a struct type id",
            ));
        }
        let at = self.bytes.len() - 4;
        let tail = self.bytes.split_off(at);
        Ok(u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]))
    }

    pub fn pop_primitive(&mut self) -> Result<TypeTag, CompileError> {
        let byte = self.bytes.pop().ok_or_else(|| {
            CompileError::malformed(
                "type declaration stack underflow while popping a primitive tag",
            )
        })?;
        TypeTag::from_byte(byte).ok_or_else(|| {
            CompileError::malformed(format!(
                "type declaration stack held {byte:#04x}, which is not a primitive type tag"
            ))
        })
    }
}
