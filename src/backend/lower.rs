//! Bytecode lowering: one function's CODE lump to WASM locals and
//! instructions.
//!
//! A single forward decode pass. The only side state is the type
//! declaration stack, which collects `LdType`/`LdPType` declarations
//! until the matching `EnterFrame` drains them into the locals list.
//! String constants are rebased onto the function's slice of linear
//! memory: the instruction encodes an offset relative to the function's
//! DATA lump, and the emitted constant is `memory_base + offset`.
//!
//! Anything the decoder does not recognize fails the whole pass. An
//! unknown opcode is either a frontend/backend version mismatch or a new
//! instruction nobody wired in here yet; guessing would produce a
//! silently-wrong module.

use crate::backend::opcodes::{ByteReader, Opcode, TypeTag};
use crate::backend::signatures::local_slots_for_tag;
use crate::backend::type_stack::TypeDeclStack;
use crate::codegen_log;
use crate::errors::CompileError;
use crate::image::{DirId, DirKind, ProgramImage};
use rustc_hash::FxHashMap;
use wasm_encoder::{Instruction, ValType};

/// The lowered form of one function body: a locals list in
/// wasm_encoder's run-length shape, and the translated instructions.
#[derive(Debug)]
pub struct LoweredFunction {
    pub locals: Vec<(u32, ValType)>,
    pub instructions: Vec<Instruction<'static>>,
}

/// Lower one function's bytecode stream.
///
/// `memory_base` is the absolute address the function's DATA lump was
/// placed at; `import_map` maps image directory indices to compact
/// import slots and must be fully populated before any body is lowered.
pub fn lower_function_body(
    image: &ProgramImage,
    bytecode: &[u8],
    memory_base: u32,
    import_map: &FxHashMap<DirId, u32>,
) -> Result<LoweredFunction, CompileError> {
    let mut reader = ByteReader::new(bytecode);
    let mut type_stack = TypeDeclStack::new();
    let mut locals: Vec<(u32, ValType)> = Vec::new();
    let mut instructions: Vec<Instruction<'static>> = Vec::new();

    while !reader.is_at_end() {
        let at = reader.position();
        let byte = reader.read_u8()?;
        let opcode = Opcode::from_byte(byte).ok_or_else(|| {
            CompileError::malformed(format!(
                "unknown opcode {byte:#04x} at offset {at}; not wired into this backend"
            ))
        })?;

        match opcode {
            Opcode::Nop => instructions.push(Instruction::Nop),

            // Decode-time sentinels for corrupt or unfinished frontend
            // output; they must trap if ever reached at runtime.
            Opcode::Illegal | Opcode::Invalid => instructions.push(Instruction::Unreachable),

            Opcode::LdConst => {
                let tag_byte = reader.read_u8()?;
                let tag = TypeTag::from_byte(tag_byte).ok_or_else(|| {
                    CompileError::malformed(format!(
                        "unknown constant type tag {tag_byte:#04x} at offset {at}"
                    ))
                })?;

                match tag {
                    TypeTag::Str => {
                        // Relative offset into the function's DATA lump
                        let rel = reader.read_u32()?;
                        instructions
                            .push(Instruction::I32Const(memory_base.wrapping_add(rel) as i32));
                    }
                    TypeTag::I8 => {
                        instructions.push(Instruction::I32Const(reader.read_i8()? as i32));
                    }
                    TypeTag::I16 => {
                        instructions.push(Instruction::I32Const(reader.read_i16()? as i32));
                    }
                    TypeTag::I32 => {
                        instructions.push(Instruction::I32Const(reader.read_i32()?));
                    }
                    TypeTag::I64 => {
                        instructions.push(Instruction::I64Const(reader.read_i64()?));
                    }
                    _ => {
                        return Err(CompileError::malformed(format!(
                            "constant load with unsupported type tag {tag:?} at offset {at}"
                        )));
                    }
                }
            }

            // Compile-time only: no output instruction
            Opcode::LdType => type_stack.push_struct_id(reader.read_u32()?),
            Opcode::LdPType => {
                let tag_byte = reader.read_u8()?;
                let tag = TypeTag::from_byte(tag_byte).ok_or_else(|| {
                    CompileError::malformed(format!(
                        "unknown primitive type tag {tag_byte:#04x} at offset {at}"
                    ))
                })?;
                type_stack.push_primitive(tag);
            }

            Opcode::LdLocal => {
                instructions.push(Instruction::LocalGet(reader.read_u16()? as u32));
            }
            Opcode::SetLocal => {
                instructions.push(Instruction::LocalSet(reader.read_u16()? as u32));
            }

            Opcode::EnterFrame => {
                let struct_count = reader.read_u16()?;
                let prim_count = reader.read_u16()?;

                enter_frame(
                    &mut type_stack,
                    struct_count,
                    prim_count,
                    &mut locals,
                )?;
            }

            // Frame teardown is implicit in the body's scoping
            Opcode::LeaveFrame => {}

            Opcode::Call => {
                let target_index = reader.read_u32()?;
                let target = image.resolve(target_index).ok_or_else(|| {
                    CompileError::malformed(format!(
                        "call target {target_index} is outside the image's index space"
                    ))
                })?;

                match target.kind {
                    DirKind::IFunc => {
                        let slot = import_map.get(&target.id).ok_or_else(|| {
                            CompileError::unresolved(format!(
                                "call target '{}' was never registered as an import",
                                target.identifier
                            ))
                        })?;
                        instructions.push(Instruction::Call(*slot));
                    }
                    DirKind::Func => {
                        return Err(CompileError::unsupported(format!(
                            "direct call to module-local function '{}'; intra-module calls are not lowered yet",
                            target.identifier
                        )));
                    }
                    other => {
                        return Err(CompileError::malformed(format!(
                            "call target '{}' is a {} directory, not a callable",
                            target.identifier,
                            other.as_tag()
                        )));
                    }
                }
            }

            // The target's implicit-return convention: ending the body
            // block returns whatever the stack holds
            Opcode::Ret => instructions.push(Instruction::End),
        }
    }

    if !type_stack.is_empty() {
        return Err(CompileError::malformed(format!(
            "{} byte(s) of type declarations were never consumed by an EnterFrame",
            type_stack.len()
        )));
    }

    codegen_log!(format!(
        "[WASM] Lowered body: {} locals runs, {} instructions",
        locals.len(),
        instructions.len()
    ));

    Ok(LoweredFunction {
        locals,
        instructions,
    })
}

/// Drain the type declaration stack into the locals list.
///
/// Declarations were pushed structs-first, so primitives sit on top and
/// come off first; both popped lists are newest-first and must be
/// reversed to restore declaration order.
fn enter_frame(
    type_stack: &mut TypeDeclStack,
    struct_count: u16,
    prim_count: u16,
    locals: &mut Vec<(u32, ValType)>,
) -> Result<(), CompileError> {
    let mut primitives = Vec::with_capacity(prim_count as usize);
    for _ in 0..prim_count {
        primitives.push(type_stack.pop_primitive()?);
    }
    primitives.reverse();

    let mut struct_ids = Vec::with_capacity(struct_count as usize);
    for _ in 0..struct_count {
        struct_ids.push(type_stack.pop_struct_id()?);
    }
    struct_ids.reverse();

    if let Some(first) = struct_ids.first() {
        // TODO: lower struct-typed locals once struct layout lands in the
        // memory model; until then refusing is safer than dropping them.
        return Err(CompileError::unsupported(format!(
            "frame declares {} struct-typed local(s) (first type id {first}); struct locals are not lowered yet",
            struct_ids.len()
        )));
    }

    for tag in primitives {
        locals.push(local_slots_for_tag(tag)?);
    }

    Ok(())
}
