//! End-to-end tests: build a program image, lower it, and check the
//! produced module section by section with wasmparser.

use vesper_wasm_backend::{DirId, DirKind, ImageBuilder, compile_image};
use wasmparser::{DataKind, ExternalKind, Operator, Parser, Payload, TypeRef};

/// Opcode bytes of the source instruction set, as the frontend emits them.
mod op {
    pub const LD_CONST: u8 = 0x03;
    pub const LD_PTYPE: u8 = 0x05;
    pub const ENTER_FRAME: u8 = 0x08;
    pub const CALL: u8 = 0x0A;
    pub const RET: u8 = 0x0B;

    pub const TAG_I32: u8 = 4;
    pub const TAG_I64: u8 = 5;
    pub const TAG_STR: u8 = 16;
}

/// Add a FUNC directory with its CODE, DATA and GLOBAL children.
/// `params` are canonical type names; `ret` is the return type name.
fn add_function(
    b: &mut ImageBuilder,
    parent: DirId,
    name: &str,
    export_name: &str,
    code: Vec<u8>,
    data: Vec<u8>,
    params: &[&str],
    ret: Option<&str>,
) -> DirId {
    let func = b.add(parent, DirKind::Func, name);
    for (i, ty) in params.iter().enumerate() {
        let param = b.add(func, DirKind::Param, format!("p{i}"));
        b.add(param, DirKind::Type, *ty);
    }
    if let Some(ret) = ret {
        b.add(func, DirKind::Ret, ret);
    }
    b.add_lump(func, DirKind::Code, "main", code);
    b.add_lump(func, DirKind::Data, "main", data);
    b.add(func, DirKind::Global, export_name);
    func
}

fn add_import(b: &mut ImageBuilder, group: DirId, identifier: &str, params: &[&str]) -> DirId {
    let ifunc = b.add(group, DirKind::IFunc, identifier);
    for (i, ty) in params.iter().enumerate() {
        let param = b.add(ifunc, DirKind::Param, format!("p{i}"));
        b.add(param, DirKind::Type, *ty);
    }
    b.add(ifunc, DirKind::Ret, "Std.Types.Void");
    ifunc
}

fn data_segments(wasm: &[u8]) -> Vec<(u32, Vec<u8>)> {
    let mut segments = Vec::new();
    for payload in Parser::new(0).parse_all(wasm) {
        if let Payload::DataSection(reader) = payload.expect("module should parse") {
            for entry in reader {
                let entry = entry.expect("data entry should parse");
                let offset = match entry.kind {
                    DataKind::Active { offset_expr, .. } => {
                        let mut ops = offset_expr.get_operators_reader();
                        match ops.read().expect("offset expression") {
                            Operator::I32Const { value } => value as u32,
                            other => panic!("non-constant segment offset: {other:?}"),
                        }
                    }
                    DataKind::Passive => panic!("unexpected passive data segment"),
                };
                segments.push((offset, entry.data.to_vec()));
            }
        }
    }
    segments
}

fn func_types(wasm: &[u8]) -> Vec<(Vec<wasmparser::ValType>, Vec<wasmparser::ValType>)> {
    let mut types = Vec::new();
    for payload in Parser::new(0).parse_all(wasm) {
        if let Payload::TypeSection(reader) = payload.expect("module should parse") {
            for ty in reader.into_iter_err_on_gc_types() {
                let ty = ty.expect("function type should parse");
                types.push((ty.params().to_vec(), ty.results().to_vec()));
            }
        }
    }
    types
}

fn exports(wasm: &[u8]) -> Vec<(String, ExternalKind, u32)> {
    let mut exports = Vec::new();
    for payload in Parser::new(0).parse_all(wasm) {
        if let Payload::ExportSection(reader) = payload.expect("module should parse") {
            for export in reader {
                let export = export.expect("export should parse");
                exports.push((export.name.to_string(), export.kind, export.index));
            }
        }
    }
    exports
}

#[test]
fn imports_get_slots_in_registration_order() {
    let mut b = ImageBuilder::new("app");
    let root = b.root();
    b.add(root, DirKind::Project, "app");
    let group = b.add(root, DirKind::Import, "env");
    add_import(
        &mut b,
        group,
        "env.log(Std.Types.UnsignedInteger32)",
        &["Std.Types.UnsignedInteger32"],
    );
    add_import(&mut b, group, "env.abort()", &[]);
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    // The import section reader yields groups; each group yields the
    // individual import entries.
    let mut imports = Vec::new();
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::ImportSection(reader) = payload.expect("module should parse") {
            for group in reader {
                for entry in group.expect("import group should parse") {
                    let (_, import) = entry.expect("import should parse");
                    imports.push((
                        import.module.to_string(),
                        import.name.to_string(),
                        import.ty,
                    ));
                }
            }
        }
    }

    // Slot 0 is the first import registered, slot 1 the second
    assert_eq!(imports.len(), 2);
    assert_eq!(imports[0].0, "env");
    assert_eq!(imports[0].1, "log");
    assert_eq!(imports[1].1, "abort");

    // Each import declared its own type, in the same order
    assert_eq!(imports[0].2, TypeRef::Func(0));
    assert_eq!(imports[1].2, TypeRef::Func(1));
    let types = func_types(&wasm);
    assert_eq!(types[0], (vec![wasmparser::ValType::I32], vec![]));
    assert_eq!(types[1], (vec![], vec![]));
}

#[test]
fn string_constant_round_trips_through_the_data_segment() {
    // main returns the address of "hi"; its DATA lump lands at offset 4
    let code = vec![
        op::LD_CONST,
        op::TAG_STR,
        0,
        0,
        0,
        0, // relative offset 0
        op::RET,
    ];
    let mut b = ImageBuilder::new("app");
    let root = b.root();
    let project = b.add(root, DirKind::Project, "app");
    add_function(
        &mut b,
        project,
        "main",
        "main",
        code,
        b"hi".to_vec(),
        &[],
        Some("Std.Types.SignedInteger32"),
    );
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    let segments = data_segments(&wasm);
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0], (4, b"hi".to_vec()));
    // Trailer: final cursor 4 + 2, big-endian, at the reserved word
    assert_eq!(segments[1], (0, 6u32.to_be_bytes().to_vec()));

    // Reading back through the emitted address recovers the constant
    let (addr, bytes) = &segments[0];
    assert_eq!(&bytes[..], &b"hi"[..]);
    assert_eq!(*addr, 4);

    let exports = exports(&wasm);
    assert!(
        exports
            .iter()
            .any(|(name, kind, _)| name == "mem" && *kind == ExternalKind::Memory)
    );
    assert!(
        exports
            .iter()
            .any(|(name, kind, index)| name == "main" && *kind == ExternalKind::Func && *index == 0)
    );
}

#[test]
fn base_offsets_chain_across_functions() {
    let mut b = ImageBuilder::new("app");
    let root = b.root();
    let project = b.add(root, DirKind::Project, "app");
    add_function(
        &mut b,
        project,
        "f",
        "f",
        vec![op::RET],
        vec![1, 2, 3],
        &[],
        None,
    );
    add_function(
        &mut b,
        project,
        "g",
        "g",
        vec![op::RET],
        vec![4, 5, 6, 7, 8],
        &[],
        None,
    );
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    let segments = data_segments(&wasm);
    assert_eq!(segments.len(), 3);
    // First function starts at the reserved header size
    assert_eq!(segments[0].0, 4);
    // Each base offset is the previous base plus the previous lump's length
    assert_eq!(segments[1].0, 4 + 3);
    assert_eq!(segments[2], (0, 12u32.to_be_bytes().to_vec()));
}

#[test]
fn function_types_derive_params_and_results_from_their_own_children() {
    // PARAM children populate the parameter list and the RET child the
    // result list. (The upstream evaluator once emitted these swapped;
    // the correct orientation is pinned here.)
    let mut code = vec![op::LD_CONST, op::TAG_I64];
    code.extend(1i64.to_le_bytes());
    code.push(op::RET);

    let mut b = ImageBuilder::new("app");
    let root = b.root();
    let project = b.add(root, DirKind::Project, "app");
    add_function(
        &mut b,
        project,
        "f",
        "f",
        code,
        Vec::new(),
        &["Std.Types.UnsignedInteger32"],
        Some("Std.Types.SignedInteger64"),
    );
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    let types = func_types(&wasm);
    assert_eq!(types.len(), 1);
    assert_eq!(types[0].0, vec![wasmparser::ValType::I32]);
    assert_eq!(types[0].1, vec![wasmparser::ValType::I64]);
}

#[test]
fn calls_encode_through_the_import_map() {
    let mut b = ImageBuilder::new("app");
    let root = b.root();
    let project = b.add(root, DirKind::Project, "app");
    let group = b.add(root, DirKind::Import, "env");
    let log = add_import(
        &mut b,
        group,
        "env.log(Std.Types.UnsignedInteger32)",
        &["Std.Types.UnsignedInteger32"],
    );

    let mut code = vec![op::LD_CONST, op::TAG_I32];
    code.extend(42i32.to_le_bytes());
    code.push(op::CALL);
    code.extend(log.index().to_le_bytes());
    code.push(op::RET);
    add_function(&mut b, project, "main", "main", code, Vec::new(), &[], None);
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    let mut body_ops = Vec::new();
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::CodeSectionEntry(body) = payload.expect("module should parse") {
            for op in body
                .get_operators_reader()
                .expect("operators should parse")
            {
                body_ops.push(op.expect("operator should parse"));
            }
        }
    }

    assert!(matches!(body_ops[0], Operator::I32Const { value: 42 }));
    assert!(matches!(body_ops[1], Operator::Call { function_index: 0 }));
    assert!(matches!(body_ops[2], Operator::End));
}

#[test]
fn frame_locals_appear_in_declaration_order() {
    let code = vec![
        op::LD_PTYPE,
        op::TAG_I32,
        op::LD_PTYPE,
        op::TAG_I64,
        op::ENTER_FRAME,
        0,
        0, // struct count 0
        2,
        0, // primitive count 2
        op::RET,
    ];
    let mut b = ImageBuilder::new("app");
    let root = b.root();
    let project = b.add(root, DirKind::Project, "app");
    add_function(&mut b, project, "f", "f", code, Vec::new(), &[], None);
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    let mut locals = Vec::new();
    for payload in Parser::new(0).parse_all(&wasm) {
        if let Payload::CodeSectionEntry(body) = payload.expect("module should parse") {
            for local in body.get_locals_reader().expect("locals should parse") {
                locals.push(local.expect("local run should parse"));
            }
        }
    }

    assert_eq!(
        locals,
        [
            (1, wasmparser::ValType::I32),
            (1, wasmparser::ValType::I64)
        ]
    );
}

#[test]
fn an_image_with_no_functions_still_produces_a_loadable_module() {
    let mut b = ImageBuilder::new("empty");
    let root = b.root();
    b.add(root, DirKind::Project, "empty");
    let image = b.finish();

    let wasm = compile_image(&image).expect("compilation should succeed");

    // Memory export plus the trailer recording an untouched cursor
    let segments = data_segments(&wasm);
    assert_eq!(segments, [(0, 4u32.to_be_bytes().to_vec())]);
    let exports = exports(&wasm);
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].0, "mem");
}
