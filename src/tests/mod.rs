use std::fs;

use crate::back::cross::translate;
use crate::back::reflect::{ImageKind, UniformKind};
use crate::back::spirv::compile_glsl;
use crate::error::ErrorFormat;
use crate::front::input::{Input, SnippetKind};
use crate::slang::{Slang, SlangSet};
use crate::{run, CompileError, Options, ToolContext};

const TRIANGLE: &str = include_str!("triangle.glsl");
const TEXTURES: &str = include_str!("textures.glsl");
const CYCLE: &str = include_str!("cycle.glsl");
const DUP_PROGRAM: &str = include_str!("dup_program.glsl");
const BLOCKS_ONLY: &str = include_str!("blocks_only.glsl");

fn slang_set(tokens: &str) -> SlangSet {
    SlangSet::parse(tokens).unwrap()
}

fn options(input: &str, output: &str, slang: &str) -> Options {
    Options {
        input: input.to_string(),
        output: output.to_string(),
        slang: slang_set(slang),
        byte_code: false,
        debug_dump: false,
        no_ifdef: false,
        gen_version: 1,
        error_format: ErrorFormat::Gcc,
    }
}

#[test]
fn triangle_parses_with_resolved_includes() {
    let inp = Input::parse_source("triangle.glsl", TRIANGLE);
    assert!(inp.is_valid(), "{:?}", inp.errors);
    assert_eq!(inp.snippets.len(), 3);
    assert_eq!(inp.snippets[0].kind, SnippetKind::Block);
    let vs = &inp.snippets[inp.vs_map["vs"]];
    // the @include_block splices the block body lines ahead of the own lines
    assert_eq!(&vs.lines[..3], &[3, 4, 5]);
    assert!(vs.lines[3..].iter().all(|&i| i >= 10));
    assert_eq!(inp.type_map["my_mat4"], "mat4");
    assert_eq!(inp.programs["triangle"].vs_name, "vs");
}

#[test]
fn blocks_only_is_a_valid_input_without_programs() {
    let inp = Input::parse_source("blocks_only.glsl", BLOCKS_ONLY);
    assert!(inp.is_valid(), "{:?}", inp.errors);
    assert_eq!(inp.snippets.len(), 2);
    assert!(inp.programs.is_empty());
}

#[test]
fn include_cycle_is_an_input_error() {
    let inp = Input::parse_source("cycle.glsl", CYCLE);
    assert!(!inp.is_valid());
    // block 'b' is a forward reference while 'a' closes
    assert!(inp.errors.iter().any(|e| e.line_index == Some(1)));
    let failure = CompileError::Input(inp.errors);
    assert_eq!(failure.exit_code(), 20);
}

#[test]
fn duplicate_program_is_an_input_error() {
    let inp = Input::parse_source("dup_program.glsl", DUP_PROGRAM);
    assert_eq!(inp.errors.len(), 1);
    assert_eq!(inp.errors[0].line_index, Some(13));
    assert!(inp.errors[0].message.contains("duplicate program 'p'"));
}

#[test]
fn blocks_produce_no_spirv() {
    let inp = Input::parse_source("blocks_only.glsl", BLOCKS_ONLY);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(spirv.errors.is_empty(), "{:?}", spirv.errors);
    assert!(spirv.blobs.is_empty());
}

#[test]
fn minimal_program_end_to_end() {
    let inp = Input::parse_source("triangle.glsl", TRIANGLE);
    assert!(inp.is_valid(), "{:?}", inp.errors);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(spirv.errors.is_empty(), "{:?}", spirv.errors);
    assert_eq!(spirv.blobs.len(), 2);

    let set = slang_set("glsl330");
    let cross = translate(&inp, &spirv, set);
    assert!(cross.errors.is_empty(), "{:?}", cross.errors);

    let vs_index = inp.vs_map["vs"];
    let vs = cross.find_source(Slang::Glsl330, vs_index).unwrap();
    let refl = &vs.reflection;
    assert_eq!(refl.entry_point, "main");
    assert_eq!(refl.attrs.len(), 2);
    assert_eq!(refl.attrs[0].slot, 0);
    assert_eq!(refl.attrs[0].name, "position");
    assert_eq!(refl.attrs[0].sem_name, "TEXCOORD");
    assert_eq!(refl.attrs[1].slot, 1);
    assert_eq!(refl.attrs[1].name, "texcoord0");
    assert_eq!(refl.uniform_blocks.len(), 1);
    let block = &refl.uniform_blocks[0];
    assert_eq!(block.name, "params");
    assert_eq!(block.slot, 0);
    assert_eq!(block.byte_size, 64);
    assert_eq!(block.uniforms.len(), 1);
    assert_eq!(block.uniforms[0].name, "mvp");
    assert_eq!(block.uniforms[0].kind, UniformKind::Mat4);
    assert_eq!(block.uniforms[0].offset, 0);

    let fs_index = inp.fs_map["fs"];
    let fs = cross.find_source(Slang::Glsl330, fs_index).unwrap();
    assert_eq!(fs.reflection.images.len(), 1);
    assert_eq!(fs.reflection.images[0].name, "tex");
    assert_eq!(fs.reflection.images[0].slot, 0);
    assert_eq!(fs.reflection.images[0].kind, ImageKind::Tex2D);
    assert!(!fs.source_code.is_empty());
}

#[test]
fn multi_target_reflection_is_consistent() {
    let inp = Input::parse_source("triangle.glsl", TRIANGLE);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(spirv.errors.is_empty(), "{:?}", spirv.errors);

    let set = slang_set("glsl330:hlsl5:metal_macos");
    let cross = translate(&inp, &spirv, set);
    assert!(cross.errors.is_empty(), "{:?}", cross.errors);

    let vs_index = inp.vs_map["vs"];
    let glsl = cross.find_source(Slang::Glsl330, vs_index).unwrap();
    let hlsl = cross.find_source(Slang::Hlsl5, vs_index).unwrap();
    let msl = cross.find_source(Slang::MetalMacos, vs_index).unwrap();
    assert_eq!(glsl.reflection.mismatch(&hlsl.reflection), None);
    assert_eq!(glsl.reflection.mismatch(&msl.reflection), None);
    // MSL renames the entry point, which is not a mismatch
    assert_eq!(msl.reflection.entry_point, "main0");
    assert_ne!(glsl.source_code, hlsl.source_code);
}

#[test]
fn image_kinds_cover_all_view_dimensions() {
    let inp = Input::parse_source("textures.glsl", TEXTURES);
    assert!(inp.is_valid(), "{:?}", inp.errors);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(spirv.errors.is_empty(), "{:?}", spirv.errors);

    let cross = translate(&inp, &spirv, slang_set("glsl330"));
    assert!(cross.errors.is_empty(), "{:?}", cross.errors);
    let fs = cross.find_source(Slang::Glsl330, inp.fs_map["fs"]).unwrap();
    let images = &fs.reflection.images;
    assert_eq!(images.len(), 4);
    assert_eq!(images[0].kind, ImageKind::Tex2D);
    assert_eq!(images[1].kind, ImageKind::Tex3D);
    assert_eq!(images[2].kind, ImageKind::Cube);
    assert_eq!(images[3].kind, ImageKind::Array);
    // slots follow the declared bindings and stay dense
    for (index, image) in images.iter().enumerate() {
        assert_eq!(image.slot as usize, index);
    }
}

#[test]
fn gles2_flattens_uniform_blocks_but_keeps_logical_reflection() {
    let inp = Input::parse_source("triangle.glsl", TRIANGLE);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(spirv.errors.is_empty(), "{:?}", spirv.errors);

    let cross = translate(&inp, &spirv, slang_set("glsl100"));
    assert!(cross.errors.is_empty(), "{:?}", cross.errors);
    let vs = cross.find_source(Slang::Glsl100, inp.vs_map["vs"]).unwrap();
    // no UBO declaration survives in GLES2 output
    assert!(!vs.source_code.contains("layout(std140)"));
    // but the reflection still reports the logical block
    assert_eq!(vs.reflection.uniform_blocks.len(), 1);
    assert_eq!(vs.reflection.uniform_blocks[0].name, "params");
}

#[test]
fn translation_is_deterministic() {
    let inp = Input::parse_source("triangle.glsl", TRIANGLE);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    let set = slang_set("glsl330:hlsl5:metal_macos");
    let first = translate(&inp, &spirv, set);
    let second = translate(&inp, &spirv, set);
    for slang in set.iter() {
        let a = &first.sources[slang.index()];
        let b = &second.sources[slang.index()];
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            let (x, y) = (x.as_ref().unwrap(), y.as_ref().unwrap());
            assert_eq!(x.source_code, y.source_code);
            assert_eq!(x.reflection, y.reflection);
        }
    }
}

#[test]
fn glsl_compile_errors_point_at_original_lines() {
    // line 2 of the snippet body references an undeclared identifier
    let source = "@vs vs\nlayout(location=0) in vec4 pos;\nvoid main() {\n    gl_Position = pos * oops;\n}\n@end\n@fs fs\nlayout(location=0) out vec4 c;\nvoid main() { c = vec4(1.0); }\n@end\n@program p vs fs\n";
    let inp = Input::parse_source("broken.glsl", source);
    assert!(inp.is_valid(), "{:?}", inp.errors);
    let ctx = ToolContext::acquire().unwrap();
    let spirv = compile_glsl(&ctx, &inp);
    assert!(!spirv.errors.is_empty());
    assert_eq!(spirv.blobs.len(), 1);
    let report = &spirv.errors[0];
    assert_eq!(report.file, "broken.glsl");
    // the #line markers map the diagnostic back to the authored line
    assert_eq!(report.line_index, Some(3));
    let failure = CompileError::Spirv(spirv.errors);
    assert_eq!(failure.exit_code(), 30);
}

#[test]
fn run_writes_header_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("triangle.glsl");
    let output_path = dir.path().join("triangle.h");
    fs::write(&input_path, TRIANGLE).unwrap();
    let opts = options(
        input_path.to_str().unwrap(),
        output_path.to_str().unwrap(),
        "glsl330:hlsl5:metal_macos",
    );

    run(&opts).unwrap();
    let first = fs::read_to_string(&output_path).unwrap();
    assert!(first.contains("#pragma once"));
    assert!(first.contains("#define ATTR_triangle_position (0)"));
    assert!(first.contains("#define UB_triangle_vs_params_size (64)"));
    assert!(first.contains("#define IMG_triangle_fs_tex_slot (0)"));
    assert!(first.contains("triangle_vs_glsl330_source"));
    assert!(first.contains("triangle_fs_hlsl5_source"));
    assert!(first.contains("triangle_vs_metal_macos_source"));

    run(&opts).unwrap();
    let second = fs::read_to_string(&output_path).unwrap();
    assert_eq!(first, second);
}

#[test]
fn run_maps_parse_errors_to_the_input_stage() {
    let dir = tempfile::tempdir().unwrap();
    let input_path = dir.path().join("cycle.glsl");
    let output_path = dir.path().join("cycle.h");
    fs::write(&input_path, CYCLE).unwrap();
    let opts = options(
        input_path.to_str().unwrap(),
        output_path.to_str().unwrap(),
        "glsl330",
    );
    let err = run(&opts).unwrap_err();
    assert!(matches!(err, CompileError::Input(_)));
    assert_eq!(err.exit_code(), 20);
    assert!(!err.reports().is_empty());
    // no partial output is written on failure
    assert!(!output_path.exists());
}

#[test]
fn missing_input_file_is_an_input_error() {
    let opts = options("/nonexistent/path.glsl", "/tmp/never.h", "glsl330");
    let err = run(&opts).unwrap_err();
    assert!(matches!(err, CompileError::Input(_)));
    assert_eq!(err.exit_code(), 20);
}
