use std::fs;

use log::debug;

use crate::back::bytecode::BytecodeOutput;
use crate::back::cross::CrossOutput;
use crate::error::{ErrorReport, Severity};
use crate::front::input::{Input, Program};
use crate::slang::{Slang, SlangSet};
use crate::Options;

/// Generate the C header consuming all previous stage outputs.
///
/// Nothing is written unless every (program, target) pair resolved to a
/// translated source.
pub fn generate(
    opts: &Options,
    inp: &Input,
    cross: &CrossOutput,
    bytecode: &BytecodeOutput,
) -> Result<(), Vec<ErrorReport>> {
    let errors = check_programs(inp, cross, opts.slang);
    if !errors.is_empty() {
        return Err(errors);
    }
    let content = build_header(opts, inp, cross, bytecode);
    debug!("writing {} bytes to {}", content.len(), opts.output);
    fs::write(&opts.output, content).map_err(|err| {
        vec![ErrorReport::without_line(
            opts.output.clone(),
            format!("failed to write output file: {}", err),
        )]
    })
}

/// Every program must have both of its shaders translated for every
/// requested target; a missing source is reported at the vertex snippet's
/// first line.
fn check_programs(inp: &Input, cross: &CrossOutput, slang_set: SlangSet) -> Vec<ErrorReport> {
    let mut errors = Vec::new();
    for slang in slang_set.iter() {
        for program in inp.programs.values() {
            let vs_index = inp.vs_map[&program.vs_name];
            let fs_index = inp.fs_map[&program.fs_name];
            let vs_line = inp.snippets[vs_index].first_line();
            if cross.find_source(slang, vs_index).is_none() {
                errors.push(link_error(inp, vs_line, slang, "vertex", &program.vs_name, program));
            }
            if cross.find_source(slang, fs_index).is_none() {
                errors.push(link_error(inp, vs_line, slang, "fragment", &program.fs_name, program));
            }
        }
    }
    errors
}

fn link_error(
    inp: &Input,
    line_index: Option<usize>,
    slang: Slang,
    stage_word: &str,
    shader_name: &str,
    program: &Program,
) -> ErrorReport {
    ErrorReport {
        file: inp.path.clone(),
        line_index,
        message: format!(
            "no generated '{}' source for {} shader '{}' in program '{}'",
            slang.as_str(),
            stage_word,
            shader_name,
            program.name
        ),
        severity: Severity::Error,
    }
}

struct Writer {
    buffer: String,
}

impl Writer {
    fn new() -> Writer {
        Writer {
            buffer: String::new(),
        }
    }

    fn line(&mut self, text: &str) {
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    fn blank(&mut self) {
        self.buffer.push('\n');
    }
}

fn build_header(
    opts: &Options,
    inp: &Input,
    cross: &CrossOutput,
    bytecode: &BytecodeOutput,
) -> String {
    let mut w = Writer::new();
    w.line("/* machine generated by shdc, do not edit */");
    w.line("#pragma once");
    w.line(&format!("/* generator version: {} */", opts.gen_version));
    w.line(&format!("/* targets: {} */", opts.slang));
    w.line("#include <stdint.h>");
    w.line("#include <stddef.h>");
    w.blank();

    // reflection constants come from the canonical target; the
    // translation stage has already enforced agreement across targets
    if let Some(canonical) = canonical_slang(opts.slang) {
        for program in inp.programs.values() {
            emit_program_reflection(&mut w, inp, cross, canonical, program);
        }
    }

    for slang in opts.slang.iter() {
        if !opts.no_ifdef {
            w.line(&format!("#if defined({})", backend_guard(slang)));
        }
        for program in inp.programs.values() {
            for (stage_name, snippet_index) in program_stages(inp, program) {
                let ident = format!(
                    "{}_{}_{}",
                    sanitize(&program.name),
                    stage_name,
                    slang.as_str()
                );
                match bytecode.find_blob(slang, snippet_index) {
                    Some(blob) => emit_byte_array(&mut w, &ident, &blob.bytes),
                    None => {
                        if let Some(source) = cross.find_source(slang, snippet_index) {
                            emit_string_literal(&mut w, &ident, &source.source_code);
                        }
                    }
                }
            }
        }
        if !opts.no_ifdef {
            w.line(&format!("#endif /* {} */", backend_guard(slang)));
        }
        w.blank();
    }
    w.buffer
}

fn emit_program_reflection(
    w: &mut Writer,
    inp: &Input,
    cross: &CrossOutput,
    canonical: Slang,
    program: &Program,
) {
    let prog = sanitize(&program.name);
    for (stage_name, snippet_index) in program_stages(inp, program) {
        let source = match cross.find_source(canonical, snippet_index) {
            Some(source) => source,
            None => continue,
        };
        let refl = &source.reflection;
        if stage_name == "vs" {
            for attr in &refl.attrs {
                w.line(&format!(
                    "#define ATTR_{}_{} ({})",
                    prog,
                    sanitize(&attr.name),
                    attr.slot
                ));
            }
        }
        for block in &refl.uniform_blocks {
            let ub = format!("UB_{}_{}_{}", prog, stage_name, sanitize(&block.name));
            w.line(&format!("#define {}_slot ({})", ub, block.slot));
            w.line(&format!("#define {}_size ({})", ub, block.byte_size));
            for uniform in &block.uniforms {
                w.line(&format!(
                    "#define {}_{}_offset ({})",
                    ub,
                    sanitize(&uniform.name),
                    uniform.offset
                ));
            }
        }
        for image in &refl.images {
            w.line(&format!(
                "#define IMG_{}_{}_{}_slot ({})",
                prog,
                stage_name,
                sanitize(&image.name),
                image.slot
            ));
        }
    }
    w.blank();
}

fn program_stages<'a>(inp: &'a Input, program: &'a Program) -> [(&'static str, usize); 2] {
    [
        ("vs", inp.vs_map[&program.vs_name]),
        ("fs", inp.fs_map[&program.fs_name]),
    ]
}

fn emit_string_literal(w: &mut Writer, ident: &str, source: &str) {
    w.line(&format!("static const char {}_source[] =", ident));
    let line_count = source.lines().count();
    for (index, line) in source.lines().enumerate() {
        let escaped = line.replace('\\', "\\\\").replace('"', "\\\"");
        let terminator = if index + 1 == line_count { "\\n\";" } else { "\\n\"" };
        w.line(&format!("    \"{}{}", escaped, terminator));
    }
    if line_count == 0 {
        w.line("    \"\";");
    }
    w.blank();
}

fn emit_byte_array(w: &mut Writer, ident: &str, bytes: &[u8]) {
    w.line(&format!(
        "static const size_t {}_bytecode_size = {};",
        ident,
        bytes.len()
    ));
    w.line(&format!(
        "static const uint8_t {}_bytecode[{}] = {{",
        ident,
        bytes.len()
    ));
    for chunk in bytes.chunks(16) {
        let mut line = String::from("    ");
        for byte in chunk {
            line.push_str(&format!("0x{:02x},", byte));
        }
        w.line(&line);
    }
    w.line("};");
    w.blank();
}

fn backend_guard(slang: Slang) -> &'static str {
    match slang {
        Slang::Glsl330 => "SHDC_BACKEND_GLCORE33",
        Slang::Glsl100 => "SHDC_BACKEND_GLES2",
        Slang::Glsl300Es => "SHDC_BACKEND_GLES3",
        Slang::Hlsl5 => "SHDC_BACKEND_D3D11",
        Slang::MetalMacos => "SHDC_BACKEND_METAL_MACOS",
        Slang::MetalIos => "SHDC_BACKEND_METAL_IOS",
    }
}

fn canonical_slang(slang_set: SlangSet) -> Option<Slang> {
    if slang_set.contains(Slang::Glsl330) {
        Some(Slang::Glsl330)
    } else {
        slang_set.iter().next()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
