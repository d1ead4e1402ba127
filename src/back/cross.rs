use log::debug;
use spirv_cross::{glsl, hlsl, msl, spirv, ErrorCode};

use crate::back::reflect::{self, ImageTypeScan, ReflectError, Reflection, ShaderStage};
use crate::back::spirv::{SpirvBlob, SpirvOutput};
use crate::error::{ErrorReport, Severity};
use crate::front::input::{Input, Snippet, SnippetKind};
use crate::slang::{Slang, SlangSet};

/// One translated shader: generated source plus the reflection extracted
/// from the same cross-compiler instance.
pub struct CrossSource {
    pub snippet_index: usize,
    pub source_code: String,
    pub reflection: Reflection,
}

pub struct CrossOutput {
    /// Outer index is `Slang::index()`; each inner vector is parallel to
    /// `SpirvOutput::blobs`, with `None` for a failed translation.
    pub sources: Vec<Vec<Option<CrossSource>>>,
    pub errors: Vec<ErrorReport>,
}

impl CrossOutput {
    pub fn find_source(&self, slang: Slang, snippet_index: usize) -> Option<&CrossSource> {
        self.sources[slang.index()]
            .iter()
            .flatten()
            .find(|source| source.snippet_index == snippet_index)
    }

    pub fn dump_debug(&self, inp: &Input) {
        println!("spirvcross:");
        for slang in Slang::ALL {
            let sources = &self.sources[slang.index()];
            if sources.is_empty() {
                continue;
            }
            println!("  {}:", slang);
            for source in sources.iter().flatten() {
                let snippet = inp.snippet(source.snippet_index);
                let refl = &source.reflection;
                println!(
                    "    {} '{}' (entry point '{}')",
                    snippet.kind.as_str(),
                    snippet.name,
                    refl.entry_point
                );
                for attr in &refl.attrs {
                    println!(
                        "      attr {}: {} ({}{})",
                        attr.slot, attr.name, attr.sem_name, attr.sem_index
                    );
                }
                for block in &refl.uniform_blocks {
                    println!(
                        "      uniform block {}: {} ({} bytes)",
                        block.slot, block.name, block.byte_size
                    );
                    for uniform in &block.uniforms {
                        println!(
                            "        {} {}[{}] at offset {}",
                            uniform.kind.as_str(),
                            uniform.name,
                            uniform.array_count,
                            uniform.offset
                        );
                    }
                }
                for image in &refl.images {
                    println!(
                        "      image {}: {} ({})",
                        image.slot,
                        image.name,
                        image.kind.as_str()
                    );
                }
                for line in source.source_code.lines() {
                    println!("      | {}", line);
                }
            }
        }
    }
}

/// Translate every SPIR-V blob to every requested target language and
/// verify that reflection agrees across targets.
pub fn translate(inp: &Input, spirv: &SpirvOutput, slang_set: SlangSet) -> CrossOutput {
    let mut out = CrossOutput {
        sources: (0..Slang::COUNT).map(|_| Vec::new()).collect(),
        errors: Vec::new(),
    };
    for slang in slang_set.iter() {
        for blob in &spirv.blobs {
            debug!(
                "translating snippet {} to {}",
                blob.snippet_index,
                slang.as_str()
            );
            match translate_blob(inp, blob, slang) {
                Ok(source) => out.sources[slang.index()].push(Some(source)),
                Err(report) => {
                    out.errors.push(report);
                    out.sources[slang.index()].push(None);
                }
            }
        }
    }
    check_consistency(inp, spirv, slang_set, &mut out);
    out
}

fn translate_blob(inp: &Input, blob: &SpirvBlob, slang: Slang) -> Result<CrossSource, ErrorReport> {
    let snippet = inp.snippet(blob.snippet_index);
    let stage = match snippet.kind {
        SnippetKind::Vertex => ShaderStage::Vertex,
        SnippetKind::Fragment => ShaderStage::Fragment,
        SnippetKind::Block => unreachable!("blocks are never compiled"),
    };
    let image_types = ImageTypeScan::scan(&blob.bytecode)
        .map_err(|err| reflect_report(inp, snippet, slang, err))?;
    let module = spirv::Module::from_words(&blob.bytecode);
    let (source_code, reflection) = match slang {
        Slang::Glsl330 | Slang::Glsl100 | Slang::Glsl300Es => {
            let mut ast = spirv::Ast::<glsl::Target>::parse(&module)
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            ast.set_compiler_options(&glsl_options(slang))
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            let reflection = reflect::reflect(&mut ast, &image_types, stage)
                .map_err(|err| reflect_report(inp, snippet, slang, err))?;
            let code = ast
                .compile()
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            (code, reflection)
        }
        Slang::Hlsl5 => {
            let mut ast = spirv::Ast::<hlsl::Target>::parse(&module)
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            ast.set_compiler_options(&hlsl_options())
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            let reflection = reflect::reflect(&mut ast, &image_types, stage)
                .map_err(|err| reflect_report(inp, snippet, slang, err))?;
            let code = ast
                .compile()
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            (code, reflection)
        }
        Slang::MetalMacos | Slang::MetalIos => {
            let mut ast = spirv::Ast::<msl::Target>::parse(&module)
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            ast.set_compiler_options(&msl_options(slang))
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            let reflection = reflect::reflect(&mut ast, &image_types, stage)
                .map_err(|err| reflect_report(inp, snippet, slang, err))?;
            let code = ast
                .compile()
                .map_err(|err| cross_report(inp, snippet, slang, err))?;
            (code, reflection)
        }
    };
    Ok(CrossSource {
        snippet_index: blob.snippet_index,
        source_code,
        reflection,
    })
}

fn glsl_options(slang: Slang) -> glsl::CompilerOptions {
    let mut options = glsl::CompilerOptions::default();
    options.vulkan_semantics = false;
    match slang {
        Slang::Glsl330 => options.version = glsl::Version::V3_30,
        Slang::Glsl300Es => options.version = glsl::Version::V3_00Es,
        Slang::Glsl100 => {
            options.version = glsl::Version::V1_00Es;
            // GLES2 has no uniform buffer objects
            options.emit_uniform_buffer_as_plain_uniforms = true;
        }
        _ => unreachable!("not a GLSL target"),
    }
    options
}

fn hlsl_options() -> hlsl::CompilerOptions {
    let mut options = hlsl::CompilerOptions::default();
    options.shader_model = hlsl::ShaderModel::V5_0;
    options.point_size_compat = true;
    options
}

fn msl_options(slang: Slang) -> msl::CompilerOptions {
    let mut options = msl::CompilerOptions::default();
    options.version = msl::Version::V1_2;
    options.platform = match slang {
        Slang::MetalIos => msl::Platform::iOS,
        _ => msl::Platform::macOS,
    };
    options
}

/// Enforce identical reflection across every requested target. The GLSL
/// desktop translation is canonical when present; the cross-compiler may
/// legitimately renumber bindings per target, which this turns into an
/// error instead of silently divergent headers.
fn check_consistency(inp: &Input, spirv: &SpirvOutput, slang_set: SlangSet, out: &mut CrossOutput) {
    let canonical = if slang_set.contains(Slang::Glsl330) {
        Slang::Glsl330
    } else {
        match slang_set.iter().next() {
            Some(slang) => slang,
            None => return,
        }
    };
    let mut errors: Vec<ErrorReport> = Vec::new();
    for (blob_index, blob) in spirv.blobs.iter().enumerate() {
        let canon = match out.sources[canonical.index()].get(blob_index) {
            Some(Some(source)) => source,
            _ => continue,
        };
        for slang in slang_set.iter() {
            if slang == canonical {
                continue;
            }
            if let Some(Some(other)) = out.sources[slang.index()].get(blob_index) {
                if let Some(section) = canon.reflection.mismatch(&other.reflection) {
                    let snippet = inp.snippet(blob.snippet_index);
                    errors.push(consistency_report(inp, snippet, canonical, slang, section));
                }
            }
        }
    }
    out.errors.extend(errors);
}

fn consistency_report(
    inp: &Input,
    snippet: &Snippet,
    canonical: Slang,
    slang: Slang,
    section: &str,
) -> ErrorReport {
    ErrorReport {
        file: inp.path.clone(),
        line_index: snippet.first_line(),
        message: format!(
            "reflection mismatch between {} and {} for {} '{}': {} differ",
            canonical.as_str(),
            slang.as_str(),
            snippet.kind.as_str(),
            snippet.name,
            section
        ),
        severity: Severity::Error,
    }
}

fn cross_report(inp: &Input, snippet: &Snippet, slang: Slang, code: ErrorCode) -> ErrorReport {
    let detail = match code {
        ErrorCode::CompilationError(msg) => msg,
        ErrorCode::Unhandled => "unhandled spirv-cross error".to_string(),
    };
    ErrorReport {
        file: inp.path.clone(),
        line_index: snippet.first_line(),
        message: format!(
            "{} translation of '{}' failed: {}",
            slang.as_str(),
            snippet.name,
            detail
        ),
        severity: Severity::Error,
    }
}

fn reflect_report(
    inp: &Input,
    snippet: &Snippet,
    slang: Slang,
    err: ReflectError,
) -> ErrorReport {
    ErrorReport {
        file: inp.path.clone(),
        line_index: snippet.first_line(),
        message: format!(
            "{} reflection of '{}' failed: {}",
            slang.as_str(),
            snippet.name,
            err
        ),
        severity: Severity::Error,
    }
}
