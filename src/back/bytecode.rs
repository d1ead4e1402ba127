use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;

use log::{debug, info};
use thiserror::Error;

use crate::back::cross::CrossOutput;
use crate::back::reflect::ShaderStage;
use crate::back::spirv::ENTRY_POINT;
use crate::error::ErrorReport;
use crate::front::input::Input;
use crate::slang::{Slang, SlangSet};

/// Native shader bytecode for one (snippet, target) pair.
pub struct BytecodeBlob {
    pub snippet_index: usize,
    pub slang: Slang,
    pub bytes: Vec<u8>,
}

pub struct BytecodeOutput {
    pub blobs: Vec<BytecodeBlob>,
    pub errors: Vec<ErrorReport>,
}

impl BytecodeOutput {
    pub fn find_blob(&self, slang: Slang, snippet_index: usize) -> Option<&BytecodeBlob> {
        self.blobs
            .iter()
            .find(|blob| blob.slang == slang && blob.snippet_index == snippet_index)
    }

    pub fn dump_debug(&self, inp: &Input) {
        println!("bytecode:");
        for blob in &self.blobs {
            let snippet = inp.snippet(blob.snippet_index);
            println!(
                "  {} '{}' {}: {} bytes",
                snippet.kind.as_str(),
                snippet.name,
                blob.slang.as_str(),
                blob.bytes.len()
            );
        }
    }
}

#[derive(Debug, Error)]
enum NativeError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0}")]
    Compile(String),
}

/// Compile translated HLSL/Metal sources to native bytecode.
///
/// A missing native toolchain skips the pair without an error; the text
/// source stays authoritative. Only an actual compile failure is reported.
pub fn compile(
    inp: &Input,
    cross: &CrossOutput,
    slang_set: SlangSet,
    gen_bytecode: bool,
) -> BytecodeOutput {
    let mut out = BytecodeOutput {
        blobs: Vec::new(),
        errors: Vec::new(),
    };
    if !gen_bytecode {
        return out;
    }
    for slang in slang_set.iter() {
        if !slang.is_hlsl() && !slang.is_msl() {
            continue;
        }
        for source in cross.sources[slang.index()].iter().flatten() {
            let snippet = inp.snippet(source.snippet_index);
            debug!(
                "compiling {} bytecode for '{}'",
                slang.as_str(),
                snippet.name
            );
            let result = match slang {
                Slang::Hlsl5 => compile_fxc(&source.source_code, source.reflection.stage),
                _ => compile_metal(&source.source_code, slang),
            };
            match result {
                Ok(Some(bytes)) => out.blobs.push(BytecodeBlob {
                    snippet_index: source.snippet_index,
                    slang,
                    bytes,
                }),
                Ok(None) => {
                    info!(
                        "native {} compiler not found, keeping text source for '{}'",
                        slang.as_str(),
                        snippet.name
                    );
                }
                Err(err) => out.errors.push(ErrorReport::without_line(
                    format!("{}:{}", snippet.name, slang.as_str()),
                    err.to_string(),
                )),
            }
        }
    }
    out
}

fn compile_fxc(source: &str, stage: ShaderStage) -> Result<Option<Vec<u8>>, NativeError> {
    let dir = tempfile::tempdir()?;
    let src_path = dir.path().join("shader.hlsl");
    let out_path = dir.path().join("shader.fxc");
    fs::write(&src_path, source)?;
    let profile = match stage {
        ShaderStage::Vertex => "vs_5_0",
        ShaderStage::Fragment => "ps_5_0",
    };
    let command = Command::new("fxc")
        .arg("/nologo")
        .arg("/T")
        .arg(profile)
        .arg("/E")
        .arg(ENTRY_POINT)
        .arg("/Fo")
        .arg(&out_path)
        .arg(&src_path)
        .output();
    match run_native(command)? {
        Some(()) => Ok(Some(fs::read(&out_path)?)),
        None => Ok(None),
    }
}

fn compile_metal(source: &str, slang: Slang) -> Result<Option<Vec<u8>>, NativeError> {
    let sdk = match slang {
        Slang::MetalIos => "iphoneos",
        _ => "macosx",
    };
    let dir = tempfile::tempdir()?;
    let src_path = dir.path().join("shader.metal");
    let air_path = dir.path().join("shader.air");
    let lib_path = dir.path().join("shader.metallib");
    fs::write(&src_path, source)?;
    let compile = xcrun(sdk, "metal", &[&src_path, Path::new("-o"), &air_path]);
    if run_native(compile)?.is_none() {
        return Ok(None);
    }
    let link = xcrun(sdk, "metallib", &[&air_path, Path::new("-o"), &lib_path]);
    if run_native(link)?.is_none() {
        return Ok(None);
    }
    Ok(Some(fs::read(&lib_path)?))
}

fn xcrun(sdk: &str, tool: &str, args: &[&Path]) -> io::Result<std::process::Output> {
    let mut command = Command::new("xcrun");
    command.arg("-sdk").arg(sdk).arg(tool);
    if tool == "metal" {
        command.arg("-c");
    }
    for arg in args {
        command.arg(arg);
    }
    command.output()
}

/// `Ok(None)` when the tool binary does not exist on this host.
fn run_native(result: io::Result<std::process::Output>) -> Result<Option<()>, NativeError> {
    match result {
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
        Ok(output) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            Err(NativeError::Compile(detail))
        }
        Ok(_) => Ok(Some(())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::back::reflect::Reflection;
    use crate::back::cross::CrossSource;

    fn fake_cross(slang: Slang, snippet_index: usize) -> CrossOutput {
        let mut sources: Vec<Vec<Option<CrossSource>>> =
            (0..Slang::COUNT).map(|_| Vec::new()).collect();
        sources[slang.index()].push(Some(CrossSource {
            snippet_index,
            source_code: "float4 main() : SV_Target { return 0; }".to_string(),
            reflection: Reflection {
                stage: ShaderStage::Fragment,
                entry_point: "main".to_string(),
                attrs: vec![],
                uniform_blocks: vec![],
                images: vec![],
            },
        }));
        CrossOutput {
            sources,
            errors: Vec::new(),
        }
    }

    #[test]
    fn disabled_bytecode_produces_nothing() {
        let inp = Input::parse_source("t.glsl", "@fs fs\nvoid main() {}\n@end\n");
        let cross = fake_cross(Slang::Hlsl5, 0);
        let mut set = SlangSet::empty();
        set.insert(Slang::Hlsl5);
        let out = compile(&inp, &cross, set, false);
        assert!(out.blobs.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn glsl_targets_are_never_natively_compiled() {
        let inp = Input::parse_source("t.glsl", "@fs fs\nvoid main() {}\n@end\n");
        let cross = fake_cross(Slang::Glsl330, 0);
        let mut set = SlangSet::empty();
        set.insert(Slang::Glsl330);
        let out = compile(&inp, &cross, set, true);
        assert!(out.blobs.is_empty());
        assert!(out.errors.is_empty());
    }
}
