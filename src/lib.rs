//! Annotated-GLSL shader cross-compiler.
//!
//! A single input file carries named `@vs`/`@fs`/`@block` snippets and
//! `@program` pairings. Each shader snippet is compiled to SPIR-V,
//! translated to the requested target languages (desktop/ES GLSL, HLSL,
//! Metal), reflected, optionally compiled to native bytecode, and emitted
//! as a C header a graphics runtime can consume uniformly across backends.
//!
//! The pipeline runs strictly forward; every stage output refers back to
//! its snippet by index, never by pointer:
//!
//! `Input -> SpirvOutput -> CrossOutput -> BytecodeOutput -> header`

pub mod back;
pub mod error;
pub mod front;
pub mod slang;

pub use error::{ErrorFormat, ErrorReport, Severity};
pub use front::{Input, Program, Snippet, SnippetKind};
pub use slang::{Slang, SlangSet};

use log::debug;

/// Pipeline options, CLI-independent.
#[derive(Debug, Clone)]
pub struct Options {
    pub input: String,
    pub output: String,
    pub slang: SlangSet,
    pub byte_code: bool,
    pub debug_dump: bool,
    pub no_ifdef: bool,
    pub gen_version: u32,
    pub error_format: ErrorFormat,
}

/// Failure of one pipeline stage, carrying that stage's accumulated
/// reports. Later stages only run when the previous stage reported
/// nothing, so at most one variant surfaces per run.
#[derive(Debug)]
pub enum CompileError {
    Input(Vec<ErrorReport>),
    Spirv(Vec<ErrorReport>),
    Translate(Vec<ErrorReport>),
    Bytecode(Vec<ErrorReport>),
    Link(Vec<ErrorReport>),
}

impl CompileError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CompileError::Input(_) => 20,
            CompileError::Spirv(_) => 30,
            CompileError::Translate(_) => 40,
            CompileError::Bytecode(_) => 50,
            // a missing program source is always a failed translation
            CompileError::Link(_) => 40,
        }
    }

    pub fn reports(&self) -> &[ErrorReport] {
        match self {
            CompileError::Input(reports)
            | CompileError::Spirv(reports)
            | CompileError::Translate(reports)
            | CompileError::Bytecode(reports)
            | CompileError::Link(reports) => reports,
        }
    }
}

/// Scoped handle on the external shader toolkits.
///
/// Acquired once at the driver boundary; dropping it releases the
/// process-wide compiler state on every exit path, including errors.
pub struct ToolContext {
    pub(crate) compiler: shaderc::Compiler,
}

impl ToolContext {
    pub fn acquire() -> Result<ToolContext, CompileError> {
        match shaderc::Compiler::new() {
            Some(compiler) => Ok(ToolContext { compiler }),
            None => Err(CompileError::Spirv(vec![ErrorReport::without_line(
                "<init>",
                "failed to initialize the GLSL to SPIR-V compiler",
            )])),
        }
    }
}

impl Drop for ToolContext {
    fn drop(&mut self) {
        debug!("released shader toolkits");
    }
}

/// Run the whole pipeline for one input file.
///
/// Stage order and iteration order within stages are deterministic, so a
/// byte-identical input produces a byte-identical header.
pub fn run(opts: &Options) -> Result<(), CompileError> {
    let ctx = ToolContext::acquire()?;

    let inp = Input::load_and_parse(&opts.input);
    if opts.debug_dump {
        inp.dump_debug();
    }
    if !inp.errors.is_empty() {
        return Err(CompileError::Input(inp.errors.clone()));
    }

    let spirv = back::spirv::compile_glsl(&ctx, &inp);
    if opts.debug_dump {
        spirv.dump_debug(&inp);
    }
    if !spirv.errors.is_empty() {
        return Err(CompileError::Spirv(spirv.errors));
    }

    let cross = back::cross::translate(&inp, &spirv, opts.slang);
    if opts.debug_dump {
        cross.dump_debug(&inp);
    }
    if !cross.errors.is_empty() {
        return Err(CompileError::Translate(cross.errors));
    }

    let bytecode = back::bytecode::compile(&inp, &cross, opts.slang, opts.byte_code);
    if opts.debug_dump {
        bytecode.dump_debug(&inp);
    }
    if !bytecode.errors.is_empty() {
        return Err(CompileError::Bytecode(bytecode.errors));
    }

    back::header::generate(opts, &inp, &cross, &bytecode).map_err(CompileError::Link)
}

#[cfg(test)]
mod tests;
