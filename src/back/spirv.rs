use log::debug;

use crate::error::{ErrorReport, Severity};
use crate::front::input::{Input, Snippet, SnippetKind};
use crate::ToolContext;

pub const ENTRY_POINT: &str = "main";

/// SPIR-V bytecode for one compiled snippet, back-linked by index.
pub struct SpirvBlob {
    pub snippet_index: usize,
    pub bytecode: Vec<u32>,
}

pub struct SpirvOutput {
    pub blobs: Vec<SpirvBlob>,
    pub errors: Vec<ErrorReport>,
}

impl SpirvOutput {
    pub fn find_blob(&self, snippet_index: usize) -> Option<&SpirvBlob> {
        self.blobs.iter().find(|b| b.snippet_index == snippet_index)
    }

    pub fn dump_debug(&self, inp: &Input) {
        println!("spirv:");
        for blob in &self.blobs {
            let snippet = inp.snippet(blob.snippet_index);
            println!(
                "  {} '{}': {} words",
                snippet.kind.as_str(),
                snippet.name,
                blob.bytecode.len()
            );
        }
    }
}

/// Compile every vertex and fragment snippet to SPIR-V.
///
/// Snippets are compiled in index order; a failing snippet records its
/// diagnostics and the remaining snippets still compile.
pub fn compile_glsl(ctx: &ToolContext, inp: &Input) -> SpirvOutput {
    let mut out = SpirvOutput {
        blobs: Vec::new(),
        errors: Vec::new(),
    };
    let options = match build_options() {
        Some(options) => options,
        None => {
            out.errors.push(ErrorReport::without_line(
                inp.path.clone(),
                "failed to create GLSL compile options",
            ));
            return out;
        }
    };
    for (snippet_index, snippet) in inp.snippets.iter().enumerate() {
        let stage = match snippet.kind {
            SnippetKind::Block => continue,
            SnippetKind::Vertex => shaderc::ShaderKind::Vertex,
            SnippetKind::Fragment => shaderc::ShaderKind::Fragment,
        };
        let source = merge_snippet_source(inp, snippet);
        debug!("compiling {} '{}' to spirv", snippet.kind.as_str(), snippet.name);
        match ctx
            .compiler
            .compile_into_spirv(&source, stage, &inp.path, ENTRY_POINT, Some(&options))
        {
            Ok(artifact) => out.blobs.push(SpirvBlob {
                snippet_index,
                bytecode: artifact.as_binary().to_vec(),
            }),
            Err(shaderc::Error::CompilationError(_, message)) => {
                out.errors.extend(parse_diagnostics(&message, inp, snippet));
            }
            Err(other) => {
                out.errors.push(fallback_report(inp, snippet, other.to_string()));
            }
        }
    }
    out
}

fn build_options<'a>() -> Option<shaderc::CompileOptions<'a>> {
    let mut options = shaderc::CompileOptions::new()?;
    options.set_warnings_as_errors();
    // block-level includes are resolved by the front-end; a #include that
    // survives to this point is a user mistake
    options.set_include_callback(|name, _kind, _from, _depth| {
        Err(format!(
            "#include '{}' is not supported, use @include_block",
            name
        ))
    });
    Some(options)
}

/// Materialize the GLSL text for one snippet: version/extension preamble,
/// the `@type` map as `#define`s, then each resolved line prefixed with a
/// `#line` marker so compiler diagnostics carry original line numbers.
fn merge_snippet_source(inp: &Input, snippet: &Snippet) -> String {
    let mut source = String::new();
    source.push_str("#version 450\n");
    source.push_str("#extension GL_GOOGLE_include_directive : enable\n");
    for (name, type_str) in &inp.type_map {
        source.push_str(&format!("#define {} {}\n", name, type_str));
    }
    for &line_index in &snippet.lines {
        source.push_str(&format!("#line {}\n", line_index + 1));
        source.push_str(&inp.lines[line_index]);
        source.push('\n');
    }
    source
}

/// Split a multi-line compiler message into one report per diagnostic.
/// Line numbers already refer to the original file thanks to the `#line`
/// markers; a message with no parseable diagnostic is attributed to the
/// snippet's first line.
fn parse_diagnostics(message: &str, inp: &Input, snippet: &Snippet) -> Vec<ErrorReport> {
    let mut reports = Vec::new();
    for line in message.lines() {
        if let Some((line_index, severity, text)) = parse_diagnostic_line(line) {
            reports.push(ErrorReport {
                file: inp.path.clone(),
                line_index,
                message: text,
                severity,
            });
        }
    }
    if reports.is_empty() {
        reports.push(fallback_report(inp, snippet, message.trim().to_string()));
    }
    reports
}

fn fallback_report(inp: &Input, snippet: &Snippet, message: String) -> ErrorReport {
    ErrorReport {
        file: inp.path.clone(),
        line_index: snippet.first_line(),
        message,
        severity: Severity::Error,
    }
}

fn parse_diagnostic_line(line: &str) -> Option<(Option<usize>, Severity, String)> {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("ERROR: ") {
        let (line_index, text) = split_location(rest)?;
        return Some((line_index, Severity::Error, text));
    }
    if let Some(rest) = line.strip_prefix("WARNING: ") {
        let (line_index, text) = split_location(rest)?;
        return Some((line_index, Severity::Warning, text));
    }
    if let Some(pos) = line.find(": error: ") {
        let line_index = trailing_line_number(&line[..pos]);
        return Some((
            line_index,
            Severity::Error,
            line[pos + ": error: ".len()..].trim().to_string(),
        ));
    }
    if let Some(pos) = line.find(": warning: ") {
        let line_index = trailing_line_number(&line[..pos]);
        return Some((
            line_index,
            Severity::Warning,
            line[pos + ": warning: ".len()..].trim().to_string(),
        ));
    }
    None
}

/// Parse `<file>:<line>: <msg>`, tolerating colons inside the file name.
fn split_location(rest: &str) -> Option<(Option<usize>, String)> {
    let colons: Vec<usize> = rest.match_indices(':').map(|(i, _)| i).collect();
    for pair in colons.windows(2) {
        let segment = &rest[pair[0] + 1..pair[1]];
        if let Ok(number) = segment.trim().parse::<usize>() {
            let text = rest[pair[1] + 1..].trim().to_string();
            return Some((number.checked_sub(1), text));
        }
    }
    None
}

/// One-based line number at the end of `<file>:<line>`.
fn trailing_line_number(head: &str) -> Option<usize> {
    head.rsplit(':')
        .next()
        .and_then(|t| t.trim().parse::<usize>().ok())
        .and_then(|n| n.checked_sub(1))
}
