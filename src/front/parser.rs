use std::fs;

use log::debug;

use crate::error::ErrorReport;
use crate::front::directive::{classify, Directive, LineToken};
use crate::front::input::{Input, Program, Snippet, SnippetKind};

/// Raw content of a snippet before include resolution.
enum Entry {
    Line(usize),
    Include { name: String, line_index: usize },
}

struct OpenSnippet {
    kind: SnippetKind,
    name: String,
    open_line: usize,
    /// Index into `Input::snippets`, `None` when the name was a duplicate.
    snippet_index: Option<usize>,
    entries: Vec<Entry>,
}

impl Input {
    /// Read and parse an annotated GLSL file.
    pub fn load_and_parse(path: &str) -> Input {
        match fs::read_to_string(path) {
            Ok(text) => Input::parse_source(path, &text),
            Err(err) => Input {
                path: path.to_string(),
                errors: vec![ErrorReport::without_line(
                    path,
                    format!("failed to read input file: {}", err),
                )],
                ..Input::default()
            },
        }
    }

    /// Parse already-loaded source text. CRLF line endings are normalized
    /// to LF before splitting.
    pub fn parse_source(path: &str, source: &str) -> Input {
        let text = source.replace("\r\n", "\n");
        let mut inp = Input {
            path: path.to_string(),
            lines: text.split('\n').map(str::to_string).collect(),
            ..Input::default()
        };
        let mut current: Option<OpenSnippet> = None;

        for line_index in 0..inp.lines.len() {
            let token = classify(&inp.lines[line_index]);
            match token {
                LineToken::Source => match current.as_mut() {
                    Some(open) => open.entries.push(Entry::Line(line_index)),
                    None => {
                        if !is_blank_or_comment(&inp.lines[line_index]) {
                            let report = inp.error_at(
                                line_index,
                                "source line must be inside a @block, @vs or @fs snippet",
                            );
                            inp.errors.push(report);
                        }
                    }
                },
                LineToken::Unknown(token) => match current.as_mut() {
                    // inside a snippet an unknown @-token is plain source
                    Some(open) => open.entries.push(Entry::Line(line_index)),
                    None => {
                        let report =
                            inp.error_at(line_index, format!("unknown directive '{}'", token));
                        inp.errors.push(report);
                    }
                },
                LineToken::Invalid(message) => {
                    let report = inp.error_at(line_index, message);
                    inp.errors.push(report);
                }
                LineToken::Directive(directive) => {
                    parse_directive(&mut inp, &mut current, directive, line_index);
                }
            }
        }

        if let Some(open) = current.take() {
            let report = inp.error_at(
                open.open_line,
                format!(
                    "unterminated @{} snippet '{}', missing @end",
                    open.kind.as_str(),
                    open.name
                ),
            );
            inp.errors.push(report);
        }

        validate_programs(&mut inp);
        debug!(
            "parsed {}: {} snippets, {} programs, {} errors",
            inp.path,
            inp.snippets.len(),
            inp.programs.len(),
            inp.errors.len()
        );
        inp
    }
}

fn parse_directive(
    inp: &mut Input,
    current: &mut Option<OpenSnippet>,
    directive: Directive,
    line_index: usize,
) {
    match directive {
        Directive::Block(name) => open_snippet(inp, current, SnippetKind::Block, name, line_index),
        Directive::Vs(name) => open_snippet(inp, current, SnippetKind::Vertex, name, line_index),
        Directive::Fs(name) => open_snippet(inp, current, SnippetKind::Fragment, name, line_index),
        Directive::End => match current.take() {
            Some(open) => close_snippet(inp, open),
            None => {
                let report = inp.error_at(line_index, "@end outside of a snippet");
                inp.errors.push(report);
            }
        },
        Directive::IncludeBlock(name) => match current.as_mut() {
            Some(open) => open.entries.push(Entry::Include { name, line_index }),
            None => {
                let report = inp.error_at(line_index, "@include_block outside of a snippet");
                inp.errors.push(report);
            }
        },
        Directive::Program {
            name,
            vs_name,
            fs_name,
        } => {
            if current.is_some() {
                let report = inp.error_at(line_index, "@program must appear outside of a snippet");
                inp.errors.push(report);
            } else if inp.programs.contains_key(&name) {
                let report = inp.error_at(line_index, format!("duplicate program '{}'", name));
                inp.errors.push(report);
            } else {
                inp.programs.insert(
                    name.clone(),
                    Program {
                        name,
                        vs_name,
                        fs_name,
                        line_index,
                    },
                );
            }
        }
        Directive::Type { name, type_str } => {
            if current.is_some() {
                let report = inp.error_at(line_index, "@type must appear outside of a snippet");
                inp.errors.push(report);
            } else {
                inp.type_map.insert(name, type_str);
            }
        }
    }
}

fn open_snippet(
    inp: &mut Input,
    current: &mut Option<OpenSnippet>,
    kind: SnippetKind,
    name: String,
    line_index: usize,
) {
    if current.is_some() {
        let report = inp.error_at(
            line_index,
            format!(
                "@{} '{}': previous snippet must be closed with @end first",
                kind.as_str(),
                name
            ),
        );
        inp.errors.push(report);
        return;
    }
    let duplicate = match kind {
        SnippetKind::Block => inp.block_map.contains_key(&name),
        SnippetKind::Vertex => inp.vs_map.contains_key(&name),
        SnippetKind::Fragment => inp.fs_map.contains_key(&name),
    };
    let snippet_index = if duplicate {
        let report = inp.error_at(
            line_index,
            format!("duplicate @{} snippet name '{}'", kind.as_str(), name),
        );
        inp.errors.push(report);
        None
    } else {
        let index = inp.snippets.len();
        inp.snippets.push(Snippet {
            kind,
            name: name.clone(),
            lines: Vec::new(),
        });
        match kind {
            SnippetKind::Block => inp.block_map.insert(name.clone(), index),
            SnippetKind::Vertex => inp.vs_map.insert(name.clone(), index),
            SnippetKind::Fragment => inp.fs_map.insert(name.clone(), index),
        };
        inp.snippet_map.insert(name.clone(), index);
        Some(index)
    };
    *current = Some(OpenSnippet {
        kind,
        name,
        open_line: line_index,
        snippet_index,
        entries: Vec::new(),
    });
}

/// Resolve a snippet's includes when it is closed. The result is a flat
/// list of original-file line indices; referenced blocks are already
/// resolved because forward references are rejected.
fn close_snippet(inp: &mut Input, open: OpenSnippet) {
    let mut resolved: Vec<usize> = Vec::new();
    let mut errors: Vec<ErrorReport> = Vec::new();
    // DFS coloring: the snippet being expanded is "in progress"; meeting
    // it again through an include closes a cycle.
    let visiting: Vec<&str> = if open.kind == SnippetKind::Block {
        vec![open.name.as_str()]
    } else {
        Vec::new()
    };
    for entry in &open.entries {
        match entry {
            Entry::Line(index) => resolved.push(*index),
            Entry::Include { name, line_index } => {
                if visiting.iter().any(|v| *v == name.as_str()) {
                    errors.push(inp.error_at(
                        *line_index,
                        format!("circular @include_block of block '{}'", name),
                    ));
                } else if let Some(&block_index) = inp.block_map.get(name) {
                    resolved.extend_from_slice(&inp.snippets[block_index].lines);
                } else {
                    errors.push(inp.error_at(
                        *line_index,
                        format!(
                            "unknown block '{}' (blocks must be defined before they are included)",
                            name
                        ),
                    ));
                }
            }
        }
    }
    if open.kind != SnippetKind::Block && resolved.is_empty() && errors.is_empty() {
        errors.push(inp.error_at(
            open.open_line,
            format!("@{} snippet '{}' is empty", open.kind.as_str(), open.name),
        ));
    }
    if let Some(index) = open.snippet_index {
        inp.snippets[index].lines = resolved;
    }
    inp.errors.extend(errors);
}

fn validate_programs(inp: &mut Input) {
    let mut errors: Vec<ErrorReport> = Vec::new();
    for program in inp.programs.values() {
        if !inp.vs_map.contains_key(&program.vs_name) {
            errors.push(inp.error_at(
                program.line_index,
                format!(
                    "unknown vertex shader '{}' in program '{}'",
                    program.vs_name, program.name
                ),
            ));
        }
        if !inp.fs_map.contains_key(&program.fs_name) {
            errors.push(inp.error_at(
                program.line_index,
                format!(
                    "unknown fragment shader '{}' in program '{}'",
                    program.fs_name, program.name
                ),
            ));
        }
    }
    inp.errors.extend(errors);
}

fn is_blank_or_comment(line: &str) -> bool {
    let t = line.trim();
    t.is_empty() || t.starts_with("//") || t.starts_with("/*") || t.starts_with('*')
}
