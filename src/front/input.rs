use std::collections::{BTreeMap, HashMap};

use crate::error::ErrorReport;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum SnippetKind {
    Block,
    Vertex,
    Fragment,
}

impl SnippetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SnippetKind::Block => "block",
            SnippetKind::Vertex => "vs",
            SnippetKind::Fragment => "fs",
        }
    }
}

/// A named code snippet (`@block`, `@vs` or `@fs`).
///
/// `lines` is the include-resolved content: zero-based indices into the
/// original file's lines, so every later stage can point diagnostics at
/// the authored position.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Snippet {
    pub kind: SnippetKind,
    pub name: String,
    pub lines: Vec<usize>,
}

impl Snippet {
    /// The authored line that errors fall back to when nothing more
    /// precise is known.
    pub fn first_line(&self) -> Option<usize> {
        self.lines.first().copied()
    }
}

/// A vertex/fragment shader pairing (`@program`).
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Program {
    pub name: String,
    pub vs_name: String,
    pub fs_name: String,
    pub line_index: usize,
}

/// The pre-parsed annotated GLSL file.
///
/// Built once by [`Input::load_and_parse`] and immutable afterwards; a
/// non-empty `errors` list makes the input invalid and stops the pipeline.
#[derive(Debug, Default)]
pub struct Input {
    pub path: String,
    pub lines: Vec<String>,
    pub snippets: Vec<Snippet>,
    pub type_map: BTreeMap<String, String>,
    pub snippet_map: HashMap<String, usize>,
    pub block_map: HashMap<String, usize>,
    pub vs_map: HashMap<String, usize>,
    pub fs_map: HashMap<String, usize>,
    pub programs: BTreeMap<String, Program>,
    pub errors: Vec<ErrorReport>,
}

impl Input {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn snippet(&self, snippet_index: usize) -> &Snippet {
        &self.snippets[snippet_index]
    }

    /// An error report pointing into this input file.
    pub fn error_at(&self, line_index: usize, message: impl Into<String>) -> ErrorReport {
        ErrorReport::error(self.path.clone(), line_index, message)
    }

    pub fn dump_debug(&self) {
        println!("input: {}", self.path);
        println!("  snippets:");
        for (index, snippet) in self.snippets.iter().enumerate() {
            println!(
                "    [{}] {} '{}' ({} lines)",
                index,
                snippet.kind.as_str(),
                snippet.name,
                snippet.lines.len()
            );
        }
        if !self.type_map.is_empty() {
            println!("  types:");
            for (name, type_str) in &self.type_map {
                println!("    {} => {}", name, type_str);
            }
        }
        println!("  programs:");
        for program in self.programs.values() {
            println!(
                "    {}: vs={} fs={} (line {})",
                program.name,
                program.vs_name,
                program.fs_name,
                program.line_index + 1
            );
        }
    }
}
