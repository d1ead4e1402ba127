//! Front-end for the annotated GLSL input format: directive recognition,
//! snippet and program assembly, include resolution.

pub mod directive;
pub mod input;
pub mod parser;

pub use input::{Input, Program, Snippet, SnippetKind};
