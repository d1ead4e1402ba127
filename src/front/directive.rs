use nom::bytes::complete::take_while1;
use nom::character::complete::{char, multispace0, multispace1};
use nom::combinator::{eof, rest};
use nom::sequence::{preceded, terminated, tuple};
use nom::IResult;

/// A recognized `@` directive with its arguments.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Directive {
    Block(String),
    Vs(String),
    Fs(String),
    End,
    IncludeBlock(String),
    Program {
        name: String,
        vs_name: String,
        fs_name: String,
    },
    Type {
        name: String,
        type_str: String,
    },
}

/// Classification of one source line.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum LineToken {
    /// Not directive-shaped; plain shader source.
    Source,
    /// Starts with `@` but the token is not a known directive.
    Unknown(String),
    /// A known directive with malformed arguments.
    Invalid(String),
    Directive(Directive),
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn ident(i: &str) -> IResult<&str, &str> {
    take_while1(is_ident_char)(i)
}

fn name_arg(i: &str) -> IResult<&str, &str> {
    preceded(multispace1, ident)(i)
}

fn line_end(i: &str) -> IResult<&str, &str> {
    preceded(multispace0, eof)(i)
}

fn one_name(i: &str) -> IResult<&str, &str> {
    terminated(name_arg, line_end)(i)
}

fn three_names(i: &str) -> IResult<&str, (&str, &str, &str)> {
    terminated(tuple((name_arg, name_arg, name_arg)), line_end)(i)
}

fn name_and_rest(i: &str) -> IResult<&str, (&str, &str)> {
    tuple((name_arg, preceded(multispace1, rest)))(i)
}

fn directive_head(i: &str) -> IResult<&str, &str> {
    preceded(char('@'), ident)(i)
}

/// Strip the tolerated line decoration: leading whitespace, an optional
/// `//` or `/*` comment opener, and a trailing `*/`.
fn strip_decoration(line: &str) -> &str {
    let mut t = line.trim_start();
    for opener in ["//", "/*"] {
        if let Some(stripped) = t.strip_prefix(opener) {
            t = stripped.trim_start();
            break;
        }
    }
    let t = t.trim_end();
    match t.strip_suffix("*/") {
        Some(stripped) => stripped.trim_end(),
        None => t,
    }
}

/// Classify one line of the input file.
///
/// Only lines whose first token (after decoration) begins with `@` are
/// directive-shaped; everything else is `Source`.
pub fn classify(line: &str) -> LineToken {
    let t = strip_decoration(line);
    if !t.starts_with('@') {
        return LineToken::Source;
    }
    let (args, head) = match directive_head(t) {
        Ok(parsed) => parsed,
        Err(_) => return LineToken::Unknown(t.to_string()),
    };
    match head {
        "block" | "vs" | "fs" => match one_name(args) {
            Ok((_, name)) => LineToken::Directive(match head {
                "block" => Directive::Block(name.to_string()),
                "vs" => Directive::Vs(name.to_string()),
                _ => Directive::Fs(name.to_string()),
            }),
            Err(_) => LineToken::Invalid(format!("@{} must name exactly one snippet", head)),
        },
        "end" => match line_end(args) {
            Ok(_) => LineToken::Directive(Directive::End),
            Err(_) => LineToken::Invalid("@end takes no arguments".to_string()),
        },
        "include_block" => match one_name(args) {
            Ok((_, name)) => LineToken::Directive(Directive::IncludeBlock(name.to_string())),
            Err(_) => LineToken::Invalid("@include_block must name exactly one block".to_string()),
        },
        "program" => match three_names(args) {
            Ok((_, (name, vs_name, fs_name))) => LineToken::Directive(Directive::Program {
                name: name.to_string(),
                vs_name: vs_name.to_string(),
                fs_name: fs_name.to_string(),
            }),
            Err(_) => LineToken::Invalid(
                "@program expects a program name, a vertex shader name and a fragment shader name"
                    .to_string(),
            ),
        },
        "type" => match name_and_rest(args) {
            Ok((_, (name, type_str))) if !type_str.trim().is_empty() => {
                LineToken::Directive(Directive::Type {
                    name: name.to_string(),
                    type_str: type_str.trim().to_string(),
                })
            }
            _ => LineToken::Invalid("@type expects a name and a type string".to_string()),
        },
        other => LineToken::Unknown(format!("@{}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directive(line: &str) -> Directive {
        match classify(line) {
            LineToken::Directive(d) => d,
            other => panic!("expected directive for {:?}, got {:?}", line, other),
        }
    }

    #[test]
    fn snippet_openers() {
        assert_eq!(directive("@block util"), Directive::Block("util".to_string()));
        assert_eq!(directive("@vs my_vs"), Directive::Vs("my_vs".to_string()));
        assert_eq!(directive("  @fs my_fs"), Directive::Fs("my_fs".to_string()));
        assert_eq!(directive("@end"), Directive::End);
    }

    #[test]
    fn comment_openers_are_tolerated() {
        assert_eq!(directive("//@vs vs1"), Directive::Vs("vs1".to_string()));
        assert_eq!(directive("// @end"), Directive::End);
        assert_eq!(directive("/* @block lighting */"), Directive::Block("lighting".to_string()));
    }

    #[test]
    fn program_takes_three_names() {
        assert_eq!(
            directive("@program prog vs fs"),
            Directive::Program {
                name: "prog".to_string(),
                vs_name: "vs".to_string(),
                fs_name: "fs".to_string(),
            }
        );
        assert!(matches!(classify("@program prog vs"), LineToken::Invalid(_)));
        assert!(matches!(classify("@program prog vs fs extra"), LineToken::Invalid(_)));
    }

    #[test]
    fn type_keeps_rest_of_line() {
        assert_eq!(
            directive("@type my_mat4 mat4"),
            Directive::Type {
                name: "my_mat4".to_string(),
                type_str: "mat4".to_string(),
            }
        );
        assert!(matches!(classify("@type only_name"), LineToken::Invalid(_)));
    }

    #[test]
    fn non_directive_lines_are_source() {
        assert_eq!(classify("void main() {}"), LineToken::Source);
        assert_eq!(classify(""), LineToken::Source);
        assert_eq!(classify("    gl_Position = pos;"), LineToken::Source);
        // an email-looking token does not start the line
        assert_eq!(classify("const char* s = \"a@b\";"), LineToken::Source);
    }

    #[test]
    fn unknown_directives_are_flagged() {
        assert!(matches!(classify("@version 2"), LineToken::Unknown(_)));
        assert!(matches!(classify("@"), LineToken::Unknown(_)));
    }

    #[test]
    fn missing_name_is_invalid() {
        assert!(matches!(classify("@vs"), LineToken::Invalid(_)));
        assert!(matches!(classify("@block  "), LineToken::Invalid(_)));
        assert!(matches!(classify("@end trailing"), LineToken::Invalid(_)));
    }
}
