use std::fmt;

/// Rendering style for diagnostics on the console.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum ErrorFormat {
    Gcc,
    Msvc,
}

impl ErrorFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorFormat::Gcc => "gcc",
            ErrorFormat::Msvc => "msvc",
        }
    }

    pub fn parse(s: &str) -> Option<ErrorFormat> {
        match s {
            "gcc" => Some(ErrorFormat::Gcc),
            "msvc" => Some(ErrorFormat::Msvc),
            _ => None,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        }
    }
}

/// A diagnostic tied to a location in the annotated source file.
///
/// `line_index` is zero-based; both render formats print it one-based.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct ErrorReport {
    pub file: String,
    pub line_index: Option<usize>,
    pub message: String,
    pub severity: Severity,
}

impl ErrorReport {
    pub fn error(file: impl Into<String>, line_index: usize, message: impl Into<String>) -> ErrorReport {
        ErrorReport {
            file: file.into(),
            line_index: Some(line_index),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn warning(file: impl Into<String>, line_index: usize, message: impl Into<String>) -> ErrorReport {
        ErrorReport {
            file: file.into(),
            line_index: Some(line_index),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    /// A report with no usable line, e.g. an I/O failure or a native
    /// compiler that only produced freeform output.
    pub fn without_line(file: impl Into<String>, message: impl Into<String>) -> ErrorReport {
        ErrorReport {
            file: file.into(),
            line_index: None,
            message: message.into(),
            severity: Severity::Error,
        }
    }

    pub fn format(&self, fmt: ErrorFormat) -> String {
        let sev = self.severity.as_str();
        match (self.line_index, fmt) {
            (Some(line), ErrorFormat::Gcc) => {
                format!("{}:{}:0: {}: {}", self.file, line + 1, sev, self.message)
            }
            (Some(line), ErrorFormat::Msvc) => {
                format!("{}({}): {}: {}", self.file, line + 1, sev, self.message)
            }
            (None, _) => format!("{}: {}: {}", self.file, sev, self.message),
        }
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.format(ErrorFormat::Gcc))
    }
}
