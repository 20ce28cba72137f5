//! Error types for loading and running xform programs.

use std::fmt;

/// One-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Failures detected before any candidate function is invoked.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("{message} ({position})")]
    Syntax { message: String, position: Position },

    #[error("Module '{module}' is not allowed. Only these modules are permitted: {allowed}")]
    ImportDenied { module: String, allowed: String },

    #[error("module '{module}' has no function '{function}' (line {line})")]
    UnknownFunction {
        module: String,
        function: String,
        line: u32,
    },

    #[error("call to undefined function '{name}' (line {line})")]
    UndefinedFunction { name: String, line: u32 },

    #[error("function '{name}' is defined more than once")]
    DuplicateFunction { name: String },

    #[error("function '{name}' shadows a builtin of the same name")]
    ShadowsBuiltin { name: String },

    #[error("'{name}' expects {expected} argument(s) but is called with {found} (line {line})")]
    Arity {
        name: String,
        expected: String,
        found: usize,
        line: u32,
    },

    #[error("no '{name}' function is defined")]
    MissingEntryPoint { name: String },

    #[error("'{name}' takes {params} parameter(s); expected exactly 1")]
    EntryPointSignature { name: String, params: usize },

    #[error("global initialiser failed: {0}")]
    Initialiser(RuntimeError),
}

impl LoadError {
    /// True for lexer/parser failures.
    pub fn is_syntax(&self) -> bool {
        matches!(self, LoadError::Syntax { .. })
    }
}

/// Coarse classification of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    Type,
    Name,
    Index,
    Key,
    Value,
    ZeroDivision,
    ImportDenied,
    ModuleNotImported,
    Xml,
    Regex,
    Date,
    Raised,
    OperationBudgetExhausted,
    CallDepthExceeded,
    ValueTooLarge,
    DeadlineExceeded,
}

impl RuntimeErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Type => "TypeError",
            Self::Name => "NameError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Value => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::ImportDenied => "ImportError",
            Self::ModuleNotImported => "ImportError",
            Self::Xml => "XmlError",
            Self::Regex => "RegexError",
            Self::Date => "DateError",
            Self::Raised => "Error",
            Self::OperationBudgetExhausted => "OperationLimitError",
            Self::CallDepthExceeded => "RecursionError",
            Self::ValueTooLarge => "SizeLimitError",
            Self::DeadlineExceeded => "TimeoutError",
        }
    }

    /// Limit violations, as opposed to faults in the candidate's logic.
    pub fn is_resource_limit(self) -> bool {
        matches!(
            self,
            Self::OperationBudgetExhausted
                | Self::CallDepthExceeded
                | Self::ValueTooLarge
                | Self::DeadlineExceeded
        )
    }
}

/// A function activation recorded when an error escapes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub function: String,
    pub line: u32,
}

/// Failure raised while a program runs.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
    /// Innermost frame first.
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Type, message)
    }

    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(RuntimeErrorKind::Value, message)
    }

    /// `Kind: message` without the trace.
    pub fn summary(&self) -> String {
        format!("{}: {}", self.kind.label(), self.message)
    }

    /// Trace lines, innermost first, each prefixed with `  at`.
    pub fn render_trace(&self) -> String {
        self.trace
            .iter()
            .map(|frame| format!("  at {} (line {})", frame.function, frame.line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())?;
        if !self.trace.is_empty() {
            write!(f, "\n{}", self.render_trace())?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_error_display_includes_trace() {
        let mut err = RuntimeError::type_error("cannot add int and list");
        err.trace.push(TraceFrame {
            function: "helper".into(),
            line: 7,
        });
        err.trace.push(TraceFrame {
            function: "transform_xml".into(),
            line: 3,
        });
        let text = err.to_string();
        assert!(text.starts_with("TypeError: cannot add int and list"));
        assert!(text.contains("  at helper (line 7)\n  at transform_xml (line 3)"));
    }

    #[test]
    fn test_import_denied_names_module() {
        let err = LoadError::ImportDenied {
            module: "fs".into(),
            allowed: "date, math".into(),
        };
        assert!(err.to_string().contains("Module 'fs' is not allowed"));
        assert!(!err.is_syntax());
    }

    #[test]
    fn test_resource_limit_kinds() {
        assert!(RuntimeErrorKind::DeadlineExceeded.is_resource_limit());
        assert!(!RuntimeErrorKind::Type.is_resource_limit());
    }
}
