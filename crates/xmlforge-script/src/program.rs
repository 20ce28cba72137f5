//! Loaded programs and the entry-point call.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::ast::{Expr, FunctionDecl, Item};
use crate::error::{LoadError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::limits::ExecutionLimits;
use crate::parser::parse_source;
use crate::validate;
use crate::value::Value;

/// Name of the function every program must define.
pub const ENTRY_POINT: &str = "transform_xml";

/// Bytes of a non-string return value kept for diagnostics.
const RENDER_LIMIT: usize = 4096;

/// A parsed and validated program.
///
/// Holds only syntax, so it can be shared between worker threads; every call
/// gets fresh interpreter state.
#[derive(Debug, Clone)]
pub struct Program {
    functions: HashMap<String, FunctionDecl>,
    imports: BTreeSet<String>,
    globals: Vec<(String, Expr)>,
}

/// What the entry point handed back.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnValue {
    Text(String),
    /// Any non-string value: its type name and a bounded rendering.
    Other { type_name: String, rendered: String },
}

/// Result of one entry-point call together with its captured `print` output.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub outcome: Result<ReturnValue, RuntimeError>,
    pub printed: String,
    pub operations: u64,
}

/// Parse, validate and initialise `source`.
///
/// Global initialisers run once here under `limits` so that faults in them
/// surface as load failures.
pub fn load(source: &str, limits: &ExecutionLimits) -> Result<Program, LoadError> {
    let file = parse_source(source)?;
    validate::check(&file)?;

    let mut program = Program {
        functions: HashMap::new(),
        imports: BTreeSet::new(),
        globals: Vec::new(),
    };
    for item in file.items {
        match item {
            Item::Import { module, .. } => {
                program.imports.insert(module);
            }
            Item::Function(decl) => {
                program.functions.insert(decl.name.clone(), decl);
            }
            Item::Global { name, value, .. } => program.globals.push((name, value)),
        }
    }

    Interpreter::new(&program, limits)
        .init_globals()
        .map_err(LoadError::Initialiser)?;
    debug!(
        functions = program.functions.len(),
        imports = ?program.imports,
        "program loaded"
    );
    Ok(program)
}

impl Program {
    pub(crate) fn function(&self, name: &str) -> Option<&FunctionDecl> {
        self.functions.get(name)
    }

    pub(crate) fn imports_module(&self, module: &str) -> bool {
        self.imports.contains(module)
    }

    pub(crate) fn globals(&self) -> impl Iterator<Item = (&String, &Expr)> {
        self.globals.iter().map(|(name, value)| (name, value))
    }

    /// Modules imported at top level.
    pub fn imports(&self) -> impl Iterator<Item = &str> {
        self.imports.iter().map(String::as_str)
    }

    /// Call `transform_xml(input)` in a fresh interpreter.
    pub fn call_entry(&self, input: &str, limits: &ExecutionLimits) -> Invocation {
        let mut interpreter = Interpreter::new(self, limits);
        let outcome = interpreter.init_globals().and_then(|()| {
            interpreter
                .call(ENTRY_POINT, vec![Value::str(input)])
                .map(|value| match value {
                    Value::Str(s) => ReturnValue::Text(s.to_string()),
                    other => ReturnValue::Other {
                        type_name: other.type_name().to_string(),
                        rendered: other
                            .render(RENDER_LIMIT)
                            .unwrap_or_else(|_| format!("<{} too large to display>", other.type_name())),
                    },
                })
        });
        let rt = interpreter.runtime();
        Invocation {
            outcome,
            printed: rt.take_printed(),
            operations: rt.operations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Program>();
    }

    #[test]
    fn test_load_records_imports() {
        let program = load(
            r#"import "text"; import "xml"; fn transform_xml(i) { return i; }"#,
            &ExecutionLimits::default(),
        )
        .unwrap();
        assert_eq!(program.imports().collect::<Vec<_>>(), vec!["text", "xml"]);
    }

    #[test]
    fn test_failing_initialiser_is_load_error() {
        let err = load(
            "let bad = 1 / 0; fn transform_xml(i) { return i; }",
            &ExecutionLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Initialiser(_)));
    }

    #[test]
    fn test_non_string_return_is_described() {
        let program = load(
            "fn transform_xml(i) { return [1, 2]; }",
            &ExecutionLimits::default(),
        )
        .unwrap();
        let call = program.call_entry("<a/>", &ExecutionLimits::default());
        assert_eq!(
            call.outcome.unwrap(),
            ReturnValue::Other {
                type_name: "list".into(),
                rendered: "[1, 2]".into()
            }
        );
    }
}
