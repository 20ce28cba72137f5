//! Importable modules.
//!
//! The allow-list is closed: these five modules are the only ones a program
//! can import, and none of them reach the filesystem, processes or network.

pub mod date;
pub mod math;
pub mod re;
pub mod text;
pub mod xml;

use crate::builtins::NativeFunction;

pub const ALLOWED_MODULES: &[&str] = &["date", "math", "re", "text", "xml"];

pub fn is_allowed(module: &str) -> bool {
    ALLOWED_MODULES.contains(&module)
}

/// Comma-separated allow-list for diagnostics.
pub fn allowed_list() -> String {
    ALLOWED_MODULES.join(", ")
}

pub fn exports(module: &str) -> Option<&'static [NativeFunction]> {
    match module {
        "date" => Some(date::FUNCTIONS),
        "math" => Some(math::FUNCTIONS),
        "re" => Some(re::FUNCTIONS),
        "text" => Some(text::FUNCTIONS),
        "xml" => Some(xml::FUNCTIONS),
        _ => None,
    }
}

pub fn lookup(module: &str, function: &str) -> Option<&'static NativeFunction> {
    exports(module)?.iter().find(|f| f.name() == function)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_allowed_module_has_exports() {
        for module in ALLOWED_MODULES {
            let functions = exports(module).unwrap();
            assert!(!functions.is_empty(), "{module} exports nothing");
            for f in functions {
                assert!(
                    f.qualified.starts_with(&format!("{module}::")),
                    "{} is filed under {module}",
                    f.qualified
                );
            }
        }
    }

    #[test]
    fn test_lookup() {
        assert!(lookup("xml", "parse").is_some());
        assert!(lookup("xml", "open").is_none());
        assert!(lookup("os", "system").is_none());
        assert!(!is_allowed("os"));
        assert_eq!(allowed_list(), "date, math, re, text, xml");
    }
}
