//! xform: the restricted transformation language run by the xmlforge sandbox.
//!
//! Candidate transformations are written in this language rather than a
//! general-purpose one. The host decides everything a program can touch:
//!
//! - [`lexer`] / [`parser`] - source text to syntax tree, nesting bounded
//! - [`validate`] - allow-listed imports, known calls, entry-point shape
//! - [`program`] - load once, call `transform_xml` in a fresh interpreter per input
//! - [`limits`] - operation budget, call depth, value size, print capture, deadline
//! - [`builtins`] / [`modules`] - the only primitives a program can reach
//! - [`xmltree`] - the mutable element tree behind `node` values
//!
//! There is no filesystem, process, network or clock access in the language.

pub mod ast;
pub mod builtins;
pub mod error;
mod interpreter;
pub mod lexer;
pub mod limits;
pub mod modules;
mod ops;
pub mod parser;
pub mod program;
pub mod runtime;
pub mod validate;
pub mod value;
pub mod xmltree;

pub use error::{LoadError, Position, RuntimeError, RuntimeErrorKind, TraceFrame};
pub use limits::ExecutionLimits;
pub use modules::ALLOWED_MODULES;
pub use program::{load, Invocation, Program, ReturnValue, ENTRY_POINT};
