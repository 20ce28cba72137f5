//! Sandbox: scoring untrusted candidates without trusting them.
//!
//! A candidate is loaded into the restricted xform interpreter, then its
//! entry point is called once per pair on an isolated worker thread with a
//! hard deadline. A pair that faults, times out or returns the wrong type
//! fails on its own; the other pairs are still evaluated.
//!
//! # Modules
//!
//! - [`source`]    - pull the program out of generator output (Markdown fences)
//! - [`policy`]    - `SandboxPolicy`: interpreter limits, per-pair timeout, parallelism
//! - [`execution`] - `run_isolated()`: worker thread, timeout, panic capture
//! - [`engine`]    - `SandboxEngine::score()`: load once, score every pair
//! - [`error`]     - `SandboxError` / `SandboxResult`

pub mod engine;
pub mod error;
pub mod execution;
pub mod policy;
pub mod source;

pub use engine::SandboxEngine;
pub use error::{SandboxError, SandboxResult};
pub use execution::run_isolated;
pub use policy::SandboxPolicy;
pub use source::extract_source;
