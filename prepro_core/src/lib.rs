//! `prepro_core` renders source templates driven by `//#` directive lines.
//!
//! A template is ordinary text (a config file, a source file, a script)
//! in which any line whose first non-blank characters are `//#` is a
//! directive: code that runs while the template renders. Everything else is
//! literal text, copied to the output in order. Directive code is
//! [Rhai](https://rhai.rs) and can call a small set of operations to emit
//! text, capture output, branch, and include other templates.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Template text
//!   -> Extractor (splits into literal and directive segments)
//!   -> Unit compiler (literals become print statements, directives stay verbatim)
//!   -> Render engine (runs the unit against a fresh execution context)
//! ```
//!
//! ## Modules
//!
//! - [`lexer`]: the directive extractor.
//! - [`compiler`]: builds and compiles the script for a template.
//! - [`context`]: per-render state and the operations exposed to directives.
//! - [`host`]: filesystem access, on disk or in memory.
//! - [`config`]: `prepro.toml` loading and data files.
//!
//! ## Operations
//!
//! | Name | Effect |
//! |---|---|
//! | `print(text)` | append text to the current buffer |
//! | `capture(\|\| { ... })` | run the closure, return what it printed |
//! | `If(condition, \|\| { ... })` | run the closure when `condition` is truthy |
//! | `include(path)` / `include(path, data)` | render another template in place |
//! | `readFile(path)` | read a file relative to the current template |
//! | `resolveFile(path)` | resolve a path relative to the current template |
//!
//! ## Data Keys
//!
//! Data is a Rhai object map named `data`. Keys read with dot syntax
//! (`data.name`) must be valid Rhai identifiers that are not reserved words.
//! Keys such as `debug`, `default`, `package`, `match`, `new` or `use` are
//! reserved, so `data.debug` fails to compile; read them by index instead:
//! `data["debug"]`.
//!
//! ## Quick Start
//!
//! ```rust
//! use prepro_core::MemoryHost;
//! use prepro_core::RenderOptions;
//! use prepro_core::render;
//! use std::sync::Arc;
//!
//! let template = "\
//! //# If(data[\"debug\"], || {
//! log_level = \"debug\"
//! //# });
//! name = \"app\"
//! ";
//!
//! let options = RenderOptions::default()
//! 	.data(serde_json::json!({ "debug": true }))
//! 	.host(Arc::new(MemoryHost::new()));
//! let output = render("/app.toml.tpl", template, options).unwrap();
//! assert_eq!(output, "\nlog_level = \"debug\"\nname = \"app\"\n");
//! ```

pub use compiler::*;
pub use config::*;
pub use context::EXPOSED_OPERATIONS;
pub use context::ExecutionContext;
pub use context::is_truthy;
pub use engine::*;
pub use error::*;
pub use host::*;
pub use lexer::*;

pub mod compiler;
pub mod config;
pub mod context;
mod engine;
#[allow(unused_assignments)]
mod error;
pub mod host;
pub mod lexer;

#[cfg(test)]
mod __fixtures;
