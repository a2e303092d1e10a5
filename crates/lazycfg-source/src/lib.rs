//! lazycfg Source Language
//!
//! Loads config trees from source files written in a declarative subset of
//! Python, and writes trees back out as source.
//!
//! # Core Concepts
//!
//! - [`Loader`]: Evaluates a file and its relative imports into a
//!   [`ConfigTree`](lazycfg_tree::ConfigTree). Every import is a fresh copy.
//! - [`to_source`]: Re-emits a tree as `cfg.<path> = <expr>` statements that
//!   load back into an equal tree
//! - [`parse_literal`]: Literal parser used by command-line overrides
//!
//! # Example
//!
//! ```rust,no_run
//! use lazycfg_source::{load, to_source};
//!
//! let tree = load("configs/train.py")?;
//! println!("{}", to_source(&tree));
//! # Ok::<(), lazycfg_source::LoadError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod builtins;
/// Source re-emission
pub mod emit;
mod error;
mod eval;
mod literal;
mod loader;
mod namespace;
mod parser;

pub use emit::{format_float, render_flat, to_source, to_source_with, EmitOptions};
pub use error::{LoadError, LoadResult, Span};
pub use literal::parse_literal;
pub use loader::{load, Loader, LoaderOptions, DEFAULT_MAX_IMPORT_DEPTH, DEFAULT_SOURCE_EXTENSION};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
