//! A name and type resolver for a SQL-like analytics query dialect.
//!
//! This crate takes an already-parsed query AST and a handful of host
//! collaborators (a schema [`catalog::Database`], a [`macros::MacroExpander`],
//! and a [`context::Context`] for diagnostics and tenant settings) and
//! produces a new AST in which every expression carries a resolved
//! [`ir::types::Type`]. Parsing, printing, query execution, and the schema
//! catalog's own implementation all live outside this crate.

pub mod ast;
pub mod catalog;
pub mod context;
pub mod dialect;
pub mod error;
pub mod ir;
pub mod macros;
mod resolver;

#[cfg(test)]
mod test_support;

pub use dialect::Dialect;
pub use error::{Error, ErrorKind, Result};
pub use resolver::resolve_types;
