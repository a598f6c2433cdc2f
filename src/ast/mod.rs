//! The untyped (and, after resolution, typed) AST that flows through this
//! crate. Construction and printing of these nodes is a collaborator's job
//! (see the crate root docs); this module only defines the shapes the
//! resolver reads and clones.

mod expr;
mod query;

pub use expr::*;
pub use query::*;

/// A half-open byte range into the original query text, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge_opt(a: Option<Span>, b: Option<Span>) -> Option<Span> {
        match (a, b) {
            (None, None) => None,
            (None, Some(s)) | (Some(s), None) => Some(s),
            (Some(a), Some(b)) => Some(Span::new(a.start.min(b.start), a.end.max(b.end))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(String),
    DateTime(String),
    Uuid(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
}
