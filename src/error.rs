//! Error types raised by the resolver.
//!
//! Mirrors the three-way split from the design: [`ErrorKind::ImpossibleAst`] for
//! invariant violations, [`ErrorKind::Query`] for user-authored mistakes, and
//! [`ErrorKind::Resolution`] for internal contract failures during chain
//! traversal. None of these are caught and retried internally; the lenient
//! dialect only ever downgrades `unable to resolve` to a diagnostic.

use std::fmt;

use crate::ast::Span;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A resolver error, optionally anchored to a source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// An invariant of the resolver itself was violated. A bug, not a user mistake.
    ImpossibleAst,
    /// The query, as written, is invalid or uses something the dialect doesn't support.
    Query,
    /// An internal contract failure while walking a dotted identifier chain.
    Resolution,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn impossible_ast(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::ImpossibleAst, message)
    }

    pub fn query(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Query, message)
    }

    pub fn resolution(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Resolution, message)
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = self.span.or(span);
        self
    }
}

pub trait WithErrorInfo: Sized {
    fn with_span(self, span: Option<Span>) -> Self;
}

impl<T> WithErrorInfo for Result<T> {
    fn with_span(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span(span))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::ImpossibleAst => "impossible AST",
            ErrorKind::Query => "query error",
            ErrorKind::Resolution => "resolution error",
        };
        write!(f, "{kind}: {}", self.message)?;
        if let Some(span) = &self.span {
            write!(f, " ({span:?})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}
