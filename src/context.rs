//! The `context` collaborator (§6): catalog access, diagnostics, and the
//! handful of settings that change resolver behaviour (tenant scope, view
//! depth, cohort-membership modifier).

use crate::ast::Span;
use crate::catalog::Database;
use crate::macros::MacroExpander;

/// Opaque tenant scope threaded through to macro expansion. The resolver
/// never interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TeamId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InCohortVia {
    Subquery,
    LeftJoin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Modifiers {
    pub in_cohort_via: InCohortVia,
}

impl Default for Modifiers {
    fn default() -> Self {
        Modifiers {
            in_cohort_via: InCohortVia::LeftJoin,
        }
    }
}

/// Everything the resolver needs from its host: schema access, a place to
/// put diagnostics, and a few settings. Implementations are expected to be
/// thread-safe against concurrent resolver instances on distinct queries;
/// the resolver itself never calls into `Context` from more than one thread.
pub trait Context {
    fn database(&self) -> &dyn Database;

    fn macros(&self) -> &dyn MacroExpander;

    fn add_error(&mut self, span: Option<Span>, message: String);

    fn add_notice(&mut self, span: Option<Span>, message: String);

    fn team_id(&self) -> TeamId;

    fn max_view_depth(&self) -> u32;

    fn modifiers(&self) -> Modifiers;
}

/// A minimal, in-memory `Context` implementation: stores diagnostics in two
/// vectors instead of forwarding them anywhere. Most callers building a
/// one-off `Context` will embed this rather than reimplement diagnostic
/// plumbing.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub errors: Vec<Diagnostic>,
    pub notices: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub span: Option<Span>,
    pub message: String,
}

impl Diagnostics {
    pub fn push_error(&mut self, span: Option<Span>, message: String) {
        self.errors.push(Diagnostic { span, message });
    }

    pub fn push_notice(&mut self, span: Option<Span>, message: String) {
        self.notices.push(Diagnostic { span, message });
    }
}
