use indexmap::IndexMap;

use super::{Literal, Span};
use crate::ir::types::Type;

/// Any node that has a value and therefore, once resolved, a [`Type`].
///
/// `ty` is `None` before resolution and must be `Some` afterwards (see
/// invariant 1 of the data model): resolving a node whose `ty` is already
/// set is an [`crate::ErrorKind::ImpossibleAst`].
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Option<Span>,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Expr {
            kind,
            span: None,
            ty: None,
        }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.ty.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, enum_as_inner::EnumAsInner)]
pub enum ExprKind {
    Literal(Literal),

    /// A dotted identifier chain, e.g. `a.b.c` or the wildcard `*` / `a.*`.
    Ident(Vec<String>),

    Call {
        name: String,
        args: Vec<Expr>,
        named_args: IndexMap<String, Expr>,
    },

    Lambda {
        params: Vec<String>,
        body: Box<Expr>,
    },

    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),

    CompareOperation {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// `expr IN COHORT <id>` / `expr NOT IN COHORT <id>`, prior to the
    /// comparison-site rewrite described in §4.7.
    InCohort {
        expr: Box<Expr>,
        cohort_id: i64,
        negated: bool,
    },

    /// `base[key]`: array indexing, map lookup, or one step of a JSON path.
    Index {
        base: Box<Expr>,
        key: Box<Expr>,
    },

    /// `base.N`: positional tuple access.
    TupleIndex {
        base: Box<Expr>,
        index: usize,
    },

    Alias {
        name: String,
        expr: Box<Expr>,
        hidden: bool,
    },

    /// A sub-query used where a value or a FROM source is expected.
    Select(Box<SelectQuery>),
    Union(Vec<SelectQuery>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
    NotIn,
    GlobalIn,
    GlobalNotIn,
}

use super::SelectQuery;
