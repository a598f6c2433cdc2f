use indexmap::IndexMap;

use super::{Expr, Span};

#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub select: Vec<Expr>,
    pub from: Option<Box<JoinExpr>>,
    pub array_join: Option<ArrayJoin>,
    pub prewhere: Option<Expr>,
    pub where_: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub window_exprs: IndexMap<String, Expr>,
    pub order_by: Vec<Expr>,
    pub limit_by: Vec<Expr>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
    pub distinct: bool,
    pub limit_with_ties: bool,
    pub settings: Option<serde_json::Value>,
    /// Set once this query has been expanded from a catalog saved-view.
    pub view_name: Option<String>,
    /// `WITH name AS (...)` definitions. Moved into the resolved
    /// [`crate::ir::types::SelectQueryEnv`] and cleared on the printable clone
    /// (§4.4 step 2).
    pub ctes: IndexMap<String, CteDef>,
    pub span: Option<Span>,
}

impl SelectQuery {
    pub fn empty() -> Self {
        SelectQuery {
            select: Vec::new(),
            from: None,
            array_join: None,
            prewhere: None,
            where_: None,
            group_by: Vec::new(),
            having: None,
            window_exprs: IndexMap::new(),
            order_by: Vec::new(),
            limit_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
            limit_with_ties: false,
            settings: None,
            view_name: None,
            ctes: IndexMap::new(),
            span: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CteDef {
    pub name: String,
    pub kind: CteKind,
    pub body: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CteKind {
    /// Used as a FROM source: `WITH c AS (SELECT ...) SELECT * FROM c`.
    Subquery,
    /// Used as a value: `WITH n AS (SELECT count() FROM t) SELECT n`.
    Expression,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinExpr {
    pub table: JoinSource,
    pub alias: Option<String>,
    pub join_type: JoinType,
    pub constraint: Option<JoinConstraint>,
    pub table_args: Vec<Expr>,
    pub sample: Option<Expr>,
    pub next_join: Option<Box<JoinExpr>>,
    pub span: Option<Span>,
}

impl JoinExpr {
    pub fn from_name(name: impl Into<String>) -> Self {
        JoinExpr {
            table: JoinSource::Name(name.into()),
            alias: None,
            join_type: JoinType::default(),
            constraint: None,
            table_args: Vec::new(),
            sample: None,
            next_join: None,
            span: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinSource {
    /// A single-segment identifier: a table, a CTE, or (via macro tag
    /// expansion) a saved-query shorthand.
    Name(String),
    /// A `{% tag %}`-style macro reference that expands to another
    /// [`JoinExpr`] (cohort/action/sparkline/hogqlx tags).
    MacroTag(String),
    /// A parenthesized sub-query or `UNION` used as a FROM source.
    Sub(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinType {
    pub kind: JoinKind,
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    Using(Vec<String>),
    On(Box<Expr>),
}

/// `ARRAY JOIN a.b AS x, ... [LEFT ARRAY JOIN ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayJoin {
    pub left: bool,
    pub items: Vec<(String, Expr)>,
}
