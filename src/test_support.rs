//! Test-only scaffolding: a small in-memory [`Database`]/[`Context`] pair
//! standing in for the real catalog and host, plus a handful of AST builder
//! helpers so tests can construct queries without a parser.

use indexmap::IndexMap;

use crate::ast::{
    ArrayJoin, CompareOp, CteDef, CteKind, Expr, ExprKind, JoinConstraint, JoinExpr, JoinKind,
    JoinSource, JoinType, Literal, SelectQuery, Span,
};
use crate::catalog::{Database, TableDescriptor, TableDescriptorKind};
use crate::context::{Context, Diagnostics, Modifiers, TeamId};
use crate::error::{Error, Result};
use crate::ir::types::Type;
use crate::macros::{MacroExpander, NoMacros};

#[derive(Default)]
pub struct MockDatabase {
    pub tables: IndexMap<String, TableDescriptor>,
    pub saved_queries: IndexMap<String, Expr>,
}

impl MockDatabase {
    pub fn with_table(mut self, table: TableDescriptor) -> Self {
        self.tables.insert(table.name.clone(), table);
        self
    }

    pub fn with_saved_query(mut self, query_text: impl Into<String>, body: Expr) -> Self {
        self.saved_queries.insert(query_text.into(), body);
        self
    }
}

impl Database for MockDatabase {
    fn get_table(&self, name: &str) -> Result<TableDescriptor> {
        self.tables
            .get(name)
            .cloned()
            .ok_or_else(|| Error::query(format!("unknown table `{name}`")))
    }

    fn parse_saved_query(&self, query_text: &str) -> Result<Expr> {
        self.saved_queries
            .get(query_text)
            .cloned()
            .ok_or_else(|| Error::query(format!("no parsed body registered for `{query_text}`")))
    }
}

pub struct TestContext {
    pub database: MockDatabase,
    pub macros: Box<dyn MacroExpander>,
    pub diagnostics: Diagnostics,
    pub team_id: TeamId,
    pub max_view_depth: u32,
    pub modifiers: Modifiers,
}

impl TestContext {
    pub fn new(database: MockDatabase) -> Self {
        TestContext {
            database,
            macros: Box::new(NoMacros),
            diagnostics: Diagnostics::default(),
            team_id: TeamId(1),
            max_view_depth: 3,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_max_view_depth(mut self, depth: u32) -> Self {
        self.max_view_depth = depth;
        self
    }
}

impl Context for TestContext {
    fn database(&self) -> &dyn Database {
        &self.database
    }

    fn macros(&self) -> &dyn MacroExpander {
        self.macros.as_ref()
    }

    fn add_error(&mut self, span: Option<Span>, message: String) {
        self.diagnostics.push_error(span, message);
    }

    fn add_notice(&mut self, span: Option<Span>, message: String) {
        self.diagnostics.push_notice(span, message);
    }

    fn team_id(&self) -> TeamId {
        self.team_id
    }

    fn max_view_depth(&self) -> u32 {
        self.max_view_depth
    }

    fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

/// `events(id String, event String, properties JSON)`, the schema used by
/// the spec's end-to-end scenarios.
pub fn events_table() -> TableDescriptor {
    TableDescriptor::new("events", TableDescriptorKind::Events)
        .with_column("id", Type::String)
        .with_column("event", Type::String)
        .with_column("properties", Type::Json)
}

/// `s3_table(id String)`.
pub fn s3_table() -> TableDescriptor {
    TableDescriptor::new("s3_table", TableDescriptorKind::S3).with_column("id", Type::String)
}

pub fn ident(segments: &[&str]) -> Expr {
    Expr::new(ExprKind::Ident(segments.iter().map(|s| s.to_string()).collect()))
}

pub fn lit_str(s: &str) -> Expr {
    Expr::new(ExprKind::Literal(Literal::String(s.to_string())))
}

pub fn lit_int(i: i64) -> Expr {
    Expr::new(ExprKind::Literal(Literal::Integer(i)))
}

pub fn eq(left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::CompareOperation {
        op: CompareOp::Eq,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn from(table: &str) -> JoinExpr {
    JoinExpr::from_name(table)
}

pub fn join(
    mut base: JoinExpr,
    table: &str,
    alias: Option<&str>,
    kind: JoinKind,
    on: Expr,
) -> JoinExpr {
    let next = JoinExpr {
        table: JoinSource::Name(table.to_string()),
        alias: alias.map(str::to_string),
        join_type: JoinType { kind, global: false },
        constraint: Some(JoinConstraint::On(Box::new(on))),
        table_args: Vec::new(),
        sample: None,
        next_join: None,
        span: None,
    };
    base.next_join = Some(Box::new(next));
    base
}

pub fn select(items: Vec<Expr>, from: Option<JoinExpr>) -> SelectQuery {
    let mut query = SelectQuery::empty();
    query.select = items;
    query.from = from.map(Box::new);
    query
}

pub fn with_cte(mut query: SelectQuery, name: &str, kind: CteKind, body: Expr) -> SelectQuery {
    query.ctes.insert(
        name.to_string(),
        CteDef {
            name: name.to_string(),
            kind,
            body: Box::new(body),
        },
    );
    query
}

pub fn array_join(left: bool, items: Vec<(&str, Expr)>) -> ArrayJoin {
    ArrayJoin {
        left,
        items: items
            .into_iter()
            .map(|(alias, expr)| (alias.to_string(), expr))
            .collect(),
    }
}
