//! The resolver: a single top-down clone-and-annotate pass over the AST.
//! `resolve_types` is the only public entry point; everything else is
//! wired together through the [`Resolver`] struct that the submodules here
//! extend with `impl` blocks.

mod constant;
mod expr;
mod join;
mod names;
mod select;

use crate::ast::Expr;
use crate::context::Context;
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::ir::scope::ScopeStack;
use crate::ir::types::SelectQueryEnv;

/// Cycle guard for CTE expansion (invariant 5): no single `resolve_types`
/// call may expand CTEs more than this many times in total.
const MAX_CTE_EXPANSIONS: u32 = 50;

pub struct Resolver<'ctx> {
    pub(crate) ctx: &'ctx mut dyn Context,
    pub(crate) dialect: Dialect,
    pub(crate) scopes: ScopeStack,
    pub(crate) cte_expansions: u32,
    pub(crate) view_depth: u32,
}

impl<'ctx> Resolver<'ctx> {
    fn new(ctx: &'ctx mut dyn Context, dialect: Dialect, scopes: Vec<SelectQueryEnv>) -> Self {
        Resolver {
            ctx,
            dialect,
            scopes: ScopeStack::seeded(scopes),
            cte_expansions: 0,
            view_depth: 0,
        }
    }

    pub(crate) fn bump_cte_expansions(&mut self) -> Result<()> {
        self.cte_expansions += 1;
        if self.cte_expansions > MAX_CTE_EXPANSIONS {
            log::warn!("CTE expansion limit ({MAX_CTE_EXPANSIONS}) exceeded, aborting");
            return Err(Error::query(
                "CTE expansion limit exceeded (possible cycle)",
            ));
        }
        Ok(())
    }

    pub(crate) fn enter_view(&mut self) -> Result<()> {
        self.view_depth += 1;
        let max = self.ctx.max_view_depth();
        if self.view_depth > max {
            log::warn!("saved-view nesting depth {} exceeds max_view_depth {max}", self.view_depth);
            return Err(Error::query("saved-view nesting exceeds max_view_depth"));
        }
        Ok(())
    }

    pub(crate) fn leave_view(&mut self) {
        self.view_depth -= 1;
    }
}

/// Resolves every name in `node` and attaches a [`crate::ir::types::Type`]
/// to every expression it contains, producing a new, fully typed AST
/// (§3 invariant 1, §6).
///
/// `scopes` pre-seeds the scope stack so that `node` can be resolved as a
/// fragment of an outer query (e.g. a saved expression-field body being
/// inlined into the referencing SELECT).
pub fn resolve_types(
    node: Expr,
    ctx: &mut dyn Context,
    dialect: Dialect,
    scopes: Option<Vec<SelectQueryEnv>>,
) -> Result<Expr> {
    log::debug!("resolving query in {dialect} dialect");
    let mut resolver = Resolver::new(ctx, dialect, scopes.unwrap_or_default());
    let result = resolver.resolve_expr(node);
    if let Err(e) = &result {
        log::debug!("resolution failed: {e}");
    }
    result
}

#[cfg(test)]
mod tests {
    use crate::ast::{
        CteKind, Expr, ExprKind, JoinConstraint, JoinExpr, JoinKind, JoinSource, JoinType,
    };
    use crate::catalog::{TableDescriptor, TableDescriptorKind};
    use crate::context::{InCohortVia, Modifiers, TeamId};
    use crate::dialect::Dialect;
    use crate::error::Result;
    use crate::ir::types::Type;
    use crate::macros::MacroExpander;
    use crate::test_support::*;

    use super::resolve_types;

    fn select_expr(query: crate::ast::SelectQuery) -> Expr {
        Expr::new(ExprKind::Select(Box::new(query)))
    }

    /// S1: a plain field reference with a WHERE clause, no rewrites.
    #[test]
    fn s1_plain_select() {
        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db);

        let query = select(
            vec![ident(&["event"])],
            Some(from("events")),
        );
        let mut query = query;
        query.where_ = Some(eq(ident(&["event"]), lit_str("$pageview")));

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let env = resolved.ty.unwrap().into_select_query().unwrap();
        assert!(env.columns.contains_key("event"));
        assert!(matches!(env.columns["event"], Type::FieldAlias { .. }));
    }

    /// S6: an unresolvable name fails in strict dialect...
    #[test]
    fn s6_strict_unresolved_fails() {
        let db = MockDatabase::default();
        let mut ctx = TestContext::new(db);
        let query = select(vec![ident(&["nonexistent"])], None);

        let err = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap_err();
        assert!(err.message.contains("unable to resolve"));
    }

    /// ...and downgrades to a diagnostic plus `UnresolvedField` in lenient.
    #[test]
    fn s6_lenient_unresolved_placeholder() {
        let db = MockDatabase::default();
        let mut ctx = TestContext::new(db);
        let query = select(vec![ident(&["nonexistent"])], None);

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Lenient, None).unwrap();
        let env = resolved.ty.unwrap().into_select_query().unwrap();
        assert!(env.columns.is_empty(), "an unresolved field exports no column");
        assert_eq!(ctx.diagnostics.errors.len(), 1);
    }

    /// Property 9: GLOBAL JOIN promotion fires only when the outer source
    /// is `events`.
    #[test]
    fn global_join_promotion() {
        let db = MockDatabase::default()
            .with_table(events_table())
            .with_table(s3_table());
        let mut ctx = TestContext::new(db);

        let from_clause = join(
            from("events"),
            "s3_table",
            Some("x"),
            JoinKind::Inner,
            eq(ident(&["events", "id"]), ident(&["x", "id"])),
        );
        let query = select(vec![ident(&["event"])], Some(from_clause));

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let ExprKind::Select(sq) = resolved.kind else {
            panic!("expected Select")
        };
        let next = sq.from.unwrap().next_join.unwrap();
        assert!(next.join_type.global, "events -> s3 join should be promoted");
    }

    /// Property 13: a bracketed JSON path folds into one `Property` chain.
    #[test]
    fn json_path_folding() {
        use crate::ast::ExprKind as E;

        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db);

        let path = Expr::new(E::Index {
            base: Box::new(Expr::new(E::Index {
                base: Box::new(ident(&["properties"])),
                key: Box::new(lit_str("x")),
            })),
            key: Box::new(lit_str("y")),
        });
        let query = select(vec![path], Some(from("events")));

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let env = resolved.ty.unwrap().into_select_query().unwrap();
        let (_, ty) = env.columns.iter().next().expect("one exported column");
        let property = ty.as_field_alias().unwrap().1.as_property().unwrap();
        assert_eq!(property.0.len(), 3);
    }

    /// Property 15: a lambda's parameter shadows nothing outside it, and an
    /// unbound name inside the lambda falls through to the enclosing SELECT.
    #[test]
    fn lambda_scoping_falls_through() {
        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db);

        let lambda = Expr::new(ExprKind::Lambda {
            params: vec!["x".to_string()],
            body: Box::new(eq(ident(&["x"]), ident(&["event"]))),
        });
        let call = Expr::new(ExprKind::Call {
            name: "arrayMap".to_string(),
            args: vec![lambda],
            named_args: indexmap::IndexMap::new(),
        });
        let query = select(vec![call], Some(from("events")));

        resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None)
            .expect("`event` should resolve through the lambda's parent scope");
    }

    /// Property 6: CTE self-reference is fatal once the expansion cap is hit.
    #[test]
    fn cte_cycle_guard() {
        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db);

        let inner = select(vec![ident(&["*"])], Some(from("r")));
        let query = with_cte(
            select(vec![ident(&["*"])], Some(from("r"))),
            "r",
            CteKind::Subquery,
            select_expr(inner),
        );

        let err = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap_err();
        assert!(err.message.contains("CTE expansion limit"));
    }

    /// Property 5: a visible alias always wins over a hidden one, and
    /// redefining a visible alias is an error.
    #[test]
    fn alias_shadowing() {
        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db);

        // `event AS event` re-registers the same name visibly; should not
        // collide with the hidden alias the field resolver installs first.
        let query = select(
            vec![Expr::new(ExprKind::Alias {
                name: "event".to_string(),
                expr: Box::new(ident(&["event"])),
                hidden: false,
            })],
            Some(from("events")),
        );

        resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None)
            .expect("a visible alias may share a name with the hidden field alias beneath it");
    }

    /// Property 10 / cohort rewrite, exercised together: `IN COHORT` under
    /// the `LeftJoin` modifier is left untouched and typed `Boolean`.
    #[test]
    fn cohort_left_join_modifier_untouched() {
        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db).with_modifiers(Modifiers {
            in_cohort_via: InCohortVia::LeftJoin,
        });

        let expr = Expr::new(ExprKind::InCohort {
            expr: Box::new(ident(&["id"])),
            cohort_id: 3,
            negated: false,
        });
        let query = select(vec![expr], Some(from("events")));

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let ExprKind::Select(sq) = resolved.kind else {
            panic!("expected Select")
        };
        assert!(matches!(sq.select[0].kind, ExprKind::InCohort { .. }));
    }

    /// Property 11 (other half): under `Subquery`, `IN COHORT` is rewritten
    /// into a plain `IN` against the macro-provided cohort subquery.
    #[test]
    fn cohort_subquery_modifier_rewrites() {
        struct CohortMacros;
        impl MacroExpander for CohortMacros {
            fn expand_call(&self, _name: &str, _args: &[Expr], _team_id: TeamId) -> Option<Result<Expr>> {
                None
            }
            fn expand_join_tag(&self, tag: &str, _team_id: TeamId) -> Result<JoinExpr> {
                Err(crate::error::Error::query(format!("unknown tag `{tag}`")))
            }
            fn expand_cohort_subquery(&self, _cohort_id: i64, _team_id: TeamId) -> Result<Expr> {
                Ok(select_expr(select(vec![ident(&["id"])], Some(from("events")))))
            }
        }

        let db = MockDatabase::default().with_table(events_table());
        let mut ctx = TestContext::new(db).with_modifiers(Modifiers {
            in_cohort_via: InCohortVia::Subquery,
        });
        ctx.macros = Box::new(CohortMacros);

        let expr = Expr::new(ExprKind::InCohort {
            expr: Box::new(ident(&["id"])),
            cohort_id: 3,
            negated: false,
        });
        let query = select(vec![expr], Some(from("events")));

        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let ExprKind::Select(sq) = resolved.kind else {
            panic!("expected Select")
        };
        assert!(matches!(
            sq.select[0].kind,
            ExprKind::CompareOperation { op: crate::ast::CompareOp::In, .. }
        ));
    }

    /// Property 7: saved views nested deeper than `max_view_depth` fail.
    #[test]
    fn view_depth_guard() {
        let v1 = TableDescriptor::new(
            "v1",
            TableDescriptorKind::SavedQuery { query_text: "v1_body".to_string() },
        );
        let v2 = TableDescriptor::new(
            "v2",
            TableDescriptorKind::SavedQuery { query_text: "v2_body".to_string() },
        );
        let db = MockDatabase::default()
            .with_table(events_table())
            .with_table(v1)
            .with_table(v2)
            .with_saved_query(
                "v1_body",
                select_expr(select(vec![ident(&["event"])], Some(from("v2")))),
            )
            .with_saved_query(
                "v2_body",
                select_expr(select(vec![ident(&["event"])], Some(from("events")))),
            );
        let mut ctx = TestContext::new(db).with_max_view_depth(1);

        let query = select(vec![ident(&["event"])], Some(from("v1")));
        let err = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap_err();
        assert!(err.message.contains("max_view_depth"));
    }

    /// Property 12: a schema-declared expression field is inlined as a
    /// hidden alias wrapping its own (re-resolved) expression.
    #[test]
    fn expression_field_inlining() {
        let durations = TableDescriptor::new("durations", TableDescriptorKind::Plain)
            .with_column("start", Type::Integer)
            .with_column("end", Type::Integer)
            .with_column(
                "duration",
                Type::ExpressionField {
                    name: "duration".to_string(),
                    expr: Box::new(Expr::new(ExprKind::Call {
                        name: "minus".to_string(),
                        args: vec![ident(&["end"]), ident(&["start"])],
                        named_args: indexmap::IndexMap::new(),
                    })),
                },
            );
        let db = MockDatabase::default().with_table(durations);
        let mut ctx = TestContext::new(db);

        let query = select(vec![ident(&["duration"])], Some(from("durations")));
        let resolved = resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None).unwrap();
        let env = resolved.ty.unwrap().into_select_query().unwrap();

        let ty = env.columns.get("duration").expect("duration column exported");
        let (alias, inner) = ty.clone().into_field_alias().unwrap();
        assert_eq!(alias, "duration");
        assert!(inner.as_call().is_some(), "inlined expression keeps its own resolved type");
    }

    /// Property 14: `USING` resolves against the pre-existing scope, before
    /// the joined table is registered, so a same-named column on the new
    /// table doesn't make it ambiguous.
    #[test]
    fn using_resolves_before_registering() {
        let other = TableDescriptor::new("other_t", TableDescriptorKind::Plain)
            .with_column("id", Type::String);
        let db = MockDatabase::default()
            .with_table(events_table())
            .with_table(other);
        let mut ctx = TestContext::new(db);

        let mut base = from("events");
        base.next_join = Some(Box::new(JoinExpr {
            table: JoinSource::Name("other_t".to_string()),
            alias: None,
            join_type: JoinType { kind: JoinKind::Inner, global: false },
            constraint: Some(JoinConstraint::Using(vec!["id".to_string()])),
            table_args: Vec::new(),
            sample: None,
            next_join: None,
            span: None,
        }));
        let query = select(vec![ident(&["event"])], Some(base));

        resolve_types(select_expr(query), &mut ctx, Dialect::Strict, None)
            .expect("USING should resolve `id` against `events` alone, with no ambiguity");
    }
}
