//! The expression resolver (component C7, §4.7): the dispatcher every other
//! submodule calls back into, and the home of the two comparison-site
//! rewrites (GLOBAL IN promotion, cohort-membership subquery rewrite).

use crate::ast::{CompareOp, Expr, ExprKind};
use crate::context::InCohortVia;
use crate::error::{Error, Result, WithErrorInfo};
use crate::ir::types::{AliasBinding, CteEnv, PathKey, SelectQueryEnv, Type};

use super::Resolver;

impl Resolver<'_> {
    /// Resolves one expression node and everything beneath it, returning a
    /// clone with `ty` populated throughout (invariant 1). Never called on
    /// an already-resolved node.
    pub(crate) fn resolve_expr(&mut self, expr: Expr) -> Result<Expr> {
        if expr.ty.is_some() {
            return Err(Error::impossible_ast(
                "resolve_expr called on an already-resolved expression",
            ));
        }

        let span = expr.span;

        match expr.kind {
            ExprKind::Literal(lit) => {
                let ty = self.classify_literal(&lit)?;
                Ok(Expr {
                    kind: ExprKind::Literal(lit),
                    span,
                    ty: Some(ty),
                })
            }

            ExprKind::Ident(chain) => self.resolve_chain(&chain, span),

            ExprKind::Call { name, args, named_args } => {
                self.resolve_call(name, args, named_args, span)
            }

            ExprKind::Lambda { params, body } => self.resolve_lambda(params, body, span),

            ExprKind::And(l, r) => {
                let l = self.resolve_expr(*l)?;
                let r = self.resolve_expr(*r)?;
                Ok(Expr {
                    kind: ExprKind::And(Box::new(l), Box::new(r)),
                    span,
                    ty: Some(Type::Boolean),
                })
            }
            ExprKind::Or(l, r) => {
                let l = self.resolve_expr(*l)?;
                let r = self.resolve_expr(*r)?;
                Ok(Expr {
                    kind: ExprKind::Or(Box::new(l), Box::new(r)),
                    span,
                    ty: Some(Type::Boolean),
                })
            }
            ExprKind::Not(inner) => {
                let inner = self.resolve_expr(*inner)?;
                Ok(Expr {
                    kind: ExprKind::Not(Box::new(inner)),
                    span,
                    ty: Some(Type::Boolean),
                })
            }

            ExprKind::CompareOperation { op, left, right } => {
                self.resolve_compare(op, left, right, span)
            }

            ExprKind::InCohort {
                expr: inner,
                cohort_id,
                negated,
            } => self.resolve_in_cohort(inner, cohort_id, negated, span),

            ExprKind::Index { base, key } => self.resolve_index(base, key, span),

            ExprKind::TupleIndex { base, index } => self.resolve_tuple_index(base, index, span),

            ExprKind::Alias { name, expr: inner, hidden } => {
                self.resolve_alias(name, inner, hidden, span)
            }

            ExprKind::Select(query) => {
                let (resolved, env) = self.resolve_select(*query)?;
                Ok(Expr {
                    kind: ExprKind::Select(Box::new(resolved)),
                    span,
                    ty: Some(Type::SelectQuery(env)),
                })
            }

            ExprKind::Union(branches) => {
                // §4.4: CTEs defined on the first branch are visible to
                // every branch, not just the one that declared them.
                let shared_scope = branches.first().filter(|b| !b.ctes.is_empty()).map(|first| {
                    let mut shared = SelectQueryEnv::new();
                    for (name, cte) in &first.ctes {
                        shared.ctes.insert(
                            name.clone(),
                            CteEnv {
                                kind: cte.kind,
                                body: cte.body.clone(),
                            },
                        );
                    }
                    self.scopes.push(shared)
                });

                let mut resolved = Vec::with_capacity(branches.len());
                let mut envs = Vec::with_capacity(branches.len());
                let mut first_err = None;
                for branch in branches {
                    match self.resolve_select(branch) {
                        Ok((r, env)) => {
                            resolved.push(r);
                            envs.push(env);
                        }
                        Err(e) => {
                            first_err = Some(e);
                            break;
                        }
                    }
                }
                if shared_scope.is_some() {
                    self.scopes.pop();
                }
                if let Some(e) = first_err {
                    return Err(e);
                }

                Ok(Expr {
                    kind: ExprKind::Union(resolved),
                    span,
                    ty: Some(Type::SelectUnion(envs)),
                })
            }
        }
    }

    fn resolve_call(
        &mut self,
        name: String,
        args: Vec<Expr>,
        named_args: indexmap::IndexMap<String, Expr>,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        let team_id = self.ctx.team_id();
        if let Some(expansion) = self.ctx.macros().expand_call(&name, &args, team_id) {
            // The macro rewrite is itself unresolved AST; recurse into it
            // rather than trusting the macro to have typed it.
            return self.resolve_expr(expansion?.with_span(span));
        }

        let mut resolved_args = Vec::with_capacity(args.len());
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            let resolved = self.resolve_expr(arg)?;
            arg_types.push(resolved.ty.clone().unwrap());
            resolved_args.push(resolved);
        }

        let mut resolved_named = indexmap::IndexMap::with_capacity(named_args.len());
        for (key, arg) in named_args {
            resolved_named.insert(key, self.resolve_expr(arg)?);
        }

        // The function/UDF registry is out of scope (§2 Non-goals): every
        // call's return type is `Unknown` unless a macro claimed it above.
        let ty = Type::Call {
            name: name.clone(),
            arg_types,
            param_types: None,
            return_type: Box::new(Type::Unknown),
        };

        Ok(Expr {
            kind: ExprKind::Call {
                name,
                args: resolved_args,
                named_args: resolved_named,
            },
            span,
            ty: Some(ty),
        })
    }

    fn resolve_lambda(
        &mut self,
        params: Vec<String>,
        body: Box<Expr>,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        let scope_idx = self.scopes.push_child();
        for param in &params {
            self.scopes.register_alias(
                scope_idx,
                param.clone(),
                AliasBinding {
                    ty: Type::FieldAlias {
                        alias: param.clone(),
                        inner: Box::new(Type::LambdaArgument(param.clone())),
                    },
                    hidden: false,
                },
            )?;
        }
        let resolved_body = self.resolve_expr(*body)?;
        self.scopes.pop();

        let ty = resolved_body.ty.clone().unwrap();
        Ok(Expr {
            kind: ExprKind::Lambda {
                params,
                body: Box::new(resolved_body),
            },
            span,
            ty: Some(ty),
        })
    }

    /// §4.7 "GLOBAL IN promotion": `x IN (SELECT ... FROM s3(...))` is
    /// rewritten to `x GLOBAL IN (...)` so the query planner ships the
    /// right side to every shard once instead of per-shard.
    fn resolve_compare(
        &mut self,
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        let left = self.resolve_expr(*left)?;
        let right = self.resolve_expr(*right)?;

        let promote = is_events_field(left.ty.as_ref().unwrap())
            && references_s3_select(right.ty.as_ref().unwrap());
        let op = match op {
            CompareOp::In if promote => CompareOp::GlobalIn,
            CompareOp::NotIn if promote => CompareOp::GlobalNotIn,
            other => other,
        };

        Ok(Expr {
            kind: ExprKind::CompareOperation {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
            ty: Some(Type::Boolean),
        })
    }

    /// §4.7 "cohort-membership rewrite". Under `InCohortVia::Subquery` the
    /// node is replaced outright by `expr (NOT) IN (<cohort subquery>)`;
    /// under `LeftJoin` the host is expected to add the join itself (outside
    /// this crate's scope) and the node is left in place, typed `Boolean`.
    fn resolve_in_cohort(
        &mut self,
        inner: Box<Expr>,
        cohort_id: i64,
        negated: bool,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        match self.ctx.modifiers().in_cohort_via {
            InCohortVia::Subquery => {
                let team_id = self.ctx.team_id();
                let subquery = self.ctx.macros().expand_cohort_subquery(cohort_id, team_id)?;
                let op = if negated {
                    CompareOp::NotIn
                } else {
                    CompareOp::In
                };
                let rewritten = Expr::new(ExprKind::CompareOperation {
                    op,
                    left: inner,
                    right: Box::new(subquery),
                })
                .with_span(span);
                self.resolve_expr(rewritten)
            }
            InCohortVia::LeftJoin => {
                let resolved_inner = self.resolve_expr(*inner)?;
                Ok(Expr {
                    kind: ExprKind::InCohort {
                        expr: Box::new(resolved_inner),
                        cohort_id,
                        negated,
                    },
                    span,
                    ty: Some(Type::Boolean),
                })
            }
        }
    }

    /// §4.7 bracket indexing: array/map element access, or one more hop of a
    /// JSON path when the base is already JSON-typed.
    fn resolve_index(&mut self, base: Box<Expr>, key: Box<Expr>, span: Option<crate::ast::Span>) -> Result<Expr> {
        let base = self.resolve_expr(*base)?;
        let key = self.resolve_expr(*key)?;
        let base_ty = base.ty.clone().unwrap();

        if is_json_typed(&base_ty) {
            let (root, mut chain) = super::names::property_base_and_chain(&base_ty);
            chain.push(path_key_of(&key));
            let folded = Type::Property {
                chain,
                base: Box::new(root),
            };
            let inner = Expr {
                kind: ExprKind::Index {
                    base: Box::new(base),
                    key: Box::new(key),
                },
                span,
                ty: Some(folded.clone()),
            };
            return self.wrap_field_leaf(inner, folded, span);
        }

        let ty = match &base_ty {
            Type::Array(item) => (**item).clone(),
            _ => return Err(Error::query("cannot index a non-array, non-JSON value").with_span(span)),
        };

        Ok(Expr {
            kind: ExprKind::Index {
                base: Box::new(base),
                key: Box::new(key),
            },
            span,
            ty: Some(ty),
        })
    }

    fn resolve_tuple_index(
        &mut self,
        base: Box<Expr>,
        index: usize,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        let base = self.resolve_expr(*base)?;
        let base_ty = base.ty.clone().unwrap();
        let ty = base_ty.get_child(&index.to_string()).ok_or_else(|| {
            Error::query(format!("tuple has no element {index}")).with_span(span)
        })?;

        Ok(Expr {
            kind: ExprKind::TupleIndex {
                base: Box::new(base),
                index,
            },
            span,
            ty: Some(ty),
        })
    }

    fn resolve_alias(
        &mut self,
        name: String,
        inner: Box<Expr>,
        hidden: bool,
        span: Option<crate::ast::Span>,
    ) -> Result<Expr> {
        if name.is_empty() && self.dialect.is_strict() {
            return Err(Error::query("alias name cannot be empty").with_span(span));
        }

        let resolved_inner = self.resolve_expr(*inner)?;
        let inner_ty = resolved_inner.ty.clone().unwrap();

        if !name.is_empty() {
            let top = self.scopes.top_index().expect("no open scope");
            self.scopes.register_alias(
                top,
                name.clone(),
                AliasBinding {
                    ty: inner_ty.clone(),
                    hidden,
                },
            )?;
        }

        Ok(Expr {
            kind: ExprKind::Alias {
                name: name.clone(),
                expr: Box::new(resolved_inner),
                hidden,
            },
            span,
            ty: Some(Type::FieldAlias {
                alias: name,
                inner: Box::new(inner_ty),
            }),
        })
    }
}

fn table_descriptor_kind(ty: &Type) -> Option<crate::catalog::TableDescriptorKind> {
    match ty {
        Type::Table(d) | Type::LazyTable(d) => Some(d.kind.clone()),
        Type::TableAlias { inner, .. } => table_descriptor_kind(inner),
        _ => None,
    }
}

/// True if `ty` is a (possibly aliased) column reference rooted at the
/// `events` catalog table -- the left-hand side of the GLOBAL IN heuristic.
fn is_events_field(ty: &Type) -> bool {
    match ty {
        Type::Field { owner, .. } => {
            table_descriptor_kind(owner) == Some(crate::catalog::TableDescriptorKind::Events)
        }
        Type::FieldAlias { inner, .. } => is_events_field(inner),
        _ => false,
    }
}

/// True if `ty` is a SELECT (or a thin wrapper around one) whose FROM
/// includes an `s3` external table -- the right-hand side of the heuristic.
fn references_s3_select(ty: &Type) -> bool {
    let is_s3 = |t: &Type| table_descriptor_kind(t) == Some(crate::catalog::TableDescriptorKind::S3);
    match ty {
        Type::SelectQuery(env) => env.tables.values().any(is_s3),
        Type::SelectUnion(envs) => envs.first().is_some_and(|env| env.tables.values().any(is_s3)),
        Type::SelectQueryAlias { inner, .. } | Type::SelectView { inner, .. } => {
            references_s3_select(inner)
        }
        _ => false,
    }
}

fn is_json_typed(ty: &Type) -> bool {
    match ty {
        Type::Json | Type::Property { .. } => true,
        Type::Field { name, owner } => owner.get_child(name) == Some(Type::Json),
        Type::FieldAlias { inner, .. } => is_json_typed(inner),
        _ => false,
    }
}

fn path_key_of(key: &Expr) -> PathKey {
    match &key.kind {
        ExprKind::Literal(crate::ast::Literal::String(s)) => PathKey::Name(s.clone()),
        ExprKind::Literal(crate::ast::Literal::Integer(i)) => PathKey::Index(*i),
        _ => PathKey::Index(-1),
    }
}
