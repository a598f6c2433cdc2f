//! The `SelectQuery` resolver (component C6, §4.4): the eight-step pipeline
//! that pushes a scope, resolves FROM, the SELECT list (with asterisk
//! expansion), ARRAY JOIN, and every remaining clause, then pops the scope.

use std::collections::HashMap;

use crate::ast::{Expr, ExprKind, SelectQuery};
use crate::error::{Error, Result};
use crate::ir::types::{AliasBinding, CteEnv, SelectQueryEnv, Type};

use super::Resolver;

impl Resolver<'_> {
    /// Returns the printable (unresolved-CTE, resolved-body) clone alongside
    /// the final popped scope, which becomes the query's `Type`.
    pub(super) fn resolve_select(&mut self, mut query: SelectQuery) -> Result<(SelectQuery, SelectQueryEnv)> {
        let mut env = SelectQueryEnv::new();
        for (name, cte) in query.ctes.drain(..) {
            env.ctes.insert(name, CteEnv { kind: cte.kind, body: cte.body });
        }
        let idx = self.scopes.push(env);

        let mut out = SelectQuery::empty();
        out.distinct = query.distinct;
        out.limit_with_ties = query.limit_with_ties;
        out.settings = query.settings.take();
        out.view_name = query.view_name.take();
        out.span = query.span;

        let result = self.resolve_select_body(&mut query, &mut out, idx);

        let final_env = self.scopes.pop();
        result?;
        Ok((out, final_env))
    }

    fn resolve_select_body(&mut self, query: &mut SelectQuery, out: &mut SelectQuery, idx: usize) -> Result<()> {
        // Step 3: FROM / JOIN populates scope.tables.
        if let Some(from) = query.from.take() {
            out.from = Some(Box::new(self.resolve_join(*from)?));
        }

        // Step 4: ARRAY JOIN pass 1 -- placeholder aliases only.
        if let Some(array_join) = &query.array_join {
            for (alias, _) in &array_join.items {
                if let Some(existing) = self.scopes.at(idx).aliases.get(alias) {
                    if !existing.hidden {
                        return Err(Error::query(format!(
                            "ARRAY JOIN alias `{alias}` clashes with an existing alias"
                        )));
                    }
                }
                self.scopes.register_alias(
                    idx,
                    alias.clone(),
                    AliasBinding {
                        ty: Type::Unknown,
                        hidden: false,
                    },
                )?;
            }
        }

        // Step 5: SELECT list, with asterisk expansion. Each resolved item
        // is marked for export into `scope.columns`: the first visible, or
        // else the last hidden, expression for each unique exported name.
        let mut visible_alias: HashMap<String, bool> = HashMap::new();
        for item in query.select.drain(..) {
            let resolved = self.resolve_expr(item)?;
            if let Some(Type::Asterisk(owner)) = &resolved.ty {
                let names = self.expand_asterisk(owner)?;
                for name in names {
                    let ident = Expr::new(ExprKind::Ident(vec![name])).with_span(resolved.span);
                    let resolved_item = self.resolve_expr(ident)?;
                    self.record_column(idx, &resolved_item, &mut visible_alias);
                    out.select.push(resolved_item);
                }
            } else {
                self.record_column(idx, &resolved, &mut visible_alias);
                out.select.push(resolved);
            }
        }

        // Step 6: ARRAY JOIN pass 2 -- drop placeholders, resolve for real.
        if let Some(array_join) = query.array_join.take() {
            for (alias, _) in &array_join.items {
                self.scopes.at_mut(idx).aliases.shift_remove(alias);
            }
            let mut items = Vec::with_capacity(array_join.items.len());
            for (alias, expr) in array_join.items {
                let resolved = self.resolve_expr(expr)?;
                let item_ty = array_item_type(resolved.ty.as_ref().unwrap());
                self.scopes.register_alias(
                    idx,
                    alias.clone(),
                    AliasBinding {
                        ty: item_ty,
                        hidden: false,
                    },
                )?;
                items.push((alias, resolved));
            }
            out.array_join = Some(crate::ast::ArrayJoin {
                left: array_join.left,
                items,
            });
        }

        // Step 7: the remaining clauses.
        if let Some(prewhere) = query.prewhere.take() {
            out.prewhere = Some(self.resolve_expr(prewhere)?);
        }
        if let Some(where_) = query.where_.take() {
            out.where_ = Some(self.resolve_expr(where_)?);
        }
        if let Some(having) = query.having.take() {
            out.having = Some(self.resolve_expr(having)?);
        }
        for expr in query.group_by.drain(..) {
            out.group_by.push(self.resolve_expr(expr)?);
        }
        for expr in query.order_by.drain(..) {
            out.order_by.push(self.resolve_expr(expr)?);
        }
        for expr in query.limit_by.drain(..) {
            out.limit_by.push(self.resolve_expr(expr)?);
        }
        if let Some(limit) = query.limit.take() {
            out.limit = Some(self.resolve_expr(limit)?);
        }
        if let Some(offset) = query.offset.take() {
            out.offset = Some(self.resolve_expr(offset)?);
        }
        for (name, expr) in query.window_exprs.drain(..) {
            out.window_exprs.insert(name, self.resolve_expr(expr)?);
        }

        Ok(())
    }

    /// §4.4 step 5: records one resolved SELECT-list item under its export
    /// name in `scope.columns`, preferring a visible write over a hidden
    /// one (a plain field reference is wrapped in a hidden alias, so an
    /// explicit `AS` on the same name must win).
    fn record_column(&mut self, idx: usize, resolved: &Expr, visible_alias: &mut HashMap<String, bool>) {
        let Some(alias) = export_name(resolved) else {
            return;
        };
        if alias.is_empty() {
            return;
        }
        let ty = resolved.ty.clone().unwrap();
        let hidden = matches!(resolved.kind, ExprKind::Alias { hidden: true, .. });
        if hidden {
            let already_visible = visible_alias.get(&alias).copied().unwrap_or(false);
            if !self.scopes.at(idx).columns.contains_key(&alias) || !already_visible {
                self.scopes.at_mut(idx).columns.insert(alias.clone(), ty);
                visible_alias.insert(alias, false);
            }
        } else {
            self.scopes.at_mut(idx).columns.insert(alias.clone(), ty);
            visible_alias.insert(alias, true);
        }
    }

    /// §4.5: expands an `Asterisk(owner)` into the bare-identifier chains it
    /// stands for.
    fn expand_asterisk(&self, owner: &Type) -> Result<Vec<String>> {
        match owner {
            Type::Table(d) | Type::LazyTable(d) => Ok(d.get_asterisk()),
            Type::TableAlias { inner, .. } => self.expand_asterisk(inner),
            Type::SelectQuery(env) => Ok(env.columns.keys().cloned().collect()),
            Type::SelectUnion(envs) => Ok(envs
                .first()
                .map(|env| env.columns.keys().cloned().collect())
                .unwrap_or_default()),
            Type::SelectQueryAlias { inner, .. } | Type::SelectView { inner, .. } => {
                self.expand_asterisk(inner)
            }
            _ => Err(Error::query("can't expand asterisk")),
        }
    }
}

/// The name a resolved SELECT-list item exports into `scope.columns`, if
/// any (§4.4 step 5), in priority order: a `FieldAlias`'s own alias, a bare
/// `Field`'s or `ExpressionField`'s name, or an `Alias` AST node's name.
fn export_name(resolved: &Expr) -> Option<String> {
    match &resolved.ty {
        Some(Type::FieldAlias { alias, .. }) => Some(alias.clone()),
        Some(Type::Field { name, .. }) => Some(name.clone()),
        Some(Type::ExpressionField { name, .. }) => Some(name.clone()),
        _ => match &resolved.kind {
            ExprKind::Alias { name, .. } => Some(name.clone()),
            _ => None,
        },
    }
}

fn array_item_type(ty: &Type) -> Type {
    match ty {
        Type::Array(item) => (**item).clone(),
        Type::FieldAlias { inner, .. } => array_item_type(inner),
        _ => Type::Unknown,
    }
}
