//! The `JoinExpr` resolver (component C5, §4.3): resolves each source in
//! FROM/JOIN and registers it in the current scope.

use crate::ast::{Expr, ExprKind, JoinConstraint, JoinExpr, JoinSource};
use crate::catalog::TableDescriptorKind;
use crate::error::{Error, Result};
use crate::ir::types::Type;

use super::Resolver;

impl Resolver<'_> {
    pub(super) fn resolve_join(&mut self, mut join: JoinExpr) -> Result<JoinExpr> {
        match join.table.clone() {
            JoinSource::MacroTag(tag) => {
                let team_id = self.ctx.team_id();
                let mut expanded = self.ctx.macros().expand_join_tag(&tag, team_id)?;
                if join.alias.is_some() {
                    expanded.alias = join.alias;
                }
                expanded.next_join = join.next_join;
                self.resolve_join(expanded)
            }

            JoinSource::Name(name) if self.scopes.find_cte(&name).is_some() => {
                let cte = self.scopes.find_cte(&name).cloned().unwrap();
                let mut expanded = join.clone();
                expanded.table = JoinSource::Sub(cte.body.clone());
                if expanded.alias.is_none() {
                    expanded.alias = Some(name.clone());
                }
                self.bump_cte_expansions()?;
                let result = self.resolve_join(expanded);
                self.cte_expansions -= 1;
                result
            }

            JoinSource::Name(name) => self.resolve_catalog_join(name, join),

            JoinSource::Sub(body) => self.resolve_subquery_join(*body, join),
        }
    }

    fn resolve_catalog_join(&mut self, name: String, mut join: JoinExpr) -> Result<JoinExpr> {
        let key = join.alias.clone().unwrap_or_else(|| name.clone());
        if self.scopes.current().tables.contains_key(&key) {
            return Err(Error::query(format!("`{key}` is already joined")).with_span(join.span));
        }

        let descriptor = self.ctx.database().get_table(&name)?;

        let ty = match &descriptor.kind {
            TableDescriptorKind::SavedQuery { query_text } => {
                let query_text = query_text.clone();
                let mut body = self.ctx.database().parse_saved_query(&query_text)?;
                if let ExprKind::Select(sq) = &mut body.kind {
                    sq.view_name = Some(name.clone());
                }
                self.enter_view()?;
                let resolved = self.resolve_subquery_join(body, join);
                self.leave_view();
                return resolved;
            }
            TableDescriptorKind::Lazy => Type::LazyTable(descriptor.clone()),
            _ => Type::Table(descriptor.clone()),
        };

        let is_function_call = descriptor.kind == TableDescriptorKind::FunctionCall;
        let ty = if join.alias.is_some() || is_function_call {
            Type::TableAlias {
                alias: key.clone(),
                inner: Box::new(ty),
            }
        } else {
            ty
        };

        self.resolve_using_before_registering(&mut join)?;

        self.scopes.current_mut().tables.insert(key, ty);

        self.resolve_on_after_registering(&mut join)?;
        self.resolve_join_tail(&mut join)?;

        Ok(join)
    }

    fn resolve_subquery_join(&mut self, body: Expr, mut join: JoinExpr) -> Result<JoinExpr> {
        self.resolve_using_before_registering(&mut join)?;

        let resolved_body = self.resolve_expr(body)?;
        let view_name = match &resolved_body.kind {
            ExprKind::Select(sq) => sq.view_name.clone(),
            _ => None,
        };
        let inner_ty = resolved_body.ty.clone().unwrap();

        let ty = match (view_name, &join.alias) {
            (Some(view_name), Some(alias)) => Type::SelectView {
                alias: alias.clone(),
                view_name,
                inner: Box::new(inner_ty),
            },
            (_, Some(alias)) => Type::SelectQueryAlias {
                alias: alias.clone(),
                inner: Box::new(inner_ty),
            },
            (_, None) => {
                self.scopes.current_mut().anonymous_tables.push(inner_ty);
                join.table = JoinSource::Sub(Box::new(resolved_body));
                self.resolve_on_after_registering(&mut join)?;
                self.resolve_join_tail(&mut join)?;
                return Ok(join);
            }
        };

        if let Some(alias) = &join.alias {
            self.scopes.current_mut().tables.insert(alias.clone(), ty);
        }
        join.table = JoinSource::Sub(Box::new(resolved_body));

        self.resolve_on_after_registering(&mut join)?;
        self.resolve_join_tail(&mut join)?;
        Ok(join)
    }

    fn resolve_using_before_registering(&mut self, join: &mut JoinExpr) -> Result<()> {
        if let Some(JoinConstraint::Using(cols)) = &join.constraint {
            for col in cols.clone() {
                self.resolve_chain(&[col], join.span)?;
            }
        }
        Ok(())
    }

    fn resolve_on_after_registering(&mut self, join: &mut JoinExpr) -> Result<()> {
        if let Some(JoinConstraint::On(expr)) = join.constraint.take() {
            let resolved = self.resolve_expr(*expr)?;
            join.constraint = Some(JoinConstraint::On(Box::new(resolved)));
        }
        Ok(())
    }

    fn resolve_join_tail(&mut self, join: &mut JoinExpr) -> Result<()> {
        let mut args = Vec::with_capacity(join.table_args.len());
        for arg in join.table_args.drain(..) {
            args.push(self.resolve_expr(arg)?);
        }
        join.table_args = args;

        if let Some(sample) = join.sample.take() {
            join.sample = Some(self.resolve_expr(sample)?);
        }

        if let Some(next) = join.next_join.take() {
            let mut next = self.resolve_join(*next)?;
            // §4.3 "Global-join promotion": the only place the resolver
            // rewrites a join kind rather than just annotating types.
            if self.source_kind(&join.table) == Some(TableDescriptorKind::Events)
                && self.source_kind(&next.table) == Some(TableDescriptorKind::S3)
            {
                log::debug!("promoting join to GLOBAL JOIN (events -> s3 source)");
                next.join_type.global = true;
            }
            join.next_join = Some(Box::new(next));
        }

        Ok(())
    }

    /// The catalog kind backing a join source, for sources named directly by
    /// a catalog table (not CTEs, macro tags, or sub-queries -- those never
    /// participate in the global-join heuristic).
    fn source_kind(&self, source: &JoinSource) -> Option<TableDescriptorKind> {
        match source {
            JoinSource::Name(name) => self.ctx.database().get_table(name).ok().map(|d| d.kind),
            _ => None,
        }
    }
}
