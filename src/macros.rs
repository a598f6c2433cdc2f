//! The macro-expansion collaborators (§6): cohort/action/sparkline/tag
//! rewrites are pure AST→AST transforms provided by the host. This crate
//! treats them as opaque and only decides *when* to call them.

use crate::ast::{Expr, JoinExpr};
use crate::context::TeamId;
use crate::error::Result;

pub trait MacroExpander {
    /// `name` is a call target (e.g. `sparkline`, `matchesAction`). Returns
    /// `None` if `name` isn't a recognised macro so the resolver falls back
    /// to treating it as an ordinary function call.
    fn expand_call(&self, name: &str, args: &[Expr], team_id: TeamId) -> Option<Result<Expr>>;

    /// A `{% tag %}`-style macro reference used as a FROM source.
    fn expand_join_tag(&self, tag: &str, team_id: TeamId) -> Result<JoinExpr>;

    /// Builds the subquery a cohort-membership test rewrites into, e.g.
    /// `x IN COHORT 3` under `inCohortVia = subquery`.
    fn expand_cohort_subquery(&self, cohort_id: i64, team_id: TeamId) -> Result<Expr>;
}

/// A `MacroExpander` that recognises nothing; every call is treated as an
/// ordinary function, every tag and cohort expansion fails. Useful for tests
/// that don't exercise macro rewriting.
#[derive(Debug, Default)]
pub struct NoMacros;

impl MacroExpander for NoMacros {
    fn expand_call(&self, _name: &str, _args: &[Expr], _team_id: TeamId) -> Option<Result<Expr>> {
        None
    }

    fn expand_join_tag(&self, tag: &str, _team_id: TeamId) -> Result<JoinExpr> {
        Err(crate::error::Error::query(format!("unknown tag `{tag}`")))
    }

    fn expand_cohort_subquery(&self, cohort_id: i64, _team_id: TeamId) -> Result<Expr> {
        Err(crate::error::Error::query(format!(
            "unknown cohort {cohort_id}"
        )))
    }
}
