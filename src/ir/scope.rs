//! The scope stack (component C2, §4.2): a LIFO stack of [`SelectQueryEnv`]
//! values mirroring the currently-open SELECTs and lambdas (invariant 7).
//!
//! Per the design notes, a lambda's `parent` link is a borrow encoded as an
//! index into this stack's backing storage, never shared ownership: we keep
//! every popped scope around (the stack only ever grows) so that `parent`
//! indices taken while a scope was on top remain valid after it's popped.

use crate::error::{Error, Result};
use crate::ir::types::{AliasBinding, CteEnv, SelectQueryEnv};

#[derive(Debug, Default)]
pub struct ScopeStack {
    /// Every scope ever pushed, in creation order. `open` tracks which
    /// prefix is currently "on the stack"; entries past it are retained only
    /// so earlier `parent` indices stay valid.
    arena: Vec<SelectQueryEnv>,
    open: Vec<usize>,
}

impl ScopeStack {
    pub fn new() -> Self {
        ScopeStack::default()
    }

    /// Pre-seed the stack so fragments can be resolved against an outer
    /// query (the optional `scopes` parameter of `resolve_types`).
    pub fn seeded(envs: Vec<SelectQueryEnv>) -> Self {
        let mut stack = ScopeStack::new();
        for env in envs {
            let idx = stack.arena.len();
            stack.arena.push(env);
            stack.open.push(idx);
        }
        stack
    }

    pub fn push(&mut self, env: SelectQueryEnv) -> usize {
        let idx = self.arena.len();
        self.arena.push(env);
        self.open.push(idx);
        idx
    }

    pub fn push_child(&mut self) -> usize {
        let parent = self.top_index();
        let env = match parent {
            Some(p) => SelectQueryEnv::child_of(p),
            None => SelectQueryEnv::new(),
        };
        self.push(env)
    }

    /// Pops the top scope, returning its final (popped but AST-attached)
    /// environment.
    pub fn pop(&mut self) -> SelectQueryEnv {
        let idx = self.open.pop().expect("pop on empty scope stack");
        self.arena[idx].clone()
    }

    pub fn top_index(&self) -> Option<usize> {
        self.open.last().copied()
    }

    pub fn current(&self) -> &SelectQueryEnv {
        let idx = self.top_index().expect("no open scope");
        &self.arena[idx]
    }

    pub fn current_mut(&mut self) -> &mut SelectQueryEnv {
        let idx = self.top_index().expect("no open scope");
        &mut self.arena[idx]
    }

    pub fn at(&self, idx: usize) -> &SelectQueryEnv {
        &self.arena[idx]
    }

    pub fn at_mut(&mut self, idx: usize) -> &mut SelectQueryEnv {
        &mut self.arena[idx]
    }

    /// CTE lookup walks the *entire* open stack, top to bottom (§4.2): CTEs
    /// defined in an enclosing query are visible to inner queries.
    pub fn find_cte(&self, name: &str) -> Option<&CteEnv> {
        for &idx in self.open.iter().rev() {
            if let Some(cte) = self.arena[idx].ctes.get(name) {
                return Some(cte);
            }
        }
        None
    }

    /// Registers an alias on the scope at `idx`, enforcing the visibility
    /// rule: a visible binding always overwrites any existing binding; a
    /// hidden binding never overwrites an existing visible one (§4.4 step 5,
    /// invariant 2).
    pub fn register_alias(&mut self, idx: usize, name: String, binding: AliasBinding) -> Result<()> {
        let env = &mut self.arena[idx];
        if !binding.hidden {
            if let Some(existing) = env.aliases.get(&name) {
                if !existing.hidden {
                    return Err(Error::query(format!("redefinition of alias `{name}`")));
                }
            }
            env.aliases.insert(name, binding);
        } else if !env.aliases.contains_key(&name) {
            env.aliases.insert(name, binding);
        }
        Ok(())
    }
}
