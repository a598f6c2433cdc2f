//! The schema catalog collaborator (§6). `Database` is an opaque, external
//! dependency: this crate only defines the narrow interface it consults
//! (resolve a name to a [`TableDescriptor`], enumerate asterisk columns).
//! Schema discovery, storage, and caching all live outside this crate.

use indexmap::IndexMap;

use crate::ast::Expr;
use crate::error::Result;
use crate::ir::types::Type;

/// A table, view, or function-table as the catalog describes it.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub kind: TableDescriptorKind,
    /// Declared columns, in catalog-declared order. `Type` here is always one
    /// of the scalar/array/tuple variants, [`Type::ExpressionField`], or
    /// [`Type::FieldTraverser`] -- never a relational or query type.
    pub columns: IndexMap<String, Type>,
    /// Columns included when the table is expanded through `*`. Defaults to
    /// every non-expression-field, non-traverser column if left `None`.
    asterisk: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDescriptorKind {
    Plain,
    /// Requires an alias in the rewritten AST even when the user didn't write one.
    FunctionCall,
    Lazy,
    SavedQuery { query_text: String },
    S3,
    Events,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>, kind: TableDescriptorKind) -> Self {
        TableDescriptor {
            name: name.into(),
            kind,
            columns: IndexMap::new(),
            asterisk: None,
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.columns.insert(name.into(), ty);
        self
    }

    pub fn with_asterisk(mut self, columns: Vec<String>) -> Self {
        self.asterisk = Some(columns);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&Type> {
        self.columns.get(name)
    }

    /// The ordered column set `*` expands into.
    pub fn get_asterisk(&self) -> Vec<String> {
        if let Some(explicit) = &self.asterisk {
            return explicit.clone();
        }
        self.columns
            .iter()
            .filter(|(_, ty)| !matches!(ty, Type::ExpressionField { .. } | Type::FieldTraverser { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// Resolves table names against the schema. Implementations are expected to
/// be thread-safe across resolver instances operating on distinct queries;
/// this crate never calls it from more than one thread at a time.
pub trait Database {
    fn get_table(&self, name: &str) -> Result<TableDescriptor>;

    /// Parses a saved-query's stored text into a FROM-position sub-query.
    /// Only called for [`TableDescriptorKind::SavedQuery`] descriptors.
    fn parse_saved_query(&self, query_text: &str) -> Result<Expr>;
}
