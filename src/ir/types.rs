//! The type model (§3 / component C1): a closed, tagged sum describing
//! everything a resolved expression can refer to, from scalar constants up
//! through relational sources and a query's own externally visible shape.

use indexmap::IndexMap;

use crate::ast::{CteKind, Expr};
use crate::catalog::TableDescriptor;

#[derive(Debug, Clone, PartialEq, enum_as_inner::EnumAsInner)]
pub enum Type {
    /// Not yet inferred; the common type of zero elements, and of a
    /// literal list whose elements disagree in kind.
    Unknown,

    Boolean,
    Integer,
    Float,
    String,
    Date,
    DateTime,
    Uuid,
    /// A semi-structured column. Closed under further indexing: every child
    /// of `Json` is `Json` again, which is what lets [`Type::get_child`]
    /// keep folding a `properties['a']['b']` chain. The source spec's type
    /// list doesn't name this variant explicitly, but §8 property 13 (JSON
    /// path folding) is unimplementable without *some* marker for "this
    /// column may be indexed further" -- see DESIGN.md.
    Json,

    Array(Box<Type>),
    Tuple(Vec<Type>),

    Table(TableDescriptor),
    /// Columns materialise only when referenced; see [`TableDescriptor`]'s
    /// `Lazy` kind.
    LazyTable(TableDescriptor),
    TableAlias {
        alias: String,
        inner: Box<Type>,
    },

    SelectQuery(SelectQueryEnv),
    /// Column shape is taken from the first branch (§4.4).
    SelectUnion(Vec<SelectQueryEnv>),
    SelectQueryAlias {
        alias: String,
        inner: Box<Type>,
    },
    SelectView {
        alias: String,
        view_name: String,
        inner: Box<Type>,
    },

    /// A resolved column reference.
    Field {
        name: String,
        owner: Box<Type>,
    },
    /// A resolved path into a JSON-typed column.
    Property {
        chain: Vec<PathKey>,
        base: Box<Type>,
    },

    /// A schema-defined derived column, inlined at reference sites in the
    /// strict dialect (§4.6).
    ExpressionField {
        name: String,
        expr: Box<Expr>,
    },

    FieldAlias {
        alias: String,
        inner: Box<Type>,
    },

    /// A schema-declared shortcut: to resolve this name, continue as if the
    /// user had typed `chain` on `owner`. `owner` is always a concrete,
    /// already-resolved type (typically a clone of the table the traverser
    /// points back to), set by whoever builds the `TableDescriptor` -- see
    /// DESIGN.md.
    FieldTraverser {
        chain: Vec<String>,
        owner: Box<Type>,
    },

    /// The intermediate type of `*` before expansion.
    Asterisk(Box<Type>),

    LambdaArgument(String),

    Call {
        name: String,
        arg_types: Vec<Type>,
        param_types: Option<Vec<Type>>,
        return_type: Box<Type>,
    },

    /// Lenient-dialect placeholder for a name that could not be resolved.
    UnresolvedField(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    Name(String),
    Index(i64),
}

impl PathKey {
    pub fn name(&self) -> Option<&str> {
        match self {
            PathKey::Name(n) => Some(n.as_str()),
            PathKey::Index(_) => None,
        }
    }
}

/// A binding registered in [`SelectQueryEnv::aliases`]. Visible aliases
/// dominate hidden ones (invariant 2 / §4.4 step 5).
#[derive(Debug, Clone, PartialEq)]
pub struct AliasBinding {
    pub ty: Type,
    pub hidden: bool,
}

/// A CTE attached to a [`SelectQueryEnv`]. The body is cloned at each
/// expansion site (§4.3 case 2, §4.6 step 4).
#[derive(Debug, Clone, PartialEq)]
pub struct CteEnv {
    pub kind: CteKind,
    pub body: Box<Expr>,
}

/// The per-SELECT environment: both the query's mutable binding scope while
/// it is being resolved, and (once popped) its externally visible column
/// list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectQueryEnv {
    pub columns: IndexMap<String, Type>,
    pub aliases: IndexMap<String, AliasBinding>,
    pub tables: IndexMap<String, Type>,
    pub anonymous_tables: Vec<Type>,
    pub ctes: IndexMap<String, CteEnv>,
    /// Index of the enclosing scope in the resolver's scope stack, set for
    /// lambda scopes (§4.7). A borrow, not ownership: see DESIGN.md.
    pub parent: Option<usize>,
}

impl SelectQueryEnv {
    pub fn new() -> Self {
        SelectQueryEnv::default()
    }

    /// A scope with no bindings of its own other than a parent pointer, used
    /// for lambda bodies.
    pub fn child_of(parent: usize) -> Self {
        SelectQueryEnv {
            parent: Some(parent),
            ..SelectQueryEnv::default()
        }
    }
}

impl Type {
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            Type::Table(_) | Type::LazyTable(_) | Type::TableAlias { .. }
        )
    }

    pub fn is_select_like(&self) -> bool {
        matches!(
            self,
            Type::SelectQuery(_)
                | Type::SelectUnion(_)
                | Type::SelectQueryAlias { .. }
                | Type::SelectView { .. }
        )
    }

    /// One step of chain traversal (§4.6): the *declared* type one segment
    /// below `self`, without deciding how the caller should wrap it (that's
    /// the field resolver's job -- see `resolver::names`). `None` means
    /// `segment` doesn't name anything on `self`.
    pub fn get_child(&self, segment: &str) -> Option<Type> {
        match self {
            Type::Table(d) | Type::LazyTable(d) => d.get_column(segment).cloned(),
            Type::TableAlias { inner, .. } => inner.get_child(segment),
            Type::SelectQuery(env) => env.columns.get(segment).cloned(),
            Type::SelectUnion(branches) => branches.first()?.columns.get(segment).cloned(),
            Type::SelectQueryAlias { inner, .. } | Type::SelectView { inner, .. } => {
                inner.get_child(segment)
            }
            Type::Json => Some(Type::Json),
            Type::Array(item) => Some((**item).clone()),
            Type::Tuple(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
            // Re-fetch the declared type from the owner so we don't need to
            // cache it redundantly inside `Field`/`Property` themselves.
            Type::Field { name, owner } => owner.get_child(name).and_then(|t| t.get_child(segment)),
            Type::Property { base, .. } => base.get_child(segment),
            _ => None,
        }
    }
}
