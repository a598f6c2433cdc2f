//! The constant classifier (component C3, §4.1).

use crate::ast::Literal;
use crate::error::Result;
use crate::ir::types::Type;

use super::Resolver;

impl Resolver<'_> {
    /// Maps a literal value to its constant type. Booleans are tested before
    /// integers deliberately, matching the source behaviour where a bare
    /// boolean is never mistaken for its numeric value.
    pub(super) fn classify_literal(&self, literal: &Literal) -> Result<Type> {
        Ok(match literal {
            Literal::Null => Type::Unknown,
            Literal::Boolean(_) => Type::Boolean,
            Literal::Integer(_) => Type::Integer,
            Literal::Float(_) => Type::Float,
            Literal::String(_) => Type::String,
            Literal::Date(_) => Type::Date,
            Literal::DateTime(_) => Type::DateTime,
            Literal::Uuid(_) => Type::Uuid,
            Literal::List(items) => {
                let item_ty = common_type(items, self)?;
                Type::Array(Box::new(item_ty))
            }
            Literal::Tuple(items) => {
                let item_tys = items
                    .iter()
                    .map(|i| self.classify_literal(i))
                    .collect::<Result<Vec<_>>>()?;
                Type::Tuple(item_tys)
            }
        })
    }
}

fn common_type(items: &[Literal], resolver: &Resolver<'_>) -> Result<Type> {
    let mut tys = items.iter().map(|i| resolver.classify_literal(i));
    let Some(first) = tys.next() else {
        return Ok(Type::Unknown);
    };
    let first = first?;
    for rest in tys {
        if rest? != first {
            return Ok(Type::Unknown);
        }
    }
    Ok(first)
}
