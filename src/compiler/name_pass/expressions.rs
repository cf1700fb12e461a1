use anyhow::{Context, Result};
use tracing::instrument;

use crate::{compiler::symbol_table::SymbolKind, prelude::*};

use super::NameWalker;

impl NameWalker<'_> {
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::IntLiteral(_)
            | Expression::StringLiteral(_)
            | Expression::True(_)
            | Expression::False(_) => Ok(()),
            Expression::Id(id) => self.identifier(id),
            Expression::DotAccess(d) => self.dot_access(d),
            Expression::Assign(a) => self.assign(a),
            Expression::Call(c) => self.call(c),
            Expression::Unary(u) => self.visit_expression(&u.operand),
            Expression::Binary(b) => {
                self.visit_expression(&b.left)?;
                self.visit_expression(&b.right)
            }
        }
    }

    pub(super) fn identifier(&mut self, id: &Identifier) -> Result<()> {
        match self.table.lookup_global(&id.name)? {
            Some(symbol) => self.resolution.link(id.id, symbol),
            None => self.diagnostics.fatal(id.position, "Undeclared identifier"),
        }
        Ok(())
    }

    pub(super) fn assign(&mut self, a: &AssignExpression) -> Result<()> {
        self.visit_expression(&a.target)?;
        self.visit_expression(&a.value)
    }

    pub(super) fn call(&mut self, c: &CallExpression) -> Result<()> {
        self.identifier(&c.callee)?;
        for argument in &c.arguments {
            self.visit_expression(argument)?;
        }
        Ok(())
    }

    /// Resolves the field against the struct the left side denotes. Once an
    /// access in a chain is bad, the rest of the chain stays quiet.
    #[instrument(skip_all, level = "trace", fields(field = %d.field))]
    fn dot_access(&mut self, d: &DotAccessExpression) -> Result<()> {
        self.visit_expression(&d.object)?;

        let definition = match d.object.as_ref() {
            Expression::Id(id) => match self.resolution.symbol(id.id).cloned() {
                None => None,
                Some(symbol) => match symbol.kind() {
                    SymbolKind::StructInstance { definition, .. } => Some(definition.clone()),
                    _ => {
                        self.diagnostics
                            .fatal(id.position, "Dot-access of non-struct type");
                        None
                    }
                },
            },
            Expression::DotAccess(inner) if self.resolution.is_bad_access(inner.id) => None,
            Expression::DotAccess(inner) => match self.resolution.struct_link(inner.id).cloned() {
                Some(definition) => Some(definition),
                None => {
                    self.diagnostics
                        .fatal(inner.field.position, "Dot-access of non-struct type");
                    None
                }
            },
            other => {
                self.diagnostics
                    .fatal(other.position(), "Dot-access of non-struct type");
                None
            }
        };

        let Some(definition) = definition else {
            self.resolution.mark_bad_access(d.id);
            return Ok(());
        };

        let fields = definition
            .struct_fields()
            .context("Struct instance without a field table")?;
        match fields.lookup_global(&d.field.name)? {
            Some(field) => {
                if let SymbolKind::StructInstance { definition, .. } = field.kind() {
                    self.resolution.link_struct(d.id, definition.clone());
                }
                self.resolution.link(d.field.id, field.clone());
                self.resolution.link(d.id, field);
            }
            None => {
                self.diagnostics
                    .fatal(d.field.position, "Invalid struct field name");
                self.resolution.mark_bad_access(d.id);
            }
        }
        Ok(())
    }
}
