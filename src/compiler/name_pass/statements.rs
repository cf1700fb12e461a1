use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::NameWalker;

impl NameWalker<'_> {
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_statement(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::Assign(a) => self.assign(a),
            Statement::Increment(e)
            | Statement::Decrement(e)
            | Statement::Read(e)
            | Statement::Write(e) => self.visit_expression(e),
            Statement::If(s) => {
                self.visit_expression(&s.condition)?;
                self.visit_block(&s.then_block)
            }
            Statement::IfElse(s) => {
                self.visit_expression(&s.condition)?;
                self.visit_block(&s.then_block)?;
                self.visit_block(&s.else_block)
            }
            Statement::While(s) | Statement::Repeat(s) => {
                self.visit_expression(&s.condition)?;
                self.visit_block(&s.body)
            }
            Statement::Call(c) => self.call(c),
            Statement::Return(r) => match &r.value {
                Some(value) => self.visit_expression(value),
                None => Ok(()),
            },
        }
    }

    /// A nested block gets its own scope.
    pub(super) fn visit_block(&mut self, block: &Block) -> Result<()> {
        self.in_scope(|walker| walker.visit_block_contents(block))
    }

    /// Declarations then statements, in the current scope.
    pub(super) fn visit_block_contents(&mut self, block: &Block) -> Result<()> {
        for declaration in &block.declarations {
            self.var_declaration(declaration, None)?;
        }
        for statement in &block.statements {
            self.visit_statement(statement)?;
        }
        Ok(())
    }
}
