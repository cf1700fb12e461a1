use anyhow::Result;
use tracing::instrument;

use crate::prelude::*;

use super::TypeCheckWalker;

impl TypeCheckWalker<'_> {
    /// `return_type` is the declared return type of the enclosing function.
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_statement(
        &mut self,
        statement: &Statement,
        return_type: &Type,
    ) -> Result<()> {
        match statement {
            Statement::Assign(a) => {
                self.assign(a);
            }
            Statement::Increment(e) | Statement::Decrement(e) => {
                let ty = self.visit_expression(e);
                if !ty.is_error() && !ty.is_int() {
                    self.diagnostics.fatal(
                        e.position(),
                        "Arithmetic operator applied to non-numeric operand",
                    );
                }
            }
            Statement::Read(e) => self.read(e),
            Statement::Write(e) => self.write(e),
            Statement::If(s) => {
                self.condition(&s.condition, "Non-bool expression used as an if condition");
                self.visit_block(&s.then_block, return_type)?;
            }
            Statement::IfElse(s) => {
                self.condition(&s.condition, "Non-bool expression used as an if condition");
                self.visit_block(&s.then_block, return_type)?;
                self.visit_block(&s.else_block, return_type)?;
            }
            Statement::While(s) => {
                self.condition(&s.condition, "Non-bool expression used as a while condition");
                self.visit_block(&s.body, return_type)?;
            }
            Statement::Repeat(s) => {
                let ty = self.visit_expression(&s.condition);
                if !ty.is_error() && !ty.is_int() {
                    self.diagnostics.fatal(
                        s.condition.position(),
                        "Non-integer expression used as a repeat clause",
                    );
                }
                self.visit_block(&s.body, return_type)?;
            }
            Statement::Call(c) => {
                self.call(c);
            }
            Statement::Return(r) => self.return_statement(r, return_type),
        }
        Ok(())
    }

    pub(super) fn visit_block(&mut self, block: &Block, return_type: &Type) -> Result<()> {
        for statement in &block.statements {
            self.visit_statement(statement, return_type)?;
        }
        Ok(())
    }

    fn condition(&mut self, condition: &Expression, message: &str) {
        let ty = self.visit_expression(condition);
        if !ty.is_error() && !ty.is_bool() {
            self.diagnostics.fatal(condition.position(), message);
        }
    }

    /// Only values that fit a single word can be read into.
    fn read(&mut self, operand: &Expression) {
        let ty = self.visit_expression(operand);
        let problem = match ty {
            Type::Function => Some("Attempt to read a function"),
            Type::StructDef(_) => Some("Attempt to read a struct name"),
            Type::Struct(_) => Some("Attempt to read a struct variable"),
            _ => None,
        };
        if let Some(problem) = problem {
            self.diagnostics.fatal(operand.position(), problem);
        }
        self.typing.record(operand.id(), ty);
    }

    fn write(&mut self, operand: &Expression) {
        let ty = self.visit_expression(operand);
        let problem = match ty {
            Type::Function => Some("Attempt to write a function"),
            Type::StructDef(_) => Some("Attempt to write a struct name"),
            Type::Struct(_) => Some("Attempt to write a struct variable"),
            Type::Void => Some("Attempt to write void"),
            _ => None,
        };
        if let Some(problem) = problem {
            self.diagnostics.fatal(operand.position(), problem);
        }
        self.typing.record(operand.id(), ty);
    }

    /// Each return is checked on its own; nothing verifies that every path
    /// through a non-void function returns.
    fn return_statement(&mut self, r: &ReturnStatement, return_type: &Type) {
        match &r.value {
            Some(value) => {
                let ty = self.visit_expression(value);
                if return_type.is_void() {
                    self.diagnostics
                        .fatal(value.position(), "Return with a value in a void function");
                } else if !return_type.is_error() && !ty.is_error() && *return_type != ty {
                    self.diagnostics.fatal(value.position(), "Bad return value");
                }
            }
            None if !return_type.is_void() => {
                self.diagnostics.fatal(r.position, "Missing return value");
            }
            None => {}
        }
    }
}
