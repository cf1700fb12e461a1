use anyhow::Result;
use tracing::instrument;

use crate::{
    compiler::asm::{Label, Mnemonic, Operand, Register},
    prelude::*,
};

use super::EmitWalker;

impl EmitWalker<'_> {
    /// `exit` is the epilogue label of the enclosing function.
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_statement(&mut self, statement: &Statement, exit: &Label) -> Result<()> {
        match statement {
            Statement::Assign(a) => {
                self.comment(statement.to_string().trim_end().to_string());
                self.assign(a)?;
                self.discard();
            }
            Statement::Increment(e) => self.step(statement, e, 1)?,
            Statement::Decrement(e) => self.step(statement, e, -1)?,
            Statement::Read(e) => self.read(statement, e)?,
            Statement::Write(e) => self.write(statement, e)?,
            Statement::If(s) => {
                let end = self.fresh_label();
                self.comment(format!("if ({}) {{", s.condition));
                self.condition(&s.condition, &end)?;
                self.visit_block(&s.then_block, exit)?;
                self.label(&end);
                self.comment("} end if");
            }
            Statement::IfElse(s) => {
                let otherwise = self.fresh_label();
                let end = self.fresh_label();
                self.comment(format!("if ({}) {{", s.condition));
                self.condition(&s.condition, &otherwise)?;
                self.visit_block(&s.then_block, exit)?;
                self.instruction(Mnemonic::J, vec![(&end).into()]);
                self.comment("} else {");
                self.label(&otherwise);
                self.visit_block(&s.else_block, exit)?;
                self.label(&end);
                self.comment("} end if");
            }
            Statement::While(s) => {
                let start = self.fresh_label();
                let end = self.fresh_label();
                self.comment(format!("while ({}) {{", s.condition));
                self.label(&start);
                self.condition(&s.condition, &end)?;
                self.visit_block(&s.body, exit)?;
                self.instruction(Mnemonic::J, vec![(&start).into()]);
                self.label(&end);
                self.comment("} end while");
            }
            Statement::Repeat(s) => {
                self.diagnostics
                    .fatal(s.condition.position(), "Repeat statement unsupported");
            }
            Statement::Call(c) => {
                self.comment(statement.to_string().trim_end().to_string());
                self.call(c)?;
                self.discard();
            }
            Statement::Return(r) => {
                self.comment(statement.to_string().trim_end().to_string());
                if let Some(value) = &r.value {
                    self.visit_expression(value)?;
                    self.pop(Register::V0);
                }
                self.instruction(Mnemonic::J, vec![exit.into()]);
            }
        }
        Ok(())
    }

    pub(super) fn visit_block(&mut self, block: &Block, exit: &Label) -> Result<()> {
        for declaration in &block.declarations {
            self.local_declaration(declaration);
        }
        for statement in &block.statements {
            self.visit_statement(statement, exit)?;
        }
        Ok(())
    }

    /// Evaluates `condition` and branches to `otherwise` when it is false.
    fn condition(&mut self, condition: &Expression, otherwise: &Label) -> Result<()> {
        self.visit_expression(condition)?;
        self.pop(Register::T0);
        self.instruction(
            Mnemonic::Beq,
            vec![Register::T0.into(), Register::Zero.into(), otherwise.into()],
        );
        Ok(())
    }

    /// `++` and `--`: load through the address, adjust, store back.
    fn step(&mut self, statement: &Statement, target: &Expression, delta: i32) -> Result<()> {
        if self.rejects_struct_target(target)? {
            return Ok(());
        }
        self.comment(statement.to_string().trim_end().to_string());
        self.visit_address(target)?;
        self.visit_expression(target)?;
        self.pop(Register::T0);
        self.pop(Register::T1);
        self.instruction(
            Mnemonic::Addi,
            vec![Register::T0.into(), Register::T0.into(), delta.into()],
        );
        self.instruction(
            Mnemonic::Sw,
            vec![Register::T0.into(), Operand::indexed(0, Register::T1)],
        );
        Ok(())
    }

    fn read(&mut self, statement: &Statement, target: &Expression) -> Result<()> {
        let ty = self.recorded_type(target.id())?;
        if !ty.is_int() && !ty.is_bool() {
            self.diagnostics
                .fatal(target.position(), format!("Unsupported read type ({ty})"));
            return Ok(());
        }

        self.comment(statement.to_string().trim_end().to_string());
        self.instruction(Mnemonic::Li, vec![Register::V0.into(), Operand::Imm(5)]);
        self.instruction(Mnemonic::Syscall, vec![]);
        self.visit_address(target)?;
        self.pop(Register::T0);
        self.instruction(
            Mnemonic::Sw,
            vec![Register::V0.into(), Operand::indexed(0, Register::T0)],
        );
        Ok(())
    }

    fn write(&mut self, statement: &Statement, value: &Expression) -> Result<()> {
        let ty = self.recorded_type(value.id())?;
        let service: i32 = match ty {
            Type::Int | Type::Bool => 1,
            Type::String => 4,
            other => {
                self.diagnostics
                    .fatal(value.position(), format!("Unsupported write type ({other})"));
                return Ok(());
            }
        };

        self.comment(statement.to_string().trim_end().to_string());
        self.visit_expression(value)?;
        self.pop(Register::A0);
        self.instruction(Mnemonic::Li, vec![Register::V0.into(), service.into()]);
        self.instruction(Mnemonic::Syscall, vec![]);
        Ok(())
    }
}
