use anyhow::{Context, Result};
use tracing::instrument;

use crate::{
    compiler::{
        asm::{AsmLine, Mnemonic, Operand, Register},
        ENTRY_FUNCTION, WORD_SIZE,
    },
    prelude::*,
};

use super::{exit_label, function_label, global_label, EmitWalker};

impl EmitWalker<'_> {
    /// Scalars get a word in the data segment.
    #[instrument(level = "trace", skip_all, fields(name = %v.name))]
    pub(super) fn global_declaration(&mut self, v: &VarDeclaration) -> Result<()> {
        if let TypeNode::Struct(_) = v.type_node {
            self.diagnostics
                .warn(v.name.position, "Struct variables unsupported");
            return Ok(());
        }

        self.directive(".data");
        self.directive(".align 2");
        self.listing.push(AsmLine::Data {
            label: global_label(&v.name.name),
            directive: format!(".space {WORD_SIZE}").into(),
        });
        Ok(())
    }

    /// Locals already have their frame slots from the prologue.
    pub(super) fn local_declaration(&mut self, v: &VarDeclaration) {
        if let TypeNode::Struct(_) = v.type_node {
            self.diagnostics
                .warn(v.name.position, "Struct variables unsupported");
        }
    }

    #[instrument(level = "trace", skip_all, fields(name = %f.name))]
    pub(super) fn function_declaration(&mut self, f: &FunctionDeclaration) -> Result<()> {
        let symbol = self.symbol(&f.name)?;
        let function = symbol
            .as_function()
            .with_context(|| format!("{} is not a function", f.name.name))?;
        let frame_size = function.final_offset().abs();
        let exit = exit_label(&f.name.name);

        self.comment(format!("function {}", f.name.name));
        self.directive(".text");
        if f.name.name == ENTRY_FUNCTION {
            self.directive(".globl main");
        }
        self.label(&function_label(&f.name.name));

        self.push(Register::Ra);
        self.push(Register::Fp);
        self.commented(
            Mnemonic::Subu,
            vec![
                Register::Sp.into(),
                Register::Sp.into(),
                (frame_size - 2 * WORD_SIZE).into(),
            ],
            "locals",
        );
        self.commented(
            Mnemonic::Addu,
            vec![Register::Fp.into(), Register::Sp.into(), frame_size.into()],
            "frame",
        );

        self.visit_block(&f.body, &exit)
            .with_context(|| format!("In function {}", f.name.name))?;

        self.label(&exit);
        self.instruction(
            Mnemonic::Lw,
            vec![Register::Ra.into(), Operand::indexed(0, Register::Fp)],
        );
        self.instruction(Mnemonic::Move, vec![Register::T0.into(), Register::Fp.into()]);
        self.instruction(
            Mnemonic::Lw,
            vec![Register::Fp.into(), Operand::indexed(-WORD_SIZE, Register::Fp)],
        );
        self.instruction(Mnemonic::Move, vec![Register::Sp.into(), Register::T0.into()]);
        if f.name.name == ENTRY_FUNCTION {
            self.instruction(Mnemonic::Li, vec![Register::V0.into(), Operand::Imm(10)]);
            self.instruction(Mnemonic::Syscall, vec![]);
        } else {
            self.instruction(Mnemonic::Jr, vec![Register::Ra.into()]);
        }
        Ok(())
    }
}
