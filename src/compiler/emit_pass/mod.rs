mod declarations;
mod expressions;
mod statements;

use std::fmt::Debug;

use anyhow::{Context, Result};
use tracing::{error, info, instrument};

use crate::{
    compiler::{
        asm::{AsmLine, AsmListing, Instruction, Label, Mnemonic, Operand, Register},
        symbol_table::{StorageClass, SymbolRef},
        Diagnostics, Resolution, Typing, ENTRY_FUNCTION, WORD_SIZE,
    },
    prelude::*,
};

/// Lowers a checked program to stack machine code. Every expression pushes
/// exactly one word; every statement leaves `$sp` where it found it.
pub struct EmitWalker<'a> {
    resolution: &'a Resolution,
    typing: &'a Typing,
    diagnostics: &'a mut Diagnostics,
    listing: AsmListing,
    label_count: usize,
}

impl Debug for EmitWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Compiler")
    }
}

impl<'a> EmitWalker<'a> {
    #[instrument(skip_all, level = "info")]
    pub fn emit(
        program: &Program,
        resolution: &'a Resolution,
        typing: &'a Typing,
        diagnostics: &'a mut Diagnostics,
    ) -> Result<AsmListing> {
        let fatal_before = diagnostics.has_fatal();
        let mut walker = EmitWalker {
            resolution,
            typing,
            diagnostics,
            listing: AsmListing::default(),
            label_count: 0,
        };

        for declaration in &program.declarations {
            walker.visit_declaration(declaration)?;
        }

        if !fatal_before && walker.diagnostics.has_fatal() {
            error!("Code generation failed.");
        } else {
            info!("Code generation succeeded.");
        }
        tracing::debug!("\n{:?}", walker.listing);

        Ok(walker.listing)
    }

    #[instrument(skip_all, level = "trace")]
    fn visit_declaration(&mut self, declaration: &Declaration) -> Result<()> {
        match declaration {
            Declaration::Var(v) => self.global_declaration(v),
            Declaration::Function(f) => self.function_declaration(f),
            Declaration::Struct(s) => {
                self.diagnostics
                    .warn(s.name.position, "Struct definitions unsupported");
                Ok(())
            }
        }
    }

    fn instruction(&mut self, mnemonic: Mnemonic, operands: Vec<Operand>) {
        self.listing.push(AsmLine::Instruction(Instruction {
            mnemonic,
            operands,
            comment: None,
        }));
    }

    fn commented(&mut self, mnemonic: Mnemonic, operands: Vec<Operand>, comment: &str) {
        self.listing.push(AsmLine::Instruction(Instruction {
            mnemonic,
            operands,
            comment: Some(comment.into()),
        }));
    }

    fn push(&mut self, register: Register) {
        self.commented(
            Mnemonic::Sw,
            vec![register.into(), Operand::indexed(0, Register::Sp)],
            "PUSH",
        );
        self.instruction(
            Mnemonic::Subu,
            vec![Register::Sp.into(), Register::Sp.into(), WORD_SIZE.into()],
        );
    }

    fn pop(&mut self, register: Register) {
        self.commented(
            Mnemonic::Lw,
            vec![register.into(), Operand::indexed(WORD_SIZE, Register::Sp)],
            "POP",
        );
        self.instruction(
            Mnemonic::Addu,
            vec![Register::Sp.into(), Register::Sp.into(), WORD_SIZE.into()],
        );
    }

    /// Drops the word on top of the stack.
    fn discard(&mut self) {
        self.instruction(
            Mnemonic::Addu,
            vec![Register::Sp.into(), Register::Sp.into(), WORD_SIZE.into()],
        );
    }

    fn comment(&mut self, text: impl Into<SharedString>) {
        self.listing.push(AsmLine::Comment(text.into()));
    }

    fn directive(&mut self, text: &str) {
        self.listing.push(AsmLine::Directive(text.into()));
    }

    fn label(&mut self, label: &Label) {
        self.listing.push(AsmLine::Label(label.clone()));
    }

    fn fresh_label(&mut self) -> Label {
        let label = Label::new(format!(".L{}", self.label_count));
        self.label_count += 1;
        label
    }

    fn symbol(&self, id: &Identifier) -> Result<&'a SymbolRef> {
        self.resolution
            .symbol(id.id)
            .with_context(|| format!("{} at {} was never resolved", id.name, id.position))
    }

    /// The type recorded for `id` during type checking.
    fn recorded_type(&self, id: NodeId) -> Result<&'a Type> {
        self.typing
            .get(id)
            .with_context(|| format!("No type recorded for {id}"))
    }

    /// Where a scalar variable lives: a frame slot or a global label.
    fn slot(&self, id: &Identifier) -> Result<Operand> {
        let symbol = self.symbol(id)?;
        match symbol.storage() {
            Some(StorageClass::Local | StorageClass::Formal) => {
                let offset = symbol
                    .offset()
                    .with_context(|| format!("{} has no frame offset", id.name))?;
                Ok(Operand::indexed(offset, Register::Fp))
            }
            Some(StorageClass::Global) => Ok(global_label(&id.name).into()),
            other => anyhow::bail!("{} has no addressable storage ({other:?})", id.name),
        }
    }
}

fn global_label(name: &str) -> Label {
    Label::new(format!("_{name}"))
}

/// `main` keeps its name so the simulator can find it.
fn function_label(name: &str) -> Label {
    if name == ENTRY_FUNCTION {
        Label::new(name)
    } else {
        Label::new(format!("_{name}"))
    }
}

fn exit_label(name: &str) -> Label {
    Label::new(format!("_{name}.exit"))
}

#[cfg(test)]
mod tests {
    use crate::compiler::{NameWalker, TypeCheckWalker};

    use super::*;

    /// Runs every pass and returns the listing with the diagnostics.
    pub(super) fn emit_program(program: &Program) -> (AsmListing, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let resolution = NameWalker::analyze(program, &mut diagnostics).unwrap();
        let typing = TypeCheckWalker::type_check(program, &resolution, &mut diagnostics).unwrap();
        assert!(!diagnostics.has_fatal(), "{diagnostics}");
        let listing = EmitWalker::emit(program, &resolution, &typing, &mut diagnostics).unwrap();
        (listing, diagnostics)
    }

    pub(super) fn void_main(b: &mut AstBuilder, body: Block) -> Program {
        let main = b.function(TypeNode::Void, "main", (1, 6), vec![], body);
        Program {
            declarations: vec![main],
        }
    }

    /// The code between the prologue and the epilogue of the last function.
    pub(super) fn body(listing: &AsmListing) -> Vec<String> {
        let code = listing.code();
        let start = code
            .iter()
            .rposition(|line| line.starts_with("addu $fp"))
            .unwrap();
        let end = code
            .iter()
            .rposition(|line| line.ends_with(".exit:"))
            .unwrap();
        code[start + 1..end].to_vec()
    }

    #[test]
    fn labels() {
        assert_eq!(function_label("main").to_string(), "main");
        assert_eq!(function_label("f").to_string(), "_f");
        assert_eq!(exit_label("main").to_string(), "_main.exit");
        assert_eq!(global_label("x").to_string(), "_x");
    }

    #[test]
    fn fresh_labels_are_unique() {
        let mut b = AstBuilder::new();
        let c1 = b.true_lit((2, 9));
        let c2 = b.false_lit((3, 9));
        let program = void_main(
            &mut b,
            Block::new(
                vec![],
                vec![
                    Statement::If(IfStatement {
                        condition: c1,
                        then_block: Block::default(),
                    }),
                    Statement::While(LoopStatement {
                        condition: c2,
                        body: Block::default(),
                    }),
                ],
            ),
        );

        let (listing, _) = emit_program(&program);

        let labels: Vec<_> = listing
            .iter()
            .filter_map(|line| match line {
                AsmLine::Label(l) => Some(l.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["main", ".L0", ".L1", ".L2", "_main.exit"]);
    }

    #[test]
    fn exit_labels_never_clash_with_globals() {
        // int f_exit; void f() {} void main() {}
        let mut b = AstBuilder::new();
        let global = b.var_decl(TypeNode::Int, "f_exit", (1, 5));
        let f = b.function(TypeNode::Void, "f", (2, 6), vec![], Block::default());
        let main = b.function(TypeNode::Void, "main", (3, 6), vec![], Block::default());

        let (listing, diagnostics) = emit_program(&Program {
            declarations: vec![Declaration::Var(global), f, main],
        });

        assert!(diagnostics.is_empty(), "{diagnostics}");
        let defined: Vec<_> = listing
            .iter()
            .filter_map(|line| match line {
                AsmLine::Label(l) | AsmLine::Data { label: l, .. } => Some(l.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(defined, vec!["_f_exit", "_f", "_f.exit", "main", "_main.exit"]);
        let unique: std::collections::HashSet<_> = defined.iter().collect();
        assert_eq!(unique.len(), defined.len());
    }
}
