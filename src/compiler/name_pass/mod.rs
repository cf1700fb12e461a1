mod declarations;
mod expressions;
mod statements;

use std::fmt::Debug;

use anyhow::{Context, Result};
use tracing::{error, info, instrument};

use crate::{
    compiler::{
        symbol_table::{SymbolRef, SymbolTable, SymbolTableError},
        Diagnostics, Resolution, ENTRY_FUNCTION,
    },
    prelude::*,
};

/// Resolves every identifier to its declaration, building the scoped symbol
/// table as it goes.
pub struct NameWalker<'d> {
    table: SymbolTable,
    resolution: Resolution,
    diagnostics: &'d mut Diagnostics,
}

impl Debug for NameWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NameWalker")
    }
}

impl<'d> NameWalker<'d> {
    #[instrument(skip_all, level = "info")]
    pub fn analyze(program: &Program, diagnostics: &'d mut Diagnostics) -> Result<Resolution> {
        let mut walker = NameWalker {
            table: SymbolTable::new(),
            resolution: Resolution::default(),
            diagnostics,
        };

        for declaration in &program.declarations {
            walker.visit_declaration(declaration)?;
        }

        let entry = walker.table.lookup_global(ENTRY_FUNCTION)?;
        if !entry.is_some_and(|s| s.as_function().is_some()) {
            walker
                .diagnostics
                .fatal(Position::PROGRAM, "No main function");
        }

        if walker.diagnostics.has_fatal() {
            error!("Name analysis failed.");
        } else {
            info!("Name analysis succeeded.");
        }
        tracing::trace!("{}", walker.table);

        Ok(walker.resolution)
    }

    #[instrument(skip_all, level = "trace")]
    fn visit_declaration(&mut self, declaration: &Declaration) -> Result<()> {
        match declaration {
            Declaration::Var(v) => self.var_declaration(v, None).map(|_| ()),
            Declaration::Function(f) => self.function_declaration(f),
            Declaration::Struct(s) => self.struct_declaration(s),
        }
    }

    /// Runs `f` inside a fresh scope. The scope is removed whether or not
    /// `f` succeeds.
    fn in_scope<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        self.table.add_scope();
        let result = f(self);
        self.table
            .remove_scope()
            .context("Scope removed more times than it was added")?;
        result
    }

    /// Inserts `symbol` under `name` into `fields` if given, else the current
    /// table. A name already present in that scope is reported and skipped.
    fn declare(
        &mut self,
        fields: Option<&mut SymbolTable>,
        name: &Identifier,
        symbol: SymbolRef,
    ) -> Result<Option<SymbolRef>> {
        let table = match fields {
            Some(fields) => fields,
            None => &mut self.table,
        };
        match table.add_decl(name.name.clone(), symbol.clone()) {
            Ok(()) => {
                self.resolution.link(name.id, symbol.clone());
                Ok(Some(symbol))
            }
            Err(SymbolTableError::DuplicateSymbol(_)) => {
                self.diagnostics
                    .fatal(name.position, "Multiply declared identifier");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("While declaring {}", name.name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::compiler::{symbol_table::StorageClass, Diagnostics};

    use super::*;

    fn analyze(program: &Program) -> (Resolution, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let resolution = NameWalker::analyze(program, &mut diagnostics).unwrap();
        (resolution, diagnostics)
    }

    fn void_main(b: &mut AstBuilder, body: Block) -> Declaration {
        b.function(TypeNode::Void, "main", (1, 6), vec![], body)
    }

    #[test]
    fn resolves_uses_to_declarations() {
        let mut b = AstBuilder::new();
        let x = b.var_decl(TypeNode::Int, "x", (1, 5));
        let y = b.var_decl(TypeNode::Int, "y", (2, 9));
        let target = b.id("y", (3, 5));
        let x_use = b.id("x", (3, 9));
        let x_use_id = x_use.id();
        let one = b.int_lit(1, (3, 13));
        let sum = b.binary(x_use, BinaryOperator::Plus, one);
        let assign = b.assign(target, sum);
        let main = void_main(&mut b, Block::new(vec![y], vec![Statement::Assign(assign)]));
        let x_decl_id = x.name.id;
        let program = Program {
            declarations: vec![Declaration::Var(x), main],
        };

        let (resolution, diagnostics) = analyze(&program);

        assert!(diagnostics.is_empty(), "{diagnostics}");
        let declared = resolution.symbol(x_decl_id).unwrap();
        let used = resolution.symbol(x_use_id).unwrap();
        assert!(std::rc::Rc::ptr_eq(declared, used));
        assert_eq!(used.storage(), Some(StorageClass::Global));
    }

    #[test]
    fn reports_every_undeclared_identifier() {
        let mut b = AstBuilder::new();
        let a = b.id("a", (2, 5));
        let c = b.id("c", (3, 5));
        let main = void_main(
            &mut b,
            Block::new(vec![], vec![Statement::Increment(a), Statement::Write(c)]),
        );
        let program = Program {
            declarations: vec![main],
        };

        let (_, diagnostics) = analyze(&program);

        insta::assert_snapshot!(diagnostics.to_string(), @r###"
        fatal:2:5: Undeclared identifier
        fatal:3:5: Undeclared identifier
        "###);
    }

    #[test]
    fn missing_main() {
        let mut b = AstBuilder::new();
        let x = b.var_decl(TypeNode::Int, "main", (1, 5));
        let program = Program {
            declarations: vec![Declaration::Var(x)],
        };

        let (_, diagnostics) = analyze(&program);

        assert_eq!(diagnostics.messages(), vec!["No main function"]);
        assert_eq!(diagnostics.iter().next().unwrap().position, Position::PROGRAM);
    }

    #[test]
    fn multiply_declared_and_void() {
        let mut b = AstBuilder::new();
        let first = b.var_decl(TypeNode::Int, "x", (1, 5));
        let second = b.var_decl(TypeNode::Bool, "x", (2, 6));
        let v = b.var_decl(TypeNode::Void, "v", (3, 6));
        let main = void_main(&mut b, Block::default());
        let program = Program {
            declarations: vec![
                Declaration::Var(first),
                Declaration::Var(second),
                Declaration::Var(v),
                main,
            ],
        };

        let (_, diagnostics) = analyze(&program);

        insta::assert_snapshot!(diagnostics.to_string(), @r###"
        fatal:2:6: Multiply declared identifier
        fatal:3:6: Non-function declared void
        "###);
    }

    #[test]
    fn formals_and_locals_get_frame_offsets() {
        let mut b = AstBuilder::new();
        let formals = vec![
            b.formal(TypeNode::Int, "a", (1, 11)),
            b.formal(TypeNode::Int, "b", (1, 18)),
            b.formal(TypeNode::Bool, "c", (1, 26)),
        ];
        let formal_ids: Vec<_> = formals.iter().map(|f| f.name.id).collect();
        let locals = vec![
            b.var_decl(TypeNode::Int, "x", (2, 9)),
            b.var_decl(TypeNode::Int, "y", (3, 9)),
        ];
        let local_ids: Vec<_> = locals.iter().map(|l| l.name.id).collect();
        let f = b.function(TypeNode::Int, "f", (1, 5), formals, Block::new(locals, vec![]));
        let f_id = match &f {
            Declaration::Function(f) => f.name.id,
            _ => unreachable!(),
        };
        let main = void_main(&mut b, Block::default());
        let program = Program {
            declarations: vec![f, main],
        };

        let (resolution, diagnostics) = analyze(&program);

        assert!(diagnostics.is_empty(), "{diagnostics}");
        let offsets: Vec<_> = formal_ids
            .iter()
            .chain(local_ids.iter())
            .map(|id| resolution.symbol(*id).unwrap().offset().unwrap())
            .collect();
        assert_eq!(offsets, vec![4, 8, 12, -8, -12]);

        let function = resolution.symbol(f_id).unwrap();
        let function = function.as_function().unwrap();
        assert_eq!(function.final_offset(), -16);
        assert_eq!(
            *function.params(),
            vec![Some(Type::Int), Some(Type::Int), Some(Type::Bool)]
        );
    }

    #[test]
    fn nested_blocks_shadow_and_pop() {
        let mut b = AstBuilder::new();
        let outer = b.var_decl(TypeNode::Int, "x", (2, 9));
        let inner = b.var_decl(TypeNode::Bool, "x", (4, 14));
        let inner_decl_id = inner.name.id;
        let inner_use = b.id("x", (5, 13));
        let inner_use_id = inner_use.id();
        let cond = b.true_lit((3, 9));
        let after = b.id("x", (7, 9));
        let after_id = after.id();
        let main = void_main(
            &mut b,
            Block::new(
                vec![outer],
                vec![
                    Statement::While(LoopStatement {
                        condition: cond,
                        body: Block::new(vec![inner], vec![Statement::Write(inner_use)]),
                    }),
                    Statement::Write(after),
                ],
            ),
        );
        let program = Program {
            declarations: vec![main],
        };

        let (resolution, diagnostics) = analyze(&program);

        assert!(diagnostics.is_empty(), "{diagnostics}");
        assert!(std::rc::Rc::ptr_eq(
            resolution.symbol(inner_decl_id).unwrap(),
            resolution.symbol(inner_use_id).unwrap()
        ));
        assert_eq!(resolution.symbol(after_id).unwrap().ty(), Type::Int);
    }
}
