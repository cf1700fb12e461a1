use anyhow::Result;
use tracing::instrument;

use crate::{
    compiler::symbol_table::{DeclarationKind, Symbol, SymbolKind, SymbolRef, SymbolTable},
    prelude::*,
};

use super::NameWalker;

impl NameWalker<'_> {
    /// Declares a variable in the current scope, or in `fields` while a
    /// struct definition is being built. Struct type names are always looked
    /// up in the enclosing table.
    #[instrument(level = "trace", skip_all, fields(name = %v.name))]
    pub(super) fn var_declaration(
        &mut self,
        v: &VarDeclaration,
        fields: Option<&mut SymbolTable>,
    ) -> Result<Option<SymbolRef>> {
        match self.declared_symbol(&v.type_node, &v.name, DeclarationKind::NonFormal)? {
            Some(symbol) => self.declare(fields, &v.name, symbol),
            None => {
                self.report_if_declared(fields, &v.name)?;
                Ok(None)
            }
        }
    }

    /// Returns the formal's type when it was declared.
    #[instrument(level = "trace", skip_all, fields(name = %f.name))]
    pub(super) fn formal_declaration(&mut self, f: &FormalDeclaration) -> Result<Option<Type>> {
        match self.declared_symbol(&f.type_node, &f.name, DeclarationKind::Formal)? {
            Some(symbol) => Ok(self.declare(None, &f.name, symbol)?.map(|s| s.ty())),
            None => {
                self.report_if_declared(None, &f.name)?;
                Ok(None)
            }
        }
    }

    #[instrument(level = "trace", skip_all, fields(name = %f.name))]
    pub(super) fn function_declaration(&mut self, f: &FunctionDeclaration) -> Result<()> {
        let symbol = Symbol::function(Type::from(&f.return_type), f.formals.len());
        let function = self.declare(None, &f.name, symbol)?;

        self.in_scope(|walker| {
            walker.table.reset_offsets();

            let mut params = Vec::with_capacity(f.formals.len());
            for formal in &f.formals {
                params.push(walker.formal_declaration(formal)?);
            }
            let function = function.as_ref().and_then(|s| s.as_function());
            if let Some(function) = function {
                function.set_params(params);
            }

            walker.visit_block_contents(&f.body)?;

            if let Some(function) = function {
                function.set_final_offset(walker.table.next_local_offset());
            }
            Ok(())
        })
    }

    #[instrument(level = "trace", skip_all, fields(name = %s.name))]
    pub(super) fn struct_declaration(&mut self, s: &StructDeclaration) -> Result<()> {
        if self.table.lookup_local(&s.name.name)?.is_some() {
            self.diagnostics
                .fatal(s.name.position, "Multiply declared identifier");
            return Ok(());
        }

        let mut fields = SymbolTable::new();
        fields.enter_struct_definition();
        for field in &s.fields {
            self.var_declaration(field, Some(&mut fields))?;
        }
        fields.exit_struct_definition();

        self.declare(
            None,
            &s.name,
            Symbol::struct_definition(s.name.name.clone(), fields),
        )?;
        Ok(())
    }

    /// Builds the symbol a declaration introduces, or reports why it cannot.
    fn declared_symbol(
        &mut self,
        type_node: &TypeNode,
        name: &Identifier,
        declared_as: DeclarationKind,
    ) -> Result<Option<SymbolRef>> {
        let variable = |ty| match declared_as {
            DeclarationKind::Formal => Symbol::formal(ty),
            DeclarationKind::NonFormal => Symbol::variable(ty),
        };

        Ok(match type_node {
            TypeNode::Void => {
                self.diagnostics
                    .fatal(name.position, "Non-function declared void");
                Some(variable(Type::Void))
            }
            TypeNode::Struct(struct_name) => {
                let definition = self
                    .table
                    .lookup_global(&struct_name.name)?
                    .filter(|s| matches!(s.kind(), SymbolKind::StructDefinition { .. }));
                match definition {
                    Some(definition) => {
                        self.resolution.link(struct_name.id, definition.clone());
                        Some(Symbol::struct_instance(
                            struct_name.name.clone(),
                            definition,
                            declared_as,
                        ))
                    }
                    None => {
                        self.diagnostics
                            .fatal(struct_name.position, "Invalid name of struct type");
                        None
                    }
                }
            }
            other => Some(variable(Type::from(other))),
        })
    }

    fn report_if_declared(
        &mut self,
        fields: Option<&mut SymbolTable>,
        name: &Identifier,
    ) -> Result<()> {
        let table = match fields {
            Some(fields) => fields,
            None => &mut self.table,
        };
        if table.lookup_local(&name.name)?.is_some() {
            self.diagnostics
                .fatal(name.position, "Multiply declared identifier");
        }
        Ok(())
    }
}
