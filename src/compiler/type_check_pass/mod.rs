mod declarations;
mod expressions;
mod statements;

use std::fmt::Debug;

use anyhow::Result;
use tracing::{error, info, instrument};

use crate::{
    compiler::{Diagnostics, Resolution, Typing},
    prelude::*,
};

/// Computes a type for every expression and checks the statement level
/// constraints. Unresolved names type as [`Type::Error`], which silences
/// every check that would otherwise fire on them.
pub struct TypeCheckWalker<'a> {
    resolution: &'a Resolution,
    typing: Typing,
    diagnostics: &'a mut Diagnostics,
}

impl Debug for TypeCheckWalker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeChecker")
    }
}

impl<'a> TypeCheckWalker<'a> {
    #[instrument(skip_all, level = "info")]
    pub fn type_check(
        program: &Program,
        resolution: &'a Resolution,
        diagnostics: &'a mut Diagnostics,
    ) -> Result<Typing> {
        let before = diagnostics.len();
        let mut walker = TypeCheckWalker {
            resolution,
            typing: Typing::default(),
            diagnostics,
        };

        for declaration in &program.declarations {
            walker.visit_declaration(declaration)?;
        }

        if walker.diagnostics.len() > before {
            error!("Type checking failed.");
        } else {
            info!("Type checking succeeded.");
        }

        Ok(walker.typing)
    }

    #[instrument(skip_all, level = "trace")]
    fn visit_declaration(&mut self, declaration: &Declaration) -> Result<()> {
        match declaration {
            Declaration::Function(f) => self.function_declaration(f),
            Declaration::Var(_) | Declaration::Struct(_) => Ok(()),
        }
    }

    /// The declared type behind an identifier, or the error type if it never
    /// resolved.
    fn type_of(&self, id: &Identifier) -> Type {
        self.resolution
            .symbol(id.id)
            .map_or(Type::Error, |symbol| symbol.ty())
    }
}
