//! Name analysis, type checking and code generation over a parsed
//! [`Program`]. Each pass walks the whole tree and hands its results to the
//! next through side tables keyed by [`NodeId`].

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use tracing::{error, info, instrument};

use crate::prelude::*;

pub mod asm;
pub mod diagnostics;
mod emit_pass;
mod name_pass;
pub mod symbol_table;
mod type_check_pass;

pub use asm::AsmListing;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use emit_pass::EmitWalker;
pub use name_pass::NameWalker;
pub use symbol_table::{Symbol, SymbolKind, SymbolRef, SymbolTable, SymbolTableError};
pub use type_check_pass::TypeCheckWalker;

/// Size in bytes of every scalar slot.
pub const WORD_SIZE: i32 = 4;
/// Offset of the first formal from the frame pointer.
pub const FORMAL_BASE: i32 = 4;
/// Offset of the first local; the two words above it hold `$ra` and `$fp`.
pub const LOCAL_BASE: i32 = -8;
pub const TRUE: i32 = 1;
pub const FALSE: i32 = 0;
pub const ENTRY_FUNCTION: &str = "main";

/// What name analysis learned about the tree.
#[derive(Debug, Default)]
pub struct Resolution {
    symbols: HashMap<NodeId, SymbolRef>,
    struct_links: HashMap<NodeId, SymbolRef>,
    bad_access: HashSet<NodeId>,
}

impl Resolution {
    pub fn link(&mut self, id: NodeId, symbol: SymbolRef) {
        self.symbols.insert(id, symbol);
    }

    /// The declaration an identifier refers to, if it resolved.
    pub fn symbol(&self, id: NodeId) -> Option<&SymbolRef> {
        self.symbols.get(&id)
    }

    pub fn link_struct(&mut self, dot: NodeId, definition: SymbolRef) {
        self.struct_links.insert(dot, definition);
    }

    /// For a dot-access whose field is itself a struct, that struct's
    /// definition.
    pub fn struct_link(&self, dot: NodeId) -> Option<&SymbolRef> {
        self.struct_links.get(&dot)
    }

    pub fn mark_bad_access(&mut self, dot: NodeId) {
        self.bad_access.insert(dot);
    }

    pub fn is_bad_access(&self, dot: NodeId) -> bool {
        self.bad_access.contains(&dot)
    }
}

/// What type checking learned about the tree.
#[derive(Debug, Default)]
pub struct Typing {
    types: HashMap<NodeId, Type>,
}

impl Typing {
    pub fn record(&mut self, id: NodeId, ty: Type) {
        self.types.insert(id, ty);
    }

    pub fn get(&self, id: NodeId) -> Option<&Type> {
        self.types.get(&id)
    }
}

#[derive(Debug)]
pub struct CompileResult {
    /// `None` whenever any pass reported a fatal diagnostic.
    pub listing: Option<AsmListing>,
    pub diagnostics: Diagnostics,
}

#[instrument(skip_all, level = "info")]
pub fn compile(program: &Program) -> Result<CompileResult> {
    let mut diagnostics = Diagnostics::new();

    let resolution =
        NameWalker::analyze(program, &mut diagnostics).context("During name analysis")?;
    let typing = TypeCheckWalker::type_check(program, &resolution, &mut diagnostics)
        .context("During type checking")?;

    if diagnostics.has_fatal() {
        error!("Compilation failed.");
        return Ok(CompileResult {
            listing: None,
            diagnostics,
        });
    }

    let listing = EmitWalker::emit(program, &resolution, &typing, &mut diagnostics)
        .context("During code generation")?;

    if diagnostics.has_fatal() {
        error!("Compilation failed.");
        Ok(CompileResult {
            listing: None,
            diagnostics,
        })
    } else {
        info!("Compilation succeeded.");
        Ok(CompileResult {
            listing: Some(listing),
            diagnostics,
        })
    }
}
