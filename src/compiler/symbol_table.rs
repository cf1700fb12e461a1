use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    fmt::{Debug, Display},
    rc::Rc,
};

use tracing::trace;

use crate::prelude::*;

use super::{FORMAL_BASE, LOCAL_BASE, WORD_SIZE};

pub type SymbolRef = Rc<Symbol>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolTableError {
    EmptyTable,
    DuplicateSymbol(String),
    InvalidArgument(&'static str),
}

impl Display for SymbolTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolTableError::EmptyTable => write!(f, "symbol table has no open scope"),
            SymbolTableError::DuplicateSymbol(name) => {
                write!(f, "{name} is already declared in this scope")
            }
            SymbolTableError::InvalidArgument(reason) => write!(f, "invalid argument: {reason}"),
        }
    }
}

impl std::error::Error for SymbolTableError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Global,
    Local,
    Formal,
    StructMember,
}

/// How a variable was introduced. Formals keep their class; everything else
/// is classified by the table on insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Formal,
    NonFormal,
}

pub struct FunctionSymbol {
    pub return_type: Type,
    pub param_count: usize,
    /// One entry per formal; `None` where the formal failed to declare.
    params: RefCell<Vec<Option<Type>>>,
    final_offset: Cell<i32>,
}

impl FunctionSymbol {
    pub fn params(&self) -> std::cell::Ref<'_, Vec<Option<Type>>> {
        self.params.borrow()
    }

    /// Formal types are only known after the function itself is in scope.
    pub fn set_params(&self, params: Vec<Option<Type>>) {
        self.params.replace(params);
    }

    /// The most negative local offset reached while declaring the body.
    pub fn final_offset(&self) -> i32 {
        self.final_offset.get()
    }

    pub fn set_final_offset(&self, offset: i32) {
        self.final_offset.set(offset);
    }
}

pub enum SymbolKind {
    Variable {
        ty: Type,
    },
    Function(FunctionSymbol),
    StructInstance {
        struct_name: SharedString,
        definition: SymbolRef,
    },
    StructDefinition {
        name: SharedString,
        fields: SymbolTable,
    },
}

pub struct Symbol {
    kind: SymbolKind,
    declared_as: Option<DeclarationKind>,
    storage: Cell<Option<StorageClass>>,
    offset: Cell<Option<i32>>,
}

impl Symbol {
    fn new(kind: SymbolKind, declared_as: Option<DeclarationKind>) -> SymbolRef {
        Rc::new(Self {
            kind,
            declared_as,
            storage: Cell::new(None),
            offset: Cell::new(None),
        })
    }

    pub fn variable(ty: Type) -> SymbolRef {
        Self::new(SymbolKind::Variable { ty }, Some(DeclarationKind::NonFormal))
    }

    pub fn formal(ty: Type) -> SymbolRef {
        Self::new(SymbolKind::Variable { ty }, Some(DeclarationKind::Formal))
    }

    pub fn function(return_type: Type, param_count: usize) -> SymbolRef {
        Self::new(
            SymbolKind::Function(FunctionSymbol {
                return_type,
                param_count,
                params: RefCell::new(Vec::new()),
                final_offset: Cell::new(0),
            }),
            None,
        )
    }

    pub fn struct_instance(
        struct_name: SharedString,
        definition: SymbolRef,
        declared_as: DeclarationKind,
    ) -> SymbolRef {
        Self::new(
            SymbolKind::StructInstance {
                struct_name,
                definition,
            },
            Some(declared_as),
        )
    }

    pub fn struct_definition(name: SharedString, fields: SymbolTable) -> SymbolRef {
        Self::new(SymbolKind::StructDefinition { name, fields }, None)
    }

    pub fn kind(&self) -> &SymbolKind {
        &self.kind
    }

    pub fn ty(&self) -> Type {
        match &self.kind {
            SymbolKind::Variable { ty } => ty.clone(),
            SymbolKind::Function(_) => Type::Function,
            SymbolKind::StructInstance { struct_name, .. } => Type::Struct(struct_name.clone()),
            SymbolKind::StructDefinition { name, .. } => Type::StructDef(name.clone()),
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        match &self.kind {
            SymbolKind::Function(f) => Some(f),
            _ => None,
        }
    }

    /// The field table of a struct definition, or of the definition a
    /// struct instance refers to.
    pub fn struct_fields(&self) -> Option<&SymbolTable> {
        match &self.kind {
            SymbolKind::StructDefinition { fields, .. } => Some(fields),
            SymbolKind::StructInstance { definition, .. } => definition.struct_fields(),
            _ => None,
        }
    }

    pub fn storage(&self) -> Option<StorageClass> {
        self.storage.get()
    }

    pub fn offset(&self) -> Option<i32> {
        self.offset.get()
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            SymbolKind::Function(func) => {
                let params = func.params.borrow();
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match p {
                        Some(p) => write!(f, "{p}")?,
                        None => write!(f, "{}", Type::Error)?,
                    }
                }
                write!(f, "->{}", func.return_type)
            }
            _ => {
                write!(f, "{}", self.ty())?;
                if let Some(storage) = self.storage() {
                    write!(f, " {storage:?}")?;
                }
                if let Some(offset) = self.offset() {
                    write!(f, "@{offset}")?;
                }
                Ok(())
            }
        }
    }
}

/// Scopes are kept innermost first.
pub struct SymbolTable {
    scopes: VecDeque<HashMap<SharedString, SymbolRef>>,
    next_formal_offset: i32,
    next_local_offset: i32,
    in_struct_definition: bool,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table with a single open scope.
    pub fn new() -> Self {
        let mut table = Self {
            scopes: VecDeque::new(),
            next_formal_offset: FORMAL_BASE,
            next_local_offset: LOCAL_BASE,
            in_struct_definition: false,
        };
        table.add_scope();
        table
    }

    pub fn add_scope(&mut self) {
        self.scopes.push_front(HashMap::new());
    }

    pub fn remove_scope(&mut self) -> Result<(), SymbolTableError> {
        self.scopes
            .pop_front()
            .map(|_| ())
            .ok_or(SymbolTableError::EmptyTable)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Inserts into the innermost scope and assigns the symbol its storage
    /// class and frame offset.
    pub fn add_decl(
        &mut self,
        name: impl Into<SharedString>,
        symbol: SymbolRef,
    ) -> Result<(), SymbolTableError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SymbolTableError::InvalidArgument("empty name"));
        }
        let depth = self.scopes.len();
        let scope = self
            .scopes
            .front_mut()
            .ok_or(SymbolTableError::EmptyTable)?;
        if scope.contains_key(&name) {
            return Err(SymbolTableError::DuplicateSymbol(name.to_string()));
        }
        scope.insert(name.clone(), symbol.clone());

        if let Some(declared_as) = symbol.declared_as {
            if symbol.storage.get().is_none() {
                let storage = match declared_as {
                    DeclarationKind::Formal => StorageClass::Formal,
                    DeclarationKind::NonFormal if self.in_struct_definition => {
                        StorageClass::StructMember
                    }
                    DeclarationKind::NonFormal if depth == 1 => StorageClass::Global,
                    DeclarationKind::NonFormal => StorageClass::Local,
                };
                symbol.storage.set(Some(storage));
                self.assign_offset(&symbol, storage);
            }
        }
        trace!("declared {name}: {symbol:?}");
        Ok(())
    }

    fn assign_offset(&mut self, symbol: &Symbol, storage: StorageClass) {
        if !matches!(symbol.kind, SymbolKind::Variable { .. }) {
            return;
        }
        match storage {
            StorageClass::Formal => {
                symbol.offset.set(Some(self.next_formal_offset));
                self.next_formal_offset += WORD_SIZE;
            }
            StorageClass::Local => {
                symbol.offset.set(Some(self.next_local_offset));
                self.next_local_offset -= WORD_SIZE;
            }
            StorageClass::Global | StorageClass::StructMember => {}
        }
    }

    pub fn lookup_local(&self, name: &str) -> Result<Option<SymbolRef>, SymbolTableError> {
        let scope = self.scopes.front().ok_or(SymbolTableError::EmptyTable)?;
        Ok(scope.get(name).cloned())
    }

    pub fn lookup_global(&self, name: &str) -> Result<Option<SymbolRef>, SymbolTableError> {
        if self.scopes.is_empty() {
            return Err(SymbolTableError::EmptyTable);
        }
        Ok(self
            .scopes
            .iter()
            .find_map(|scope| scope.get(name))
            .cloned())
    }

    pub fn enter_struct_definition(&mut self) {
        self.in_struct_definition = true;
    }

    pub fn exit_struct_definition(&mut self) {
        self.in_struct_definition = false;
    }

    pub fn reset_offsets(&mut self) {
        self.next_formal_offset = FORMAL_BASE;
        self.next_local_offset = LOCAL_BASE;
    }

    /// The offset the next local would receive.
    pub fn next_local_offset(&self) -> i32 {
        self.next_local_offset
    }
}

impl Display for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sym Table")?;
        for scope in &self.scopes {
            let mut names: Vec<_> = scope.iter().collect();
            names.sort_by(|a, b| a.0.cmp(b.0));
            write!(f, "{{")?;
            for (i, (name, symbol)) in names.into_iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{name}={symbol:?}")?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

impl Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0; "fresh table")]
    #[test_case(1; "one extra scope")]
    #[test_case(5; "several extra scopes")]
    fn scope_balance(extra: usize) {
        let mut table = SymbolTable::new();
        for _ in 0..extra {
            table.add_scope();
        }
        for _ in 0..extra {
            table.remove_scope().unwrap();
        }
        assert_eq!(table.scope_count(), 1);
        table.remove_scope().unwrap();
        assert_eq!(table.scope_count(), 0);
        assert_eq!(table.remove_scope(), Err(SymbolTableError::EmptyTable));
    }

    #[test]
    fn empty_table_rejects_every_operation() {
        let mut table = SymbolTable::new();
        table.remove_scope().unwrap();

        assert_eq!(
            table.add_decl("x", Symbol::variable(Type::Int)),
            Err(SymbolTableError::EmptyTable)
        );
        assert_eq!(
            table.lookup_local("x").unwrap_err(),
            SymbolTableError::EmptyTable
        );
        assert_eq!(
            table.lookup_global("x").unwrap_err(),
            SymbolTableError::EmptyTable
        );
    }

    #[test]
    fn empty_name_is_an_invalid_argument() {
        let mut table = SymbolTable::new();
        assert!(matches!(
            table.add_decl("", Symbol::variable(Type::Int)),
            Err(SymbolTableError::InvalidArgument(_))
        ));
    }

    #[test]
    fn lookup_scoping() {
        let mut table = SymbolTable::new();
        table.add_decl("outer", Symbol::variable(Type::Int)).unwrap();
        table.add_scope();
        table.add_decl("inner", Symbol::variable(Type::Bool)).unwrap();

        assert!(table.lookup_local("inner").unwrap().is_some());
        assert!(table.lookup_local("outer").unwrap().is_none());
        assert!(table.lookup_global("outer").unwrap().is_some());
        assert!(table.lookup_global("missing").unwrap().is_none());
    }

    #[test]
    fn shadowing_returns_innermost() {
        let mut table = SymbolTable::new();
        table.add_decl("x", Symbol::variable(Type::Int)).unwrap();
        table.add_scope();
        table.add_decl("x", Symbol::variable(Type::Bool)).unwrap();

        let found = table.lookup_global("x").unwrap().unwrap();
        assert_eq!(found.ty(), Type::Bool);

        table.remove_scope().unwrap();
        let found = table.lookup_global("x").unwrap().unwrap();
        assert_eq!(found.ty(), Type::Int);
    }

    #[test]
    fn duplicates_rejected_within_one_scope() {
        let mut table = SymbolTable::new();
        table.add_decl("x", Symbol::variable(Type::Int)).unwrap();
        assert_eq!(
            table.add_decl("x", Symbol::variable(Type::Bool)),
            Err(SymbolTableError::DuplicateSymbol("x".into()))
        );
        table.add_scope();
        assert_eq!(table.add_decl("x", Symbol::variable(Type::Bool)), Ok(()));
    }

    #[test]
    fn storage_classes_follow_context() {
        let mut table = SymbolTable::new();
        let global = Symbol::variable(Type::Int);
        table.add_decl("g", global.clone()).unwrap();

        table.add_scope();
        let formal = Symbol::formal(Type::Int);
        let local = Symbol::variable(Type::Bool);
        table.add_decl("a", formal.clone()).unwrap();
        table.add_decl("l", local.clone()).unwrap();

        let mut fields = SymbolTable::new();
        fields.enter_struct_definition();
        let member = Symbol::variable(Type::Int);
        fields.add_decl("m", member.clone()).unwrap();
        fields.exit_struct_definition();

        assert_eq!(global.storage(), Some(StorageClass::Global));
        assert_eq!(global.offset(), None);
        assert_eq!(formal.storage(), Some(StorageClass::Formal));
        assert_eq!(local.storage(), Some(StorageClass::Local));
        assert_eq!(member.storage(), Some(StorageClass::StructMember));
        assert_eq!(member.offset(), None);
    }

    fn declare_frame(table: &mut SymbolTable) -> Vec<i32> {
        table.add_scope();
        table.reset_offsets();
        let mut symbols = Vec::new();
        for name in ["a", "b", "c"] {
            let s = Symbol::formal(Type::Int);
            table.add_decl(name, s.clone()).unwrap();
            symbols.push(s);
        }
        for name in ["x", "y"] {
            let s = Symbol::variable(Type::Int);
            table.add_decl(name, s.clone()).unwrap();
            symbols.push(s);
        }
        table.remove_scope().unwrap();
        symbols.iter().filter_map(|s| s.offset()).collect()
    }

    #[test]
    fn frame_offsets_are_deterministic() {
        let mut table = SymbolTable::new();
        let first = declare_frame(&mut table);
        let second = declare_frame(&mut table);

        assert_eq!(first, vec![4, 8, 12, -8, -12]);
        assert_eq!(first, second);
        assert_eq!(table.next_local_offset(), -16);
    }

    #[test]
    fn non_variables_get_no_offset() {
        let mut table = SymbolTable::new();
        table.add_scope();
        let f = Symbol::function(Type::Void, 0);
        table.add_decl("f", f.clone()).unwrap();
        assert_eq!(f.storage(), None);
        assert_eq!(f.offset(), None);
        assert_eq!(table.next_local_offset(), LOCAL_BASE);
    }
}
