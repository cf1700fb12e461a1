use crate::prelude::{SharedString, TypeNode};

mod print;

/// Types computed by type checking. `Error` is absorbing: once an operand
/// has it, no further diagnostic is raised about that operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Void,
    String,
    Function,
    /// A variable of the named struct type.
    Struct(SharedString),
    /// The struct type name itself, used as a value.
    StructDef(SharedString),
    Error,
}

impl Type {
    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int)
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::String)
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function)
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct(_))
    }

    pub fn is_struct_def(&self) -> bool {
        matches!(self, Type::StructDef(_))
    }
}

impl From<&TypeNode> for Type {
    fn from(value: &TypeNode) -> Self {
        match value {
            TypeNode::Int => Type::Int,
            TypeNode::Bool => Type::Bool,
            TypeNode::Void => Type::Void,
            TypeNode::Struct(name) => Type::Struct(name.name.clone()),
        }
    }
}
