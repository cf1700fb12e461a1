use std::fmt::Display;

use super::*;

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            Type::Int => "int",
            Type::Bool => "bool",
            Type::Void => "void",
            Type::String => "String",
            Type::Function => "function",
            Type::Struct(name) => name,
            Type::StructDef(_) => "struct",
            Type::Error => "error",
        })
    }
}
