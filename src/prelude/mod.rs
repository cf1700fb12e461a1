mod ast;
mod shared_strings;

pub use crate::{
    prelude::{ast::*, shared_strings::SharedString},
    typing::Type,
};
