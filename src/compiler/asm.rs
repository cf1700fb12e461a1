use std::fmt::{Debug, Display};

use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
pub enum Register {
    #[strum(serialize = "$t0")]
    T0,
    #[strum(serialize = "$t1")]
    T1,
    #[strum(serialize = "$t2")]
    T2,
    #[strum(serialize = "$t3")]
    T3,
    #[strum(serialize = "$t4")]
    T4,
    #[strum(serialize = "$v0")]
    V0,
    #[strum(serialize = "$a0")]
    A0,
    #[strum(serialize = "$sp")]
    Sp,
    #[strum(serialize = "$fp")]
    Fp,
    #[strum(serialize = "$ra")]
    Ra,
    #[strum(serialize = "$zero")]
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mnemonic {
    Sw,
    Lw,
    Lb,
    La,
    Li,
    Move,
    Add,
    Addu,
    Addi,
    Sub,
    Subu,
    Mul,
    Div,
    Mflo,
    Beq,
    Bne,
    Bge,
    Bgt,
    Ble,
    Blt,
    J,
    Jal,
    Jr,
    Syscall,
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Label(SharedString);

impl Label {
    pub fn new(name: impl Into<SharedString>) -> Self {
        Self(name.into())
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(&self.0)
    }
}

impl Debug for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Imm(i32),
    Label(Label),
    /// `offset(base)`
    Indexed { offset: i32, base: Register },
}

impl Operand {
    pub fn indexed(offset: i32, base: Register) -> Self {
        Operand::Indexed { offset, base }
    }
}

impl From<Register> for Operand {
    fn from(value: Register) -> Self {
        Operand::Reg(value)
    }
}

impl From<i32> for Operand {
    fn from(value: i32) -> Self {
        Operand::Imm(value)
    }
}

impl From<Label> for Operand {
    fn from(value: Label) -> Self {
        Operand::Label(value)
    }
}

impl From<&Label> for Operand {
    fn from(value: &Label) -> Self {
        Operand::Label(value.clone())
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(r) => write!(f, "{r}"),
            Operand::Imm(i) => write!(f, "{i}"),
            Operand::Label(l) => write!(f, "{l}"),
            Operand::Indexed { offset, base } => write!(f, "{offset}({base})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: Mnemonic,
    pub operands: Vec<Operand>,
    pub comment: Option<SharedString>,
}

/// `mnemonic op, op, ...` without layout or comment.
impl Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {operand}")?;
            } else {
                write!(f, ", {operand}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmLine {
    /// `.text`, `.data`, `.align 2`, `.globl main`
    Directive(SharedString),
    /// A labelled data item such as `_x: .space 4`.
    Data { label: Label, directive: SharedString },
    Label(Label),
    Instruction(Instruction),
    Comment(SharedString),
}

impl Display for AsmLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmLine::Directive(d) => write!(f, "\t{d}"),
            AsmLine::Data { label, directive } => write!(f, "{label}:\t{directive}"),
            AsmLine::Label(l) => write!(f, "{l}:"),
            AsmLine::Instruction(i) => match &i.comment {
                Some(comment) => write!(f, "\t{:<24}# {comment}", i.to_string()),
                None => write!(f, "\t{i}"),
            },
            AsmLine::Comment(c) => write!(f, "\t\t# {c}"),
        }
    }
}

/// The generated program, one line per entry in emission order.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct AsmListing {
    pub lines: Vec<AsmLine>,
}

impl AsmListing {
    pub fn push(&mut self, line: AsmLine) {
        self.lines.push(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AsmLine> {
        self.lines.iter()
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.lines.iter().filter_map(|line| match line {
            AsmLine::Instruction(i) => Some(i),
            _ => None,
        })
    }

    /// Everything except comments, rendered without layout. Handy for
    /// comparing generated code.
    pub fn code(&self) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|line| match line {
                AsmLine::Directive(d) => Some(d.to_string()),
                AsmLine::Data { label, directive } => Some(format!("{label}: {directive}")),
                AsmLine::Label(l) => Some(format!("{l}:")),
                AsmLine::Instruction(i) => Some(i.to_string()),
                AsmLine::Comment(_) => None,
            })
            .collect()
    }
}

impl Display for AsmListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl Debug for AsmListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            writeln!(f, "{i:>4} {line}")?;
        }
        Ok(())
    }
}
