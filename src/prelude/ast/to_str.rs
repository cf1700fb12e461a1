use std::fmt::{Display, Formatter, Result, Write};

use super::{
    Block, Declaration, Expression, FormalDeclaration, FunctionDeclaration, Identifier, Program,
    Statement, StructDeclaration, TypeNode, VarDeclaration,
};

const INDENT: &str = "    ";

/// Renders nodes back to C-- source. Declarations and statements are
/// written one per line at the current depth; expressions stay inline.
pub(super) struct ToStrVisitor<'a, 'f> {
    f: &'a mut Formatter<'f>,
    depth: usize,
}

impl<'a, 'f> ToStrVisitor<'a, 'f> {
    pub fn new(f: &'a mut Formatter<'f>, depth: usize) -> Self {
        Self { f, depth }
    }

    fn indent(&mut self) -> Result {
        for _ in 0..self.depth {
            self.f.write_str(INDENT)?;
        }
        Ok(())
    }

    fn program(&mut self, program: &Program) -> Result {
        for declaration in &program.declarations {
            self.declaration(declaration)?;
        }
        Ok(())
    }

    fn declaration(&mut self, declaration: &Declaration) -> Result {
        match declaration {
            Declaration::Var(v) => self.var_declaration(v),
            Declaration::Function(f) => self.function_declaration(f),
            Declaration::Struct(s) => self.struct_declaration(s),
        }
    }

    fn var_declaration(&mut self, v: &VarDeclaration) -> Result {
        self.indent()?;
        writeln!(self.f, "{} {};", v.type_node, v.name)
    }

    fn function_declaration(&mut self, function: &FunctionDeclaration) -> Result {
        self.indent()?;
        write!(self.f, "{} {}(", function.return_type, function.name)?;
        for (i, formal) in function.formals.iter().enumerate() {
            if i > 0 {
                self.f.write_str(", ")?;
            }
            write!(self.f, "{formal}")?;
        }
        self.f.write_str(") ")?;
        self.block(&function.body)?;
        self.f.write_char('\n')
    }

    fn struct_declaration(&mut self, s: &StructDeclaration) -> Result {
        self.indent()?;
        writeln!(self.f, "struct {} {{", s.name)?;
        self.depth += 1;
        for field in &s.fields {
            self.var_declaration(field)?;
        }
        self.depth -= 1;
        self.indent()?;
        writeln!(self.f, "}};")
    }

    /// Writes `{ ... }` starting on the current line; the closing brace is
    /// left without a trailing newline so `else` can follow it.
    fn block(&mut self, block: &Block) -> Result {
        self.f.write_str("{\n")?;
        self.depth += 1;
        for declaration in &block.declarations {
            self.var_declaration(declaration)?;
        }
        for statement in &block.statements {
            self.statement(statement)?;
        }
        self.depth -= 1;
        self.indent()?;
        self.f.write_char('}')
    }

    fn statement(&mut self, statement: &Statement) -> Result {
        self.indent()?;
        match statement {
            Statement::Assign(a) => writeln!(self.f, "{} = {};", a.target, a.value),
            Statement::Increment(e) => writeln!(self.f, "{e}++;"),
            Statement::Decrement(e) => writeln!(self.f, "{e}--;"),
            Statement::Read(e) => writeln!(self.f, "cin >> {e};"),
            Statement::Write(e) => writeln!(self.f, "cout << {e};"),
            Statement::If(s) => {
                write!(self.f, "if ({}) ", s.condition)?;
                self.block(&s.then_block)?;
                self.f.write_char('\n')
            }
            Statement::IfElse(s) => {
                write!(self.f, "if ({}) ", s.condition)?;
                self.block(&s.then_block)?;
                self.f.write_str(" else ")?;
                self.block(&s.else_block)?;
                self.f.write_char('\n')
            }
            Statement::While(s) => {
                write!(self.f, "while ({}) ", s.condition)?;
                self.block(&s.body)?;
                self.f.write_char('\n')
            }
            Statement::Repeat(s) => {
                write!(self.f, "repeat ({}) ", s.condition)?;
                self.block(&s.body)?;
                self.f.write_char('\n')
            }
            Statement::Call(c) => {
                write!(self.f, "{}(", c.callee)?;
                self.arguments(&c.arguments)?;
                self.f.write_str(");\n")
            }
            Statement::Return(r) => match &r.value {
                Some(value) => writeln!(self.f, "return {value};"),
                None => writeln!(self.f, "return;"),
            },
        }
    }

    fn arguments(&mut self, arguments: &[Expression]) -> Result {
        for (i, argument) in arguments.iter().enumerate() {
            if i > 0 {
                self.f.write_str(", ")?;
            }
            self.expression(argument)?;
        }
        Ok(())
    }

    fn expression(&mut self, expression: &Expression) -> Result {
        match expression {
            Expression::IntLiteral(i) => write!(self.f, "{}", i.value),
            Expression::StringLiteral(s) => write!(self.f, "{}", s.value),
            Expression::True(_) => self.f.write_str("true"),
            Expression::False(_) => self.f.write_str("false"),
            Expression::Id(id) => write!(self.f, "{id}"),
            Expression::DotAccess(d) => {
                self.expression(&d.object)?;
                write!(self.f, ".{}", d.field)
            }
            Expression::Assign(a) => {
                self.f.write_char('(')?;
                self.expression(&a.target)?;
                self.f.write_str(" = ")?;
                self.expression(&a.value)?;
                self.f.write_char(')')
            }
            Expression::Call(c) => {
                write!(self.f, "{}(", c.callee)?;
                self.arguments(&c.arguments)?;
                self.f.write_char(')')
            }
            Expression::Unary(u) => {
                write!(self.f, "({}", u.operator)?;
                self.expression(&u.operand)?;
                self.f.write_char(')')
            }
            Expression::Binary(b) => {
                self.f.write_char('(')?;
                self.expression(&b.left)?;
                write!(self.f, " {} ", b.operator)?;
                self.expression(&b.right)?;
                self.f.write_char(')')
            }
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        ToStrVisitor::new(f, 0).program(self)
    }
}

impl Display for Declaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        ToStrVisitor::new(f, 0).declaration(self)
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        ToStrVisitor::new(f, 0).statement(self)
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        ToStrVisitor::new(f, 0).expression(self)
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name)
    }
}

impl Display for TypeNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            TypeNode::Int => f.write_str("int"),
            TypeNode::Bool => f.write_str("bool"),
            TypeNode::Void => f.write_str("void"),
            TypeNode::Struct(name) => write!(f, "struct {name}"),
        }
    }
}

impl Display for FormalDeclaration {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{} {}", self.type_node, self.name)
    }
}

#[cfg(test)]
mod tests {
    use crate::prelude::ast::*;

    #[test]
    fn expressions_are_fully_parenthesized() {
        let mut b = AstBuilder::new();
        let x = b.id("x", (1, 1));
        let one = b.int_lit(1, (1, 5));
        let sum = b.binary(x, BinaryOperator::Plus, one);
        let y = b.id("y", (1, 1));
        let assign = b.assign(y, sum);

        assert_eq!(Expression::Assign(assign.clone()).to_string(), "(y = (x + 1))");
        assert_eq!(Statement::Assign(assign).to_string(), "y = (x + 1);\n");
    }

    #[test]
    fn unparses_a_program() {
        let mut b = AstBuilder::new();
        let x = b.ident("x", (1, 5));
        let main = b.ident("main", (2, 6));
        let y_decl = b.ident("y", (2, 18));
        let y = b.id("y", (3, 5));
        let flag = b.true_lit((3, 9));
        let not = b.unary(UnaryOperator::Not, flag);
        let cout = b.str_lit("\"hi\"", (4, 13));

        let program = Program {
            declarations: vec![
                Declaration::Var(VarDeclaration {
                    type_node: TypeNode::Int,
                    name: x,
                }),
                Declaration::Function(FunctionDeclaration {
                    return_type: TypeNode::Void,
                    name: main,
                    formals: vec![],
                    body: Block {
                        declarations: vec![VarDeclaration {
                            type_node: TypeNode::Bool,
                            name: y_decl,
                        }],
                        statements: vec![
                            Statement::IfElse(IfElseStatement {
                                condition: y,
                                then_block: Block {
                                    declarations: vec![],
                                    statements: vec![Statement::Write(cout)],
                                },
                                else_block: Block::default(),
                            }),
                            Statement::Write(not),
                        ],
                    },
                }),
            ],
        };

        assert_eq!(
            program.to_string(),
            "int x;\n\
             void main() {\n\
             \x20   bool y;\n\
             \x20   if (y) {\n\
             \x20       cout << \"hi\";\n\
             \x20   } else {\n\
             \x20   }\n\
             \x20   cout << (!true);\n\
             }\n"
        );
    }
}
