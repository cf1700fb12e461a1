use std::fmt::{Debug, Display};

mod to_str;

use crate::prelude::shared_strings::SharedString;

/// Stable identity of a node within one [`Program`]. Every pass keys its
/// annotations by this id instead of writing into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 1-based source location. `0:0` marks diagnostics about the program as a
/// whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const PROGRAM: Position = Position { line: 0, column: 0 };

    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl From<(usize, usize)> for Position {
    fn from((line, column): (usize, usize)) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, Default)]
pub struct Program {
    pub declarations: Vec<Declaration>,
}

#[derive(Clone)]
pub enum Declaration {
    Var(VarDeclaration),
    Function(FunctionDeclaration),
    Struct(StructDeclaration),
}

#[derive(Clone)]
pub struct Identifier {
    pub id: NodeId,
    pub name: SharedString,
    pub position: Position,
}

#[derive(Clone)]
pub enum TypeNode {
    Int,
    Bool,
    Void,
    Struct(Identifier),
}

#[derive(Clone)]
pub struct VarDeclaration {
    pub type_node: TypeNode,
    pub name: Identifier,
}

#[derive(Clone)]
pub struct FormalDeclaration {
    pub type_node: TypeNode,
    pub name: Identifier,
}

#[derive(Clone)]
pub struct FunctionDeclaration {
    pub return_type: TypeNode,
    pub name: Identifier,
    pub formals: Vec<FormalDeclaration>,
    pub body: Block,
}

#[derive(Clone)]
pub struct StructDeclaration {
    pub name: Identifier,
    pub fields: Vec<VarDeclaration>,
}

/// Declarations followed by statements: a function body or the body of
/// an `if`/`else`/`while`/`repeat`. Each block is its own scope.
#[derive(Clone, Default)]
pub struct Block {
    pub declarations: Vec<VarDeclaration>,
    pub statements: Vec<Statement>,
}

#[derive(Clone)]
pub enum Statement {
    Assign(AssignExpression),
    Increment(Expression),
    Decrement(Expression),
    Read(Expression),
    Write(Expression),
    If(IfStatement),
    IfElse(IfElseStatement),
    While(LoopStatement),
    Repeat(LoopStatement),
    Call(CallExpression),
    Return(ReturnStatement),
}

#[derive(Clone)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Block,
}

#[derive(Clone)]
pub struct IfElseStatement {
    pub condition: Expression,
    pub then_block: Block,
    pub else_block: Block,
}

/// Shared shape of `while` and `repeat`.
#[derive(Clone)]
pub struct LoopStatement {
    pub condition: Expression,
    pub body: Block,
}

#[derive(Clone)]
pub struct ReturnStatement {
    pub value: Option<Expression>,
    pub position: Position,
}

#[derive(Clone)]
pub enum Expression {
    IntLiteral(IntLiteral),
    StringLiteral(StringLiteral),
    True(BoolLiteral),
    False(BoolLiteral),
    Id(Identifier),
    DotAccess(DotAccessExpression),
    Assign(AssignExpression),
    Call(CallExpression),
    Unary(UnaryExpression),
    Binary(BinaryExpression),
}

impl Expression {
    pub fn id(&self) -> NodeId {
        match self {
            Expression::IntLiteral(e) => e.id,
            Expression::StringLiteral(e) => e.id,
            Expression::True(e) | Expression::False(e) => e.id,
            Expression::Id(e) => e.id,
            Expression::DotAccess(e) => e.id,
            Expression::Assign(e) => e.id,
            Expression::Call(e) => e.id,
            Expression::Unary(e) => e.id,
            Expression::Binary(e) => e.id,
        }
    }

    /// Where diagnostics about this expression point.
    pub fn position(&self) -> Position {
        match self {
            Expression::IntLiteral(e) => e.position,
            Expression::StringLiteral(e) => e.position,
            Expression::True(e) | Expression::False(e) => e.position,
            Expression::Id(e) => e.position,
            Expression::DotAccess(e) => e.field.position,
            Expression::Assign(e) => e.target.position(),
            Expression::Call(e) => e.callee.position,
            Expression::Unary(e) => e.operand.position(),
            Expression::Binary(e) => e.left.position(),
        }
    }
}

#[derive(Clone)]
pub struct IntLiteral {
    pub id: NodeId,
    pub value: i32,
    pub position: Position,
}

/// The literal keeps its source spelling, quotes and escapes included, so
/// it can be handed to the assembler unchanged.
#[derive(Clone)]
pub struct StringLiteral {
    pub id: NodeId,
    pub value: SharedString,
    pub position: Position,
}

#[derive(Clone)]
pub struct BoolLiteral {
    pub id: NodeId,
    pub position: Position,
}

#[derive(Clone)]
pub struct DotAccessExpression {
    pub id: NodeId,
    pub object: Box<Expression>,
    pub field: Identifier,
}

#[derive(Clone)]
pub struct AssignExpression {
    pub id: NodeId,
    pub target: Box<Expression>,
    pub value: Box<Expression>,
}

#[derive(Clone)]
pub struct CallExpression {
    pub id: NodeId,
    pub callee: Identifier,
    pub arguments: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum UnaryOperator {
    #[strum(serialize = "-")]
    Negate,
    #[strum(serialize = "!")]
    Not,
}

#[derive(Clone)]
pub struct UnaryExpression {
    pub id: NodeId,
    pub operator: UnaryOperator,
    pub operand: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Arithmetic,
    Logical,
    Equality,
    Relational,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum BinaryOperator {
    #[strum(serialize = "+")]
    Plus,
    #[strum(serialize = "-")]
    Minus,
    #[strum(serialize = "*")]
    Times,
    #[strum(serialize = "/")]
    Divide,
    #[strum(serialize = "&&")]
    And,
    #[strum(serialize = "||")]
    Or,
    #[strum(serialize = "==")]
    Equals,
    #[strum(serialize = "!=")]
    NotEquals,
    #[strum(serialize = "<")]
    Less,
    #[strum(serialize = ">")]
    Greater,
    #[strum(serialize = "<=")]
    LessEq,
    #[strum(serialize = ">=")]
    GreaterEq,
}

impl BinaryOperator {
    pub fn class(self) -> OperatorClass {
        match self {
            BinaryOperator::Plus
            | BinaryOperator::Minus
            | BinaryOperator::Times
            | BinaryOperator::Divide => OperatorClass::Arithmetic,
            BinaryOperator::And | BinaryOperator::Or => OperatorClass::Logical,
            BinaryOperator::Equals | BinaryOperator::NotEquals => OperatorClass::Equality,
            BinaryOperator::Less
            | BinaryOperator::Greater
            | BinaryOperator::LessEq
            | BinaryOperator::GreaterEq => OperatorClass::Relational,
        }
    }
}

#[derive(Clone)]
pub struct BinaryExpression {
    pub id: NodeId,
    pub left: Box<Expression>,
    pub operator: BinaryOperator,
    pub right: Box<Expression>,
}

/// Hands out node ids while a tree is being assembled, either by a parser
/// or by hand in tests.
#[derive(Debug, Default)]
pub struct AstBuilder {
    next_id: usize,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn ident(&mut self, name: &str, position: impl Into<Position>) -> Identifier {
        Identifier {
            id: self.next_id(),
            name: name.into(),
            position: position.into(),
        }
    }

    pub fn id(&mut self, name: &str, position: impl Into<Position>) -> Expression {
        Expression::Id(self.ident(name, position))
    }

    pub fn int_lit(&mut self, value: i32, position: impl Into<Position>) -> Expression {
        Expression::IntLiteral(IntLiteral {
            id: self.next_id(),
            value,
            position: position.into(),
        })
    }

    pub fn str_lit(&mut self, value: &str, position: impl Into<Position>) -> Expression {
        Expression::StringLiteral(StringLiteral {
            id: self.next_id(),
            value: value.into(),
            position: position.into(),
        })
    }

    pub fn true_lit(&mut self, position: impl Into<Position>) -> Expression {
        Expression::True(BoolLiteral {
            id: self.next_id(),
            position: position.into(),
        })
    }

    pub fn false_lit(&mut self, position: impl Into<Position>) -> Expression {
        Expression::False(BoolLiteral {
            id: self.next_id(),
            position: position.into(),
        })
    }

    pub fn dot(&mut self, object: Expression, field: Identifier) -> Expression {
        Expression::DotAccess(DotAccessExpression {
            id: self.next_id(),
            object: Box::new(object),
            field,
        })
    }

    pub fn assign(&mut self, target: Expression, value: Expression) -> AssignExpression {
        AssignExpression {
            id: self.next_id(),
            target: Box::new(target),
            value: Box::new(value),
        }
    }

    pub fn call(&mut self, callee: Identifier, arguments: Vec<Expression>) -> CallExpression {
        CallExpression {
            id: self.next_id(),
            callee,
            arguments,
        }
    }

    pub fn unary(&mut self, operator: UnaryOperator, operand: Expression) -> Expression {
        Expression::Unary(UnaryExpression {
            id: self.next_id(),
            operator,
            operand: Box::new(operand),
        })
    }

    pub fn binary(
        &mut self,
        left: Expression,
        operator: BinaryOperator,
        right: Expression,
    ) -> Expression {
        Expression::Binary(BinaryExpression {
            id: self.next_id(),
            left: Box::new(left),
            operator,
            right: Box::new(right),
        })
    }

    pub fn struct_type(&mut self, name: &str, position: impl Into<Position>) -> TypeNode {
        TypeNode::Struct(self.ident(name, position))
    }

    pub fn var_decl(
        &mut self,
        type_node: TypeNode,
        name: &str,
        position: impl Into<Position>,
    ) -> VarDeclaration {
        VarDeclaration {
            type_node,
            name: self.ident(name, position),
        }
    }

    pub fn formal(
        &mut self,
        type_node: TypeNode,
        name: &str,
        position: impl Into<Position>,
    ) -> FormalDeclaration {
        FormalDeclaration {
            type_node,
            name: self.ident(name, position),
        }
    }

    pub fn function(
        &mut self,
        return_type: TypeNode,
        name: &str,
        position: impl Into<Position>,
        formals: Vec<FormalDeclaration>,
        body: Block,
    ) -> Declaration {
        Declaration::Function(FunctionDeclaration {
            return_type,
            name: self.ident(name, position),
            formals,
            body,
        })
    }

    pub fn struct_decl(
        &mut self,
        name: &str,
        position: impl Into<Position>,
        fields: Vec<VarDeclaration>,
    ) -> Declaration {
        Declaration::Struct(StructDeclaration {
            name: self.ident(name, position),
            fields,
        })
    }
}

impl Block {
    pub fn new(declarations: Vec<VarDeclaration>, statements: Vec<Statement>) -> Self {
        Self {
            declarations,
            statements,
        }
    }
}

impl Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Debug for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}
