use tracing::instrument;

use crate::prelude::*;

use super::TypeCheckWalker;

impl TypeCheckWalker<'_> {
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_expression(&mut self, expression: &Expression) -> Type {
        match expression {
            Expression::IntLiteral(_) => Type::Int,
            Expression::StringLiteral(_) => Type::String,
            Expression::True(_) | Expression::False(_) => Type::Bool,
            Expression::Id(id) => self.type_of(id),
            Expression::DotAccess(d) => {
                if self.resolution.is_bad_access(d.id) {
                    Type::Error
                } else {
                    self.type_of(&d.field)
                }
            }
            Expression::Assign(a) => self.assign(a),
            Expression::Call(c) => self.call(c),
            Expression::Unary(u) => self.unary(u),
            Expression::Binary(b) => self.binary(b),
        }
    }

    pub(super) fn assign(&mut self, a: &AssignExpression) -> Type {
        let target = self.visit_expression(&a.target);
        let value = self.visit_expression(&a.value);
        let position = a.target.position();
        let mut result = target.clone();

        let both = |check: fn(&Type) -> bool| check(&target) && check(&value);
        let misuse = [
            (both(Type::is_function), "Function assignment"),
            (both(Type::is_struct_def), "Struct name assignment"),
            (both(Type::is_struct), "Struct variable assignment"),
        ];
        for (_, message) in misuse.into_iter().filter(|(hit, _)| *hit) {
            self.diagnostics.fatal(position, message);
            result = Type::Error;
        }

        if target != value && !target.is_error() && !value.is_error() {
            self.diagnostics.fatal(position, "Type mismatch");
            result = Type::Error;
        }
        if target.is_error() || value.is_error() {
            result = Type::Error;
        }
        result
    }

    /// An unresolved callee is already reported, so only its arguments are
    /// checked.
    #[instrument(skip_all, level = "trace", fields(callee = %c.callee))]
    pub(super) fn call(&mut self, c: &CallExpression) -> Type {
        let callee = self.type_of(&c.callee);
        if callee.is_error() {
            for argument in &c.arguments {
                self.visit_expression(argument);
            }
            return Type::Error;
        }

        let resolution = self.resolution;
        let Some(function) = resolution
            .symbol(c.callee.id)
            .and_then(|symbol| symbol.as_function())
        else {
            self.diagnostics
                .fatal(c.callee.position, "Attempt to call a non-function");
            return Type::Error;
        };

        if c.arguments.len() != function.param_count {
            self.diagnostics
                .fatal(c.callee.position, "Function call with wrong number of args");
            return function.return_type.clone();
        }

        let params = function.params().clone();
        for (i, argument) in c.arguments.iter().enumerate() {
            let actual = self.visit_expression(argument);
            // A formal that failed to declare has no type to compare against.
            let Some(formal) = params.get(i).and_then(Option::as_ref) else {
                continue;
            };
            if !actual.is_error() && *formal != actual {
                self.diagnostics.fatal(
                    argument.position(),
                    "Type of actual does not match type of formal",
                );
            }
        }
        function.return_type.clone()
    }

    fn unary(&mut self, u: &UnaryExpression) -> Type {
        let operand = self.visit_expression(&u.operand);
        let (wanted, result, message) = match u.operator {
            UnaryOperator::Negate => (
                Type::Int,
                Type::Int,
                "Arithmetic operator applied to non-numeric operand",
            ),
            UnaryOperator::Not => (
                Type::Bool,
                Type::Bool,
                "Logical operator applied to non-bool operand",
            ),
        };

        if operand.is_error() {
            return Type::Error;
        }
        if operand != wanted {
            self.diagnostics.fatal(u.operand.position(), message);
            return Type::Error;
        }
        result
    }

    #[instrument(skip_all, level = "trace", fields(operator = %b.operator))]
    fn binary(&mut self, b: &BinaryExpression) -> Type {
        let left = self.visit_expression(&b.left);
        let right = self.visit_expression(&b.right);

        let (wanted, result, message) = match b.operator.class() {
            OperatorClass::Equality => return self.equality(b, left, right),
            OperatorClass::Arithmetic => (
                Type::Int,
                Type::Int,
                "Arithmetic operator applied to non-numeric operand",
            ),
            OperatorClass::Relational => (
                Type::Int,
                Type::Bool,
                "Relational operator applied to non-numeric operand",
            ),
            OperatorClass::Logical => (
                Type::Bool,
                Type::Bool,
                "Logical operator applied to non-bool operand",
            ),
        };

        let mut ok = true;
        for (operand, ty) in [(&b.left, &left), (&b.right, &right)] {
            if ty.is_error() {
                ok = false;
            } else if *ty != wanted {
                self.diagnostics.fatal(operand.position(), message);
                ok = false;
            }
        }
        if ok {
            result
        } else {
            Type::Error
        }
    }

    /// Records the compared type when the comparison is well formed, since
    /// strings and words compare differently.
    fn equality(&mut self, b: &BinaryExpression, left: Type, right: Type) -> Type {
        let position = b.left.position();
        let mut ok = true;

        let both = |check: fn(&Type) -> bool| check(&left) && check(&right);
        let misuse = [
            (both(Type::is_void), "Equality operator applied to void functions"),
            (both(Type::is_function), "Equality operator applied to functions"),
            (both(Type::is_struct_def), "Equality operator applied to struct names"),
            (both(Type::is_struct), "Equality operator applied to struct variables"),
        ];
        for (_, message) in misuse.into_iter().filter(|(hit, _)| *hit) {
            self.diagnostics.fatal(position, message);
            ok = false;
        }

        if left != right && !left.is_error() && !right.is_error() {
            self.diagnostics.fatal(position, "Type mismatch");
            ok = false;
        }
        if left.is_error() || right.is_error() {
            ok = false;
        }

        if ok {
            self.typing.record(b.id, left);
            Type::Bool
        } else {
            Type::Error
        }
    }
}
