use anyhow::{bail, Context, Result};
use tracing::instrument;

use crate::{
    compiler::{
        asm::{AsmLine, Mnemonic, Operand, Register},
        symbol_table::SymbolKind,
        FALSE, TRUE, WORD_SIZE,
    },
    prelude::*,
};

use super::{function_label, EmitWalker};

impl EmitWalker<'_> {
    /// Pushes the value of `expression`.
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_expression(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::IntLiteral(i) => self.literal(i.value),
            Expression::True(_) => self.literal(TRUE),
            Expression::False(_) => self.literal(FALSE),
            Expression::StringLiteral(s) => {
                self.comment(format!("begin {expression}"));
                let label = self.fresh_label();
                self.directive(".data");
                self.listing.push(AsmLine::Data {
                    label: label.clone(),
                    directive: format!(".asciiz {}", s.value).into(),
                });
                self.directive(".text");
                self.instruction(Mnemonic::La, vec![Register::T0.into(), label.into()]);
                self.push(Register::T0);
                self.comment(format!("end {expression}"));
            }
            Expression::Id(id) => {
                if self.is_struct_variable(id)? {
                    return Ok(());
                }
                let slot = self.slot(id)?;
                self.instruction(Mnemonic::Lw, vec![Register::T0.into(), slot]);
                self.push(Register::T0);
            }
            Expression::DotAccess(d) => {
                self.diagnostics
                    .fatal(d.field.position, "Struct dot-access unsupported");
            }
            Expression::Assign(a) => self.assign(a)?,
            Expression::Call(c) => self.call(c)?,
            Expression::Unary(u) => self.unary(expression, u)?,
            Expression::Binary(b) => self.binary(expression, b)?,
        }
        Ok(())
    }

    /// Pushes the address of an assignable expression.
    #[instrument(skip_all, level = "trace")]
    pub(super) fn visit_address(&mut self, expression: &Expression) -> Result<()> {
        match expression {
            Expression::Id(id) => {
                if self.is_struct_variable(id)? {
                    return Ok(());
                }
                let slot = self.slot(id)?;
                self.instruction(Mnemonic::La, vec![Register::T0.into(), slot]);
                self.push(Register::T0);
            }
            Expression::DotAccess(d) => {
                self.diagnostics
                    .fatal(d.field.position, "Struct dot-access unsupported");
            }
            other => bail!("{other} at {} cannot be assigned to", other.position()),
        }
        Ok(())
    }

    /// Stores the value, then leaves it on the stack as the result.
    pub(super) fn assign(&mut self, a: &AssignExpression) -> Result<()> {
        self.visit_expression(&a.value)?;
        self.visit_address(&a.target)?;
        self.pop(Register::T0);
        self.pop(Register::T1);
        self.instruction(
            Mnemonic::Sw,
            vec![Register::T1.into(), Operand::indexed(0, Register::T0)],
        );
        self.push(Register::T1);
        Ok(())
    }

    /// Arguments go on the stack last to first so the first one sits nearest
    /// the callee's frame pointer.
    #[instrument(skip_all, level = "trace", fields(callee = %c.callee))]
    pub(super) fn call(&mut self, c: &CallExpression) -> Result<()> {
        let symbol = self.symbol(&c.callee)?;
        let function = symbol
            .as_function()
            .with_context(|| format!("{} is not a function", c.callee.name))?;

        for argument in c.arguments.iter().rev() {
            self.visit_expression(argument)?;
        }
        self.instruction(Mnemonic::Jal, vec![function_label(&c.callee.name).into()]);
        if !c.arguments.is_empty() {
            let size = WORD_SIZE * i32::try_from(c.arguments.len())?;
            self.commented(
                Mnemonic::Addu,
                vec![Register::Sp.into(), Register::Sp.into(), size.into()],
                "arguments",
            );
        }
        if function.return_type.is_void() {
            self.instruction(Mnemonic::Li, vec![Register::V0.into(), FALSE.into()]);
        }
        self.push(Register::V0);
        Ok(())
    }

    fn literal(&mut self, value: i32) {
        self.instruction(Mnemonic::Li, vec![Register::T0.into(), value.into()]);
        self.push(Register::T0);
    }

    fn unary(&mut self, expression: &Expression, u: &UnaryExpression) -> Result<()> {
        self.comment(format!("begin {expression}"));
        self.visit_expression(&u.operand)?;
        self.pop(Register::T0);
        let (mnemonic, base) = match u.operator {
            UnaryOperator::Negate => (Mnemonic::Sub, 0),
            UnaryOperator::Not => (Mnemonic::Subu, TRUE),
        };
        self.instruction(Mnemonic::Li, vec![Register::T1.into(), base.into()]);
        self.instruction(
            mnemonic,
            vec![Register::T0.into(), Register::T1.into(), Register::T0.into()],
        );
        self.push(Register::T0);
        self.comment(format!("end {expression}"));
        Ok(())
    }

    #[instrument(skip_all, level = "trace", fields(operator = %b.operator))]
    fn binary(&mut self, expression: &Expression, b: &BinaryExpression) -> Result<()> {
        self.comment(format!("begin {expression}"));
        match b.operator.class() {
            OperatorClass::Logical => self.short_circuit(b)?,
            OperatorClass::Arithmetic => self.arithmetic(b)?,
            OperatorClass::Relational => self.relational(b)?,
            OperatorClass::Equality => {
                if self.recorded_type(b.id)?.is_string() {
                    self.string_equality(b)?;
                } else {
                    self.word_equality(b)?;
                }
            }
        }
        self.comment(format!("end {expression}"));
        Ok(())
    }

    /// The right operand only runs when the left one leaves the result open.
    fn short_circuit(&mut self, b: &BinaryExpression) -> Result<()> {
        let done = self.fresh_label();
        let branch = match b.operator {
            BinaryOperator::And => Mnemonic::Beq,
            BinaryOperator::Or => Mnemonic::Bne,
            other => bail!("{other} is not a logical operator"),
        };

        self.visit_expression(&b.left)?;
        self.pop(Register::T0);
        self.instruction(
            branch,
            vec![Register::T0.into(), Register::Zero.into(), (&done).into()],
        );
        self.visit_expression(&b.right)?;
        self.pop(Register::T0);
        self.label(&done);
        self.push(Register::T0);
        Ok(())
    }

    /// Leaves the left operand in `$t0` and the right one in `$t1`.
    fn operands(&mut self, b: &BinaryExpression) -> Result<()> {
        self.visit_expression(&b.left)?;
        self.visit_expression(&b.right)?;
        self.pop(Register::T1);
        self.pop(Register::T0);
        Ok(())
    }

    fn arithmetic(&mut self, b: &BinaryExpression) -> Result<()> {
        let mnemonic = match b.operator {
            BinaryOperator::Plus => Mnemonic::Add,
            BinaryOperator::Minus => Mnemonic::Sub,
            BinaryOperator::Times => Mnemonic::Mul,
            BinaryOperator::Divide => Mnemonic::Div,
            other => bail!("{other} is not an arithmetic operator"),
        };
        self.operands(b)?;
        if mnemonic == Mnemonic::Div {
            self.instruction(Mnemonic::Div, vec![Register::T0.into(), Register::T1.into()]);
            self.instruction(Mnemonic::Mflo, vec![Register::T0.into()]);
        } else {
            self.instruction(
                mnemonic,
                vec![Register::T0.into(), Register::T0.into(), Register::T1.into()],
            );
        }
        self.push(Register::T0);
        Ok(())
    }

    /// Sets `$t2` to false, then skips setting it to true when the inverse
    /// comparison holds.
    fn relational(&mut self, b: &BinaryExpression) -> Result<()> {
        let skip = match b.operator {
            BinaryOperator::Less => Mnemonic::Bge,
            BinaryOperator::Greater => Mnemonic::Ble,
            BinaryOperator::LessEq => Mnemonic::Bgt,
            BinaryOperator::GreaterEq => Mnemonic::Blt,
            other => bail!("{other} is not a relational operator"),
        };
        self.operands(b)?;
        self.set_unless(skip, Register::T0, Register::T1, Register::T2, FALSE)
    }

    fn word_equality(&mut self, b: &BinaryExpression) -> Result<()> {
        let (skip, initial) = equality_sense(b.operator)?;
        self.operands(b)?;
        self.set_unless(skip, Register::T0, Register::T1, Register::T2, initial)
    }

    /// Walks both strings a byte at a time until they differ or the first
    /// one ends. They are equal exactly when the last bytes read match.
    fn string_equality(&mut self, b: &BinaryExpression) -> Result<()> {
        let (_, initial) = equality_sense(b.operator)?;
        self.operands(b)?;

        let top = self.fresh_label();
        let compared = self.fresh_label();
        self.label(&top);
        self.instruction(
            Mnemonic::Lb,
            vec![Register::T2.into(), Operand::indexed(0, Register::T0)],
        );
        self.instruction(
            Mnemonic::Lb,
            vec![Register::T3.into(), Operand::indexed(0, Register::T1)],
        );
        self.instruction(
            Mnemonic::Bne,
            vec![Register::T2.into(), Register::T3.into(), (&compared).into()],
        );
        self.instruction(
            Mnemonic::Beq,
            vec![Register::T2.into(), Register::Zero.into(), (&compared).into()],
        );
        self.instruction(
            Mnemonic::Addi,
            vec![Register::T0.into(), Register::T0.into(), Operand::Imm(1)],
        );
        self.instruction(
            Mnemonic::Addi,
            vec![Register::T1.into(), Register::T1.into(), Operand::Imm(1)],
        );
        self.instruction(Mnemonic::J, vec![(&top).into()]);
        self.label(&compared);
        self.set_unless(Mnemonic::Bne, Register::T2, Register::T3, Register::T4, initial)
    }

    /// `result = initial; if !(left skip right) { result = !initial }`, then
    /// pushes `result`.
    fn set_unless(
        &mut self,
        skip: Mnemonic,
        left: Register,
        right: Register,
        result: Register,
        initial: i32,
    ) -> Result<()> {
        let done = self.fresh_label();
        let flipped = if initial == TRUE { FALSE } else { TRUE };
        self.instruction(Mnemonic::Li, vec![result.into(), initial.into()]);
        self.instruction(skip, vec![left.into(), right.into(), (&done).into()]);
        self.instruction(Mnemonic::Li, vec![result.into(), flipped.into()]);
        self.label(&done);
        self.push(result);
        Ok(())
    }

    /// Reports a struct-valued target once, before anything is emitted for
    /// it.
    pub(super) fn rejects_struct_target(&mut self, target: &Expression) -> Result<bool> {
        match target {
            Expression::DotAccess(d) => {
                self.diagnostics
                    .fatal(d.field.position, "Struct dot-access unsupported");
                Ok(true)
            }
            Expression::Id(id) => self.is_struct_variable(id),
            _ => Ok(false),
        }
    }

    /// Struct values have no runtime representation.
    fn is_struct_variable(&mut self, id: &Identifier) -> Result<bool> {
        let symbol = self.symbol(id)?;
        if let SymbolKind::StructInstance { .. } = symbol.kind() {
            self.diagnostics
                .fatal(id.position, "Struct variables unsupported");
            return Ok(true);
        }
        Ok(false)
    }
}

/// For `==` the result starts false and a mismatch skips setting it; `!=`
/// is the mirror image.
fn equality_sense(operator: BinaryOperator) -> Result<(Mnemonic, i32)> {
    Ok(match operator {
        BinaryOperator::Equals => (Mnemonic::Bne, FALSE),
        BinaryOperator::NotEquals => (Mnemonic::Beq, TRUE),
        other => bail!("{other} is not an equality operator"),
    })
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::super::tests::{body, emit_program, void_main};
    use super::*;

    /// `int a; int b; void main() { cout << <expression>; }` with the
    /// expression built from `a` and `b`.
    fn write_of(build: impl FnOnce(&mut AstBuilder) -> Expression) -> Vec<String> {
        let mut b = AstBuilder::new();
        let a = b.var_decl(TypeNode::Int, "a", (1, 5));
        let bb = b.var_decl(TypeNode::Int, "b", (1, 12));
        let expression = build(&mut b);
        let main = b.function(
            TypeNode::Void,
            "main",
            (2, 6),
            vec![],
            Block::new(vec![], vec![Statement::Write(expression)]),
        );
        let (listing, diagnostics) = emit_program(&Program {
            declarations: vec![Declaration::Var(a), Declaration::Var(bb), main],
        });
        assert!(diagnostics.is_empty(), "{diagnostics}");
        let code = body(&listing);
        // drop the trailing pop into $a0 and the syscall
        code[..code.len() - 4].to_vec()
    }

    fn a_op_b(operator: BinaryOperator) -> Vec<String> {
        write_of(|b| {
            let a = b.id("a", (3, 13));
            let right = b.id("b", (3, 17));
            b.binary(a, operator, right)
        })
    }

    const LOAD_BOTH: [&str; 10] = [
        "lw $t0, _a",
        "sw $t0, 0($sp)",
        "subu $sp, $sp, 4",
        "lw $t0, _b",
        "sw $t0, 0($sp)",
        "subu $sp, $sp, 4",
        "lw $t1, 4($sp)",
        "addu $sp, $sp, 4",
        "lw $t0, 4($sp)",
        "addu $sp, $sp, 4",
    ];

    #[test_case(BinaryOperator::Plus, &["add $t0, $t0, $t1"] ; "plus")]
    #[test_case(BinaryOperator::Minus, &["sub $t0, $t0, $t1"] ; "minus")]
    #[test_case(BinaryOperator::Times, &["mul $t0, $t0, $t1"] ; "times")]
    #[test_case(BinaryOperator::Divide, &["div $t0, $t1", "mflo $t0"] ; "divide")]
    fn arithmetic(operator: BinaryOperator, expected: &[&str]) {
        let code = a_op_b(operator);

        assert_eq!(code[..10], LOAD_BOTH);
        assert_eq!(code[10..code.len() - 2], *expected);
        assert_eq!(code[code.len() - 2..], ["sw $t0, 0($sp)", "subu $sp, $sp, 4"]);
    }

    #[test_case(BinaryOperator::Less, "bge" ; "less")]
    #[test_case(BinaryOperator::Greater, "ble" ; "greater")]
    #[test_case(BinaryOperator::LessEq, "bgt" ; "less or equal")]
    #[test_case(BinaryOperator::GreaterEq, "blt" ; "greater or equal")]
    #[test_case(BinaryOperator::Equals, "bne" ; "equals")]
    fn comparisons_skip_on_the_inverse(operator: BinaryOperator, skip: &str) {
        let code = a_op_b(operator);

        assert_eq!(
            code[10..],
            [
                "li $t2, 0".to_string(),
                format!("{skip} $t0, $t1, .L0"),
                "li $t2, 1".to_string(),
                ".L0:".to_string(),
                "sw $t2, 0($sp)".to_string(),
                "subu $sp, $sp, 4".to_string(),
            ]
        );
    }

    #[test]
    fn not_equals_starts_true() {
        let code = a_op_b(BinaryOperator::NotEquals);

        assert_eq!(code[10..13], ["li $t2, 1", "beq $t0, $t1, .L0", "li $t2, 0"]);
    }

    #[test]
    fn string_equality_compares_bytes() {
        let code = write_of(|b| {
            let left = b.str_lit("\"ab\"", (3, 13));
            let right = b.str_lit("\"ac\"", (3, 20));
            b.binary(left, BinaryOperator::NotEquals, right)
        });

        let start = code.iter().position(|l| l == ".L2:").unwrap();
        assert_eq!(
            code[start..],
            [
                ".L2:",
                "lb $t2, 0($t0)",
                "lb $t3, 0($t1)",
                "bne $t2, $t3, .L3",
                "beq $t2, $zero, .L3",
                "addi $t0, $t0, 1",
                "addi $t1, $t1, 1",
                "j .L2",
                ".L3:",
                "li $t4, 1",
                "bne $t2, $t3, .L4",
                "li $t4, 0",
                ".L4:",
                "sw $t4, 0($sp)",
                "subu $sp, $sp, 4",
            ]
        );
        assert!(code.contains(&".L0: .asciiz \"ab\"".to_string()));
    }

    #[test]
    fn and_skips_the_right_operand() {
        let code = write_of(|b| {
            let f = b.false_lit((3, 13));
            let t = b.true_lit((3, 22));
            b.binary(f, BinaryOperator::And, t)
        });

        assert_eq!(
            code,
            vec![
                "li $t0, 0",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "lw $t0, 4($sp)",
                "addu $sp, $sp, 4",
                "beq $t0, $zero, .L0",
                "li $t0, 1",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "lw $t0, 4($sp)",
                "addu $sp, $sp, 4",
                ".L0:",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
            ]
        );
    }

    #[test]
    fn or_skips_the_right_operand() {
        let code = write_of(|b| {
            let t = b.true_lit((3, 13));
            let f = b.false_lit((3, 21));
            b.binary(t, BinaryOperator::Or, f)
        });

        assert_eq!(
            code,
            vec![
                "li $t0, 1",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "lw $t0, 4($sp)",
                "addu $sp, $sp, 4",
                "bne $t0, $zero, .L0",
                "li $t0, 0",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "lw $t0, 4($sp)",
                "addu $sp, $sp, 4",
                ".L0:",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
            ]
        );
    }

    #[test_case(UnaryOperator::Negate, "lw $t0, _a", "li $t1, 0", "sub $t0, $t1, $t0" ; "negate")]
    #[test_case(UnaryOperator::Not, "li $t0, 1", "li $t1, 1", "subu $t0, $t1, $t0" ; "not")]
    fn unary_subtracts_from_a_base(operator: UnaryOperator, load: &str, base: &str, apply: &str) {
        let code = write_of(|b| {
            let operand = match operator {
                UnaryOperator::Negate => b.id("a", (3, 14)),
                UnaryOperator::Not => b.true_lit((3, 14)),
            };
            b.unary(operator, operand)
        });

        assert_eq!(
            code,
            vec![
                load,
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "lw $t0, 4($sp)",
                "addu $sp, $sp, 4",
                base,
                apply,
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
            ]
        );
    }

    #[test]
    fn call_pushes_arguments_last_to_first() {
        let mut b = AstBuilder::new();
        let formals = vec![
            b.formal(TypeNode::Int, "x", (1, 11)),
            b.formal(TypeNode::Int, "y", (1, 18)),
        ];
        let f = b.function(TypeNode::Void, "f", (1, 6), formals, Block::default());
        let callee = b.ident("f", (3, 5));
        let one = b.int_lit(1, (3, 7));
        let two = b.int_lit(2, (3, 10));
        let call = b.call(callee, vec![one, two]);
        let main = b.function(
            TypeNode::Void,
            "main",
            (2, 6),
            vec![],
            Block::new(vec![], vec![Statement::Call(call)]),
        );

        let (listing, _) = emit_program(&Program {
            declarations: vec![f, main],
        });

        assert_eq!(
            body(&listing),
            vec![
                "li $t0, 2",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "li $t0, 1",
                "sw $t0, 0($sp)",
                "subu $sp, $sp, 4",
                "jal _f",
                "addu $sp, $sp, 8",
                "li $v0, 0",
                "sw $v0, 0($sp)",
                "subu $sp, $sp, 4",
                "addu $sp, $sp, 4",
            ]
        );
    }

    #[test]
    fn locals_and_formals_use_the_frame() {
        let mut b = AstBuilder::new();
        let formals = vec![b.formal(TypeNode::Int, "p", (1, 11))];
        let local = b.var_decl(TypeNode::Int, "q", (2, 9));
        let target = b.id("q", (3, 5));
        let p_use = b.id("p", (3, 9));
        let assign = b.assign(target, p_use);
        let f = b.function(
            TypeNode::Void,
            "f",
            (1, 6),
            formals,
            Block::new(vec![local], vec![Statement::Assign(assign)]),
        );
        let main = b.function(TypeNode::Void, "main", (5, 6), vec![], Block::default());

        let (listing, _) = emit_program(&Program {
            declarations: vec![f, main],
        });

        let code = listing.code();
        assert!(code.contains(&"lw $t0, 4($fp)".to_string()));
        assert!(code.contains(&"la $t0, -8($fp)".to_string()));
        assert!(code.contains(&"sw $t1, 0($t0)".to_string()));
    }

    #[test]
    fn dot_access_is_rejected() {
        let mut b = AstBuilder::new();
        let field = b.var_decl(TypeNode::Int, "x", (1, 20));
        let point = b.struct_decl("Point", (1, 8), vec![field]);
        let p_type = b.struct_type("Point", (3, 5));
        let p = b.var_decl(p_type, "p", (3, 18));
        let p_use = b.id("p", (4, 13));
        let x = b.ident("x", (4, 15));
        let access = b.dot(p_use, x);
        let program = Program {
            declarations: vec![
                point,
                b.function(
                    TypeNode::Void,
                    "main",
                    (2, 6),
                    vec![],
                    Block::new(vec![p], vec![Statement::Write(access)]),
                ),
            ],
        };

        let (_, diagnostics) = emit_program(&program);

        insta::assert_snapshot!(diagnostics.to_string(), @r###"
        warning:1:8: Struct definitions unsupported
        warning:3:18: Struct variables unsupported
        fatal:4:15: Struct dot-access unsupported
        "###);
    }
}
