// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use crate::{
    sym_exp::{BinaryOperator, ExpVisitor, LogicalOperator, SymExpRef, UnaryOperator},
    sym_typing::ExpTy,
};

/// Indentation-aware dump of an expression tree, one node per line
pub struct DebugVisitor {
    indent: usize,
    lines: Vec<String>,
}

impl DebugVisitor {
    pub fn new() -> Self {
        Self {
            indent: 0,
            lines: Vec::new(),
        }
    }

    /// Visit every node of `exp` and render the collected lines
    pub fn dump(mut self, exp: &SymExpRef) -> String {
        exp.accept(&mut self);
        self.lines.join("\n")
    }

    fn push_line(&mut self, message: String) {
        self.lines.push(format!("{}{}", "  ".repeat(self.indent), message));
    }
}

impl Default for DebugVisitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpVisitor for DebugVisitor {
    type Output = ();

    fn visit_variable(&mut self, name: &str, ty: ExpTy) {
        self.push_line(format!("Variable: {} ({})", name, ty));
    }

    fn visit_int_const(&mut self, value: i64) {
        self.push_line(format!("IntConstant: {}", value));
    }

    fn visit_bool_const(&mut self, value: bool) {
        self.push_line(format!("BoolConstant: {}", value));
    }

    fn visit_binary(&mut self, op: BinaryOperator, lhs: &SymExpRef, rhs: &SymExpRef) {
        self.push_line(format!("BinaryOperation: {}", op));
        self.indent += 1;
        lhs.accept(self);
        rhs.accept(self);
        self.indent -= 1;
    }

    fn visit_logical(&mut self, op: LogicalOperator, operands: &[SymExpRef]) {
        self.push_line(format!("LogicalOperation: {}", op));
        self.indent += 1;
        for (i, operand) in operands.iter().enumerate() {
            self.push_line(format!("Operand[{}]:", i));
            operand.accept(self);
        }
        self.indent -= 1;
    }

    fn visit_unary(&mut self, op: UnaryOperator, operand: &SymExpRef) {
        self.push_line(format!("UnaryOperation: {}", op));
        self.indent += 1;
        operand.accept(self);
        self.indent -= 1;
    }

    fn visit_ref(&mut self, id: u64, kind: ExpTy) {
        self.push_line(format!("Ref: ref_{} ({})", id, kind));
    }

    fn visit_field_addr(&mut self, base: &SymExpRef, index: u32) {
        self.push_line(format!("FieldAddr: {}.f{}", base, index));
        self.indent += 1;
        base.accept(self);
        self.push_line(format!("FieldIndex: {}", index));
        self.indent -= 1;
    }

    fn visit_index_addr(&mut self, base: &SymExpRef, index: i64) {
        self.push_line(format!("IndexAddr: {}[{}]", base, index));
        self.indent += 1;
        base.accept(self);
        self.push_line(format!("Index: {}", index));
        self.indent -= 1;
    }
}

/// Node-count metric over an expression, one unit per node
pub struct ComplexityVisitor;

impl ComplexityVisitor {
    pub fn measure(exp: &SymExpRef) -> u64 {
        exp.accept(&mut ComplexityVisitor)
    }
}

impl ExpVisitor for ComplexityVisitor {
    type Output = u64;

    fn visit_variable(&mut self, _name: &str, _ty: ExpTy) -> u64 {
        1
    }

    fn visit_int_const(&mut self, _value: i64) -> u64 {
        1
    }

    fn visit_bool_const(&mut self, _value: bool) -> u64 {
        1
    }

    fn visit_binary(&mut self, _op: BinaryOperator, lhs: &SymExpRef, rhs: &SymExpRef) -> u64 {
        1 + lhs.accept(self) + rhs.accept(self)
    }

    fn visit_logical(&mut self, _op: LogicalOperator, operands: &[SymExpRef]) -> u64 {
        let mut sum = 1;
        for operand in operands {
            sum += operand.accept(self);
        }
        sum
    }

    fn visit_unary(&mut self, _op: UnaryOperator, operand: &SymExpRef) -> u64 {
        1 + operand.accept(self)
    }

    fn visit_ref(&mut self, _id: u64, _kind: ExpTy) -> u64 {
        1
    }

    fn visit_field_addr(&mut self, base: &SymExpRef, _index: u32) -> u64 {
        1 + base.accept(self)
    }

    fn visit_index_addr(&mut self, base: &SymExpRef, _index: i64) -> u64 {
        1 + base.accept(self)
    }
}
