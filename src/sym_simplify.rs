// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::rc::Rc;

use crate::sym_exp::{BinaryOperator, SymExp, SymExpRef, UnaryOperator};

/// Bottom-up structural rewrite: constant folding, arithmetic identities and
/// double-negation elimination. Returns the input handle when no rule
/// applies, so sharing in the expression DAG is preserved.
pub fn simplify(exp: &SymExpRef) -> SymExpRef {
    match &**exp {
        SymExp::Binary { op, lhs, rhs } => {
            let lhs_s = simplify(lhs);
            let rhs_s = simplify(rhs);
            if let Some(rewritten) = rewrite_binary(*op, &lhs_s, &rhs_s) {
                return rewritten;
            }
            if Rc::ptr_eq(&lhs_s, lhs) && Rc::ptr_eq(&rhs_s, rhs) {
                exp.clone()
            } else {
                Rc::new(SymExp::Binary {
                    op: *op,
                    lhs: lhs_s,
                    rhs: rhs_s,
                })
            }
        }
        SymExp::Unary { op, operand } => {
            let operand_s = simplify(operand);
            if let Some(rewritten) = rewrite_unary(*op, &operand_s) {
                return rewritten;
            }
            if Rc::ptr_eq(&operand_s, operand) {
                exp.clone()
            } else {
                Rc::new(SymExp::Unary {
                    op: *op,
                    operand: operand_s,
                })
            }
        }
        SymExp::Logical { op, operands } => {
            let operands_s: Vec<SymExpRef> = operands.iter().map(simplify).collect();
            let unchanged = operands_s
                .iter()
                .zip(operands.iter())
                .all(|(a, b)| Rc::ptr_eq(a, b));
            if unchanged {
                exp.clone()
            } else {
                Rc::new(SymExp::Logical {
                    op: *op,
                    operands: operands_s,
                })
            }
        }
        _ => exp.clone(),
    }
}

fn rewrite_binary(op: BinaryOperator, lhs: &SymExpRef, rhs: &SymExpRef) -> Option<SymExpRef> {
    // constant folding, with division and modulo by zero left untouched
    if let (SymExp::IntConst(a), SymExp::IntConst(b)) = (&**lhs, &**rhs) {
        let folded = match op {
            BinaryOperator::Add => Some(a.wrapping_add(*b)),
            BinaryOperator::Sub => Some(a.wrapping_sub(*b)),
            BinaryOperator::Mul => Some(a.wrapping_mul(*b)),
            BinaryOperator::Div if *b != 0 => Some(a.wrapping_div(*b)),
            BinaryOperator::Mod if *b != 0 => Some(a.wrapping_rem(*b)),
            _ => None,
        };
        if let Some(value) = folded {
            return Some(SymExp::int_const(value));
        }
    }

    // identities over a zero operand
    match op {
        BinaryOperator::Add => {
            if is_zero(lhs) {
                return Some(rhs.clone());
            }
            if is_zero(rhs) {
                return Some(lhs.clone());
            }
        }
        BinaryOperator::Sub => {
            if is_zero(rhs) {
                return Some(lhs.clone());
            }
        }
        BinaryOperator::Mul => {
            if is_zero(lhs) || is_zero(rhs) {
                return Some(SymExp::int_const(0));
            }
        }
        _ => {}
    }
    None
}

fn rewrite_unary(op: UnaryOperator, operand: &SymExpRef) -> Option<SymExpRef> {
    match (op, &**operand) {
        (UnaryOperator::Neg, SymExp::IntConst(c)) => Some(SymExp::int_const(c.wrapping_neg())),
        (UnaryOperator::Not, SymExp::BoolConst(b)) => Some(SymExp::bool_const(!b)),
        // defensive: a logical not over a leaked integer constant
        (UnaryOperator::Not, SymExp::IntConst(c)) => Some(SymExp::bool_const(*c == 0)),
        // double negation
        (
            UnaryOperator::Not,
            SymExp::Unary {
                op: UnaryOperator::Not,
                operand: inner,
            },
        ) => Some(inner.clone()),
        _ => None,
    }
}

fn is_zero(exp: &SymExpRef) -> bool {
    matches!(&**exp, SymExp::IntConst(0))
}
