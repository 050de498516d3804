// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::collections::HashMap;

use z3::ast::{Bool, Dynamic, Int};

use crate::{
    status::{SymError, SymResult},
    sym_exp::{BinaryOperator, ExpVisitor, LogicalOperator, SymExpRef, UnaryOperator},
    sym_typing::ExpTy,
};

/// Translates symbolic expressions into Z3 terms. Pure: builds terms only,
/// never solves. Variables are cached per translation session so one name
/// maps to one solver constant throughout.
pub struct SmtTranslator {
    vars: HashMap<String, Dynamic>,
}

impl SmtTranslator {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    /// Drop the variable cache, starting a fresh session
    pub fn reset(&mut self) {
        self.vars.clear();
    }

    pub fn translate(&mut self, exp: &SymExpRef) -> SymResult<Dynamic> {
        exp.accept(self)
    }

    /// Translate an expression that must come out boolean, e.g. a path
    /// condition about to be asserted
    pub fn translate_bool(&mut self, exp: &SymExpRef) -> SymResult<Bool> {
        let term = self.translate(exp)?;
        term.as_bool()
            .ok_or_else(|| SymError::Translation(format!("expected a boolean term for {}", exp)))
    }

    fn as_int(&self, term: Dynamic, context: &str) -> SymResult<Int> {
        term.as_int()
            .ok_or_else(|| SymError::Translation(format!("expected an integer term in {}", context)))
    }

    fn as_bool(&self, term: Dynamic, context: &str) -> SymResult<Bool> {
        term.as_bool()
            .ok_or_else(|| SymError::Translation(format!("expected a boolean term in {}", context)))
    }
}

impl Default for SmtTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpVisitor for SmtTranslator {
    type Output = SymResult<Dynamic>;

    fn visit_variable(&mut self, name: &str, ty: ExpTy) -> SymResult<Dynamic> {
        if let Some(term) = self.vars.get(name) {
            return Ok(term.clone());
        }
        let term = match ty {
            ExpTy::Int => Dynamic::from_ast(&Int::new_const(name.to_owned())),
            ExpTy::Bool => Dynamic::from_ast(&Bool::new_const(name.to_owned())),
            // references are reasoned about by identity
            ExpTy::Ref => Dynamic::from_ast(&Int::new_const(name.to_owned())),
            ExpTy::Struct | ExpTy::Array => {
                return Err(SymError::Translation(format!(
                    "variable '{}' of type {} has no solver sort",
                    name, ty
                )));
            }
        };
        self.vars.insert(name.to_owned(), term.clone());
        Ok(term)
    }

    fn visit_int_const(&mut self, value: i64) -> SymResult<Dynamic> {
        Ok(Dynamic::from_ast(&Int::from_i64(value)))
    }

    fn visit_bool_const(&mut self, value: bool) -> SymResult<Dynamic> {
        Ok(Dynamic::from_ast(&Bool::from_bool(value)))
    }

    fn visit_binary(
        &mut self,
        op: BinaryOperator,
        lhs: &SymExpRef,
        rhs: &SymExpRef,
    ) -> SymResult<Dynamic> {
        let l = lhs.accept(self)?;
        let r = rhs.accept(self)?;
        match op {
            BinaryOperator::Add => {
                let (l, r) = (self.as_int(l, "+")?, self.as_int(r, "+")?);
                Ok(Dynamic::from_ast(&Int::add(&[l, r])))
            }
            BinaryOperator::Sub => {
                let (l, r) = (self.as_int(l, "-")?, self.as_int(r, "-")?);
                Ok(Dynamic::from_ast(&Int::sub(&[l, r])))
            }
            BinaryOperator::Mul => {
                let (l, r) = (self.as_int(l, "*")?, self.as_int(r, "*")?);
                Ok(Dynamic::from_ast(&Int::mul(&[l, r])))
            }
            BinaryOperator::Div => {
                let (l, r) = (self.as_int(l, "/")?, self.as_int(r, "/")?);
                Ok(Dynamic::from_ast(&l.div(&r)))
            }
            BinaryOperator::Mod => {
                let (l, r) = (self.as_int(l, "%")?, self.as_int(r, "%")?);
                Ok(Dynamic::from_ast(&l.modulo(&r)))
            }
            BinaryOperator::Eq | BinaryOperator::Ne => {
                let eq = if let (Some(li), Some(ri)) = (l.as_int(), r.as_int()) {
                    li.eq(&ri)
                } else if let (Some(lb), Some(rb)) = (l.as_bool(), r.as_bool()) {
                    lb.eq(&rb)
                } else {
                    return Err(SymError::Translation(format!(
                        "equality between incompatible terms: {} and {}",
                        lhs, rhs
                    )));
                };
                if op == BinaryOperator::Eq {
                    Ok(Dynamic::from_ast(&eq))
                } else {
                    Ok(Dynamic::from_ast(&eq.not()))
                }
            }
            BinaryOperator::Lt => {
                let (l, r) = (self.as_int(l, "<")?, self.as_int(r, "<")?);
                Ok(Dynamic::from_ast(&l.lt(&r)))
            }
            BinaryOperator::Le => {
                let (l, r) = (self.as_int(l, "<=")?, self.as_int(r, "<=")?);
                Ok(Dynamic::from_ast(&l.le(&r)))
            }
            BinaryOperator::Gt => {
                let (l, r) = (self.as_int(l, ">")?, self.as_int(r, ">")?);
                Ok(Dynamic::from_ast(&l.gt(&r)))
            }
            BinaryOperator::Ge => {
                let (l, r) = (self.as_int(l, ">=")?, self.as_int(r, ">=")?);
                Ok(Dynamic::from_ast(&l.ge(&r)))
            }
        }
    }

    fn visit_logical(
        &mut self,
        op: LogicalOperator,
        operands: &[SymExpRef],
    ) -> SymResult<Dynamic> {
        let mut terms = Vec::with_capacity(operands.len());
        for operand in operands {
            let term = operand.accept(self)?;
            terms.push(self.as_bool(term, "logical operand")?);
        }
        match op {
            LogicalOperator::And => Ok(Dynamic::from_ast(&Bool::and(&terms))),
            LogicalOperator::Or => Ok(Dynamic::from_ast(&Bool::or(&terms))),
            LogicalOperator::Not => Ok(Dynamic::from_ast(&terms[0].not())),
            LogicalOperator::Implies => Ok(Dynamic::from_ast(&terms[0].implies(&terms[1]))),
        }
    }

    fn visit_unary(&mut self, op: UnaryOperator, operand: &SymExpRef) -> SymResult<Dynamic> {
        let term = operand.accept(self)?;
        match op {
            UnaryOperator::Neg => {
                let term = self.as_int(term, "unary -")?;
                Ok(Dynamic::from_ast(&term.unary_minus()))
            }
            UnaryOperator::Not => {
                let term = self.as_bool(term, "unary !")?;
                Ok(Dynamic::from_ast(&term.not()))
            }
        }
    }

    fn visit_ref(&mut self, id: u64, _kind: ExpTy) -> SymResult<Dynamic> {
        // reference identity only: the opaque id as an integer
        Ok(Dynamic::from_ast(&Int::from_i64(id as i64)))
    }

    fn visit_field_addr(&mut self, base: &SymExpRef, index: u32) -> SymResult<Dynamic> {
        Err(SymError::Translation(format!(
            "field address {}.f{} must be resolved through the heap before translation",
            base, index
        )))
    }

    fn visit_index_addr(&mut self, base: &SymExpRef, index: i64) -> SymResult<Dynamic> {
        Err(SymError::Translation(format!(
            "index address {}[{}] must be resolved through the heap before translation",
            base, index
        )))
    }
}
