// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::{fmt, rc::Rc};

use crate::{
    status::{SymError, SymResult},
    sym_typing::ExpTy,
};

/// Shared handle to an immutable expression node. Expressions form a DAG;
/// structural sharing across states is deliberate.
pub type SymExpRef = Rc<SymExp>;

/// Binary operators over integer operands; the comparison subset yields bool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Sub
                | BinaryOperator::Mul
                | BinaryOperator::Div
                | BinaryOperator::Mod
        )
    }

    pub fn is_comparison(self) -> bool {
        !self.is_arithmetic()
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Le => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Ge => ">=",
        };
        write!(f, "{}", repr)
    }
}

/// Propositional connectives. `Not` takes one operand, `Implies` exactly
/// two, `And`/`Or` at least two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
    Implies,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            LogicalOperator::And => "&&",
            LogicalOperator::Or => "||",
            LogicalOperator::Not => "!",
            LogicalOperator::Implies => "=>",
        };
        write!(f, "{}", repr)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    /// Arithmetic negation, int only
    Neg,
    /// Logical negation, bool only
    Not,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Not => "!",
        };
        write!(f, "{}", repr)
    }
}

/// A symbolic expression. Nodes are immutable once constructed; build them
/// through the validating constructors below, which enforce the typing rules
/// and report violations as `SymError::Type`.
#[derive(Debug, Clone, PartialEq)]
pub enum SymExp {
    Variable {
        name: String,
        ty: ExpTy,
    },
    IntConst(i64),
    BoolConst(bool),
    Binary {
        op: BinaryOperator,
        lhs: SymExpRef,
        rhs: SymExpRef,
    },
    Logical {
        op: LogicalOperator,
        operands: Vec<SymExpRef>,
    },
    Unary {
        op: UnaryOperator,
        operand: SymExpRef,
    },
    /// Opaque identifier of a heap object
    Ref {
        id: u64,
        kind: ExpTy,
    },
    /// Address of field `index` of the object behind `base`
    FieldAddr {
        base: SymExpRef,
        index: u32,
    },
    /// Address of element `index` of the object behind `base`
    IndexAddr {
        base: SymExpRef,
        index: i64,
    },
}

impl SymExp {
    pub fn variable(name: impl Into<String>, ty: ExpTy) -> SymExpRef {
        Rc::new(SymExp::Variable {
            name: name.into(),
            ty,
        })
    }

    pub fn int_const(value: i64) -> SymExpRef {
        Rc::new(SymExp::IntConst(value))
    }

    pub fn bool_const(value: bool) -> SymExpRef {
        Rc::new(SymExp::BoolConst(value))
    }

    pub fn binary(op: BinaryOperator, lhs: SymExpRef, rhs: SymExpRef) -> SymResult<SymExpRef> {
        match op {
            BinaryOperator::Add
            | BinaryOperator::Sub
            | BinaryOperator::Mul
            | BinaryOperator::Div
            | BinaryOperator::Mod
            | BinaryOperator::Lt
            | BinaryOperator::Le
            | BinaryOperator::Gt
            | BinaryOperator::Ge => {
                if lhs.ty() != ExpTy::Int || rhs.ty() != ExpTy::Int {
                    return Err(SymError::Type(format!(
                        "operator '{}' requires int operands, got {} and {}",
                        op,
                        lhs.ty(),
                        rhs.ty()
                    )));
                }
            }
            BinaryOperator::Eq | BinaryOperator::Ne => {
                if lhs.ty() != rhs.ty() {
                    return Err(SymError::Type(format!(
                        "operator '{}' requires operands of one type, got {} and {}",
                        op,
                        lhs.ty(),
                        rhs.ty()
                    )));
                }
            }
        }
        Ok(Rc::new(SymExp::Binary { op, lhs, rhs }))
    }

    pub fn logical(op: LogicalOperator, operands: Vec<SymExpRef>) -> SymResult<SymExpRef> {
        match op {
            LogicalOperator::Not => {
                if operands.len() != 1 {
                    return Err(SymError::Type(format!(
                        "operator '!' requires one operand, got {}",
                        operands.len()
                    )));
                }
            }
            LogicalOperator::Implies => {
                if operands.len() != 2 {
                    return Err(SymError::Type(format!(
                        "operator '=>' requires two operands, got {}",
                        operands.len()
                    )));
                }
            }
            LogicalOperator::And | LogicalOperator::Or => {
                if operands.len() < 2 {
                    return Err(SymError::Type(format!(
                        "operator '{}' requires at least two operands, got {}",
                        op,
                        operands.len()
                    )));
                }
            }
        }
        for operand in &operands {
            if operand.ty() != ExpTy::Bool {
                return Err(SymError::Type(format!(
                    "logical operands must be bool, got {}: {}",
                    operand.ty(),
                    operand
                )));
            }
        }
        Ok(Rc::new(SymExp::Logical { op, operands }))
    }

    pub fn unary(op: UnaryOperator, operand: SymExpRef) -> SymResult<SymExpRef> {
        match op {
            UnaryOperator::Neg => {
                if operand.ty() != ExpTy::Int {
                    return Err(SymError::Type(format!(
                        "unary minus requires an int operand, got {}",
                        operand.ty()
                    )));
                }
            }
            UnaryOperator::Not => {
                if operand.ty() != ExpTy::Bool {
                    return Err(SymError::Type(format!(
                        "logical not requires a bool operand, got {}",
                        operand.ty()
                    )));
                }
            }
        }
        Ok(Rc::new(SymExp::Unary { op, operand }))
    }

    pub fn heap_ref(id: u64, kind: ExpTy) -> SymExpRef {
        Rc::new(SymExp::Ref { id, kind })
    }

    pub fn field_addr(base: SymExpRef, index: u32) -> SymResult<SymExpRef> {
        if base.ty() != ExpTy::Ref {
            return Err(SymError::Type(format!(
                "field address requires a ref base, got {}",
                base.ty()
            )));
        }
        Ok(Rc::new(SymExp::FieldAddr { base, index }))
    }

    pub fn index_addr(base: SymExpRef, index: i64) -> SymResult<SymExpRef> {
        if base.ty() != ExpTy::Ref {
            return Err(SymError::Type(format!(
                "index address requires a ref base, got {}",
                base.ty()
            )));
        }
        Ok(Rc::new(SymExp::IndexAddr { base, index }))
    }

    /// Static type, derived from the shape
    pub fn ty(&self) -> ExpTy {
        match self {
            SymExp::Variable { ty, .. } => *ty,
            SymExp::IntConst(_) => ExpTy::Int,
            SymExp::BoolConst(_) => ExpTy::Bool,
            SymExp::Binary { op, .. } => {
                if op.is_comparison() {
                    ExpTy::Bool
                } else {
                    ExpTy::Int
                }
            }
            SymExp::Logical { .. } => ExpTy::Bool,
            SymExp::Unary { operand, .. } => operand.ty(),
            SymExp::Ref { .. } => ExpTy::Ref,
            SymExp::FieldAddr { .. } => ExpTy::Ref,
            SymExp::IndexAddr { .. } => ExpTy::Ref,
        }
    }

    /// Dispatch to the visitor arm matching this variant. This is the sole
    /// traversal primitive; visitors recurse by calling `accept` on the
    /// children they receive.
    pub fn accept<V: ExpVisitor>(&self, visitor: &mut V) -> V::Output {
        match self {
            SymExp::Variable { name, ty } => visitor.visit_variable(name, *ty),
            SymExp::IntConst(value) => visitor.visit_int_const(*value),
            SymExp::BoolConst(value) => visitor.visit_bool_const(*value),
            SymExp::Binary { op, lhs, rhs } => visitor.visit_binary(*op, lhs, rhs),
            SymExp::Logical { op, operands } => visitor.visit_logical(*op, operands),
            SymExp::Unary { op, operand } => visitor.visit_unary(*op, operand),
            SymExp::Ref { id, kind } => visitor.visit_ref(*id, *kind),
            SymExp::FieldAddr { base, index } => visitor.visit_field_addr(base, *index),
            SymExp::IndexAddr { base, index } => visitor.visit_index_addr(base, *index),
        }
    }
}

/// One arm per expression variant. All consumers of the algebra (debug dump,
/// complexity metric, SMT translation) are visitors; the associated `Output`
/// replaces type-erased returns.
pub trait ExpVisitor {
    type Output;

    fn visit_variable(&mut self, name: &str, ty: ExpTy) -> Self::Output;
    fn visit_int_const(&mut self, value: i64) -> Self::Output;
    fn visit_bool_const(&mut self, value: bool) -> Self::Output;
    fn visit_binary(&mut self, op: BinaryOperator, lhs: &SymExpRef, rhs: &SymExpRef)
        -> Self::Output;
    fn visit_logical(&mut self, op: LogicalOperator, operands: &[SymExpRef]) -> Self::Output;
    fn visit_unary(&mut self, op: UnaryOperator, operand: &SymExpRef) -> Self::Output;
    fn visit_ref(&mut self, id: u64, kind: ExpTy) -> Self::Output;
    fn visit_field_addr(&mut self, base: &SymExpRef, index: u32) -> Self::Output;
    fn visit_index_addr(&mut self, base: &SymExpRef, index: i64) -> Self::Output;
}

impl fmt::Display for SymExp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SymExp::Variable { name, .. } => write!(f, "{}", name),
            SymExp::IntConst(value) => write!(f, "{}", value),
            SymExp::BoolConst(value) => write!(f, "{}", value),
            SymExp::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            SymExp::Logical { op, operands } => match op {
                LogicalOperator::Not => write!(f, "!{}", operands[0]),
                LogicalOperator::Implies => write!(f, "({} => {})", operands[0], operands[1]),
                LogicalOperator::And | LogicalOperator::Or => {
                    write!(f, "(")?;
                    for (i, operand) in operands.iter().enumerate() {
                        if i > 0 {
                            write!(f, " {} ", op)?;
                        }
                        write!(f, "{}", operand)?;
                    }
                    write!(f, ")")
                }
            },
            SymExp::Unary { op, operand } => write!(f, "{}{}", op, operand),
            SymExp::Ref { id, .. } => write!(f, "ref_{}", id),
            SymExp::FieldAddr { base, index } => write!(f, "{}.f{}", base, index),
            SymExp::IndexAddr { base, index } => write!(f, "{}[{}]", base, index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_derives_declared_type() {
        let x = SymExp::variable("x", ExpTy::Int);
        let y = SymExp::variable("y", ExpTy::Int);
        let b = SymExp::variable("b", ExpTy::Bool);

        let sum = SymExp::binary(BinaryOperator::Add, x.clone(), y.clone()).unwrap();
        assert_eq!(sum.ty(), ExpTy::Int);

        let cmp = SymExp::binary(BinaryOperator::Gt, sum.clone(), SymExp::int_const(5)).unwrap();
        assert_eq!(cmp.ty(), ExpTy::Bool);

        let conj = SymExp::logical(LogicalOperator::And, vec![cmp, b.clone()]).unwrap();
        assert_eq!(conj.ty(), ExpTy::Bool);

        let neg = SymExp::unary(UnaryOperator::Neg, x).unwrap();
        assert_eq!(neg.ty(), ExpTy::Int);

        let not = SymExp::unary(UnaryOperator::Not, b).unwrap();
        assert_eq!(not.ty(), ExpTy::Bool);

        let r = SymExp::heap_ref(3, ExpTy::Struct);
        assert_eq!(r.ty(), ExpTy::Ref);
        assert_eq!(SymExp::field_addr(r.clone(), 1).unwrap().ty(), ExpTy::Ref);
        assert_eq!(SymExp::index_addr(r, 0).unwrap().ty(), ExpTy::Ref);
    }

    #[test]
    fn constructors_validate_types() {
        let x = SymExp::variable("x", ExpTy::Int);
        let b = SymExp::variable("b", ExpTy::Bool);

        assert!(matches!(
            SymExp::binary(BinaryOperator::Add, x.clone(), b.clone()),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::binary(BinaryOperator::Eq, x.clone(), b.clone()),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::unary(UnaryOperator::Neg, b.clone()),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::unary(UnaryOperator::Not, x.clone()),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::logical(LogicalOperator::And, vec![b.clone()]),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::logical(LogicalOperator::Not, vec![b.clone(), b.clone()]),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::logical(LogicalOperator::And, vec![b, x.clone()]),
            Err(SymError::Type(_))
        ));
        assert!(matches!(
            SymExp::field_addr(x, 0),
            Err(SymError::Type(_))
        ));
    }

    #[test]
    fn printable_form() {
        let x = SymExp::variable("x", ExpTy::Int);
        let y = SymExp::variable("y", ExpTy::Int);
        let sum = SymExp::binary(BinaryOperator::Add, x.clone(), y).unwrap();
        let cond = SymExp::binary(BinaryOperator::Gt, sum, SymExp::int_const(5)).unwrap();
        assert_eq!(cond.to_string(), "((x + y) > 5)");

        let b = SymExp::variable("b", ExpTy::Bool);
        let not = SymExp::unary(UnaryOperator::Not, b.clone()).unwrap();
        assert_eq!(not.to_string(), "!b");

        let conj = SymExp::logical(LogicalOperator::And, vec![cond.clone(), b.clone()]).unwrap();
        assert_eq!(conj.to_string(), "(((x + y) > 5) && b)");

        let imp = SymExp::logical(LogicalOperator::Implies, vec![b, cond]).unwrap();
        assert_eq!(imp.to_string(), "(b => ((x + y) > 5))");

        let neg = SymExp::unary(UnaryOperator::Neg, x).unwrap();
        assert_eq!(neg.to_string(), "-x");

        let r = SymExp::heap_ref(7, ExpTy::Array);
        assert_eq!(r.to_string(), "ref_7");
        assert_eq!(
            SymExp::index_addr(r.clone(), 3).unwrap().to_string(),
            "ref_7[3]"
        );
        assert_eq!(
            SymExp::field_addr(r, 1).unwrap().to_string(),
            "ref_7.f1"
        );
    }
}
