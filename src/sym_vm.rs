// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use log::{debug, warn};
use std::collections::HashSet;

use crate::{
    ssa_form::{AllocKind, SsaBinOp, SsaInstr, SsaOp, SsaUnOp, SsaValue},
    status::{SymError, SymResult},
    sym_config::SymConfig,
    sym_exp::{BinaryOperator, LogicalOperator, SymExp, SymExpRef, UnaryOperator},
    sym_simplify::simplify,
    sym_typing::ExpTy,
    sym_vm_types::SymState,
};

/// Tag added to log messages
const LOG_TAG: &str = "[vm]";

/// Per-run context handed into every step by the scheduler; replaces a
/// mutable back-pointer from state to scheduler
pub struct StepContext<'a> {
    pub config: &'a SymConfig,
    /// Opcodes already reported as unsupported, so each is logged once
    pub warned_opcodes: &'a mut HashSet<String>,
}

enum StepEffect {
    /// The state advanced (or terminated) in place
    Advanced,
    /// The state split into successor states, construction order preserved
    Forked(Vec<SymState>),
}

/// Execute one instruction against `state`. Returns the zero, one or two
/// successor states. A failing path comes back as a single terminal state
/// carrying its error; no error kills exploration.
pub fn step(mut state: SymState, instr: &SsaInstr, ctx: &mut StepContext) -> Vec<SymState> {
    match try_step(&mut state, instr, ctx) {
        Ok(StepEffect::Advanced) => vec![state],
        Ok(StepEffect::Forked(states)) => states,
        Err(err) => {
            warn!("{} path aborted at '{}': {}", LOG_TAG, instr.op.mnemonic(), err);
            state.failure = Some(err);
            state.pc.current_block = None;
            vec![state]
        }
    }
}

fn try_step(state: &mut SymState, instr: &SsaInstr, ctx: &mut StepContext) -> SymResult<StepEffect> {
    match &instr.op {
        SsaOp::Return { result } => interpret_return(state, result.as_ref(), ctx),
        SsaOp::If { cond } => interpret_if(state, cond, ctx),
        SsaOp::Jump => interpret_jump(state, ctx),
        SsaOp::Store { addr, value } => interpret_store(state, addr, value, ctx),
        _ => {
            // a value-producing shape: recompute (stale cache entries from a
            // previous unroll iteration must not survive) and rebind
            let exp = shape_exp(state, instr, ctx)?;
            if !instr.name.is_empty() {
                if let Some(frame) = state.current_frame_mut() {
                    frame.locals.insert(instr.name.clone(), exp);
                }
            }
            state.pc.instr_index += 1;
            Ok(StepEffect::Advanced)
        }
    }
}

//
// value resolution
//

/// Resolve an operand to a symbolic expression: literals directly, names
/// through the frame-local memoization and, on a miss, from the shape of the
/// defining instruction
pub fn resolve_value(
    state: &mut SymState,
    value: &SsaValue,
    ctx: &mut StepContext,
) -> SymResult<SymExpRef> {
    match value {
        SsaValue::IntLit(v) => Ok(SymExp::int_const(*v)),
        SsaValue::BoolLit(v) => Ok(SymExp::bool_const(*v)),
        SsaValue::FloatLit(v) => {
            if ctx.config.strict_ssa {
                return Err(SymError::UnsupportedSsa(format!("float constant {}", v)));
            }
            warn_once(
                ctx,
                "float-const",
                "float constants are truncated to integers",
            );
            Ok(SymExp::int_const(*v as i64))
        }
        // strings are opaque tokens
        SsaValue::StrLit(_) => Ok(SymExp::int_const(0)),
        SsaValue::Name(name) if name.is_empty() => Ok(SymExp::int_const(0)),
        SsaValue::Name(name) => {
            if let Some(frame) = state.current_frame() {
                if let Some(exp) = frame.locals.get(name) {
                    return Ok(exp.clone());
                }
            }
            let def = state
                .current_frame()
                .and_then(|frame| frame.function.def_of(name))
                .cloned();
            if let Some(def) = def {
                let exp = shape_exp(state, &def, ctx)?;
                if let Some(frame) = state.current_frame_mut() {
                    frame.locals.insert(def.name.clone(), exp.clone());
                }
                return Ok(exp);
            }
            let param_ty = state
                .current_frame()
                .and_then(|frame| frame.function.param(name))
                .map(|param| param.ty);
            if let Some(ty) = param_ty {
                let exp = SymExp::variable(name.as_str(), ty);
                if let Some(frame) = state.current_frame_mut() {
                    frame.locals.insert(name.clone(), exp.clone());
                }
                return Ok(exp);
            }
            // defensive: an undefined name becomes an int variable
            debug!("{} unresolved name '{}' treated as variable", LOG_TAG, name);
            Ok(SymExp::variable(name.as_str(), ExpTy::Int))
        }
    }
}

/// The symbolic semantics of one SSA shape (the value-producing subset)
fn shape_exp(
    state: &mut SymState,
    instr: &SsaInstr,
    ctx: &mut StepContext,
) -> SymResult<SymExpRef> {
    match &instr.op {
        SsaOp::UnOp { op, operand } => {
            let operand = resolve_value(state, operand, ctx)?;
            let sym_op = match op {
                SsaUnOp::Neg => UnaryOperator::Neg,
                SsaUnOp::Not => UnaryOperator::Not,
                SsaUnOp::BitNot => {
                    if ctx.config.strict_ssa {
                        return Err(SymError::UnsupportedSsa("unary operator ^".to_owned()));
                    }
                    warn_once(ctx, "unop-bitnot", "bitwise complement passes through");
                    return Ok(operand);
                }
            };
            Ok(simplify(&SymExp::unary(sym_op, operand)?))
        }
        SsaOp::BinOp { op, lhs, rhs } => {
            let lhs = resolve_value(state, lhs, ctx)?;
            match op {
                SsaBinOp::And | SsaBinOp::Or => {
                    let rhs = resolve_value(state, rhs, ctx)?;
                    let sym_op = if *op == SsaBinOp::And {
                        LogicalOperator::And
                    } else {
                        LogicalOperator::Or
                    };
                    SymExp::logical(sym_op, vec![lhs, rhs])
                }
                _ if op.is_bitwise() => {
                    if ctx.config.strict_ssa {
                        return Err(SymError::UnsupportedSsa(format!(
                            "binary operator {:?}",
                            op
                        )));
                    }
                    warn_once(
                        ctx,
                        "binop-bitwise",
                        "bitwise and shift operators pass their left operand through",
                    );
                    Ok(lhs)
                }
                _ => {
                    let rhs = resolve_value(state, rhs, ctx)?;
                    let sym_op = match op {
                        SsaBinOp::Add => BinaryOperator::Add,
                        SsaBinOp::Sub => BinaryOperator::Sub,
                        SsaBinOp::Mul => BinaryOperator::Mul,
                        SsaBinOp::Div => BinaryOperator::Div,
                        SsaBinOp::Rem => BinaryOperator::Mod,
                        SsaBinOp::Eq => BinaryOperator::Eq,
                        SsaBinOp::Ne => BinaryOperator::Ne,
                        SsaBinOp::Lt => BinaryOperator::Lt,
                        SsaBinOp::Le => BinaryOperator::Le,
                        SsaBinOp::Gt => BinaryOperator::Gt,
                        SsaBinOp::Ge => BinaryOperator::Ge,
                        _ => {
                            return Err(SymError::Internal(format!(
                                "operator {:?} fell through dispatch",
                                op
                            )))
                        }
                    };
                    Ok(simplify(&SymExp::binary(sym_op, lhs, rhs)?))
                }
            }
        }
        SsaOp::Load { addr } => {
            let addr = resolve_value(state, addr, ctx)?;
            load_through(state, &addr)
        }
        SsaOp::Alloc { kind } => Ok(match kind {
            AllocKind::Cell(ty) => state.heap.allocate(*ty),
            AllocKind::Struct(fields) => state.heap.allocate_struct(*fields),
            AllocKind::Array(length) => state.heap.allocate_array(*length),
        }),
        SsaOp::FieldAddr { base, field } => {
            let base = resolve_value(state, base, ctx)?;
            SymExp::field_addr(base, *field)
        }
        SsaOp::Field { base, field } => {
            let base = resolve_value(state, base, ctx)?;
            state.heap.get_field(&base, *field)
        }
        SsaOp::IndexAddr { base, index } => {
            let base = resolve_value(state, base, ctx)?;
            let index = constant_index(state, index, ctx)?;
            SymExp::index_addr(base, index)
        }
        SsaOp::Index { base, index } => {
            let base = resolve_value(state, base, ctx)?;
            let index = constant_index(state, index, ctx)?;
            state.heap.get_elem(&base, index)
        }
        SsaOp::Phi { edges } => {
            let value = select_phi_edge(state, edges);
            match value {
                Some(value) => resolve_value(state, &value, ctx),
                None => Ok(SymExp::int_const(0)),
            }
        }
        SsaOp::Call { callee, .. } => {
            // foreign functions are opaque: the result is a fresh variable
            // named after the callee
            let name = if instr.name.is_empty() {
                callee.clone()
            } else {
                format!("{}_{}", callee, instr.name)
            };
            Ok(SymExp::variable(name, instr.ty))
        }
        SsaOp::ChangeType { operand }
        | SsaOp::Convert { operand }
        | SsaOp::MakeInterface { operand } => resolve_value(state, operand, ctx),
        SsaOp::If { .. } | SsaOp::Jump | SsaOp::Return { .. } | SsaOp::Store { .. } => {
            Err(SymError::Internal(format!(
                "instruction '{}' is not a value",
                instr.op.mnemonic()
            )))
        }
    }
}

/// Pick the phi edge matching the block control came from; fall back to the
/// first edge when no predecessor matches
fn select_phi_edge(state: &SymState, edges: &[(usize, SsaValue)]) -> Option<SsaValue> {
    if let Some(prev) = state.pc.prev_block {
        for (pred, value) in edges {
            if *pred == prev {
                return Some(value.clone());
            }
        }
    }
    edges.first().map(|(_, value)| value.clone())
}

/// An index operand must be constant; anything symbolic degrades to 0,
/// which is unsound for arrays longer than one element
fn constant_index(
    state: &mut SymState,
    index: &SsaValue,
    ctx: &mut StepContext,
) -> SymResult<i64> {
    let exp = simplify(&resolve_value(state, index, ctx)?);
    match &*exp {
        SymExp::IntConst(value) => Ok(*value),
        other => {
            warn_once(
                ctx,
                "indexaddr-symbolic",
                "non-constant array index degrades to index 0",
            );
            debug!("{} symbolic index '{}' degraded to 0", LOG_TAG, other);
            Ok(0)
        }
    }
}

//
// address interpretation
//

fn load_through(state: &SymState, addr: &SymExpRef) -> SymResult<SymExpRef> {
    match &**addr {
        SymExp::Ref { .. } => state.heap.get_field(addr, 0),
        SymExp::FieldAddr { base, index } => state.heap.get_field(base, *index),
        SymExp::IndexAddr { base, index } => state.heap.get_elem(base, *index),
        other => Err(SymError::Type(format!(
            "load through non-address expression: {}",
            other
        ))),
    }
}

fn store_through(state: &mut SymState, addr: &SymExpRef, value: SymExpRef) -> SymResult<()> {
    match &**addr {
        SymExp::Ref { .. } => state.heap.assign_field(addr, 0, value),
        SymExp::FieldAddr { base, index } => state.heap.assign_field(base, *index, value),
        SymExp::IndexAddr { base, index } => state.heap.assign_elem(base, *index, value),
        other => Err(SymError::Type(format!(
            "store through non-address expression: {}",
            other
        ))),
    }
}

//
// control flow
//

fn interpret_return(
    state: &mut SymState,
    result: Option<&SsaValue>,
    ctx: &mut StepContext,
) -> SymResult<StepEffect> {
    if let Some(result) = result {
        let exp = resolve_value(state, result, ctx)?;
        if let Some(frame) = state.current_frame_mut() {
            frame.return_value = Some(exp);
        }
    }
    state.pc.current_block = None;
    Ok(StepEffect::Advanced)
}

fn interpret_if(
    state: &mut SymState,
    cond: &SsaValue,
    ctx: &mut StepContext,
) -> SymResult<StepEffect> {
    let cond = resolve_value(state, cond, ctx)?;
    if cond.ty() != ExpTy::Bool {
        return Err(SymError::Type(format!(
            "if condition is not boolean: {} ({})",
            cond,
            cond.ty()
        )));
    }

    let current = state
        .pc
        .current_block
        .ok_or_else(|| SymError::Internal("branch without a current block".to_owned()))?;
    let succs = state
        .current_function()
        .and_then(|function| function.block(current).map(|block| block.succs.clone()))
        .unwrap_or_default();

    // true branch first, then false; push order is part of the contract
    let mut true_state = state.fork();
    let mut false_state = state.fork();

    true_state.path_condition = SymExp::logical(
        LogicalOperator::And,
        vec![state.path_condition.clone(), cond.clone()],
    )?;
    let negated = simplify(&SymExp::unary(UnaryOperator::Not, cond)?);
    false_state.path_condition = SymExp::logical(
        LogicalOperator::And,
        vec![state.path_condition.clone(), negated],
    )?;

    if succs.len() >= 2 {
        true_state.pc.current_block = Some(succs[0]);
        true_state.pc.instr_index = 0;
        true_state.pc.prev_block = Some(current);
        false_state.pc.current_block = Some(succs[1]);
        false_state.pc.instr_index = 0;
        false_state.pc.prev_block = Some(current);
    } else {
        true_state.pc.current_block = None;
        false_state.pc.current_block = None;
    }

    Ok(StepEffect::Forked(vec![true_state, false_state]))
}

fn interpret_jump(state: &mut SymState, ctx: &mut StepContext) -> SymResult<StepEffect> {
    let current = state
        .pc
        .current_block
        .ok_or_else(|| SymError::Internal("jump without a current block".to_owned()))?;
    let function = state
        .current_function()
        .ok_or_else(|| SymError::Internal("jump without a call frame".to_owned()))?;
    let succs = function
        .block(current)
        .map(|block| block.succs.clone())
        .unwrap_or_default();
    if succs.is_empty() {
        state.pc.current_block = None;
        return Ok(StepEffect::Advanced);
    }
    let target = succs[0];

    let visits = state.block_visit_count.get(&target).copied().unwrap_or(0);
    let total: u32 = state.block_visit_count.values().sum();
    if visits >= ctx.config.max_per_block_unroll || total >= ctx.config.max_total_unroll {
        match function.find_loop_exit(target) {
            Some(exit) => {
                debug!(
                    "{} unroll bound hit at block {}, resuming at exit block {}",
                    LOG_TAG, target, exit
                );
                state.pc.prev_block = Some(current);
                state.pc.current_block = Some(exit);
                state.pc.instr_index = 0;
            }
            None => {
                debug!(
                    "{} unroll bound hit at block {} with no exit, path terminated",
                    LOG_TAG, target
                );
                state.pc.current_block = None;
            }
        }
        return Ok(StepEffect::Advanced);
    }

    *state.block_visit_count.entry(target).or_insert(0) += 1;
    state.pc.prev_block = Some(current);
    state.pc.current_block = Some(target);
    state.pc.instr_index = 0;
    Ok(StepEffect::Advanced)
}

fn interpret_store(
    state: &mut SymState,
    addr: &SsaValue,
    value: &SsaValue,
    ctx: &mut StepContext,
) -> SymResult<StepEffect> {
    let addr = resolve_value(state, addr, ctx)?;
    let value = resolve_value(state, value, ctx)?;
    store_through(state, &addr, value)?;
    state.pc.instr_index += 1;
    Ok(StepEffect::Advanced)
}

fn warn_once(ctx: &mut StepContext, key: &str, message: &str) {
    if ctx.warned_opcodes.insert(key.to_owned()) {
        warn!("{} {}", LOG_TAG, message);
    }
}
