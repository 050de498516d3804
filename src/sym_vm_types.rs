// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::{
    ssa_form::{BlockId, SsaFunction, SsaInstr},
    status::SymError,
    sym_exp::{SymExp, SymExpRef},
    sym_heap::SymHeap,
};

/// One frame of the call stack: the executing function, the SSA-name to
/// expression bindings, and the value handed back on return
#[derive(Debug, Clone)]
pub struct SymFrame {
    pub function: Rc<SsaFunction>,
    pub locals: BTreeMap<String, SymExpRef>,
    pub return_value: Option<SymExpRef>,
}

impl SymFrame {
    pub fn new(function: Rc<SsaFunction>) -> Self {
        Self {
            function,
            locals: BTreeMap::new(),
            return_value: None,
        }
    }
}

/// Program counter. `prev_block` records where control came from and exists
/// solely to resolve phi nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter {
    pub current_block: Option<BlockId>,
    pub instr_index: usize,
    pub prev_block: Option<BlockId>,
}

/// One state of the exploration: a point in the program together with the
/// path condition that leads there. Forking a state clones the frames and
/// counters; expressions are shared and the heap is copied on write.
#[derive(Debug, Clone)]
pub struct SymState {
    pub call_stack: Vec<SymFrame>,
    pub path_condition: SymExpRef,
    pub heap: SymHeap,
    pub pc: ProgramCounter,
    pub block_visit_count: BTreeMap<BlockId, u32>,
    /// Error that aborted or truncated this path, if any
    pub failure: Option<SymError>,
}

impl SymState {
    /// Initial state of a function: each parameter bound to a fresh symbolic
    /// variable, path condition `true`, empty heap, control at block 0
    pub fn new(function: Rc<SsaFunction>) -> Self {
        let mut frame = SymFrame::new(function.clone());
        for param in function.params() {
            frame.locals.insert(
                param.name.clone(),
                SymExp::variable(param.name.as_str(), param.ty),
            );
        }
        let current_block = if function.blocks().is_empty() {
            None
        } else {
            Some(0)
        };
        Self {
            call_stack: vec![frame],
            path_condition: SymExp::bool_const(true),
            heap: SymHeap::new(),
            pc: ProgramCounter {
                current_block,
                instr_index: 0,
                prev_block: None,
            },
            block_visit_count: BTreeMap::new(),
            failure: None,
        }
    }

    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn current_frame(&self) -> Option<&SymFrame> {
        self.call_stack.last()
    }

    pub fn current_frame_mut(&mut self) -> Option<&mut SymFrame> {
        self.call_stack.last_mut()
    }

    pub fn current_function(&self) -> Option<Rc<SsaFunction>> {
        self.call_stack.last().map(|frame| frame.function.clone())
    }

    pub fn is_finished(&self) -> bool {
        let block_id = match self.pc.current_block {
            None => return true,
            Some(block_id) => block_id,
        };
        let function = match self.call_stack.last() {
            None => return true,
            Some(frame) => &frame.function,
        };
        match function.block(block_id) {
            None => true,
            Some(block) => self.pc.instr_index >= block.instrs.len(),
        }
    }

    /// The instruction the next step will execute, if the state is live
    pub fn next_instruction(&self) -> Option<SsaInstr> {
        if self.is_finished() {
            return None;
        }
        let block_id = self.pc.current_block?;
        let frame = self.call_stack.last()?;
        frame
            .function
            .block(block_id)?
            .instrs
            .get(self.pc.instr_index)
            .cloned()
    }

    pub fn return_value(&self) -> Option<&SymExpRef> {
        self.call_stack
            .last()
            .and_then(|frame| frame.return_value.as_ref())
    }

    pub fn call_stack_dump(&self) -> String {
        let mut out = String::new();
        for (depth, frame) in self.call_stack.iter().enumerate() {
            out.push_str(&format!(
                "  #{} {} ({} locals)\n",
                depth,
                frame.function.name(),
                frame.locals.len()
            ));
        }
        out
    }
}

impl fmt::Display for SymState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "State:")?;
        writeln!(f, "  path condition: {}", self.path_condition)?;
        writeln!(
            f,
            "  block: {:?} @ {} (prev {:?})",
            self.pc.current_block, self.pc.instr_index, self.pc.prev_block
        )?;
        write!(f, "{}", self.call_stack_dump())?;
        if let Some(value) = self.return_value() {
            writeln!(f, "  return value: {}", value)?;
        }
        if let Some(failure) = &self.failure {
            writeln!(f, "  failure: {}", failure)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ssa_form::{SsaOp, SsaValue},
        sym_typing::ExpTy,
    };

    #[test]
    fn initial_state_binds_parameters_to_variables() {
        let mut fun = SsaFunction::new("f");
        fun.add_param("x", ExpTy::Int);
        fun.add_param("flag", ExpTy::Bool);
        let entry = fun.add_block();
        fun.push(
            entry,
            "",
            ExpTy::Int,
            SsaOp::Return {
                result: Some(SsaValue::name("x")),
            },
        );

        let state = SymState::new(Rc::new(fun));
        let frame = state.current_frame().unwrap();
        assert_eq!(frame.locals.get("x").unwrap().to_string(), "x");
        assert_eq!(frame.locals.get("x").unwrap().ty(), ExpTy::Int);
        assert_eq!(frame.locals.get("flag").unwrap().ty(), ExpTy::Bool);
        assert_eq!(state.path_condition.to_string(), "true");
        assert!(!state.is_finished());
    }

    #[test]
    fn empty_function_is_terminal_at_birth() {
        let fun = SsaFunction::new("empty");
        let state = SymState::new(Rc::new(fun));
        assert!(state.is_finished());
        assert!(state.next_instruction().is_none());
    }

    #[test]
    fn fork_isolates_locals() {
        let mut fun = SsaFunction::new("f");
        fun.add_param("x", ExpTy::Int);
        let entry = fun.add_block();
        fun.push(entry, "", ExpTy::Int, SsaOp::Return { result: None });

        let mut state = SymState::new(Rc::new(fun));
        let sibling = state.fork();
        state
            .current_frame_mut()
            .unwrap()
            .locals
            .insert("x".to_owned(), SymExp::int_const(1));
        assert_eq!(
            sibling.current_frame().unwrap().locals.get("x").unwrap().to_string(),
            "x"
        );
    }
}
