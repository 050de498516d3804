// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use log::{debug, info};
use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashSet},
    rc::Rc,
};

use crate::{
    ssa_form::{SsaFunction, SsaProgram},
    status::{SymError, SymResult},
    sym_config::SymConfig,
    sym_selector::PathSelector,
    sym_vm::{step, StepContext},
    sym_vm_types::SymState,
};

/// Tag added to log messages
const LOG_TAG: &str = "[explore]";

/// Queue entry: selector priority first, insertion order breaking ties so
/// equal priorities dequeue first-in first-out
struct QueueItem {
    priority: i64,
    seq: u64,
    state: SymState,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Outcome of one exploration: states that ran to completion (or aborted on
/// a per-path error) and states cut off by the step budget
pub struct Analysis {
    pub results: Vec<SymState>,
    pub unfinished: Vec<SymState>,
    pub steps: usize,
}

/// Priority-queue driver over interpreter states. Everything runs serially;
/// dequeue order is defined by the selector alone.
pub struct SymScheduler {
    config: SymConfig,
    selector: Box<dyn PathSelector>,
    queue: BinaryHeap<QueueItem>,
    seq: u64,
    steps: usize,
    warned_opcodes: HashSet<String>,
}

impl SymScheduler {
    pub fn new(config: SymConfig) -> Self {
        let selector = config.selector.into_selector(config.random_seed);
        Self {
            config,
            selector,
            queue: BinaryHeap::new(),
            seq: 0,
            steps: 0,
            warned_opcodes: HashSet::new(),
        }
    }

    /// Explore every feasible path of `function` under the configured budget
    pub fn explore(&mut self, function: Rc<SsaFunction>) -> Analysis {
        self.queue.clear();
        self.seq = 0;
        self.steps = 0;

        if self.config.verbose {
            info!(
                "{} exploring '{}' with selector {}",
                LOG_TAG,
                function.name(),
                self.config.selector
            );
        }

        let initial = SymState::new(function);
        self.push_state(initial);

        let mut results = Vec::new();
        while self.steps < self.config.max_steps {
            let item = match self.queue.pop() {
                None => break,
                Some(item) => item,
            };
            let state = item.state;
            self.steps += 1;

            if self.config.verbose {
                debug!(
                    "{} step {}: queued={} pc={}",
                    LOG_TAG,
                    self.steps,
                    self.queue.len(),
                    state.path_condition
                );
            }

            if state.is_finished() {
                if self.config.verbose {
                    debug!("{} state finished", LOG_TAG);
                }
                results.push(state);
                continue;
            }

            let instr = match state.next_instruction() {
                None => {
                    results.push(state);
                    continue;
                }
                Some(instr) => instr,
            };
            if self.config.verbose {
                debug!("{} instruction: {}", LOG_TAG, instr.op.mnemonic());
            }

            let mut ctx = StepContext {
                config: &self.config,
                warned_opcodes: &mut self.warned_opcodes,
            };
            let successors = step(state, &instr, &mut ctx);
            if self.config.verbose {
                debug!("{} produced {} successor state(s)", LOG_TAG, successors.len());
            }
            for successor in successors {
                self.push_state(successor);
            }
        }

        // whatever is still queued was starved by the budget
        let mut unfinished = Vec::new();
        while let Some(item) = self.queue.pop() {
            let mut state = item.state;
            state.failure = Some(SymError::BudgetExceeded);
            unfinished.push(state);
        }

        if self.config.verbose {
            info!(
                "{} done: {} steps, {} terminal state(s), {} unfinished",
                LOG_TAG,
                self.steps,
                results.len(),
                unfinished.len()
            );
            for (index, state) in results.iter().enumerate() {
                info!("{} state {}: pc {}", LOG_TAG, index, state.path_condition);
                if let Some(value) = state.return_value() {
                    info!("{}   returns {}", LOG_TAG, value);
                }
            }
        }

        Analysis {
            results,
            unfinished,
            steps: self.steps,
        }
    }

    fn push_state(&mut self, state: SymState) {
        let priority = self.selector.calculate_priority(&state);
        self.seq += 1;
        self.queue.push(QueueItem {
            priority,
            seq: self.seq,
            state,
        });
    }
}

/// Library entry point: run the named function of `program` to exhaustion
/// (or budget) and hand back every collected terminal state
pub fn analyze(
    program: &SsaProgram,
    function_name: &str,
    config: &SymConfig,
) -> SymResult<Analysis> {
    let function = program
        .get_function(function_name)
        .ok_or_else(|| SymError::FunctionNotFound(function_name.to_owned()))?;
    let mut scheduler = SymScheduler::new(config.clone());
    Ok(scheduler.explore(function))
}
