// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{fmt, str::FromStr};

use crate::{sym_visitor::ComplexityVisitor, sym_vm_types::SymState};

/// Assigns a priority to a freshly produced state; higher values are
/// dequeued sooner. Selectors may be stateful but are used serially by a
/// single scheduler.
pub trait PathSelector {
    fn calculate_priority(&mut self, state: &SymState) -> i64;
}

/// Newest state first: a monotonically increasing counter
pub struct DfsSelector {
    counter: i64,
}

impl DfsSelector {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for DfsSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSelector for DfsSelector {
    fn calculate_priority(&mut self, _state: &SymState) -> i64 {
        self.counter += 1;
        self.counter
    }
}

/// Oldest state first: a monotonically decreasing counter
pub struct BfsSelector {
    counter: i64,
}

impl BfsSelector {
    pub fn new() -> Self {
        Self { counter: 0 }
    }
}

impl Default for BfsSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl PathSelector for BfsSelector {
    fn calculate_priority(&mut self, _state: &SymState) -> i64 {
        self.counter -= 1;
        self.counter
    }
}

/// Uniformly random priority from a seeded generator, so a fixed seed keeps
/// exploration reproducible
pub struct RandomSelector {
    rng: StdRng,
}

impl RandomSelector {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl PathSelector for RandomSelector {
    fn calculate_priority(&mut self, _state: &SymState) -> i64 {
        self.rng.gen::<i32>() as i64
    }
}

/// Deeper states first: instruction index plus a call-stack weight
pub struct DepthSelector;

impl PathSelector for DepthSelector {
    fn calculate_priority(&mut self, state: &SymState) -> i64 {
        state.pc.instr_index as i64 + 1000 * state.call_stack.len() as i64
    }
}

/// States with the more involved path condition first, measured as the node
/// count of the condition
pub struct ComplexitySelector;

impl PathSelector for ComplexitySelector {
    fn calculate_priority(&mut self, state: &SymState) -> i64 {
        ComplexityVisitor::measure(&state.path_condition) as i64
    }
}

/// Configurable choice of strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Dfs,
    Bfs,
    Random,
    Depth,
    Complexity,
}

impl SelectorKind {
    pub fn into_selector(self, random_seed: u64) -> Box<dyn PathSelector> {
        match self {
            SelectorKind::Dfs => Box::new(DfsSelector::new()),
            SelectorKind::Bfs => Box::new(BfsSelector::new()),
            SelectorKind::Random => Box::new(RandomSelector::new(random_seed)),
            SelectorKind::Depth => Box::new(DepthSelector),
            SelectorKind::Complexity => Box::new(ComplexitySelector),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            SelectorKind::Dfs => "dfs",
            SelectorKind::Bfs => "bfs",
            SelectorKind::Random => "random",
            SelectorKind::Depth => "depth",
            SelectorKind::Complexity => "complexity",
        };
        write!(f, "{}", repr)
    }
}

impl FromStr for SelectorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dfs" => Ok(SelectorKind::Dfs),
            "bfs" => Ok(SelectorKind::Bfs),
            "random" => Ok(SelectorKind::Random),
            "depth" => Ok(SelectorKind::Depth),
            "complexity" => Ok(SelectorKind::Complexity),
            other => Err(format!("unknown path selector: {}", other)),
        }
    }
}
