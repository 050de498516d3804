// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use once_cell::sync::Lazy;
use std::env;

use crate::sym_selector::SelectorKind;

/// Global step budget across one exploration
pub const DEFAULT_MAX_STEPS: usize = 10_000;

/// How many times a single block may be re-entered by a jump
pub const DEFAULT_MAX_PER_BLOCK_UNROLL: u32 = 10;

/// Cumulative jump re-entries across a whole path
pub const DEFAULT_MAX_TOTAL_UNROLL: u32 = 100;

/// Environment switch for per-step diagnostics
const VERBOSE_ENV_VAR: &str = "SSA_SYMEXEC_VERBOSE";

static ENV_VERBOSE: Lazy<bool> = Lazy::new(|| env::var_os(VERBOSE_ENV_VAR).is_some());

pub fn is_in_verbose_mode() -> bool {
    *ENV_VERBOSE
}

/// Knobs of one exploration run
#[derive(Debug, Clone)]
pub struct SymConfig {
    /// Path-selection strategy driving the priority queue
    pub selector: SelectorKind,
    pub max_steps: usize,
    pub max_per_block_unroll: u32,
    pub max_total_unroll: u32,
    /// Emit per-step diagnostics through the `log` facade
    pub verbose: bool,
    /// Refuse SSA shapes without symbolic semantics instead of passing over
    /// them (bitwise and shift operators, float constants)
    pub strict_ssa: bool,
    /// Seed for the Random selector, fixed so runs stay reproducible
    pub random_seed: u64,
}

impl Default for SymConfig {
    fn default() -> Self {
        Self {
            selector: SelectorKind::Dfs,
            max_steps: DEFAULT_MAX_STEPS,
            max_per_block_unroll: DEFAULT_MAX_PER_BLOCK_UNROLL,
            max_total_unroll: DEFAULT_MAX_TOTAL_UNROLL,
            verbose: is_in_verbose_mode(),
            strict_ssa: false,
            random_seed: 0,
        }
    }
}
