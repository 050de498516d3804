// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error kinds surfaced by the engine. A failing path carries its error in
/// the state that produced it; no error kind terminates exploration as a
/// whole. `Internal` is reserved for violated invariants and indicates a bug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymError {
    /// An expression constructor or heap operation violated the typing rules
    #[error("type error: {0}")]
    Type(String),

    /// The state was truncated by the global step budget
    #[error("step budget exceeded")]
    BudgetExceeded,

    /// An SSA shape the interpreter does not model (raised in strict mode)
    #[error("unsupported SSA instruction: {0}")]
    UnsupportedSsa(String),

    /// The SMT translation visitor hit an untranslatable expression
    #[error("translation error: {0}")]
    Translation(String),

    /// The named function does not exist in the program under analysis
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// A broken internal invariant (absent heap id, corrupted counter)
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type SymResult<T> = Result<T, SymError>;
