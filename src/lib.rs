// Copyright (c) The Diem Core Contributors
// SPDX-License-Identifier: Apache-2.0

pub mod status;

pub mod sym_typing;

pub mod sym_exp;

pub mod sym_visitor;

pub mod sym_simplify;

pub mod sym_heap;

pub mod ssa_form;

pub mod sym_vm_types;

pub mod sym_vm;

pub mod sym_selector;

pub mod sym_scheduler;

pub mod sym_smtlib;

pub mod sym_config;
