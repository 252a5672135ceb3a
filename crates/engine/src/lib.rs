// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The execution half of the pipeline: statement lists become a
//! dependency DAG, the DAG becomes stripe-length loops, loops become
//! interpretable kernels, and an executor drives them over one group
//! of stripes at a time, folding results into a tally.

pub mod action;
pub mod dag;
pub mod executor;
pub mod kernel;
pub mod query;

pub use action::{Action, Tally};
pub use dag::{DependencyGraph, Loop};
pub use executor::{Executor, Progress};
pub use femtocode_type::Result;
pub use kernel::{CompiledLoop, Workspace};
pub use query::{CompiledQuery, Query, compile};
