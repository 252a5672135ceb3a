// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The cache / fetch / compute runtime: one cooperative cache master,
//! a pool of worker threads, and short-lived fetchers filling reserved
//! stripe buffers. Queries are admitted by the master, grouped into
//! per-group work items, and folded into tallies as groups complete in
//! whatever order the workers reach them.

pub mod assign;
pub mod cache;
pub mod fetch;
pub mod future;
pub mod master;
pub mod message;
pub mod occupant;
pub mod worker;

pub use assign::assign;
pub use cache::{PendingItem, Reservation, StripeCache, StripeRequest};
pub use femtocode_type::Result;
pub use fetch::{FetchTask, StripeSource, spawn_fetcher};
pub use future::{QueryFuture, QueryStatus, ResultUpdate, UpdateData};
pub use master::{CacheMaster, MasterConfig, RunningQuery};
pub use message::WorkerCommand;
pub use occupant::{Occupant, StripeAddress, WorkItem};
