// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Payloads of the cache-master ↔ compute-worker RPC. Only the shapes
//! live here; framing and transport are external collaborators. A
//! heartbeat is the `null` request, and every request is answered with
//! `null` — a worker that stops answering is marked dead and its
//! groups are reassigned deterministically (see [`crate::assign`]).

use femtocode_engine::Query;
use serde::{Deserialize, Serialize};

/// The request body: `None` is the heartbeat.
pub type WorkerRequest = Option<WorkerCommand>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkerCommand {
	AssignExecutor {
		query: Query,
		groupids: Vec<u64>,
	},
	CancelQuery {
		#[serde(rename = "queryId")]
		query_id: String,
	},
}
