// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The worker pool: N threads blocking on the shared work queue.
//! Workers check cancellation before computing, decode their
//! occupants' stripes, run the executor over one group, and push the
//! resulting progress to the query's future. Kernel failures travel
//! through the executor's lock as data; a worker thread never unwinds
//! across the queue.

use std::{
	collections::BTreeMap,
	thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use femtocode_type::Result;
use tracing::{debug, warn};

use crate::occupant::WorkItem;

pub fn start_workers(count: usize, queue: Receiver<WorkItem>) -> Vec<JoinHandle<()>> {
	(0..count.max(1))
		.map(|index| {
			let queue = queue.clone();
			thread::Builder::new()
				.name(format!("femtocode-worker-{}", index))
				.spawn(move || worker_loop(queue))
				.expect("worker thread spawn")
		})
		.collect()
}

fn worker_loop(queue: Receiver<WorkItem>) {
	while let Ok(item) = queue.recv() {
		let executor = item.executor();

		if executor.cancelled() {
			debug!(query = %item.query.id, group = item.group, "skipping cancelled work");
			item.release_all();
			item.query.future.update(&executor.progress());
			continue;
		}

		let outcome = compute(&item);
		if let Err(error) = outcome {
			warn!(query = %item.query.id, group = item.group, %error, "group failed");
			executor.fail(error);
		}
		item.release_all();
		item.query.future.update(&executor.progress());
	}
}

fn compute(item: &WorkItem) -> Result<()> {
	let executor = item.executor();
	let mut inarrays = BTreeMap::new();
	for occupant in &item.occupants {
		inarrays.insert(occupant.address.column.clone(), occupant.to_array()?);
	}
	let num_entries = executor.query.dataset.group(item.group)?.num_entries as usize;
	executor.run(&inarrays, item.group, num_entries)?;
	Ok(())
}
