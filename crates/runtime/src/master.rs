// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The cache master: one thread owning the stripe cache outright. It
//! admits queries from the submission queue, expands them into one
//! work item per dataset group, reserves buffers with need/want
//! eviction, hands fresh occupants to transient fetchers, polls the
//! loading list every millisecond, and dispatches ready items to the
//! worker queue. Fetch failures surface here and cancel the query.

use std::{
	collections::VecDeque,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread::{self, JoinHandle},
	time::Duration,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use femtocode_columnar::{Dataset, Group};
use femtocode_engine::{CompiledQuery, Executor};
use femtocode_type::{ColumnName, Dtype, Result, internal_error};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::{
	cache::{PendingItem, StripeCache, StripeRequest},
	fetch::{FetchTask, StripeSource, spawn_fetcher},
	future::QueryFuture,
	occupant::WorkItem,
	worker::start_workers,
};

/// A submitted query as the runtime tracks it.
pub struct RunningQuery {
	pub id: String,
	pub executor: Arc<Executor>,
	pub future: Arc<QueryFuture>,
}

impl RunningQuery {
	pub fn new(compiled: CompiledQuery) -> Arc<Self> {
		let wire = serde_json::to_string(&compiled.to_wire()).unwrap_or_default();
		let id = format!("{:016x}", xxh3_64(wire.as_bytes()));
		Arc::new(Self {
			id,
			executor: Arc::new(Executor::new(compiled)),
			future: Arc::new(QueryFuture::new()),
		})
	}

	/// The per-query assignment offset, `|hash(query)|`.
	pub fn offset(&self) -> u64 {
		crate::assign::query_offset(&self.id)
	}

	pub fn cancel(&self) {
		self.executor.cancel();
		self.future.cancel();
	}
}

#[derive(Debug, Clone)]
pub struct MasterConfig {
	pub limit_bytes: usize,
	pub workers: usize,
}

impl Default for MasterConfig {
	fn default() -> Self {
		Self {
			limit_bytes: 256 * 1024 * 1024,
			workers: num_cpus::get(),
		}
	}
}

pub struct CacheMaster {
	submissions: Sender<Arc<RunningQuery>>,
	shutdown: Arc<AtomicBool>,
	master: Option<JoinHandle<()>>,
	workers: Vec<JoinHandle<()>>,
}

impl CacheMaster {
	pub fn start(config: MasterConfig, source: Arc<dyn StripeSource>) -> Self {
		let (submissions, inbound) = unbounded();
		let (work, work_queue) = unbounded();
		let shutdown = Arc::new(AtomicBool::new(false));

		let workers = start_workers(config.workers, work_queue);
		let flag = Arc::clone(&shutdown);
		let master = thread::Builder::new()
			.name("femtocode-cache-master".to_string())
			.spawn(move || master_loop(config, source, inbound, work, flag))
			.expect("cache master thread spawn");

		info!("cache master started");
		Self {
			submissions,
			shutdown,
			master: Some(master),
			workers,
		}
	}

	pub fn submit(&self, query: Arc<RunningQuery>) {
		query.future.loading();
		let _ = self.submissions.send(query);
	}

	/// Stop accepting work, drain what is in flight, and join every
	/// thread.
	pub fn shutdown(mut self) {
		self.shutdown.store(true, Ordering::SeqCst);
		if let Some(master) = self.master.take() {
			let _ = master.join();
		}
		for worker in self.workers.drain(..) {
			let _ = worker.join();
		}
	}
}

fn master_loop(
	config: MasterConfig,
	source: Arc<dyn StripeSource>,
	inbound: Receiver<Arc<RunningQuery>>,
	work: Sender<WorkItem>,
	shutdown: Arc<AtomicBool>,
) {
	let mut cache = StripeCache::new(config.limit_bytes);
	let mut waiting: VecDeque<PendingItem> = VecDeque::new();
	let mut loading: Vec<WorkItem> = Vec::new();

	loop {
		// admit new queries, one work item per group
		while let Ok(query) = inbound.try_recv() {
			match expand(&query) {
				Ok(items) => {
					debug!(query = %query.id, groups = items.len(), "query admitted");
					waiting.extend(items);
				}
				Err(error) => {
					warn!(query = %query.id, %error, "query rejected");
					query.executor.fail(error);
					query.future.update(&query.executor.progress());
				}
			}
		}

		// cancelled queries drop their queued work before reservation
		waiting.retain(|pending| !pending.query.executor.cancelled());

		// reserve buffers and start fetchers for fresh occupants
		while let Some(reservation) = cache.maybe_reserve(&mut waiting) {
			if !reservation.to_fetch.is_empty() {
				let tasks: Vec<FetchTask> = reservation
					.to_fetch
					.into_iter()
					.map(|(occupant, file)| FetchTask {
						occupant,
						file,
					})
					.collect();
				// transient; detached by dropping the handle
				let _ = spawn_fetcher(Arc::clone(&source), tasks);
			}
			loading.push(reservation.item);
		}

		// poll the loading list
		let mut still_loading = Vec::with_capacity(loading.len());
		for item in loading.drain(..) {
			if item.query.executor.cancelled() {
				item.release_all();
				item.query.future.update(&item.query.executor.progress());
				continue;
			}
			if let Some(failure) = item.failure() {
				warn!(query = %item.query.id, group = item.group, %failure, "fetch failed");
				item.query.executor.fail(failure);
				item.query.future.update(&item.query.executor.progress());
				item.release_all();
				continue;
			}
			if item.ready() {
				item.query.executor.mark_loaded(item.group);
				if work.send(item).is_err() {
					return;
				}
			} else {
				still_loading.push(item);
			}
		}
		loading = still_loading;

		if shutdown.load(Ordering::SeqCst)
			&& waiting.is_empty()
			&& loading.is_empty()
			&& inbound.is_empty()
		{
			break;
		}

		thread::sleep(Duration::from_millis(1));
	}
	// dropping `work` lets the workers drain and exit
}

/// One pending item per dataset group, with byte counts and file
/// locations resolved from the group's segments.
fn expand(query: &Arc<RunningQuery>) -> Result<Vec<PendingItem>> {
	let dataset = &query.executor.query.dataset;
	let mut items = Vec::with_capacity(dataset.groups.len());
	for group in &dataset.groups {
		let mut requests = Vec::new();
		for column in query.executor.query.required() {
			requests.push(request_for(dataset, group, column)?);
		}
		items.push(PendingItem {
			query: Arc::clone(query),
			group: group.id,
			requests,
		});
	}
	Ok(items)
}

fn parse_dtype(name: &str) -> Result<Dtype> {
	match name {
		"int64" => Ok(Dtype::Int64),
		"float64" => Ok(Dtype::Float64),
		"uint8" => Ok(Dtype::UInt8),
		other => Err(internal_error!("unknown dataType '{}'", other)),
	}
}

/// Resolve one column's stripe size and file. A size column has no
/// segment of its own: it derives both from the data column it is the
/// sidecar of — that mapping belongs to the fetch path, not the cache.
fn request_for(dataset: &Dataset, group: &Group, column: &ColumnName) -> Result<StripeRequest> {
	if let Some(descriptor) = dataset.columns.get(column) {
		if !column.is_size() {
			let segment = group
				.segments
				.get(column)
				.ok_or_else(|| internal_error!("group {} lacks segment for '{}'", group.id, column))?;
			let dtype = parse_dtype(&descriptor.data_type)?;
			let file = segment
				.files
				.as_ref()
				.and_then(|files| files.first().cloned())
				.or_else(|| group.files.first().cloned());
			return Ok(StripeRequest {
				column: column.clone(),
				bytes: segment.data_length as usize * dtype.width(),
				dtype,
				file,
			});
		}
	}

	// size sidecar: find a data column it describes
	let owner = dataset
		.columns
		.iter()
		.find(|(_, descriptor)| descriptor.size.as_ref() == Some(column))
		.map(|(name, _)| name.clone())
		.ok_or_else(|| internal_error!("size column '{}' has no owning data column", column))?;
	let segment = group
		.segments
		.get(&owner)
		.ok_or_else(|| internal_error!("group {} lacks segment for '{}'", group.id, owner))?;
	let size_length = segment
		.size_length
		.ok_or_else(|| internal_error!("segment '{}' has no size length", owner))?;
	let file = segment
		.files
		.as_ref()
		.and_then(|files| files.first().cloned())
		.or_else(|| group.files.first().cloned());
	Ok(StripeRequest {
		column: column.clone(),
		bytes: size_length as usize * Dtype::Int64.width(),
		dtype: Dtype::Int64,
		file,
	})
}
