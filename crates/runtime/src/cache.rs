// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The need/want cache. `need` holds occupants some work item still
//! claims — unordered, never evicted. `want` holds free occupants
//! retained in least-recently-used order; they are what eviction
//! spends. Admission picks the waiting item costing the fewest
//! evictions, FIFO on ties, and waits when even evicting everything
//! would not fit. The cache itself is owned by the master thread;
//! only per-occupant locks are ever taken here.

use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
};

use femtocode_type::{ColumnName, Dtype};
use tracing::debug;

use crate::{
	master::RunningQuery,
	occupant::{Occupant, StripeAddress, WorkItem},
};

/// One column's worth of bytes a work item needs resident.
#[derive(Debug, Clone, PartialEq)]
pub struct StripeRequest {
	pub column: ColumnName,
	pub bytes: usize,
	pub dtype: Dtype,
	/// The physical file backing the stripe, when the catalog knows.
	pub file: Option<String>,
}

/// A query × group pair waiting for buffer space.
pub struct PendingItem {
	pub query: Arc<RunningQuery>,
	pub group: u64,
	pub requests: Vec<StripeRequest>,
}

/// A successful admission: the work item plus the freshly allocated
/// occupants a fetcher must fill (with their backing files).
pub struct Reservation {
	pub item: WorkItem,
	pub to_fetch: Vec<(Arc<Occupant>, Option<String>)>,
}

pub struct StripeCache {
	limit_bytes: usize,
	need: HashMap<StripeAddress, Arc<Occupant>>,
	/// LRU-ordered: front is evicted first.
	want: VecDeque<Arc<Occupant>>,
}

impl StripeCache {
	pub fn new(limit_bytes: usize) -> Self {
		Self {
			limit_bytes,
			need: HashMap::new(),
			want: VecDeque::new(),
		}
	}

	pub fn need_bytes(&self) -> usize {
		self.need.values().map(|occupant| occupant.total_bytes).sum()
	}

	pub fn want_bytes(&self) -> usize {
		self.want.iter().map(|occupant| occupant.total_bytes).sum()
	}

	pub fn used_bytes(&self) -> usize {
		self.need_bytes() + self.want_bytes()
	}

	pub fn holds(&self, address: &StripeAddress) -> bool {
		self.need.contains_key(address) || self.want.iter().any(|o| &o.address == address)
	}

	/// Step 1 of admission: occupants nobody claims any more move from
	/// `need` to the most-recently-used end of `want`.
	pub fn migrate(&mut self) {
		let released: Vec<StripeAddress> = self
			.need
			.iter()
			.filter(|(_, occupant)| occupant.need_count() == 0)
			.map(|(address, _)| address.clone())
			.collect();
		for address in released {
			if let Some(occupant) = self.need.remove(&address) {
				self.want.push_back(occupant);
			}
		}
	}

	/// How many `want` evictions admitting these requests would cost;
	/// `None` when the item cannot fit at all.
	fn eviction_cost(&self, requests: &[StripeRequest], group: u64) -> Option<usize> {
		let new_bytes: usize = requests
			.iter()
			.filter(|request| {
				!self.holds(&StripeAddress {
					column: request.column.clone(),
					group,
				})
			})
			.map(|request| request.bytes)
			.sum();
		let mut free = self.limit_bytes.saturating_sub(self.used_bytes());
		if free >= new_bytes {
			return Some(0);
		}
		let mut evictions = 0;
		for occupant in &self.want {
			free += occupant.total_bytes;
			evictions += 1;
			if free >= new_bytes {
				return Some(evictions);
			}
		}
		None
	}

	/// Steps 2–4 of admission: pick the cheapest waiting item (FIFO on
	/// ties), evict, claim or allocate its occupants, and attach them.
	pub fn maybe_reserve(&mut self, waiting: &mut VecDeque<PendingItem>) -> Option<Reservation> {
		self.migrate();

		let mut best: Option<(usize, usize)> = None;
		for (at, pending) in waiting.iter().enumerate() {
			if let Some(cost) = self.eviction_cost(&pending.requests, pending.group) {
				let better = match best {
					None => true,
					Some((_, best_cost)) => cost < best_cost,
				};
				if better {
					best = Some((at, cost));
				}
				if cost == 0 {
					break;
				}
			}
		}
		let (at, cost) = best?;
		let pending = waiting.remove(at).expect("index in range");

		for _ in 0..cost {
			if let Some(evicted) = self.want.pop_front() {
				debug!(address = %evicted.address, bytes = evicted.total_bytes, "evicting");
			}
		}

		let mut occupants = Vec::with_capacity(pending.requests.len());
		let mut to_fetch = Vec::new();
		for request in &pending.requests {
			let address = StripeAddress {
				column: request.column.clone(),
				group: pending.group,
			};
			if let Some(existing) = self.need.get(&address) {
				existing.acquire();
				occupants.push(Arc::clone(existing));
				continue;
			}
			if let Some(at) = self.want.iter().position(|o| o.address == address) {
				let promoted = self.want.remove(at).expect("index in range");
				promoted.acquire();
				self.need.insert(address, Arc::clone(&promoted));
				occupants.push(promoted);
				continue;
			}
			let fresh = Occupant::new(address.clone(), request.bytes, request.dtype);
			self.need.insert(address, Arc::clone(&fresh));
			to_fetch.push((Arc::clone(&fresh), request.file.clone()));
			occupants.push(fresh);
		}

		Some(Reservation {
			item: WorkItem {
				query: pending.query,
				group: pending.group,
				occupants,
			},
			to_fetch,
		})
	}
}

#[cfg(test)]
mod tests {
	use femtocode_columnar::Dataset;
	use femtocode_engine::{Action, Executor, compile};
	use femtocode_lang::{Expr, FunctionTable};
	use femtocode_type::Schema;

	use super::*;
	use crate::future::QueryFuture;

	fn query() -> Arc<RunningQuery> {
		let dataset =
			Dataset::from_schema("cache", [("x", Schema::real_all())], None).unwrap();
		let compiled = compile(
			&Expr::reference("x"),
			&dataset,
			Action::Sum,
			&FunctionTable::standard(),
		)
		.unwrap();
		Arc::new(RunningQuery {
			id: "test".to_string(),
			executor: Arc::new(Executor::new(compiled)),
			future: Arc::new(QueryFuture::new()),
		})
	}

	fn request(column: &str, bytes: usize) -> StripeRequest {
		StripeRequest {
			column: column.parse().unwrap(),
			bytes,
			dtype: Dtype::Float64,
			file: None,
		}
	}

	fn pending(query: &Arc<RunningQuery>, group: u64, requests: Vec<StripeRequest>) -> PendingItem {
		PendingItem {
			query: Arc::clone(query),
			group,
			requests,
		}
	}

	#[test]
	fn test_admission_and_sharing() {
		let query = query();
		let mut cache = StripeCache::new(1024);
		let mut waiting = VecDeque::new();
		waiting.push_back(pending(&query, 0, vec![request("x", 256)]));

		let reservation = cache.maybe_reserve(&mut waiting).unwrap();
		assert_eq!(reservation.to_fetch.len(), 1);
		assert_eq!(cache.need_bytes(), 256);

		// a second item over the same stripe shares the occupant
		waiting.push_back(pending(&query, 0, vec![request("x", 256)]));
		let second = cache.maybe_reserve(&mut waiting).unwrap();
		assert!(second.to_fetch.is_empty());
		assert_eq!(second.item.occupants[0].need_count(), 2);
		assert_eq!(cache.need_bytes(), 256);
		reservation.item.release_all();
		second.item.release_all();
	}

	#[test]
	fn test_need_is_never_evicted() {
		// with the working set within the limit, no needed
		// occupant is evicted; want evicts LRU-first
		let query = query();
		let mut cache = StripeCache::new(512);
		let mut waiting = VecDeque::new();

		waiting.push_back(pending(&query, 0, vec![request("x", 256)]));
		let held = cache.maybe_reserve(&mut waiting).unwrap();

		waiting.push_back(pending(&query, 1, vec![request("x", 256)]));
		let released = cache.maybe_reserve(&mut waiting).unwrap();
		released.item.release_all();

		// group 1's occupant is free; group 2 needs its space
		waiting.push_back(pending(&query, 2, vec![request("x", 512)]));
		// group 0 is still needed: cannot fit yet
		assert!(cache.maybe_reserve(&mut waiting).is_none());
		assert!(cache.holds(&held.item.occupants[0].address));

		// once group 0 is released, eviction makes room
		held.item.release_all();
		let admitted = cache.maybe_reserve(&mut waiting).unwrap();
		assert_eq!(admitted.item.group, 2);
		assert_eq!(cache.used_bytes(), 512);
	}

	#[test]
	fn test_cheapest_item_wins_with_fifo_ties() {
		let query = query();
		let mut cache = StripeCache::new(512);
		let mut waiting = VecDeque::new();

		// fill and free a 256-byte stripe so want holds it
		waiting.push_back(pending(&query, 0, vec![request("x", 256)]));
		cache.maybe_reserve(&mut waiting).unwrap().item.release_all();

		// first in line needs an eviction, second fits for free
		waiting.push_back(pending(&query, 1, vec![request("x", 512)]));
		waiting.push_back(pending(&query, 2, vec![request("x", 256)]));
		let admitted = cache.maybe_reserve(&mut waiting).unwrap();
		assert_eq!(admitted.item.group, 2);
		// the expensive one is still waiting
		assert_eq!(waiting.len(), 1);
		assert_eq!(waiting[0].group, 1);
	}

	#[test]
	fn test_oversized_item_waits_forever() {
		let query = query();
		let mut cache = StripeCache::new(128);
		let mut waiting = VecDeque::new();
		waiting.push_back(pending(&query, 0, vec![request("x", 4096)]));
		assert!(cache.maybe_reserve(&mut waiting).is_none());
		assert_eq!(waiting.len(), 1);
	}
}
