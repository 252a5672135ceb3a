// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Cache occupants: one reserved stripe buffer plus its bookkeeping.
//! The occupant exclusively owns its raw bytes; everything mutable —
//! the fill watermark, the reference count, a recorded fetch failure —
//! sits behind one lock that fetchers, workers and the master all take
//! only briefly. Errors cross threads as data here, never as panics.

use std::{fmt, sync::Arc};

use femtocode_columnar::ArrayBuffer;
use femtocode_engine::Executor;
use femtocode_type::{ColumnName, Dtype, Error, Result, internal_error};
use parking_lot::Mutex;

/// One column's stripe within one group: the unit the cache tracks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StripeAddress {
	pub column: ColumnName,
	pub group: u64,
}

impl fmt::Display for StripeAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}[{}]", self.column, self.group)
	}
}

#[derive(Debug)]
struct OccupantState {
	buffer: Vec<u8>,
	filled: usize,
	need_count: usize,
	failure: Option<Error>,
}

/// A reserved stripe buffer. Created with `need_count == 1`; each
/// additional work item claiming it acquires, each finished work item
/// releases; only an occupant whose count reached zero may be evicted.
#[derive(Debug)]
pub struct Occupant {
	pub address: StripeAddress,
	pub total_bytes: usize,
	pub dtype: Dtype,
	state: Mutex<OccupantState>,
}

impl Occupant {
	pub fn new(address: StripeAddress, total_bytes: usize, dtype: Dtype) -> Arc<Self> {
		Arc::new(Self {
			address,
			total_bytes,
			dtype,
			state: Mutex::new(OccupantState {
				buffer: Vec::with_capacity(total_bytes),
				filled: 0,
				need_count: 1,
				failure: None,
			}),
		})
	}

	/// Append fetched bytes; `filled` only ever advances.
	pub fn fill(&self, bytes: &[u8]) -> Result<()> {
		let mut state = self.state.lock();
		if state.filled + bytes.len() > self.total_bytes {
			let overrun = internal_error!(
				"fetch overruns occupant {}: {} + {} > {}",
				self.address,
				state.filled,
				bytes.len(),
				self.total_bytes
			);
			state.failure = Some(overrun.clone());
			return Err(overrun);
		}
		state.buffer.extend_from_slice(bytes);
		state.filled += bytes.len();
		Ok(())
	}

	pub fn filled_bytes(&self) -> usize {
		self.state.lock().filled
	}

	pub fn ready(&self) -> bool {
		self.state.lock().filled == self.total_bytes
	}

	/// Record a fetch failure under the occupant's lock; the master
	/// reads it under the same lock.
	pub fn fail(&self, error: Error) {
		let mut state = self.state.lock();
		if state.failure.is_none() {
			state.failure = Some(error);
		}
	}

	pub fn failure(&self) -> Option<Error> {
		self.state.lock().failure.clone()
	}

	pub fn need_count(&self) -> usize {
		self.state.lock().need_count
	}

	/// Another work item claims this occupant.
	pub fn acquire(&self) {
		self.state.lock().need_count += 1;
	}

	/// A work item is done with this occupant.
	pub fn release(&self) {
		let mut state = self.state.lock();
		state.need_count = state.need_count.saturating_sub(1);
	}

	/// Decode the filled buffer into a typed stripe.
	pub fn to_array(&self) -> Result<ArrayBuffer> {
		let state = self.state.lock();
		if state.filled != self.total_bytes {
			return Err(internal_error!("occupant {} read before it was filled", self.address));
		}
		Ok(match self.dtype {
			Dtype::Int64 => ArrayBuffer::Int(
				state.buffer.chunks_exact(8).map(|c| i64::from_le_bytes(c.try_into().unwrap())).collect(),
			),
			Dtype::Float64 => ArrayBuffer::Float(
				state.buffer.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect(),
			),
			Dtype::UInt8 => ArrayBuffer::Bytes(state.buffer.clone()),
		})
	}
}

/// One group's worth of work for one query: ready when every attached
/// occupant is full.
pub struct WorkItem {
	pub query: Arc<crate::master::RunningQuery>,
	pub group: u64,
	pub occupants: Vec<Arc<Occupant>>,
}

impl WorkItem {
	pub fn ready(&self) -> bool {
		self.occupants.iter().all(|occupant| occupant.ready())
	}

	pub fn failure(&self) -> Option<Error> {
		self.occupants.iter().find_map(|occupant| occupant.failure())
	}

	pub fn release_all(&self) {
		for occupant in &self.occupants {
			occupant.release();
		}
	}

	pub fn executor(&self) -> &Executor {
		&self.query.executor
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn address(column: &str, group: u64) -> StripeAddress {
		StripeAddress {
			column: column.parse().unwrap(),
			group,
		}
	}

	#[test]
	fn test_fill_is_monotonic_and_bounded() {
		let occupant = Occupant::new(address("x", 0), 16, Dtype::Int64);
		occupant.fill(&1i64.to_le_bytes()).unwrap();
		assert_eq!(occupant.filled_bytes(), 8);
		assert!(!occupant.ready());
		occupant.fill(&2i64.to_le_bytes()).unwrap();
		assert!(occupant.ready());
		assert!(occupant.fill(&[0u8; 8]).is_err());
		assert!(occupant.failure().is_some());
	}

	#[test]
	fn test_need_counting() {
		let occupant = Occupant::new(address("x", 0), 0, Dtype::Int64);
		assert_eq!(occupant.need_count(), 1);
		occupant.acquire();
		assert_eq!(occupant.need_count(), 2);
		occupant.release();
		occupant.release();
		assert_eq!(occupant.need_count(), 0);
	}

	#[test]
	fn test_decode() {
		let occupant = Occupant::new(address("x", 0), 16, Dtype::Float64);
		occupant.fill(&1.5f64.to_le_bytes()).unwrap();
		occupant.fill(&(-2.0f64).to_le_bytes()).unwrap();
		assert_eq!(occupant.to_array().unwrap(), ArrayBuffer::Float(vec![1.5, -2.0]));
	}

	#[test]
	fn test_premature_read_is_an_error() {
		let occupant = Occupant::new(address("x", 0), 8, Dtype::Int64);
		assert!(occupant.to_array().is_err());
	}
}
