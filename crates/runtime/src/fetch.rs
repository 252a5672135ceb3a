// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Fetchers: short-lived threads the cache master starts with the
//! freshly allocated occupants of one work item. The storage backend
//! itself lives behind [`StripeSource`] — local disk, an object store,
//! a remote tree store all present the same byte-stripe interface.
//! The fetcher's contract: group occupants by physical file, one
//! sequential pass per file, fill each occupant until full, and record
//! any failure under the occupant's lock instead of unwinding.

use std::{
	collections::BTreeMap,
	fs,
	path::PathBuf,
	sync::Arc,
	thread::{self, JoinHandle},
};

use femtocode_type::{ColumnName, Result, error::Diagnostic};
use tracing::{debug, warn};

use crate::occupant::Occupant;

/// Fill-sized chunks: `fill` is called repeatedly, never all at once.
const CHUNK_BYTES: usize = 64 * 1024;

/// The byte-stripe interface a storage backend presents.
pub trait StripeSource: Send + Sync + 'static {
	fn read(&self, column: &ColumnName, group: u64) -> Result<Vec<u8>>;
}

/// One occupant to fill plus the physical file backing it (size
/// columns inherit the file of the data column they describe).
pub struct FetchTask {
	pub occupant: Arc<Occupant>,
	pub file: Option<String>,
}

fn fetch_failure(message: String) -> femtocode_type::Error {
	Diagnostic::new("FETCH_001", message).with_label("stripe fetch failed").into()
}

/// Run a batch of fetch tasks on a transient thread.
pub fn spawn_fetcher(source: Arc<dyn StripeSource>, tasks: Vec<FetchTask>) -> JoinHandle<()> {
	thread::Builder::new()
		.name("femtocode-fetcher".to_string())
		.spawn(move || run_fetcher(source, tasks))
		.expect("fetcher thread spawn")
}

fn run_fetcher(source: Arc<dyn StripeSource>, tasks: Vec<FetchTask>) {
	// one sequential pass per physical file
	let mut by_file: BTreeMap<Option<String>, Vec<&FetchTask>> = BTreeMap::new();
	for task in &tasks {
		by_file.entry(task.file.clone()).or_default().push(task);
	}
	for (file, batch) in by_file {
		debug!(file = file.as_deref().unwrap_or("<direct>"), stripes = batch.len(), "fetch pass");
		for task in batch {
			let occupant = &task.occupant;
			match source.read(&occupant.address.column, occupant.address.group) {
				Ok(bytes) => {
					if bytes.len() != occupant.total_bytes {
						occupant.fail(fetch_failure(format!(
							"stripe {} is {} bytes, expected {}",
							occupant.address,
							bytes.len(),
							occupant.total_bytes
						)));
						continue;
					}
					for chunk in bytes.chunks(CHUNK_BYTES.max(1)) {
						if occupant.fill(chunk).is_err() {
							break;
						}
					}
				}
				Err(error) => {
					warn!(address = %occupant.address, %error, "fetch failed");
					occupant.fail(error);
				}
			}
		}
	}
}

/// Stripes as flat files under one directory, named
/// `<column>.<group>.stripe`.
pub struct DirectorySource {
	root: PathBuf,
}

impl DirectorySource {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
		}
	}

	pub fn path_of(&self, column: &ColumnName, group: u64) -> PathBuf {
		self.root.join(format!("{}.{}.stripe", column, group))
	}
}

impl StripeSource for DirectorySource {
	fn read(&self, column: &ColumnName, group: u64) -> Result<Vec<u8>> {
		let path = self.path_of(column, group);
		fs::read(&path).map_err(|error| {
			fetch_failure(format!("cannot read stripe {}: {}", path.display(), error))
		})
	}
}

#[cfg(test)]
mod tests {
	use femtocode_type::Dtype;

	use super::*;
	use crate::occupant::StripeAddress;

	struct FixedSource {
		bytes: Vec<u8>,
	}

	impl StripeSource for FixedSource {
		fn read(&self, _column: &ColumnName, _group: u64) -> Result<Vec<u8>> {
			Ok(self.bytes.clone())
		}
	}

	struct BrokenSource;

	impl StripeSource for BrokenSource {
		fn read(&self, column: &ColumnName, _group: u64) -> Result<Vec<u8>> {
			Err(fetch_failure(format!("no such column '{}'", column)))
		}
	}

	fn occupant(bytes: usize) -> Arc<Occupant> {
		Occupant::new(
			StripeAddress {
				column: "x".parse().unwrap(),
				group: 0,
			},
			bytes,
			Dtype::Int64,
		)
	}

	#[test]
	fn test_fetcher_fills_to_completion() {
		let payload: Vec<u8> = 1i64.to_le_bytes().into_iter().chain(2i64.to_le_bytes()).collect();
		let source = Arc::new(FixedSource {
			bytes: payload,
		});
		let target = occupant(16);
		let handle = spawn_fetcher(source, vec![FetchTask {
			occupant: Arc::clone(&target),
			file: Some("part0".to_string()),
		}]);
		handle.join().unwrap();
		assert!(target.ready());
		assert!(target.failure().is_none());
	}

	#[test]
	fn test_fetch_failure_is_recorded_not_thrown() {
		let target = occupant(8);
		let handle = spawn_fetcher(Arc::new(BrokenSource), vec![FetchTask {
			occupant: Arc::clone(&target),
			file: None,
		}]);
		handle.join().unwrap();
		assert!(!target.ready());
		let failure = target.failure().unwrap();
		assert_eq!(failure.code(), "FETCH_001");
	}

	#[test]
	fn test_wrong_length_is_a_failure() {
		let source = Arc::new(FixedSource {
			bytes: vec![0u8; 4],
		});
		let target = occupant(8);
		spawn_fetcher(source, vec![FetchTask {
			occupant: Arc::clone(&target),
			file: None,
		}])
		.join()
		.unwrap();
		assert!(target.failure().is_some());
	}
}
