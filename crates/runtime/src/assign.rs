// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Deterministic group placement. A (query, group) pair probes the
//! stable worker list at `(groupid · W^d + offset) mod W` for growing
//! depth `d` until it lands on a survivor; because the probe sequence
//! never looks at the survivor set, shrinking that set can only move
//! groups whose worker actually died. Past the point where the power
//! term collapses (mod W it does so immediately after d = 0), the
//! probe walks the ring linearly so every worker is eventually tried.

use std::collections::BTreeSet;

use xxhash_rust::xxh3::xxh3_64;

/// The per-query offset: `|hash(query)|`.
pub fn query_offset(query_id: &str) -> u64 {
	xxh3_64(query_id.as_bytes())
}

/// Place one group on a surviving worker; `None` when nobody survives.
pub fn assign<'a>(
	offset: u64,
	groupid: u64,
	workers: &'a [String],
	survivors: &BTreeSet<String>,
) -> Option<&'a String> {
	if workers.is_empty() {
		return None;
	}
	let w = workers.len() as u64;

	let mut probes: Vec<usize> = Vec::with_capacity(workers.len() + 2);
	for d in 0..2u32 {
		let power = (w as u128).pow(d);
		let index = ((groupid as u128 * power + offset as u128) % w as u128) as usize;
		if !probes.contains(&index) {
			probes.push(index);
		}
	}
	// linear walk of the ring from the last distinct probe
	let start = *probes.last().expect("at least one probe");
	for step in 1..workers.len() {
		let index = (start + step) % workers.len();
		if !probes.contains(&index) {
			probes.push(index);
		}
	}

	probes.into_iter().map(|index| &workers[index]).find(|worker| survivors.contains(*worker))
}

/// Place every group of a query at once.
pub fn assign_all<'a>(
	offset: u64,
	groupids: &[u64],
	workers: &'a [String],
	survivors: &BTreeSet<String>,
) -> Vec<(u64, Option<&'a String>)> {
	groupids.iter().map(|&groupid| (groupid, assign(offset, groupid, workers, survivors))).collect()
}
