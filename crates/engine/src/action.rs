// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Actions and tallies. The action is the last word of a query: it
//! initializes an empty tally, folds one subtally per group into it,
//! and finalizes the result. Groups complete in no particular order
//! across workers, so `update` must be commutative and associative —
//! `collect` keeps per-group vectors keyed by group id and only
//! flattens at the end to stay that way.

use std::collections::BTreeMap;

use femtocode_type::{Result, Value, internal_error};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
	Count,
	Sum,
	Min,
	Max,
	Collect,
}

impl Action {
	pub fn initialize(&self) -> Tally {
		match self {
			Action::Count => Tally::Count(0),
			Action::Sum => Tally::Sum(0.0),
			Action::Min => Tally::Min(f64::INFINITY),
			Action::Max => Tally::Max(f64::NEG_INFINITY),
			Action::Collect => Tally::Collect(BTreeMap::new()),
		}
	}

	/// One group's contribution from the final stripe's leaf values
	/// (for `collect`, the assembled per-entry values).
	pub fn subtally(&self, group: u64, leaves: &[f64], values: Vec<Value>) -> Tally {
		match self {
			Action::Count => Tally::Count(leaves.len() as u64),
			Action::Sum => Tally::Sum(leaves.iter().sum()),
			Action::Min => Tally::Min(leaves.iter().cloned().fold(f64::INFINITY, f64::min)),
			Action::Max => Tally::Max(leaves.iter().cloned().fold(f64::NEG_INFINITY, f64::max)),
			Action::Collect => {
				let mut collected = BTreeMap::new();
				collected.insert(group, values);
				Tally::Collect(collected)
			}
		}
	}
}

/// The monoidal accumulator an aggregation action folds groups into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tally {
	Count(u64),
	Sum(f64),
	Min(f64),
	Max(f64),
	Collect(BTreeMap<u64, Vec<Value>>),
}

impl Tally {
	/// Monoidal merge; updating in either order yields the same tally.
	pub fn update(self, other: Tally) -> Result<Tally> {
		match (self, other) {
			(Tally::Count(a), Tally::Count(b)) => Ok(Tally::Count(a + b)),
			(Tally::Sum(a), Tally::Sum(b)) => Ok(Tally::Sum(a + b)),
			(Tally::Min(a), Tally::Min(b)) => Ok(Tally::Min(a.min(b))),
			(Tally::Max(a), Tally::Max(b)) => Ok(Tally::Max(a.max(b))),
			(Tally::Collect(mut a), Tally::Collect(b)) => {
				for (group, values) in b {
					if a.insert(group, values).is_some() {
						return Err(internal_error!("group {} tallied twice", group));
					}
				}
				Ok(Tally::Collect(a))
			}
			(a, b) => Err(internal_error!("cannot merge tallies {:?} and {:?}", a, b)),
		}
	}

	/// The last-mile transformation into a plain value.
	pub fn finalize(self) -> Value {
		match self {
			Tally::Count(n) => Value::Int(n as i64),
			Tally::Sum(v) | Tally::Min(v) | Tally::Max(v) => Value::Float(v),
			Tally::Collect(groups) => {
				Value::List(groups.into_values().flatten().collect())
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_update_is_commutative_and_associative() {
		let parts = [
			Action::Sum.subtally(0, &[1.0, 2.0], Vec::new()),
			Action::Sum.subtally(1, &[3.0], Vec::new()),
			Action::Sum.subtally(2, &[4.0, 5.0], Vec::new()),
		];
		let forward = parts
			.iter()
			.cloned()
			.try_fold(Action::Sum.initialize(), |acc, part| acc.update(part))
			.unwrap();
		let backward = parts
			.iter()
			.rev()
			.cloned()
			.try_fold(Action::Sum.initialize(), |acc, part| acc.update(part))
			.unwrap();
		assert_eq!(forward, backward);
		assert_eq!(forward, Tally::Sum(15.0));
	}

	#[test]
	fn test_collect_is_order_independent() {
		// the same groups partitioned two ways agree
		let a = Action::Collect.subtally(0, &[], vec![Value::Int(1)]);
		let b = Action::Collect.subtally(1, &[], vec![Value::Int(2), Value::Int(3)]);
		let ab = Action::Collect.initialize().update(a.clone()).unwrap().update(b.clone()).unwrap();
		let ba = Action::Collect.initialize().update(b).unwrap().update(a).unwrap();
		assert_eq!(ab, ba);
		assert_eq!(
			ab.finalize(),
			Value::list([Value::Int(1), Value::Int(2), Value::Int(3)])
		);
	}

	#[test]
	fn test_double_tally_is_caught() {
		let a = Action::Collect.subtally(0, &[], vec![Value::Int(1)]);
		let b = Action::Collect.subtally(0, &[], vec![Value::Int(2)]);
		assert!(a.update(b).is_err());
	}

	#[test]
	fn test_mismatched_tallies_are_an_error() {
		assert!(Tally::Count(1).update(Tally::Sum(2.0)).is_err());
	}

	#[test]
	fn test_wire_round_trip() {
		let json = serde_json::to_string(&Action::Sum).unwrap();
		assert_eq!(json, "{\"type\":\"sum\"}");
		let tally = Tally::Sum(4.5);
		let back: Tally = serde_json::from_str(&serde_json::to_string(&tally).unwrap()).unwrap();
		assert_eq!(back, tally);
	}
}
