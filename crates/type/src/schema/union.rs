// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Widening. `union_of` keeps unions canonical: nested unions are
//! flattened, at most one possibility survives per primitive family,
//! collections and records merge when they share a shape, and the
//! result is sorted so equal value sets render identically.

use std::collections::BTreeMap;

use crate::schema::{Family, Schema};

impl Schema {
	pub fn union_of(schemas: impl IntoIterator<Item = Schema>) -> Schema {
		let mut flat = Vec::new();
		for schema in schemas {
			flatten(schema, &mut flat);
		}

		let mut merged: Vec<Schema> = Vec::new();
		for schema in flat {
			let mut absorbed = false;
			for existing in merged.iter_mut() {
				if let Some(wider) = merge(existing, &schema) {
					*existing = wider;
					absorbed = true;
					break;
				}
			}
			if !absorbed {
				merged.push(schema);
			}
		}

		merged.sort_by(|a, b| (a.family(), a.to_string()).cmp(&(b.family(), b.to_string())));
		merged.dedup();

		match merged.len() {
			0 => Schema::impossible("union of nothing"),
			1 => merged.into_iter().next().unwrap(),
			_ => Schema::Union {
				possibilities: merged,
			},
		}
	}
}

fn flatten(schema: Schema, out: &mut Vec<Schema>) {
	match schema {
		Schema::Union {
			possibilities,
		} => {
			for possibility in possibilities {
				flatten(possibility, out);
			}
		}
		Schema::Impossible {
			..
		} => {}
		other => out.push(other),
	}
}

/// Merge `b` into `a` when they belong to the same canonical slot;
/// `None` keeps them as parallel possibilities.
fn merge(a: &Schema, b: &Schema) -> Option<Schema> {
	match (a, b) {
		(Schema::Null, Schema::Null) => Some(Schema::Null),

		(
			Schema::Boolean {
				just: ja,
			},
			Schema::Boolean {
				just: jb,
			},
		) => Some(Schema::Boolean {
			just: match (ja, jb) {
				(Some(x), Some(y)) if x == y => Some(*x),
				_ => None,
			},
		}),

		(
			Schema::Number {
				min: amin,
				max: amax,
				whole: awhole,
			},
			Schema::Number {
				min: bmin,
				max: bmax,
				whole: bwhole,
			},
		) => Some(Schema::Number {
			min: crate::bound::Bound::looser_low(*amin, *bmin),
			max: crate::bound::Bound::looser_high(*amax, *bmax),
			whole: *awhole && *bwhole,
		}),

		(
			Schema::Str {
				charset: ca,
				fewest: fa,
				most: ma,
			},
			Schema::Str {
				charset: cb,
				fewest: fb,
				most: mb,
			},
		) if ca == cb => Some(Schema::Str {
			charset: *ca,
			fewest: (*fa).min(*fb),
			most: match (ma, mb) {
				(Some(x), Some(y)) => Some((*x).max(*y)),
				_ => None,
			},
		}),

		(
			Schema::Collection {
				items: ia,
				fewest: fa,
				most: ma,
				ordered: oa,
			},
			Schema::Collection {
				items: ib,
				fewest: fb,
				most: mb,
				ordered: ob,
			},
		) if ia.family() == ib.family() => Some(Schema::Collection {
			items: Box::new(Schema::union_of([ia.as_ref().clone(), ib.as_ref().clone()])),
			fewest: (*fa).min(*fb),
			most: match (ma, mb) {
				(Some(x), Some(y)) => Some((*x).max(*y)),
				_ => None,
			},
			ordered: *oa && *ob,
		}),

		(
			Schema::Record {
				fields: fa,
			},
			Schema::Record {
				fields: fb,
			},
		) if fa.keys().eq(fb.keys()) => Some(Schema::Record {
			fields: fa
				.iter()
				.map(|(name, schema)| {
					(name.clone(), Schema::union_of([schema.clone(), fb[name].clone()]))
				})
				.collect::<BTreeMap<_, _>>(),
		}),

		(
			Schema::Ref {
				name: na,
			},
			Schema::Ref {
				name: nb,
			},
		) if na == nb => Some(a.clone()),

		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::bound::Bound;

	#[test]
	fn test_numbers_merge_into_one_possibility() {
		let union = Schema::union_of([
			Schema::integer(Bound::Exact(0.0), Bound::Exact(5.0)),
			Schema::integer(Bound::Exact(3.0), Bound::Exact(9.0)),
		]);
		assert_eq!(union, Schema::integer(Bound::Exact(0.0), Bound::Exact(9.0)));
	}

	#[test]
	fn test_integer_and_real_widen_to_real() {
		let union = Schema::union_of([
			Schema::integer(Bound::Exact(0.0), Bound::Exact(5.0)),
			Schema::real(Bound::Exact(1.0), Bound::Exact(2.0)),
		]);
		assert_eq!(union, Schema::real(Bound::Exact(0.0), Bound::Exact(5.0)));
	}

	#[test]
	fn test_nested_unions_flatten() {
		let inner = Schema::union_of([Schema::Null, Schema::boolean()]);
		let union = Schema::union_of([inner, Schema::integer_all()]);
		match &union {
			Schema::Union {
				possibilities,
			} => {
				assert_eq!(possibilities.len(), 3);
				assert!(possibilities.iter().all(|p| !matches!(p, Schema::Union { .. })));
			}
			other => panic!("expected union, got {}", other),
		}
	}

	#[test]
	fn test_union_is_order_independent() {
		let a = Schema::union_of([Schema::Null, Schema::integer_all(), Schema::string()]);
		let b = Schema::union_of([Schema::string(), Schema::Null, Schema::integer_all()]);
		assert_eq!(a, b);
	}

	#[test]
	fn test_same_shape_records_merge() {
		let a = Schema::record([("pt", Schema::real(Bound::Exact(0.0), Bound::Exact(1.0)))]);
		let b = Schema::record([("pt", Schema::real(Bound::Exact(0.5), Bound::Exact(2.0)))]);
		let union = Schema::union_of([a, b]);
		assert_eq!(union, Schema::record([("pt", Schema::real(Bound::Exact(0.0), Bound::Exact(2.0)))]));
	}

	#[test]
	fn test_different_shape_records_stay_parallel() {
		let a = Schema::record([("pt", Schema::real_all())]);
		let b = Schema::record([("eta", Schema::real_all())]);
		let union = Schema::union_of([a.clone(), b.clone()]);
		match union {
			Schema::Union {
				possibilities,
			} => assert_eq!(possibilities.len(), 2),
			other => panic!("expected union, got {}", other),
		}
	}

	#[test]
	fn test_impossible_disappears() {
		let union = Schema::union_of([Schema::impossible("x"), Schema::Null]);
		assert_eq!(union, Schema::Null);
	}

	#[test]
	fn test_singleton_collapses() {
		assert_eq!(Schema::union_of([Schema::boolean()]), Schema::boolean());
	}

	#[test]
	fn test_booleans_fold_just() {
		assert_eq!(Schema::union_of([Schema::just(true), Schema::just(false)]), Schema::boolean());
		assert_eq!(Schema::union_of([Schema::just(true), Schema::just(true)]), Schema::just(true));
	}
}
