// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Narrowing. `intersect` is how every inferred fact lands on a schema;
//! when two facts cannot coexist the result is `Impossible` carrying a
//! reason, which the caller turns into a user-facing diagnostic.

use std::collections::BTreeMap;

use crate::{
	bound::Bound,
	schema::Schema,
};

impl Schema {
	pub fn intersect(&self, other: &Schema) -> Schema {
		match (self, other) {
			(
				Schema::Impossible {
					..
				},
				_,
			) => self.clone(),
			(
				_,
				Schema::Impossible {
					..
				},
			) => other.clone(),

			// union distributes: pairwise intersections, re-unioned
			(
				Schema::Union {
					possibilities,
				},
				_,
			) => Schema::union_of(possibilities.iter().map(|p| p.intersect(other))),
			(
				_,
				Schema::Union {
					possibilities,
				},
			) => Schema::union_of(possibilities.iter().map(|p| self.intersect(p))),

			(Schema::Null, Schema::Null) => Schema::Null,

			(
				Schema::Boolean {
					just: ja,
				},
				Schema::Boolean {
					just: jb,
				},
			) => match (ja, jb) {
				(Some(a), Some(b)) if a != b => {
					Schema::impossible(format!("boolean({}) has no values in boolean({})", a, b))
				}
				(Some(a), _) => Schema::just(*a),
				(None, Some(b)) => Schema::just(*b),
				(None, None) => Schema::boolean(),
			},

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
			) => Schema::number(
				Bound::tighter_low(*amin, *bmin),
				Bound::tighter_high(*amax, *bmax),
				*awhole || *bwhole,
			),

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
			) => {
				if ca != cb {
					return Schema::impossible(format!("{} does not intersect {}", self, other));
				}
				let fewest = (*fa).max(*fb);
				let most = match (ma, mb) {
					(Some(x), Some(y)) => Some((*x).min(*y)),
					(Some(x), None) => Some(*x),
					(None, m) => *m,
				};
				if most.map(|m| m < fewest).unwrap_or(false) {
					return Schema::impossible(format!("{} does not intersect {}", self, other));
				}
				Schema::Str {
					charset: *ca,
					fewest,
					most,
				}
			}

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
			) => {
				let fewest = (*fa).max(*fb);
				let most = match (ma, mb) {
					(Some(x), Some(y)) => Some((*x).min(*y)),
					(Some(x), None) => Some(*x),
					(None, m) => *m,
				};
				if most.map(|m| m < fewest).unwrap_or(false) {
					return Schema::impossible(format!("{} does not intersect {}", self, other));
				}
				let items = ia.intersect(ib);
				if items.is_impossible() {
					// only the empty collection survives, if allowed
					if fewest == 0 {
						return Schema::Collection {
							items: Box::new(items),
							fewest: 0,
							most: Some(0),
							ordered: *oa || *ob,
						};
					}
					return Schema::impossible(format!("{} does not intersect {}", self, other));
				}
				Schema::Collection {
					items: Box::new(items),
					fewest,
					most,
					ordered: *oa || *ob,
				}
			}

			(
				Schema::Record {
					fields: fa,
				},
				Schema::Record {
					fields: fb,
				},
			) => {
				if !fa.keys().eq(fb.keys()) {
					return Schema::impossible(format!("{} does not intersect {}", self, other));
				}
				let mut fields = BTreeMap::new();
				for (name, schema) in fa {
					let tightened = schema.intersect(&fb[name]);
					if tightened.is_impossible() {
						return Schema::impossible(format!(
							"field '{}': {} does not intersect {}",
							name, schema, fb[name]
						));
					}
					fields.insert(name.clone(), tightened);
				}
				Schema::Record {
					fields,
				}
			}

			(
				Schema::Ref {
					name: na,
				},
				Schema::Ref {
					name: nb,
				},
			) => {
				if na == nb {
					self.clone()
				} else {
					Schema::impossible(format!(
						"named schemas '{}' and '{}' cannot be intersected unresolved",
						na, nb
					))
				}
			}

			_ => Schema::impossible(format!("{} does not intersect {}", self, other)),
		}
	}
}
