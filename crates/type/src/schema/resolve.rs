// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Named schemas. A recursive schema is representable only as a name
//! reference plus a side table; expanding one into columns is rejected at
//! layout time, but membership tests and assembly may chase the names.

use std::collections::BTreeMap;

use crate::{
	Result,
	error::Diagnostic,
	schema::Schema,
};

/// The `name → schema` side table queries are compiled against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaContext {
	names: BTreeMap<String, Schema>,
}

impl SchemaContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn define(&mut self, name: impl Into<String>, schema: Schema) {
		self.names.insert(name.into(), schema);
	}

	pub fn get(&self, name: &str) -> Option<&Schema> {
		self.names.get(name)
	}

	/// Does the named schema reach itself again through any chain of
	/// references?
	pub fn is_cyclic(&self, name: &str) -> bool {
		let mut trail = Vec::new();
		self.reaches(name, name, &mut trail)
	}

	fn reaches(&self, target: &str, current: &str, trail: &mut Vec<String>) -> bool {
		if trail.iter().any(|seen| seen == current) {
			return false;
		}
		trail.push(current.to_string());
		let Some(schema) = self.names.get(current) else {
			return false;
		};
		let mut found = false;
		visit_refs(schema, &mut |referenced| {
			if referenced == target || self.reaches(target, referenced, trail) {
				found = true;
			}
		});
		found
	}

	/// Inline every reference; fails on undefined names and on cycles.
	/// Used where a self-contained schema is required (column layout,
	/// wire serialization of resolved metadata).
	pub fn resolve_acyclic(&self, schema: &Schema) -> Result<Schema> {
		self.resolve_inner(schema, &mut Vec::new())
	}

	fn resolve_inner(&self, schema: &Schema, trail: &mut Vec<String>) -> Result<Schema> {
		Ok(match schema {
			Schema::Ref {
				name,
			} => {
				if trail.iter().any(|seen| seen == name) {
					return Err(Diagnostic::new(
						"SCHEMA_001",
						format!("schema '{}' is recursive and cannot be expanded", name),
					)
					.with_help("recursive schemas cannot be shredded to columns")
					.into());
				}
				let resolved = self.names.get(name).ok_or_else(|| {
					crate::Error::from(Diagnostic::new(
						"SCHEMA_002",
						format!("schema name '{}' is not defined", name),
					))
				})?;
				trail.push(name.clone());
				let out = self.resolve_inner(resolved, trail)?;
				trail.pop();
				out
			}
			Schema::Collection {
				items,
				fewest,
				most,
				ordered,
			} => Schema::Collection {
				items: Box::new(self.resolve_inner(items, trail)?),
				fewest: *fewest,
				most: *most,
				ordered: *ordered,
			},
			Schema::Record {
				fields,
			} => Schema::Record {
				fields: fields
					.iter()
					.map(|(name, field)| Ok((name.clone(), self.resolve_inner(field, trail)?)))
					.collect::<Result<_>>()?,
			},
			Schema::Union {
				possibilities,
			} => Schema::Union {
				possibilities: possibilities
					.iter()
					.map(|p| self.resolve_inner(p, trail))
					.collect::<Result<_>>()?,
			},
			other => other.clone(),
		})
	}
}

fn visit_refs(schema: &Schema, visit: &mut impl FnMut(&str)) {
	match schema {
		Schema::Ref {
			name,
		} => visit(name),
		Schema::Collection {
			items, ..
		} => visit_refs(items, visit),
		Schema::Record {
			fields,
		} => {
			for field in fields.values() {
				visit_refs(field, visit);
			}
		}
		Schema::Union {
			possibilities,
		} => {
			for possibility in possibilities {
				visit_refs(possibility, visit);
			}
		}
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cycle_detection() {
		let mut ctx = SchemaContext::new();
		ctx.define(
			"tree",
			Schema::record([("children", Schema::collection(Schema::named("tree")))]),
		);
		ctx.define("alias", Schema::collection(Schema::integer_all()));
		assert!(ctx.is_cyclic("tree"));
		assert!(!ctx.is_cyclic("alias"));
	}

	#[test]
	fn test_resolve_inlines_aliases() {
		let mut ctx = SchemaContext::new();
		ctx.define("jet", Schema::record([("pt", Schema::real_all())]));
		let resolved = ctx.resolve_acyclic(&Schema::collection(Schema::named("jet"))).unwrap();
		assert_eq!(resolved, Schema::collection(Schema::record([("pt", Schema::real_all())])));
	}

	#[test]
	fn test_resolve_rejects_cycles_and_unknowns() {
		let mut ctx = SchemaContext::new();
		ctx.define("loop", Schema::collection(Schema::named("loop")));
		let err = ctx.resolve_acyclic(&Schema::named("loop")).unwrap_err();
		assert_eq!(err.code(), "SCHEMA_001");
		let err = ctx.resolve_acyclic(&Schema::named("missing")).unwrap_err();
		assert_eq!(err.code(), "SCHEMA_002");
	}

	#[test]
	fn test_mutual_recursion_is_cyclic() {
		let mut ctx = SchemaContext::new();
		ctx.define("a", Schema::collection(Schema::named("b")));
		ctx.define("b", Schema::collection(Schema::named("a")));
		assert!(ctx.is_cyclic("a"));
		assert!(ctx.is_cyclic("b"));
	}
}
