// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Schema → column expansion. Records lower to nothing of their own;
//! collections contribute one shared size sidecar per jagged ancestry
//! (descending into a collection does not extend the column name, so
//! nested levels land in the same recursive size column); unions
//! contribute a tag sidecar plus one sub-name per possibility.

use std::collections::BTreeMap;

use femtocode_type::{Bound, Charset, ColumnName, Result, Schema, SchemaContext, internal_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
	Data,
	Size,
	Tag,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
	pub name: ColumnName,
	pub schema: Schema,
	pub kind: ColumnKind,
}

fn size_schema() -> Schema {
	Schema::integer(Bound::Exact(0.0), Bound::Almost(f64::INFINITY))
}

/// Expand one named schema into its flat columns. Named references are
/// resolved first; a recursive schema cannot be expanded and errors
/// here (the shredder relies on bounded depth).
pub fn columns_of(
	schema: &Schema,
	name: &ColumnName,
	ctx: Option<&SchemaContext>,
) -> Result<BTreeMap<ColumnName, Column>> {
	let resolved = match ctx {
		Some(ctx) => ctx.resolve_acyclic(schema)?,
		None => schema.clone(),
	};
	let mut out = BTreeMap::new();
	expand(&resolved, name, &mut out)?;
	Ok(out)
}

fn expand(schema: &Schema, name: &ColumnName, out: &mut BTreeMap<ColumnName, Column>) -> Result<()> {
	match schema {
		// the single value "absent" stores nothing
		Schema::Null => Ok(()),

		Schema::Boolean {
			..
		}
		| Schema::Number {
			..
		} => {
			out.insert(name.clone(), Column {
				name: name.clone(),
				schema: schema.clone(),
				kind: ColumnKind::Data,
			});
			Ok(())
		}

		Schema::Str {
			charset,
			fewest,
			most,
		} => {
			out.insert(name.clone(), Column {
				name: name.clone(),
				schema: schema.clone(),
				kind: ColumnKind::Data,
			});
			let fixed = *charset == Charset::Bytes && Some(*fewest) == *most;
			if !fixed {
				out.insert(name.size(), Column {
					name: name.size(),
					schema: size_schema(),
					kind: ColumnKind::Size,
				});
			}
			Ok(())
		}

		Schema::Collection {
			items,
			fewest,
			most,
			..
		} => {
			if Some(*fewest) != *most {
				out.insert(name.size(), Column {
					name: name.size(),
					schema: size_schema(),
					kind: ColumnKind::Size,
				});
			}
			expand(items, name, out)
		}

		Schema::Record {
			fields,
		} => {
			for (field, field_schema) in fields {
				expand(field_schema, &name.field(field), out)?;
			}
			Ok(())
		}

		Schema::Union {
			possibilities,
		} => {
			out.insert(name.tag(), Column {
				name: name.tag(),
				schema: Schema::integer(
					Bound::Exact(0.0),
					Bound::Exact((possibilities.len() as f64 - 1.0).max(0.0)),
				),
				kind: ColumnKind::Tag,
			});
			for (index, possibility) in possibilities.iter().enumerate() {
				expand(possibility, &name.pos(index as u32), out)?;
			}
			Ok(())
		}

		Schema::Ref {
			name: reference,
		} => Err(internal_error!("named schema '{}' survived resolution", reference)),

		Schema::Impossible {
			reason,
		} => Err(internal_error!("impossible schema ({}) cannot be laid out", reason)),
	}
}

/// The number of variable levels each size column of this schema
/// encodes, depth-first: nested collections sharing one recursive size
/// column count once per level. Kernel walkers need this to know how
/// deep one entry's counts nest.
pub fn size_depths(
	schema: &Schema,
	name: &ColumnName,
	ctx: Option<&SchemaContext>,
) -> Result<BTreeMap<ColumnName, usize>> {
	let resolved = match ctx {
		Some(ctx) => ctx.resolve_acyclic(schema)?,
		None => schema.clone(),
	};
	let mut out = BTreeMap::new();
	depths(&resolved, name, 0, &mut out);
	Ok(out)
}

fn depths(schema: &Schema, name: &ColumnName, depth: usize, out: &mut BTreeMap<ColumnName, usize>) {
	match schema {
		Schema::Str {
			..
		} => {
			if !schema.is_fixed() {
				let entry = out.entry(name.size()).or_insert(0);
				*entry = (*entry).max(depth + 1);
			}
		}
		Schema::Collection {
			items,
			fewest,
			most,
			..
		} => {
			let next = if Some(*fewest) != *most {
				let entry = out.entry(name.size()).or_insert(0);
				*entry = (*entry).max(depth + 1);
				depth + 1
			} else {
				depth
			};
			depths(items, name, next, out);
		}
		Schema::Record {
			fields,
		} => {
			for (field, field_schema) in fields {
				depths(field_schema, &name.field(field), depth, out);
			}
		}
		Schema::Union {
			possibilities,
		} => {
			// sidecar encodings restart inside a possibility: the tag
			// gates which entries even have counts
			for (index, possibility) in possibilities.iter().enumerate() {
				depths(possibility, &name.pos(index as u32), 0, out);
			}
		}
		_ => {}
	}
}
