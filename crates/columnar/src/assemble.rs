// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Column reads → values. Driven by per-column cursors; at a
//! variable-length node every size sidecar bumped by the shredder is
//! read and advanced in lockstep, and a disagreement between them is an
//! internal error (the collective-size invariant holding the jagged
//! record shape together).

use std::collections::BTreeMap;

use femtocode_type::{
	Charset, ColumnName, Result, Schema, SchemaContext, Value, internal_error,
};

use crate::buffers::ColumnBuffers;

/// Per-column read positions, in elements (bytes for byte buffers).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cursors {
	positions: BTreeMap<ColumnName, usize>,
}

impl Cursors {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn position(&self, name: &ColumnName) -> usize {
		self.positions.get(name).copied().unwrap_or(0)
	}

	fn advance(&mut self, name: &ColumnName, by: usize) -> usize {
		let position = self.positions.entry(name.clone()).or_insert(0);
		let current = *position;
		*position += by;
		current
	}
}

/// Read one entry of `schema` rooted at `name`.
pub fn assemble(
	schema: &Schema,
	name: &ColumnName,
	buffers: &ColumnBuffers,
	cursors: &mut Cursors,
	ctx: Option<&SchemaContext>,
) -> Result<Value> {
	match schema {
		Schema::Null => Ok(Value::Null),

		Schema::Boolean {
			..
		} => {
			let at = cursors.advance(name, 1);
			let v = buffers
				.get(name)
				.and_then(|b| b.get_int(at))
				.ok_or_else(|| internal_error!("boolean column '{}' exhausted at {}", name, at))?;
			Ok(Value::Bool(v != 0))
		}

		Schema::Number {
			whole, ..
		} => {
			let at = cursors.advance(name, 1);
			let buffer = buffers
				.get(name)
				.ok_or_else(|| internal_error!("numeric column '{}' missing", name))?;
			if *whole {
				buffer
					.get_int(at)
					.map(Value::Int)
					.ok_or_else(|| internal_error!("column '{}' exhausted at {}", name, at))
			} else {
				buffer
					.get_float(at)
					.map(Value::Float)
					.ok_or_else(|| internal_error!("column '{}' exhausted at {}", name, at))
			}
		}

		Schema::Str {
			charset,
			fewest,
			most,
		} => {
			let fixed = *charset == Charset::Bytes && Some(*fewest) == *most;
			let length = if fixed {
				*fewest as usize
			} else {
				let size_column = name.size();
				let at = cursors.advance(&size_column, 1);
				buffers
					.get(&size_column)
					.and_then(|b| b.get_int(at))
					.ok_or_else(|| internal_error!("size column '{}' exhausted at {}", size_column, at))?
					as usize
			};
			let start = cursors.advance(name, length);
			let bytes = buffers
				.get(name)
				.and_then(|b| b.get_byte_run(start, length))
				.ok_or_else(|| internal_error!("byte column '{}' exhausted at {}", name, start))?;
			match charset {
				Charset::Bytes => Ok(Value::Bytes(bytes.to_vec())),
				Charset::Unicode => String::from_utf8(bytes.to_vec())
					.map(Value::Str)
					.map_err(|_| internal_error!("column '{}' holds invalid utf-8", name)),
			}
		}

		Schema::Collection {
			items,
			fewest,
			most,
			..
		} => {
			let count = if Some(*fewest) == *most {
				*fewest as usize
			} else {
				let mut agreed: Option<i64> = None;
				for size_column in buffers.sizes_under(name) {
					let at = cursors.advance(&size_column, 1);
					let value = buffers
						.get(&size_column)
						.and_then(|b| b.get_int(at))
						.ok_or_else(|| {
							internal_error!("size column '{}' exhausted at {}", size_column, at)
						})?;
					match agreed {
						None => agreed = Some(value),
						Some(previous) if previous != value => {
							return Err(internal_error!(
								"size columns under '{}' disagree: {} versus {}",
								name,
								previous,
								value
							));
						}
						Some(_) => {}
					}
				}
				agreed.ok_or_else(|| internal_error!("no size column under '{}'", name))? as usize
			};
			let mut list = Vec::with_capacity(count);
			for _ in 0..count {
				list.push(assemble(items, name, buffers, cursors, ctx)?);
			}
			Ok(Value::List(list))
		}

		Schema::Record {
			fields,
		} => {
			let mut entries = BTreeMap::new();
			for (field, field_schema) in fields {
				entries.insert(
					field.clone(),
					assemble(field_schema, &name.field(field), buffers, cursors, ctx)?,
				);
			}
			Ok(Value::Record(entries))
		}

		Schema::Union {
			possibilities,
		} => {
			let tag_column = name.tag();
			let at = cursors.advance(&tag_column, 1);
			let tag = buffers
				.get(&tag_column)
				.and_then(|b| b.get_int(at))
				.ok_or_else(|| internal_error!("tag column '{}' exhausted at {}", tag_column, at))?;
			let possibility = possibilities
				.get(tag as usize)
				.ok_or_else(|| internal_error!("tag {} out of range at '{}'", tag, name))?;
			assemble(possibility, &name.pos(tag as u32), buffers, cursors, ctx)
		}

		Schema::Ref {
			name: reference,
		} => {
			let resolved = ctx
				.and_then(|c| c.get(reference))
				.ok_or_else(|| internal_error!("schema name '{}' not in context", reference))?
				.clone();
			assemble(&resolved, name, buffers, cursors, ctx)
		}

		Schema::Impossible {
			reason,
		} => Err(internal_error!("impossible schema ({}) cannot be assembled", reason)),
	}
}

/// Read `entries` consecutive entries from the top.
pub fn assemble_all(
	schema: &Schema,
	name: &ColumnName,
	buffers: &ColumnBuffers,
	entries: usize,
	ctx: Option<&SchemaContext>,
) -> Result<Vec<Value>> {
	let mut cursors = Cursors::new();
	let mut out = Vec::with_capacity(entries);
	for _ in 0..entries {
		out.push(assemble(schema, name, buffers, &mut cursors, ctx)?);
	}
	Ok(out)
}
