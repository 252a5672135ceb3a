// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Value → column appends. The value is checked against the schema
//! before anything is written, so a failed shred never leaves buffers
//! half-updated across entries. Variable-length nodes append their
//! count to every size sidecar beneath them (the shared, collective
//! convention), which is what gives nested levels their depth-first
//! interleaved encoding.

use femtocode_type::{
	Charset, ColumnName, Result, Schema, SchemaContext, Value, error::Diagnostic, internal_error,
};

use crate::buffers::ColumnBuffers;

pub fn shred(
	value: &Value,
	schema: &Schema,
	name: &ColumnName,
	buffers: &mut ColumnBuffers,
	ctx: Option<&SchemaContext>,
) -> Result<()> {
	if !schema.contains_in(value, ctx) {
		return Err(Diagnostic::new(
			"SHRED_001",
			format!("value {} is not a member of {}", value, schema),
		)
		.with_label(format!("while shredding column '{}'", name))
		.into());
	}
	shred_unchecked(value, schema, name, buffers, ctx)
}

fn shred_unchecked(
	value: &Value,
	schema: &Schema,
	name: &ColumnName,
	buffers: &mut ColumnBuffers,
	ctx: Option<&SchemaContext>,
) -> Result<()> {
	match (schema, value) {
		(Schema::Null, Value::Null) => Ok(()),

		(
			Schema::Boolean {
				..
			},
			Value::Bool(b),
		) => buffers.get_mut(name)?.push_int(*b as i64),

		(
			Schema::Number {
				whole, ..
			},
			value,
		) => {
			let buffer = buffers.get_mut(name)?;
			if *whole {
				match value {
					Value::Int(v) => buffer.push_int(*v),
					Value::Float(v) => buffer.push_int(*v as i64),
					_ => Err(internal_error!("checked value failed to shred at '{}'", name)),
				}
			} else {
				match value.as_f64() {
					Some(v) => buffer.push_float(v),
					None => Err(internal_error!("checked value failed to shred at '{}'", name)),
				}
			}
		}

		(
			Schema::Str {
				charset,
				fewest,
				most,
			},
			value,
		) => {
			let bytes: &[u8] = match (charset, value) {
				(Charset::Unicode, Value::Str(s)) => s.as_bytes(),
				(Charset::Bytes, Value::Bytes(b)) => b,
				_ => return Err(internal_error!("checked value failed to shred at '{}'", name)),
			};
			let fixed = *charset == Charset::Bytes && Some(*fewest) == *most;
			if !fixed {
				// sidecars hold byte lengths, not character counts
				buffers.get_mut(&name.size())?.push_int(bytes.len() as i64)?;
			}
			buffers.get_mut(name)?.push_bytes(bytes)
		}

		(
			Schema::Collection {
				items,
				fewest,
				most,
				..
			},
			Value::List(list),
		) => {
			if Some(*fewest) != *most {
				for size in buffers.sizes_under(name) {
					buffers.get_mut(&size)?.push_int(list.len() as i64)?;
				}
			}
			for item in list {
				shred_unchecked(item, items, name, buffers, ctx)?;
			}
			Ok(())
		}

		(
			Schema::Record {
				fields,
			},
			Value::Record(entries),
		) => {
			for (field, field_schema) in fields {
				let field_value = entries
					.get(field)
					.ok_or_else(|| internal_error!("checked record lost field '{}'", field))?;
				shred_unchecked(field_value, field_schema, &name.field(field), buffers, ctx)?;
			}
			Ok(())
		}

		(
			Schema::Union {
				possibilities,
			},
			value,
		) => {
			let index = possibilities
				.iter()
				.position(|p| p.contains_in(value, ctx))
				.ok_or_else(|| internal_error!("checked value fits no possibility at '{}'", name))?;
			buffers.get_mut(&name.tag())?.push_int(index as i64)?;
			shred_unchecked(value, &possibilities[index], &name.pos(index as u32), buffers, ctx)
		}

		(
			Schema::Ref {
				name: reference,
			},
			value,
		) => {
			let resolved = ctx
				.and_then(|c| c.get(reference))
				.ok_or_else(|| internal_error!("schema name '{}' not in context", reference))?
				.clone();
			shred_unchecked(value, &resolved, name, buffers, ctx)
		}

		_ => Err(internal_error!("checked value failed to shred at '{}'", name)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::layout::columns_of;

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	fn muons_schema() -> Schema {
		Schema::collection(Schema::record([
			("pt", Schema::real(femtocode_type::Bound::Exact(0.0), femtocode_type::Bound::Almost(f64::INFINITY))),
			("eta", Schema::real_all()),
			("phi", Schema::real_all()),
		]))
	}

	fn muon(pt: f64, eta: f64, phi: f64) -> Value {
		Value::record([("pt", Value::Float(pt)), ("eta", Value::Float(eta)), ("phi", Value::Float(phi))])
	}

	#[test]
	fn test_shared_jagged_shape() {
		// shredding a muon record collection produces columns of equal
		// logical length sharing one size sidecar
		let schema = muons_schema();
		let name = ColumnName::root("muons");
		let layout = columns_of(&schema, &name, None).unwrap();
		let mut buffers = ColumnBuffers::for_layout(&layout);

		shred(&Value::list([muon(10.0, 0.1, 0.2), muon(20.0, -1.0, 1.5)]), &schema, &name, &mut buffers, None)
			.unwrap();
		shred(&Value::list([]), &schema, &name, &mut buffers, None).unwrap();
		shred(&Value::list([muon(5.0, 2.0, -2.0)]), &schema, &name, &mut buffers, None).unwrap();

		let sizes = buffers.get(&col("muons@size")).unwrap();
		assert_eq!(sizes, &crate::buffers::ArrayBuffer::Int(vec![2, 0, 1]));
		for leaf in ["muons.pt", "muons.eta", "muons.phi"] {
			assert_eq!(buffers.get(&col(leaf)).unwrap().len(), 3, "{}", leaf);
		}
	}

	#[test]
	fn test_nested_collections_interleave_depth_first() {
		let schema = Schema::collection(Schema::collection(Schema::real_all()));
		let name = ColumnName::root("xss");
		let layout = columns_of(&schema, &name, None).unwrap();
		let mut buffers = ColumnBuffers::for_layout(&layout);

		// [[1.0], [2.0, 3.0]] → sizes [2, 1, 2], data [1, 2, 3]
		let value = Value::list([
			Value::list([Value::Float(1.0)]),
			Value::list([Value::Float(2.0), Value::Float(3.0)]),
		]);
		shred(&value, &schema, &name, &mut buffers, None).unwrap();

		assert_eq!(buffers.get(&col("xss@size")).unwrap(), &crate::buffers::ArrayBuffer::Int(vec![2, 1, 2]));
		assert_eq!(
			buffers.get(&col("xss")).unwrap(),
			&crate::buffers::ArrayBuffer::Float(vec![1.0, 2.0, 3.0])
		);
	}

	#[test]
	fn test_union_writes_tag_and_possibility() {
		let schema = Schema::union_of([Schema::Null, Schema::integer_all()]);
		let name = ColumnName::root("x");
		let layout = columns_of(&schema, &name, None).unwrap();
		let mut buffers = ColumnBuffers::for_layout(&layout);

		shred(&Value::Int(7), &schema, &name, &mut buffers, None).unwrap();
		shred(&Value::Null, &schema, &name, &mut buffers, None).unwrap();
		shred(&Value::Int(-1), &schema, &name, &mut buffers, None).unwrap();

		assert_eq!(buffers.get(&col("x@tag")).unwrap(), &crate::buffers::ArrayBuffer::Int(vec![1, 0, 1]));
		assert_eq!(buffers.get(&col("x@1")).unwrap(), &crate::buffers::ArrayBuffer::Int(vec![7, -1]));
	}

	#[test]
	fn test_rejects_values_outside_the_schema() {
		let schema = Schema::integer(femtocode_type::Bound::Exact(0.0), femtocode_type::Bound::Exact(9.0));
		let name = ColumnName::root("x");
		let layout = columns_of(&schema, &name, None).unwrap();
		let mut buffers = ColumnBuffers::for_layout(&layout);

		let err = shred(&Value::Int(10), &schema, &name, &mut buffers, None).unwrap_err();
		assert_eq!(err.code(), "SHRED_001");
		// nothing was written
		assert!(buffers.get(&col("x")).unwrap().is_empty());
	}

	#[test]
	fn test_strings_write_byte_lengths() {
		let schema = Schema::string();
		let name = ColumnName::root("s");
		let layout = columns_of(&schema, &name, None).unwrap();
		let mut buffers = ColumnBuffers::for_layout(&layout);

		shred(&Value::Str("ab".to_string()), &schema, &name, &mut buffers, None).unwrap();
		shred(&Value::Str("".to_string()), &schema, &name, &mut buffers, None).unwrap();

		assert_eq!(buffers.get(&col("s@size")).unwrap(), &crate::buffers::ArrayBuffer::Int(vec![2, 0]));
		assert_eq!(buffers.get(&col("s")).unwrap().len(), 2);
	}
}
