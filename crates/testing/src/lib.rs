// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Test support: build a dataset in memory from plain values, serve
//! its stripes through the fetcher interface, and generate random
//! values inside a schema for property tests.

use std::collections::BTreeMap;

use femtocode_columnar::{ArrayBuffer, ColumnBuffers, Dataset, Group, Segment, columns_of};
use femtocode_runtime::StripeSource;
use femtocode_type::{Bound, Charset, ColumnName, Result, Schema, Value};
use rand::Rng;

/// Serve stripes straight out of memory; the smallest possible
/// storage backend behind the fetcher contract.
pub struct MemorySource {
	stripes: BTreeMap<(ColumnName, u64), Vec<u8>>,
}

impl StripeSource for MemorySource {
	fn read(&self, column: &ColumnName, group: u64) -> Result<Vec<u8>> {
		self.stripes
			.get(&(column.clone(), group))
			.cloned()
			.ok_or_else(|| femtocode_type::internal_error!("no stripe for {}[{}]", column, group))
	}
}

/// Little-endian bytes of one stripe.
pub fn encode(buffer: &ArrayBuffer) -> Vec<u8> {
	match buffer {
		ArrayBuffer::Int(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
		ArrayBuffer::Float(values) => values.iter().flat_map(|v| v.to_le_bytes()).collect(),
		ArrayBuffer::Bytes(values) => values.clone(),
	}
}

/// Build a dataset (with group metadata) and its stripes from whole
/// entry values, partitioned into groups of `group_size` entries.
pub struct DatasetBuilder {
	name: String,
	fields: Vec<(String, Schema)>,
	entries: Vec<Value>,
	group_size: usize,
}

impl DatasetBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			fields: Vec::new(),
			entries: Vec::new(),
			group_size: usize::MAX,
		}
	}

	pub fn field(mut self, name: impl Into<String>, schema: Schema) -> Self {
		self.fields.push((name.into(), schema));
		self
	}

	pub fn group_size(mut self, group_size: usize) -> Self {
		self.group_size = group_size.max(1);
		self
	}

	/// One entry: a record over the declared fields.
	pub fn entry(mut self, fields: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
		self.entries.push(Value::record(fields));
		self
	}

	pub fn build(self) -> Result<(Dataset, MemorySource)> {
		let mut dataset = Dataset::from_schema(self.name.clone(), self.fields.clone(), None)?;
		dataset.num_entries = self.entries.len() as u64;

		let mut stripes = BTreeMap::new();
		let chunks: Vec<&[Value]> = if self.entries.is_empty() {
			vec![&[]]
		} else {
			self.entries.chunks(self.group_size.min(self.entries.len())).collect()
		};
		dataset.num_groups = chunks.len() as u64;

		for (group_id, chunk) in chunks.iter().enumerate() {
			let mut segments = BTreeMap::new();
			for (field, schema) in &self.fields {
				let root = ColumnName::root(field.clone());
				let layout = columns_of(schema, &root, None)?;
				let mut buffers = ColumnBuffers::for_layout(&layout);
				for entry in chunk.iter() {
					let Value::Record(entry_fields) = entry else {
						return Err(femtocode_type::internal_error!("entries must be records"));
					};
					let value = entry_fields.get(field).ok_or_else(|| {
						femtocode_type::internal_error!("entry lacks field '{}'", field)
					})?;
					femtocode_columnar::shred(value, schema, &root, &mut buffers, None)?;
				}
				for (column, buffer) in &buffers.columns {
					stripes.insert((column.clone(), group_id as u64), encode(buffer));
				}
				// one segment per data column; sidecar lengths ride along
				for (column, buffer) in &buffers.columns {
					if column.is_size() || column.is_tag() {
						continue;
					}
					let size_length = dataset
						.columns
						.get(column)
						.and_then(|descriptor| descriptor.size.as_ref())
						.and_then(|size| buffers.columns.get(size))
						.map(|size_buffer| size_buffer.len() as u64);
					segments.insert(column.clone(), Segment {
						num_entries: chunk.len() as u64,
						data_length: buffer.len() as u64,
						size_length,
						files: None,
					});
				}
				// tag sidecars need their own segments: they are data
				// to the fetcher even though they describe a union
				for (column, buffer) in &buffers.columns {
					if column.is_tag() {
						segments.insert(column.clone(), Segment {
							num_entries: chunk.len() as u64,
							data_length: buffer.len() as u64,
							size_length: None,
							files: None,
						});
					}
				}
			}
			dataset.groups.push(Group {
				id: group_id as u64,
				num_entries: chunk.len() as u64,
				files: Vec::new(),
				segments,
			});
		}

		Ok((dataset, MemorySource {
			stripes,
		}))
	}
}

/// A random value inside the schema, for round-trip and monotonicity
/// properties. Depth is bounded so nested collections terminate.
pub fn generate_value(schema: &Schema, rng: &mut impl Rng, depth: usize) -> Value {
	match schema {
		Schema::Null => Value::Null,
		Schema::Boolean {
			just,
		} => Value::Bool(just.unwrap_or_else(|| rng.gen_bool(0.5))),
		Schema::Number {
			min,
			max,
			whole,
		} => {
			let low = clamp_finite(min.value(), -1_000_000.0);
			let high = clamp_finite(max.value(), 1_000_000.0);
			if *whole {
				let low = if min.is_open() { low + 1.0 } else { low };
				let high = if max.is_open() { high - 1.0 } else { high };
				Value::Int(rng.gen_range(low as i64..=(high as i64).max(low as i64)))
			} else {
				let mut value = rng.gen_range(low..=high.max(low));
				if min.is_open() && value == low {
					value = (low + high) / 2.0;
				}
				if max.is_open() && value == high {
					value = (low + high) / 2.0;
				}
				Value::Float(value)
			}
		}
		Schema::Str {
			charset,
			fewest,
			most,
		} => {
			let length =
				rng.gen_range(*fewest..=most.unwrap_or(fewest + 8).max(*fewest)) as usize;
			match charset {
				Charset::Unicode => Value::Str(
					(0..length).map(|_| rng.gen_range(b'a'..=b'z') as char).collect(),
				),
				Charset::Bytes => Value::Bytes((0..length).map(|_| rng.r#gen()).collect()),
			}
		}
		Schema::Collection {
			items,
			fewest,
			most,
			..
		} => {
			let cap = if depth == 0 { *fewest } else { most.unwrap_or(fewest + 3).min(fewest + 3) };
			let length = rng.gen_range(*fewest..=cap.max(*fewest));
			Value::List(
				(0..length).map(|_| generate_value(items, rng, depth.saturating_sub(1))).collect(),
			)
		}
		Schema::Record {
			fields,
		} => Value::Record(
			fields
				.iter()
				.map(|(name, field)| {
					(name.clone(), generate_value(field, rng, depth.saturating_sub(1)))
				})
				.collect(),
		),
		Schema::Union {
			possibilities,
		} => {
			let pick = rng.gen_range(0..possibilities.len());
			generate_value(&possibilities[pick], rng, depth)
		}
		Schema::Impossible {
			..
		}
		| Schema::Ref {
			..
		} => Value::Null,
	}
}

fn clamp_finite(value: f64, fallback: f64) -> f64 {
	if value.is_finite() { value } else { fallback }
}

/// A convenient bounded real schema for generated fixtures.
pub fn small_real() -> Schema {
	Schema::real(Bound::Exact(-100.0), Bound::Exact(100.0))
}
