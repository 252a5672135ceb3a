// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::collections::BTreeMap;

use femtocode_type::{ColumnName, Dtype, Result, internal_error};

/// One flat typed array backing a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayBuffer {
	Int(Vec<i64>),
	Float(Vec<f64>),
	Bytes(Vec<u8>),
}

impl ArrayBuffer {
	pub fn empty(dtype: Dtype) -> Self {
		match dtype {
			Dtype::Int64 => ArrayBuffer::Int(Vec::new()),
			Dtype::Float64 => ArrayBuffer::Float(Vec::new()),
			Dtype::UInt8 => ArrayBuffer::Bytes(Vec::new()),
		}
	}

	pub fn len(&self) -> usize {
		match self {
			ArrayBuffer::Int(v) => v.len(),
			ArrayBuffer::Float(v) => v.len(),
			ArrayBuffer::Bytes(v) => v.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn dtype(&self) -> Dtype {
		match self {
			ArrayBuffer::Int(_) => Dtype::Int64,
			ArrayBuffer::Float(_) => Dtype::Float64,
			ArrayBuffer::Bytes(_) => Dtype::UInt8,
		}
	}

	pub fn push_int(&mut self, value: i64) -> Result<()> {
		match self {
			ArrayBuffer::Int(v) => {
				v.push(value);
				Ok(())
			}
			_ => Err(internal_error!("integer pushed into a {:?} buffer", self.dtype())),
		}
	}

	pub fn push_float(&mut self, value: f64) -> Result<()> {
		match self {
			ArrayBuffer::Float(v) => {
				v.push(value);
				Ok(())
			}
			_ => Err(internal_error!("float pushed into a {:?} buffer", self.dtype())),
		}
	}

	pub fn push_bytes(&mut self, value: &[u8]) -> Result<()> {
		match self {
			ArrayBuffer::Bytes(v) => {
				v.extend_from_slice(value);
				Ok(())
			}
			_ => Err(internal_error!("bytes pushed into a {:?} buffer", self.dtype())),
		}
	}

	pub fn get_int(&self, index: usize) -> Option<i64> {
		match self {
			ArrayBuffer::Int(v) => v.get(index).copied(),
			_ => None,
		}
	}

	pub fn get_float(&self, index: usize) -> Option<f64> {
		match self {
			ArrayBuffer::Float(v) => v.get(index).copied(),
			_ => None,
		}
	}

	pub fn get_byte_run(&self, start: usize, length: usize) -> Option<&[u8]> {
		match self {
			ArrayBuffer::Bytes(v) => v.get(start..start + length),
			_ => None,
		}
	}
}

/// The set of column buffers one shredding pass appends to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBuffers {
	pub columns: BTreeMap<ColumnName, ArrayBuffer>,
}

impl ColumnBuffers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Empty buffers for every column of a layout, typed per column:
	/// data columns by their schema's dtype, sidecars as integers.
	pub fn for_layout(layout: &BTreeMap<ColumnName, crate::layout::Column>) -> Self {
		let mut out = Self::new();
		for (name, column) in layout {
			let dtype = match column.kind {
				crate::layout::ColumnKind::Data => column.schema.dtype().unwrap_or(Dtype::Int64),
				crate::layout::ColumnKind::Size | crate::layout::ColumnKind::Tag => Dtype::Int64,
			};
			out.insert(name.clone(), ArrayBuffer::empty(dtype));
		}
		out
	}

	pub fn get(&self, name: &ColumnName) -> Option<&ArrayBuffer> {
		self.columns.get(name)
	}

	pub fn get_mut(&mut self, name: &ColumnName) -> Result<&mut ArrayBuffer> {
		self.columns
			.get_mut(name)
			.ok_or_else(|| internal_error!("column '{}' missing from buffers", name))
	}

	pub fn insert(&mut self, name: ColumnName, buffer: ArrayBuffer) {
		self.columns.insert(name, buffer);
	}

	/// The size columns that a variable-length node at `name` bumps:
	/// every size sidecar under `name` whose remaining path does not
	/// cross a union boundary (a possibility is only counted when its
	/// tag selects it).
	pub fn sizes_under(&self, name: &ColumnName) -> Vec<ColumnName> {
		self.columns
			.keys()
			.filter(|column| {
				column.is_size()
					&& column.segments.starts_with(&name.segments)
					&& column.segments[name.segments.len()..]
						.iter()
						.all(|segment| matches!(segment, femtocode_type::Segment::Field(_)))
			})
			.cloned()
			.collect()
	}
}
