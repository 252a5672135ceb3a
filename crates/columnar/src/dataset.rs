// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Dataset metadata: the payload contract between the catalog, the
//! dispatcher and the workers. Only the shapes are owned here; where
//! the bytes come from is a storage-backend concern behind the fetcher.

use std::collections::BTreeMap;

use femtocode_lang::SlRef;
use femtocode_type::{ColumnName, Result, Schema, SchemaContext, internal_error};
use serde::{Deserialize, Serialize};

use crate::layout::{Column, ColumnKind, columns_of};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
	pub data: ColumnName,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size: Option<ColumnName>,
	pub data_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
	pub num_entries: u64,
	pub data_length: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size_length: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub files: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
	pub id: u64,
	pub num_entries: u64,
	#[serde(default)]
	pub files: Vec<String>,
	pub segments: BTreeMap<ColumnName, Segment>,
}

/// Everything a query needs to know about a dataset: the user-facing
/// schema per top-level field, the physical columns it lowers to, and
/// the horizontal groups work is partitioned into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
	pub name: String,
	pub num_entries: u64,
	pub num_groups: u64,
	pub schema: BTreeMap<String, Schema>,
	pub columns: BTreeMap<ColumnName, ColumnDescriptor>,
	#[serde(default)]
	pub groups: Vec<Group>,
}

impl Dataset {
	/// Derive the physical column table from the field schemas.
	pub fn from_schema(
		name: impl Into<String>,
		fields: impl IntoIterator<Item = (impl Into<String>, Schema)>,
		ctx: Option<&SchemaContext>,
	) -> Result<Self> {
		let schema: BTreeMap<String, Schema> =
			fields.into_iter().map(|(field, field_schema)| (field.into(), field_schema)).collect();
		let mut columns = BTreeMap::new();
		for (field, field_schema) in &schema {
			let layout = columns_of(field_schema, &ColumnName::root(field.clone()), ctx)?;
			for (column_name, column) in &layout {
				columns.insert(column_name.clone(), descriptor_of(column, &layout));
			}
		}
		Ok(Self {
			name: name.into(),
			num_entries: 0,
			num_groups: 0,
			schema,
			columns,
			groups: Vec::new(),
		})
	}

	/// The statement-list handles the language layer binds top-level
	/// field names to.
	pub fn field_refs(&self) -> Result<BTreeMap<String, SlRef>> {
		let mut out = BTreeMap::new();
		for (field, field_schema) in &self.schema {
			let data = ColumnName::root(field.clone());
			let size = match field_schema {
				Schema::Collection {
					fewest,
					most,
					..
				} if Some(*fewest) != *most => Some(data.size()),
				Schema::Str {
					..
				} if !field_schema.is_fixed() => Some(data.size()),
				_ => None,
			};
			out.insert(field.clone(), SlRef {
				data,
				size,
				schema: field_schema.clone(),
			});
		}
		Ok(out)
	}

	pub fn group(&self, id: u64) -> Result<&Group> {
		self.groups
			.iter()
			.find(|group| group.id == id)
			.ok_or_else(|| internal_error!("dataset '{}' has no group {}", self.name, id))
	}
}

fn descriptor_of(column: &Column, layout: &BTreeMap<ColumnName, Column>) -> ColumnDescriptor {
	let data_type = match column.kind {
		ColumnKind::Size | ColumnKind::Tag => "int64".to_string(),
		ColumnKind::Data => column
			.schema
			.dtype()
			.map(|dtype| dtype.name().to_string())
			.unwrap_or_else(|| "int64".to_string()),
	};
	// the shared collective sidecar governing this column's jagged
	// shape: the longest prefix of its name with a size column
	let size = if column.kind == ColumnKind::Data {
		let mut found = None;
		let mut prefix = column.name.clone();
		loop {
			let candidate = prefix.size();
			if layout.contains_key(&candidate) {
				found = Some(candidate);
				break;
			}
			if prefix.segments.len() <= 1 {
				break;
			}
			prefix.segments.pop();
		}
		found
	} else {
		None
	};
	ColumnDescriptor {
		data: column.name.clone(),
		size,
		data_type,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	fn physics_dataset() -> Dataset {
		Dataset::from_schema(
			"events",
			[
				(
					"muons",
					Schema::collection(Schema::record([
						("pt", Schema::real_all()),
						("eta", Schema::real_all()),
					])),
				),
				("met", Schema::real_all()),
			],
			None,
		)
		.unwrap()
	}

	#[test]
	fn test_columns_from_schema() {
		let dataset = physics_dataset();
		assert!(dataset.columns.contains_key(&col("muons@size")));
		assert!(dataset.columns.contains_key(&col("muons.pt")));
		assert!(dataset.columns.contains_key(&col("met")));
		assert_eq!(dataset.columns[&col("met")].data_type, "float64");
		assert_eq!(dataset.columns[&col("muons@size")].data_type, "int64");
	}

	#[test]
	fn test_field_refs() {
		let dataset = physics_dataset();
		let refs = dataset.field_refs().unwrap();
		assert_eq!(refs["muons"].size, Some(col("muons@size")));
		assert_eq!(refs["met"].size, None);
	}

	#[test]
	fn test_wire_round_trip() {
		let mut dataset = physics_dataset();
		dataset.num_entries = 100;
		dataset.num_groups = 2;
		dataset.groups.push(Group {
			id: 0,
			num_entries: 50,
			files: vec!["part0.fcdata".to_string()],
			segments: [(col("met"), Segment {
				num_entries: 50,
				data_length: 50,
				size_length: None,
				files: None,
			})]
			.into_iter()
			.collect(),
		});
		let json = serde_json::to_string(&dataset).unwrap();
		assert!(json.contains("\"numEntries\""));
		assert!(json.contains("\"dataType\""));
		let back: Dataset = serde_json::from_str(&json).unwrap();
		assert_eq!(back, dataset);
	}
}
