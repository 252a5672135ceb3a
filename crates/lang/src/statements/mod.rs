// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The flat, columnar tail of the pipeline: named assignments over
//! stripes. Everything the executor runs is one of these six shapes;
//! the wire format of a query is this list plus dataset metadata and
//! actions.

mod build;

use std::fmt::{self, Display, Formatter};

use femtocode_type::{ColumnName, Schema, Value};
use serde::{Deserialize, Serialize};

pub use build::{BuildOutput, build_statements, same_level};

/// A handle on a stripe: where the data lives, which size column (if
/// any) gives it jagged shape, and the schema of its values.
#[derive(Debug, Clone, PartialEq)]
pub struct SlRef {
	pub data: ColumnName,
	pub size: Option<ColumnName>,
	pub schema: Schema,
}

impl SlRef {
	pub fn scalar(data: ColumnName, schema: Schema) -> Self {
		Self {
			data,
			size: None,
			schema,
		}
	}

	pub fn sized(data: ColumnName, size: ColumnName, schema: Schema) -> Self {
		Self {
			data,
			size: Some(size),
			schema,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Statement {
	/// A handle on an existing stripe (dataset input declaration).
	Ref {
		name: ColumnName,
		schema: Schema,
		data: ColumnName,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		size: Option<ColumnName>,
	},
	/// A broadcast constant.
	Literal {
		to: ColumnName,
		schema: Schema,
		value: Value,
	},
	/// A pointwise operation over aligned stripes.
	Call {
		to: ColumnName,
		schema: Schema,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		size: Option<ColumnName>,
		function: String,
		args: Vec<ColumnName>,
	},
	/// Broadcast a scalar along one size column.
	Explode {
		to: ColumnName,
		schema: Schema,
		data: ColumnName,
		tosize: ColumnName,
	},
	/// The outer product of several size columns: a new size column
	/// describing the combined jagged shape.
	ExplodeSize {
		to: ColumnName,
		sizes: Vec<ColumnName>,
	},
	/// Repeat a jagged column so it matches a higher-dimensional
	/// jagged shape.
	ExplodeData {
		to: ColumnName,
		schema: Schema,
		data: ColumnName,
		fromsize: ColumnName,
		tosizes: Vec<ColumnName>,
	},
}

impl Statement {
	/// The column this statement defines.
	pub fn to(&self) -> &ColumnName {
		match self {
			Statement::Ref {
				name, ..
			} => name,
			Statement::Literal {
				to, ..
			}
			| Statement::Call {
				to, ..
			}
			| Statement::Explode {
				to, ..
			}
			| Statement::ExplodeSize {
				to, ..
			}
			| Statement::ExplodeData {
				to, ..
			} => to,
		}
	}

	/// The columns this statement reads.
	pub fn reads(&self) -> Vec<&ColumnName> {
		match self {
			Statement::Ref {
				data,
				size,
				..
			} => {
				let mut out = vec![data];
				out.extend(size.as_ref());
				out
			}
			Statement::Literal {
				..
			} => Vec::new(),
			Statement::Call {
				size,
				args,
				..
			} => {
				let mut out: Vec<&ColumnName> = args.iter().collect();
				out.extend(size.as_ref());
				out
			}
			Statement::Explode {
				data,
				tosize,
				..
			} => vec![data, tosize],
			Statement::ExplodeSize {
				sizes, ..
			} => {
				let mut out: Vec<&ColumnName> = sizes.iter().collect();
				out.dedup();
				out
			}
			Statement::ExplodeData {
				data,
				fromsize,
				tosizes,
				..
			} => {
				let mut out = vec![data, fromsize];
				out.extend(tosizes.iter());
				out.dedup();
				out
			}
		}
	}

	/// The stripe-size column deciding which loop this statement joins;
	/// `None` means the entry-level loop. An `ExplodeSize` seeds a new
	/// level: its own output is the size column of its loop.
	pub fn size_key(&self) -> Option<&ColumnName> {
		match self {
			Statement::Ref {
				size, ..
			} => size.as_ref(),
			Statement::Literal {
				..
			} => None,
			Statement::Call {
				size, ..
			} => size.as_ref(),
			Statement::Explode {
				tosize, ..
			} => Some(tosize),
			Statement::ExplodeSize {
				to, ..
			} => Some(to),
			Statement::ExplodeData {
				to: _,
				tosizes,
				..
			} => {
				if tosizes.len() == 1 {
					tosizes.first()
				} else {
					// grouped with the ExplodeSize that defines the
					// combined shape; the graph layer resolves it
					None
				}
			}
		}
	}

	pub fn schema(&self) -> Option<&Schema> {
		match self {
			Statement::Ref {
				schema, ..
			}
			| Statement::Literal {
				schema, ..
			}
			| Statement::Call {
				schema, ..
			}
			| Statement::Explode {
				schema, ..
			}
			| Statement::ExplodeData {
				schema, ..
			} => Some(schema),
			Statement::ExplodeSize {
				..
			} => None,
		}
	}
}

impl Display for Statement {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Statement::Ref {
				name,
				data,
				size,
				..
			} => {
				write!(f, "{} := ref({}", name, data)?;
				if let Some(size) = size {
					write!(f, ", size={}", size)?;
				}
				f.write_str(")")
			}
			Statement::Literal {
				to,
				value,
				..
			} => write!(f, "{} := literal({})", to, value),
			Statement::Call {
				to,
				function,
				args,
				size,
				..
			} => {
				write!(f, "{} := {}(", to, function)?;
				for (i, arg) in args.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", arg)?;
				}
				f.write_str(")")?;
				if let Some(size) = size {
					write!(f, " @ {}", size)?;
				}
				Ok(())
			}
			Statement::Explode {
				to,
				data,
				tosize,
				..
			} => write!(f, "{} := explode({}, {})", to, data, tosize),
			Statement::ExplodeSize {
				to,
				sizes,
			} => {
				write!(f, "{} := explodesize(", to)?;
				for (i, size) in sizes.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", size)?;
				}
				f.write_str(")")
			}
			Statement::ExplodeData {
				to,
				data,
				fromsize,
				tosizes,
				..
			} => {
				write!(f, "{} := explodedata({}, from={}, to=[", to, data, fromsize)?;
				for (i, size) in tosizes.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", size)?;
				}
				f.write_str("])")
			}
		}
	}
}

/// An ordered statement list plus its invariant checks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatementList {
	pub statements: Vec<Statement>,
}

impl StatementList {
	pub fn new(statements: Vec<Statement>) -> Self {
		Self {
			statements,
		}
	}

	/// §3 invariants: output names unique and never input names; every
	/// argument is either a declared input or a previously defined
	/// output.
	pub fn validate(&self, inputs: &std::collections::BTreeSet<ColumnName>) -> femtocode_type::Result<()> {
		let mut defined: std::collections::BTreeSet<&ColumnName> = Default::default();
		for statement in &self.statements {
			if matches!(statement, Statement::Ref { .. }) {
				continue;
			}
			let to = statement.to();
			if inputs.contains(to) || !defined.insert(to) {
				return Err(femtocode_type::internal_error!(
					"statement output '{}' collides with an existing column",
					to
				));
			}
			for read in statement.reads() {
				if !inputs.contains(read) && !defined.contains(read) {
					return Err(femtocode_type::internal_error!(
						"statement argument '{}' is not defined yet",
						read
					));
				}
			}
		}
		Ok(())
	}
}

impl Display for StatementList {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for statement in &self.statements {
			writeln!(f, "{}", statement)?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeSet;

	use super::*;

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	#[test]
	fn test_wire_round_trip() {
		let statements = StatementList::new(vec![
			Statement::Literal {
				to: col("#0"),
				schema: Schema::integer_all(),
				value: Value::Int(3),
			},
			Statement::Explode {
				to: col("#1"),
				schema: Schema::integer_all(),
				data: col("#0"),
				tosize: col("xs@size"),
			},
			Statement::Call {
				to: col("#2"),
				schema: Schema::real_all(),
				size: Some(col("xs@size")),
				function: "add".to_string(),
				args: vec![col("xs"), col("#1")],
			},
		]);
		let json = serde_json::to_string(&statements).unwrap();
		let back: StatementList = serde_json::from_str(&json).unwrap();
		assert_eq!(back, statements);
		assert!(json.contains("\"kind\":\"call\""));
	}

	#[test]
	fn test_validate_catches_duplicates_and_undefined() {
		let inputs: BTreeSet<ColumnName> = [col("xs")].into_iter().collect();
		let bad = StatementList::new(vec![Statement::Call {
			to: col("#0"),
			schema: Schema::real_all(),
			size: None,
			function: "add".to_string(),
			args: vec![col("xs"), col("#9")],
		}]);
		assert!(bad.validate(&inputs).is_err());

		let duplicate = StatementList::new(vec![
			Statement::Literal {
				to: col("#0"),
				schema: Schema::integer_all(),
				value: Value::Int(1),
			},
			Statement::Literal {
				to: col("#0"),
				schema: Schema::integer_all(),
				value: Value::Int(2),
			},
		]);
		assert!(duplicate.validate(&inputs).is_err());
	}

	#[test]
	fn test_rendering() {
		let statement = Statement::Call {
			to: col("#2"),
			schema: Schema::real_all(),
			size: Some(col("xs@size")),
			function: "add".to_string(),
			args: vec![col("xs"), col("#1")],
		};
		assert_eq!(statement.to_string(), "#2 := add(xs, #1) @ xs@size");
	}
}
