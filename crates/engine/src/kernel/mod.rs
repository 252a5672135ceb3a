// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The loop-kernel interpreter. Each loop compiles into a list of
//! typed operations over flat `i64`/`f64` stripes; running a loop is
//! deterministic, reentrant, and confined to the calling thread. The
//! interpreter was chosen over a JIT: kernels here are memory-bound
//! array sweeps, and an op-at-a-time pass per statement keeps the
//! executor free of codegen state.

pub mod explode;

mod ops;

use std::collections::BTreeMap;

use femtocode_columnar::ArrayBuffer;
use femtocode_lang::Statement;
use femtocode_type::{ColumnName, Result, Value, internal_error};

pub use ops::{Op, PointwiseOp};

use crate::dag::Loop;

/// A broadcast constant: a literal statement materialized without an
/// array.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
	Int(i64),
	Float(f64),
}

impl Scalar {
	pub fn of(value: &Value) -> Result<Scalar> {
		match value {
			Value::Bool(b) => Ok(Scalar::Int(*b as i64)),
			Value::Int(v) => Ok(Scalar::Int(*v)),
			Value::Float(v) => Ok(Scalar::Float(*v)),
			Value::Null => Ok(Scalar::Int(0)),
			other => Err(internal_error!("literal {} has no kernel representation", other)),
		}
	}
}

/// One column as the kernel sees it.
#[derive(Debug, Clone, Copy)]
pub enum View<'a> {
	Int(&'a [i64]),
	Float(&'a [f64]),
	ScalarInt(i64),
	ScalarFloat(f64),
}

impl<'a> View<'a> {
	pub fn len(&self) -> Option<usize> {
		match self {
			View::Int(v) => Some(v.len()),
			View::Float(v) => Some(v.len()),
			View::ScalarInt(_) | View::ScalarFloat(_) => None,
		}
	}

	pub fn f64_at(&self, index: usize) -> Result<f64> {
		match self {
			View::Int(v) => v.get(index).map(|x| *x as f64),
			View::Float(v) => v.get(index).copied(),
			View::ScalarInt(x) => Some(*x as f64),
			View::ScalarFloat(x) => Some(*x),
		}
		.ok_or_else(|| internal_error!("stripe read out of range at {}", index))
	}

	pub fn i64_at(&self, index: usize) -> Result<i64> {
		match self {
			View::Int(v) => v.get(index).copied(),
			View::Float(v) => v.get(index).map(|x| *x as i64),
			View::ScalarInt(x) => Some(*x),
			View::ScalarFloat(x) => Some(*x as i64),
		}
		.ok_or_else(|| internal_error!("stripe read out of range at {}", index))
	}

	pub fn ints(&self) -> Result<&'a [i64]> {
		match self {
			View::Int(v) => Ok(v),
			_ => Err(internal_error!("a size column must be an integer stripe")),
		}
	}
}

/// Everything a running loop can read or write: borrowed input
/// stripes, owned temporaries, and broadcast scalars.
#[derive(Debug)]
pub struct Workspace<'a> {
	pub inputs: &'a BTreeMap<ColumnName, ArrayBuffer>,
	pub temps: BTreeMap<ColumnName, ArrayBuffer>,
	pub scalars: BTreeMap<ColumnName, Scalar>,
}

impl<'a> Workspace<'a> {
	pub fn new(inputs: &'a BTreeMap<ColumnName, ArrayBuffer>) -> Self {
		Self {
			inputs,
			temps: BTreeMap::new(),
			scalars: BTreeMap::new(),
		}
	}

	pub fn view(&self, name: &ColumnName) -> Result<View<'_>> {
		if let Some(scalar) = self.scalars.get(name) {
			return Ok(match scalar {
				Scalar::Int(v) => View::ScalarInt(*v),
				Scalar::Float(v) => View::ScalarFloat(*v),
			});
		}
		let buffer = self
			.temps
			.get(name)
			.or_else(|| self.inputs.get(name))
			.ok_or_else(|| internal_error!("column '{}' is not materialized", name))?;
		match buffer {
			ArrayBuffer::Int(v) => Ok(View::Int(v)),
			ArrayBuffer::Float(v) => Ok(View::Float(v)),
			ArrayBuffer::Bytes(_) => Err(internal_error!("column '{}' has no kernel view", name)),
		}
	}
}

/// One loop, compiled: a single iterator kernel over aligned stripes,
/// in interpretable form.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledLoop {
	pub size: Option<ColumnName>,
	/// Levels of the loop's size column's recursive encoding.
	pub size_depth: usize,
	pub params: Vec<ColumnName>,
	pub targets: Vec<ColumnName>,
	pub ops: Vec<Op>,
}

pub fn compile_loop(l: &Loop, size_depths: &BTreeMap<ColumnName, usize>) -> Result<CompiledLoop> {
	let mut ops = Vec::with_capacity(l.statements.len());
	for statement in &l.statements {
		ops.push(Op::compile(statement, size_depths)?);
	}
	let size_depth = match &l.size {
		Some(size) => size_depths
			.get(size)
			.copied()
			.ok_or_else(|| internal_error!("size column '{}' has no recorded depth", size))?,
		None => 0,
	};
	Ok(CompiledLoop {
		size: l.size.clone(),
		size_depth,
		params: l.params.iter().cloned().collect(),
		targets: l.targets.iter().cloned().collect(),
		ops,
	})
}

impl CompiledLoop {
	/// The stripe length this loop's pointwise cursor runs over.
	fn imax(&self, workspace: &Workspace<'_>, num_entries: usize) -> Result<usize> {
		match &self.size {
			None => Ok(num_entries),
			Some(size) => {
				let sizes = workspace.view(size)?;
				explode::total_leaves(sizes.ints()?, self.size_depth)
			}
		}
	}

	pub fn run(&self, workspace: &mut Workspace<'_>, num_entries: usize) -> Result<()> {
		let mut imax = None;
		for op in &self.ops {
			if op.is_pointwise() && imax.is_none() {
				imax = Some(self.imax(workspace, num_entries)?);
			}
			let (to, buffer) = op.execute(workspace, num_entries, imax)?;
			workspace.temps.insert(to, buffer);
		}
		Ok(())
	}
}

/// Materialize every literal statement as a broadcast scalar.
pub fn materialize_literals(statements: &[Statement], workspace: &mut Workspace<'_>) -> Result<()> {
	for statement in statements {
		if let Statement::Literal {
			to,
			value,
			..
		} = statement
		{
			workspace.scalars.insert(to.clone(), Scalar::of(value)?);
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use femtocode_type::Schema;

	use super::*;

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	#[test]
	fn test_scalar_of() {
		assert_eq!(Scalar::of(&Value::Bool(true)).unwrap(), Scalar::Int(1));
		assert_eq!(Scalar::of(&Value::Int(-2)).unwrap(), Scalar::Int(-2));
		assert_eq!(Scalar::of(&Value::Float(0.5)).unwrap(), Scalar::Float(0.5));
		assert!(Scalar::of(&Value::Str("x".to_string())).is_err());
	}

	#[test]
	fn test_run_flat_loop() {
		// out = x + y at entry level
		let statements = vec![Statement::Call {
			to: col("#0"),
			schema: Schema::real_all(),
			size: None,
			function: "add".to_string(),
			args: vec![col("x"), col("y")],
		}];
		let l = Loop {
			size: None,
			statements,
			params: [col("x"), col("y")].into_iter().collect(),
			targets: [col("#0")].into_iter().collect(),
		};
		let compiled = compile_loop(&l, &BTreeMap::new()).unwrap();

		let mut inputs = BTreeMap::new();
		inputs.insert(col("x"), ArrayBuffer::Int(vec![0, 1, 2]));
		inputs.insert(col("y"), ArrayBuffer::Float(vec![0.0, 100.0, 200.0]));
		let mut workspace = Workspace::new(&inputs);
		compiled.run(&mut workspace, 3).unwrap();

		assert_eq!(workspace.temps[&col("#0")], ArrayBuffer::Float(vec![0.0, 101.0, 202.0]));
	}

	#[test]
	fn test_run_jagged_loop_with_explode() {
		// xs.map($1 + y): explode y along xs@size, then add
		let statements = vec![
			Statement::Explode {
				to: col("#0"),
				schema: Schema::real_all(),
				data: col("y"),
				tosize: col("xs@size"),
			},
			Statement::Call {
				to: col("#1"),
				schema: Schema::real_all(),
				size: Some(col("xs@size")),
				function: "add".to_string(),
				args: vec![col("xs"), col("#0")],
			},
		];
		let l = Loop {
			size: Some(col("xs@size")),
			statements,
			params: [col("xs"), col("xs@size"), col("y")].into_iter().collect(),
			targets: [col("#1")].into_iter().collect(),
		};
		let mut depths = BTreeMap::new();
		depths.insert(col("xs@size"), 1);
		let compiled = compile_loop(&l, &depths).unwrap();

		let mut inputs = BTreeMap::new();
		inputs.insert(col("xs"), ArrayBuffer::Float(vec![1.0, 2.0, 3.0]));
		inputs.insert(col("xs@size"), ArrayBuffer::Int(vec![2, 0, 1]));
		inputs.insert(col("y"), ArrayBuffer::Float(vec![10.0, 20.0, 30.0]));
		let mut workspace = Workspace::new(&inputs);
		compiled.run(&mut workspace, 3).unwrap();

		assert_eq!(
			workspace.temps[&col("#1")],
			ArrayBuffer::Float(vec![11.0, 12.0, 33.0])
		);
	}

	#[test]
	fn test_reentrant() {
		// the same compiled loop runs twice with identical results
		let statements = vec![Statement::Call {
			to: col("#0"),
			schema: Schema::integer_all(),
			size: None,
			function: "mul".to_string(),
			args: vec![col("x"), col("x")],
		}];
		let l = Loop {
			size: None,
			statements,
			params: [col("x")].into_iter().collect(),
			targets: [col("#0")].into_iter().collect(),
		};
		let compiled = compile_loop(&l, &BTreeMap::new()).unwrap();
		let mut inputs = BTreeMap::new();
		inputs.insert(col("x"), ArrayBuffer::Int(vec![3, -4]));
		for _ in 0..2 {
			let mut workspace = Workspace::new(&inputs);
			compiled.run(&mut workspace, 2).unwrap();
			assert_eq!(workspace.temps[&col("#0")], ArrayBuffer::Int(vec![9, 16]));
		}
	}
}
