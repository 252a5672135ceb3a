// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! One executor per submitted query. It owns the compiled loop
//! sequence and the per-group accounting, runs loops in order against
//! a group's input stripes, and folds each group's subtally into the
//! accumulated tally under its own lock.

use std::{
	collections::{BTreeMap, BTreeSet},
	time::{Duration, Instant},
};

use femtocode_columnar::{ArrayBuffer, ColumnBuffers, assemble_all};
use femtocode_lang::SlRef;
use femtocode_type::{ColumnName, Error, Result, Schema, Value, internal_error};
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::{
	action::Tally,
	kernel::{Workspace, materialize_literals},
	query::CompiledQuery,
};

#[derive(Debug)]
struct ExecutorState {
	loads_done: BTreeSet<u64>,
	computes_done: BTreeSet<u64>,
	compute_time: Duration,
	tally: Tally,
	cancelled: bool,
	failure: Option<Error>,
}

/// Progress as reported to the query's future.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
	pub loads_done: f64,
	pub computes_done: f64,
	pub done: bool,
	pub compute_time: f64,
	pub tally: Tally,
	pub failure: Option<Error>,
	pub cancelled: bool,
}

#[derive(Debug)]
pub struct Executor {
	pub query: CompiledQuery,
	state: Mutex<ExecutorState>,
}

impl Executor {
	pub fn new(query: CompiledQuery) -> Self {
		let tally = query.action.initialize();
		Self {
			query,
			state: Mutex::new(ExecutorState {
				loads_done: BTreeSet::new(),
				computes_done: BTreeSet::new(),
				compute_time: Duration::ZERO,
				tally,
				cancelled: false,
				failure: None,
			}),
		}
	}

	pub fn cancel(&self) {
		self.state.lock().cancelled = true;
	}

	pub fn cancelled(&self) -> bool {
		self.state.lock().cancelled
	}

	/// Record a failure; the first one cancels the query.
	pub fn fail(&self, error: Error) {
		let mut state = self.state.lock();
		if state.failure.is_none() {
			state.failure = Some(error);
		}
		state.cancelled = true;
	}

	pub fn mark_loaded(&self, group: u64) {
		self.state.lock().loads_done.insert(group);
	}

	pub fn progress(&self) -> Progress {
		let state = self.state.lock();
		let groups = self.query.dataset.num_groups.max(1) as f64;
		Progress {
			loads_done: state.loads_done.len() as f64 / groups,
			computes_done: state.computes_done.len() as f64 / groups,
			done: state.computes_done.len() as u64 >= self.query.dataset.num_groups,
			compute_time: state.compute_time.as_secs_f64(),
			tally: state.tally.clone(),
			failure: state.failure.clone(),
			cancelled: state.cancelled,
		}
	}

	/// Run every loop in order over one group's stripes and fold the
	/// group's subtally into the accumulated tally.
	#[instrument(name = "executor::run", level = "debug", skip(self, inarrays))]
	pub fn run(
		&self,
		inarrays: &BTreeMap<ColumnName, ArrayBuffer>,
		group: u64,
		num_entries: usize,
	) -> Result<Tally> {
		let started = Instant::now();

		let mut workspace = Workspace::new(inarrays);
		materialize_literals(&self.query.statements.statements, &mut workspace)?;
		for compiled in &self.query.loops {
			compiled.run(&mut workspace, num_entries)?;
		}

		let (leaves, values) = match self.query.action {
			crate::action::Action::Collect => {
				(Vec::new(), self.collect_values(&workspace, num_entries)?)
			}
			_ => (self.result_leaves(&workspace, num_entries)?, Vec::new()),
		};
		let subtally = self.query.action.subtally(group, &leaves, values);

		let elapsed = started.elapsed();
		let mut state = self.state.lock();
		state.compute_time += elapsed;
		state.computes_done.insert(group);
		let tally = std::mem::replace(&mut state.tally, self.query.action.initialize());
		state.tally = tally.update(subtally.clone())?;
		debug!(group, elapsed_us = elapsed.as_micros() as u64, "group computed");
		Ok(subtally)
	}

	pub fn tally(&self) -> Tally {
		self.state.lock().tally.clone()
	}

	/// The final stripe's values as floats, for the numeric actions.
	fn result_leaves(&self, workspace: &Workspace<'_>, num_entries: usize) -> Result<Vec<f64>> {
		let result = &self.query.result;
		if matches!(result.schema, Schema::Union { .. } | Schema::Str { .. }) {
			return Ok(Vec::new());
		}
		let view = workspace.view(&result.data)?;
		match view.len() {
			Some(length) => (0..length).map(|i| view.f64_at(i)).collect(),
			None => (0..num_entries).map(|_| view.f64_at(0)).collect(),
		}
	}

	/// Assemble the result column back into per-entry values.
	fn collect_values(&self, workspace: &Workspace<'_>, num_entries: usize) -> Result<Vec<Value>> {
		let result = &self.query.result;
		let mut buffers = ColumnBuffers::new();
		self.stage(workspace, result, num_entries, &mut buffers)?;
		assemble_all(&result.schema, &result.data, &buffers, num_entries, None)
	}

	/// Copy the stripes backing a result reference into an assembly
	/// buffer set under the names the assembler expects.
	fn stage(
		&self,
		workspace: &Workspace<'_>,
		result: &SlRef,
		num_entries: usize,
		buffers: &mut ColumnBuffers,
	) -> Result<()> {
		match &result.schema {
			Schema::Union {
				possibilities,
			} => {
				let tag = result.data.tag();
				buffers.insert(tag.clone(), self.materialized(workspace, &tag, num_entries)?);
				for (index, possibility) in possibilities.iter().enumerate() {
					if matches!(possibility, Schema::Null) {
						continue;
					}
					let column = result.data.pos(index as u32);
					buffers.insert(
						column.clone(),
						self.materialized(workspace, &column, num_entries)?,
					);
				}
			}
			_ => {
				buffers.insert(
					result.data.clone(),
					self.materialized(workspace, &result.data, num_entries)?,
				);
			}
		}
		if let Some(size) = &result.size {
			buffers.insert(result.data.size(), self.materialized(workspace, size, num_entries)?);
		}
		Ok(())
	}

	/// An owned copy of a column's stripe; broadcast scalars widen to
	/// one value per entry.
	fn materialized(
		&self,
		workspace: &Workspace<'_>,
		column: &ColumnName,
		num_entries: usize,
	) -> Result<ArrayBuffer> {
		if let Some(scalar) = workspace.scalars.get(column) {
			return Ok(match scalar {
				crate::kernel::Scalar::Int(v) => ArrayBuffer::Int(vec![*v; num_entries]),
				crate::kernel::Scalar::Float(v) => ArrayBuffer::Float(vec![*v; num_entries]),
			});
		}
		workspace
			.temps
			.get(column)
			.or_else(|| workspace.inputs.get(column))
			.cloned()
			.ok_or_else(|| internal_error!("result column '{}' was never materialized", column))
	}
}

#[cfg(test)]
mod tests {
	use femtocode_columnar::Dataset;
	use femtocode_lang::{Expr, FunctionTable};

	use super::*;
	use crate::{action::Action, query::compile};

	fn call(function: &str, args: Vec<Expr>) -> Expr {
		Expr::Call {
			function: function.to_string(),
			args,
		}
	}

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	#[test]
	fn test_flat_add_end_to_end() {
		// x + y over x = 0..9, y = 0, 100, ..., 900
		let mut dataset = Dataset::from_schema(
			"flat",
			[("x", Schema::integer_all()), ("y", Schema::real_all())],
			None,
		)
		.unwrap();
		dataset.num_entries = 10;
		dataset.num_groups = 1;

		let table = FunctionTable::standard();
		let query = compile(
			&call("+", vec![Expr::reference("x"), Expr::reference("y")]),
			&dataset,
			Action::Collect,
			&table,
		)
		.unwrap();
		assert_eq!(query.result.schema, Schema::real_all());

		let executor = Executor::new(query);
		let mut inputs = BTreeMap::new();
		inputs.insert(col("x"), ArrayBuffer::Int((0..10).collect()));
		inputs.insert(col("y"), ArrayBuffer::Float((0..10).map(|i| (i * 100) as f64).collect()));
		let tally = executor.run(&inputs, 0, 10).unwrap();

		let expected: Vec<Value> =
			(0..10).map(|i| Value::Float((i + i * 100) as f64)).collect();
		assert_eq!(tally, Tally::Collect([(0, expected)].into_iter().collect()));

		let progress = executor.progress();
		assert!(progress.done);
		assert_eq!(progress.computes_done, 1.0);
	}

	#[test]
	fn test_jagged_broadcast_end_to_end() {
		// xs.map($1 + y): broadcast then add, per entry
		let mut dataset = Dataset::from_schema(
			"jagged",
			[
				("xs", Schema::collection(Schema::real_all())),
				("y", Schema::real_all()),
			],
			None,
		)
		.unwrap();
		dataset.num_entries = 3;
		dataset.num_groups = 1;

		let table = FunctionTable::standard();
		let query = compile(
			&call(".map", vec![
				Expr::reference("xs"),
				call("+", vec![Expr::reference("$1"), Expr::reference("y")]),
			]),
			&dataset,
			Action::Collect,
			&table,
		)
		.unwrap();

		let executor = Executor::new(query);
		let mut inputs = BTreeMap::new();
		inputs.insert(col("xs"), ArrayBuffer::Float(vec![1.0, 2.0, 3.0]));
		inputs.insert(col("xs@size"), ArrayBuffer::Int(vec![2, 0, 1]));
		inputs.insert(col("y"), ArrayBuffer::Float(vec![10.0, 20.0, 30.0]));
		let tally = executor.run(&inputs, 0, 3).unwrap();

		let expected = vec![
			Value::list([Value::Float(11.0), Value::Float(12.0)]),
			Value::list([]),
			Value::list([Value::Float(33.0)]),
		];
		assert_eq!(tally, Tally::Collect([(0, expected)].into_iter().collect()));
	}

	#[test]
	fn test_sum_action() {
		let mut dataset =
			Dataset::from_schema("sums", [("x", Schema::real_all())], None).unwrap();
		dataset.num_entries = 4;
		dataset.num_groups = 2;

		let table = FunctionTable::standard();
		let query = compile(
			&call("*", vec![Expr::reference("x"), Expr::literal(Value::Int(2))]),
			&dataset,
			Action::Sum,
			&table,
		)
		.unwrap();
		let executor = Executor::new(query);

		let mut first = BTreeMap::new();
		first.insert(col("x"), ArrayBuffer::Float(vec![1.0, 2.0]));
		executor.run(&first, 0, 2).unwrap();
		let mut second = BTreeMap::new();
		second.insert(col("x"), ArrayBuffer::Float(vec![3.0, 4.0]));
		executor.run(&second, 1, 2).unwrap();

		assert_eq!(executor.tally(), Tally::Sum(20.0));
		assert!(executor.progress().done);
	}

	#[test]
	fn test_failure_cancels() {
		let dataset = Dataset::from_schema("f", [("x", Schema::real_all())], None).unwrap();
		let table = FunctionTable::standard();
		let query = compile(&Expr::reference("x"), &dataset, Action::Sum, &table).unwrap();
		let executor = Executor::new(query);
		assert!(!executor.cancelled());
		executor.fail(internal_error!("boom"));
		assert!(executor.cancelled());
		assert!(executor.progress().failure.is_some());
	}
}
