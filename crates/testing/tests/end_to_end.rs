// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Whole-pipeline tests: expression → compiled query → cache master →
//! fetchers → workers → tally, over in-memory stripes.

use std::{sync::Arc, time::Duration};

use femtocode_engine::{Action, Tally, compile};
use femtocode_lang::{Expr, FunctionTable};
use femtocode_runtime::{CacheMaster, MasterConfig, QueryStatus, RunningQuery, StripeSource};
use femtocode_testing::{DatasetBuilder, MemorySource, small_real};
use femtocode_type::{ColumnName, Result, Schema, Value};

fn call(function: &str, args: Vec<Expr>) -> Expr {
	Expr::Call {
		function: function.to_string(),
		args,
	}
}

fn flat_dataset(group_size: usize) -> (femtocode_columnar::Dataset, MemorySource) {
	let mut builder = DatasetBuilder::new("flat")
		.field("x", Schema::integer(femtocode_type::Bound::Exact(0.0), femtocode_type::Bound::Exact(100.0)))
		.field("y", small_real())
		.group_size(group_size);
	for i in 0..10 {
		builder = builder.entry([
			("x", Value::Int(i)),
			("y", Value::Float((i * 100) as f64 / 10.0)),
		]);
	}
	builder.build().unwrap()
}

fn master(workers: usize, source: MemorySource) -> CacheMaster {
	CacheMaster::start(
		MasterConfig {
			limit_bytes: 1024 * 1024,
			workers,
		},
		Arc::new(source),
	)
}

#[test]
fn test_flat_add_through_the_runtime() {
	let (dataset, source) = flat_dataset(4);
	let table = FunctionTable::standard();
	let compiled = compile(
		&call("+", vec![Expr::reference("x"), Expr::reference("y")]),
		&dataset,
		Action::Sum,
		&table,
	)
	.unwrap();

	let runtime = master(2, source);
	let query = RunningQuery::new(compiled);
	runtime.submit(Arc::clone(&query));

	let status = query.future.wait(Duration::from_secs(10));
	assert_eq!(status, QueryStatus::Done);

	// sum of i + 10 i over 0..10 = 45 + 450
	assert_eq!(query.future.tally(), Some(Tally::Sum(495.0)));
	let update = query.future.latest().unwrap();
	assert_eq!(update.loads_done, 1.0);
	assert_eq!(update.computes_done, 1.0);
	assert!(update.done);

	runtime.shutdown();
}

#[test]
fn test_partitioning_does_not_change_the_tally() {
	// the tally over groups partitioned two ways is equal
	let mut results = Vec::new();
	for group_size in [3, 10] {
		let (dataset, source) = flat_dataset(group_size);
		let table = FunctionTable::standard();
		let compiled = compile(
			&call("*", vec![Expr::reference("x"), Expr::reference("y")]),
			&dataset,
			Action::Sum,
			&table,
		)
		.unwrap();
		let runtime = master(3, source);
		let query = RunningQuery::new(compiled);
		runtime.submit(Arc::clone(&query));
		assert_eq!(query.future.wait(Duration::from_secs(10)), QueryStatus::Done);
		results.push(query.future.tally().unwrap());
		runtime.shutdown();
	}
	assert_eq!(results[0], results[1]);
}

#[test]
fn test_jagged_collect_through_the_runtime() {
	let (dataset, source) = DatasetBuilder::new("jagged")
		.field("xs", Schema::collection(small_real()))
		.field("y", small_real())
		.group_size(2)
		.entry([
			("xs", Value::list([Value::Float(1.0), Value::Float(2.0)])),
			("y", Value::Float(10.0)),
		])
		.entry([("xs", Value::list([])), ("y", Value::Float(20.0))])
		.entry([("xs", Value::list([Value::Float(3.0)])), ("y", Value::Float(30.0))])
		.build()
		.unwrap();

	let table = FunctionTable::standard();
	let compiled = compile(
		&call(".map", vec![
			Expr::reference("xs"),
			call("+", vec![Expr::reference("$1"), Expr::reference("y")]),
		]),
		&dataset,
		Action::Collect,
		&table,
	)
	.unwrap();

	let runtime = master(2, source);
	let query = RunningQuery::new(compiled);
	runtime.submit(Arc::clone(&query));
	assert_eq!(query.future.wait(Duration::from_secs(10)), QueryStatus::Done);

	let tally = query.future.tally().unwrap();
	let expected = Tally::Collect(
		[
			(0u64, vec![
				Value::list([Value::Float(11.0), Value::Float(12.0)]),
				Value::list([]),
			]),
			(1u64, vec![Value::list([Value::Float(33.0)])]),
		]
		.into_iter()
		.collect(),
	);
	assert_eq!(tally, expected);
	assert_eq!(
		tally.finalize(),
		Value::list([
			Value::list([Value::Float(11.0), Value::Float(12.0)]),
			Value::list([]),
			Value::list([Value::Float(33.0)]),
		])
	);

	runtime.shutdown();
}

#[test]
fn test_cancelled_query_terminates_without_failure() {
	let (dataset, source) = flat_dataset(1);
	let table = FunctionTable::standard();
	let compiled =
		compile(&Expr::reference("x"), &dataset, Action::Sum, &table).unwrap();
	let runtime = master(1, source);

	let query = RunningQuery::new(compiled);
	query.cancel();
	runtime.submit(Arc::clone(&query));
	assert_eq!(query.future.wait(Duration::from_secs(2)), QueryStatus::Cancelled);

	runtime.shutdown();
}

struct HalfBrokenSource {
	inner: MemorySource,
	broken: ColumnName,
}

impl StripeSource for HalfBrokenSource {
	fn read(&self, column: &ColumnName, group: u64) -> Result<Vec<u8>> {
		if column == &self.broken {
			Err(femtocode_type::error::Diagnostic::new("FETCH_001", "simulated i/o timeout").into())
		} else {
			self.inner.read(column, group)
		}
	}
}

#[test]
fn test_fetch_failure_fails_the_query() {
	let (dataset, source) = flat_dataset(5);
	let table = FunctionTable::standard();
	let compiled = compile(
		&call("+", vec![Expr::reference("x"), Expr::reference("y")]),
		&dataset,
		Action::Sum,
		&table,
	)
	.unwrap();

	let runtime = CacheMaster::start(
		MasterConfig {
			limit_bytes: 1024 * 1024,
			workers: 1,
		},
		Arc::new(HalfBrokenSource {
			inner: source,
			broken: "y".parse().unwrap(),
		}),
	);
	let query = RunningQuery::new(compiled);
	runtime.submit(Arc::clone(&query));

	let status = query.future.wait(Duration::from_secs(10));
	assert_eq!(status, QueryStatus::Failed);
	let update = query.future.latest().unwrap();
	match update.data {
		femtocode_runtime::UpdateData::Failure {
			failure,
		} => assert_eq!(failure.code, "FETCH_001"),
		other => panic!("unexpected {:?}", other),
	}

	runtime.shutdown();
}

#[test]
fn test_two_queries_share_cached_stripes() {
	let (dataset, source) = flat_dataset(10);
	let table = FunctionTable::standard();
	let runtime = master(2, source);

	let first = RunningQuery::new(
		compile(
			&call("+", vec![Expr::reference("x"), Expr::reference("y")]),
			&dataset,
			Action::Sum,
			&table,
		)
		.unwrap(),
	);
	let second = RunningQuery::new(
		compile(
			&call("*", vec![Expr::reference("x"), Expr::reference("y")]),
			&dataset,
			Action::Max,
			&table,
		)
		.unwrap(),
	);
	runtime.submit(Arc::clone(&first));
	runtime.submit(Arc::clone(&second));

	assert_eq!(first.future.wait(Duration::from_secs(10)), QueryStatus::Done);
	assert_eq!(second.future.wait(Duration::from_secs(10)), QueryStatus::Done);
	assert_eq!(first.future.tally(), Some(Tally::Sum(495.0)));
	assert_eq!(second.future.tally(), Some(Tally::Max(9.0 * 90.0)));

	runtime.shutdown();
}
