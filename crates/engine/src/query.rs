// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The compilation pipeline, end to end: expression tree → typed tree
//! → statement list → dependency graphs → ordered loops → kernels.
//! Also the wire shape a compiled query travels in.

use std::collections::{BTreeMap, BTreeSet};

use femtocode_columnar::{Dataset, layout};
use femtocode_lang::{
	Expr, FunctionTable, SlRef, Statement, StatementList,
	expr::{Binding, SymbolFrame},
	frame::Frame,
	statements::build_statements,
	typed::build_typed,
};
use femtocode_type::{ColumnName, Result, Schema};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
	action::Action,
	dag::{DependencyGraph, bucketfill, connected, order_loops},
	kernel::{CompiledLoop, compile_loop},
};

/// The query wire format: everything a worker needs to execute,
/// shipped as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
	pub dataset: Dataset,
	pub statements: Vec<Statement>,
	pub actions: Vec<Action>,
}

/// A fully compiled query: the ordered loops, what they need from the
/// dataset, and the action that folds group results together.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
	pub dataset: Dataset,
	pub statements: StatementList,
	pub inputs: BTreeSet<ColumnName>,
	pub result: SlRef,
	pub action: Action,
	pub loops: Vec<CompiledLoop>,
	pub size_depths: BTreeMap<ColumnName, usize>,
}

impl CompiledQuery {
	pub fn to_wire(&self) -> Query {
		Query {
			dataset: self.dataset.clone(),
			statements: self.statements.statements.clone(),
			actions: vec![self.action],
		}
	}

	/// The columns whose stripes must be fetched for every group.
	pub fn required(&self) -> &BTreeSet<ColumnName> {
		&self.inputs
	}
}

/// The columns the action reads once the loops have run.
fn action_targets(result: &SlRef, inputs: &BTreeSet<ColumnName>) -> BTreeSet<ColumnName> {
	let mut targets = BTreeSet::new();
	match &result.schema {
		Schema::Union {
			possibilities,
		} => {
			targets.insert(result.data.tag());
			for (index, possibility) in possibilities.iter().enumerate() {
				if !matches!(possibility, Schema::Null) {
					targets.insert(result.data.pos(index as u32));
				}
			}
		}
		_ => {
			targets.insert(result.data.clone());
		}
	}
	if let Some(size) = &result.size {
		targets.insert(size.clone());
	}
	targets.retain(|target| !inputs.contains(target));
	targets
}

#[instrument(name = "query::compile", level = "debug", skip_all, fields(dataset = %dataset.name))]
pub fn compile(
	expr: &Expr,
	dataset: &Dataset,
	action: Action,
	table: &FunctionTable,
) -> Result<CompiledQuery> {
	// name resolution against the dataset's lexical frame
	let symbols: SymbolFrame =
		Frame::with(dataset.schema.keys().map(|field| (field.clone(), Binding::Field)));
	expr.resolve(&symbols, table)?;

	// typing with range refinement
	let type_frame = Frame::with(
		dataset.schema.iter().map(|(field, schema)| (field.clone(), schema.clone())),
	);
	let typed = build_typed(expr, &type_frame, table)?;

	// lowering to the statement list
	let fields = dataset.field_refs()?;
	let built = build_statements(&typed.expr, &fields, table)?;
	let statements = StatementList::new(built.statements);
	statements.validate(&built.inputs)?;

	// dependency graphs per action target, partitioned and bucketed
	let targets = action_targets(&built.result, &built.inputs);
	let mut graphs = Vec::new();
	for target in &targets {
		graphs.push(DependencyGraph::new(target, &statements.statements, &built.inputs)?);
	}
	let mut loops = Vec::new();
	for group in connected(graphs) {
		let mut nodes = BTreeSet::new();
		for graph in &group {
			nodes.extend(graph.nodes.iter().copied());
		}
		loops.extend(bucketfill(&statements.statements, &nodes, &targets)?);
	}

	let literals: BTreeSet<ColumnName> = statements
		.statements
		.iter()
		.filter(|statement| matches!(statement, Statement::Literal { .. }))
		.map(|statement| statement.to().clone())
		.collect();
	let loops = order_loops(loops, &built.inputs, &literals)?;

	// recursive depths for every size column the kernels walk
	let mut size_depths = BTreeMap::new();
	for (field, field_schema) in &dataset.schema {
		size_depths
			.extend(layout::size_depths(field_schema, &ColumnName::root(field.clone()), None)?);
	}
	for statement in &statements.statements {
		if let Statement::ExplodeSize {
			to,
			sizes,
		} = statement
		{
			size_depths.insert(to.clone(), sizes.len());
		}
	}

	let loops =
		loops.iter().map(|l| compile_loop(l, &size_depths)).collect::<Result<Vec<_>>>()?;

	Ok(CompiledQuery {
		dataset: dataset.clone(),
		statements,
		inputs: built.inputs,
		result: built.result,
		action,
		loops,
		size_depths,
	})
}
