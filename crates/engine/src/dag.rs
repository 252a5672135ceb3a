// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Statement list → dependency DAG → loops. A dependency graph hangs
//! off each action target; connected subgraphs are found by node-set
//! intersection; within one, `bucketfill` groups statements sharing a
//! stripe-size column into a loop, and the loops are ordered so every
//! parameter is produced before it is read.

use std::collections::{BTreeMap, BTreeSet};

use femtocode_lang::Statement;
use femtocode_type::{ColumnName, Result, internal_error};
use tracing::instrument;

/// The transitive closure of statements one target column depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyGraph {
	pub target: ColumnName,
	/// Statement indices into the originating list, in list order.
	pub nodes: BTreeSet<usize>,
	/// Dataset-resident columns (reads with no defining statement).
	pub required: BTreeSet<ColumnName>,
}

impl DependencyGraph {
	pub fn new(
		target: &ColumnName,
		statements: &[Statement],
		inputs: &BTreeSet<ColumnName>,
	) -> Result<Self> {
		let defs: BTreeMap<&ColumnName, usize> = statements
			.iter()
			.enumerate()
			.map(|(index, statement)| (statement.to(), index))
			.collect();

		let mut nodes = BTreeSet::new();
		let mut required = BTreeSet::new();
		let mut pending = vec![target.clone()];
		while let Some(column) = pending.pop() {
			match defs.get(&column) {
				Some(&index) => {
					if nodes.insert(index) {
						for read in statements[index].reads() {
							pending.push(read.clone());
						}
					}
				}
				None => {
					if !inputs.contains(&column) {
						return Err(internal_error!(
							"column '{}' is neither computed nor dataset-resident",
							column
						));
					}
					required.insert(column);
				}
			}
		}

		Ok(Self {
			target: target.clone(),
			nodes,
			required,
		})
	}

	/// Two graphs are connected iff their node sets intersect.
	pub fn intersects(&self, other: &DependencyGraph) -> bool {
		self.nodes.intersection(&other.nodes).next().is_some()
	}
}

/// Partition graphs into connected subgraphs.
pub fn connected(graphs: Vec<DependencyGraph>) -> Vec<Vec<DependencyGraph>> {
	let mut groups: Vec<Vec<DependencyGraph>> = Vec::new();
	for graph in graphs {
		let mut matched: Vec<usize> =
			groups.iter().enumerate().filter(|(_, g)| g.iter().any(|x| x.intersects(&graph))).map(|(i, _)| i).collect();
		match matched.as_slice() {
			[] => groups.push(vec![graph]),
			[index] => groups[*index].push(graph),
			_ => {
				// the new graph bridges several groups: merge them
				let first = matched.remove(0);
				for index in matched.into_iter().rev() {
					let merged = groups.remove(index);
					groups[first].extend(merged);
				}
				groups[first].push(graph);
			}
		}
	}
	groups
}

/// One stripe-length loop: statements sharing a size column, compiled
/// together into a single kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
	/// The stripe-size column; `None` is the entry-level loop.
	pub size: Option<ColumnName>,
	/// Statements in original list order.
	pub statements: Vec<Statement>,
	/// Reads that are not internal writes.
	pub params: BTreeSet<ColumnName>,
	/// Outputs read by other loops or by the action.
	pub targets: BTreeSet<ColumnName>,
}

/// Group one connected subgraph's statements into loops keyed by their
/// stripe-size column. Multi-size `ExplodeData` statements join the
/// loop of the `ExplodeSize` that defines their combined shape.
#[instrument(name = "dag::bucketfill", level = "debug", skip_all)]
pub fn bucketfill(
	statements: &[Statement],
	nodes: &BTreeSet<usize>,
	action_targets: &BTreeSet<ColumnName>,
) -> Result<Vec<Loop>> {
	// the combined-shape index: sizes list → ExplodeSize output
	let mut combined: BTreeMap<Vec<ColumnName>, ColumnName> = BTreeMap::new();
	for &index in nodes {
		if let Statement::ExplodeSize {
			to,
			sizes,
		} = &statements[index]
		{
			combined.insert(sizes.clone(), to.clone());
		}
	}

	let key_of = |statement: &Statement| -> Result<Option<ColumnName>> {
		match statement {
			Statement::ExplodeData {
				tosizes, ..
			} if tosizes.len() > 1 => combined
				.get(tosizes)
				.cloned()
				.map(Some)
				.ok_or_else(|| internal_error!("explodedata misses its combined shape")),
			other => Ok(other.size_key().cloned()),
		}
	};

	let mut loops: Vec<Loop> = Vec::new();
	let mut order: Vec<Option<ColumnName>> = Vec::new();
	for &index in nodes {
		let statement = &statements[index];
		// literals are prematerialized scalars, not loop work
		if matches!(statement, Statement::Literal { .. } | Statement::Ref { .. }) {
			continue;
		}
		let key = key_of(statement)?;
		let at = match order.iter().position(|existing| *existing == key) {
			Some(at) => at,
			None => {
				order.push(key.clone());
				loops.push(Loop {
					size: key,
					statements: Vec::new(),
					params: BTreeSet::new(),
					targets: BTreeSet::new(),
				});
				loops.len() - 1
			}
		};
		loops[at].statements.push(statement.clone());
	}

	// parameters and targets
	let mut writer: BTreeMap<ColumnName, usize> = BTreeMap::new();
	for (at, l) in loops.iter().enumerate() {
		for statement in &l.statements {
			writer.insert(statement.to().clone(), at);
		}
	}
	for at in 0..loops.len() {
		let mut params = BTreeSet::new();
		for statement in &loops[at].statements {
			for read in statement.reads() {
				if writer.get(read) != Some(&at) {
					params.insert(read.clone());
				}
			}
		}
		if let Some(size) = &loops[at].size {
			if writer.get(size) != Some(&at) {
				params.insert(size.clone());
			}
		}
		loops[at].params = params;
	}
	for at in 0..loops.len() {
		let mut targets = BTreeSet::new();
		for statement in &loops[at].statements {
			let to = statement.to();
			let read_elsewhere = loops
				.iter()
				.enumerate()
				.any(|(other, l)| other != at && l.params.contains(to));
			if read_elsewhere || action_targets.contains(to) {
				targets.insert(to.clone());
			}
		}
		loops[at].targets = targets;
	}

	Ok(loops)
}

/// Order loops so that every parameter is either dataset-resident, a
/// prematerialized literal, or a target of an earlier loop.
pub fn order_loops(
	mut loops: Vec<Loop>,
	inputs: &BTreeSet<ColumnName>,
	literals: &BTreeSet<ColumnName>,
) -> Result<Vec<Loop>> {
	let mut satisfied: BTreeSet<ColumnName> = inputs.union(literals).cloned().collect();
	let mut ordered = Vec::with_capacity(loops.len());
	while !loops.is_empty() {
		let ready = loops.iter().position(|l| {
			l.params.iter().all(|param| satisfied.contains(param))
				&& l.size.as_ref().map(|s| satisfied.contains(s) || l.statements.iter().any(|st| st.to() == s)).unwrap_or(true)
		});
		let Some(ready) = ready else {
			return Err(internal_error!("loop dependencies form a cycle"));
		};
		let l = loops.remove(ready);
		for statement in &l.statements {
			satisfied.insert(statement.to().clone());
		}
		ordered.push(l);
	}
	Ok(ordered)
}

#[cfg(test)]
mod tests {
	use femtocode_type::Schema;

	use super::*;

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	fn call(to: &str, size: Option<&str>, args: &[&str]) -> Statement {
		Statement::Call {
			to: col(to),
			schema: Schema::real_all(),
			size: size.map(col),
			function: "add".to_string(),
			args: args.iter().map(|a| col(a)).collect(),
		}
	}

	#[test]
	fn test_graph_collects_dependencies_and_required() {
		let statements = vec![
			call("#0", None, &["x", "y"]),
			call("#1", None, &["#0", "z"]),
			call("#9", None, &["unrelated"]),
		];
		let inputs: BTreeSet<ColumnName> =
			["x", "y", "z", "unrelated"].iter().map(|s| col(s)).collect();
		let graph = DependencyGraph::new(&col("#1"), &statements, &inputs).unwrap();
		assert_eq!(graph.nodes, [0, 1].into_iter().collect());
		assert_eq!(graph.required, ["x", "y", "z"].iter().map(|s| col(s)).collect());
	}

	#[test]
	fn test_missing_column_is_an_error() {
		let statements = vec![call("#0", None, &["ghost"])];
		let inputs = BTreeSet::new();
		assert!(DependencyGraph::new(&col("#0"), &statements, &inputs).is_err());
	}

	#[test]
	fn test_connected_partition() {
		let statements = vec![
			call("#0", None, &["x"]),
			call("#1", None, &["#0"]),
			call("#2", None, &["y"]),
		];
		let inputs: BTreeSet<ColumnName> = ["x", "y"].iter().map(|s| col(s)).collect();
		let a = DependencyGraph::new(&col("#1"), &statements, &inputs).unwrap();
		let b = DependencyGraph::new(&col("#0"), &statements, &inputs).unwrap();
		let c = DependencyGraph::new(&col("#2"), &statements, &inputs).unwrap();
		let groups = connected(vec![a, b, c]);
		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].len(), 2);
		assert_eq!(groups[1].len(), 1);
	}

	#[test]
	fn test_bucketfill_groups_by_size() {
		let statements = vec![
			Statement::Explode {
				to: col("#0"),
				schema: Schema::real_all(),
				data: col("y"),
				tosize: col("xs@size"),
			},
			call("#1", Some("xs@size"), &["xs", "#0"]),
			call("#2", None, &["met", "met"]),
		];
		let nodes: BTreeSet<usize> = [0, 1, 2].into_iter().collect();
		let targets: BTreeSet<ColumnName> = [col("#1"), col("#2")].into_iter().collect();
		let loops = bucketfill(&statements, &nodes, &targets).unwrap();
		assert_eq!(loops.len(), 2);
		let jagged = loops.iter().find(|l| l.size == Some(col("xs@size"))).unwrap();
		assert_eq!(jagged.statements.len(), 2);
		assert!(jagged.params.contains(&col("xs")));
		assert!(jagged.params.contains(&col("y")));
		assert!(jagged.targets.contains(&col("#1")));
		// the explode feeding the call is loop-internal, not a target
		assert!(!jagged.targets.contains(&col("#0")));
	}

	#[test]
	fn test_order_loops_respects_dependencies() {
		// loop B consumes loop A's target
		let a = Loop {
			size: None,
			statements: vec![call("#0", None, &["x"])],
			params: [col("x")].into_iter().collect(),
			targets: [col("#0")].into_iter().collect(),
		};
		let b = Loop {
			size: Some(col("xs@size")),
			statements: vec![Statement::Explode {
				to: col("#1"),
				schema: Schema::real_all(),
				data: col("#0"),
				tosize: col("xs@size"),
			}],
			params: [col("#0"), col("xs@size")].into_iter().collect(),
			targets: [col("#1")].into_iter().collect(),
		};
		let inputs: BTreeSet<ColumnName> = [col("x"), col("xs@size")].into_iter().collect();
		let ordered = order_loops(vec![b.clone(), a.clone()], &inputs, &BTreeSet::new()).unwrap();
		assert_eq!(ordered[0], a);
		assert_eq!(ordered[1], b);
	}

	#[test]
	fn test_order_loops_detects_cycles() {
		let a = Loop {
			size: None,
			statements: vec![call("#0", None, &["#1"])],
			params: [col("#1")].into_iter().collect(),
			targets: [col("#0")].into_iter().collect(),
		};
		let b = Loop {
			size: Some(col("s@size")),
			statements: vec![call("#1", Some("s@size"), &["#0"])],
			params: [col("#0"), col("s@size")].into_iter().collect(),
			targets: [col("#1")].into_iter().collect(),
		};
		let inputs: BTreeSet<ColumnName> = [col("s@size")].into_iter().collect();
		assert!(order_loops(vec![a, b], &inputs, &BTreeSet::new()).is_err());
	}
}
