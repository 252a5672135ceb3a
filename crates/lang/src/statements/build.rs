// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Typed tree → statement list. The walk is bottom-up; a fingerprint
//! map provides common-subexpression elimination across the whole
//! program, and `explode_ref` aligns every argument to the jagged shape
//! of the innermost enclosing `.map` before a pointwise call is
//! emitted.

use std::collections::{BTreeMap, BTreeSet};

use femtocode_type::{ColumnName, Result, Schema, Value, internal_error};
use indexmap::IndexMap;
use tracing::instrument;
use xxhash_rust::xxh3::xxh3_64;

use crate::{
	error::LangError,
	library::{Builtin, FunctionTable, slice_indices},
	statements::{SlRef, Statement},
	typed::{TypedExpr, TypedKind},
};

/// Two columns already share a stripe length iff they hang off the same
/// size column (or are both entry-level).
pub fn same_level(a: &Option<ColumnName>, b: &Option<ColumnName>) -> bool {
	a == b
}

#[derive(Debug)]
pub struct BuildOutput {
	pub result: SlRef,
	pub statements: Vec<Statement>,
	pub inputs: BTreeSet<ColumnName>,
}

#[instrument(name = "statements::build", level = "debug", skip_all)]
pub fn build_statements(
	tt: &TypedExpr,
	columns: &BTreeMap<String, SlRef>,
	table: &FunctionTable,
) -> Result<BuildOutput> {
	let mut builder = Builder {
		table,
		columns,
		replacements: IndexMap::new(),
		statements: Vec::new(),
		counter: 0,
		env: Vec::new(),
		inputs: BTreeSet::new(),
	};
	let result = builder.build(tt, &[])?;
	Ok(BuildOutput {
		result,
		statements: builder.statements,
		inputs: builder.inputs,
	})
}

struct Builder<'a> {
	table: &'a FunctionTable,
	columns: &'a BTreeMap<String, SlRef>,
	replacements: IndexMap<u64, SlRef>,
	statements: Vec<Statement>,
	counter: u64,
	env: Vec<(String, SlRef)>,
	inputs: BTreeSet<ColumnName>,
}

impl Builder<'_> {
	fn fresh(&mut self) -> ColumnName {
		let name = ColumnName::temp(self.counter);
		self.counter += 1;
		name
	}

	fn memoized(&mut self, key: &str) -> Option<SlRef> {
		self.replacements.get(&xxh3_64(key.as_bytes())).cloned()
	}

	fn memoize(&mut self, key: &str, value: SlRef) {
		self.replacements.insert(xxh3_64(key.as_bytes()), value);
	}

	fn build(&mut self, expr: &TypedExpr, explosions: &[ColumnName]) -> Result<SlRef> {
		match &expr.kind {
			TypedKind::Ref {
				name,
			} => self.lookup(name),

			TypedKind::Literal {
				value,
			} => Ok(self.literal(value, &expr.schema)),

			TypedKind::SchemaLiteral {
				..
			}
			| TypedKind::Lambda {
				..
			} => Err(internal_error!("schema literals and lambdas are not values")),

			TypedKind::Call {
				function,
				args,
			} => {
				let builtin = *self
					.table
					.get(function)
					.ok_or_else(|| internal_error!("unknown function '{}' after typing", function))?;
				match builtin {
					Builtin::Map => self.map(args, &expr.schema, explosions),
					Builtin::If => self.if_else(args, &expr.schema, explosions),
					Builtin::Is => self.is(args, &expr.schema, explosions),
					Builtin::Get => self.get(args, &expr.schema, explosions),
					Builtin::Slice => self.slice(args, &expr.schema, explosions),
					_ => self.flat(builtin, args, &expr.schema, explosions),
				}
			}
		}
	}

	fn lookup(&mut self, name: &str) -> Result<SlRef> {
		for (bound, reference) in self.env.iter().rev() {
			if bound == name {
				return Ok(reference.clone());
			}
		}
		let reference = self
			.columns
			.get(name)
			.cloned()
			.ok_or_else(|| internal_error!("no column backs the name '{}'", name))?;
		// union fields have no single data stripe; their sidecars are
		// recorded where they are actually read
		if !matches!(reference.schema, Schema::Union { .. }) {
			self.inputs.insert(reference.data.clone());
		}
		if let Some(size) = &reference.size {
			self.inputs.insert(size.clone());
		}
		Ok(reference)
	}

	fn literal(&mut self, value: &Value, schema: &Schema) -> SlRef {
		let key = format!("literal|{}|{}", value, schema);
		if let Some(existing) = self.memoized(&key) {
			return existing;
		}
		let to = self.fresh();
		self.statements.push(Statement::Literal {
			to: to.clone(),
			schema: schema.clone(),
			value: value.clone(),
		});
		let reference = SlRef::scalar(to, schema.clone());
		self.memoize(&key, reference.clone());
		reference
	}

	/// The size column describing the combined shape of the active
	/// explosion levels; emits (or reuses) an `ExplodeSize` when the
	/// levels do not all come from one recursive size column.
	fn target_size(&mut self, explosions: &[ColumnName]) -> Result<Option<ColumnName>> {
		let Some(first) = explosions.first() else {
			return Ok(None);
		};
		if explosions.iter().all(|level| level == first) {
			return Ok(Some(first.clone()));
		}
		let key = format!(
			"explodesize|{}",
			explosions.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
		);
		if let Some(existing) = self.memoized(&key) {
			return Ok(Some(existing.data));
		}
		let to = self.fresh().size();
		self.statements.push(Statement::ExplodeSize {
			to: to.clone(),
			sizes: explosions.to_vec(),
		});
		self.memoize(&key, SlRef::scalar(to.clone(), Schema::integer_all()));
		Ok(Some(to))
	}

	/// Align a reference to the active explosion shape (§4.D): pass it
	/// through when it already lives there, broadcast a scalar with one
	/// `Explode`, or repeat a lower-rank jagged column with an
	/// `ExplodeData` into the combined shape.
	fn explode_ref(&mut self, reference: SlRef, explosions: &[ColumnName]) -> Result<SlRef> {
		let target = self.target_size(explosions)?;
		let Some(target) = target else {
			if reference.size.is_some() {
				return Err(LangError::Contradiction {
					reason: format!("a value of {} cannot be used outside its collection", reference.schema),
					fragment: femtocode_type::error::Fragment::None,
				}
				.into());
			}
			return Ok(reference);
		};

		if reference.size.as_ref() == Some(&target) {
			return Ok(reference);
		}

		match &reference.size {
			None => {
				let key = format!("explode|{}|{}", reference.data, target);
				if let Some(existing) = self.memoized(&key) {
					return Ok(existing);
				}
				let to = self.fresh();
				self.statements.push(Statement::Explode {
					to: to.clone(),
					schema: reference.schema.clone(),
					data: reference.data.clone(),
					tosize: target.clone(),
				});
				let out = SlRef::sized(to, target, reference.schema);
				self.memoize(&key, out.clone());
				Ok(out)
			}
			Some(fromsize) => {
				let key = format!(
					"explodedata|{}|{}|{}",
					reference.data,
					fromsize,
					explosions.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
				);
				if let Some(existing) = self.memoized(&key) {
					return Ok(existing);
				}
				let to = self.fresh();
				self.statements.push(Statement::ExplodeData {
					to: to.clone(),
					schema: reference.schema.clone(),
					data: reference.data.clone(),
					fromsize: fromsize.clone(),
					tosizes: explosions.to_vec(),
				});
				let out = SlRef::sized(to, target, reference.schema);
				self.memoize(&key, out.clone());
				Ok(out)
			}
		}
	}

	/// The default shape shared by every pointwise builtin: align all
	/// arguments, then emit a single call keyed for CSE.
	fn flat(
		&mut self,
		builtin: Builtin,
		args: &[TypedExpr],
		schema: &Schema,
		explosions: &[ColumnName],
	) -> Result<SlRef> {
		let opcode = builtin
			.opcode()
			.ok_or_else(|| internal_error!("'{}' has no flat kernel", builtin.name()))?;

		let mut columns = Vec::with_capacity(args.len());
		for arg in args {
			let reference = self.build(arg, explosions)?;
			let reference = self.explode_ref(reference, explosions)?;
			columns.push(reference.data);
		}
		if builtin.commutative() {
			columns.sort();
		}
		let target = self.target_size(explosions)?;

		let key = format!(
			"call|{}|{}|{}",
			opcode,
			target.as_ref().map(|c| c.to_string()).unwrap_or_default(),
			columns.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",")
		);
		if let Some(existing) = self.memoized(&key) {
			return Ok(existing);
		}

		let to = self.fresh();
		self.statements.push(Statement::Call {
			to: to.clone(),
			schema: schema.clone(),
			size: target.clone(),
			function: opcode.to_string(),
			args: columns,
		});
		let out = SlRef {
			data: to,
			size: target,
			schema: schema.clone(),
		};
		self.memoize(&key, out.clone());
		Ok(out)
	}

	fn map(&mut self, args: &[TypedExpr], schema: &Schema, explosions: &[ColumnName]) -> Result<SlRef> {
		let [collection, lambda] = args else {
			return Err(internal_error!("map takes a collection and a function"));
		};
		let TypedKind::Lambda {
			param,
			body,
		} = &lambda.kind
		else {
			return Err(internal_error!("map's function argument was not monomorphized"));
		};

		let collection_ref = self.build(collection, explosions)?;
		let Some(size) = collection_ref.size.clone() else {
			return Err(LangError::not_applicable(
				".map",
				&collection_ref.schema,
				femtocode_type::error::Fragment::None,
			)
			.into());
		};
		let Schema::Collection {
			items, ..
		} = &collection_ref.schema
		else {
			return Err(internal_error!("map over a non-collection survived typing"));
		};

		let item_ref = SlRef::sized(collection_ref.data.clone(), size.clone(), items.as_ref().clone());
		let mut inner: Vec<ColumnName> = explosions.to_vec();
		inner.push(size);

		let counter_start = self.counter;
		self.env.push((param.clone(), item_ref));
		let body_ref = self.build(body, &inner);
		self.env.pop();
		let body_ref = body_ref?;

		// a body computed inside this map already lives at the right
		// depth; only outside references still need aligning
		enum Align {
			Keep,
			Extend(ColumnName),
			Context,
		}
		let produced_inside = body_ref.data.temp_index().map(|n| n >= counter_start).unwrap_or(false);
		let align = if produced_inside {
			Align::Keep
		} else {
			match (&body_ref.size, &body_ref.schema) {
				(
					Some(own),
					Schema::Collection {
						..
					},
				) => {
					if inner.iter().all(|level| level == own) {
						// e.g. the identity map: the collection itself
						Align::Keep
					} else {
						// a whole collection per item: repeat it along
						// the context plus its own jagged levels
						Align::Extend(own.clone())
					}
				}
				_ => Align::Context,
			}
		};
		let body_ref = match align {
			Align::Keep => body_ref,
			Align::Extend(own) => {
				let mut extended = inner.clone();
				extended.push(own);
				self.explode_ref(body_ref, &extended)?
			}
			Align::Context => self.explode_ref(body_ref, &inner)?,
		};

		Ok(SlRef {
			data: body_ref.data,
			size: body_ref.size,
			schema: schema.clone(),
		})
	}

	fn if_else(&mut self, args: &[TypedExpr], schema: &Schema, explosions: &[ColumnName]) -> Result<SlRef> {
		let [predicate, consequent, alternate] = args else {
			return Err(internal_error!("if takes predicate, consequent, alternate"));
		};
		let predicate_ref = {
			let built = self.build(predicate, explosions)?;
			self.explode_ref(built, explosions)?
		};
		let target = self.target_size(explosions)?;

		if let Schema::Union {
			possibilities,
		} = schema
		{
			// columnar conditionals support the value-or-null shape;
			// anything wider has no single output stripe
			let null_index = possibilities.iter().position(|p| matches!(p, Schema::Null));
			let (value_branch, value_is_consequent) = match (&consequent.schema, &alternate.schema) {
				(Schema::Null, other) => (other, false),
				(other, Schema::Null) => (other, true),
				_ => {
					return Err(LangError::Contradiction {
						reason: format!(
							"conditional branches of unrelated types ({}) cannot form one column",
							schema
						),
						fragment: femtocode_type::error::Fragment::None,
					}
					.into());
				}
			};
			let (Some(null_index), Some(value_index)) = (
				null_index,
				possibilities.iter().position(|p| p == value_branch),
			) else {
				return Err(internal_error!("union conditional lost its possibilities"));
			};

			let value_expr = if value_is_consequent { consequent } else { alternate };
			let value_ref = {
				let built = self.build(value_expr, explosions)?;
				self.explode_ref(built, explosions)?
			};

			let out = self.fresh();
			let (tag_true, tag_false) = if value_is_consequent {
				(value_index, null_index)
			} else {
				(null_index, value_index)
			};
			self.statements.push(Statement::Call {
				to: out.tag(),
				schema: Schema::integer(
					femtocode_type::Bound::Exact(0.0),
					femtocode_type::Bound::Exact(possibilities.len() as f64 - 1.0),
				),
				size: target.clone(),
				function: format!("iftag@{}@{}", tag_true, tag_false),
				args: vec![predicate_ref.data.clone()],
			});
			self.statements.push(Statement::Call {
				to: out.pos(value_index as u32),
				schema: value_branch.clone(),
				size: target.clone(),
				function: format!("ifdata@{}", if value_is_consequent { 1 } else { 0 }),
				args: vec![predicate_ref.data, value_ref.data],
			});
			return Ok(SlRef {
				data: out,
				size: target,
				schema: schema.clone(),
			});
		}

		let consequent_ref = {
			let built = self.build(consequent, explosions)?;
			self.explode_ref(built, explosions)?
		};
		let alternate_ref = {
			let built = self.build(alternate, explosions)?;
			self.explode_ref(built, explosions)?
		};
		let key = format!(
			"call|if|{}|{},{},{}",
			target.as_ref().map(|c| c.to_string()).unwrap_or_default(),
			predicate_ref.data,
			consequent_ref.data,
			alternate_ref.data
		);
		if let Some(existing) = self.memoized(&key) {
			return Ok(existing);
		}
		let to = self.fresh();
		self.statements.push(Statement::Call {
			to: to.clone(),
			schema: schema.clone(),
			size: target.clone(),
			function: "if".to_string(),
			args: vec![predicate_ref.data, consequent_ref.data, alternate_ref.data],
		});
		let out = SlRef {
			data: to,
			size: target,
			schema: schema.clone(),
		};
		self.memoize(&key, out.clone());
		Ok(out)
	}

	fn is(&mut self, args: &[TypedExpr], schema: &Schema, explosions: &[ColumnName]) -> Result<SlRef> {
		let [target_expr, schema_literal] = args else {
			return Err(internal_error!("is takes a value and a schema"));
		};
		let TypedKind::SchemaLiteral {
			schema: wanted,
		} = &schema_literal.kind
		else {
			return Err(internal_error!("is lost its schema literal"));
		};

		// decided at compile time: a plain constant
		if let Schema::Boolean {
			just: Some(value),
		} = schema
		{
			return Ok(self.literal(&Value::Bool(*value), schema));
		}

		let target_ref = self.build(target_expr, explosions)?;
		let Schema::Union {
			possibilities,
		} = &target_ref.schema
		else {
			return Err(internal_error!("an undecided is-test needs a union operand"));
		};

		let mut matching = Vec::new();
		for (index, possibility) in possibilities.iter().enumerate() {
			let overlap = possibility.intersect(wanted);
			if overlap.is_impossible() {
				continue;
			}
			if &overlap == possibility {
				matching.push(index);
			} else {
				return Err(LangError::Contradiction {
					reason: format!(
						"'is {}' splits the possibility {} and cannot be answered from the tag alone",
						wanted, possibility
					),
					fragment: femtocode_type::error::Fragment::None,
				}
				.into());
			}
		}

		let tag = target_ref.data.tag();
		self.inputs.insert(tag.clone());
		let size = self.target_size(explosions)?;
		let function = format!(
			"istag@{}",
			matching.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("@")
		);
		let key = format!("call|{}|{}", function, tag);
		if let Some(existing) = self.memoized(&key) {
			return Ok(existing);
		}
		let to = self.fresh();
		self.statements.push(Statement::Call {
			to: to.clone(),
			schema: schema.clone(),
			size: size.clone(),
			function,
			args: vec![tag],
		});
		let out = SlRef {
			data: to,
			size,
			schema: schema.clone(),
		};
		self.memoize(&key, out.clone());
		Ok(out)
	}

	fn get(&mut self, args: &[TypedExpr], schema: &Schema, explosions: &[ColumnName]) -> Result<SlRef> {
		if !explosions.is_empty() {
			return Err(LangError::Contradiction {
				reason: "indexed access inside .map is not supported".to_string(),
				fragment: femtocode_type::error::Fragment::None,
			}
			.into());
		}
		let [collection, index] = args else {
			return Err(internal_error!("[] takes a collection and an index"));
		};
		let collection_ref = self.build(collection, explosions)?;
		let Schema::Collection {
			fewest, ..
		} = &collection_ref.schema
		else {
			return Err(internal_error!("[] over a non-collection survived typing"));
		};
		let stride = *fewest;
		let index_ref = self.build(index, explosions)?;

		let function = format!("getfixed@{}", stride);
		let key = format!("call|{}|{},{}", function, collection_ref.data, index_ref.data);
		if let Some(existing) = self.memoized(&key) {
			return Ok(existing);
		}
		let to = self.fresh();
		self.statements.push(Statement::Call {
			to: to.clone(),
			schema: schema.clone(),
			size: None,
			function,
			args: vec![collection_ref.data, index_ref.data],
		});
		let out = SlRef::scalar(to, schema.clone());
		self.memoize(&key, out.clone());
		Ok(out)
	}

	fn slice(&mut self, args: &[TypedExpr], schema: &Schema, explosions: &[ColumnName]) -> Result<SlRef> {
		if !explosions.is_empty() {
			return Err(LangError::Contradiction {
				reason: "slicing inside .map is not supported".to_string(),
				fragment: femtocode_type::error::Fragment::None,
			}
			.into());
		}
		let [collection, start, stop, step] = args else {
			return Err(internal_error!("[:] takes a collection and three bounds"));
		};
		let collection_ref = self.build(collection, explosions)?;
		let Schema::Collection {
			fewest: stride, ..
		} = &collection_ref.schema
		else {
			return Err(internal_error!("[:] over a non-collection survived typing"));
		};
		let stride = *stride;

		let literal_int = |expr: &TypedExpr| match &expr.kind {
			TypedKind::Literal {
				value: Value::Int(v),
			} => Some(Some(*v)),
			TypedKind::Literal {
				value: Value::Null,
			} => Some(None),
			_ => None,
		};
		let (Some(start), Some(stop), Some(step)) =
			(literal_int(start), literal_int(stop), literal_int(step))
		else {
			return Err(internal_error!("non-literal slice bounds survived typing"));
		};
		let indices = slice_indices(stride, start, stop, step)
			.ok_or_else(|| internal_error!("zero slice step survived typing"))?;
		let (first, step_by) = match indices.as_slice() {
			[] => (0i64, 1i64),
			[only] => (*only as i64, 1),
			[first, second, ..] => (*first as i64, *second as i64 - *first as i64),
		};

		let function = format!("slicefixed@{}@{}@{}@{}", first, step_by, indices.len(), stride);
		let key = format!("call|{}|{}", function, collection_ref.data);
		if let Some(existing) = self.memoized(&key) {
			return Ok(existing);
		}
		let to = self.fresh();
		self.statements.push(Statement::Call {
			to: to.clone(),
			schema: schema.clone(),
			size: None,
			function,
			args: vec![collection_ref.data],
		});
		let out = SlRef::scalar(to, schema.clone());
		self.memoize(&key, out.clone());
		Ok(out)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{expr::Expr, frame::Frame, typed::build_typed};

	fn col(text: &str) -> ColumnName {
		text.parse().unwrap()
	}

	fn field(name: &str, schema: Schema) -> (String, SlRef) {
		let data = col(name);
		let reference = match &schema {
			Schema::Collection {
				fewest,
				most,
				..
			} if Some(*fewest) != *most => SlRef::sized(data.clone(), data.size(), schema),
			_ => SlRef::scalar(data, schema),
		};
		(name.to_string(), reference)
	}

	fn compile(expr: Expr, fields: Vec<(String, SlRef)>) -> BuildOutput {
		let table = FunctionTable::standard();
		let frame = Frame::with(
			fields.iter().map(|(name, reference)| (name.clone(), reference.schema.clone())),
		);
		let typed = build_typed(&expr, &frame, &table).unwrap();
		let columns: BTreeMap<String, SlRef> = fields.into_iter().collect();
		build_statements(&typed.expr, &columns, &table).unwrap()
	}

	fn call(function: &str, args: Vec<Expr>) -> Expr {
		Expr::Call {
			function: function.to_string(),
			args,
		}
	}

	#[test]
	fn test_flat_add() {
		// x + y over scalar fields: a single entry-level call
		let out = compile(call("+", vec![Expr::reference("x"), Expr::reference("y")]), vec![
			field("x", Schema::integer_all()),
			field("y", Schema::real_all()),
		]);
		assert_eq!(out.statements.len(), 1);
		match &out.statements[0] {
			Statement::Call {
				function,
				args,
				size,
				..
			} => {
				assert_eq!(function, "add");
				assert_eq!(args, &vec![col("x"), col("y")]);
				assert_eq!(size, &None);
			}
			other => panic!("unexpected {}", other),
		}
		assert!(out.inputs.contains(&col("x")));
		assert!(out.inputs.contains(&col("y")));
	}

	#[test]
	fn test_jagged_broadcast() {
		// xs.map($1 + y): Explode(y, xs@size) then one call at xs@size
		let out = compile(
			call(".map", vec![
				Expr::reference("xs"),
				call("+", vec![Expr::reference("$1"), Expr::reference("y")]),
			]),
			vec![
				field("xs", Schema::collection(Schema::real_all())),
				field("y", Schema::real_all()),
			],
		);
		assert_eq!(out.statements.len(), 2);
		match &out.statements[0] {
			Statement::Explode {
				data,
				tosize,
				..
			} => {
				assert_eq!(data, &col("y"));
				assert_eq!(tosize, &col("xs@size"));
			}
			other => panic!("unexpected {}", other),
		}
		match &out.statements[1] {
			Statement::Call {
				function,
				size,
				..
			} => {
				assert_eq!(function, "add");
				assert_eq!(size, &Some(col("xs@size")));
			}
			other => panic!("unexpected {}", other),
		}
		assert_eq!(out.result.size, Some(col("xs@size")));
		assert!(matches!(out.result.schema, Schema::Collection { .. }));
	}

	#[test]
	fn test_nested_product_and_broadcast() {
		// xss.map(xs => ys.map(y => xs.map(x => x + y))):
		// one ExplodeSize, two ExplodeData, one Call
		let innermost = call(".map", vec![
			Expr::reference("xs"),
			Expr::lambda(["x"], call("+", vec![Expr::reference("x"), Expr::reference("y")])),
		]);
		let middle = call(".map", vec![Expr::reference("ys"), Expr::lambda(["y"], innermost)]);
		let out = compile(
			call(".map", vec![Expr::reference("xss"), Expr::lambda(["xs"], middle)]),
			vec![
				field("xss", Schema::collection(Schema::collection(Schema::real_all()))),
				field("ys", Schema::collection(Schema::real_all())),
			],
		);

		let explode_sizes: Vec<_> = out
			.statements
			.iter()
			.filter(|s| matches!(s, Statement::ExplodeSize { .. }))
			.collect();
		let explode_datas: Vec<_> = out
			.statements
			.iter()
			.filter(|s| matches!(s, Statement::ExplodeData { .. }))
			.collect();
		let calls: Vec<_> =
			out.statements.iter().filter(|s| matches!(s, Statement::Call { .. })).collect();
		assert_eq!(explode_sizes.len(), 1);
		assert_eq!(explode_datas.len(), 2);
		assert_eq!(calls.len(), 1);

		match explode_sizes[0] {
			Statement::ExplodeSize {
				sizes, ..
			} => {
				assert_eq!(sizes, &vec![col("xss@size"), col("ys@size"), col("xss@size")]);
			}
			_ => unreachable!(),
		}
	}

	#[test]
	fn test_swapped_axes_change_the_shape() {
		// same query with the two map axes swapped: the combined shape
		// lists the size columns in the other order
		let innermost = call(".map", vec![
			Expr::reference("ys"),
			Expr::lambda(["y"], call("+", vec![Expr::reference("x"), Expr::reference("y")])),
		]);
		let middle = call(".map", vec![Expr::reference("xs"), Expr::lambda(["x"], innermost)]);
		let out = compile(
			call(".map", vec![Expr::reference("xss"), Expr::lambda(["xs"], middle)]),
			vec![
				field("xss", Schema::collection(Schema::collection(Schema::real_all()))),
				field("ys", Schema::collection(Schema::real_all())),
			],
		);
		let shape: Vec<_> = out
			.statements
			.iter()
			.find_map(|s| match s {
				Statement::ExplodeSize {
					sizes, ..
				} => Some(sizes.clone()),
				_ => None,
			})
			.unwrap();
		assert_eq!(shape, vec![col("xss@size"), col("xss@size"), col("ys@size")]);
	}

	#[test]
	fn test_common_subexpressions_are_shared() {
		// (x + y) * (x + y): the add is emitted once
		let sum = call("+", vec![Expr::reference("x"), Expr::reference("y")]);
		let out = compile(call("*", vec![sum.clone(), sum]), vec![
			field("x", Schema::real_all()),
			field("y", Schema::real_all()),
		]);
		let adds = out
			.statements
			.iter()
			.filter(|s| matches!(s, Statement::Call { function, .. } if function == "add"))
			.count();
		assert_eq!(adds, 1);
	}

	#[test]
	fn test_commutative_arguments_canonicalize() {
		// x + y and y + x fingerprint identically
		let out = compile(
			call("+", vec![
				call("+", vec![Expr::reference("x"), Expr::reference("y")]),
				call("+", vec![Expr::reference("y"), Expr::reference("x")]),
			]),
			vec![field("x", Schema::real_all()), field("y", Schema::real_all())],
		);
		let adds = out
			.statements
			.iter()
			.filter(|s| matches!(s, Statement::Call { function, .. } if function == "add"))
			.count();
		// the two inner adds collapse into one, fed twice into the outer
		assert_eq!(adds, 2);
	}

	#[test]
	fn test_union_conditional_emits_tag_and_data() {
		let out = compile(
			call("if", vec![
				call("<", vec![Expr::reference("x"), Expr::int(5)]),
				Expr::reference("x"),
				Expr::literal(Value::Null),
			]),
			vec![field("x", Schema::integer_all())],
		);
		let has_tag = out.statements.iter().any(|s| match s {
			Statement::Call {
				to,
				function,
				..
			} => to.is_tag() && function.starts_with("iftag@"),
			_ => false,
		});
		assert!(has_tag, "{:?}", out.statements);
		assert!(matches!(out.result.schema, Schema::Union { .. }));
	}

	#[test]
	fn test_literals_are_deduplicated() {
		let out = compile(
			call("+", vec![
				call("+", vec![Expr::reference("x"), Expr::float(2.5)]),
				Expr::float(2.5),
			]),
			vec![field("x", Schema::real_all())],
		);
		let literals =
			out.statements.iter().filter(|s| matches!(s, Statement::Literal { .. })).count();
		assert_eq!(literals, 1);
	}

	#[test]
	fn test_identity_map_passes_through() {
		let out = compile(
			call(".map", vec![Expr::reference("xs"), Expr::lambda(["x"], Expr::reference("x"))]),
			vec![field("xs", Schema::collection(Schema::real_all()))],
		);
		assert!(out.statements.is_empty());
		assert_eq!(out.result.data, col("xs"));
		assert_eq!(out.result.size, Some(col("xs@size")));
	}

	#[test]
	fn test_determinism() {
		// compiling twice yields identical statement lists
		let build = || {
			compile(
				call(".map", vec![
					Expr::reference("xs"),
					call("+", vec![Expr::reference("$1"), Expr::reference("y")]),
				]),
				vec![
					field("xs", Schema::collection(Schema::real_all())),
					field("y", Schema::real_all()),
				],
			)
		};
		let a = build();
		let b = build();
		assert_eq!(a.statements, b.statements);
		assert_eq!(a.result, b.result);
	}

	#[test]
	fn test_fixed_collection_get() {
		let out = compile(call("[]", vec![Expr::reference("v"), Expr::int(1)]), vec![field(
			"v",
			Schema::vector(Schema::real_all(), 3),
		)]);
		let getfixed = out.statements.iter().any(
			|s| matches!(s, Statement::Call { function, .. } if function.starts_with("getfixed@3")),
		);
		assert!(getfixed, "{:?}", out.statements);
	}

	#[test]
	fn test_same_level() {
		assert!(same_level(&None, &None));
		assert!(same_level(&Some(col("xs@size")), &Some(col("xs@size"))));
		assert!(!same_level(&Some(col("xs@size")), &Some(col("ys@size"))));
		assert!(!same_level(&Some(col("xs@size")), &None));
	}
}
