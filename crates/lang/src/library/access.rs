// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Indexed access and slicing. Both require a fixed-length collection:
//! fixed shapes flatten with a stride and no size sidecar, so the
//! kernel-level operation is plain index arithmetic. The index must be
//! *provably* in range — a range the inferencer cannot pin inside
//! `[0, length)` is a compile error, not a runtime check.

use femtocode_type::{Result, Schema, Value};

use crate::{
	error::LangError,
	expr::Expr,
	library::{Builtin, FunctionTable},
	typed::{Typed, TypedExpr, TypedKind, TypeFrame, build_typed},
};

pub(super) fn literal_eval(args: &[&Value]) -> Option<Value> {
	match args {
		[Value::List(items), Value::Int(index)] => {
			usize::try_from(*index).ok().and_then(|i| items.get(i)).cloned()
		}
		_ => None,
	}
}

fn require_fixed_collection<'a>(op: Builtin, schema: &'a Schema, call: &Expr) -> Result<(&'a Schema, u64)> {
	match schema {
		Schema::Collection {
			items,
			fewest,
			most,
			..
		} if Some(*fewest) == *most => Ok((items.as_ref(), *fewest)),
		other => Err(LangError::not_applicable(op.name(), other, call.fragment()).into()),
	}
}

pub(super) fn get(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [collection, index] = args else {
		return Err(LangError::WrongArity {
			function: "[]".to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};

	let typed_collection = build_typed(collection, frame, table)?;
	let (items, length) = require_fixed_collection(Builtin::Get, typed_collection.schema(), call)?;
	let items = items.clone();

	let typed_index = build_typed(index, frame, table)?;
	let in_range = match typed_index.schema() {
		Schema::Number {
			min,
			max,
			whole: true,
		} => min.value() >= 0.0 && max.value() < length as f64,
		_ => false,
	};
	if !in_range {
		return Err(LangError::IndexOutOfRange {
			index: typed_index.schema().to_string(),
			length,
			fragment: call.fragment(),
		}
		.into());
	}

	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: "[]".to_string(),
			args: vec![typed_collection.expr, typed_index.expr],
		},
		items,
	)))
}

/// Python slice semantics over a fixed length: the resulting index
/// sequence, already clamped.
pub fn slice_indices(length: u64, start: Option<i64>, stop: Option<i64>, step: Option<i64>) -> Option<Vec<u64>> {
	let length = length as i64;
	let step = step.unwrap_or(1);
	if step == 0 {
		return None;
	}
	let (default_start, default_stop) = if step > 0 { (0, length) } else { (length - 1, -1) };
	let clamp = |v: i64, low: i64, high: i64| v.max(low).min(high);
	let resolve = |v: Option<i64>, default: i64, low: i64, high: i64| match v {
		None => default,
		Some(v) if v < 0 => clamp(v + length, low, high),
		Some(v) => clamp(v, low, high),
	};
	let (start, stop) = if step > 0 {
		(resolve(start, default_start, 0, length), resolve(stop, default_stop, 0, length))
	} else {
		(resolve(start, default_start, -1, length - 1), resolve(stop, default_stop, -1, length - 1))
	};

	let mut indices = Vec::new();
	let mut i = start;
	while (step > 0 && i < stop) || (step < 0 && i > stop) {
		indices.push(i as u64);
		i += step;
	}
	Some(indices)
}

fn literal_int(expr: &TypedExpr) -> Option<Option<i64>> {
	match &expr.kind {
		TypedKind::Literal {
			value: Value::Null,
		} => Some(None),
		TypedKind::Literal {
			value: Value::Int(v),
		} => Some(Some(*v)),
		_ => None,
	}
}

pub(super) fn slice(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [collection, start, stop, step] = args else {
		return Err(LangError::WrongArity {
			function: "[:]".to_string(),
			expected: 4,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};

	let typed_collection = build_typed(collection, frame, table)?;
	let (items, length) = require_fixed_collection(Builtin::Slice, typed_collection.schema(), call)?;
	let items = items.clone();

	let mut bounds = Vec::with_capacity(3);
	for part in [start, stop, step] {
		let typed = build_typed(part, frame, table)?;
		let Some(bound) = literal_int(&typed.expr) else {
			return Err(LangError::Contradiction {
				reason: "slice bounds must be integer literals (or null for defaults)".to_string(),
				fragment: call.fragment(),
			}
			.into());
		};
		bounds.push((typed.expr, bound));
	}

	let indices = slice_indices(length, bounds[0].1, bounds[1].1, bounds[2].1).ok_or_else(|| {
		femtocode_type::Error::from(LangError::Contradiction {
			reason: "slice step cannot be zero".to_string(),
			fragment: call.fragment(),
		})
	})?;

	let schema = Schema::vector(items, indices.len() as u64);
	let mut typed_args = vec![typed_collection.expr];
	typed_args.extend(bounds.into_iter().map(|(expr, _)| expr));
	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: "[:]".to_string(),
			args: typed_args,
		},
		schema,
	)))
}

#[cfg(test)]
mod tests {
	use femtocode_type::Bound;

	use super::*;
	use crate::frame::Frame;

	fn call(function: &str, args: Vec<Expr>) -> Expr {
		Expr::Call {
			function: function.to_string(),
			args,
		}
	}

	#[test]
	fn test_get_on_fixed_collection() {
		let frame: TypeFrame = Frame::with([("v", Schema::vector(Schema::real_all(), 3))]);
		let typed = build_typed(
			&call("[]", vec![Expr::reference("v"), Expr::int(2)]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap();
		assert_eq!(typed.schema(), &Schema::real_all());
	}

	#[test]
	fn test_get_requires_provable_range() {
		let table = FunctionTable::standard();
		let frame: TypeFrame = Frame::with([
			("v", Schema::vector(Schema::real_all(), 3)),
			("i", Schema::integer_all()),
			("j", Schema::integer(Bound::Exact(0.0), Bound::Exact(2.0))),
		]);
		let err = build_typed(&call("[]", vec![Expr::reference("v"), Expr::reference("i")]), &frame, &table)
			.unwrap_err();
		assert_eq!(err.code(), "FEMTO_008");

		assert!(
			build_typed(&call("[]", vec![Expr::reference("v"), Expr::reference("j")]), &frame, &table)
				.is_ok()
		);
	}

	#[test]
	fn test_get_rejects_variable_collections() {
		let frame: TypeFrame = Frame::with([("xs", Schema::collection(Schema::real_all()))]);
		let err = build_typed(
			&call("[]", vec![Expr::reference("xs"), Expr::int(0)]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap_err();
		assert_eq!(err.code(), "FEMTO_004");
	}

	#[test]
	fn test_slice_indices_match_python() {
		assert_eq!(slice_indices(5, None, None, None), Some(vec![0, 1, 2, 3, 4]));
		assert_eq!(slice_indices(5, Some(1), Some(4), None), Some(vec![1, 2, 3]));
		assert_eq!(slice_indices(5, None, None, Some(2)), Some(vec![0, 2, 4]));
		assert_eq!(slice_indices(5, None, None, Some(-1)), Some(vec![4, 3, 2, 1, 0]));
		assert_eq!(slice_indices(5, Some(-2), None, None), Some(vec![3, 4]));
		assert_eq!(slice_indices(5, Some(10), None, None), Some(vec![]));
		assert_eq!(slice_indices(5, None, None, Some(0)), None);
	}

	#[test]
	fn test_slice_types_to_fixed_vector() {
		let frame: TypeFrame = Frame::with([("v", Schema::vector(Schema::real_all(), 5))]);
		let typed = build_typed(
			&call("[:]", vec![
				Expr::reference("v"),
				Expr::int(1),
				Expr::int(4),
				Expr::literal(Value::Null),
			]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap();
		assert_eq!(typed.schema(), &Schema::vector(Schema::real_all(), 3));
	}
}
