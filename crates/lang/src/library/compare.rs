// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Comparisons. Besides the boolean result schema (folded to a single
//! value when the operand ranges already decide the outcome), each
//! comparison hands back truths: per-variable tightenings that hold in
//! the branch where the comparison is true.

use femtocode_type::{Bound, Result, Schema, Value};

use crate::{
	error::LangError,
	expr::Expr,
	library::{Builtin, FunctionTable},
	typed::{Facts, Typed, TypedExpr, TypedKind, TypeFrame, build_typed},
};

pub(super) fn literal_eval(op: Builtin, args: &[&Value]) -> Option<Value> {
	let [a, b] = args else {
		return None;
	};
	if let (Value::Bool(a), Value::Bool(b)) = (a, b) {
		return match op {
			Builtin::Eq => Some(Value::Bool(a == b)),
			Builtin::Ne => Some(Value::Bool(a != b)),
			_ => None,
		};
	}
	let a = a.as_f64()?;
	let b = b.as_f64()?;
	Some(Value::Bool(match op {
		Builtin::Eq => a == b,
		Builtin::Ne => a != b,
		Builtin::Lt => a < b,
		Builtin::Le => a <= b,
		Builtin::Gt => a > b,
		Builtin::Ge => a >= b,
		_ => return None,
	}))
}

pub(super) fn binary(op: Builtin, call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [left, right] = args else {
		return Err(LangError::WrongArity {
			function: op.name().to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};
	let left = build_typed(left, frame, table)?;
	let right = build_typed(right, frame, table)?;

	// boolean equality needs no ranges
	if let (
		Schema::Boolean {
			just: ja,
		},
		Schema::Boolean {
			just: jb,
		},
	) = (left.schema(), right.schema())
	{
		if matches!(op, Builtin::Eq | Builtin::Ne) {
			let just = match (ja, jb) {
				(Some(a), Some(b)) => Some((a == b) == matches!(op, Builtin::Eq)),
				_ => None,
			};
			return Ok(Typed::plain(TypedExpr::new(
				TypedKind::Call {
					function: op.name().to_string(),
					args: vec![left.expr, right.expr],
				},
				Schema::Boolean {
					just,
				},
			)));
		}
	}

	let a = super::arith::require_number(op, left.schema(), call)?;
	let b = super::arith::require_number(op, right.schema(), call)?;

	let just = constant_outcome(op, a, b);
	let mut truths = Facts::new();
	if just.is_none() {
		if let Some(name) = left.expr.as_ref_name() {
			truths.insert(name.to_string(), left_fact(op, b));
		}
		if let Some(name) = right.expr.as_ref_name() {
			truths.insert(name.to_string(), right_fact(op, a));
		}
	}

	Ok(Typed {
		expr: TypedExpr::new(
			TypedKind::Call {
				function: op.name().to_string(),
				args: vec![left.expr, right.expr],
			},
			Schema::Boolean {
				just,
			},
		),
		truths,
	})
}

type Range = (Bound, Bound, bool);

/// `Some(outcome)` when the operand ranges decide the comparison
/// regardless of the concrete values.
fn constant_outcome(op: Builtin, a: Range, b: Range) -> Option<bool> {
	let (amin, amax, _) = a;
	let (bmin, bmax, _) = b;

	let strictly_below = |high: Bound, low: Bound| {
		high.value() < low.value()
			|| (high.value() == low.value() && (high.is_open() || low.is_open()))
	};
	let never_above = |high: Bound, low: Bound| high.value() <= low.value();

	let singleton =
		|min: Bound, max: Bound| !min.is_open() && !max.is_open() && min.value() == max.value();

	match op {
		Builtin::Lt => {
			if strictly_below(amax, bmin) {
				Some(true)
			} else if never_above(bmax, amin) {
				Some(false)
			} else {
				None
			}
		}
		Builtin::Le => {
			if never_above(amax, bmin) {
				Some(true)
			} else if strictly_below(bmax, amin) {
				Some(false)
			} else {
				None
			}
		}
		Builtin::Gt => constant_outcome(Builtin::Lt, b, a),
		Builtin::Ge => constant_outcome(Builtin::Le, b, a),
		Builtin::Eq => {
			if singleton(amin, amax) && singleton(bmin, bmax) && amin.value() == bmin.value() {
				Some(true)
			} else if strictly_below(amax, bmin) || strictly_below(bmax, amin) {
				Some(false)
			} else {
				None
			}
		}
		Builtin::Ne => constant_outcome(Builtin::Eq, a, b).map(|v| !v),
		_ => None,
	}
}

/// The fact established about the left operand when `left op right` is
/// true, given the right operand's range.
fn left_fact(op: Builtin, (bmin, bmax, bwhole): Range) -> Schema {
	let unbounded_low = Bound::Almost(f64::NEG_INFINITY);
	let unbounded_high = Bound::Almost(f64::INFINITY);
	match op {
		Builtin::Lt => Schema::real(unbounded_low, Bound::Almost(bmax.value())),
		Builtin::Le => Schema::real(unbounded_low, bmax),
		Builtin::Gt => Schema::real(Bound::Almost(bmin.value()), unbounded_high),
		Builtin::Ge => Schema::real(bmin, unbounded_high),
		Builtin::Eq => Schema::number(bmin, bmax, bwhole),
		_ => Schema::real_all(),
	}
}

fn right_fact(op: Builtin, a: Range) -> Schema {
	let mirrored = match op {
		Builtin::Lt => Builtin::Gt,
		Builtin::Le => Builtin::Ge,
		Builtin::Gt => Builtin::Lt,
		Builtin::Ge => Builtin::Le,
		other => other,
	};
	left_fact(mirrored, a)
}
