// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Arithmetic: literal folding and range inference. Every operation
//! tightens the result interval from the operand intervals, with
//! endpoint openness propagated; contradictions (division by a range
//! that contains zero) fail compilation at the call site.

use femtocode_type::{Bound, Result, Schema, Value};

use crate::{
	error::LangError,
	expr::Expr,
	library::{Builtin, FunctionTable},
	typed::{Typed, TypedExpr, TypedKind, TypeFrame, build_typed},
};

fn python_floordiv(a: i64, b: i64) -> Option<i64> {
	if b == 0 {
		return None;
	}
	let q = a.checked_div(b)?;
	let r = a - q * b;
	if r != 0 && ((r < 0) != (b < 0)) { Some(q - 1) } else { Some(q) }
}

fn python_mod(a: i64, b: i64) -> Option<i64> {
	if b == 0 {
		return None;
	}
	let r = a % b;
	if r != 0 && ((r < 0) != (b < 0)) { Some(r + b) } else { Some(r) }
}

fn python_fmod(a: f64, b: f64) -> f64 {
	a - b * (a / b).floor()
}

pub(super) fn literal_eval(op: Builtin, args: &[&Value]) -> Option<Value> {
	use Value::{Float, Int};

	if matches!(op, Builtin::UPlus | Builtin::UMinus) {
		return match (op, args) {
			(Builtin::UPlus, [Int(a)]) => Some(Int(*a)),
			(Builtin::UPlus, [Float(a)]) => Some(Float(*a)),
			(Builtin::UMinus, [Int(a)]) => a.checked_neg().map(Int),
			(Builtin::UMinus, [Float(a)]) => Some(Float(-*a)),
			_ => None,
		};
	}

	let [a, b] = args else {
		return None;
	};
	match (op, a, b) {
		(Builtin::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int),
		(Builtin::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int),
		(Builtin::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int),
		(Builtin::FloorDiv, Int(a), Int(b)) => python_floordiv(*a, *b).map(Int),
		(Builtin::Mod, Int(a), Int(b)) => python_mod(*a, *b).map(Int),
		(Builtin::Pow, Int(a), Int(b)) if *b >= 0 => {
			a.checked_pow(u32::try_from(*b).ok()?).map(Int)
		}
		_ => {
			let a = a.as_f64()?;
			let b = b.as_f64()?;
			let v = match op {
				Builtin::Add => a + b,
				Builtin::Sub => a - b,
				Builtin::Mul => a * b,
				Builtin::Div => {
					if b == 0.0 {
						return None;
					}
					a / b
				}
				Builtin::FloorDiv => {
					if b == 0.0 {
						return None;
					}
					(a / b).floor()
				}
				Builtin::Mod => {
					if b == 0.0 {
						return None;
					}
					python_fmod(a, b)
				}
				Builtin::Pow => {
					if a < 0.0 && b.fract() != 0.0 {
						return None;
					}
					a.powf(b)
				}
				_ => return None,
			};
			Some(Float(v))
		}
	}
}

pub(super) fn require_number(op: Builtin, schema: &Schema, call: &Expr) -> Result<(Bound, Bound, bool)> {
	match schema {
		Schema::Number {
			min,
			max,
			whole,
		} => Ok((*min, *max, *whole)),
		other => Err(LangError::not_applicable(op.name(), other, call.fragment()).into()),
	}
}

fn fail_if_impossible(schema: Schema, call: &Expr) -> Result<Schema> {
	if let Schema::Impossible {
		reason,
	} = &schema
	{
		return Err(LangError::Contradiction {
			reason: reason.clone(),
			fragment: call.fragment(),
		}
		.into());
	}
	Ok(schema)
}

pub(super) fn unary(op: Builtin, call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [arg] = args else {
		return Err(LangError::WrongArity {
			function: op.name().to_string(),
			expected: 1,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};
	let typed = build_typed(arg, frame, table)?;
	let (min, max, whole) = require_number(op, typed.schema(), call)?;
	let schema = match op {
		Builtin::UPlus => Schema::number(min, max, whole),
		Builtin::UMinus => Schema::number(max.neg(), min.neg(), whole),
		_ => unreachable!(),
	};
	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: op.name().to_string(),
			args: vec![typed.expr],
		},
		fail_if_impossible(schema, call)?,
	)))
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
	let a = require_number(op, left.schema(), call)?;
	let b = require_number(op, right.schema(), call)?;

	let schema = match op {
		Builtin::Add => infer_add(a, b),
		Builtin::Sub => infer_sub(a, b),
		Builtin::Mul => infer_mul(a, b),
		Builtin::Div => infer_div(a, b),
		Builtin::FloorDiv => infer_floordiv(a, b),
		Builtin::Mod => infer_mod(a, b),
		Builtin::Pow => infer_pow(a, b),
		_ => unreachable!(),
	};

	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: op.name().to_string(),
			args: vec![left.expr, right.expr],
		},
		fail_if_impossible(schema, call)?,
	)))
}

type Range = (Bound, Bound, bool);

fn infer_add((amin, amax, awhole): Range, (bmin, bmax, bwhole): Range) -> Schema {
	Schema::number(Bound::add(amin, bmin), Bound::add(amax, bmax), awhole && bwhole)
}

fn infer_sub((amin, amax, awhole): Range, (bmin, bmax, bwhole): Range) -> Schema {
	Schema::number(Bound::sub(amin, bmax), Bound::sub(amax, bmin), awhole && bwhole)
}

fn infer_mul((amin, amax, awhole): Range, (bmin, bmax, bwhole): Range) -> Schema {
	Schema::number(
		Bound::product_low(amin, amax, bmin, bmax),
		Bound::product_high(amin, amax, bmin, bmax),
		awhole && bwhole,
	)
}

/// Zero handling for divisors: a range that properly contains zero is a
/// contradiction; a range that only touches zero through an open
/// endpoint yields an unbounded ("extended") quotient.
enum DivisorZero {
	Contains,
	Touches,
	Clear,
}

fn divisor_zero(min: Bound, max: Bound) -> DivisorZero {
	if min.admits_low(0.0) && max.admits_high(0.0) {
		DivisorZero::Contains
	} else if min.value() == 0.0 || max.value() == 0.0 {
		DivisorZero::Touches
	} else {
		DivisorZero::Clear
	}
}

fn infer_div((amin, amax, _awhole): Range, (bmin, bmax, _bwhole): Range) -> Schema {
	match divisor_zero(bmin, bmax) {
		DivisorZero::Contains => Schema::impossible("divisor range contains zero"),
		DivisorZero::Touches => Schema::extended(),
		DivisorZero::Clear => Schema::number(
			Bound::quotient_low(amin, amax, bmin, bmax),
			Bound::quotient_high(amin, amax, bmin, bmax),
			false,
		),
	}
}

fn floor_low(bound: Bound) -> Bound {
	if bound.value().is_infinite() { bound } else { Bound::Exact(bound.value().floor()) }
}

fn infer_floordiv(a: Range, b: Range) -> Schema {
	let (bmin, bmax, _) = b;
	match divisor_zero(bmin, bmax) {
		DivisorZero::Contains => Schema::impossible("divisor range contains zero"),
		DivisorZero::Touches => Schema::number(
			Bound::Almost(f64::NEG_INFINITY),
			Bound::Almost(f64::INFINITY),
			a.2 && b.2,
		),
		DivisorZero::Clear => {
			let (amin, amax, awhole) = a;
			let low = floor_low(Bound::quotient_low(amin, amax, bmin, bmax));
			let high = Bound::quotient_high(amin, amax, bmin, bmax).integer_high();
			Schema::number(low, high, awhole && b.2)
		}
	}
}

fn infer_mod((_amin, _amax, awhole): Range, (bmin, bmax, bwhole): Range) -> Schema {
	match divisor_zero(bmin, bmax) {
		DivisorZero::Contains => Schema::impossible("divisor range contains zero"),
		_ => {
			// a single interval excluding zero is entirely on one side
			if bmin.value() >= 0.0 {
				Schema::number(Bound::Exact(0.0), Bound::Almost(bmax.value()), awhole && bwhole)
			} else {
				Schema::number(Bound::Almost(bmin.value()), Bound::Exact(0.0), awhole && bwhole)
			}
		}
	}
}

fn infer_pow((amin, amax, awhole): Range, (bmin, bmax, bwhole): Range) -> Schema {
	let negative_base = amin.value() < 0.0;
	if !bwhole && negative_base {
		return Schema::impossible("negative base with a possibly fractional exponent");
	}

	let mut candidates: Vec<f64> = Vec::new();
	for base in [amin.value(), amax.value()] {
		for exp in [bmin.value(), bmax.value()] {
			let v = pow_value(base, exp);
			candidates.push(v);
			if negative_base {
				// sign alternation between adjacent whole exponents
				candidates.push(-v);
			}
		}
	}
	if amin.value() <= 0.0 && amax.value() >= 0.0 && bmax.value() > 0.0 {
		candidates.push(0.0);
	}
	if bmin.value() <= 0.0 && bmax.value() >= 0.0 {
		candidates.push(1.0);
	}
	if amin.value() <= 1.0 && amax.value() >= 1.0 {
		candidates.push(1.0);
	}

	let low = candidates.iter().cloned().fold(f64::INFINITY, f64::min);
	let high = candidates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
	let low = if low.is_infinite() { Bound::Almost(low) } else { Bound::Exact(low) };
	let high = if high.is_infinite() { Bound::Almost(high) } else { Bound::Exact(high) };
	Schema::number(low, high, awhole && bwhole && bmin.value() >= 0.0)
}

fn pow_value(base: f64, exp: f64) -> f64 {
	let v = base.abs().powf(exp);
	if v.is_nan() { 1.0 } else { v }
}
