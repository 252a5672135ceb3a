// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Boolean connectives. `and` is where predicate narrowing compounds:
//! every operand is retyped under the truths of the others, so a chain
//! like `x > 0 and 1 / x < 2` typechecks — the division sees the
//! zero-free range established by its sibling.

use femtocode_type::{Result, Schema, Value};

use crate::{
	error::LangError,
	expr::Expr,
	library::{Builtin, FunctionTable},
	typed::{Facts, Typed, TypedExpr, TypedKind, TypeFrame, apply_facts, build_typed},
};

pub(super) fn literal_eval(op: Builtin, args: &[&Value]) -> Option<Value> {
	match (op, args) {
		(Builtin::Not, [Value::Bool(a)]) => Some(Value::Bool(!a)),
		(Builtin::And, _) => {
			let mut out = true;
			for arg in args {
				match arg {
					Value::Bool(b) => out = out && *b,
					_ => return None,
				}
			}
			Some(Value::Bool(out))
		}
		(Builtin::Or, _) => {
			let mut out = false;
			for arg in args {
				match arg {
					Value::Bool(b) => out = out || *b,
					_ => return None,
				}
			}
			Some(Value::Bool(out))
		}
		_ => None,
	}
}

fn require_boolean(op: &str, typed: &Typed, call: &Expr) -> Result<Option<bool>> {
	match typed.schema() {
		Schema::Boolean {
			just,
		} => Ok(*just),
		other => Err(LangError::not_applicable(op, other, call.fragment()).into()),
	}
}

/// Intersect two fact sets variable-wise. `None` signals that some
/// variable's facts contradict: no assignment can make both sides true.
fn intersect_facts(a: &Facts, b: &Facts) -> Option<Facts> {
	let mut out = a.clone();
	for (name, fact) in b {
		match out.get(name) {
			Some(existing) => {
				let tightened = existing.intersect(fact);
				if tightened.is_impossible() {
					return None;
				}
				out.insert(name.clone(), tightened);
			}
			None => {
				out.insert(name.clone(), fact.clone());
			}
		}
	}
	Some(out)
}

fn constantly_false() -> Typed {
	Typed::plain(TypedExpr::new(
		TypedKind::Literal {
			value: Value::Bool(false),
		},
		Schema::just(false),
	))
}

pub(super) fn and(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	if args.len() < 2 {
		return Err(LangError::WrongArity {
			function: "and".to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	}

	// first pass: each operand on its own, only to collect truths. A
	// branch may fail here (e.g. an unguarded division); its sibling
	// preconditions arrive in the second pass.
	let mut first: Vec<Facts> = Vec::with_capacity(args.len());
	for arg in args {
		match build_typed(arg, frame, table) {
			Ok(typed) => {
				require_boolean("and", &typed, call)?;
				first.push(typed.truths);
			}
			Err(_) => first.push(Facts::new()),
		}
	}

	// second pass: retype each operand under the truths of the others,
	// so every sibling acts as a precondition
	let mut typed_args: Vec<TypedExpr> = Vec::with_capacity(args.len());
	let mut justs: Vec<Option<bool>> = Vec::with_capacity(args.len());
	let mut truths = Facts::new();
	for (i, arg) in args.iter().enumerate() {
		let mut others = Facts::new();
		for (j, sibling) in first.iter().enumerate() {
			if i == j {
				continue;
			}
			match intersect_facts(&others, sibling) {
				Some(merged) => others = merged,
				None => return Ok(constantly_false()),
			}
		}
		let narrowed = apply_facts(frame, &others, &call.fragment())?;
		let typed = build_typed(arg, &narrowed, table)?;
		justs.push(require_boolean("and", &typed, call)?);
		match intersect_facts(&truths, &typed.truths) {
			Some(merged) => truths = merged,
			None => return Ok(constantly_false()),
		}
		typed_args.push(typed.expr);
	}

	let just = if justs.iter().any(|j| *j == Some(false)) {
		Some(false)
	} else if justs.iter().all(|j| *j == Some(true)) {
		Some(true)
	} else {
		None
	};

	Ok(Typed {
		expr: TypedExpr::new(
			TypedKind::Call {
				function: "and".to_string(),
				args: typed_args,
			},
			Schema::Boolean {
				just,
			},
		),
		truths,
	})
}

pub(super) fn or(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	if args.len() < 2 {
		return Err(LangError::WrongArity {
			function: "or".to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	}

	let mut typed_args: Vec<TypedExpr> = Vec::with_capacity(args.len());
	let mut justs: Vec<Option<bool>> = Vec::with_capacity(args.len());
	let mut branch_truths: Vec<Facts> = Vec::with_capacity(args.len());
	for arg in args {
		let typed = build_typed(arg, frame, table)?;
		justs.push(require_boolean("or", &typed, call)?);
		branch_truths.push(typed.truths.clone());
		typed_args.push(typed.expr);
	}

	// a fact survives only if every branch establishes one for the
	// variable; the surviving fact is the union of the branch facts
	let mut truths = Facts::new();
	if let Some(seed) = branch_truths.first() {
		for (name, fact) in seed {
			let mut union: Vec<Schema> = vec![fact.clone()];
			let everywhere = branch_truths[1..].iter().all(|other| match other.get(name) {
				Some(other_fact) => {
					union.push(other_fact.clone());
					true
				}
				None => false,
			});
			if everywhere {
				truths.insert(name.clone(), Schema::union_of(union));
			}
		}
	}

	let just = if justs.iter().any(|j| *j == Some(true)) {
		Some(true)
	} else if justs.iter().all(|j| *j == Some(false)) {
		Some(false)
	} else {
		None
	};

	Ok(Typed {
		expr: TypedExpr::new(
			TypedKind::Call {
				function: "or".to_string(),
				args: typed_args,
			},
			Schema::Boolean {
				just,
			},
		),
		truths,
	})
}

pub(super) fn not(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [arg] = args else {
		return Err(LangError::WrongArity {
			function: "not".to_string(),
			expected: 1,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};
	let typed = build_typed(arg, frame, table)?;
	let just = require_boolean("not", &typed, call)?;
	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: "not".to_string(),
			args: vec![typed.expr],
		},
		Schema::Boolean {
			just: just.map(|b| !b),
		},
	)))
}
