// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! `if` and `is`. The consequent of an `if` is typed in the frame where
//! the predicate is true; the alternate in the frame where a
//! structurally negated copy of the predicate is true. A predicate the
//! ranges already decide is a compile error, not a warning.

use femtocode_type::{Result, Schema, Value};

use crate::{
	error::LangError,
	expr::Expr,
	library::FunctionTable,
	typed::{Typed, TypedExpr, TypedKind, TypeFrame, apply_facts, build_typed, negate},
};

pub(super) fn literal_eval(args: &[&Value]) -> Option<Value> {
	match args {
		[Value::Bool(true), consequent, _] => Some((*consequent).clone()),
		[Value::Bool(false), _, alternate] => Some((*alternate).clone()),
		_ => None,
	}
}

pub(super) fn if_else(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [predicate, consequent, alternate] = args else {
		return Err(LangError::WrongArity {
			function: "if".to_string(),
			expected: 3,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};

	let typed_predicate = build_typed(predicate, frame, table)?;
	let just = match typed_predicate.schema() {
		Schema::Boolean {
			just,
		} => *just,
		other => {
			return Err(LangError::not_applicable("if", other, call.fragment()).into());
		}
	};
	if let Some(value) = just {
		return Err(LangError::ConstantPredicate {
			value,
			fragment: predicate.fragment(),
		}
		.into());
	}

	let true_frame = apply_facts(frame, &typed_predicate.truths, &predicate.fragment())?;
	let typed_consequent = build_typed(consequent, &true_frame, table)?;

	let negated = negate(predicate);
	let typed_negated = build_typed(&negated, frame, table)?;
	let false_frame = apply_facts(frame, &typed_negated.truths, &predicate.fragment())?;
	let typed_alternate = build_typed(alternate, &false_frame, table)?;

	let schema =
		Schema::union_of([typed_consequent.expr.schema.clone(), typed_alternate.expr.schema.clone()]);

	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: "if".to_string(),
			args: vec![typed_predicate.expr, typed_consequent.expr, typed_alternate.expr],
		},
		schema,
	)))
}

pub(super) fn is(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [target, schema_expr] = args else {
		return Err(LangError::WrongArity {
			function: "is".to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};
	let Expr::SchemaLiteral {
		schema: wanted,
	} = schema_expr
	else {
		return Err(LangError::Contradiction {
			reason: "the right-hand side of 'is' must be a schema expression".to_string(),
			fragment: call.fragment(),
		}
		.into());
	};

	let typed_target = build_typed(target, frame, table)?;
	let overlap = typed_target.schema().intersect(wanted);

	let just = if overlap.is_impossible() {
		Some(false)
	} else if &overlap == typed_target.schema() {
		Some(true)
	} else {
		None
	};

	let mut truths = crate::typed::Facts::new();
	if just.is_none() {
		if let Some(name) = typed_target.expr.as_ref_name() {
			truths.insert(name.to_string(), overlap);
		}
	}

	Ok(Typed {
		expr: TypedExpr::new(
			TypedKind::Call {
				function: "is".to_string(),
				args: vec![typed_target.expr, TypedExpr::new(
					TypedKind::SchemaLiteral {
						schema: wanted.clone(),
					},
					wanted.clone(),
				)],
			},
			Schema::Boolean {
				just,
			},
		),
		truths,
	})
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
	fn test_if_narrows_both_branches() {
		// if x < 5: x else: None  on x : integer
		// yields union(integer(min, almost(5)), null)
		let frame: TypeFrame = Frame::with([("x", Schema::integer_all())]);
		let typed = build_typed(
			&call("if", vec![
				call("<", vec![Expr::reference("x"), Expr::int(5)]),
				Expr::reference("x"),
				Expr::literal(Value::Null),
			]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap();
		let expected = Schema::union_of([
			Schema::integer(Bound::Almost(f64::NEG_INFINITY), Bound::Almost(5.0)),
			Schema::Null,
		]);
		assert_eq!(typed.schema(), &expected);

		// the consequent itself saw the narrowed x
		match &typed.expr.kind {
			TypedKind::Call {
				args, ..
			} => {
				assert_eq!(
					args[1].schema,
					Schema::integer(Bound::Almost(f64::NEG_INFINITY), Bound::Almost(5.0))
				);
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_alternate_sees_negated_predicate() {
		let frame: TypeFrame = Frame::with([("x", Schema::integer_all())]);
		let typed = build_typed(
			&call("if", vec![
				call("<", vec![Expr::reference("x"), Expr::int(5)]),
				Expr::int(0),
				Expr::reference("x"),
			]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap();
		match &typed.expr.kind {
			TypedKind::Call {
				args, ..
			} => {
				assert_eq!(args[2].schema, Schema::integer(Bound::Exact(5.0), Bound::Almost(f64::INFINITY)));
			}
			other => panic!("unexpected {:?}", other),
		}
	}

	#[test]
	fn test_constant_predicate_is_an_error() {
		let frame: TypeFrame = Frame::with([("x", Schema::integer(Bound::Exact(0.0), Bound::Exact(3.0)))]);
		let err = build_typed(
			&call("if", vec![
				call("<", vec![Expr::reference("x"), Expr::int(100)]),
				Expr::int(1),
				Expr::int(2),
			]),
			&frame,
			&FunctionTable::standard(),
		)
		.unwrap_err();
		assert_eq!(err.code(), "FEMTO_007");
		assert!(err.to_string().contains("constantly true"));
	}

	#[test]
	fn test_is_narrows_and_folds() {
		let table = FunctionTable::standard();
		let frame: TypeFrame =
			Frame::with([("x", Schema::union_of([Schema::Null, Schema::integer_all()]))]);
		let typed = build_typed(
			&Expr::is(Expr::reference("x"), Schema::integer_all()),
			&frame,
			&table,
		)
		.unwrap();
		assert_eq!(typed.schema(), &Schema::boolean());
		assert_eq!(typed.truths["x"], Schema::integer_all());

		// subset folds to true, disjoint to false
		let frame: TypeFrame = Frame::with([("n", Schema::integer_all())]);
		let typed = build_typed(&Expr::is(Expr::reference("n"), Schema::real_all()), &frame, &table).unwrap();
		assert_eq!(typed.schema(), &Schema::just(true));
		let typed = build_typed(&Expr::is(Expr::reference("n"), Schema::string()), &frame, &table).unwrap();
		assert_eq!(typed.schema(), &Schema::just(false));
	}
}
