// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! `.map`: the one higher-order builtin. The function argument is
//! monomorphized here — its body is typed with the parameter bound to
//! the collection's item schema and survives as an ordinary typed tree
//! under a [`TypedKind::Lambda`]; no closure reaches the statement
//! list.

use femtocode_type::{Result, Schema};

use crate::{
	error::LangError,
	expr::Expr,
	library::FunctionTable,
	typed::{Typed, TypedExpr, TypedKind, TypeFrame, build_typed},
};

pub(super) fn map(call: &Expr, args: &[Expr], frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	let [collection, function] = args else {
		return Err(LangError::WrongArity {
			function: ".map".to_string(),
			expected: 2,
			actual: args.len(),
			fragment: call.fragment(),
		}
		.into());
	};

	let typed_collection = build_typed(collection, frame, table)?;
	let Schema::Collection {
		items,
		fewest,
		most,
		ordered,
	} = typed_collection.schema().clone()
	else {
		return Err(LangError::not_applicable(".map", typed_collection.schema(), call.fragment()).into());
	};

	let elevated = function.clone().build_or_elevate(1);
	let Expr::UserFunction {
		params,
		body,
		..
	} = &elevated
	else {
		return Err(LangError::FunctionExpected {
			arity: 1,
			fragment: call.fragment(),
		}
		.into());
	};
	let [param] = params.as_slice() else {
		return Err(LangError::FunctionExpected {
			arity: 1,
			fragment: call.fragment(),
		}
		.into());
	};

	let inner = frame.bind(param.clone(), items.as_ref().clone());
	let typed_body = build_typed(body, &inner, table)?;

	let schema = Schema::Collection {
		items: Box::new(typed_body.expr.schema.clone()),
		fewest,
		most,
		ordered,
	};

	Ok(Typed::plain(TypedExpr::new(
		TypedKind::Call {
			function: ".map".to_string(),
			args: vec![typed_collection.expr, TypedExpr::new(
				TypedKind::Lambda {
					param: param.clone(),
					body: Box::new(typed_body.expr),
				},
				Schema::impossible("a function is not a value"),
			)],
		},
		schema,
	)))
}
