// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The typing pass. Dispatches every call to its builtin's inference,
//! and owns the pieces they share: literal schemas, fact application,
//! and the structural negation used to type the false branch of `if`.

use femtocode_type::{Bound, Result, Schema, Value, error::Fragment};

use crate::{
	error::LangError,
	expr::Expr,
	library::FunctionTable,
	typed::{Facts, Typed, TypedExpr, TypedKind, TypeFrame},
};

pub fn build_typed(expr: &Expr, frame: &TypeFrame, table: &FunctionTable) -> Result<Typed> {
	match expr {
		Expr::Ref {
			name,
		} => {
			let schema = frame.get(name).cloned().ok_or_else(|| LangError::UndefinedName {
				name: name.clone(),
				fragment: expr.fragment(),
			})?;
			Ok(Typed::plain(TypedExpr::new(
				TypedKind::Ref {
					name: name.clone(),
				},
				schema,
			)))
		}

		Expr::Literal {
			value,
		} => Ok(Typed::plain(TypedExpr::new(
			TypedKind::Literal {
				value: value.clone(),
			},
			literal_schema(value),
		))),

		Expr::SchemaLiteral {
			schema,
		} => Ok(Typed::plain(TypedExpr::new(
			TypedKind::SchemaLiteral {
				schema: schema.clone(),
			},
			schema.clone(),
		))),

		Expr::Call {
			function,
			args,
		} => {
			let builtin = table.get(function).ok_or_else(|| LangError::UndefinedFunction {
				name: function.clone(),
				fragment: expr.fragment(),
			})?;
			builtin.build_typed(expr, args, frame, table)
		}

		Expr::UserFunction {
			..
		} => Err(LangError::Contradiction {
			reason: "a function cannot be used as a value".to_string(),
			fragment: expr.fragment(),
		}
		.into()),
	}
}

/// The singleton (or near-singleton) schema of a literal value.
pub fn literal_schema(value: &Value) -> Schema {
	match value {
		Value::Null => Schema::Null,
		Value::Bool(b) => Schema::just(*b),
		Value::Int(v) => Schema::integer(Bound::Exact(*v as f64), Bound::Exact(*v as f64)),
		Value::Float(v) => {
			if v.is_finite() {
				Schema::real(Bound::Exact(*v), Bound::Exact(*v))
			} else {
				Schema::extended()
			}
		}
		Value::Str(s) => {
			let length = s.chars().count() as u64;
			Schema::Str {
				charset: femtocode_type::Charset::Unicode,
				fewest: length,
				most: Some(length),
			}
		}
		Value::Bytes(b) => Schema::fixed_bytes(b.len() as u64),
		Value::List(items) => {
			let length = items.len() as u64;
			let item_schema = if items.is_empty() {
				Schema::impossible("no items")
			} else {
				Schema::union_of(items.iter().map(literal_schema))
			};
			Schema::Collection {
				items: Box::new(item_schema),
				fewest: length,
				most: Some(length),
				ordered: true,
			}
		}
		Value::Record(fields) => {
			Schema::record(fields.iter().map(|(name, value)| (name.clone(), literal_schema(value))))
		}
	}
}

/// Tighten a frame with facts established by a predicate. A fact that
/// contradicts an existing constraint is a cross-context error: the
/// enclosing scope already proved the variable lies elsewhere.
pub fn apply_facts(frame: &TypeFrame, facts: &Facts, fragment: &Fragment) -> Result<TypeFrame> {
	let mut out = frame.clone();
	for (name, fact) in facts {
		let Some(existing) = out.get(name).cloned() else {
			continue;
		};
		let tightened = existing.intersect(fact);
		if tightened.is_impossible() {
			return Err(LangError::CrossContext {
				name: name.clone(),
				existing: existing.to_string(),
				fact: fact.to_string(),
				fragment: fragment.clone(),
			}
			.into());
		}
		out = out.bind(name.clone(), tightened);
	}
	Ok(out)
}

/// Push negation through comparisons and boolean connectives so the
/// false branch of a predicate can narrow too. A residual `not` around
/// anything unrecognized is fine; it just establishes no facts.
pub fn negate(expr: &Expr) -> Expr {
	match expr {
		Expr::Call {
			function,
			args,
		} => {
			let flipped = match function.as_str() {
				"<" => Some(">="),
				"<=" => Some(">"),
				">" => Some("<="),
				">=" => Some("<"),
				"==" => Some("!="),
				"!=" => Some("=="),
				_ => None,
			};
			if let Some(flipped) = flipped {
				return Expr::Call {
					function: flipped.to_string(),
					args: args.clone(),
				};
			}
			match function.as_str() {
				"not" if args.len() == 1 => args[0].clone(),
				"and" => Expr::Call {
					function: "or".to_string(),
					args: args.iter().map(negate).collect(),
				},
				"or" => Expr::Call {
					function: "and".to_string(),
					args: args.iter().map(negate).collect(),
				},
				_ => Expr::Call {
					function: "not".to_string(),
					args: vec![expr.clone()],
				},
			}
		}
		Expr::Literal {
			value: Value::Bool(b),
		} => Expr::literal(Value::Bool(!b)),
		other => Expr::Call {
			function: "not".to_string(),
			args: vec![other.clone()],
		},
	}
}
