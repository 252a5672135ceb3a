// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Raw expression trees. The surface parser lives outside this
//! workspace; an embedding layer hands over trees of references,
//! literals, calls and user functions, already shaped like this. The
//! only responsibilities here are name resolution against a lexical
//! frame, literal folding at construction, and the elevation of value
//! expressions into positional functions.

use std::{
	fmt::{self, Display, Formatter},
	sync::Arc,
};

use femtocode_type::{Result, Schema, Value, error::Fragment};

use crate::{
	error::LangError,
	frame::Frame,
	library::{Builtin, FunctionTable},
};

/// What a name refers to in a lexical scope.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
	/// A dataset field visible at this scope.
	Field,
	/// A parameter of an enclosing user function.
	Parameter,
}

pub type SymbolFrame = Arc<Frame<Binding>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
	Ref {
		name: String,
	},
	Literal {
		value: Value,
	},
	/// The right-hand side of the `is` operator: the restricted schema
	/// expression grammar produces exactly a schema, nothing else.
	SchemaLiteral {
		schema: Schema,
	},
	Call {
		function: String,
		args: Vec<Expr>,
	},
	UserFunction {
		params: Vec<String>,
		defaults: Vec<Option<Value>>,
		body: Box<Expr>,
	},
}

impl Expr {
	pub fn reference(name: impl Into<String>) -> Expr {
		Expr::Ref {
			name: name.into(),
		}
	}

	pub fn literal(value: Value) -> Expr {
		Expr::Literal {
			value,
		}
	}

	pub fn int(value: i64) -> Expr {
		Expr::literal(Value::Int(value))
	}

	pub fn float(value: f64) -> Expr {
		Expr::literal(Value::Float(value))
	}

	pub fn is(target: Expr, schema: Schema) -> Expr {
		Expr::Call {
			function: "is".to_string(),
			args: vec![target, Expr::SchemaLiteral {
				schema,
			}],
		}
	}

	pub fn lambda(params: impl IntoIterator<Item = impl Into<String>>, body: Expr) -> Expr {
		let params: Vec<String> = params.into_iter().map(Into::into).collect();
		let defaults = vec![None; params.len()];
		Expr::UserFunction {
			params,
			defaults,
			body: Box::new(body),
		}
	}

	/// Construct a call, folding it to a literal when every argument is
	/// a literal and the function can evaluate eagerly.
	pub fn build(table: &FunctionTable, function: impl Into<String>, args: Vec<Expr>) -> Expr {
		let function = function.into();
		if let Some(builtin) = table.get(&function) {
			let literals: Option<Vec<&Value>> = args
				.iter()
				.map(|arg| match arg {
					Expr::Literal {
						value,
					} => Some(value),
					_ => None,
				})
				.collect();
			if let Some(literals) = literals {
				if let Some(folded) = builtin.literal_eval(&literals) {
					return Expr::Literal {
						value: folded,
					};
				}
			}
		}
		Expr::Call {
			function,
			args,
		}
	}

	/// When a position expects a function of `arity` arguments but holds
	/// a value expression, synthesize the function with positional
	/// parameters `$1..$arity`. This is what makes `xs.map($1 + 3)`
	/// equivalent to `xs.map(x => x + 3)`.
	pub fn build_or_elevate(self, arity: usize) -> Expr {
		match self {
			function @ Expr::UserFunction {
				..
			} => function,
			body => {
				let params: Vec<String> = (1..=arity).map(|n| format!("${}", n)).collect();
				let defaults = vec![None; arity];
				Expr::UserFunction {
					params,
					defaults,
					body: Box::new(body),
				}
			}
		}
	}

	/// Check every name against the lexical frame and every call
	/// against the function table. User bindings shadow builtins, so a
	/// bound name is checked first.
	pub fn resolve(&self, frame: &SymbolFrame, table: &FunctionTable) -> Result<()> {
		match self {
			Expr::Ref {
				name,
			} => {
				if frame.defines(name) {
					Ok(())
				} else {
					Err(LangError::UndefinedName {
						name: name.clone(),
						fragment: self.fragment(),
					}
					.into())
				}
			}
			Expr::Literal {
				..
			}
			| Expr::SchemaLiteral {
				..
			} => Ok(()),
			Expr::Call {
				function,
				args,
			} => {
				let Some(builtin) = table.get(function) else {
					return Err(LangError::UndefinedFunction {
						name: function.clone(),
						fragment: self.fragment(),
					}
					.into());
				};
				// higher-order positions elevate value expressions, so
				// `$1` resolves as the synthesized parameter
				if matches!(builtin, Builtin::Map) && args.len() == 2 {
					args[0].resolve(frame, table)?;
					return args[1].clone().build_or_elevate(1).resolve(frame, table);
				}
				for arg in args {
					arg.resolve(frame, table)?;
				}
				Ok(())
			}
			Expr::UserFunction {
				params,
				body,
				..
			} => {
				let inner = frame.fork(params.iter().map(|p| (p.clone(), Binding::Parameter)));
				body.resolve(&inner, table)
			}
		}
	}

	/// The source rendering attached to diagnostics.
	pub fn fragment(&self) -> Fragment {
		Fragment::internal(self.to_string())
	}
}

const INFIX: &[&str] = &["+", "-", "*", "/", "//", "%", "**", "==", "!=", "<", "<=", ">", ">=", "and", "or"];

impl Display for Expr {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Expr::Ref {
				name,
			} => f.write_str(name),
			Expr::Literal {
				value,
			} => write!(f, "{}", value),
			Expr::SchemaLiteral {
				schema,
			} => write!(f, "{}", schema),
			Expr::Call {
				function,
				args,
			} => {
				if INFIX.contains(&function.as_str()) && args.len() == 2 {
					write!(f, "({} {} {})", args[0], function, args[1])
				} else if function == ".map" && args.len() == 2 {
					write!(f, "{}.map({})", args[0], args[1])
				} else {
					write!(f, "{}(", function)?;
					for (i, arg) in args.iter().enumerate() {
						if i > 0 {
							f.write_str(", ")?;
						}
						write!(f, "{}", arg)?;
					}
					f.write_str(")")
				}
			}
			Expr::UserFunction {
				params,
				body,
				..
			} => {
				f.write_str("(")?;
				for (i, param) in params.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					f.write_str(param)?;
				}
				write!(f, " => {})", body)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_literal_folding() {
		let table = FunctionTable::standard();
		let folded = Expr::build(&table, "+", vec![Expr::int(2), Expr::int(3)]);
		assert_eq!(folded, Expr::literal(Value::Int(5)));

		let unfolded = Expr::build(&table, "+", vec![Expr::reference("x"), Expr::int(3)]);
		assert!(matches!(unfolded, Expr::Call { .. }));
	}

	#[test]
	fn test_elevation() {
		let elevated = Expr::build(&FunctionTable::standard(), "+", vec![
			Expr::reference("$1"),
			Expr::int(3),
		])
		.build_or_elevate(1);
		match elevated {
			Expr::UserFunction {
				params, ..
			} => assert_eq!(params, vec!["$1".to_string()]),
			other => panic!("expected elevation, got {}", other),
		}
	}

	#[test]
	fn test_resolution() {
		let table = FunctionTable::standard();
		let frame = Frame::with([("x", Binding::Field)]);
		let good = Expr::build(&table, "+", vec![Expr::reference("x"), Expr::int(1)]);
		assert!(good.resolve(&frame, &table).is_ok());

		let bad = Expr::build(&table, "+", vec![Expr::reference("y"), Expr::int(1)]);
		let err = bad.resolve(&frame, &table).unwrap_err();
		assert_eq!(err.code(), "FEMTO_001");

		let bad_fn = Expr::Call {
			function: "frobnicate".to_string(),
			args: vec![],
		};
		assert_eq!(bad_fn.resolve(&frame, &table).unwrap_err().code(), "FEMTO_002");
	}

	#[test]
	fn test_positional_shortcut_resolves_inside_map() {
		let table = FunctionTable::standard();
		let frame = Frame::with([("xs", Binding::Field)]);
		let query = Expr::Call {
			function: ".map".to_string(),
			args: vec![
				Expr::reference("xs"),
				Expr::build(&table, "+", vec![Expr::reference("$1"), Expr::int(3)]),
			],
		};
		assert!(query.resolve(&frame, &table).is_ok());

		// a bare $1 outside a higher-order position stays unbound
		let stray = Expr::reference("$1");
		assert_eq!(stray.resolve(&frame, &table).unwrap_err().code(), "FEMTO_001");
	}

	#[test]
	fn test_rendering() {
		let table = FunctionTable::standard();
		let expr = Expr::build(&table, "+", vec![Expr::reference("x"), Expr::reference("y")]);
		assert_eq!(expr.to_string(), "(x + y)");
	}
}
