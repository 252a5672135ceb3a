// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The standard function library. Each builtin is one variant of a
//! tagged enum; inference, literal folding and statement building are
//! pattern matches over it. The table itself is an immutable value
//! passed through compilation — there is no process-wide registry.

mod access;
mod arith;
mod collection;
mod compare;
mod control;
mod logic;

pub use access::slice_indices;
use femtocode_type::{Result, Value};
use indexmap::IndexMap;

use crate::{
	expr::Expr,
	typed::{Typed, TypeFrame},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
	// arithmetic
	Add,
	Sub,
	Mul,
	Div,
	FloorDiv,
	Mod,
	Pow,
	UPlus,
	UMinus,
	// comparison
	Eq,
	Ne,
	Lt,
	Le,
	Gt,
	Ge,
	// logic
	And,
	Or,
	Not,
	// structure
	If,
	Is,
	Get,
	Slice,
	Map,
}

impl Builtin {
	pub fn name(&self) -> &'static str {
		match self {
			Builtin::Add => "+",
			Builtin::Sub => "-",
			Builtin::Mul => "*",
			Builtin::Div => "/",
			Builtin::FloorDiv => "//",
			Builtin::Mod => "%",
			Builtin::Pow => "**",
			Builtin::UPlus => "u+",
			Builtin::UMinus => "u-",
			Builtin::Eq => "==",
			Builtin::Ne => "!=",
			Builtin::Lt => "<",
			Builtin::Le => "<=",
			Builtin::Gt => ">",
			Builtin::Ge => ">=",
			Builtin::And => "and",
			Builtin::Or => "or",
			Builtin::Not => "not",
			Builtin::If => "if",
			Builtin::Is => "is",
			Builtin::Get => "[]",
			Builtin::Slice => "[:]",
			Builtin::Map => ".map",
		}
	}

	pub fn commutative(&self) -> bool {
		matches!(self, Builtin::Add | Builtin::Mul | Builtin::Eq | Builtin::Ne | Builtin::And | Builtin::Or)
	}

	pub fn associative(&self) -> bool {
		matches!(self, Builtin::Add | Builtin::Mul | Builtin::And | Builtin::Or)
	}

	/// The kernel-level operation a flat call to this builtin lowers
	/// to; `None` for builtins with dedicated statement shapes.
	pub fn opcode(&self) -> Option<&'static str> {
		match self {
			Builtin::Add => Some("add"),
			Builtin::Sub => Some("sub"),
			Builtin::Mul => Some("mul"),
			Builtin::Div => Some("div"),
			Builtin::FloorDiv => Some("floordiv"),
			Builtin::Mod => Some("mod"),
			Builtin::Pow => Some("pow"),
			Builtin::UPlus => Some("uplus"),
			Builtin::UMinus => Some("uminus"),
			Builtin::Eq => Some("eq"),
			Builtin::Ne => Some("ne"),
			Builtin::Lt => Some("lt"),
			Builtin::Le => Some("le"),
			Builtin::Gt => Some("gt"),
			Builtin::Ge => Some("ge"),
			Builtin::And => Some("and"),
			Builtin::Or => Some("or"),
			Builtin::Not => Some("not"),
			Builtin::If => Some("if"),
			Builtin::Is | Builtin::Get | Builtin::Slice | Builtin::Map => None,
		}
	}

	/// Fold a call whose arguments are all literal; `None` when this
	/// builtin cannot (or should not) evaluate eagerly.
	pub fn literal_eval(&self, args: &[&Value]) -> Option<Value> {
		match self {
			Builtin::Add
			| Builtin::Sub
			| Builtin::Mul
			| Builtin::Div
			| Builtin::FloorDiv
			| Builtin::Mod
			| Builtin::Pow
			| Builtin::UPlus
			| Builtin::UMinus => arith::literal_eval(*self, args),
			Builtin::Eq | Builtin::Ne | Builtin::Lt | Builtin::Le | Builtin::Gt | Builtin::Ge => {
				compare::literal_eval(*self, args)
			}
			Builtin::And | Builtin::Or | Builtin::Not => logic::literal_eval(*self, args),
			Builtin::If => control::literal_eval(args),
			Builtin::Get => access::literal_eval(args),
			Builtin::Is | Builtin::Slice | Builtin::Map => None,
		}
	}

	/// Inference: type the arguments under `frame`, refine the result
	/// schema, and surface the truths the call establishes.
	pub fn build_typed(
		&self,
		call: &Expr,
		args: &[Expr],
		frame: &TypeFrame,
		table: &FunctionTable,
	) -> Result<Typed> {
		match self {
			Builtin::Add
			| Builtin::Sub
			| Builtin::Mul
			| Builtin::Div
			| Builtin::FloorDiv
			| Builtin::Mod
			| Builtin::Pow => arith::binary(*self, call, args, frame, table),
			Builtin::UPlus | Builtin::UMinus => arith::unary(*self, call, args, frame, table),
			Builtin::Eq | Builtin::Ne | Builtin::Lt | Builtin::Le | Builtin::Gt | Builtin::Ge => {
				compare::binary(*self, call, args, frame, table)
			}
			Builtin::And => logic::and(call, args, frame, table),
			Builtin::Or => logic::or(call, args, frame, table),
			Builtin::Not => logic::not(call, args, frame, table),
			Builtin::If => control::if_else(call, args, frame, table),
			Builtin::Is => control::is(call, args, frame, table),
			Builtin::Get => access::get(call, args, frame, table),
			Builtin::Slice => access::slice(call, args, frame, table),
			Builtin::Map => collection::map(call, args, frame, table),
		}
	}
}

/// The `name → builtin` table a query is compiled against. Built once,
/// never mutated; extensions are supplied per compilation.
#[derive(Debug, Clone)]
pub struct FunctionTable {
	entries: IndexMap<String, Builtin>,
}

impl FunctionTable {
	pub fn standard() -> Self {
		let all = [
			Builtin::Add,
			Builtin::Sub,
			Builtin::Mul,
			Builtin::Div,
			Builtin::FloorDiv,
			Builtin::Mod,
			Builtin::Pow,
			Builtin::UPlus,
			Builtin::UMinus,
			Builtin::Eq,
			Builtin::Ne,
			Builtin::Lt,
			Builtin::Le,
			Builtin::Gt,
			Builtin::Ge,
			Builtin::And,
			Builtin::Or,
			Builtin::Not,
			Builtin::If,
			Builtin::Is,
			Builtin::Get,
			Builtin::Slice,
			Builtin::Map,
		];
		Self {
			entries: all.into_iter().map(|b| (b.name().to_string(), b)).collect(),
		}
	}

	/// The standard table plus caller-supplied entries (aliases or
	/// re-bindings); later entries shadow earlier ones.
	pub fn with_extensions(extensions: impl IntoIterator<Item = (String, Builtin)>) -> Self {
		let mut table = Self::standard();
		for (name, builtin) in extensions {
			table.entries.insert(name, builtin);
		}
		table
	}

	pub fn get(&self, name: &str) -> Option<&Builtin> {
		self.entries.get(name)
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.keys().map(String::as_str)
	}
}
