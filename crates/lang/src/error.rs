// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use femtocode_type::{
	Schema,
	error::{Diagnostic, Fragment, IntoDiagnostic},
};

/// User-facing compilation errors. Every variant renders the schemas it
/// talks about, so the caller never needs compiler internals to print a
/// useful message. Schema contradictions (`Impossible`) are converted
/// into these at the call site that produced them; they never escape as
/// bare schemas.
#[derive(Debug, thiserror::Error)]
pub enum LangError {
	#[error("name '{name}' is not defined")]
	UndefinedName {
		name: String,
		fragment: Fragment,
	},

	#[error("function '{name}' is not defined")]
	UndefinedFunction {
		name: String,
		fragment: Fragment,
	},

	#[error("'{function}' expects {expected} arguments, got {actual}")]
	WrongArity {
		function: String,
		expected: usize,
		actual: usize,
		fragment: Fragment,
	},

	#[error("'{function}' is not applicable to {schema}")]
	NotApplicable {
		function: String,
		schema: String,
		fragment: Fragment,
	},

	#[error("{reason}")]
	Contradiction {
		reason: String,
		fragment: Fragment,
	},

	#[error("conflicting constraints on '{name}': {fact} versus {existing}")]
	CrossContext {
		name: String,
		existing: String,
		fact: String,
		fragment: Fragment,
	},

	#[error("predicate is constantly {value}")]
	ConstantPredicate {
		value: bool,
		fragment: Fragment,
	},

	#[error("index {index} cannot be proven inside [0, {length})")]
	IndexOutOfRange {
		index: String,
		length: u64,
		fragment: Fragment,
	},

	#[error("a function of {arity} argument(s) is expected here")]
	FunctionExpected {
		arity: usize,
		fragment: Fragment,
	},
}

impl LangError {
	pub fn not_applicable(function: &str, schema: &Schema, fragment: Fragment) -> Self {
		LangError::NotApplicable {
			function: function.to_string(),
			schema: schema.to_string(),
			fragment,
		}
	}
}

impl IntoDiagnostic for LangError {
	fn into_diagnostic(self) -> Diagnostic {
		match self {
			LangError::UndefinedName {
				name,
				fragment,
			} => Diagnostic::new("FEMTO_001", format!("name '{}' is not defined", name))
				.with_fragment(fragment)
				.with_help("only dataset fields and enclosing function parameters are in scope"),

			LangError::UndefinedFunction {
				name,
				fragment,
			} => Diagnostic::new("FEMTO_002", format!("function '{}' is not defined", name))
				.with_fragment(fragment)
				.with_help("the standard library and any user-supplied extensions are in scope"),

			LangError::WrongArity {
				function,
				expected,
				actual,
				fragment,
			} => Diagnostic::new(
				"FEMTO_003",
				format!("'{}' expects {} arguments, got {}", function, expected, actual),
			)
			.with_fragment(fragment),

			LangError::NotApplicable {
				function,
				schema,
				fragment,
			} => Diagnostic::new("FEMTO_004", format!("'{}' is not applicable to {}", function, schema))
				.with_fragment(fragment)
				.with_label("wrong operand type"),

			LangError::Contradiction {
				reason,
				fragment,
			} => Diagnostic::new("FEMTO_005", reason)
				.with_fragment(fragment)
				.with_label("no value can satisfy this"),

			LangError::CrossContext {
				name,
				existing,
				fact,
				fragment,
			} => Diagnostic::new(
				"FEMTO_006",
				format!("conflicting constraints on '{}': {} versus {}", name, fact, existing),
			)
			.with_fragment(fragment)
			.with_note("a constraint inferred here contradicts one established in an enclosing context"),

			LangError::ConstantPredicate {
				value,
				fragment,
			} => Diagnostic::new("FEMTO_007", format!("predicate is constantly {}", value))
				.with_fragment(fragment)
				.with_help("a branch that can never (or always) be taken is almost certainly a mistake"),

			LangError::IndexOutOfRange {
				index,
				length,
				fragment,
			} => Diagnostic::new(
				"FEMTO_008",
				format!("index {} cannot be proven inside [0, {})", index, length),
			)
			.with_fragment(fragment)
			.with_help("tighten the index range with a comparison, or use a fixed-size collection"),

			LangError::FunctionExpected {
				arity,
				fragment,
			} => Diagnostic::new("FEMTO_009", format!("a function of {} argument(s) is expected here", arity))
				.with_fragment(fragment)
				.with_help("pass a function, or an expression over $1..$n"),
		}
	}
}

impl From<LangError> for femtocode_type::Error {
	fn from(err: LangError) -> Self {
		femtocode_type::Error(err.into_diagnostic())
	}
}
