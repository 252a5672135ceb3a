// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! The schema rendering used in diagnostics: compact, constructor-like,
//! with `min`/`max` standing in for unbounded endpoints.

use std::fmt::{self, Display, Formatter};

use crate::{
	bound::Bound,
	schema::{Charset, Schema},
};

fn write_low(f: &mut Formatter<'_>, bound: &Bound) -> fmt::Result {
	if bound.is_open() && bound.value() == f64::NEG_INFINITY {
		f.write_str("min")
	} else {
		write!(f, "{}", bound)
	}
}

fn write_high(f: &mut Formatter<'_>, bound: &Bound) -> fmt::Result {
	if bound.is_open() && bound.value() == f64::INFINITY {
		f.write_str("max")
	} else {
		write!(f, "{}", bound)
	}
}

fn is_unbounded(min: &Bound, max: &Bound) -> bool {
	min.is_open() && min.value() == f64::NEG_INFINITY && max.is_open() && max.value() == f64::INFINITY
}

fn write_length(f: &mut Formatter<'_>, fewest: u64, most: &Option<u64>) -> fmt::Result {
	match most {
		Some(most) => write!(f, ", {}, {}", fewest, most),
		None if fewest == 0 => Ok(()),
		None => write!(f, ", {}, max", fewest),
	}
}

impl Display for Schema {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Schema::Null => f.write_str("null"),
			Schema::Boolean {
				just: None,
			} => f.write_str("boolean"),
			Schema::Boolean {
				just: Some(value),
			} => write!(f, "boolean({})", value),
			Schema::Number {
				min,
				max,
				whole,
			} => {
				let name = if *whole { "integer" } else { "real" };
				if is_unbounded(min, max) {
					f.write_str(name)
				} else {
					write!(f, "{}(", name)?;
					write_low(f, min)?;
					f.write_str(", ")?;
					write_high(f, max)?;
					f.write_str(")")
				}
			}
			Schema::Str {
				charset,
				fewest,
				most,
			} => {
				let name = match charset {
					Charset::Unicode => "string",
					Charset::Bytes => "bytes",
				};
				if *fewest == 0 && most.is_none() {
					f.write_str(name)
				} else {
					write!(f, "{}(\"{}\"", name, if *charset == Charset::Unicode { "unicode" } else { "bytes" })?;
					write_length(f, *fewest, most)?;
					f.write_str(")")
				}
			}
			Schema::Collection {
				items,
				fewest,
				most,
				ordered,
			} => {
				let name = if Some(*fewest) == *most {
					"vector"
				} else if *ordered {
					"collection"
				} else {
					"multiset"
				};
				write!(f, "{}({}", name, items)?;
				if Some(*fewest) == *most {
					write!(f, ", {}", fewest)?;
				} else {
					write_length(f, *fewest, most)?;
				}
				f.write_str(")")
			}
			Schema::Record {
				fields,
			} => {
				f.write_str("record(")?;
				for (i, (name, schema)) in fields.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", name, schema)?;
				}
				f.write_str(")")
			}
			Schema::Union {
				possibilities,
			} => {
				f.write_str("union(")?;
				for (i, possibility) in possibilities.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", possibility)?;
				}
				f.write_str(")")
			}
			Schema::Impossible {
				reason,
			} => {
				if reason.is_empty() {
					f.write_str("impossible")
				} else {
					write!(f, "impossible({})", reason)
				}
			}
			Schema::Ref {
				name,
			} => write!(f, "{}", name),
		}
	}
}
