// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Membership: is a value in a schema's set? Open endpoints are honored
//! as strict inequalities; a union admits a value if any possibility
//! does.

use crate::{
	schema::{Charset, Schema, SchemaContext},
	value::Value,
};

impl Schema {
	pub fn contains(&self, value: &Value) -> bool {
		self.contains_in(value, None)
	}

	pub fn contains_in(&self, value: &Value, ctx: Option<&SchemaContext>) -> bool {
		match self {
			Schema::Null => matches!(value, Value::Null),
			Schema::Boolean {
				just,
			} => match value {
				Value::Bool(b) => just.map(|j| j == *b).unwrap_or(true),
				_ => false,
			},
			Schema::Number {
				min,
				max,
				whole,
			} => {
				let Some(v) = value.as_f64() else {
					return false;
				};
				if matches!(value, Value::Bool(_)) {
					return false;
				}
				if *whole && !value.is_whole() {
					return false;
				}
				v.is_finite() && min.admits_low(v) && max.admits_high(v)
			}
			Schema::Str {
				charset,
				fewest,
				most,
			} => {
				let length = match (charset, value) {
					(Charset::Unicode, Value::Str(s)) => s.chars().count() as u64,
					(Charset::Bytes, Value::Bytes(b)) => b.len() as u64,
					_ => return false,
				};
				length >= *fewest && most.map(|m| length <= m).unwrap_or(true)
			}
			Schema::Collection {
				items,
				fewest,
				most,
				..
			} => match value {
				Value::List(list) => {
					let length = list.len() as u64;
					length >= *fewest
						&& most.map(|m| length <= m).unwrap_or(true)
						&& list.iter().all(|item| items.contains_in(item, ctx))
				}
				_ => false,
			},
			Schema::Record {
				fields,
			} => match value {
				Value::Record(entries) => {
					fields.len() == entries.len()
						&& fields.iter().all(|(name, schema)| {
							entries.get(name).map(|v| schema.contains_in(v, ctx)).unwrap_or(false)
						})
				}
				_ => false,
			},
			Schema::Union {
				possibilities,
			} => possibilities.iter().any(|p| p.contains_in(value, ctx)),
			Schema::Impossible {
				..
			} => false,
			Schema::Ref {
				name,
			} => match ctx.and_then(|c| c.get(name)) {
				// values are finite, so the recursion terminates even
				// for cyclic schemas
				Some(resolved) => resolved.contains_in(value, ctx),
				None => false,
			},
		}
	}
}
