// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::{
	collections::BTreeMap,
	fmt::{self, Display, Formatter},
};

use serde::{
	Deserialize, Deserializer, Serialize, Serializer,
	de::{self, MapAccess, SeqAccess, Visitor},
	ser::{SerializeMap, SerializeSeq},
};

/// A fully materialized nested value: what the assembler produces and the
/// shredder consumes. Record fields are kept name-sorted so iteration
/// order matches column layout order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Bytes(Vec<u8>),
	Str(String),
	List(Vec<Value>),
	Record(BTreeMap<String, Value>),
}

impl Value {
	pub fn record(fields: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Value {
		Value::Record(fields.into_iter().map(|(name, value)| (name.into(), value)).collect())
	}

	pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
		Value::List(items.into_iter().collect())
	}

	/// Numeric view used by literal folding and membership tests; `None`
	/// for non-numeric values.
	pub fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Int(v) => Some(*v as f64),
			Value::Float(v) => Some(*v),
			_ => None,
		}
	}

	pub fn is_whole(&self) -> bool {
		match self {
			Value::Int(_) => true,
			Value::Float(v) => v.fract() == 0.0 && v.is_finite(),
			_ => false,
		}
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Value::Null => f.write_str("null"),
			Value::Bool(v) => write!(f, "{}", v),
			Value::Int(v) => write!(f, "{}", v),
			Value::Float(v) => write!(f, "{}", v),
			Value::Bytes(v) => write!(f, "bytes[{}]", v.len()),
			Value::Str(v) => write!(f, "{:?}", v),
			Value::List(items) => {
				f.write_str("[")?;
				for (i, item) in items.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}", item)?;
				}
				f.write_str("]")
			}
			Value::Record(fields) => {
				f.write_str("{")?;
				for (i, (name, value)) in fields.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{}: {}", name, value)?;
				}
				f.write_str("}")
			}
		}
	}
}

// The wire form is plain JSON: null/bool/number/string/array/object map
// directly, bytes are encoded as {"$bytes": [..]} to stay distinguishable
// from lists of small integers.
impl Serialize for Value {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Value::Null => serializer.serialize_unit(),
			Value::Bool(v) => serializer.serialize_bool(*v),
			Value::Int(v) => serializer.serialize_i64(*v),
			Value::Float(v) => serializer.serialize_f64(*v),
			Value::Str(v) => serializer.serialize_str(v),
			Value::Bytes(v) => {
				let mut map = serializer.serialize_map(Some(1))?;
				map.serialize_entry("$bytes", v)?;
				map.end()
			}
			Value::List(items) => {
				let mut seq = serializer.serialize_seq(Some(items.len()))?;
				for item in items {
					seq.serialize_element(item)?;
				}
				seq.end()
			}
			Value::Record(fields) => {
				let mut map = serializer.serialize_map(Some(fields.len()))?;
				for (name, value) in fields {
					map.serialize_entry(name, value)?;
				}
				map.end()
			}
		}
	}
}

impl<'de> Deserialize<'de> for Value {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct ValueVisitor;

		impl<'de> Visitor<'de> for ValueVisitor {
			type Value = Value;

			fn expecting(&self, f: &mut Formatter<'_>) -> fmt::Result {
				f.write_str("a femtocode value")
			}

			fn visit_unit<E>(self) -> Result<Value, E> {
				Ok(Value::Null)
			}

			fn visit_none<E>(self) -> Result<Value, E> {
				Ok(Value::Null)
			}

			fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
				Ok(Value::Bool(v))
			}

			fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
				Ok(Value::Int(v))
			}

			fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
				i64::try_from(v).map(Value::Int).map_err(|_| E::custom("integer out of range"))
			}

			fn visit_f64<E>(self, v: f64) -> Result<Value, E> {
				Ok(Value::Float(v))
			}

			fn visit_str<E>(self, v: &str) -> Result<Value, E> {
				Ok(Value::Str(v.to_string()))
			}

			fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
				let mut items = Vec::new();
				while let Some(item) = seq.next_element()? {
					items.push(item);
				}
				Ok(Value::List(items))
			}

			fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
				let mut fields = BTreeMap::new();
				while let Some(name) = map.next_key::<String>()? {
					if name == "$bytes" && fields.is_empty() {
						let bytes: Vec<u8> = map.next_value()?;
						if map.next_key::<String>()?.is_some() {
							return Err(de::Error::custom("$bytes object with extra keys"));
						}
						return Ok(Value::Bytes(bytes));
					}
					fields.insert(name, map.next_value()?);
				}
				Ok(Value::Record(fields))
			}
		}

		deserializer.deserialize_any(ValueVisitor)
	}
}
