// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Wire form of schemas. Parameterless schemas serialize as bare strings
//! (`"real"`, `"null"`), everything else as a single-key object naming
//! the variant. Infinite endpoints spell `"inf"` / `"-inf"` because JSON
//! numbers cannot.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value as Json, json};

use crate::{
	bound::Bound,
	schema::{Charset, Schema},
};

fn bound_to_json(bound: &Bound) -> Json {
	fn finite(v: f64) -> Json {
		json!(v)
	}
	match bound {
		Bound::Exact(v) => finite(*v),
		Bound::Almost(v) => {
			if *v == f64::INFINITY {
				json!({ "almost": "inf" })
			} else if *v == f64::NEG_INFINITY {
				json!({ "almost": "-inf" })
			} else {
				json!({ "almost": v })
			}
		}
	}
}

fn bound_from_json(json: &Json) -> Result<Bound, String> {
	match json {
		Json::Number(n) => n.as_f64().map(Bound::Exact).ok_or_else(|| "bad number".to_string()),
		Json::Object(map) => {
			let inner = map.get("almost").ok_or_else(|| "expected {\"almost\": ...}".to_string())?;
			match inner {
				Json::Number(n) => {
					n.as_f64().map(Bound::Almost).ok_or_else(|| "bad number".to_string())
				}
				Json::String(s) if s == "inf" => Ok(Bound::Almost(f64::INFINITY)),
				Json::String(s) if s == "-inf" => Ok(Bound::Almost(f64::NEG_INFINITY)),
				_ => Err("bad almost endpoint".to_string()),
			}
		}
		_ => Err("expected a bound".to_string()),
	}
}

fn schema_to_json(schema: &Schema) -> Json {
	match schema {
		Schema::Null => json!("null"),
		Schema::Boolean {
			just: None,
		} => json!("boolean"),
		Schema::Boolean {
			just: Some(value),
		} => json!({ "boolean": { "just": value } }),
		Schema::Number {
			min,
			max,
			whole,
		} => {
			if *schema == Schema::integer_all() {
				json!("integer")
			} else if *schema == Schema::real_all() {
				json!("real")
			} else {
				json!({ "number": {
					"min": bound_to_json(min),
					"max": bound_to_json(max),
					"whole": whole,
				} })
			}
		}
		Schema::Str {
			charset,
			fewest,
			most,
		} => {
			if *fewest == 0 && most.is_none() {
				match charset {
					Charset::Unicode => json!("string"),
					Charset::Bytes => json!("bytes"),
				}
			} else {
				json!({ "string": {
					"charset": match charset {
						Charset::Unicode => "unicode",
						Charset::Bytes => "bytes",
					},
					"fewest": fewest,
					"most": most,
				} })
			}
		}
		Schema::Collection {
			items,
			fewest,
			most,
			ordered,
		} => json!({ "collection": {
			"items": schema_to_json(items),
			"fewest": fewest,
			"most": most,
			"ordered": ordered,
		} }),
		Schema::Record {
			fields,
		} => {
			let fields: Map<String, Json> =
				fields.iter().map(|(name, field)| (name.clone(), schema_to_json(field))).collect();
			json!({ "record": { "fields": fields } })
		}
		Schema::Union {
			possibilities,
		} => json!({ "union": possibilities.iter().map(schema_to_json).collect::<Vec<_>>() }),
		Schema::Impossible {
			reason,
		} => json!({ "impossible": reason }),
		Schema::Ref {
			name,
		} => json!({ "ref": name }),
	}
}

fn schema_from_json(json: &Json) -> Result<Schema, String> {
	match json {
		Json::String(name) => match name.as_str() {
			"null" => Ok(Schema::Null),
			"boolean" => Ok(Schema::boolean()),
			"integer" => Ok(Schema::integer_all()),
			"real" | "extended" => Ok(Schema::real_all()),
			"string" => Ok(Schema::string()),
			"bytes" => Ok(Schema::bytes()),
			other => Err(format!("unknown schema name '{}'", other)),
		},
		Json::Object(map) if map.len() == 1 => {
			let (key, body) = map.iter().next().unwrap();
			match key.as_str() {
				"boolean" => {
					let just = body
						.get("just")
						.and_then(Json::as_bool)
						.ok_or_else(|| "boolean needs a 'just' flag".to_string())?;
					Ok(Schema::just(just))
				}
				"number" => {
					let min = bound_from_json(body.get("min").ok_or("number needs 'min'")?)?;
					let max = bound_from_json(body.get("max").ok_or("number needs 'max'")?)?;
					let whole =
						body.get("whole").and_then(Json::as_bool).ok_or("number needs 'whole'")?;
					let schema = Schema::number(min, max, whole);
					if schema.is_impossible() {
						return Err(format!("{}", schema));
					}
					Ok(schema)
				}
				"string" => {
					let charset = match body.get("charset").and_then(Json::as_str) {
						Some("unicode") => Charset::Unicode,
						Some("bytes") => Charset::Bytes,
						_ => return Err("string needs a charset".to_string()),
					};
					let fewest =
						body.get("fewest").and_then(Json::as_u64).ok_or("string needs 'fewest'")?;
					let most = match body.get("most") {
						None | Some(Json::Null) => None,
						Some(v) => Some(v.as_u64().ok_or("bad 'most'")?),
					};
					Ok(Schema::Str {
						charset,
						fewest,
						most,
					})
				}
				"collection" => {
					let items = schema_from_json(body.get("items").ok_or("collection needs 'items'")?)?;
					let fewest =
						body.get("fewest").and_then(Json::as_u64).ok_or("collection needs 'fewest'")?;
					let most = match body.get("most") {
						None | Some(Json::Null) => None,
						Some(v) => Some(v.as_u64().ok_or("bad 'most'")?),
					};
					let ordered = body.get("ordered").and_then(Json::as_bool).unwrap_or(true);
					Ok(Schema::Collection {
						items: Box::new(items),
						fewest,
						most,
						ordered,
					})
				}
				"record" => {
					let fields = body
						.get("fields")
						.and_then(Json::as_object)
						.ok_or("record needs 'fields'")?;
					let fields: Result<BTreeMap<String, Schema>, String> = fields
						.iter()
						.map(|(name, field)| Ok((name.clone(), schema_from_json(field)?)))
						.collect();
					Ok(Schema::Record {
						fields: fields?,
					})
				}
				"union" => {
					let possibilities =
						body.as_array().ok_or("union needs an array of possibilities")?;
					let possibilities: Result<Vec<Schema>, String> =
						possibilities.iter().map(schema_from_json).collect();
					Ok(Schema::Union {
						possibilities: possibilities?,
					})
				}
				"impossible" => Ok(Schema::impossible(body.as_str().unwrap_or(""))),
				"ref" => Ok(Schema::named(body.as_str().ok_or("ref needs a name")?)),
				other => Err(format!("unknown schema variant '{}'", other)),
			}
		}
		_ => Err("expected a schema".to_string()),
	}
}

impl Serialize for Schema {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		schema_to_json(self).serialize(serializer)
	}
}

impl<'de> Deserialize<'de> for Schema {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let json = Json::deserialize(deserializer)?;
		schema_from_json(&json).map_err(de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(schema: Schema) {
		let json = serde_json::to_string(&schema).unwrap();
		let back: Schema = serde_json::from_str(&json).unwrap();
		assert_eq!(back, schema, "through {}", json);
	}

	#[test]
	fn test_round_trips() {
		round_trip(Schema::Null);
		round_trip(Schema::boolean());
		round_trip(Schema::just(false));
		round_trip(Schema::integer_all());
		round_trip(Schema::real_all());
		round_trip(Schema::integer(Bound::Exact(0.0), Bound::Exact(9.0)));
		round_trip(Schema::real(Bound::Almost(0.0), Bound::Almost(f64::INFINITY)));
		round_trip(Schema::string());
		round_trip(Schema::fixed_bytes(16));
		round_trip(Schema::collection(Schema::real_all()));
		round_trip(Schema::vector(Schema::integer_all(), 3));
		round_trip(Schema::record([("pt", Schema::real_all()), ("q", Schema::integer_all())]));
		round_trip(Schema::union_of([Schema::Null, Schema::real_all()]));
		round_trip(Schema::named("tree"));
	}

	#[test]
	fn test_shorthand_strings() {
		assert_eq!(serde_json::to_string(&Schema::real_all()).unwrap(), "\"real\"");
		assert_eq!(serde_json::from_str::<Schema>("\"integer\"").unwrap(), Schema::integer_all());
	}

	#[test]
	fn test_rejects_unknown() {
		assert!(serde_json::from_str::<Schema>("\"quaternion\"").is_err());
		assert!(serde_json::from_str::<Schema>("{\"number\": {\"min\": 5, \"max\": 1, \"whole\": false}}").is_err());
	}
}
