// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Column names: the paths that tie flat stripes back to positions in a
//! nested schema.
//!
//! Wire grammar: `segment ('.' segment | '@' int)* ('@size' | '@tag')?`
//! where a segment is an identifier. Position tags index into a union's
//! possibilities; the two reserved suffixes mark size and tag sidecars.
//! Temporary columns minted by the statement builder use the reserved
//! `#N` spelling, which is parseable but never valid in a user schema.

use std::{
	fmt::{self, Display, Formatter},
	str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use smallvec::SmallVec;

use crate::error::{Diagnostic, Error};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
	Field(String),
	Pos(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suffix {
	Size,
	Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnName {
	pub segments: SmallVec<[Segment; 4]>,
	pub suffix: Option<Suffix>,
}

impl ColumnName {
	pub fn root(field: impl Into<String>) -> Self {
		let mut segments = SmallVec::new();
		segments.push(Segment::Field(field.into()));
		Self {
			segments,
			suffix: None,
		}
	}

	/// A statement-builder temporary; `n` keeps them totally ordered.
	pub fn temp(n: u64) -> Self {
		Self::root(format!("#{}", n))
	}

	pub fn is_temp(&self) -> bool {
		matches!(self.segments.first(), Some(Segment::Field(f)) if f.starts_with('#'))
	}

	/// The counter of a temporary column, if this is one.
	pub fn temp_index(&self) -> Option<u64> {
		match self.segments.first() {
			Some(Segment::Field(f)) => f.strip_prefix('#')?.parse().ok(),
			_ => None,
		}
	}

	pub fn field(&self, name: impl Into<String>) -> Self {
		debug_assert!(self.suffix.is_none());
		let mut segments = self.segments.clone();
		segments.push(Segment::Field(name.into()));
		Self {
			segments,
			suffix: None,
		}
	}

	/// Descend into a union possibility.
	pub fn pos(&self, index: u32) -> Self {
		debug_assert!(self.suffix.is_none());
		let mut segments = self.segments.clone();
		segments.push(Segment::Pos(index));
		Self {
			segments,
			suffix: None,
		}
	}

	pub fn size(&self) -> Self {
		debug_assert!(self.suffix.is_none());
		Self {
			segments: self.segments.clone(),
			suffix: Some(Suffix::Size),
		}
	}

	pub fn tag(&self) -> Self {
		debug_assert!(self.suffix.is_none());
		Self {
			segments: self.segments.clone(),
			suffix: Some(Suffix::Tag),
		}
	}

	pub fn is_size(&self) -> bool {
		self.suffix == Some(Suffix::Size)
	}

	pub fn is_tag(&self) -> bool {
		self.suffix == Some(Suffix::Tag)
	}

	/// The data column a sidecar belongs to (identity for data columns).
	pub fn data(&self) -> Self {
		Self {
			segments: self.segments.clone(),
			suffix: None,
		}
	}

	fn parse_error(text: &str, detail: &str) -> Error {
		Error(Diagnostic::new("COLUMN_001", format!("malformed column name '{}': {}", text, detail))
			.with_help("expected: segment ('.' segment | '@' int)* ('@size' | '@tag')?"))
	}
}

impl Display for ColumnName {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		for (i, segment) in self.segments.iter().enumerate() {
			match segment {
				Segment::Field(name) => {
					if i > 0 {
						f.write_str(".")?;
					}
					f.write_str(name)?;
				}
				Segment::Pos(index) => write!(f, "@{}", index)?,
			}
		}
		match self.suffix {
			Some(Suffix::Size) => f.write_str("@size")?,
			Some(Suffix::Tag) => f.write_str("@tag")?,
			None => {}
		}
		Ok(())
	}
}

fn is_segment(text: &str) -> bool {
	let mut chars = text.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '#' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for ColumnName {
	type Err = Error;

	fn from_str(text: &str) -> Result<Self, Error> {
		let mut segments: SmallVec<[Segment; 4]> = SmallVec::new();
		let mut suffix = None;

		// '@' and '.' both separate; '@' introduces either an integer
		// position tag or one of the reserved suffixes.
		let mut rest = text;
		let mut first = true;
		while !rest.is_empty() {
			if suffix.is_some() {
				return Err(ColumnName::parse_error(text, "content after @size/@tag"));
			}
			let (sep, body) = if first {
				('.', rest)
			} else {
				let sep = rest.chars().next().unwrap();
				(sep, &rest[1..])
			};
			let end = body.find(['.', '@']).unwrap_or(body.len());
			let piece = &body[..end];
			rest = &body[end..];

			match sep {
				'.' => {
					if !is_segment(piece) {
						return Err(ColumnName::parse_error(text, "bad segment"));
					}
					segments.push(Segment::Field(piece.to_string()));
				}
				'@' => match piece {
					"size" => suffix = Some(Suffix::Size),
					"tag" => suffix = Some(Suffix::Tag),
					_ => {
						let index = piece
							.parse::<u32>()
							.map_err(|_| ColumnName::parse_error(text, "bad position tag"))?;
						segments.push(Segment::Pos(index));
					}
				},
				_ => return Err(ColumnName::parse_error(text, "bad separator")),
			}
			first = false;
		}

		if segments.is_empty() {
			return Err(ColumnName::parse_error(text, "empty"));
		}
		Ok(Self {
			segments,
			suffix,
		})
	}
}

impl Serialize for ColumnName {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&self.to_string())
	}
}

impl<'de> Deserialize<'de> for ColumnName {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let text = String::deserialize(deserializer)?;
		text.parse().map_err(|e: Error| de::Error::custom(e.to_string()))
	}
}
