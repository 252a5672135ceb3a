// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// A piece of the submitted query an error points at.
///
/// Expression trees arrive from an embedding layer rather than from a
/// parser inside this workspace, so positions are optional: trees built
/// programmatically carry `Internal` fragments, trees built from source
/// text carry `Source` fragments with a line and column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Fragment {
	None,
	Internal {
		text: String,
	},
	Source {
		text: String,
		line: u32,
		column: u32,
	},
}

impl Fragment {
	pub fn internal(text: impl Into<String>) -> Self {
		Fragment::Internal {
			text: text.into(),
		}
	}

	pub fn text(&self) -> &str {
		match self {
			Fragment::None => "",
			Fragment::Internal {
				text,
			} => text,
			Fragment::Source {
				text, ..
			} => text,
		}
	}
}

/// A fully rendered error: everything a caller needs to print a useful
/// message without access to compiler internals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
	pub code: String,
	pub message: String,
	pub fragment: Fragment,
	pub label: Option<String>,
	pub help: Option<String>,
	pub notes: Vec<String>,
}

impl Diagnostic {
	pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			code: code.into(),
			message: message.into(),
			fragment: Fragment::None,
			label: None,
			help: None,
			notes: Vec::new(),
		}
	}

	pub fn with_fragment(mut self, fragment: Fragment) -> Self {
		self.fragment = fragment;
		self
	}

	pub fn with_label(mut self, label: impl Into<String>) -> Self {
		self.label = Some(label.into());
		self
	}

	pub fn with_help(mut self, help: impl Into<String>) -> Self {
		self.help = Some(help.into());
		self
	}

	pub fn with_note(mut self, note: impl Into<String>) -> Self {
		self.notes.push(note.into());
		self
	}
}

impl Display for Diagnostic {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "[{}] {}", self.code, self.message)?;
		match &self.fragment {
			Fragment::None => {}
			Fragment::Internal {
				text,
			} => write!(f, "\n  in: {}", text)?,
			Fragment::Source {
				text,
				line,
				column,
			} => write!(f, "\n  at {}:{}: {}", line, column, text)?,
		}
		if let Some(label) = &self.label {
			write!(f, "\n  --> {}", label)?;
		}
		if let Some(help) = &self.help {
			write!(f, "\n  help: {}", help)?;
		}
		for note in &self.notes {
			write!(f, "\n  note: {}", note)?;
		}
		Ok(())
	}
}

/// Conversion into a [`Diagnostic`], implemented by every per-crate error
/// enum in the workspace.
pub trait IntoDiagnostic {
	fn into_diagnostic(self) -> Diagnostic;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_display_renders_all_sections() {
		let diagnostic = Diagnostic::new("TYPE_001", "cannot add string to number")
			.with_fragment(Fragment::Source {
				text: "x + y".to_string(),
				line: 3,
				column: 7,
			})
			.with_label("incompatible operand")
			.with_help("cast one operand first")
			.with_note("addition is defined on numbers only");

		let rendered = diagnostic.to_string();
		assert!(rendered.contains("[TYPE_001]"));
		assert!(rendered.contains("at 3:7: x + y"));
		assert!(rendered.contains("help: cast one operand first"));
		assert!(rendered.contains("note: addition is defined on numbers only"));
	}

	#[test]
	fn test_fragment_text() {
		assert_eq!(Fragment::None.text(), "");
		assert_eq!(Fragment::internal("a + b").text(), "a + b");
	}
}
