// SPDX-License-Identifier: MIT
// Copyright (c) 2025 ReifyDB

//! Immutable lexical frames: a persistent stack of binding maps shared
//! by symbol resolution and by type facts. Forking is cheap (one `Arc`
//! bump); nothing is ever mutated in place, so sibling branches of a
//! predicate can diverge safely.

use std::{collections::BTreeMap, sync::Arc};

#[derive(Debug)]
pub struct Frame<T> {
	parent: Option<Arc<Frame<T>>>,
	bindings: BTreeMap<String, T>,
}

impl<T> Frame<T> {
	pub fn root() -> Arc<Self> {
		Arc::new(Self {
			parent: None,
			bindings: BTreeMap::new(),
		})
	}

	pub fn with(bindings: impl IntoIterator<Item = (impl Into<String>, T)>) -> Arc<Self> {
		Arc::new(Self {
			parent: None,
			bindings: bindings.into_iter().map(|(name, value)| (name.into(), value)).collect(),
		})
	}

	/// A child scope; its bindings shadow the parent's.
	pub fn fork(self: &Arc<Self>, bindings: impl IntoIterator<Item = (impl Into<String>, T)>) -> Arc<Self> {
		Arc::new(Self {
			parent: Some(Arc::clone(self)),
			bindings: bindings.into_iter().map(|(name, value)| (name.into(), value)).collect(),
		})
	}

	pub fn bind(self: &Arc<Self>, name: impl Into<String>, value: T) -> Arc<Self> {
		self.fork([(name.into(), value)])
	}

	pub fn get(&self, name: &str) -> Option<&T> {
		match self.bindings.get(name) {
			Some(value) => Some(value),
			None => self.parent.as_ref().and_then(|parent| parent.get(name)),
		}
	}

	pub fn defines(&self, name: &str) -> bool {
		self.get(name).is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_shadowing() {
		let root = Frame::with([("x", 1), ("y", 2)]);
		let child = root.fork([("x", 10)]);
		assert_eq!(child.get("x"), Some(&10));
		assert_eq!(child.get("y"), Some(&2));
		assert_eq!(root.get("x"), Some(&1));
	}

	#[test]
	fn test_siblings_do_not_interfere() {
		let root = Frame::with([("x", 1)]);
		let left = root.bind("x", 2);
		let right = root.bind("x", 3);
		assert_eq!(left.get("x"), Some(&2));
		assert_eq!(right.get("x"), Some(&3));
	}

	#[test]
	fn test_missing() {
		let root: Arc<Frame<i32>> = Frame::root();
		assert_eq!(root.get("nope"), None);
		assert!(!root.defines("nope"));
	}
}
